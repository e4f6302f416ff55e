//! Runs a list of checks concurrently and folds their findings into one summary.
//!
//! Every recognized check runs in its own task with a [`CheckUnit`] holding
//! clones of two unbounded senders, one for findings and one for progress
//! ticks. The orchestrator drains both while the checks run and returns once
//! every sender has been dropped, which can only happen after every task
//! (and its supervisor) has finished.

use crate::checks::Registry;
use crate::context::RunContext;
use crate::findings::{CheckUnit, Finding, SeveritySummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Orchestrator {
    registry: Registry,
    ctx: Arc<RunContext>,
    verbose: bool,
}

impl Orchestrator {
    pub fn new(registry: Registry, ctx: Arc<RunContext>) -> Self {
        Self {
            registry,
            ctx,
            verbose: false,
        }
    }

    /// Show per-check progress counters on a spinner line.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run `names` and hand every finding to `on_finding` as it arrives.
    ///
    /// The returned summary counts every finding passed to `on_finding`
    /// except the final `SUMMARY` record itself.
    pub async fn run<F>(&self, names: &[String], mut on_finding: F) -> SeveritySummary
    where
        F: FnMut(&Finding),
    {
        let mut summary = SeveritySummary::default();
        let mut emit = |finding: Finding, summary: &mut SeveritySummary| {
            summary.record(finding.severity());
            on_finding(&finding);
        };

        let (findings_tx, mut findings_rx) = mpsc::unbounded_channel();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        if names.is_empty() {
            emit(Finding::admin("NO_CHECKS", "No checks defined"), &mut summary);
        }

        let mut launched = BTreeSet::new();
        for name in names {
            let Some(check) = self.registry.get(name) else {
                emit(
                    Finding::admin("NO_CHECK", format!("No such check: {name}")),
                    &mut summary,
                );
                continue;
            };
            if !launched.insert(name.as_str()) {
                emit(
                    Finding::admin("DUPLICATE_CHECK", format!("Check {name} is already running")),
                    &mut summary,
                );
                continue;
            }

            log::debug!("launching check {}", name);
            let unit = CheckUnit::new(name.as_str(), findings_tx.clone(), progress_tx.clone());
            let supervisor = unit.clone();
            let task = tokio::spawn(check(Arc::clone(&self.ctx), unit));
            tokio::spawn(async move {
                if let Err(e) = task.await {
                    let reason = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    log::error!("check {} aborted: {}", supervisor.name(), reason);
                    supervisor.error("CHECK_PANIC", format!("Check aborted: {reason}"));
                }
            });
        }

        // only the units hold senders from here on
        drop(findings_tx);
        drop(progress_tx);

        let display = ProgressDisplay::new(self.verbose);
        let mut progress: BTreeMap<String, u64> = BTreeMap::new();
        let mut findings_open = true;
        let mut progress_open = true;

        loop {
            tokio::select! {
                finding = findings_rx.recv(), if findings_open => match finding {
                    Some(finding) => display.suspend(|| emit(finding, &mut summary)),
                    None => findings_open = false,
                },
                tick = progress_rx.recv(), if progress_open => match tick {
                    Some(name) => {
                        *progress.entry(name).or_insert(0) += 1;
                        display.update(&progress);
                    }
                    None => progress_open = false,
                },
                else => break,
            }
        }
        display.finish();

        on_finding(&Finding::admin("SUMMARY", summary.summary_line()));
        summary
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// The `PROGRESS=a/b/c` line: tick counts in check-name order.
pub fn render_progress(progress: &BTreeMap<String, u64>) -> String {
    let counts: Vec<String> = progress.values().map(u64::to_string).collect();
    format!("PROGRESS={}", counts.join("/"))
}

struct ProgressDisplay {
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    fn new(verbose: bool) -> Self {
        let bar = verbose.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { bar }
    }

    fn update(&self, progress: &BTreeMap<String, u64>) {
        if let Some(bar) = &self.bar {
            bar.set_message(render_progress(progress));
        }
    }

    /// Keep printed findings from tearing the spinner line.
    fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
