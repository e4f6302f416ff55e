//! Severity-tagged findings, the unit of output for every check.
//!
//! A [`Finding`] is immutable once created. Checks never build them directly;
//! they report through their [`CheckUnit`], which stamps the check name and a
//! timestamp and pushes the finding onto the run's finding stream.

use crate::utils::{NetworkError, Result};
use chrono::{SecondsFormat, Utc};
use colored::Color;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

mod unit;

pub use unit::*;

/// Name used for findings produced by the orchestrator itself.
pub const ADMIN_CHECK: &str = "admin";

/// Finding severity, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Detail = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Fatal = 4,
    Todo = 5,
    Admin = 6,
}

impl Severity {
    pub const ALL: [Severity; 7] = [
        Severity::Detail,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
        Severity::Todo,
        Severity::Admin,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Detail => "DETAIL",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Todo => "TODO",
            Severity::Admin => "ADMIN",
        }
    }

    /// Fatal, todo and admin findings bypass the configured threshold.
    pub const fn is_always_visible(self) -> bool {
        matches!(self, Severity::Fatal | Severity::Todo | Severity::Admin)
    }

    pub fn is_visible(self, threshold: Severity) -> bool {
        self.is_always_visible() || self >= threshold
    }

    pub const fn color(self) -> Option<Color> {
        match self {
            Severity::Detail => Some(Color::Blue),
            Severity::Info => Some(Color::Green),
            Severity::Warning => Some(Color::BrightYellow),
            Severity::Error => Some(Color::Red),
            Severity::Fatal => Some(Color::Magenta),
            Severity::Todo => Some(Color::Cyan),
            Severity::Admin => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the threshold names accepted on the command line and in config.
impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "detail" => Ok(Severity::Detail),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!(
                "unknown log level {other:?} (expected detail, info, warning or error)"
            )),
        }
    }
}

/// Stable, upper-snake-case finding identifier such as `QUERY_OPEN_DNS_RESOLVER_OK`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Mnemonic(String);

impl Mnemonic {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let mut chars = value.chars();
        let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_uppercase());
        let well_formed = value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if starts_with_letter && well_formed && !value.ends_with('_') {
            Ok(Self(value))
        } else {
            Err(NetworkError::InvalidMnemonic(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation made by a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    timestamp: String,
    check: String,
    level: Severity,
    mnemonic: Mnemonic,
    details: String,
}

impl Finding {
    pub fn new(
        check: impl Into<String>,
        level: Severity,
        mnemonic: Mnemonic,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            check: check.into(),
            level,
            mnemonic,
            details: details.into(),
        }
    }

    /// Admin finding with a mnemonic known to be valid at compile time.
    pub fn admin(mnemonic: &'static str, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            check: ADMIN_CHECK.to_string(),
            level: Severity::Admin,
            mnemonic: Mnemonic(mnemonic.to_string()),
            details: details.into(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn severity(&self) -> Severity {
        self.level
    }

    pub fn mnemonic(&self) -> &Mnemonic {
        &self.mnemonic
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

/// Per-severity finding counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeveritySummary {
    counts: [u64; 7],
}

impl SeveritySummary {
    pub fn record(&mut self, severity: Severity) {
        self.counts[severity.index()] += 1;
    }

    pub fn count(&self, severity: Severity) -> u64 {
        self.counts[severity.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The `DETAIL=..,INFO=..,WARNING=..,ERROR=..` line of the summary finding.
    pub fn summary_line(&self) -> String {
        format!(
            "DETAIL={},INFO={},WARNING={},ERROR={}",
            self.count(Severity::Detail),
            self.count(Severity::Info),
            self.count(Severity::Warning),
            self.count(Severity::Error),
        )
    }
}
