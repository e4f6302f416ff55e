use super::{Finding, Mnemonic, Severity};
use tokio::sync::mpsc::UnboundedSender;

/// Handle a running check uses to report findings and progress ticks.
///
/// The orchestrator owns the receiving ends. Dropping the last clone of a unit
/// closes its sinks, which is how a check signals completion.
#[derive(Debug, Clone)]
pub struct CheckUnit {
    name: String,
    findings: UnboundedSender<Finding>,
    progress: UnboundedSender<String>,
}

impl CheckUnit {
    pub fn new(
        name: impl Into<String>,
        findings: UnboundedSender<Finding>,
        progress: UnboundedSender<String>,
    ) -> Self {
        Self {
            name: name.into(),
            findings,
            progress,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn report(&self, level: Severity, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        let mnemonic = mnemonic.as_ref();
        let finding = match Mnemonic::new(mnemonic) {
            Ok(valid) => Finding::new(&self.name, level, valid, details),
            Err(e) => {
                log::error!("{}: {}", self.name, e);
                Finding::new(
                    &self.name,
                    level,
                    Mnemonic(String::from("INVALID_MNEMONIC")),
                    format!("{}: {}", mnemonic, details.into()),
                )
            }
        };
        if self.findings.send(finding).is_err() {
            log::debug!("{}: finding stream closed", self.name);
        }
    }

    pub fn detail(&self, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        self.report(Severity::Detail, mnemonic, details);
    }

    pub fn info(&self, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        self.report(Severity::Info, mnemonic, details);
    }

    pub fn warning(&self, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        self.report(Severity::Warning, mnemonic, details);
    }

    pub fn error(&self, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        self.report(Severity::Error, mnemonic, details);
    }

    pub fn fatal(&self, mnemonic: impl AsRef<str>, details: impl Into<String>) {
        self.report(Severity::Fatal, mnemonic, details);
    }

    /// Advisory progress tick.
    pub fn track(&self) {
        let _ = self.progress.send(self.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_report_stamps_check_name() {
        let (ftx, mut frx) = mpsc::unbounded_channel();
        let (ptx, mut prx) = mpsc::unbounded_channel();
        let unit = CheckUnit::new("port_filtering", ftx, ptx);

        unit.info("PORT_FILTER_IPV4_CONN_OK", "connected");
        unit.track();

        let finding = frx.try_recv().unwrap();
        assert_eq!(finding.check(), "port_filtering");
        assert_eq!(finding.severity(), Severity::Info);
        assert_eq!(finding.mnemonic().as_str(), "PORT_FILTER_IPV4_CONN_OK");
        assert_eq!(prx.try_recv().unwrap(), "port_filtering");
    }

    #[test]
    fn test_invalid_mnemonic_is_kept_visible() {
        let (ftx, mut frx) = mpsc::unbounded_channel();
        let (ptx, _prx) = mpsc::unbounded_channel();
        let unit = CheckUnit::new("doh_providers", ftx, ptx);

        unit.warning("not-a-mnemonic", "oops");

        let finding = frx.try_recv().unwrap();
        assert_eq!(finding.mnemonic().as_str(), "INVALID_MNEMONIC");
        assert_eq!(finding.details(), "not-a-mnemonic: oops");
        assert_eq!(finding.severity(), Severity::Warning);
    }

    #[test]
    fn test_dropping_units_closes_sinks() {
        let (ftx, mut frx) = mpsc::unbounded_channel();
        let (ptx, _prx) = mpsc::unbounded_channel();
        let unit = CheckUnit::new("network_interfaces", ftx, ptx);
        let clone = unit.clone();
        unit.detail("IPV4", "first");
        drop(unit);
        clone.detail("IPV4", "second");
        drop(clone);

        assert_eq!(frx.try_recv().unwrap().details(), "first");
        assert_eq!(frx.try_recv().unwrap().details(), "second");
        assert!(matches!(
            frx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
