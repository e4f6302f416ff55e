//! Terminal rendering of findings.

use crate::findings::{Finding, Severity};
use colored::*;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writes the findings that pass the severity threshold.
pub struct Printer<W: Write> {
    out: W,
    threshold: Severity,
    format: OutputFormat,
}

impl Printer<io::Stdout> {
    pub fn stdout(threshold: Severity, format: OutputFormat) -> Self {
        Self::new(io::stdout(), threshold, format)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, threshold: Severity, format: OutputFormat) -> Self {
        Self {
            out,
            threshold,
            format,
        }
    }

    pub fn print(&mut self, finding: &Finding) {
        if !finding.severity().is_visible(self.threshold) {
            return;
        }
        let line = match self.format {
            OutputFormat::Text => format_line(finding),
            OutputFormat::Json => match serde_json::to_string(finding) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("cannot serialize finding: {}", e);
                    return;
                }
            },
        };
        if let Err(e) = writeln!(self.out, "{line}") {
            log::warn!("cannot write finding: {}", e);
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `timestamp<TAB>check<TAB>LEVEL<TAB>MNEMONIC<TAB>details`, level colored.
pub fn format_line(finding: &Finding) -> String {
    let severity = finding.severity();
    let level = match severity.color() {
        Some(color) => severity.as_str().color(color).bold().to_string(),
        None => severity.as_str().bold().to_string(),
    };
    format!(
        "{}\t{}\t{}\t{}\t{}",
        finding.timestamp(),
        finding.check(),
        level,
        finding.mnemonic(),
        finding.details()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Mnemonic;

    fn finding(level: Severity, mnemonic: &str) -> Finding {
        Finding::new("dns_open_resolvers", level, Mnemonic::new(mnemonic).unwrap(), "text")
    }

    fn printed(threshold: Severity, format: OutputFormat, findings: &[Finding]) -> String {
        let mut printer = Printer::new(Vec::new(), threshold, format);
        for f in findings {
            printer.print(f);
        }
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_threshold_gating() {
        colored::control::set_override(false);
        let out = printed(
            Severity::Warning,
            OutputFormat::Text,
            &[
                finding(Severity::Detail, "DNS_QUERY_STATS"),
                finding(Severity::Info, "QUERY_OPEN_DNS_RESOLVER_WORKS"),
                finding(Severity::Warning, "PING_OPEN_DNS_RESOLVER_FAILS"),
                finding(Severity::Fatal, "OPEN_DNS_RESOLVER_NO_NAMES"),
                Finding::admin("SUMMARY", "DETAIL=1,INFO=1,WARNING=1,ERROR=0"),
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\tWARNING\tPING_OPEN_DNS_RESOLVER_FAILS\ttext"));
        assert!(lines[1].contains("\tFATAL\t"));
        assert!(lines[2].contains("\tadmin\tADMIN\tSUMMARY\t"));
    }

    #[test]
    fn test_json_lines() {
        let out = printed(
            Severity::Detail,
            OutputFormat::Json,
            &[finding(Severity::Error, "QUERY_OPEN_DNS_RESOLVER_FAILS")],
        );
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["mnemonic"], "QUERY_OPEN_DNS_RESOLVER_FAILS");
        assert_eq!(value["details"], "text");
    }
}
