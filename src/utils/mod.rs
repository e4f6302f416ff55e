use crate::config::ConfigError;
use hickory_client::op::ResponseCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection timeout")]
    Timeout,
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),
    #[error("DNS ID mismatch ({expected} vs {got})")]
    IdMismatch { expected: u16, got: u16 },
    #[error("DNS response error ({name})")]
    ResponseCode { code: u16, name: &'static str },
    #[error("Don't know how to handle result type {0}")]
    UnsupportedRecord(String),
    #[error("Don't know how to query DNS for {0}")]
    UnsupportedQueryType(String),
    #[error("DNS protocol error: {0}")]
    Protocol(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Invalid mnemonic: {0:?}")]
    InvalidMnemonic(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Other error: {0}")]
    Other(String),
}

impl NetworkError {
    pub fn response_code(rcode: ResponseCode) -> Self {
        Self::ResponseCode {
            code: rcode.into(),
            name: rcode.to_str(),
        }
    }

    /// True for a clean "name does not exist" answer from a server.
    pub fn is_nxdomain(&self) -> bool {
        matches!(self, Self::ResponseCode { code, .. } if *code == u16::from(ResponseCode::NXDomain))
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;

pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f32())
    }
}

/// Coarse human form used for file ages, e.g. `3d 4h 0m 12s`.
pub fn duration_to_human(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if duration.subsec_millis() >= 500 {
        secs += 1;
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}
