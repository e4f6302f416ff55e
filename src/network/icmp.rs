//! ICMP reachability through the system `ping` binary.
//!
//! Raw ICMP sockets need privileges, so the probe shells out and only keeps
//! the packet-loss summary line. [`Pinger`] is the seam tests replace.

use super::IpVersion;
use crate::utils::{NetworkError, Result};
use futures::future::BoxFuture;
use std::net::IpAddr;
use tokio::time::Duration;

/// Summary of one ping run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub transmitted: u32,
    pub received: u32,
    pub loss_percent: f64,
}

impl PingStats {
    /// Parses the `N packets transmitted, M received, X% packet loss` line
    /// printed by both the Linux and BSD `ping`.
    pub fn parse(output: &str) -> Option<Self> {
        let line = output.lines().find(|l| l.contains("transmitted"))?;
        let mut transmitted = None;
        let mut received = None;
        let mut loss_percent = None;

        for part in line.split(',').map(str::trim) {
            let first = part.split_whitespace().next().unwrap_or_default();
            if part.contains("transmitted") {
                transmitted = first.parse().ok();
            } else if part.contains("received") {
                received = first.parse().ok();
            } else if part.contains("packet loss") {
                loss_percent = first.trim_end_matches('%').parse().ok();
            }
        }

        Some(Self {
            transmitted: transmitted?,
            received: received?,
            loss_percent: loss_percent?,
        })
    }
}

pub trait Pinger: Send + Sync {
    fn ping<'a>(&'a self, target: IpAddr, count: u32) -> BoxFuture<'a, Result<PingStats>>;
}

/// Runs `ping`/`ping6` with a one second reply wait per packet.
#[derive(Debug, Clone, Default)]
pub struct SystemPinger;

impl SystemPinger {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, target: IpAddr, count: u32) -> Result<PingStats> {
        let ping_cmd = match IpVersion::of(target) {
            IpVersion::V4 => "ping",
            IpVersion::V6 => "ping6",
        };

        let mut cmd = tokio::process::Command::new(ping_cmd);
        let count = count.max(1);
        cmd.args(["-c", &count.to_string(), "-W", "1"]);
        cmd.arg(target.to_string());
        cmd.kill_on_drop(true);

        log::debug!("running {} -c {} {}", ping_cmd, count, target);

        // one second per packet plus slack for the final reply wait
        let limit = Duration::from_secs(u64::from(count) + 5);
        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| NetworkError::Timeout)?
            .map_err(NetworkError::Io)?;

        // ping exits non-zero on total loss but still prints statistics
        let stdout = String::from_utf8_lossy(&output.stdout);
        PingStats::parse(&stdout).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            NetworkError::Other(format!(
                "Ping to {} failed: {}",
                target,
                stderr.trim()
            ))
        })
    }
}

impl Pinger for SystemPinger {
    fn ping<'a>(&'a self, target: IpAddr, count: u32) -> BoxFuture<'a, Result<PingStats>> {
        Box::pin(self.run(target, count))
    }
}
