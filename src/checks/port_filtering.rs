//! Outbound port filtering: dial configured responders over TCP or UDP and
//! check that the greeting comes back unmodified.

use crate::context::RunContext;
use crate::findings::CheckUnit;
use crate::network::{
    resolve_target, tcp_connect, tcp_line_exchange, udp_exchange, IpVersion, NetworkProtocol,
    PortTarget,
};
use crate::utils::{NetworkError, Result};
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub const NAME: &str = "port_filtering";

/// What the responder sends back to every probe.
pub const EXPECTED_REPLY: &str = "Netiscope\n";

/// The greeting written to every target, terminated by a newline.
pub fn probe_line() -> String {
    format!("Netiscope v{}\n", env!("CARGO_PKG_VERSION"))
}

pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_port_filtering(&ctx, &check).await })
}

/// Dials every target once per enabled family.
///
/// A dial, write or read failure is an error finding for that target only;
/// an unparseable target list is fatal (`PORT_FILTER_BAD_TARGET`).
pub async fn check_port_filtering(ctx: &RunContext, check: &CheckUnit) {
    let settings = &ctx.settings().port_filtering;
    let targets = match settings.targets() {
        Ok(targets) => targets,
        Err(e) => {
            check.fatal("PORT_FILTER_BAD_TARGET", e.to_string());
            return;
        }
    };

    for target in &targets {
        for family in IpVersion::BOTH {
            if ctx.families().enabled(family) {
                probe_target(
                    check,
                    target,
                    family,
                    settings.timeout(),
                    settings.check_response,
                )
                .await;
                check.track();
            }
        }
    }
}

async fn probe_target(
    check: &CheckUnit,
    target: &PortTarget,
    family: IpVersion,
    timeout: Duration,
    check_response: bool,
) {
    let prefix = format!("PORT_FILTER_IPV{}", family.digit());
    let PortTarget {
        host,
        port,
        protocol,
    } = target;
    let proto = protocol.label();

    check.detail(
        format!("{prefix}_DIAL"),
        format!("Connecting to {host}:{port} on {family} {proto}"),
    );

    let addr = match resolve_target(host, family).await {
        Ok(ip) => SocketAddr::new(ip, *port),
        Err(e) => {
            check.error(
                format!("{prefix}_DIAL_ERROR"),
                format!("Error connecting to {host}:{port} on {family} {proto}: {e}"),
            );
            return;
        }
    };

    let reply = match protocol {
        NetworkProtocol::Tcp => match tcp_connect(addr, timeout).await {
            Ok(stream) => {
                check.info(
                    format!("{prefix}_CONN_OK"),
                    format!("Connection to {host}:{port} ({addr}) was successful on {family} {proto}"),
                );
                tcp_line_exchange(stream, &probe_line(), timeout).await
            }
            Err(e) => {
                check.error(
                    format!("{prefix}_DIAL_ERROR"),
                    format!("Error connecting to {host}:{port} on {family} {proto}: {e}"),
                );
                return;
            }
        },
        NetworkProtocol::Udp => {
            // UDP has no handshake, so the dial cannot fail past resolution
            check.info(
                format!("{prefix}_CONN_OK"),
                format!("Connection to {host}:{port} ({addr}) was successful on {family} {proto}"),
            );
            udp_line_exchange(addr, timeout).await
        }
    };

    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            check.error(
                format!("{prefix}_READ_ERROR"),
                format!("Error reading from {host}:{port} on {family} {proto}: {e}"),
            );
            return;
        }
    };

    if !check_response {
        return;
    }
    if reply == EXPECTED_REPLY {
        check.info(
            format!("{prefix}_RESPONSE_GOOD"),
            format!("Got the expected reply from {host}:{port} on {family} {proto}"),
        );
    } else {
        check.error(
            format!("{prefix}_RESPONSE_WRONG"),
            format!("Got unexpected reply from {host}:{port} on {family} {proto}: {reply:?}"),
        );
    }
}

async fn udp_line_exchange(addr: SocketAddr, timeout: Duration) -> Result<String> {
    let (reply, _rtt) = udp_exchange(addr, probe_line().as_bytes(), timeout).await?;
    String::from_utf8(reply)
        .map_err(|e| NetworkError::Protocol(format!("reply is not text: {}", e)))
}
