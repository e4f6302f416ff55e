use super::IpVersion;
use crate::utils::{NetworkError, Result};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Largest datagram we accept back; matches the EDNS payload size we advertise.
pub const MAX_DATAGRAM: usize = 4096;

/// One datagram out, one datagram back, within `limit`.
///
/// Returns the reply and the round-trip time.
pub async fn udp_exchange(
    addr: SocketAddr,
    payload: &[u8],
    limit: Duration,
) -> Result<(Vec<u8>, Duration)> {
    let socket = UdpSocket::bind(IpVersion::of(addr.ip()).unspecified_bind())
        .await
        .map_err(NetworkError::Io)?;

    socket.connect(addr).await.map_err(NetworkError::Io)?;

    let start = Instant::now();
    timeout(limit, socket.send(payload))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Io)?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let received = timeout(limit, socket.recv(&mut buf))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Io)?;
    let rtt = start.elapsed();

    buf.truncate(received);
    Ok((buf, rtt))
}
