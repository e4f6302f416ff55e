use crate::utils::{NetworkError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connects to `addr`, returning the peer address actually reached.
pub async fn tcp_connect(addr: SocketAddr, limit: Duration) -> Result<TcpStream> {
    timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Io)
}

/// Writes `line` to the stream and reads one newline-terminated reply.
pub async fn tcp_line_exchange(stream: TcpStream, line: &str, limit: Duration) -> Result<String> {
    let (reader, mut writer) = stream.into_split();

    timeout(limit, writer.write_all(line.as_bytes()))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Io)?;

    let mut reply = String::new();
    let mut reader = BufReader::new(reader);
    let read = timeout(limit, reader.read_line(&mut reply))
        .await
        .map_err(|_| NetworkError::Timeout)?
        .map_err(NetworkError::Io)?;

    if read == 0 {
        return Err(NetworkError::Other(
            "connection closed without a reply".to_string(),
        ));
    }
    Ok(reply)
}
