//! Waiting for an endpoint to accept connections.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Cancelled;

/// The pause between two dials.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("wait_for_connect requires a valid address")]
    EmptyAddress,

    /// Every failed dial followed by the cancellation, one per line.
    #[error("{}", .0.join("\n"))]
    Exhausted(Vec<String>),
}

/// Dials `address` every [`POLL_INTERVAL`] until a connection succeeds.
///
/// With a TLS config the handshake has to complete as well. The connection is
/// closed straight away. When `token` fires first, every recorded failure is
/// returned.
pub async fn wait_for_connect(
    token: &CancellationToken,
    address: &str,
    tls: Option<Arc<ClientConfig>>,
) -> Result<(), WaitError> {
    if address.is_empty() {
        return Err(WaitError::EmptyAddress);
    }

    let mut failures = Vec::new();
    loop {
        let dialed = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = dial(address, tls.as_ref()) => Some(result),
        };

        match dialed {
            Some(Ok(())) => return Ok(()),
            Some(Err(e)) => {
                debug!(%address, cause = %e, "endpoint not ready");
                failures.push(e.to_string());
            }
            None => {}
        }

        if token.is_cancelled() {
            failures.push(Cancelled.to_string());
            return Err(WaitError::Exhausted(failures));
        }

        tokio::select! {
            biased;
            () = token.cancelled() => {}
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

async fn dial(address: &str, tls: Option<&Arc<ClientConfig>>) -> io::Result<()> {
    let stream = TcpStream::connect(address).await?;
    let Some(config) = tls else {
        return Ok(());
    };

    let server_name = ServerName::try_from(host_of(address).to_owned()).map_err(io::Error::other)?;
    let mut stream = TlsConnector::from(Arc::clone(config)).connect(server_name, stream).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Strips the port, and the brackets of an IPv6 literal.
fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => address,
    };
    host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host)
}
