//! Responses the proxy writes on its own behalf.
//!
//! Everything else a client receives is relayed verbatim from upstream.

use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

pub const BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

pub const BAD_GATEWAY: &[u8] =
    b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Write a canned response, ignoring failures.
///
/// Used on error paths where the client may already be gone.
pub async fn send_best_effort<W>(stream: &mut W, response: &[u8])
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = stream.write_all(response).await {
        tracing::trace!(error = %e, "Client not writable, dropping status line");
        return;
    }
    let _ = stream.flush().await;
}
