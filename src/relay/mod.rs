//! Bidirectional byte relay.
//!
//! # Data Flow
//! ```text
//! client ──read──▶ up buffer ──write_all──▶ remote
//! client ◀──write_all── down buffer ◀──read── remote
//! ```
//!
//! Each direction is its own read/write loop and the two loops are raced
//! with `tokio::select!`, so a stalled write in one direction never stops
//! the other from being read. The first EOF or I/O error on either side ends
//! the relay for both directions; a peer half-closing is treated as the end
//! of the session.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::observability::metrics;

/// One end of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Remote,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Remote => "remote",
        }
    }
}

/// Why the relay stopped.
#[derive(Debug)]
pub enum Termination {
    /// `side` returned zero bytes from a read.
    Eof(Side),
    /// Reading from or writing to `side` failed.
    Error(Side, io::Error),
}

impl Termination {
    pub fn side(&self) -> Side {
        match self {
            Termination::Eof(side) | Termination::Error(side, _) => *side,
        }
    }
}

/// Totals for one relay run.
#[derive(Debug)]
pub struct RelayStats {
    pub client_to_remote: u64,
    pub remote_to_client: u64,
    pub termination: Termination,
}

/// Pump bytes between `client` and `remote` until either side closes.
///
/// Write halves of both streams are shut down (best-effort) before this
/// returns. Pass `&mut` streams to keep ownership with the caller.
pub async fn relay<C, R>(client: C, remote: R, buffer_size: usize) -> RelayStats
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut remote_rd, mut remote_wr) = tokio::io::split(remote);

    let mut client_to_remote = 0u64;
    let mut remote_to_client = 0u64;

    let upstream = pump(
        &mut client_rd,
        &mut remote_wr,
        buffer_size,
        Side::Client,
        Side::Remote,
        &mut client_to_remote,
    );
    let downstream = pump(
        &mut remote_rd,
        &mut client_wr,
        buffer_size,
        Side::Remote,
        Side::Client,
        &mut remote_to_client,
    );
    let termination = tokio::select! {
        t = upstream => t,
        t = downstream => t,
    };

    let _ = remote_wr.shutdown().await;
    let _ = client_wr.shutdown().await;

    metrics::record_bytes_relayed("upstream", client_to_remote);
    metrics::record_bytes_relayed("downstream", remote_to_client);

    RelayStats {
        client_to_remote,
        remote_to_client,
        termination,
    }
}

/// Copy `reader` into `writer` until EOF or an error, counting delivered bytes.
async fn pump<Rd, Wr>(
    reader: &mut Rd,
    writer: &mut Wr,
    buffer_size: usize,
    from: Side,
    to: Side,
    total: &mut u64,
) -> Termination
where
    Rd: AsyncRead + Unpin,
    Wr: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Termination::Eof(from),
            Ok(n) => n,
            Err(e) => return Termination::Error(from, e),
        };
        if let Err(e) = writer.write_all(&buf[..n]).await {
            return Termination::Error(to, e);
        }
        *total += n as u64;
    }
}
