//! Per-session error taxonomy.

use std::io;

use thiserror::Error;

use crate::http::response;

/// Everything that can end a session early.
///
/// None of these escape the session task; the accept loop never sees them.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Request line or target could not be understood.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Absolute-form target with a scheme other than `http`.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// DNS failure, refusal, or connect timeout.
    #[error("upstream {target} unreachable: {source}")]
    UpstreamUnreachable {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Read or write failure while relaying. Usually a peer reset.
    #[error("relay I/O error: {0}")]
    RelayIo(#[source] io::Error),

    /// Client went away before sending a complete request head.
    #[error("client closed before sending a request")]
    ClientClosed,

    /// Client did not finish the request head in time.
    #[error("timed out waiting for request head")]
    HeaderTimeout,
}

impl ProxyError {
    /// Status line to send before closing, if any.
    pub fn response(&self) -> Option<&'static [u8]> {
        match self {
            ProxyError::MalformedRequest(_) | ProxyError::UnsupportedScheme(_) => {
                Some(response::BAD_REQUEST)
            }
            ProxyError::UpstreamUnreachable { .. } => Some(response::BAD_GATEWAY),
            ProxyError::RelayIo(_) | ProxyError::ClientClosed | ProxyError::HeaderTimeout => None,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedRequest(_) => "malformed_request",
            ProxyError::UnsupportedScheme(_) => "unsupported_scheme",
            ProxyError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ProxyError::RelayIo(_) => "relay_io",
            ProxyError::ClientClosed => "client_closed",
            ProxyError::HeaderTimeout => "header_timeout",
        }
    }

    /// Whether this is an ordinary end of conversation rather than a fault.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            ProxyError::RelayIo(_) | ProxyError::ClientClosed | ProxyError::HeaderTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_follow_error_class() {
        assert_eq!(
            ProxyError::MalformedRequest("x".into()).response(),
            Some(response::BAD_REQUEST)
        );
        assert_eq!(
            ProxyError::UnsupportedScheme("ftp".into()).response(),
            Some(response::BAD_REQUEST)
        );
        let unreachable = ProxyError::UpstreamUnreachable {
            target: "example.test:443".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(unreachable.response(), Some(response::BAD_GATEWAY));
        assert!(!unreachable.is_quiet());

        let relay = ProxyError::RelayIo(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(relay.response(), None);
        assert!(relay.is_quiet());
    }
}
