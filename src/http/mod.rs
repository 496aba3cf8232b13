//! HTTP/1.x request handling, just enough for a forward proxy.
//!
//! # Data Flow
//! ```text
//! Client bytes
//!     → request.rs (buffer to \r\n\r\n, parse request line, classify)
//!     → ParsedRequest { CONNECT | forward }
//!     → response.rs (200 / 400 / 502 written by the proxy itself)
//! ```
//!
//! No framework is involved: after the head is parsed every byte is opaque
//! payload for the relay.

pub mod request;
pub mod response;

pub use request::{read_request, ParsedRequest, RequestHead, RequestKind};
