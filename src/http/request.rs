//! Request head reading and parsing.
//!
//! # Responsibilities
//! - Accumulate client bytes until the `\r\n\r\n` terminator, across any
//!   number of fragmented reads
//! - Split the request line into method, target and version
//! - Classify the request as a CONNECT tunnel or an absolute-URI forward
//! - Capture header lines verbatim for forward-mode reconstruction
//!
//! # Design Decisions
//! - The scan resumes three bytes before the previous end of buffer, so a
//!   terminator split across reads is still found and nothing is rescanned
//! - Bytes past the terminator are handed back to the caller untouched
//! - CONNECT targets without a port default to 443

use std::net::Ipv6Addr;

use tokio::io::{AsyncRead, AsyncReadExt};
use url::{Host, Url};

use crate::proxy::ProxyError;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 1024;

/// Port assumed for `CONNECT host` with no explicit port.
pub const DEFAULT_CONNECT_PORT: u16 = 443;
/// Port assumed for `http://host/...` with no explicit port.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Which relay mode a request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Connect,
    Forward,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Connect => "connect",
            RequestKind::Forward => "forward",
        }
    }
}

/// A fully classified request head.
///
/// `host` is never empty and `port` is never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub is_connect: bool,
    pub host: String,
    pub port: u16,
    /// Origin-form path (with query) for forward requests; empty for tunnels.
    pub path: String,
    pub http_version: String,
    /// Header lines without their line terminators, in arrival order.
    /// Empty for tunnels.
    pub headers: Vec<String>,
}

impl ParsedRequest {
    pub fn kind(&self) -> RequestKind {
        if self.is_connect {
            RequestKind::Connect
        } else {
            RequestKind::Forward
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Request head to send upstream in forward mode: relative request line
    /// followed by the captured headers and a blank line.
    pub fn outbound_head(&self) -> Vec<u8> {
        let mut head = format!("{} {} {}\r\n", self.method, self.path, self.http_version);
        for line in &self.headers {
            head.push_str(line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        head.into_bytes()
    }
}

/// A parsed request plus whatever the client sent after the head.
#[derive(Debug)]
pub struct RequestHead {
    pub request: ParsedRequest,
    /// Bytes read past the terminator (start of a body or tunnel payload).
    pub early_data: Vec<u8>,
}

/// Read and parse one request head from `reader`.
pub async fn read_request<R>(reader: &mut R, max_bytes: usize) -> Result<RequestHead, ProxyError>
where
    R: AsyncRead + Unpin,
{
    let (head, early_data) = read_head(reader, max_bytes).await?;
    let request = parse_head(&head)?;
    Ok(RequestHead {
        request,
        early_data,
    })
}

/// Buffer bytes until the header terminator.
///
/// Returns the head (terminator included) and any bytes that followed it.
pub async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<(Vec<u8>, Vec<u8>), ProxyError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut scanned = 0;

    loop {
        let n = reader.read(&mut chunk).await.map_err(ProxyError::RelayIo)?;
        if n == 0 {
            return Err(if buf.is_empty() {
                ProxyError::ClientClosed
            } else {
                ProxyError::MalformedRequest("connection closed inside request head".into())
            });
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find_terminator(&buf, scanned) {
            let end = pos + HEADER_TERMINATOR.len();
            if end > max_bytes {
                return Err(head_too_large(max_bytes));
            }
            let rest = buf.split_off(end);
            return Ok((buf, rest));
        }
        if buf.len() > max_bytes {
            return Err(head_too_large(max_bytes));
        }
        scanned = buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
    }
}

fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..]
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|p| p + from)
}

fn head_too_large(max_bytes: usize) -> ProxyError {
    ProxyError::MalformedRequest(format!("request head exceeds {} bytes", max_bytes))
}

fn malformed(reason: impl Into<String>) -> ProxyError {
    ProxyError::MalformedRequest(reason.into())
}

/// Parse a complete request head.
pub fn parse_head(head: &[u8]) -> Result<ParsedRequest, ProxyError> {
    let text = std::str::from_utf8(head).map_err(|_| malformed("request head is not UTF-8"))?;
    let text = text.strip_suffix("\r\n\r\n").unwrap_or(text);

    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let fields: Vec<&str> = request_line.split_whitespace().collect();
    let (method, target, version) = match fields.as_slice() {
        [method, target, version] => (*method, *target, *version),
        _ => {
            return Err(malformed(format!(
                "expected 'METHOD TARGET VERSION', got {} field(s)",
                fields.len()
            )))
        }
    };
    if !version.starts_with("HTTP/") {
        return Err(malformed(format!("bad protocol version '{}'", version)));
    }

    if method == "CONNECT" {
        let (host, port) = parse_connect_target(target)?;
        return Ok(ParsedRequest {
            method: method.to_string(),
            is_connect: true,
            host,
            port,
            path: String::new(),
            http_version: version.to_string(),
            headers: Vec::new(),
        });
    }

    let (host, port, path) = parse_absolute_target(target)?;
    Ok(ParsedRequest {
        method: method.to_string(),
        is_connect: false,
        host,
        port,
        path,
        http_version: version.to_string(),
        headers: lines.filter(|l| !l.is_empty()).map(str::to_string).collect(),
    })
}

/// Parse a CONNECT authority: `host:port`, `[v6]:port`, or a bare host.
pub fn parse_connect_target(target: &str) -> Result<(String, u16), ProxyError> {
    let (host, port) = if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| malformed("unterminated IPv6 literal"))?;
        host.parse::<Ipv6Addr>()
            .map_err(|_| malformed(format!("bad IPv6 literal '{}'", host)))?;
        let port = match after {
            "" => None,
            _ => Some(
                after
                    .strip_prefix(':')
                    .ok_or_else(|| malformed(format!("bad CONNECT target '{}'", target)))?,
            ),
        };
        (host, port)
    } else {
        match target.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                return Err(malformed("IPv6 CONNECT targets must be bracketed"))
            }
            Some((host, port)) => (host, Some(port)),
            None => (target, None),
        }
    };

    if host.is_empty() || host.contains(|c| c == '/' || c == '@') {
        return Err(malformed(format!("bad CONNECT host '{}'", host)));
    }
    let port = match port {
        Some(port) => parse_port(port)?,
        None => DEFAULT_CONNECT_PORT,
    };
    Ok((host.to_string(), port))
}

/// Parse an absolute-form target into host, port and origin-form path.
pub fn parse_absolute_target(target: &str) -> Result<(String, u16, String), ProxyError> {
    let (scheme, rest) = target
        .split_once("://")
        .ok_or_else(|| malformed(format!("expected absolute URI, got '{}'", target)))?;
    if scheme.is_empty() {
        return Err(malformed("empty URI scheme"));
    }
    if !scheme.eq_ignore_ascii_case("http") {
        return Err(ProxyError::UnsupportedScheme(scheme.to_ascii_lowercase()));
    }
    // `url` treats a backslash as a path separator; the forwarded path is raw text.
    if target.contains('\\') {
        return Err(malformed(format!("backslash in URI '{}'", target)));
    }

    let url = Url::parse(target).map_err(|e| malformed(format!("bad URI '{}': {}", target, e)))?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Err(malformed(format!("no host in '{}'", target))),
    };
    if host.is_empty() {
        return Err(malformed(format!("no host in '{}'", target)));
    }
    let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);
    if port == 0 {
        return Err(malformed("port 0 is not routable"));
    }

    Ok((host, port, relative_path(rest)))
}

/// Origin-form path taken verbatim from the text after `scheme://`.
fn relative_path(after_scheme: &str) -> String {
    let without_fragment = after_scheme.split('#').next().unwrap_or_default();
    match without_fragment.find(|c| c == '/' || c == '?') {
        Some(i) if without_fragment[i..].starts_with('/') => without_fragment[i..].to_string(),
        Some(i) => format!("/{}", &without_fragment[i..]),
        None => "/".to_string(),
    }
}

fn parse_port(port: &str) -> Result<u16, ProxyError> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(malformed(format!("bad port '{}'", port))),
        Ok(port) => Ok(port),
    }
}
