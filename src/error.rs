use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug)]
pub enum ProxyError {
    /// The proxy string could not be parsed as a URL.
    InvalidUrl(url::ParseError),
    /// The parsed URL has no host, or its host is shorter than 3 characters.
    InvalidHost,
    /// The URL scheme is none of the accepted proxy scheme spellings.
    UnsupportedScheme(String),
    /// A TCP connect to the proxy or the destination failed.
    Dial(io::Error),
    /// The SOCKS5 negotiation with the proxy failed.
    Socks(tokio_socks::Error),
    /// The proxy closed or truncated the CONNECT response (carries the byte count read).
    ShortResponse(usize),
    /// The proxy answered the CONNECT request with something other than
    /// `HTTP/1.1 200`; carries the raw response bytes.
    ProxyRejected(Vec<u8>),
    /// Configuration could not be read or deserialized.
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::InvalidUrl(e) => write!(f, "invalid proxy url: {}", e),
            ProxyError::InvalidHost => write!(f, "invalid host"),
            ProxyError::UnsupportedScheme(s) => write!(f, "invalid scheme: {}", s),
            ProxyError::Dial(e) => write!(f, "dial failed: {}", e),
            ProxyError::Socks(e) => write!(f, "socks5 negotiation failed: {}", e),
            ProxyError::ShortResponse(n) => {
                write!(f, "short proxy response ({} bytes)", n)
            }
            ProxyError::ProxyRejected(raw) => {
                write!(f, "proxy rejected tunnel: {}", String::from_utf8_lossy(raw))
            }
            ProxyError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::InvalidUrl(e) => Some(e),
            ProxyError::Dial(e) => Some(e),
            ProxyError::Socks(e) => Some(e),
            _ => None,
        }
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(e: url::ParseError) -> Self {
        ProxyError::InvalidUrl(e)
    }
}

impl From<io::Error> for ProxyError {
    fn from(e: io::Error) -> Self {
        ProxyError::Dial(e)
    }
}

impl From<tokio_socks::Error> for ProxyError {
    fn from(e: tokio_socks::Error) -> Self {
        ProxyError::Socks(e)
    }
}
