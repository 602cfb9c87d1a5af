//! Key extraction: turning a request into the per-client decision key.
//!
//! The core never sees the host's concrete request type. It sees a
//! [`ClientRequest`] view and a [`KeyExtractor`] that produces the decision
//! key, or nothing, in which case the decision layer rejects the request.

use std::net::IpAddr;

/// The request surface the extractors need from the host.
pub trait ClientRequest {
    /// Value of the named header, if present.
    fn header(&self, name: &str) -> Option<&str>;

    /// Value of the named path or query parameter, if present.
    fn param(&self, name: &str) -> Option<&str>;

    /// Transport peer address of the request.
    fn peer_ip(&self) -> Option<IpAddr>;
}

/// Pure function from a request to a decision key.
///
/// `None` means "no key could be derived"; the decision layer answers 429.
pub trait KeyExtractor<R>: Send + Sync {
    fn extract(&self, req: &R) -> Option<String>;
}

impl<R, F> KeyExtractor<R> for F
where
    F: Fn(&R) -> Option<String> + Send + Sync,
{
    fn extract(&self, req: &R) -> Option<String> {
        self(req)
    }
}

/// Key extraction strategy named by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ip,
    Header,
    Param,
}

impl Strategy {
    /// Resolve a configured strategy name, case-insensitively.
    /// `None` means the per-client limiter must be disabled.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ip" => Some(Self::Ip),
            "header" => Some(Self::Header),
            "param" => Some(Self::Param),
            _ => None,
        }
    }

    /// Build the extractor for this strategy. `key` is the header or
    /// parameter name; for [`Strategy::Ip`] an empty `key` means plain
    /// transport-peer extraction.
    pub fn extractor<R: ClientRequest>(&self, key: &str) -> Box<dyn KeyExtractor<R>> {
        match self {
            Self::Ip if key.is_empty() => Box::new(IpExtractor::new()),
            Self::Ip => Box::new(IpExtractor::with_header(key)),
            Self::Header => Box::new(HeaderExtractor::new(key)),
            Self::Param => Box::new(ParamExtractor::new(key)),
        }
    }
}

/// Extracts the best-available client IP.
///
/// When a forwarded-for style header is configured, its first comma
/// element (port stripped) is preferred if it parses as an IP address;
/// otherwise the transport peer address is used.
#[derive(Debug, Clone, Default)]
pub struct IpExtractor {
    header: Option<String>,
}

impl IpExtractor {
    /// Plain transport-peer extraction.
    pub fn new() -> Self {
        Self { header: None }
    }

    /// Prefer the named header over the transport peer.
    pub fn with_header(name: impl Into<String>) -> Self {
        Self { header: Some(name.into()) }
    }
}

impl<R: ClientRequest> KeyExtractor<R> for IpExtractor {
    fn extract(&self, req: &R) -> Option<String> {
        if let Some(name) = &self.header {
            if let Some(raw) = req.header(name) {
                let first = raw.split(',').next().unwrap_or("").trim();
                if !first.is_empty() {
                    let ip = first.split(':').next().unwrap_or("");
                    if ip.parse::<IpAddr>().is_ok() {
                        return Some(ip.to_string());
                    }
                }
            }
        }
        req.peer_ip().map(|ip| ip.to_string())
    }
}

/// Extracts the verbatim value of a named header.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    name: String,
}

impl HeaderExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<R: ClientRequest> KeyExtractor<R> for HeaderExtractor {
    fn extract(&self, req: &R) -> Option<String> {
        req.header(&self.name).filter(|v| !v.is_empty()).map(str::to_string)
    }
}

/// Extracts the value of a named path or query parameter.
#[derive(Debug, Clone)]
pub struct ParamExtractor {
    name: String,
}

impl ParamExtractor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<R: ClientRequest> KeyExtractor<R> for ParamExtractor {
    fn extract(&self, req: &R) -> Option<String> {
        req.param(&self.name).filter(|v| !v.is_empty()).map(str::to_string)
    }
}
