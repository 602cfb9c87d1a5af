//! Error types for the rate-limiting subsystem.

use std::fmt;

/// The fixed reason string attached to every rejection.
pub const LIMIT_EXCEEDED: &str = "rate limit exceeded";

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exceeded {
    /// The endpoint-wide bucket ran dry.
    Global,
    /// The per-client bucket for the extracted key ran dry.
    Client,
    /// The key extractor produced no key for the request.
    MissingKey,
}

impl Exceeded {
    /// HTTP status the host should answer with: 503 for a global breach,
    /// 429 for per-client breaches and missing keys.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Global => 503,
            Self::Client | Self::MissingKey => 429,
        }
    }

    pub fn reason(&self) -> &'static str {
        LIMIT_EXCEEDED
    }
}

impl fmt::Display for Exceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LIMIT_EXCEEDED}")
    }
}

impl std::error::Error for Exceeded {}

/// Outcome of reading a rate-limit section from an extra-config bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The namespace is absent. Callers treat this as "limiting disabled"
    /// and stay quiet about it.
    NoExtraConfig,
    /// The namespace is present but is not a map. Callers log this and
    /// degrade to "limiting disabled".
    WrongExtraConfig,
}

impl ConfigError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NoExtraConfig)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::WrongExtraConfig)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoExtraConfig => write!(f, "no extra config"),
            Self::WrongExtraConfig => write!(f, "wrong extra config"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error surfaced by the tower middleware.
#[derive(Debug, Clone)]
pub enum GateError<E> {
    /// The request was rejected by the rate limiter before reaching the
    /// inner service.
    Limited(Exceeded),
    /// The inner service failed.
    Inner(E),
}

impl<E> GateError<E> {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited(_))
    }

    /// Rejection details, if this error is a rate-limit rejection.
    pub fn limited(&self) -> Option<Exceeded> {
        match self {
            Self::Limited(e) => Some(*e),
            Self::Inner(_) => None,
        }
    }

    /// Consume the error, returning the inner service error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Limited(_) => None,
        }
    }

    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Limited(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(e) => {
                let status = e.status_code();
                write!(f, "{e} ({status})")
            }
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Limited(_) => None,
        }
    }
}
