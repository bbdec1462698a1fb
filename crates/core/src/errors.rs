use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolverErrorKind {
    Network,
    Timeout,
    Auth,
    InvalidRequest,
    ServerError,
    Decode,
}

impl ResolverErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::ServerError => "server_error",
            Self::Decode => "decode",
        }
    }
}

/// Failure of the intent resolver call (transport, auth, decode or timeout).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("intent resolver {}: {message}", .kind.as_str())]
pub struct ResolverError {
    pub kind: ResolverErrorKind,
    pub message: String,
}

impl ResolverError {
    pub fn new(kind: ResolverErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::InvalidRequest, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::ServerError, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ResolverErrorKind::Decode, message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorKind {
    Unavailable,
    Timeout,
    Decode,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
        }
    }
}

/// Failure of a knowledge-store read or write.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("knowledge store {}: {message}", .kind.as_str())]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Decode, message)
    }
}

/// Everything that can stop a message from getting its routed reply.
///
/// Under-specified and unrecognized intents are not errors; the router
/// answers them with the NLU default text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FulfillmentError {
    /// Stable label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolver(_) => "resolver",
            Self::Store(_) => "store",
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            Self::Resolver(error) => error.kind.as_str(),
            Self::Store(error) => error.kind.as_str(),
        }
    }
}
