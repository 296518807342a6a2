use snep_frame::{FrameError, ResponseCode};
use snep_link::LinkError;

/// Configuration rejected at server construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Only the Default Server may bind the well-known SNEP service name.
    #[error("service name {0} is reserved for the default server")]
    ReservedServiceName(String),

    /// The listener is bound to another name than the server identity.
    #[error("listener bound to {actual}, server identity expects {expected}")]
    ServiceMismatch { expected: String, actual: String },
}

/// Errors that can occur in client and server operations.
#[derive(Debug, thiserror::Error)]
pub enum SnepError {
    /// Link-level error.
    #[error("link error: {0}")]
    Link(LinkError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The server answered with a failure code.
    #[error("{}", .code.description())]
    Response { code: ResponseCode },

    /// The server rejected the first fragment of a request.
    #[error("request rejected by server")]
    Rejected,

    /// The response announced more octets than the client accepts.
    #[error("response of {declared} bytes exceeds acceptable length {acceptable}")]
    ResponseTooLarge { declared: u32, acceptable: usize },

    /// The link closed during an exchange.
    #[error("connection closed")]
    ConnectionClosed,

    /// The client has no open link.
    #[error("not connected")]
    NotConnected,

    /// The record codec failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The peer sent something the exchange does not allow.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl SnepError {
    /// Response code carried by this error, if the server sent one.
    pub fn code(&self) -> Option<ResponseCode> {
        match self {
            Self::Response { code } => Some(*code),
            Self::Rejected => Some(ResponseCode::Reject),
            _ => None,
        }
    }
}

impl From<LinkError> for SnepError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Closed => Self::ConnectionClosed,
            other => Self::Link(other),
        }
    }
}

impl From<FrameError> for SnepError {
    fn from(err: FrameError) -> Self {
        if err.is_closed() {
            return Self::ConnectionClosed;
        }
        match err {
            FrameError::Link(link) => link.into(),
            other => Self::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnepError>;
