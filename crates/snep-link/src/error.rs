use std::path::PathBuf;

/// Errors that can occur in data link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No service is bound under the requested name.
    #[error("connection refused: no service bound to '{service_name}'")]
    ConnectRefused { service_name: String },

    /// The service name is already bound by another listener.
    #[error("service name '{0}' is already in use")]
    ServiceInUse(String),

    /// No free service access point is left for a new binding.
    #[error("no free service access point for '{0}'")]
    AddressExhausted(String),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A PDU exceeds the maximum information unit of the link direction.
    #[error("pdu too large ({size} bytes, miu {miu})")]
    PduTooLarge { size: usize, miu: usize },

    /// The connection was closed by either side.
    #[error("link closed")]
    Closed,

    /// The listener has been shut down.
    #[error("listener shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, LinkError>;
