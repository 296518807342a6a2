use snep_link::LinkError;

/// Errors that can occur while encoding, decoding, fragmenting or
/// reassembling SNEP messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer than six bytes where a header was expected.
    #[error("frame too short for header ({len} bytes, need 6)")]
    Truncated { len: usize },

    /// The header carries a major version this implementation does not speak.
    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The information field does not fit the 32-bit length field.
    #[error("information field too large ({size} bytes)")]
    MessageTooLarge { size: usize },

    /// More information bytes arrived than the header declared.
    #[error("length mismatch (declared {declared} bytes, received {received})")]
    LengthMismatch { declared: u32, received: usize },

    /// The link MIU cannot carry a frame header.
    #[error("link miu {miu} cannot carry a 6-byte header")]
    MiuTooSmall { miu: usize },

    /// The connection closed in the middle of a message.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// Link-level error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl FrameError {
    /// Returns true when the error means the link is gone.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Link(LinkError::Closed))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
