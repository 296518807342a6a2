use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: version (1) + code (1) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Highest major version understood.
pub const VERSION_MAJOR: u8 = 1;

/// Minor version sent in every header.
pub const VERSION_MINOR: u8 = 0;

/// Protocol version carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// The version this implementation sends.
    pub const CURRENT: Version = Version {
        major: VERSION_MAJOR,
        minor: VERSION_MINOR,
    };

    /// Split a version byte into major (high nibble) and minor (low nibble).
    pub fn from_byte(byte: u8) -> Self {
        Self {
            major: byte >> 4,
            minor: byte & 0x0F,
        }
    }

    /// Pack into a version byte.
    pub fn to_byte(self) -> u8 {
        (self.major << 4) | (self.minor & 0x0F)
    }

    /// Any minor revision of a known major version is accepted.
    pub fn is_supported(self) -> bool {
        self.major <= VERSION_MAJOR
    }
}

/// Header of the first frame of a SNEP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version.
    pub version: Version,
    /// Request opcode or response code.
    pub code: u8,
    /// Total information field length of the whole message.
    pub length: u32,
}

impl Header {
    /// Header with the current version.
    pub fn new(code: impl Into<u8>, length: u32) -> Self {
        Self {
            version: Version::CURRENT,
            code: code.into(),
            length,
        }
    }

    /// Append the 6-byte wire form to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(self.version.to_byte());
        dst.put_u8(self.code);
        dst.put_u32(self.length);
    }

    /// Parse a header from the start of `src`.
    ///
    /// Fails with [`FrameError::Truncated`] on fewer than six bytes and with
    /// [`FrameError::UnsupportedVersion`] on an unknown major version.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(FrameError::Truncated { len: src.len() });
        }

        let version = Version::from_byte(src[0]);
        if !version.is_supported() {
            return Err(FrameError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
            });
        }

        Ok(Self {
            version,
            code: src[1],
            length: u32::from_be_bytes([src[2], src[3], src[4], src[5]]),
        })
    }
}

/// The first frame of a message: header plus the information bytes it carries.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    /// Information bytes contained in this frame (possibly only a prefix).
    pub info: Bytes,
}

impl Frame {
    /// Returns true when this frame holds the whole information field.
    pub fn is_complete(&self) -> bool {
        self.info.len() >= self.header.length as usize
    }
}

/// Decode the first frame of a message from one PDU.
pub fn decode_frame(mut pdu: Bytes) -> Result<Frame> {
    let header = Header::decode(&pdu)?;
    let info = pdu.split_off(HEADER_SIZE);
    Ok(Frame { header, info })
}

/// Encode a complete, unfragmented message into `dst`.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────────┬──────────────┬─────────────────────┐
/// │ Version │ Code     │ Length       │ Information         │
/// │ (1B)    │ (1B)     │ (4B BE)      │ (Length bytes)      │
/// └─────────┴──────────┴──────────────┴─────────────────────┘
/// ```
pub fn encode_message(code: impl Into<u8>, info: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length =
        u32::try_from(info.len()).map_err(|_| FrameError::MessageTooLarge { size: info.len() })?;
    dst.reserve(HEADER_SIZE + info.len());
    Header::new(code, length).encode_into(dst);
    dst.put_slice(info);
    Ok(())
}

/// A header-only frame used to acknowledge a first fragment or to answer
/// with an empty information field.
pub fn empty_frame(code: impl Into<u8>) -> [u8; HEADER_SIZE] {
    let mut frame = [0u8; HEADER_SIZE];
    frame[0] = Version::CURRENT.to_byte();
    frame[1] = code.into();
    frame
}
