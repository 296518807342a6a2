//! Request opcodes and response codes.
//!
//! Requests use `0x00..=0x7F`, responses use `0x80..=0xFF`. Both directions
//! define their own CONTINUE and REJECT codes for the fragmentation handshake.

use std::fmt;

/// Request field values sent by a SNEP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestCode {
    /// Send remaining fragments.
    Continue = 0x00,
    /// Return an NDEF message.
    Get = 0x01,
    /// Accept an NDEF message.
    Put = 0x02,
    /// Do not send remaining fragments.
    Reject = 0x7F,
}

impl RequestCode {
    /// Human-readable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Reject => "REJECT",
        }
    }
}

impl TryFrom<u8> for RequestCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(Self::Continue),
            0x01 => Ok(Self::Get),
            0x02 => Ok(Self::Put),
            0x7F => Ok(Self::Reject),
            other => Err(other),
        }
    }
}

impl From<RequestCode> for u8 {
    fn from(code: RequestCode) -> u8 {
        code as u8
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), *self as u8)
    }
}

/// Response field values sent by a SNEP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    /// Continue sending remaining fragments.
    Continue = 0x80,
    /// Operation succeeded.
    Success = 0x81,
    /// Resource not found.
    NotFound = 0xC0,
    /// Resource exceeds data size limit.
    ExcessData = 0xC1,
    /// Malformed request not understood.
    BadRequest = 0xC2,
    /// Unsupported functionality requested.
    NotImplemented = 0xE0,
    /// Unsupported protocol version.
    UnsupportedVersion = 0xE1,
    /// Do not send remaining fragments.
    Reject = 0xFF,
}

impl ResponseCode {
    /// Fixed description matched to the code.
    pub fn description(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Success => "success",
            Self::NotFound => "resource not found",
            Self::ExcessData => "resource exceeds data size limit",
            Self::BadRequest => "malformed request not understood",
            Self::NotImplemented => "unsupported functionality requested",
            Self::UnsupportedVersion => "unsupported protocol version",
            Self::Reject => "request rejected",
        }
    }

    /// Returns true for codes that report a failed request.
    pub fn is_error(self) -> bool {
        !matches!(self, Self::Continue | Self::Success)
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x80 => Ok(Self::Continue),
            0x81 => Ok(Self::Success),
            0xC0 => Ok(Self::NotFound),
            0xC1 => Ok(Self::ExcessData),
            0xC2 => Ok(Self::BadRequest),
            0xE0 => Ok(Self::NotImplemented),
            0xE1 => Ok(Self::UnsupportedVersion),
            0xFF => Ok(Self::Reject),
            other => Err(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> u8 {
        code as u8
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), *self as u8)
    }
}

/// Which end of an exchange an engine plays.
///
/// The role decides which CONTINUE/REJECT codes the engine sends while
/// reassembling and which one it expects while fragmenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends requests, receives responses (client).
    Requester,
    /// Receives requests, sends responses (server).
    Responder,
}

impl Role {
    /// The opposite end of the exchange.
    pub fn peer(self) -> Self {
        match self {
            Self::Requester => Self::Responder,
            Self::Responder => Self::Requester,
        }
    }

    /// CONTINUE code this role sends.
    pub fn continue_code(self) -> u8 {
        match self {
            Self::Requester => RequestCode::Continue.into(),
            Self::Responder => ResponseCode::Continue.into(),
        }
    }

    /// REJECT code this role sends.
    pub fn reject_code(self) -> u8 {
        match self {
            Self::Requester => RequestCode::Reject.into(),
            Self::Responder => ResponseCode::Reject.into(),
        }
    }
}
