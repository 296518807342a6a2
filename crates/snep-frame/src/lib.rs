//! SNEP message framing with fragmentation and reassembly.
//!
//! Every message starts with a 6-byte header:
//! - A version byte (major in the high nibble, minor in the low nibble)
//! - A request or response code
//! - A 4-byte big-endian length of the whole information field
//!
//! Messages larger than the link MIU are split: the first fragment carries
//! the header, the receiver answers CONTINUE or REJECT, and the remaining
//! bytes follow as header-less fragments.

pub mod code;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use code::{RequestCode, ResponseCode, Role};
pub use codec::{
    decode_frame, empty_frame, encode_message, Frame, Header, Version, HEADER_SIZE, VERSION_MAJOR,
    VERSION_MINOR,
};
pub use error::{FrameError, Result};
pub use reader::{Inbound, Message, MessageReader};
pub use writer::{Delivery, MessageWriter};
