use bytes::{Bytes, BytesMut};
use snep_link::DataLink;
use tracing::{debug, trace, warn};

use crate::code::Role;
use crate::codec::{decode_frame, empty_frame, Header};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;

/// A fully reassembled SNEP message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Header of the first frame.
    pub header: Header,
    /// Complete information field (`header.length` bytes).
    pub info: Bytes,
}

/// Result of reading one message from a link.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// The message arrived in full.
    Message(Message),
    /// The declared length exceeded what the caller accepts.
    ///
    /// When the first frame was incomplete the reader has already answered
    /// with REJECT (`rejected == true`). A complete oversize frame gets no
    /// acknowledgement; the caller decides how to answer it.
    Oversize { header: Header, rejected: bool },
}

/// Receives SNEP messages from a [`DataLink`], reassembling fragments.
///
/// After an incomplete first frame the reader answers with its role's
/// CONTINUE code, then collects header-less fragments until the declared
/// length is reached.
pub struct MessageReader {
    role: Role,
    buf: BytesMut,
}

impl MessageReader {
    /// Create a reader for the given side of the exchange.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Side of the exchange this reader plays.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Read the next message (blocking).
    ///
    /// Returns `Ok(None)` if the link closed before a first frame arrived.
    /// A close in the middle of a message is [`FrameError::ConnectionClosed`].
    pub fn read<L: DataLink + ?Sized>(
        &mut self,
        link: &mut L,
        acceptable_length: usize,
    ) -> Result<Option<Inbound>> {
        let Some(pdu) = link.recv()? else {
            trace!("link closed before first frame");
            return Ok(None);
        };

        let frame = decode_frame(pdu)?;
        let header = frame.header;
        let declared = header.length as usize;

        if declared > acceptable_length {
            let rejected = !frame.is_complete();
            if rejected {
                link.send(&empty_frame(self.role.reject_code()))?;
            }
            debug!(declared, acceptable_length, rejected, "message exceeds acceptable length");
            return Ok(Some(Inbound::Oversize { header, rejected }));
        }

        if frame.info.len() > declared {
            return Err(FrameError::LengthMismatch {
                declared: header.length,
                received: frame.info.len(),
            });
        }

        if frame.is_complete() {
            trace!(len = declared, code = header.code, "received single-frame message");
            return Ok(Some(Inbound::Message(Message {
                header,
                info: frame.info,
            })));
        }

        link.send(&empty_frame(self.role.continue_code()))?;

        self.buf.clear();
        self.buf.reserve(declared);
        self.buf.extend_from_slice(&frame.info);
        let mut fragments = 1usize;

        while self.buf.len() < declared {
            let Some(fragment) = link.recv()? else {
                warn!(
                    received = self.buf.len(),
                    declared, "link closed during reassembly"
                );
                return Err(FrameError::ConnectionClosed);
            };
            self.buf.extend_from_slice(&fragment);
            fragments += 1;
        }

        if self.buf.len() > declared {
            return Err(FrameError::LengthMismatch {
                declared: header.length,
                received: self.buf.len(),
            });
        }

        debug!(len = declared, fragments, "reassembled fragmented message");
        Ok(Some(Inbound::Message(Message {
            header,
            info: self.buf.split().freeze(),
        })))
    }
}

impl std::fmt::Debug for MessageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReader")
            .field("role", &self.role)
            .finish()
    }
}
