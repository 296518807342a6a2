use bytes::BytesMut;
use snep_link::DataLink;
use tracing::{debug, trace};

use crate::code::Role;
use crate::codec::{encode_message, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;

/// Outcome of sending one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every fragment was sent.
    Complete {
        /// Number of link PDUs used.
        fragments: usize,
    },
    /// The peer answered the first fragment with something other than
    /// CONTINUE; nothing more was sent. Carries the peer's header.
    Refused(Header),
}

/// Sends SNEP messages over a [`DataLink`], fragmenting to the link's send MIU.
///
/// A message that fits one PDU is sent as is. A larger message is sent as a
/// first fragment followed by a wait for the peer's acknowledgement; on
/// CONTINUE the remaining bytes follow as header-less fragments.
pub struct MessageWriter {
    role: Role,
    buf: BytesMut,
}

impl MessageWriter {
    /// Create a writer for the given side of the exchange.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Side of the exchange this writer plays.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Encode and send a message (blocking).
    pub fn send<L: DataLink + ?Sized>(
        &mut self,
        link: &mut L,
        code: impl Into<u8>,
        info: &[u8],
    ) -> Result<Delivery> {
        let miu = link.send_miu();
        if miu < HEADER_SIZE {
            return Err(FrameError::MiuTooSmall { miu });
        }

        self.buf.clear();
        encode_message(code, info, &mut self.buf)?;

        if self.buf.len() <= miu {
            link.send(&self.buf)?;
            trace!(len = self.buf.len(), "sent single-frame message");
            return Ok(Delivery::Complete { fragments: 1 });
        }

        link.send(&self.buf[..miu])?;
        debug!(
            total = info.len(),
            miu,
            "sent first fragment, awaiting acknowledgement"
        );

        let ack = link.recv()?.ok_or(FrameError::ConnectionClosed)?;
        let header = Header::decode(&ack)?;
        if header.code != self.role.peer().continue_code() {
            debug!(code = header.code, "peer refused remaining fragments");
            return Ok(Delivery::Refused(header));
        }

        let mut fragments = 1usize;
        for chunk in self.buf[miu..].chunks(miu) {
            link.send(chunk)?;
            fragments += 1;
        }
        debug!(fragments, "sent remaining fragments");
        Ok(Delivery::Complete { fragments })
    }
}

impl std::fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter")
            .field("role", &self.role)
            .finish()
    }
}
