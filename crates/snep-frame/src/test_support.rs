use std::collections::VecDeque;

use bytes::Bytes;
use snep_link::{DataLink, LinkError};

/// Records sent PDUs and replays scripted inbound ones.
pub(crate) struct StubLink {
    pub miu: usize,
    pub inbound: VecDeque<Bytes>,
    pub sent: Vec<Vec<u8>>,
}

impl StubLink {
    pub fn new(miu: usize, inbound: &[&[u8]]) -> Self {
        Self {
            miu,
            inbound: inbound
                .iter()
                .map(|pdu| Bytes::copy_from_slice(pdu))
                .collect(),
            sent: Vec::new(),
        }
    }
}

impl DataLink for StubLink {
    fn send(&mut self, pdu: &[u8]) -> snep_link::Result<()> {
        if pdu.len() > self.miu {
            return Err(LinkError::PduTooLarge {
                size: pdu.len(),
                miu: self.miu,
            });
        }
        self.sent.push(pdu.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> snep_link::Result<Option<Bytes>> {
        Ok(self.inbound.pop_front())
    }

    fn send_miu(&self) -> usize {
        self.miu
    }

    fn recv_miu(&self) -> usize {
        self.miu
    }

    fn close(&mut self) {}
}
