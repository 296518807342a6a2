use bytes::Bytes;

use crate::error::Result;

/// Default maximum information unit of a data link connection.
pub const DEFAULT_MIU: usize = 128;

/// Largest MIU a data link connection may announce.
pub const MAX_MIU: usize = 2175;

/// Well-known service name of the SNEP Default Server.
pub const SNEP_SERVICE_NAME: &str = "urn:nfc:sn:snep";

/// Well-known service access point reserved for the SNEP Default Server.
pub const SNEP_ADDRESS: u8 = 4;

/// Per-endpoint link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Largest PDU this endpoint is willing to receive.
    pub recv_miu: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recv_miu: DEFAULT_MIU,
        }
    }
}

impl LinkConfig {
    /// Configuration with an explicit receive MIU, clamped to the valid range.
    pub fn with_recv_miu(recv_miu: usize) -> Self {
        Self {
            recv_miu: recv_miu.clamp(1, MAX_MIU),
        }
    }
}

/// An established, reliable, ordered point-to-point connection that moves
/// whole PDUs.
///
/// Every `send` transmits exactly one PDU and every `recv` yields exactly one,
/// in order. Callers are responsible for keeping PDUs within `send_miu()`.
pub trait DataLink: Send {
    /// Transmit one PDU (blocking).
    fn send(&mut self, pdu: &[u8]) -> Result<()>;

    /// Receive the next PDU (blocking).
    ///
    /// Returns `Ok(None)` once the connection has been closed by either side.
    fn recv(&mut self) -> Result<Option<Bytes>>;

    /// Largest PDU the peer accepts.
    fn send_miu(&self) -> usize;

    /// Largest PDU this endpoint accepts.
    fn recv_miu(&self) -> usize;

    /// Close the connection. Further `recv` calls return `Ok(None)`.
    fn close(&mut self);
}

impl<T: DataLink + ?Sized> DataLink for &mut T {
    fn send(&mut self, pdu: &[u8]) -> Result<()> {
        (**self).send(pdu)
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        (**self).recv()
    }

    fn send_miu(&self) -> usize {
        (**self).send_miu()
    }

    fn recv_miu(&self) -> usize {
        (**self).recv_miu()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: DataLink + ?Sized> DataLink for Box<T> {
    fn send(&mut self, pdu: &[u8]) -> Result<()> {
        (**self).send(pdu)
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        (**self).recv()
    }

    fn send_miu(&self) -> usize {
        (**self).send_miu()
    }

    fn recv_miu(&self) -> usize {
        (**self).recv_miu()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// An accepted connection whose link setup has not run yet.
///
/// Setup may block on the peer, so it belongs on the thread that serves the
/// connection rather than on the accept loop.
pub trait PendingLink: Send + 'static {
    /// Link type produced once setup completes.
    type Link: DataLink + 'static;

    /// Complete link setup (blocking).
    fn establish(self) -> Result<Self::Link>;
}

/// A bound service that hands out one [`DataLink`] per incoming connection.
pub trait LinkListener: Send + Sync {
    /// Connection type produced by `accept`.
    type Pending: PendingLink;

    /// Accept the next connection (blocking).
    ///
    /// Returns `Err(LinkError::Shutdown)` after `close` has been called.
    /// Never waits on the connecting peer beyond the accept itself.
    fn accept(&self) -> Result<Self::Pending>;

    /// Stop accepting. Unblocks a pending `accept`.
    fn close(&self);

    /// Service name this listener is bound to.
    fn service_name(&self) -> &str;
}

/// Establishes outbound connections to named services.
pub trait Connector {
    /// Link type produced by `connect`.
    type Link: DataLink;

    /// Connect to the service bound under `service_name` (blocking).
    fn connect(&self, service_name: &str) -> Result<Self::Link>;
}
