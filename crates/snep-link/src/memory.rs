//! In-process data link provider.
//!
//! [`LinkManager`] plays the role of the logical link controller: services
//! bind under a name, clients connect by name, and each connection is a pair
//! of [`MemoryLink`] endpoints joined by channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::traits::{
    Connector, DataLink, LinkConfig, LinkListener, PendingLink, SNEP_ADDRESS, SNEP_SERVICE_NAME,
};

/// First service access point handed out to services without a well-known address.
const FIRST_DYNAMIC_ADDRESS: u8 = 16;
/// Last service access point handed out to services without a well-known address.
const LAST_DYNAMIC_ADDRESS: u8 = 31;

/// One endpoint of an in-process connection.
pub struct MemoryLink {
    tx: Option<Sender<Bytes>>,
    rx: Receiver<Bytes>,
    send_miu: usize,
    recv_miu: usize,
    closed: bool,
}

impl MemoryLink {
    /// Create a connected pair. Each side's send MIU is the other side's receive MIU.
    pub fn pair(left: LinkConfig, right: LinkConfig) -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel();
        let (right_tx, left_rx) = mpsc::channel();
        let left_link = Self {
            tx: Some(left_tx),
            rx: left_rx,
            send_miu: right.recv_miu,
            recv_miu: left.recv_miu,
            closed: false,
        };
        let right_link = Self {
            tx: Some(right_tx),
            rx: right_rx,
            send_miu: left.recv_miu,
            recv_miu: right.recv_miu,
            closed: false,
        };
        (left_link, right_link)
    }
}

impl DataLink for MemoryLink {
    fn send(&mut self, pdu: &[u8]) -> Result<()> {
        if pdu.len() > self.send_miu {
            return Err(LinkError::PduTooLarge {
                size: pdu.len(),
                miu: self.send_miu,
            });
        }
        let tx = self.tx.as_ref().ok_or(LinkError::Closed)?;
        tx.send(Bytes::copy_from_slice(pdu))
            .map_err(|_| LinkError::Closed)
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(pdu) => Ok(Some(pdu)),
            Err(_) => {
                self.closed = true;
                Ok(None)
            }
        }
    }

    fn send_miu(&self) -> usize {
        self.send_miu
    }

    fn recv_miu(&self) -> usize {
        self.recv_miu
    }

    fn close(&mut self) {
        self.closed = true;
        self.tx = None;
    }
}

/// In-process links need no setup beyond the channel pair.
impl PendingLink for MemoryLink {
    type Link = MemoryLink;

    fn establish(self) -> Result<MemoryLink> {
        Ok(self)
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("send_miu", &self.send_miu)
            .field("recv_miu", &self.recv_miu)
            .field("closed", &self.closed)
            .finish()
    }
}

struct ServiceEntry {
    address: u8,
    config: LinkConfig,
    incoming: Sender<MemoryLink>,
}

#[derive(Default)]
struct Registry {
    services: HashMap<String, ServiceEntry>,
}

impl Registry {
    fn allocate_address(&self, service_name: &str) -> Result<u8> {
        if service_name == SNEP_SERVICE_NAME {
            return Ok(SNEP_ADDRESS);
        }
        (FIRST_DYNAMIC_ADDRESS..=LAST_DYNAMIC_ADDRESS)
            .find(|candidate| {
                !self
                    .services
                    .values()
                    .any(|entry| entry.address == *candidate)
            })
            .ok_or_else(|| LinkError::AddressExhausted(service_name.to_string()))
    }
}

/// In-process registry of bound services.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct LinkManager {
    registry: Arc<Mutex<Registry>>,
    client_config: LinkConfig,
}

impl LinkManager {
    /// Create an empty registry using the default client link configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the link configuration used for outbound connections.
    pub fn with_client_config(mut self, config: LinkConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Bind a service name and start accepting connections for it.
    pub fn bind(&self, service_name: &str, config: LinkConfig) -> Result<MemoryListener> {
        let (incoming_tx, incoming_rx) = mpsc::channel();
        let mut registry = self.lock();
        if registry.services.contains_key(service_name) {
            return Err(LinkError::ServiceInUse(service_name.to_string()));
        }
        let address = registry.allocate_address(service_name)?;
        registry.services.insert(
            service_name.to_string(),
            ServiceEntry {
                address,
                config,
                incoming: incoming_tx,
            },
        );
        drop(registry);

        info!(
            service_name,
            address,
            recv_miu = config.recv_miu,
            "service bound"
        );

        Ok(MemoryListener {
            manager: self.clone(),
            service_name: service_name.to_string(),
            address,
            incoming: Mutex::new(incoming_rx),
            closed: AtomicBool::new(false),
        })
    }

    /// Connect to a bound service with an explicit client link configuration.
    pub fn connect_with_config(
        &self,
        service_name: &str,
        config: LinkConfig,
    ) -> Result<MemoryLink> {
        let registry = self.lock();
        let entry = registry
            .services
            .get(service_name)
            .ok_or_else(|| LinkError::ConnectRefused {
                service_name: service_name.to_string(),
            })?;

        let (client, server) = MemoryLink::pair(config, entry.config);
        entry
            .incoming
            .send(server)
            .map_err(|_| LinkError::ConnectRefused {
                service_name: service_name.to_string(),
            })?;
        debug!(service_name, address = entry.address, "connected");
        Ok(client)
    }

    /// Service access point bound to `service_name`, if any.
    pub fn resolve(&self, service_name: &str) -> Option<u8> {
        self.lock()
            .services
            .get(service_name)
            .map(|entry| entry.address)
    }

    fn unbind(&self, service_name: &str, address: u8) {
        let mut registry = self.lock();
        let owned = registry
            .services
            .get(service_name)
            .is_some_and(|entry| entry.address == address);
        if owned {
            registry.services.remove(service_name);
            debug!(service_name, address, "service unbound");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Registry updates cannot panic half-way; a poisoned registry is still consistent.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connector for LinkManager {
    type Link = MemoryLink;

    fn connect(&self, service_name: &str) -> Result<MemoryLink> {
        self.connect_with_config(service_name, self.client_config)
    }
}

/// A service bound in a [`LinkManager`].
pub struct MemoryListener {
    manager: LinkManager,
    service_name: String,
    address: u8,
    incoming: Mutex<Receiver<MemoryLink>>,
    closed: AtomicBool,
}

impl MemoryListener {
    /// Service access point assigned to this listener.
    pub fn address(&self) -> u8 {
        self.address
    }
}

impl LinkListener for MemoryListener {
    type Pending = MemoryLink;

    fn accept(&self) -> Result<MemoryLink> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Shutdown);
        }
        let incoming = self
            .incoming
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let link = incoming.recv().map_err(|_| LinkError::Shutdown)?;
        debug!(service_name = %self.service_name, "accepted connection");
        Ok(link)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.manager.unbind(&self.service_name, self.address);
        }
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn pair_delivers_pdus_in_order() {
        let (mut left, mut right) = MemoryLink::pair(LinkConfig::default(), LinkConfig::default());

        left.send(b"one").unwrap();
        left.send(b"two").unwrap();

        assert_eq!(right.recv().unwrap().unwrap().as_ref(), b"one");
        assert_eq!(right.recv().unwrap().unwrap().as_ref(), b"two");
    }

    #[test]
    fn pair_miu_is_peer_receive_miu() {
        let (left, right) =
            MemoryLink::pair(LinkConfig::with_recv_miu(248), LinkConfig::with_recv_miu(16));

        assert_eq!(left.send_miu(), 16);
        assert_eq!(left.recv_miu(), 248);
        assert_eq!(right.send_miu(), 248);
        assert_eq!(right.recv_miu(), 16);
    }

    #[test]
    fn send_rejects_pdu_above_miu() {
        let (mut left, _right) =
            MemoryLink::pair(LinkConfig::default(), LinkConfig::with_recv_miu(4));

        let err = left.send(b"too long").unwrap_err();
        assert!(matches!(err, LinkError::PduTooLarge { size: 8, miu: 4 }));
    }

    #[test]
    fn peer_drop_reads_as_closed() {
        let (mut left, right) = MemoryLink::pair(LinkConfig::default(), LinkConfig::default());
        drop(right);

        assert!(left.recv().unwrap().is_none());
        assert!(matches!(left.send(b"x"), Err(LinkError::Closed)));
    }

    #[test]
    fn peer_close_unblocks_pending_recv() {
        let (mut left, mut right) = MemoryLink::pair(LinkConfig::default(), LinkConfig::default());

        let reader = thread::spawn(move || left.recv().unwrap());
        right.close();
        drop(right);

        assert!(reader.join().unwrap().is_none());
    }

    #[test]
    fn default_server_name_gets_reserved_address() {
        let manager = LinkManager::new();
        let snep = manager
            .bind(SNEP_SERVICE_NAME, LinkConfig::default())
            .unwrap();
        let private = manager
            .bind("urn:nfc:xsn:example.org:snep", LinkConfig::default())
            .unwrap();

        assert_eq!(snep.address(), SNEP_ADDRESS);
        assert_eq!(private.address(), FIRST_DYNAMIC_ADDRESS);
        assert_eq!(manager.resolve(SNEP_SERVICE_NAME), Some(SNEP_ADDRESS));
    }

    #[test]
    fn duplicate_bind_rejected() {
        let manager = LinkManager::new();
        let _first = manager.bind("urn:nfc:sn:test", LinkConfig::default()).unwrap();

        let err = manager
            .bind("urn:nfc:sn:test", LinkConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LinkError::ServiceInUse(_)));
    }

    #[test]
    fn connect_unknown_service_refused() {
        let manager = LinkManager::new();
        let err = manager.connect("urn:nfc:sn:nobody").unwrap_err();
        assert!(matches!(err, LinkError::ConnectRefused { .. }));
    }

    #[test]
    fn connect_and_accept_exchange_pdus() {
        let manager = LinkManager::new();
        let listener = manager
            .bind(SNEP_SERVICE_NAME, LinkConfig::with_recv_miu(1984))
            .unwrap();

        let mut client = manager.connect(SNEP_SERVICE_NAME).unwrap();
        let mut server = listener.accept().unwrap();

        assert_eq!(client.send_miu(), 1984);
        assert_eq!(server.send_miu(), LinkConfig::default().recv_miu);

        client.send(b"ping").unwrap();
        assert_eq!(server.recv().unwrap().unwrap().as_ref(), b"ping");
        server.send(b"pong").unwrap();
        assert_eq!(client.recv().unwrap().unwrap().as_ref(), b"pong");
    }

    #[test]
    fn close_unblocks_accept_and_unbinds() {
        let manager = LinkManager::new();
        let listener = Arc::new(manager.bind("urn:nfc:sn:test", LinkConfig::default()).unwrap());

        let acceptor = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.accept())
        };
        listener.close();

        assert!(matches!(
            acceptor.join().unwrap(),
            Err(LinkError::Shutdown)
        ));
        assert!(manager.resolve("urn:nfc:sn:test").is_none());
        assert!(matches!(
            manager.connect("urn:nfc:sn:test"),
            Err(LinkError::ConnectRefused { .. })
        ));
    }
}
