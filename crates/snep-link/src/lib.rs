//! Data link connection seam for SNEP.
//!
//! SNEP runs on a reliable, ordered, connection-oriented link that moves whole
//! PDUs bounded by a maximum information unit (MIU). This crate defines that
//! seam and ships two providers:
//! - [`memory`]: in-process links joined by channels, bound by service name
//! - [`uds`]: Unix domain sockets inside a service directory (Unix only)
//!
//! This is the lowest layer of the SNEP stack. Everything else builds on the
//! [`DataLink`] trait defined here.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{LinkError, Result};
pub use memory::{LinkManager, MemoryLink, MemoryListener};
pub use traits::{
    Connector, DataLink, LinkConfig, LinkListener, PendingLink, DEFAULT_MIU, MAX_MIU,
    SNEP_ADDRESS, SNEP_SERVICE_NAME,
};

#[cfg(unix)]
pub use uds::{service_path, PendingUnixLink, UnixConnector, UnixLink, UnixLinkListener};
