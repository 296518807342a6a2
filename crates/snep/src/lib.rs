//! Simple NDEF Exchange Protocol (SNEP) over a connection-oriented data link.
//!
//! SNEP moves opaque NDEF messages between a client and a server with PUT
//! and GET requests, fragmenting anything larger than the link MIU.
//!
//! # Crate Structure
//!
//! - [`link`]: Data link seam and providers (in-process, Unix sockets)
//! - [`frame`]: Header codec, response codes, fragmentation and reassembly
//! - [`peer`]: Client and server engines (behind `peer` feature)

/// Re-export link types.
pub mod link {
    pub use snep_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use snep_frame::*;
}

/// Re-export client and server types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use snep_peer::*;
}
