//! SNEP client and server engines.
//!
//! The client sends PUT and GET requests; the server accepts links, runs one
//! session per link and dispatches requests to a [`RequestHandler`]. Both
//! run over any [`snep_link::DataLink`] and block the calling thread.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod server;

#[cfg(test)]
mod test_support;

pub use client::SnepClient;
pub use config::{
    ClientConfig, ServerConfig, ServerIdentity, DEFAULT_CLIENT_ACCEPTABLE_LENGTH,
    DEFAULT_SERVER_ACCEPTABLE_LENGTH, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVICE_NAME,
    PRIVATE_SERVER_ACCEPTABLE_LENGTH,
};
pub use error::{ConfigError, Result, SnepError};
pub use handler::{
    DefaultHandler, HandlerError, HandlerResult, MessageCodec, RecordHandler, Records,
    RequestHandler, UNMAPPED_FAILURE_CODE,
};
pub use server::{serve_session, ServerHandle, SnepServer};
