//! In-process exchange: a Default Server that remembers the last message
//! and a client that PUTs a message and GETs it back.
//!
//! Run with:
//!   cargo run --example store-exchange

use std::sync::Mutex;

use bytes::Bytes;
use snep::frame::ResponseCode;
use snep::link::{LinkConfig, LinkManager, SNEP_SERVICE_NAME};
use snep::peer::{HandlerError, HandlerResult, RequestHandler, ServerConfig, SnepClient, SnepServer};
use tracing::level_filters::LevelFilter;

/// Keeps the last PUT payload and returns it to any GET.
#[derive(Default)]
struct LastMessage {
    stored: Mutex<Option<Bytes>>,
}

impl RequestHandler for LastMessage {
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| HandlerError::Failed("lock poisoned".into()))?;
        *stored = Some(info);
        Ok(())
    }

    fn get(&self, _template: Bytes, _acceptable_length: usize) -> HandlerResult<Bytes> {
        self.stored
            .lock()
            .map_err(|_| HandlerError::Failed("lock poisoned".into()))?
            .clone()
            .ok_or(HandlerError::Response(ResponseCode::NotFound))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    let manager = LinkManager::new().with_client_config(LinkConfig::with_recv_miu(16));
    let listener = manager.bind(SNEP_SERVICE_NAME, LinkConfig::with_recv_miu(16))?;
    let server = SnepServer::new(listener, ServerConfig::default_server(), LastMessage::default())?
        .start()?;

    let mut client = SnepClient::new(manager.clone());
    client.connect(SNEP_SERVICE_NAME)?;

    // Short NDEF text record "Hello World" (en).
    let message = b"\xd1\x01\x0eT\x02enHello World";
    client.put(message)?;
    eprintln!("PUT {} bytes", message.len());

    let reply = client.get(b"\xd0\x00\x00", 1024)?;
    eprintln!("GET returned {} bytes: {:02x?}", reply.len(), reply.as_ref());

    match client.get(b"\xd0\x00\x00", 4) {
        Ok(_) => eprintln!("unexpected success"),
        Err(err) => eprintln!("GET with 4-byte limit failed: {err}"),
    }

    client.close();
    server.stop()?;
    Ok(())
}
