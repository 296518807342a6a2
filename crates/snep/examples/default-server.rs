//! Default Server on a Unix domain socket. Accepts PUTs up to 1024 bytes,
//! logs them and answers GET with NotImplemented.
//!
//! Run with:
//!   cargo run --example default-server [service-dir]
//!
//! Press Enter to stop.

use std::fs;
use std::io::BufRead;
use std::path::PathBuf;

use bytes::Bytes;
use snep::link::{LinkConfig, UnixLinkListener, SNEP_SERVICE_NAME};
use snep::peer::{HandlerResult, RequestHandler, ServerConfig, SnepServer};
use tracing::info;
use tracing::level_filters::LevelFilter;

struct LogPuts;

impl RequestHandler for LogPuts {
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        info!(len = info.len(), "received ndef message");
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::INFO)
        .with_ansi(false)
        .with_target(false)
        .try_init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(format!("snep-{}", std::process::id())));
    fs::create_dir_all(&dir)?;

    let listener = UnixLinkListener::bind(&dir, SNEP_SERVICE_NAME, LinkConfig::with_recv_miu(248))?;
    eprintln!("Default Server listening on {}", listener.path().display());

    let server = SnepServer::new(listener, ServerConfig::default_server(), LogPuts)?.start()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    server.stop()?;
    Ok(())
}
