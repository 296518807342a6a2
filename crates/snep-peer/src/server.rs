use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use snep_frame::{
    Delivery, FrameError, Inbound, Message, MessageReader, MessageWriter, RequestCode,
    ResponseCode, Role,
};
use snep_link::{DataLink, LinkError, LinkListener, PendingLink};
use tracing::{debug, error, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::{ConfigError, Result, SnepError};
use crate::handler::{HandlerError, RequestHandler};

/// Length of the acceptable-length prefix of a GET information field.
const GET_PREFIX_LEN: usize = 4;

/// SNEP server bound to one listener.
///
/// Every accepted link is served on its own thread; sessions share the
/// handler and configuration and nothing else.
pub struct SnepServer<L: LinkListener, H: RequestHandler> {
    listener: Arc<L>,
    config: Arc<ServerConfig>,
    handler: Arc<H>,
}

impl<L, H> SnepServer<L, H>
where
    L: LinkListener + 'static,
    H: RequestHandler + 'static,
{
    /// Create a server for an already bound listener.
    ///
    /// Fails if a named identity claims the Default Server name or if the
    /// listener is bound to another service name than the identity.
    pub fn new(listener: L, config: ServerConfig, handler: H) -> Result<Self> {
        config.identity.validate()?;
        if listener.service_name() != config.service_name() {
            return Err(ConfigError::ServiceMismatch {
                expected: config.service_name().to_string(),
                actual: listener.service_name().to_string(),
            }
            .into());
        }

        Ok(Self {
            listener: Arc::new(listener),
            config: Arc::new(config),
            handler: Arc::new(handler),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Accept and serve connections until the listener is closed (blocking).
    pub fn run(&self) -> Result<()> {
        info!(
            service_name = self.config.service_name(),
            max_acceptable_length = self.config.max_acceptable_length,
            "snep server listening"
        );

        let mut next_session = 1u64;
        loop {
            let pending = match self.listener.accept() {
                Ok(pending) => pending,
                Err(LinkError::Shutdown) => {
                    info!(service_name = self.config.service_name(), "snep server stopped");
                    return Ok(());
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                    return Err(err.into());
                }
            };

            let session = next_session;
            next_session = next_session.wrapping_add(1);
            let config = Arc::clone(&self.config);
            let handler = Arc::clone(&self.handler);

            let spawned = thread::Builder::new()
                .name(format!("snep-session-{session}"))
                .spawn(move || {
                    let link = match pending.establish() {
                        Ok(link) => link,
                        Err(err) => {
                            warn!(session, error = %err, "link establishment failed");
                            return;
                        }
                    };
                    debug!(session, "session started");
                    match serve_session(link, &config, &*handler) {
                        Ok(()) => debug!(session, "session ended"),
                        Err(SnepError::ConnectionClosed) => {
                            debug!(session, "session closed mid-exchange");
                        }
                        Err(err) => warn!(session, error = %err, "session aborted"),
                    }
                });
            if let Err(err) = spawned {
                error!(session, error = %err, "failed to spawn session thread");
            }
        }
    }

    /// Run the accept loop on a background thread.
    pub fn start(self) -> Result<ServerHandle<L>> {
        let listener = Arc::clone(&self.listener);
        let service_name = self.config.service_name().to_string();
        let thread = thread::Builder::new()
            .name("snep-server".to_string())
            .spawn(move || self.run())
            .map_err(LinkError::Io)?;

        Ok(ServerHandle {
            listener,
            service_name,
            thread: Some(thread),
        })
    }
}

impl<L: LinkListener, H: RequestHandler> std::fmt::Debug for SnepServer<L, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnepServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to a server started with [`SnepServer::start`].
///
/// Dropping the handle stops the server.
pub struct ServerHandle<L: LinkListener> {
    listener: Arc<L>,
    service_name: String,
    thread: Option<JoinHandle<Result<()>>>,
}

impl<L: LinkListener> ServerHandle<L> {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Close the listener and wait for the accept loop to finish.
    ///
    /// Sessions already running continue until their links close.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.listener.close();
        match thread.join() {
            Ok(result) => result,
            Err(_) => {
                error!(service_name = %self.service_name, "accept thread panicked");
                Ok(())
            }
        }
    }
}

impl<L: LinkListener> Drop for ServerHandle<L> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "server stopped with error");
        }
    }
}

/// Serve one client link until it closes.
///
/// Returns `Ok(())` when the client closes between requests and an error
/// when the session had to be aborted. The link is closed on return.
pub fn serve_session<L, H>(mut link: L, config: &ServerConfig, handler: &H) -> Result<()>
where
    L: DataLink,
    H: RequestHandler + ?Sized,
{
    let result = session_loop(&mut link, config, handler);
    link.close();
    result
}

fn session_loop<L, H>(link: &mut L, config: &ServerConfig, handler: &H) -> Result<()>
where
    L: DataLink + ?Sized,
    H: RequestHandler + ?Sized,
{
    let mut reader = MessageReader::new(Role::Responder);
    let mut writer = MessageWriter::new(Role::Responder);

    loop {
        let inbound = match reader.read(link, config.max_acceptable_length) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => return Ok(()),
            Err(FrameError::UnsupportedVersion { major, minor }) => {
                warn!(major, minor, "unsupported protocol version");
                respond(link, &mut writer, ResponseCode::UnsupportedVersion, &[])?;
                continue;
            }
            Err(FrameError::LengthMismatch { declared, received }) => {
                warn!(declared, received, "request longer than declared");
                respond(link, &mut writer, ResponseCode::BadRequest, &[])?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let message = match inbound {
            Inbound::Message(message) => message,
            Inbound::Oversize { header, rejected } => {
                warn!(
                    declared = header.length,
                    limit = config.max_acceptable_length,
                    "request exceeds acceptable length"
                );
                if !rejected {
                    respond(link, &mut writer, ResponseCode::Reject, &[])?;
                }
                continue;
            }
        };

        let (code, info) = dispatch(message, handler);
        respond(link, &mut writer, code, &info)?;
    }
}

fn dispatch<H: RequestHandler + ?Sized>(message: Message, handler: &H) -> (ResponseCode, Bytes) {
    let info = message.info;
    match RequestCode::try_from(message.header.code) {
        Ok(RequestCode::Put) => {
            debug!(len = info.len(), "put request");
            match handler.put(info) {
                Ok(()) => (ResponseCode::Success, Bytes::new()),
                Err(err) => (failure_code(err), Bytes::new()),
            }
        }
        Ok(RequestCode::Get) if info.len() >= GET_PREFIX_LEN => {
            let acceptable_length =
                u32::from_be_bytes([info[0], info[1], info[2], info[3]]) as usize;
            let template = info.slice(GET_PREFIX_LEN..);
            debug!(len = template.len(), acceptable_length, "get request");
            match handler.get(template, acceptable_length) {
                Ok(reply) if reply.len() > acceptable_length => {
                    debug!(
                        len = reply.len(),
                        acceptable_length,
                        "get reply exceeds client limit"
                    );
                    (ResponseCode::ExcessData, Bytes::new())
                }
                Ok(reply) => (ResponseCode::Success, reply),
                Err(err) => (failure_code(err), Bytes::new()),
            }
        }
        _ => {
            debug!(code = message.header.code, len = info.len(), "malformed request");
            (ResponseCode::BadRequest, Bytes::new())
        }
    }
}

fn failure_code(err: HandlerError) -> ResponseCode {
    if let HandlerError::Failed(reason) = &err {
        error!(%reason, "handler failed");
    }
    err.response_code()
}

fn respond<L: DataLink + ?Sized>(
    link: &mut L,
    writer: &mut MessageWriter,
    code: ResponseCode,
    info: &[u8],
) -> Result<()> {
    match writer.send(link, code, info)? {
        Delivery::Complete { fragments } => {
            trace!(response = %code, len = info.len(), fragments, "response sent");
        }
        Delivery::Refused(header) => {
            debug!(code = header.code, "client refused remaining response fragments");
        }
    }
    Ok(())
}
