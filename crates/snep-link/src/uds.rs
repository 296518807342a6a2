use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info};

use crate::error::{LinkError, Result};
use crate::traits::{Connector, DataLink, LinkConfig, LinkListener, PendingLink, MAX_MIU};

/// PDU length prefix: 2 bytes big-endian.
const LENGTH_PREFIX_SIZE: usize = 2;

/// Data link connection over a Unix domain socket stream.
///
/// Each PDU travels as a 2-byte big-endian length followed by the PDU bytes.
/// Right after the connection is established both sides send their receive
/// MIU as a 2-byte big-endian value.
pub struct UnixLink {
    stream: UnixStream,
    send_miu: usize,
    recv_miu: usize,
    buf: BytesMut,
    closed: bool,
}

impl UnixLink {
    /// Exchange MIUs over a freshly connected stream.
    pub fn establish(mut stream: UnixStream, config: LinkConfig) -> Result<Self> {
        let recv_miu = config.recv_miu.min(MAX_MIU);
        stream
            .write_all(&(recv_miu as u16).to_be_bytes())
            .map_err(closed_on_eof)?;

        let mut peer_miu = [0u8; LENGTH_PREFIX_SIZE];
        stream.read_exact(&mut peer_miu).map_err(closed_on_eof)?;
        let send_miu = usize::from(u16::from_be_bytes(peer_miu));

        debug!(send_miu, recv_miu, "unix link established");
        Ok(Self {
            stream,
            send_miu,
            recv_miu,
            buf: BytesMut::with_capacity(LENGTH_PREFIX_SIZE + send_miu),
            closed: false,
        })
    }
}

impl DataLink for UnixLink {
    fn send(&mut self, pdu: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        if pdu.len() > self.send_miu {
            return Err(LinkError::PduTooLarge {
                size: pdu.len(),
                miu: self.send_miu,
            });
        }

        self.buf.clear();
        self.buf.put_u16(pdu.len() as u16);
        self.buf.put_slice(pdu);

        match self.stream.write_all(&self.buf) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected
                ) =>
            {
                Err(LinkError::Closed)
            }
            Err(err) => Err(LinkError::Io(err)),
        }
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match self.stream.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(err) if is_disconnect(&err) => {
                self.closed = true;
                return Ok(None);
            }
            Err(err) => return Err(LinkError::Io(err)),
        }

        let len = usize::from(u16::from_be_bytes(prefix));
        if len > self.recv_miu {
            return Err(LinkError::PduTooLarge {
                size: len,
                miu: self.recv_miu,
            });
        }

        let mut pdu = vec![0u8; len];
        match self.stream.read_exact(&mut pdu) {
            Ok(()) => Ok(Some(Bytes::from(pdu))),
            Err(err) if is_disconnect(&err) => {
                self.closed = true;
                Ok(None)
            }
            Err(err) => Err(LinkError::Io(err)),
        }
    }

    fn send_miu(&self) -> usize {
        self.send_miu
    }

    fn recv_miu(&self) -> usize {
        self.recv_miu
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for UnixLink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UnixLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixLink")
            .field("send_miu", &self.send_miu)
            .field("recv_miu", &self.recv_miu)
            .field("closed", &self.closed)
            .finish()
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
    )
}

fn closed_on_eof(err: std::io::Error) -> LinkError {
    if is_disconnect(&err) {
        LinkError::Closed
    } else {
        LinkError::Io(err)
    }
}

/// Connection accepted by a [`UnixLinkListener`] before the MIU exchange.
pub struct PendingUnixLink {
    stream: UnixStream,
    config: LinkConfig,
}

impl PendingLink for PendingUnixLink {
    type Link = UnixLink;

    fn establish(self) -> Result<UnixLink> {
        UnixLink::establish(self.stream, self.config)
    }
}

impl std::fmt::Debug for PendingUnixLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUnixLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Socket path for a service name inside `dir`.
///
/// Characters outside `[A-Za-z0-9.-]` are replaced with `_`.
pub fn service_path(dir: impl AsRef<Path>, service_name: &str) -> PathBuf {
    let file_name: String = service_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.as_ref().join(format!("{file_name}.sock"))
}

/// Service bound to a Unix domain socket inside a service directory.
///
/// The socket file is removed on drop unless it has been replaced meanwhile.
pub struct UnixLinkListener {
    listener: UnixListener,
    path: PathBuf,
    service_name: String,
    config: LinkConfig,
    /// Device and inode of the socket file created by `bind`.
    socket_id: (u64, u64),
    shutdown: AtomicBool,
}

impl UnixLinkListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind `service_name` inside `dir`.
    ///
    /// A stale socket at the target path is removed first; any other existing
    /// file makes the bind fail.
    pub fn bind(dir: impl AsRef<Path>, service_name: &str, config: LinkConfig) -> Result<Self> {
        let path = service_path(dir, service_name);

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(LinkError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_error(&path))?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_error(&path))?;
            } else {
                return Err(LinkError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_error(&path))?;
        let mode = std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE);
        std::fs::set_permissions(&path, mode).map_err(bind_error(&path))?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_error(&path))?;

        info!(?path, service_name, recv_miu = config.recv_miu, "service bound");

        Ok(Self {
            listener,
            path,
            service_name: service_name.to_string(),
            config,
            socket_id: (created.dev(), created.ino()),
            shutdown: AtomicBool::new(false),
        })
    }

    /// The path this service is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LinkListener for UnixLinkListener {
    type Pending = PendingUnixLink;

    /// Accept the next stream. The MIU exchange is left to
    /// [`PendingLink::establish`].
    fn accept(&self) -> Result<PendingUnixLink> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(LinkError::Shutdown);
        }
        let (stream, _addr) = self.listener.accept().map_err(LinkError::Accept)?;
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(LinkError::Shutdown);
        }
        debug!(service_name = %self.service_name, "accepted connection");
        Ok(PendingUnixLink {
            stream,
            config: self.config,
        })
    }

    fn close(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            // Wake a blocked accept; it observes the flag and returns.
            let _ = UnixStream::connect(&self.path);
        }
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for UnixLinkListener {
    fn drop(&mut self) {
        let (dev, ino) = self.socket_id;
        let still_ours = std::fs::symlink_metadata(&self.path).is_ok_and(|metadata| {
            metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino
        });
        if still_ours {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path replaced or gone; leaving it");
        }
    }
}

fn bind_error(path: &Path) -> impl FnOnce(std::io::Error) -> LinkError + '_ {
    move |source| LinkError::Bind {
        path: path.to_path_buf(),
        source,
    }
}

/// Connects to services bound in a service directory.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    dir: PathBuf,
    config: LinkConfig,
}

impl UnixConnector {
    /// Connector for services bound inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: LinkConfig::default(),
        }
    }

    /// Override the client-side link configuration.
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }
}

impl Connector for UnixConnector {
    type Link = UnixLink;

    fn connect(&self, service_name: &str) -> Result<UnixLink> {
        let path = service_path(&self.dir, service_name);
        let stream = UnixStream::connect(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => LinkError::ConnectRefused {
                service_name: service_name.to_string(),
            },
            _ => LinkError::Connect {
                path: path.clone(),
                source: e,
            },
        })?;
        debug!(?path, service_name, "connected to unix domain socket");
        UnixLink::establish(stream, self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "snep-link-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn service_path_sanitizes_name() {
        let path = service_path("/tmp/svc", "urn:nfc:sn:snep");
        assert_eq!(path, PathBuf::from("/tmp/svc/urn_nfc_sn_snep.sock"));
    }

    #[test]
    fn connect_accept_exchange_and_miu() {
        let dir = unique_dir("exchange");
        let listener =
            UnixLinkListener::bind(&dir, "urn:nfc:sn:snep", LinkConfig::with_recv_miu(248))
                .unwrap();
        assert!(listener.path().exists());

        let connector = UnixConnector::new(&dir).with_config(LinkConfig::with_recv_miu(64));
        let client = thread::spawn(move || {
            let mut link = connector.connect("urn:nfc:sn:snep").unwrap();
            assert_eq!(link.send_miu(), 248);
            link.send(b"hello").unwrap();
            link.recv().unwrap().unwrap()
        });

        let mut server = listener.accept().unwrap().establish().unwrap();
        assert_eq!(server.send_miu(), 64);
        assert_eq!(server.recv().unwrap().unwrap().as_ref(), b"hello");
        server.send(b"world").unwrap();

        assert_eq!(client.join().unwrap().as_ref(), b"world");

        let path = listener.path().to_path_buf();
        drop(listener);
        assert!(!path.exists(), "socket file should be cleaned up on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_to_missing_service_refused() {
        let dir = unique_dir("refused");
        let err = UnixConnector::new(&dir)
            .connect("urn:nfc:sn:nobody")
            .unwrap_err();
        assert!(matches!(err, LinkError::ConnectRefused { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn pdu_above_send_miu_rejected() {
        let dir = unique_dir("miu");
        let listener =
            UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::with_recv_miu(8)).unwrap();
        let connector = UnixConnector::new(&dir);
        let client = thread::spawn(move || connector.connect("urn:nfc:sn:test").unwrap());
        let _server = listener.accept().unwrap().establish().unwrap();
        let mut link = client.join().unwrap();

        let err = link.send(b"more than eight").unwrap_err();
        assert!(matches!(err, LinkError::PduTooLarge { size: 15, miu: 8 }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn peer_close_reads_as_none() {
        let dir = unique_dir("close");
        let listener =
            UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::default()).unwrap();
        let connector = UnixConnector::new(&dir);
        let client = thread::spawn(move || {
            let mut link = connector.connect("urn:nfc:sn:test").unwrap();
            link.close();
        });

        let mut server = listener.accept().unwrap().establish().unwrap();
        client.join().unwrap();
        assert!(server.recv().unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn close_unblocks_accept() {
        let dir = unique_dir("shutdown");
        let listener = std::sync::Arc::new(
            UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::default()).unwrap(),
        );

        let acceptor = {
            let listener = std::sync::Arc::clone(&listener);
            thread::spawn(move || listener.accept())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        listener.close();

        assert!(matches!(acceptor.join().unwrap(), Err(LinkError::Shutdown)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accept_does_not_wait_for_miu_exchange() {
        let dir = unique_dir("silent");
        let listener =
            UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::default()).unwrap();

        let silent = UnixStream::connect(listener.path()).unwrap();
        let pending = listener.accept().unwrap();

        drop(silent);
        assert!(matches!(pending.establish(), Err(LinkError::Closed)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let dir = unique_dir("not-socket");
        std::fs::write(service_path(&dir, "urn:nfc:sn:test"), b"regular-file").unwrap();

        let result = UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::default());
        assert!(matches!(result, Err(LinkError::Bind { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long_rejected() {
        let dir = std::env::temp_dir().join("a".repeat(200));
        let result = UnixLinkListener::bind(&dir, "urn:nfc:sn:test", LinkConfig::default());
        assert!(matches!(result, Err(LinkError::PathTooLong { .. })));
    }
}
