use bytes::{BufMut, Bytes, BytesMut};
use snep_frame::{
    Delivery, Header, Inbound, MessageReader, MessageWriter, RequestCode, ResponseCode, Role,
};
use snep_link::{Connector, DataLink};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, SnepError};
use crate::handler::MessageCodec;

/// SNEP client.
///
/// Sends PUT and GET requests over one link at a time. Operations on a
/// client that is not connected open a link to the configured default
/// service for the duration of that call only.
pub struct SnepClient<C: Connector> {
    connector: C,
    config: ClientConfig,
    link: Option<C::Link>,
    writer: MessageWriter,
    reader: MessageReader,
}

impl<C: Connector> SnepClient<C> {
    /// Create an unconnected client with default configuration.
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, ClientConfig::default())
    }

    /// Create an unconnected client.
    pub fn with_config(connector: C, config: ClientConfig) -> Self {
        Self {
            connector,
            config,
            link: None,
            writer: MessageWriter::new(Role::Requester),
            reader: MessageReader::new(Role::Requester),
        }
    }

    /// Connect to the server bound under `service_name`.
    ///
    /// An existing link is closed first.
    pub fn connect(&mut self, service_name: &str) -> Result<()> {
        self.close();
        let link = self.connector.connect(service_name)?;
        info!(service_name, send_miu = link.send_miu(), "connected to snep server");
        self.link = Some(link);
        Ok(())
    }

    /// Connect to the configured default service (normally the Default Server).
    pub fn connect_default(&mut self) -> Result<()> {
        let service_name = self.config.default_service_name.clone();
        self.connect(&service_name)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Release the link. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
            debug!("client link closed");
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `octets` with a PUT request.
    pub fn put(&mut self, octets: &[u8]) -> Result<()> {
        let acceptable_length = self.config.acceptable_length;
        self.exchange(RequestCode::Put, octets, acceptable_length)?;
        Ok(())
    }

    /// Request the data matching `octets`, accepting at most
    /// `acceptable_length` bytes in the response.
    pub fn get(&mut self, octets: &[u8], acceptable_length: usize) -> Result<Bytes> {
        let declared = u32::try_from(acceptable_length).unwrap_or(u32::MAX);
        let mut info = BytesMut::with_capacity(4 + octets.len());
        info.put_u32(declared);
        info.put_slice(octets);
        self.exchange(RequestCode::Get, &info, declared as usize)
    }

    /// Encode `records` with `codec` and PUT them.
    pub fn put_records<M: MessageCodec>(&mut self, codec: &M, records: &[M::Record]) -> Result<()> {
        let octets = codec
            .encode(records)
            .map_err(|err| SnepError::Codec(err.to_string()))?;
        self.put(&octets)
    }

    /// GET with an encoded record template and decode the response.
    pub fn get_records<M: MessageCodec>(
        &mut self,
        codec: &M,
        records: &[M::Record],
        acceptable_length: usize,
    ) -> Result<Vec<M::Record>> {
        let octets = codec
            .encode(records)
            .map_err(|err| SnepError::Codec(err.to_string()))?;
        let reply = self.get(&octets, acceptable_length)?;
        codec
            .decode(&reply)
            .map_err(|err| SnepError::Codec(err.to_string()))
    }

    fn exchange(
        &mut self,
        code: RequestCode,
        info: &[u8],
        acceptable_length: usize,
    ) -> Result<Bytes> {
        let transient = self.link.is_none();
        if transient {
            self.connect_default()?;
        }

        let result = self.exchange_on_link(code, info, acceptable_length);

        let desynced = matches!(
            result,
            Err(SnepError::ConnectionClosed
                | SnepError::Link(_)
                | SnepError::Frame(_)
                | SnepError::Protocol(_))
        );
        if desynced {
            warn!(request = %code, "dropping client link after failed exchange");
        }
        if transient || desynced {
            self.close();
        }
        result
    }

    fn exchange_on_link(
        &mut self,
        code: RequestCode,
        info: &[u8],
        acceptable_length: usize,
    ) -> Result<Bytes> {
        let link = self.link.as_mut().ok_or(SnepError::NotConnected)?;

        if let Delivery::Refused(header) = self.writer.send(link, code, info)? {
            return Err(refusal(header));
        }
        debug!(request = %code, len = info.len(), "request sent");

        let inbound = self
            .reader
            .read(link, acceptable_length)?
            .ok_or(SnepError::ConnectionClosed)?;

        let message = match inbound {
            Inbound::Message(message) => message,
            Inbound::Oversize { header, .. } => {
                return Err(SnepError::ResponseTooLarge {
                    declared: header.length,
                    acceptable: acceptable_length,
                });
            }
        };

        match ResponseCode::try_from(message.header.code) {
            Ok(ResponseCode::Success) => Ok(message.info),
            Ok(ResponseCode::Reject) => Err(SnepError::Rejected),
            Ok(ResponseCode::Continue) => Err(SnepError::Protocol(
                "continue received as final response".to_string(),
            )),
            Ok(code) => {
                debug!(response = %code, "request failed");
                Err(SnepError::Response { code })
            }
            Err(raw) => Err(SnepError::Protocol(format!(
                "unknown response code 0x{raw:02X}"
            ))),
        }
    }
}

/// Map the acknowledgement that stopped a fragmented request.
fn refusal(header: Header) -> SnepError {
    match ResponseCode::try_from(header.code) {
        Ok(ResponseCode::Reject) => SnepError::Rejected,
        Ok(code) if code.is_error() => SnepError::Response { code },
        Ok(code) => SnepError::Protocol(format!("{code} before request was complete")),
        Err(raw) => SnepError::Protocol(format!(
            "unknown acknowledgement code 0x{raw:02X}"
        )),
    }
}

impl<C: Connector> Drop for SnepClient<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Connector> std::fmt::Debug for SnepClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnepClient")
            .field("config", &self.config)
            .field("connected", &self.link.is_some())
            .finish()
    }
}
