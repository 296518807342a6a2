//! Application hooks invoked by the server.
//!
//! [`RequestHandler`] works on raw information octets. [`RecordHandler`]
//! works on decoded records and is adapted to the octet level by
//! [`Records`], which runs a [`MessageCodec`] on the way in and out.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use snep_frame::ResponseCode;
use tracing::warn;

/// Response code sent when a handler fails without naming a code.
pub const UNMAPPED_FAILURE_CODE: ResponseCode = ResponseCode::BadRequest;

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Answer the request with this response code.
    #[error("{}", .0.description())]
    Response(ResponseCode),

    /// Application failure with no protocol mapping.
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    /// Response code put on the wire for this failure.
    ///
    /// Only failure codes pass through; Success and Continue are not valid
    /// answers to a failed request and map to [`UNMAPPED_FAILURE_CODE`].
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::Response(code) if code.is_error() => *code,
            Self::Response(_) | Self::Failed(_) => UNMAPPED_FAILURE_CODE,
        }
    }
}

impl From<ResponseCode> for HandlerError {
    fn from(code: ResponseCode) -> Self {
        Self::Response(code)
    }
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Octet-level request handler.
///
/// Both methods have defaults: PUT succeeds and discards the payload, GET
/// answers NotImplemented. Handlers are shared across sessions.
pub trait RequestHandler: Send + Sync {
    /// Accept a PUT payload.
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        let _ = info;
        Ok(())
    }

    /// Answer a GET. `acceptable_length` is the limit the client declared;
    /// a longer reply is turned into ExcessData by the server.
    fn get(&self, template: Bytes, acceptable_length: usize) -> HandlerResult<Bytes> {
        let _ = (template, acceptable_length);
        Err(HandlerError::Response(ResponseCode::NotImplemented))
    }
}

/// Handler with no application hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

impl RequestHandler for DefaultHandler {}

impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        (**self).put(info)
    }

    fn get(&self, template: Bytes, acceptable_length: usize) -> HandlerResult<Bytes> {
        (**self).get(template, acceptable_length)
    }
}

impl<T: RequestHandler + ?Sized> RequestHandler for Box<T> {
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        (**self).put(info)
    }

    fn get(&self, template: Bytes, acceptable_length: usize) -> HandlerResult<Bytes> {
        (**self).get(template, acceptable_length)
    }
}

/// Converts between information octets and application records.
pub trait MessageCodec {
    type Record;
    type Error: fmt::Display;

    fn encode(&self, records: &[Self::Record]) -> Result<Vec<u8>, Self::Error>;

    fn decode(&self, octets: &[u8]) -> Result<Vec<Self::Record>, Self::Error>;
}

/// Record-level request handler. Same defaults as [`RequestHandler`].
pub trait RecordHandler<R>: Send + Sync {
    fn put_records(&self, records: Vec<R>) -> HandlerResult<()> {
        let _ = records;
        Ok(())
    }

    fn get_records(&self, template: Vec<R>, acceptable_length: usize) -> HandlerResult<Vec<R>> {
        let _ = (template, acceptable_length);
        Err(HandlerError::Response(ResponseCode::NotImplemented))
    }
}

impl<R, T: RecordHandler<R> + ?Sized> RecordHandler<R> for Arc<T> {
    fn put_records(&self, records: Vec<R>) -> HandlerResult<()> {
        (**self).put_records(records)
    }

    fn get_records(&self, template: Vec<R>, acceptable_length: usize) -> HandlerResult<Vec<R>> {
        (**self).get_records(template, acceptable_length)
    }
}

/// Serves a [`RecordHandler`] through a [`MessageCodec`].
///
/// Payloads that fail to decode are answered with BadRequest without
/// reaching the handler.
pub struct Records<C, H> {
    codec: C,
    handler: H,
}

impl<C, H> Records<C, H> {
    pub fn new(codec: C, handler: H) -> Self {
        Self { codec, handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<C, H> Records<C, H>
where
    C: MessageCodec,
{
    fn decode(&self, octets: &[u8]) -> HandlerResult<Vec<C::Record>> {
        self.codec.decode(octets).map_err(|err| {
            warn!(error = %err, len = octets.len(), "undecodable message");
            HandlerError::Response(ResponseCode::BadRequest)
        })
    }
}

impl<C, H> RequestHandler for Records<C, H>
where
    C: MessageCodec + Send + Sync,
    H: RecordHandler<C::Record>,
{
    fn put(&self, info: Bytes) -> HandlerResult<()> {
        let records = self.decode(&info)?;
        self.handler.put_records(records)
    }

    fn get(&self, template: Bytes, acceptable_length: usize) -> HandlerResult<Bytes> {
        let template = self.decode(&template)?;
        let reply = self.handler.get_records(template, acceptable_length)?;
        self.codec
            .encode(&reply)
            .map(Bytes::from)
            .map_err(|err| HandlerError::Failed(format!("encode reply: {err}")))
    }
}

impl<C, H> fmt::Debug for Records<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records").finish_non_exhaustive()
    }
}
