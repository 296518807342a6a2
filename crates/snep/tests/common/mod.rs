#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use snep::frame::ResponseCode;
use snep::peer::{HandlerError, HandlerResult, MessageCodec, RecordHandler};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// Type name format of well-known NFC Forum types.
pub const TNF_WELL_KNOWN: u8 = 0x01;
/// Type name format of media-type records.
pub const TNF_MEDIA: u8 = 0x02;

/// Minimal NDEF record: enough for exercising the exchange end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub tnf: u8,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(tnf: u8, record_type: &[u8], payload: &[u8]) -> Self {
        Self {
            tnf,
            record_type: record_type.to_vec(),
            id: Vec::new(),
            payload: payload.to_vec(),
        }
    }

    /// Well-known text record ("T") with a language code.
    pub fn text(lang: &str, text: &str) -> Self {
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        payload.push(lang.len() as u8);
        payload.extend_from_slice(lang.as_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self::new(TNF_WELL_KNOWN, b"T", &payload)
    }

    fn key(&self) -> (u8, Vec<u8>) {
        (self.tnf, self.record_type.clone())
    }
}

#[derive(Debug)]
pub struct NdefError(String);

impl fmt::Display for NdefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed ndef message: {}", self.0)
    }
}

/// Short and long NDEF records, no chunking.
pub struct NdefCodec;

impl MessageCodec for NdefCodec {
    type Record = Record;
    type Error = NdefError;

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>, NdefError> {
        let mut out = Vec::new();
        let last = records.len().saturating_sub(1);
        for (index, record) in records.iter().enumerate() {
            let type_len = u8::try_from(record.record_type.len())
                .map_err(|_| NdefError("type too long".into()))?;
            let id_len =
                u8::try_from(record.id.len()).map_err(|_| NdefError("id too long".into()))?;
            let short = record.payload.len() < 256;

            let mut flags = record.tnf & TNF_MASK;
            if index == 0 {
                flags |= FLAG_MB;
            }
            if index == last {
                flags |= FLAG_ME;
            }
            if short {
                flags |= FLAG_SR;
            }
            if id_len > 0 {
                flags |= FLAG_IL;
            }

            out.push(flags);
            out.push(type_len);
            if short {
                out.push(record.payload.len() as u8);
            } else {
                let len = u32::try_from(record.payload.len())
                    .map_err(|_| NdefError("payload too long".into()))?;
                out.extend_from_slice(&len.to_be_bytes());
            }
            if id_len > 0 {
                out.push(id_len);
            }
            out.extend_from_slice(&record.record_type);
            out.extend_from_slice(&record.id);
            out.extend_from_slice(&record.payload);
        }
        Ok(out)
    }

    fn decode(&self, octets: &[u8]) -> Result<Vec<Record>, NdefError> {
        let mut records = Vec::new();
        let mut rest = octets;

        while !rest.is_empty() {
            let flags = take(&mut rest, 1)?[0];
            if records.is_empty() != (flags & FLAG_MB != 0) {
                return Err(NdefError("message begin flag misplaced".into()));
            }
            let type_len = take(&mut rest, 1)?[0] as usize;
            let payload_len = if flags & FLAG_SR != 0 {
                take(&mut rest, 1)?[0] as usize
            } else {
                let raw = take(&mut rest, 4)?;
                u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            };
            let id_len = if flags & FLAG_IL != 0 {
                take(&mut rest, 1)?[0] as usize
            } else {
                0
            };

            records.push(Record {
                tnf: flags & TNF_MASK,
                record_type: take(&mut rest, type_len)?.to_vec(),
                id: take(&mut rest, id_len)?.to_vec(),
                payload: take(&mut rest, payload_len)?.to_vec(),
            });

            if flags & FLAG_ME != 0 {
                if !rest.is_empty() {
                    return Err(NdefError("bytes after message end".into()));
                }
                return Ok(records);
            }
        }

        if records.is_empty() {
            Ok(records)
        } else {
            Err(NdefError("missing message end flag".into()))
        }
    }
}

fn take<'a>(rest: &mut &'a [u8], len: usize) -> Result<&'a [u8], NdefError> {
    if rest.len() < len {
        return Err(NdefError(format!(
            "need {len} bytes, {} remaining",
            rest.len()
        )));
    }
    let current: &'a [u8] = *rest;
    let (head, tail) = current.split_at(len);
    *rest = tail;
    Ok(head)
}

/// Stores the last message PUT for each record type (type of the first
/// record) and returns it to GETs whose template's first record has the
/// same type.
#[derive(Default)]
pub struct RecordStore {
    messages: Mutex<HashMap<(u8, Vec<u8>), Vec<Record>>>,
}

impl RecordStore {
    pub fn len(&self) -> usize {
        self.messages.lock().expect("store lock").len()
    }
}

impl RecordHandler<Record> for RecordStore {
    fn put_records(&self, records: Vec<Record>) -> HandlerResult<()> {
        let key = records
            .first()
            .map(Record::key)
            .ok_or(HandlerError::Response(ResponseCode::BadRequest))?;
        self.messages
            .lock()
            .map_err(|_| HandlerError::Failed("store lock poisoned".into()))?
            .insert(key, records);
        Ok(())
    }

    fn get_records(
        &self,
        template: Vec<Record>,
        _acceptable_length: usize,
    ) -> HandlerResult<Vec<Record>> {
        let key = template
            .first()
            .map(Record::key)
            .ok_or(HandlerError::Response(ResponseCode::BadRequest))?;
        self.messages
            .lock()
            .map_err(|_| HandlerError::Failed("store lock poisoned".into()))?
            .get(&key)
            .cloned()
            .ok_or(HandlerError::Response(ResponseCode::NotFound))
    }
}

/// Parse a hex string, ignoring whitespace.
pub fn hex(text: &str) -> Vec<u8> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).expect("ascii hex");
            u8::from_str_radix(pair, 16).expect("valid hex digit")
        })
        .collect()
}

/// Install a test subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
