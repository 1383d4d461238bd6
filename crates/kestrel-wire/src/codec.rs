//! Envelope and payload encoding: fixed-width integers, gamma-coded sizes,
//! length-prefixed strings, and the payload record and envelope that sit on
//! top of them.

use crate::buffer::GrowableBuffer;
use crate::error::{WireError, WireResult};
use crate::gamma;

/// Maximum size, in bytes, of a single framed envelope on the wire.
pub const MAX_MESSAGE_BYTE_SIZE: u64 = 1_000_000;
/// Maximum length of a function name, excluding its terminator.
pub const MAX_NAME_LEN: usize = 1000;

fn write_i64(buf: &mut GrowableBuffer, value: i64) {
    buf.write_raw(&value.to_be_bytes());
}

fn read_i64(buf: &mut GrowableBuffer) -> WireResult<i64> {
    let bytes = buf.read_raw(8).map_err(|_| WireError::ShortInput {
        wanted: 8,
        available: buf.remaining(),
    })?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    Ok(i64::from_be_bytes(arr))
}

/// The four request/reply kinds an envelope can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Find,
    Call,
    ReplySuccess,
    ReplyFailure,
}

impl Operation {
    fn to_i64(self) -> i64 {
        match self {
            Operation::Find => 0,
            Operation::Call => 1,
            Operation::ReplySuccess => 2,
            Operation::ReplyFailure => 3,
        }
    }

    fn from_i64(v: i64) -> WireResult<Self> {
        match v {
            0 => Ok(Operation::Find),
            1 => Ok(Operation::Call),
            2 => Ok(Operation::ReplySuccess),
            3 => Ok(Operation::ReplyFailure),
            other => Err(WireError::Malformed(operation_out_of_range_message(other))),
        }
    }
}

fn operation_out_of_range_message(_v: i64) -> &'static str {
    "operation code outside 0..=3"
}

fn write_string(buf: &mut GrowableBuffer, s: &str) -> WireResult<()> {
    if s.len() + 1 > MAX_NAME_LEN + 1 {
        return Err(WireError::InvalidArgument("name exceeds maximum length"));
    }
    let mut with_nul = Vec::with_capacity(s.len() + 1);
    with_nul.extend_from_slice(s.as_bytes());
    with_nul.push(0);
    gamma::check_encodable(with_nul.len() as u64)?;
    gamma::encode(buf, with_nul.len() as u64);
    buf.write_raw(&with_nul);
    Ok(())
}

fn read_string(buf: &mut GrowableBuffer) -> WireResult<String> {
    let len = gamma::decode_from_buffer(buf)? as usize;
    if len == 0 {
        return Err(WireError::Malformed("string length is zero"));
    }
    let bytes = buf.read_raw(len)?;
    let (last, body) = bytes.split_last().expect("len checked nonzero above");
    if *last != 0 {
        return Err(WireError::Malformed("string missing NUL terminator"));
    }
    std::str::from_utf8(body)
        .map(|s| s.to_string())
        .map_err(|_| WireError::Malformed("string is not valid UTF-8"))
}

/// A request or reply payload: a scalar plus an optional blob.
///
/// `blob_len == 0` and `blob.is_none()` must agree; any other combination
/// is rejected by [`Payload::new`] and reported `Malformed` on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub scalar: i64,
    pub blob: Option<Vec<u8>>,
}

impl Payload {
    pub fn new(scalar: i64, blob: Option<Vec<u8>>) -> WireResult<Self> {
        match &blob {
            Some(b) if b.is_empty() => Err(WireError::InvalidArgument(
                "blob present but empty; omit blob instead of an empty one",
            )),
            _ => Ok(Payload { scalar, blob }),
        }
    }

    pub fn empty() -> Self {
        Payload {
            scalar: 0,
            blob: None,
        }
    }

    pub fn blob_len(&self) -> usize {
        self.blob.as_ref().map_or(0, |b| b.len())
    }

    fn encode(&self, buf: &mut GrowableBuffer) -> WireResult<()> {
        write_i64(buf, self.scalar);
        let len = self.blob_len();
        gamma::check_encodable(len as u64)?;
        gamma::encode(buf, len as u64);
        if let Some(blob) = &self.blob {
            buf.write_raw(blob);
        }
        Ok(())
    }

    /// Decodes a payload record. If the declared `blob_len` is positive but
    /// fewer bytes remain than declared, returns a *partial* payload
    /// carrying whatever trailing bytes were available rather than failing
    /// outright — the caller decides whether a short read already killed
    /// the connection, in which case this partial data must not be used.
    fn decode(buf: &mut GrowableBuffer) -> WireResult<Self> {
        let scalar = read_i64(buf)?;
        let blob_len = gamma::decode_from_buffer(buf)? as usize;
        if blob_len == 0 {
            return Ok(Payload { scalar, blob: None });
        }
        let available = buf.remaining();
        let take = blob_len.min(available);
        let bytes = buf.read_raw(take)?.to_vec();
        if take < blob_len {
            // Partial: surface what we have so the caller can log it, but
            // this value is diagnostic-only per the framing contract.
            tracing::debug!(blob_len, available = take, "payload blob truncated on decode");
            return Ok(Payload {
                scalar,
                blob: Some(bytes),
            });
        }
        Ok(Payload {
            scalar,
            blob: Some(bytes),
        })
    }
}

/// A full request or reply: operation, opaque request id, function name,
/// and payload, written and read in that exact order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub request_id: i64,
    pub operation: Operation,
    pub function_name: String,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(
        request_id: i64,
        operation: Operation,
        function_name: impl Into<String>,
        payload: Payload,
    ) -> WireResult<Self> {
        let function_name = function_name.into();
        if function_name.is_empty() || function_name.len() > MAX_NAME_LEN {
            return Err(WireError::InvalidArgument(
                "function name length must be 1..=1000",
            ));
        }
        Ok(Envelope {
            request_id,
            operation,
            function_name,
            payload,
        })
    }

    pub fn encode(&self) -> WireResult<GrowableBuffer> {
        let mut buf = GrowableBuffer::new(64);
        write_i64(&mut buf, self.request_id);
        write_i64(&mut buf, self.operation.to_i64());
        write_string(&mut buf, &self.function_name)?;
        self.payload.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let mut buf = GrowableBuffer::from_bytes(bytes);
        let request_id = read_i64(&mut buf)?;
        let operation = Operation::from_i64(read_i64(&mut buf)?)?;
        let function_name = read_string(&mut buf)?;
        if function_name.is_empty() || function_name.len() > MAX_NAME_LEN {
            return Err(WireError::Malformed(
                "function name length must be 1..=1000",
            ));
        }
        let payload = Payload::decode(&mut buf)?;
        Ok(Envelope {
            request_id,
            operation,
            function_name,
            payload,
        })
    }
}
