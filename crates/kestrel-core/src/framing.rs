//! Length/echo framing handshake on top of a blocking (or non-blocking,
//! poll-retried) byte stream.
//!
//! A message is preceded by its gamma-coded byte length. The receiver
//! echoes the exact size it decoded back to the sender before the sender
//! transmits the payload, so a desynchronised stream is caught before a
//! large write is wasted.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use kestrel_wire::{gamma, Envelope, GrowableBuffer, MAX_MESSAGE_BYTE_SIZE};

use crate::error::{EngineError, EngineResult};

/// How long a non-blocking retry loop sleeps between polls. Short enough
/// to keep shutdown latency low, long enough not to spin a core.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

fn would_block(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}

/// Reads exactly `buf.len()` bytes, looping around short reads and
/// `WouldBlock` (for non-blocking streams). A zero-byte read before the
/// buffer is full means the peer closed the connection.
pub fn read_exact_loop(stream: &mut impl Read, buf: &mut [u8]) -> EngineResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(EngineError::Closed),
            Ok(n) => filled += n,
            Err(e) if would_block(&e) => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Writes the whole of `buf`, looping around short writes and
/// `WouldBlock`.
pub fn write_all_loop(stream: &mut impl Write, buf: &[u8]) -> EngineResult<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match stream.write(&buf[sent..]) {
            Ok(0) => {
                return Err(EngineError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                )))
            }
            Ok(n) => sent += n,
            Err(e) if would_block(&e) => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
    stream.flush().map_err(EngineError::from)
}

fn read_gamma(stream: &mut impl Read) -> EngineResult<u64> {
    gamma::decode(|| -> EngineResult<u8> {
        let mut b = [0u8; 1];
        read_exact_loop(stream, &mut b)?;
        Ok(b[0])
    })
}

fn write_gamma(stream: &mut impl Write, value: u64) -> EngineResult<()> {
    let mut buf = GrowableBuffer::new(gamma::encoded_len(value));
    gamma::encode(&mut buf, value);
    write_all_loop(stream, buf.as_produced())
}

/// Serialises `envelope`, runs the size handshake, then sends the payload.
/// Fails `Oversize` locally (before writing anything) if the encoded
/// envelope would exceed [`MAX_MESSAGE_BYTE_SIZE`].
pub fn send<S: Read + Write>(stream: &mut S, envelope: &Envelope) -> EngineResult<()> {
    let encoded = envelope.encode()?;
    let n = encoded.produced() as u64;
    if n > MAX_MESSAGE_BYTE_SIZE {
        return Err(EngineError::Oversize {
            value: n,
            limit: MAX_MESSAGE_BYTE_SIZE,
        });
    }
    write_gamma(stream, n)?;
    let echoed = read_gamma(stream)?;
    if echoed != n {
        return Err(EngineError::FramingMismatch { sent: n, echoed });
    }
    write_all_loop(stream, encoded.as_produced())
}

/// Reads one framed envelope: length prefix, echo, then the payload bytes.
pub fn recv<S: Read + Write>(stream: &mut S) -> EngineResult<Envelope> {
    let n = read_gamma(stream)?;
    if n > MAX_MESSAGE_BYTE_SIZE {
        return Err(EngineError::Oversize {
            value: n,
            limit: MAX_MESSAGE_BYTE_SIZE,
        });
    }
    write_gamma(stream, n)?;
    let mut body = vec![0u8; n as usize];
    read_exact_loop(stream, &mut body)?;
    Ok(Envelope::decode(&body)?)
}
