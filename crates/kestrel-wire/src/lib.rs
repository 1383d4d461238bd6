//! Wire-level encoding for kestrel: a growable byte buffer, Elias-gamma
//! coded sizes, and the envelope/payload codec built on top of them.
//!
//! This crate has no notion of sockets or concurrency; it only knows how
//! to turn an [`Envelope`] into bytes and back.

mod buffer;
mod codec;
mod error;
pub mod gamma;

pub use buffer::GrowableBuffer;
pub use codec::{Envelope, Operation, Payload, MAX_MESSAGE_BYTE_SIZE, MAX_NAME_LEN};
pub use error::{WireError, WireResult};
