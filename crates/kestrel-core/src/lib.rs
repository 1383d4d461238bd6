//! Framing, the server engine, and the client engine that sit on top of
//! `kestrel-wire`'s codec and `kestrel-registry`'s handler map.

mod client;
mod error;
pub mod framing;
mod handle;
mod server;

pub use client::ClientEngine;
pub use error::{EngineError, EngineResult};
pub use handle::Handle;
pub use server::{ServerEngine, LISTEN_BACKLOG, SHUTDOWN_FUNCTION_NAME};
