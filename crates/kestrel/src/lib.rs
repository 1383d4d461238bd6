//! A length-framed binary RPC runtime.
//!
//! This crate is a thin facade: [`kestrel_wire`] owns the wire format,
//! [`kestrel_registry`] owns the name-to-handler map, and [`kestrel_core`]
//! owns framing plus the server and client engines. Most callers will use
//! the re-exported [`ServerEngine`]/[`ClientEngine`] directly; the free
//! functions below exist for parity with the programmatic surface this
//! runtime's protocol defines (`init_server`, `register`, `serve_all`,
//! `init_client`, `find`, `call`, `close_client`, `data_free`).

use std::net::ToSocketAddrs;
use std::sync::Arc;

pub use kestrel_core::{ClientEngine, EngineError, EngineResult, Handle, ServerEngine};
pub use kestrel_registry::{Handler, Registry, RegistryError};
pub use kestrel_wire::{Envelope, Operation, Payload, WireError, WireResult};

/// Binds and returns a server engine ready for `register`/`serve_all`.
pub fn init_server(addr: impl ToSocketAddrs) -> EngineResult<ServerEngine> {
    ServerEngine::init(addr)
}

/// Registers `handler` under `name`, replacing any prior registration.
pub fn register(
    server: &ServerEngine,
    name: impl Into<String>,
    handler: Arc<dyn Handler>,
) -> Result<(), RegistryError> {
    server.register(name, handler)
}

/// Runs the accept loop until shutdown, joining every worker before
/// returning.
pub fn serve_all(server: &ServerEngine) -> EngineResult<()> {
    server.serve_all()
}

/// Connects to a server.
pub fn init_client(addr: impl ToSocketAddrs) -> EngineResult<ClientEngine> {
    ClientEngine::init(addr)
}

/// Resolves `name`, returning a handle on success.
pub fn find(client: &mut ClientEngine, name: &str) -> EngineResult<Option<Handle>> {
    client.find(name)
}

/// Invokes the handler behind `handle`.
pub fn call(
    client: &mut ClientEngine,
    handle: &Handle,
    payload: Payload,
) -> EngineResult<Option<Payload>> {
    client.call(handle, payload)
}

/// Tears down a client connection. Idempotent.
pub fn close_client(client: &mut ClientEngine) {
    client.close();
}

/// Releases a payload's blob. A no-op in this port: an owned `Payload`
/// frees its blob when dropped. Exposed so callers porting from an
/// explicit-free API have something to call.
pub fn data_free(payload: Payload) {
    drop(payload);
}
