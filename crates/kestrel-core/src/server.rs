//! The server engine: accept loop, per-connection workers, and request
//! dispatch.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use kestrel_registry::{Handler, Registry, RegistryError};
use kestrel_wire::{Envelope, Operation, Payload};
use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::framing::{self, POLL_INTERVAL};

/// Name a client can CALL with an empty payload to request graceful
/// shutdown, equivalent to the process-level interrupt signal. Registering
/// a handler under this name replaces the built-in behavior, the same as
/// any other registration.
pub const SHUTDOWN_FUNCTION_NAME: &str = "shutdown";

/// Placeholder name used on failure replies. Callers must not treat it as
/// meaningful; it exists only because the wire format always carries a
/// function name field.
const FAILURE_NAME_PLACEHOLDER: &str = "failure";

/// Backlog the engine intends for the listening socket. `std::net` does
/// not expose a knob for this, so it is documented here rather than
/// enforced; a production deployment wanting a specific backlog would
/// construct the listener itself and hand it to [`ServerEngine::from_listener`].
pub const LISTEN_BACKLOG: u32 = 128;

pub struct ServerEngine {
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ServerEngine {
    /// Binds `addr`, installs an empty registry (save for the built-in
    /// shutdown verb), and returns a handle ready for `register`/`serve_all`.
    pub fn init(addr: impl ToSocketAddrs) -> EngineResult<Self> {
        let listener = TcpListener::bind(addr)?;
        Self::from_listener(listener)
    }

    pub fn from_listener(listener: TcpListener) -> EngineResult<Self> {
        listener.set_nonblocking(true)?;
        let registry = Arc::new(Registry::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        install_shutdown_verb(&registry, shutdown.clone());
        Ok(ServerEngine {
            listener,
            registry,
            shutdown,
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistryError> {
        self.registry.register(name, handler)
    }

    /// A clone of the shutdown flag, for embedding applications that want
    /// to trigger shutdown from a signal handler or another thread.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the shutdown flag is set, then joins
    /// every spawned worker before returning.
    pub fn serve_all(&self) -> EngineResult<()> {
        tracing::info!(addr = ?self.local_addr().ok(), "server accept loop starting");
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "accepted connection");
                    if let Err(e) = stream.set_nonblocking(true) {
                        tracing::warn!(%peer, error = %e, "failed to configure connection, dropping it");
                        continue;
                    }
                    let registry = self.registry.clone();
                    let shutdown = self.shutdown.clone();
                    let handle =
                        thread::spawn(move || worker_loop(stream, peer, registry, shutdown));
                    self.workers.lock().push(handle);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(e.into());
                }
            }
        }
        tracing::info!("shutdown signal observed, joining workers");
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        tracing::info!("all workers joined, server stopped");
        Ok(())
    }
}

fn install_shutdown_verb(registry: &Registry, shutdown: Arc<AtomicBool>) {
    let handler: Arc<dyn Handler> = Arc::new(move |_: Payload| {
        shutdown.store(true, Ordering::SeqCst);
        Payload::new(1, None).ok()
    });
    registry
        .register(SHUTDOWN_FUNCTION_NAME, handler)
        .expect("built-in shutdown name is within length limits");
}

fn worker_loop(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::debug!(%peer, "worker exiting: shutdown requested");
            break;
        }
        match stream.peek(&mut [0u8; 1]) {
            Ok(0) => {
                tracing::debug!(%peer, "peer closed connection");
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "liveness check failed, closing connection");
                break;
            }
        }

        let request = match framing::recv(&mut stream) {
            Ok(envelope) => envelope,
            Err(e) => {
                if e.is_connection_fatal() {
                    tracing::warn!(%peer, error = %e, "framing error, closing connection");
                    break;
                }
                continue;
            }
        };

        if let Some(reply) = dispatch(&registry, request) {
            if let Err(e) = framing::send(&mut stream, &reply) {
                tracing::warn!(%peer, error = %e, "failed to send reply, closing connection");
                break;
            }
        }
    }
}

/// The request dispatch state machine: FIND and CALL always produce a
/// reply; a REPLY_* sent by a client is logged and ignored.
fn dispatch(registry: &Registry, request: Envelope) -> Option<Envelope> {
    match request.operation {
        Operation::Find => {
            let exists = registry.contains(&request.function_name);
            let payload =
                Payload::new(if exists { 1 } else { 0 }, None).expect("vacuous payload is valid");
            Some(
                Envelope::new(
                    request.request_id,
                    Operation::ReplySuccess,
                    request.function_name,
                    payload,
                )
                .expect("name already validated by the incoming envelope"),
            )
        }
        Operation::Call => {
            let Envelope {
                request_id,
                function_name,
                payload,
                ..
            } = request;
            Some(match invoke(registry, &function_name, payload) {
                Ok(output) => Envelope::new(request_id, Operation::ReplySuccess, function_name, output)
                    .expect("name already validated by the incoming envelope"),
                Err(err) => {
                    tracing::warn!(name = %function_name, error = %err, "call could not be completed");
                    failure_envelope(request_id)
                }
            })
        }
        Operation::ReplySuccess | Operation::ReplyFailure => {
            tracing::debug!(
                name = %request.function_name,
                "received a reply envelope from a client, ignoring"
            );
            None
        }
    }
}

/// Looks up `name` and invokes its handler, surfacing the two taxonomy
/// variants that exist precisely for this path: no such name, or the
/// handler ran and produced nothing usable.
fn invoke(registry: &Registry, name: &str, payload: Payload) -> Result<Payload, EngineError> {
    let handler = registry.lookup(name).ok_or(EngineError::HandlerAbsent)?;
    handler.call(payload).ok_or(EngineError::HandlerFailed)
}

fn failure_envelope(request_id: i64) -> Envelope {
    Envelope::new(
        request_id,
        Operation::ReplyFailure,
        FAILURE_NAME_PLACEHOLDER,
        Payload::empty(),
    )
    .expect("placeholder name is within length limits")
}
