//! The client engine: connect, FIND, CALL, close.
//!
//! A client is single-threaded per instance; nothing here is `Sync`, and
//! issuing overlapping calls from multiple threads on one instance is
//! outside the contract.

use std::net::{TcpStream, ToSocketAddrs};

use kestrel_wire::{Envelope, Operation, Payload};

use crate::error::{EngineError, EngineResult};
use crate::framing;
use crate::handle::Handle;

pub struct ClientEngine {
    stream: TcpStream,
    next_request_id: i64,
    closed: bool,
}

impl ClientEngine {
    pub fn init(addr: impl ToSocketAddrs) -> EngineResult<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(ClientEngine {
            stream,
            next_request_id: 0,
            closed: false,
        })
    }

    fn next_request_id(&mut self) -> i64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Resolves `name` against the server's registry. Returns a handle on
    /// success, `None` if the server reports the name does not exist *or*
    /// the request failed in flight (a closed connection, a malformed
    /// reply, a framing mismatch...). Only a local precondition failure on
    /// `name` itself is raised as an error; the connection is left in an
    /// undefined state after any in-flight failure, same as `call`.
    pub fn find(&mut self, name: &str) -> EngineResult<Option<Handle>> {
        let request_id = self.next_request_id();
        let envelope = Envelope::new(request_id, Operation::Find, name, Payload::empty())?;
        let reply = match self.exchange(&envelope)? {
            Some(reply) => reply,
            None => return Ok(None),
        };
        if reply.operation == Operation::ReplySuccess && reply.payload.scalar == 1 {
            Ok(Some(Handle::new(name)))
        } else {
            Ok(None)
        }
    }

    /// Invokes the handler behind `handle` with `payload`. Returns the
    /// reply payload on success, `None` on a failure reply *or* an
    /// in-flight failure (`Io`/`Closed`/`Malformed`/framing trouble) —
    /// the caller should treat the client as needing `close` afterward.
    pub fn call(&mut self, handle: &Handle, payload: Payload) -> EngineResult<Option<Payload>> {
        let request_id = self.next_request_id();
        let envelope = Envelope::new(request_id, Operation::Call, handle.name(), payload)?;
        let reply = match self.exchange(&envelope)? {
            Some(reply) => reply,
            None => return Ok(None),
        };
        if reply.operation == Operation::ReplySuccess {
            Ok(Some(reply.payload))
        } else {
            Ok(None)
        }
    }

    /// Sends `envelope` and awaits the matching reply. Any failure that
    /// happens while talking to the peer (as opposed to a local argument
    /// error, which can't occur here since `envelope` is already
    /// validated) collapses to `None` rather than propagating, per the
    /// client-side error contract: the caller gets an absent result and
    /// should not keep using this connection.
    fn exchange(&mut self, envelope: &Envelope) -> EngineResult<Option<Envelope>> {
        if let Err(e) = framing::send(&mut self.stream, envelope) {
            return Self::absent_unless_local(e);
        }
        match framing::recv(&mut self.stream) {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => Self::absent_unless_local(e),
        }
    }

    fn absent_unless_local(e: EngineError) -> EngineResult<Option<Envelope>> {
        match e {
            EngineError::InvalidArgument(_) => Err(e),
            _ => Ok(None),
        }
    }

    /// Tears down the connection. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        self.closed = true;
    }
}

impl Drop for ClientEngine {
    fn drop(&mut self) {
        self.close();
    }
}
