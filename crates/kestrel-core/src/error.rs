use std::fmt;
use std::io;

use kestrel_wire::WireError;

/// Errors that can arise while framing messages or running the server and
/// client engines. Wire-level errors from `kestrel-wire` fold into this
/// enum so callers only ever match one error type per crate boundary.
#[derive(Debug)]
pub enum EngineError {
    InvalidArgument(&'static str),
    Malformed(&'static str),
    Oversize { value: u64, limit: u64 },
    FramingMismatch { sent: u64, echoed: u64 },
    ShortInput { wanted: usize, available: usize },
    Io(io::Error),
    Closed,
    HandlerAbsent,
    HandlerFailed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            EngineError::Malformed(reason) => write!(f, "malformed wire data: {reason}"),
            EngineError::Oversize { value, limit } => {
                write!(f, "value {value} exceeds limit {limit}")
            }
            EngineError::FramingMismatch { sent, echoed } => write!(
                f,
                "framing echo mismatch: sent {sent}, peer echoed {echoed}"
            ),
            EngineError::ShortInput { wanted, available } => write!(
                f,
                "short input: wanted {wanted} bytes, {available} available"
            ),
            EngineError::Io(e) => write!(f, "i/o error: {e}"),
            EngineError::Closed => write!(f, "peer closed the connection"),
            EngineError::HandlerAbsent => write!(f, "no handler registered for that name"),
            EngineError::HandlerFailed => write!(f, "handler returned no usable output"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<WireError> for EngineError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Underrun { wanted, available } => {
                EngineError::ShortInput { wanted, available }
            }
            WireError::ShortInput { wanted, available } => {
                EngineError::ShortInput { wanted, available }
            }
            WireError::Malformed(reason) => EngineError::Malformed(reason),
            WireError::Oversize { value, limit } => EngineError::Oversize { value, limit },
            WireError::InvalidArgument(reason) => EngineError::InvalidArgument(reason),
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            EngineError::Closed
        } else {
            EngineError::Io(e)
        }
    }
}

/// True for errors that should terminate only the connection they occurred
/// on, leaving the rest of the server running.
impl EngineError {
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(self, EngineError::HandlerAbsent | EngineError::HandlerFailed)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
