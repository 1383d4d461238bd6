use std::fmt;

/// Everything that can go wrong while growing a buffer or decoding bytes off
/// the wire. Never constructed from a bare string; every variant carries the
/// structured context a caller needs to `match` on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A decode tried to read past the region the producer actually wrote.
    Underrun { wanted: usize, available: usize },
    /// A fixed-width integer field was cut short.
    ShortInput { wanted: usize, available: usize },
    /// A gamma stream, string, or payload violated the wire grammar.
    Malformed(&'static str),
    /// A gamma-coded size would need more than the maximum encoded length.
    Oversize { value: u64, limit: u64 },
    /// A caller-supplied value fails a local precondition before anything
    /// is sent or stored (never transmitted on the wire).
    InvalidArgument(&'static str),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Underrun { wanted, available } => write!(
                f,
                "buffer underrun: wanted {wanted} bytes, {available} available"
            ),
            WireError::ShortInput { wanted, available } => write!(
                f,
                "short input: wanted {wanted} bytes, {available} available"
            ),
            WireError::Malformed(reason) => write!(f, "malformed wire data: {reason}"),
            WireError::Oversize { value, limit } => {
                write!(f, "value {value} exceeds limit {limit}")
            }
            WireError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
        }
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = Result<T, WireError>;
