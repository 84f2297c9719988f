use std::{error::Error, fmt, io};

/// The comms module's result type.
pub type Result<T> = std::result::Result<T, CodecErr>;

/// Failures while reading or writing the text framing or a snapshot blob.
#[derive(Debug)]
pub enum CodecErr {
    Io(io::Error),
    /// The peer sent something that doesn't follow the framing.
    Malformed {
        line: usize,
        reason: String,
    },
    LineTooLong {
        line: usize,
        max: usize,
    },
    /// A snapshot could not be encoded or decoded.
    Snapshot(String),
}

impl CodecErr {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the content the peer sent rather than by
    /// the transport.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::LineTooLong { .. })
    }
}

impl fmt::Display for CodecErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecErr::Io(e) => write!(f, "io error: {e}"),
            CodecErr::Malformed { line, reason } => {
                write!(f, "malformed payload at line {line}: {reason}")
            }
            CodecErr::LineTooLong { line, max } => {
                write!(f, "line {line} exceeds the maximum length of {max} bytes")
            }
            CodecErr::Snapshot(e) => write!(f, "snapshot error: {e}"),
        }
    }
}

impl Error for CodecErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CodecErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<CodecErr> for io::Error {
    fn from(value: CodecErr) -> Self {
        match value {
            CodecErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
