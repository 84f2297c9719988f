use std::{error::Error, fmt, io};

use comms::CodecErr;
use model::{Capability, MlErr};

/// Fatal errors raised while starting the server, before any port is opened.
#[derive(Debug)]
pub enum ServerErr {
    /// Neither the raw nor the compressed layout could decode the snapshot.
    SnapshotCorrupt(CodecErr),
    /// The operator expected a different capability than the model has.
    CapabilityMismatch {
        expected: Capability,
        actual: Capability,
    },
    /// Every port of the configured range is taken.
    NoPortAvailable { start: u16, end: u16 },
    /// Invalid command line or environment.
    Config(String),
    Io(io::Error),
}

/// Errors that abort a single connection. The server keeps serving afterwards.
#[derive(Debug)]
pub enum SessionErr {
    /// The client sent a payload that doesn't follow the framing.
    MalformedPayload(CodecErr),
    /// The model failed to fit or predict. The model in use is unchanged.
    ModelOperation(MlErr),
    /// The fitted model couldn't be turned into a snapshot.
    Snapshot(CodecErr),
    Io(io::Error),
}

/// Errors seen by the client side of the protocol.
#[derive(Debug)]
pub enum ClientErr {
    Io(io::Error),
    Codec(CodecErr),
    /// The server closed the connection without a complete answer.
    Aborted(String),
    /// A launched server didn't announce its port.
    Handshake(String),
}

fn capability_name(capability: Capability) -> &'static str {
    match capability {
        Capability::Predictor => "regressor",
        Capability::Probabilistic => "classifier",
    }
}

impl fmt::Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::SnapshotCorrupt(e) => write!(f, "corrupt model snapshot: {e}"),
            ServerErr::CapabilityMismatch { expected, actual } => write!(
                f,
                "capability mismatch: expected a {}, the supplied model is a {}",
                capability_name(*expected),
                capability_name(*actual)
            ),
            ServerErr::NoPortAvailable { start, end } => {
                write!(f, "no port available in the range {start}-{end}")
            }
            ServerErr::Config(msg) => write!(f, "invalid config: {msg}"),
            ServerErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerErr::SnapshotCorrupt(e) => Some(e),
            ServerErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ServerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl fmt::Display for SessionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionErr::MalformedPayload(e) => write!(f, "{e}"),
            SessionErr::ModelOperation(e) => write!(f, "model operation failed: {e}"),
            SessionErr::Snapshot(e) => write!(f, "{e}"),
            SessionErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for SessionErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionErr::MalformedPayload(e) | SessionErr::Snapshot(e) => Some(e),
            SessionErr::ModelOperation(e) => Some(e),
            SessionErr::Io(e) => Some(e),
        }
    }
}

impl From<CodecErr> for SessionErr {
    fn from(value: CodecErr) -> Self {
        match value {
            CodecErr::Io(e) => Self::Io(e),
            e @ CodecErr::Snapshot(_) => Self::Snapshot(e),
            e => Self::MalformedPayload(e),
        }
    }
}

impl From<MlErr> for SessionErr {
    fn from(value: MlErr) -> Self {
        Self::ModelOperation(value)
    }
}

impl From<io::Error> for SessionErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl fmt::Display for ClientErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErr::Io(e) => write!(f, "io error: {e}"),
            ClientErr::Codec(e) => write!(f, "{e}"),
            ClientErr::Aborted(msg) => write!(f, "server aborted the request: {msg}"),
            ClientErr::Handshake(msg) => write!(f, "server handshake failed: {msg}"),
        }
    }
}

impl Error for ClientErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientErr::Io(e) => Some(e),
            ClientErr::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CodecErr> for ClientErr {
    fn from(value: CodecErr) -> Self {
        match value {
            CodecErr::Io(e) => Self::Io(e),
            e => Self::Codec(e),
        }
    }
}
