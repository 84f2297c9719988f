mod error;
mod matrix;
pub mod msg;
mod receiver;
mod sender;
pub mod snapshot;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

pub use error::{CodecErr, Result};
pub use matrix::{Matrix, TrainingBatch};
pub use msg::{Command, CommandMatch, UnrecognizedCommand};
pub use receiver::LineReceiver;
pub use sender::LineSender;
pub use snapshot::SnapshotEncoding;

/// Bounds applied to every read of a `LineReceiver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length of a single line in bytes, without its terminator.
    pub max_line: usize,
    /// Maximum time to wait for the peer on any single read, `None` waits forever.
    pub idle: Option<Duration>,
}

impl Limits {
    pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line: Self::DEFAULT_MAX_LINE,
            idle: None,
        }
    }
}

/// Creates both `LineReceiver` and `LineSender` network channel parts with the
/// default limits.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of a line receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (LineReceiver<R>, LineSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    channel_with_limits(rx, tx, Limits::default())
}

/// Same as `channel` but bounding the receiver with `limits`.
pub fn channel_with_limits<R, W>(rx: R, tx: W, limits: Limits) -> (LineReceiver<R>, LineSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (LineReceiver::new(rx, limits), LineSender::new(tx))
}
