use std::{io, time::Duration};

use futures::StreamExt;
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::{CodecErr, Limits, Matrix, Result, TrainingBatch};

/// The receiving end of the text framing.
pub struct LineReceiver<R: AsyncRead + Unpin> {
    lines: FramedRead<R, LinesCodec>,
    limits: Limits,
    line_no: usize,
}

impl<R: AsyncRead + Unpin> LineReceiver<R> {
    /// Creates a new `LineReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    /// * `limits` - Line length and idle bounds for every read.
    pub(super) fn new(rx: R, limits: Limits) -> Self {
        let codec = LinesCodec::new_with_max_length(limits.max_line);

        Self {
            lines: FramedRead::new(rx, codec),
            limits,
            line_no: 0,
        }
    }

    /// Waits for the next line, without its terminator.
    ///
    /// # Returns
    /// `Ok(None)` once the peer closed its writing side.
    ///
    /// # Errors
    /// `CodecErr::LineTooLong` if the line exceeds the configured maximum and
    /// `CodecErr::Io` on transport failures or when the idle timeout elapses.
    pub async fn recv_line(&mut self) -> Result<Option<String>> {
        let next = match self.limits.idle {
            Some(idle) => timeout(idle, self.lines.next())
                .await
                .map_err(|_| idle_timeout(idle))?,
            None => self.lines.next().await,
        };

        let Some(line) = next else {
            return Ok(None);
        };

        self.line_no += 1;

        match line {
            Ok(line) => Ok(Some(line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Err(CodecErr::LineTooLong {
                line: self.line_no,
                max: self.limits.max_line,
            }),
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Err(CodecErr::malformed(self.line_no, "line is not valid utf-8"))
            }
            Err(LinesCodecError::Io(e)) => Err(e.into()),
        }
    }

    /// Reads a row count line.
    ///
    /// # Errors
    /// `CodecErr::Malformed` if the stream ended or the line isn't a
    /// non-negative integer.
    pub async fn recv_row_count(&mut self) -> Result<usize> {
        let line = self.expect_line("row count").await?;

        line.trim().parse().map_err(|_| {
            CodecErr::malformed(self.line_no, format!("invalid row count {:?}", line.trim()))
        })
    }

    /// Reads a row count followed by that many feature rows.
    ///
    /// # Errors
    /// `CodecErr::Malformed` on a bad count, a bad number, a width change or if
    /// the stream ends before all rows were received.
    pub async fn recv_matrix(&mut self) -> Result<Matrix> {
        let nrows = self.recv_row_count().await?;
        debug!(rows = nrows; "receiving feature matrix");

        let mut x = Matrix::new();
        for _ in 0..nrows {
            let row = self.recv_row().await?;
            x.push_row(&row)
                .map_err(|reason| CodecErr::malformed(self.line_no, reason))?;
        }

        Ok(x)
    }

    /// Reads a row count followed by that many `label feature...` rows.
    ///
    /// # Errors
    /// Same as `recv_matrix`, a row without a label is malformed too.
    pub async fn recv_batch(&mut self) -> Result<TrainingBatch> {
        let nrows = self.recv_row_count().await?;
        debug!(rows = nrows; "receiving training batch");

        let mut x = Matrix::new();
        let mut y = Vec::with_capacity(nrows.min(1 << 16));

        for _ in 0..nrows {
            let row = self.recv_row().await?;
            let Some((&label, features)) = row.split_first() else {
                return Err(CodecErr::malformed(self.line_no, "row has no label"));
            };

            x.push_row(features)
                .map_err(|reason| CodecErr::malformed(self.line_no, reason))?;
            y.push(label);
        }

        TrainingBatch::new(x, y)
    }

    /// Reads rows of numbers until the peer closes the stream, used for the
    /// response to `run`.
    ///
    /// # Errors
    /// `CodecErr::Malformed` if any token isn't a number.
    pub async fn recv_rows_to_end(&mut self) -> Result<Vec<Vec<f64>>> {
        let mut rows = Vec::new();
        while let Some(line) = self.recv_line().await? {
            rows.push(parse_row(&line, self.line_no)?);
        }

        Ok(rows)
    }

    /// Consumes the receiver and reads every remaining byte, used for the snapshot
    /// blob that answers `train`.
    ///
    /// # Errors
    /// `CodecErr::Io` on transport failures or if the idle timeout elapses before
    /// the peer closes the stream.
    pub async fn recv_blob(self) -> Result<Vec<u8>> {
        let parts = self.lines.into_parts();
        let mut blob = parts.read_buf.to_vec();
        let mut rx = parts.io;

        match self.limits.idle {
            Some(idle) => {
                timeout(idle, rx.read_to_end(&mut blob))
                    .await
                    .map_err(|_| idle_timeout(idle))??;
            }
            None => {
                rx.read_to_end(&mut blob).await?;
            }
        }

        Ok(blob)
    }

    /// The amount of lines received so far.
    pub fn lines_received(&self) -> usize {
        self.line_no
    }

    async fn expect_line(&mut self, what: &str) -> Result<String> {
        match self.recv_line().await? {
            Some(line) => Ok(line),
            None => Err(CodecErr::malformed(
                self.line_no + 1,
                format!("stream ended while waiting for the {what}"),
            )),
        }
    }

    async fn recv_row(&mut self) -> Result<Vec<f64>> {
        let line = self.expect_line("next row").await?;
        parse_row(&line, self.line_no)
    }
}

/// Parses a whitespace-separated line of numbers.
fn parse_row(line: &str, line_no: usize) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| CodecErr::malformed(line_no, format!("invalid number {token:?}")))
        })
        .collect()
}

fn idle_timeout(idle: Duration) -> CodecErr {
    CodecErr::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("peer was idle for more than {idle:?}"),
    ))
}
