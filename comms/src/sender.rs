//! The implementation of the sending end of the text framing.

use std::{fmt::Write as _, io};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{Command, Matrix, TrainingBatch};

/// Pending bytes are written out once the buffer grows past this size.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// The sending end of the text framing.
pub struct LineSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    buf: String,
}

impl<W: AsyncWrite + Unpin> LineSender<W> {
    /// Creates a new `LineSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            buf: String::new(),
        }
    }

    /// Sends the command line that opens a connection.
    pub async fn send_command(&mut self, command: Command) -> io::Result<()> {
        self.buf.push_str(command.keyword());
        self.buf.push('\n');
        self.flush().await
    }

    /// Sends a row count followed by every row of `x`.
    pub async fn send_matrix(&mut self, x: &Matrix) -> io::Result<()> {
        self.push_count(x.nrows());

        for row in x.rows() {
            self.push_row(None, row);
            self.write_if_full().await?;
        }

        self.flush().await
    }

    /// Sends a row count followed by `label feature...` for every row.
    pub async fn send_batch(&mut self, batch: &TrainingBatch) -> io::Result<()> {
        self.push_count(batch.len());

        for (row, &label) in batch.x().rows().zip(batch.y()) {
            self.push_row(Some(label), row);
            self.write_if_full().await?;
        }

        self.flush().await
    }

    /// Sends one value per line.
    pub async fn send_values<I>(&mut self, values: I) -> io::Result<()>
    where
        I: IntoIterator<Item = f64>,
    {
        for value in values {
            self.push_row(None, &[value]);
            self.write_if_full().await?;
        }

        self.flush().await
    }

    /// Sends every row as a space-joined line.
    pub async fn send_rows<I, R>(&mut self, rows: I) -> io::Result<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f64]>,
    {
        for row in rows {
            self.push_row(None, row.as_ref());
            self.write_if_full().await?;
        }

        self.flush().await
    }

    /// Sends `text` as a single line, inner line breaks are replaced by spaces.
    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.buf
            .extend(text.chars().map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c }));
        self.buf.push('\n');
        self.flush().await
    }

    /// Sends raw bytes, used for snapshot blobs. The blob ends where the stream
    /// ends so it should be the last thing sent.
    pub async fn send_blob(&mut self, blob: &[u8]) -> io::Result<()> {
        self.flush().await?;
        self.tx.write_all(blob).await?;
        self.tx.flush().await
    }

    /// Flushes pending data and shuts down the writing side.
    pub async fn close(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.tx.shutdown().await
    }

    fn push_count(&mut self, count: usize) {
        // Writing into a `String` never fails.
        let _ = writeln!(self.buf, "{count}");
    }

    fn push_row(&mut self, label: Option<f64>, row: &[f64]) {
        let mut first = true;
        for value in label.iter().chain(row) {
            if !first {
                self.buf.push(' ');
            }
            let _ = write!(self.buf, "{value:?}");
            first = false;
        }

        self.buf.push('\n');
    }

    async fn write_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.tx.write_all(self.buf.as_bytes()).await?;
            self.buf.clear();
        }

        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let Self { buf, tx } = self;

        if !buf.is_empty() {
            tx.write_all(buf.as_bytes()).await?;
            buf.clear();
        }

        tx.flush().await
    }
}
