use std::net::SocketAddr;

use comms::{Command, LineReceiver, LineSender, Limits, Matrix, SnapshotEncoding, TrainingBatch};
use log::debug;
use serde::de::DeserializeOwned;
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpStream,
};

use crate::ClientErr;

type Channel = (LineReceiver<OwnedReadHalf>, LineSender<OwnedWriteHalf>);

/// The client side of the protocol. Every call opens its own connection.
#[derive(Debug, Clone)]
pub struct ModelClient {
    addr: SocketAddr,
    encoding: SnapshotEncoding,
    limits: Limits,
}

impl ModelClient {
    /// Creates a new `ModelClient` for a server at `addr`, expecting raw snapshots.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            encoding: SnapshotEncoding::Raw,
            limits: Limits::default(),
        }
    }

    /// Sets the snapshot layout the server was started with.
    pub fn with_encoding(mut self, encoding: SnapshotEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends `train` with `batch` and waits for the snapshot of the refitted model.
    ///
    /// # Returns
    /// The snapshot bytes, as laid out by the server.
    ///
    /// # Errors
    /// `ClientErr::Aborted` if the server closed the connection without a
    /// snapshot, which happens when the batch is rejected or the fit fails.
    pub async fn train(&self, batch: &TrainingBatch) -> Result<Vec<u8>, ClientErr> {
        let (rx, mut tx) = self.open(Command::Train).await?;
        tx.send_batch(batch).await?;

        let snapshot = rx.recv_blob().await?;
        if snapshot.is_empty() {
            return Err(ClientErr::Aborted("no snapshot received".to_string()));
        }

        debug!(bytes = snapshot.len(); "received snapshot");
        Ok(snapshot)
    }

    /// Same as `train` but decodes the snapshot.
    pub async fn train_model<M: DeserializeOwned>(
        &self,
        batch: &TrainingBatch,
    ) -> Result<M, ClientErr> {
        let snapshot = self.train(batch).await?;
        self.decode_snapshot(&snapshot)
    }

    /// Decodes a snapshot returned by `train` with the configured layout.
    pub fn decode_snapshot<M: DeserializeOwned>(&self, snapshot: &[u8]) -> Result<M, ClientErr> {
        Ok(self.encoding.decode(snapshot)?)
    }

    /// Sends `run` with `x` and collects one output row per row of `x`. Rows
    /// hold a single prediction or the class probabilities.
    ///
    /// # Errors
    /// `ClientErr::Aborted` if fewer rows than sent came back.
    pub async fn run(&self, x: &Matrix) -> Result<Vec<Vec<f64>>, ClientErr> {
        let (mut rx, mut tx) = self.open(Command::Run).await?;
        tx.send_matrix(x).await?;

        let rows = rx.recv_rows_to_end().await?;
        if rows.len() != x.nrows() {
            return Err(ClientErr::Aborted(format!(
                "expected {} output rows, got {}",
                x.nrows(),
                rows.len()
            )));
        }

        Ok(rows)
    }

    /// Same as `run` for point predictors, one value per row.
    pub async fn predict(&self, x: &Matrix) -> Result<Vec<f64>, ClientErr> {
        self.run(x)
            .await?
            .into_iter()
            .map(|row| match row.as_slice() {
                [value] => Ok(*value),
                _ => Err(ClientErr::Aborted(format!(
                    "expected a single prediction per row, got {} values",
                    row.len()
                ))),
            })
            .collect()
    }

    /// Sends `type` and returns the model description.
    pub async fn describe(&self) -> Result<String, ClientErr> {
        let (mut rx, _tx) = self.open(Command::Type).await?;

        rx.recv_line()
            .await?
            .ok_or_else(|| ClientErr::Aborted("no description received".to_string()))
    }

    /// Sends `exit` and waits for the server to close the connection.
    pub async fn exit(&self) -> Result<(), ClientErr> {
        let (mut rx, _tx) = self.open(Command::Exit).await?;

        while rx.recv_line().await?.is_some() {}
        Ok(())
    }

    async fn open(&self, command: Command) -> Result<Channel, ClientErr> {
        let stream = TcpStream::connect(self.addr).await?;
        let (rx, tx) = stream.into_split();
        let (rx, mut tx) = comms::channel_with_limits(rx, tx, self.limits);

        debug!(command = command.keyword(); "connected to {}", self.addr);
        tx.send_command(command).await?;
        Ok((rx, tx))
    }
}
