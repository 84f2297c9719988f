//! The state a server holds between connections and the handlers that act on it.

use comms::{CodecErr, LineReceiver, LineSender, Matrix, SnapshotEncoding};
use log::{debug, info};
use model::{Capability, Model};
use ndarray::{Array2, ArrayView1};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SessionErr;

/// The served model together with how it's exposed.
#[derive(Debug, Clone)]
pub struct ServerContext<M> {
    model: M,
    capability: Capability,
    encoding: SnapshotEncoding,
}

impl<M> ServerContext<M>
where
    M: Model + Clone + Serialize,
{
    /// Creates a new `ServerContext`.
    ///
    /// # Arguments
    /// * `model` - The model to serve, fitted or not.
    /// * `encoding` - The layout of the snapshots sent back by `train`.
    pub fn new(model: M, encoding: SnapshotEncoding) -> Self {
        let capability = model.capability();
        Self {
            model,
            capability,
            encoding,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// The capability computed when the model was loaded. Training never
    /// changes the model family so it holds for the whole server lifetime.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn encoding(&self) -> SnapshotEncoding {
        self.encoding
    }

    /// Handles `train`: reads a labeled batch, refits the model on it and sends
    /// back the snapshot of the refitted model.
    ///
    /// The model in use is only replaced once the fit succeeded and its snapshot
    /// was built, any failure before that leaves it untouched.
    ///
    /// # Errors
    /// `MalformedPayload` for a bad batch, `ModelOperation` if the fit fails,
    /// `Snapshot` if the model can't be serialized and `Io` if the transfer fails.
    pub async fn train<R, W>(
        &mut self,
        rx: &mut LineReceiver<R>,
        tx: &mut LineSender<W>,
    ) -> Result<(), SessionErr>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let batch = rx.recv_batch().await?;
        info!(rows = batch.len(); "training");

        let (x, y) = batch.into_parts();
        let x = into_array(x)?;

        let mut fitted = self.model.clone();
        fitted.fit(x.view(), ArrayView1::from(&y))?;
        let snapshot = self.encoding.encode(&fitted)?;

        self.model = fitted;
        debug!(bytes = snapshot.len(); "sending snapshot");
        tx.send_blob(&snapshot).await?;

        Ok(())
    }

    /// Handles `run`: reads a matrix and answers with one line per row, a single
    /// prediction for point predictors or the class probabilities for
    /// probabilistic models.
    ///
    /// # Returns
    /// The number of rows answered.
    ///
    /// # Errors
    /// `MalformedPayload` for a bad matrix, `ModelOperation` if the model can't
    /// predict and `Io` if the transfer fails.
    pub async fn run<R, W>(
        &self,
        rx: &mut LineReceiver<R>,
        tx: &mut LineSender<W>,
    ) -> Result<usize, SessionErr>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let x = rx.recv_matrix().await?;
        let rows = x.nrows();
        info!(rows = rows; "running");

        if x.is_empty() {
            return Ok(0);
        }

        let x = into_array(x)?;
        match self.capability {
            Capability::Probabilistic => {
                let proba = self.model.predict_proba(x.view())?;
                let lines: Vec<Vec<f64>> = proba.outer_iter().map(|row| row.to_vec()).collect();
                tx.send_rows(lines).await?;
            }
            Capability::Predictor => {
                let predictions = self.model.predict(x.view())?.to_vec();
                tx.send_values(predictions).await?;
            }
        }

        Ok(rows)
    }

    /// Handles `type`: sends the model description as a single line.
    pub async fn describe<W>(&self, tx: &mut LineSender<W>) -> Result<(), SessionErr>
    where
        W: AsyncWrite + Unpin,
    {
        tx.send_text(&self.model.describe()).await?;
        Ok(())
    }
}

fn into_array(x: Matrix) -> Result<Array2<f64>, SessionErr> {
    let (nrows, ncols, data) = x.into_raw();
    Array2::from_shape_vec((nrows, ncols), data).map_err(|e| {
        SessionErr::MalformedPayload(CodecErr::Malformed {
            line: 0,
            reason: e.to_string(),
        })
    })
}
