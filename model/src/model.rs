use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{MlErr, Result};

/// What kind of output a model can produce when it's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Only point predictions through `Model::predict`.
    Predictor,
    /// Class probability vectors through `Model::predict_proba` as well.
    Probabilistic,
}

impl Capability {
    /// Whether this capability includes probability output.
    pub fn is_probabilistic(self) -> bool {
        matches!(self, Capability::Probabilistic)
    }
}

/// A trainable predictor.
///
/// Implementations own their fitted state. `fit` replaces that state entirely,
/// there is no incremental training.
pub trait Model {
    /// Fits the model on the design matrix `x` and the labels `y`.
    ///
    /// # Arguments
    /// * `x` - One row per sample.
    /// * `y` - One label per row of `x`.
    ///
    /// # Errors
    /// Returns `MlErr` if the batch is empty, the shapes disagree or the fit fails.
    /// On error the previous state must be left untouched.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predicts a single value per row of `x`.
    ///
    /// # Errors
    /// Returns `MlErr` if the model isn't fitted or the width of `x` is wrong.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Predicts a class probability vector per row of `x`.
    ///
    /// # Errors
    /// Fails with `MlErr::CapabilityAbsent` unless the model is probabilistic.
    fn predict_proba(&self, _x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        Err(MlErr::CapabilityAbsent("predict_proba"))
    }

    /// The output capability of the model.
    fn capability(&self) -> Capability {
        Capability::Predictor
    }

    /// A single-line, human-readable description of the model.
    fn describe(&self) -> String;
}

/// Checks that `x` and `y` make a valid training batch.
pub(crate) fn check_batch(x: &ArrayView2<'_, f64>, y: &ArrayView1<'_, f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(MlErr::EmptyBatch);
    }

    if y.len() != x.nrows() {
        return Err(MlErr::ShapeMismatch {
            what: "labels",
            got: y.len(),
            expected: x.nrows(),
        });
    }

    if !x.iter().all(|v| v.is_finite()) {
        return Err(MlErr::NonFinite("features"));
    }

    if !y.iter().all(|v| v.is_finite()) {
        return Err(MlErr::NonFinite("labels"));
    }

    Ok(())
}

/// Checks that fitted parameters can be stored in a snapshot, which has no
/// representation for infinities or NaN.
pub(crate) fn check_finite(what: &'static str, values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(MlErr::NonFinite(what))
    }
}

/// Checks that `x` has the number of features the model was fitted with.
pub(crate) fn check_width(x: &ArrayView2<'_, f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(MlErr::ShapeMismatch {
            what: "features",
            got: x.ncols(),
            expected,
        });
    }

    Ok(())
}

/// Formats a slice the way the estimators print their parameters.
pub(crate) fn fmt_values(values: &[f64]) -> String {
    let inner: Vec<String> = values.iter().map(f64::to_string).collect();
    format!("[{}]", inner.join(", "))
}
