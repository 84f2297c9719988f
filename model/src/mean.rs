use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Model, Result,
    model::{check_batch, check_finite, check_width},
};

/// Predicts the mean training label for every row, regardless of its features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    #[serde(default)]
    mean: Option<f64>,
    #[serde(default)]
    n_features: usize,
}

impl Model for MeanRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_batch(&x, &y)?;

        let mean = y.mean().ok_or(MlErr::EmptyBatch)?;
        check_finite("mean", &[mean])?;
        self.mean = Some(mean);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(MlErr::NotFitted)?;
        check_width(&x, self.n_features)?;
        Ok(Array1::from_elem(x.nrows(), mean))
    }

    fn describe(&self) -> String {
        match self.mean {
            Some(mean) => format!("MeanRegressor(mean={mean})"),
            None => "MeanRegressor(unfitted)".to_string(),
        }
    }
}
