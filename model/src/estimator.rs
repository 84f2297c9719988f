use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{Capability, LinearRegression, MeanRegressor, Model, NearestCentroid, Result};

/// Every model family the server binary knows how to load from a snapshot.
///
/// Snapshots carry a `kind` tag, e.g. `{"kind":"linear_regression","alpha":0.0}`
/// is an unfitted linear regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LinearRegression(LinearRegression),
    NearestCentroid(NearestCentroid),
    Mean(MeanRegressor),
}

impl Estimator {
    fn inner(&self) -> &dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::NearestCentroid(m) => m,
            Estimator::Mean(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::NearestCentroid(m) => m,
            Estimator::Mean(m) => m,
        }
    }
}

impl Model for Estimator {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn capability(&self) -> Capability {
        self.inner().capability()
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }
}

impl From<LinearRegression> for Estimator {
    fn from(value: LinearRegression) -> Self {
        Self::LinearRegression(value)
    }
}

impl From<NearestCentroid> for Estimator {
    fn from(value: NearestCentroid) -> Self {
        Self::NearestCentroid(value)
    }
}

impl From<MeanRegressor> for Estimator {
    fn from(value: MeanRegressor) -> Self {
        Self::Mean(value)
    }
}
