use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    Capability, MlErr, Model, Result,
    model::{check_batch, check_finite, check_width, fmt_values},
};

/// A probabilistic classifier that assigns each row to the class with the closest
/// mean. Probabilities are the softmax of the negated squared distances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    #[serde(default)]
    classes: Vec<f64>,
    #[serde(default)]
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    /// Creates an unfitted classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// The class labels in the order of the probability columns.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn centroid_matrix(&self) -> Result<Array2<f64>> {
        let width = self.centroids.first().map(Vec::len).ok_or(MlErr::NotFitted)?;
        let flat: Vec<f64> = self.centroids.iter().flatten().copied().collect();

        Array2::from_shape_vec((self.centroids.len(), width), flat).map_err(|_| {
            MlErr::ShapeMismatch {
                what: "centroids",
                got: self.centroids.len(),
                expected: self.classes.len(),
            }
        })
    }
}

impl Model for NearestCentroid {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_batch(&x, &y)?;

        let mut classes = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup_by(|a, b| a.total_cmp(b).is_eq());

        let mut sums = Array2::<f64>::zeros((classes.len(), x.ncols()));
        let mut counts = vec![0usize; classes.len()];

        for (row, label) in x.axis_iter(Axis(0)).zip(y) {
            let k = classes
                .binary_search_by(|c| c.total_cmp(label))
                .map_err(|_| MlErr::ShapeMismatch {
                    what: "classes",
                    got: classes.len() + 1,
                    expected: classes.len(),
                })?;

            let mut sum = sums.row_mut(k);
            sum += &row;
            counts[k] += 1;
        }

        let centroids: Vec<Vec<f64>> = sums
            .axis_iter(Axis(0))
            .zip(&counts)
            .map(|(sum, &count)| sum.iter().map(|v| v / count as f64).collect())
            .collect();

        for centroid in &centroids {
            check_finite("centroids", centroid)?;
        }

        self.classes = classes;
        self.centroids = centroids;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;

        let labels = proba
            .axis_iter(Axis(0))
            .map(|p| {
                let best = p
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(k, _)| k)
                    .unwrap_or_default();

                self.classes[best]
            })
            .collect();

        Ok(labels)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let centroids = self.centroid_matrix()?;
        check_width(&x, centroids.ncols())?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), centroids.nrows()));

        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            for (k, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                let diff = &row - &centroid;
                out[k] = -diff.dot(&diff);
            }

            let max = out.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            out.mapv_inplace(|v| (v - max).exp());
            let total = out.sum();
            out /= total;
        }

        Ok(proba)
    }

    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }

    fn describe(&self) -> String {
        if self.classes.is_empty() {
            return "NearestCentroid(unfitted)".to_string();
        }

        format!(
            "NearestCentroid(classes={}, n_features={})",
            fmt_values(&self.classes),
            self.centroids.first().map(Vec::len).unwrap_or_default()
        )
    }
}
