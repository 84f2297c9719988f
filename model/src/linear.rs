use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Model, Result,
    model::{check_batch, check_width, fmt_values},
};

const PIVOT_EPS: f64 = 1e-12;

/// Ordinary least squares with an intercept and an optional ridge penalty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Ridge penalty on the coefficients, the intercept is never penalized.
    #[serde(default)]
    pub alpha: f64,
    #[serde(default)]
    fitted: Option<LinearFit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearFit {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Creates an unfitted model.
    ///
    /// # Arguments
    /// * `alpha` - The ridge penalty, `0.0` for plain least squares.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    /// The fitted `(intercept, coefficients)`, if any.
    pub fn params(&self) -> Option<(f64, &[f64])> {
        self.fitted
            .as_ref()
            .map(|fit| (fit.intercept, fit.coefficients.as_slice()))
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_batch(&x, &y)?;

        let (n, d) = x.dim();
        let mut design = Array2::<f64>::ones((n, d + 1));
        design.slice_mut(s![.., 1..]).assign(&x);

        let mut gram = design.t().dot(&design);
        for i in 1..=d {
            gram[[i, i]] += self.alpha;
        }

        let moments = design.t().dot(&y);
        let w = solve(gram, moments)?;

        self.fitted = Some(LinearFit {
            intercept: w[0],
            coefficients: w.slice(s![1..]).to_vec(),
        });

        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fit = self.fitted.as_ref().ok_or(MlErr::NotFitted)?;
        check_width(&x, fit.coefficients.len())?;

        let coefficients = ArrayView1::from(&fit.coefficients);
        Ok(x.dot(&coefficients) + fit.intercept)
    }

    fn describe(&self) -> String {
        match &self.fitted {
            Some(fit) => format!(
                "LinearRegression(alpha={}, intercept={}, coefficients={})",
                self.alpha,
                fit.intercept,
                fmt_values(&fit.coefficients)
            ),
            None => format!("LinearRegression(alpha={}, unfitted)", self.alpha),
        }
    }
}

/// Solves `m * w = b` through gaussian elimination with partial pivoting.
fn solve(mut m: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))
            .unwrap_or(col);

        if m[[pivot, col]].abs() < PIVOT_EPS {
            return Err(MlErr::Singular);
        }

        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in col + 1..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }

            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut w = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[[row, k]] * w[k]).sum();
        w[row] = (b[row] - tail) / m[[row, row]];
    }

    if w.iter().any(|v| !v.is_finite()) {
        return Err(MlErr::Singular);
    }

    Ok(w)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn fits_a_line() {
        let mut model = LinearRegression::default();
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 2.0, 4.0];

        model.fit(x.view(), y.view()).unwrap();
        let pred = model.predict(array![[3.0]].view()).unwrap();

        assert!((pred[0] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn fits_multiple_features_with_intercept() {
        let mut model = LinearRegression::default();
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 3.0]];
        let y = x.map_axis(ndarray::Axis(1), |r| 1.0 + 2.0 * r[0] - 3.0 * r[1]);

        model.fit(x.view(), y.view()).unwrap();
        let (intercept, coefficients) = model.params().unwrap();

        assert!((intercept - 1.0).abs() < 1e-9);
        assert!((coefficients[0] - 2.0).abs() < 1e-9);
        assert!((coefficients[1] + 3.0).abs() < 1e-9);
    }

    #[test]
    fn singular_fit_keeps_previous_state() {
        let mut model = LinearRegression::default();
        model
            .fit(array![[0.0], [1.0]].view(), array![1.0, 3.0].view())
            .unwrap();
        let before = model.clone();

        let res = model.fit(array![[1.0], [1.0]].view(), array![1.0, 2.0].view());

        assert_eq!(res, Err(MlErr::Singular));
        assert_eq!(model, before);
    }

    #[test]
    fn ridge_penalty_resolves_duplicate_rows() {
        let mut model = LinearRegression::new(0.1);
        let res = model.fit(array![[1.0], [1.0]].view(), array![1.0, 2.0].view());
        assert!(res.is_ok());
    }

    #[test]
    fn predict_requires_fit_and_matching_width() {
        let mut model = LinearRegression::default();
        assert_eq!(
            model.predict(array![[1.0]].view()),
            Err(MlErr::NotFitted)
        );

        model
            .fit(array![[0.0], [1.0]].view(), array![0.0, 1.0].view())
            .unwrap();
        let err = model.predict(array![[1.0, 2.0]].view()).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { got: 2, expected: 1, .. }));
    }

    #[test]
    fn is_not_probabilistic() {
        let model = LinearRegression::default();
        assert_eq!(model.capability(), crate::Capability::Predictor);
        assert_eq!(
            model.predict_proba(array![[1.0]].view()),
            Err(MlErr::CapabilityAbsent("predict_proba"))
        );
    }
}
