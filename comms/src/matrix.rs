use crate::{CodecErr, Result};

/// A dense, row-major matrix of `f64` with a uniform row width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Creates an empty matrix whose width is fixed by the first pushed row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from its rows.
    ///
    /// # Errors
    /// Returns `CodecErr::Malformed` if the rows don't share the same width, the
    /// reported line is the 1-based index of the offending row.
    pub fn from_rows<I, R>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f64]>,
    {
        let mut matrix = Self::new();
        for (i, row) in rows.into_iter().enumerate() {
            matrix.push_row(row.as_ref()).map_err(|reason| CodecErr::malformed(i + 1, reason))?;
        }

        Ok(matrix)
    }

    /// Appends a row, failing with a description if its width differs from the
    /// previous rows.
    pub(crate) fn push_row(&mut self, row: &[f64]) -> std::result::Result<(), String> {
        if self.nrows > 0 && row.len() != self.ncols {
            return Err(format!(
                "row has {} values, expected {}",
                row.len(),
                self.ncols
            ));
        }

        self.ncols = row.len();
        self.nrows += 1;
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    /// The row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Iterates over the rows. Zero-width rows are yielded as empty slices.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let ncols = self.ncols;
        (0..self.nrows).map(move |i| &self.data[i * ncols..(i + 1) * ncols])
    }

    /// Consumes the matrix returning `(nrows, ncols, data)`.
    pub fn into_raw(self) -> (usize, usize, Vec<f64>) {
        (self.nrows, self.ncols, self.data)
    }
}

/// A design matrix together with one label per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingBatch {
    x: Matrix,
    y: Vec<f64>,
}

impl TrainingBatch {
    /// Pairs `x` with its labels.
    ///
    /// # Errors
    /// Returns `CodecErr::Malformed` if `y` doesn't have one label per row of `x`.
    pub fn new(x: Matrix, y: Vec<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(CodecErr::malformed(
                0,
                format!("{} labels for {} rows", y.len(), x.nrows()),
            ));
        }

        Ok(Self { x, y })
    }

    pub fn x(&self) -> &Matrix {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn into_parts(self) -> (Matrix, Vec<f64>) {
        (self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_row_major() {
        let m = Matrix::from_rows([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        assert_eq!((m.nrows(), m.ncols()), (3, 2));
        assert_eq!(m.rows().nth(1), Some(&[3.0, 4.0][..]));
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        let err = Matrix::from_rows(rows).unwrap_err();
        assert!(matches!(err, CodecErr::Malformed { line: 2, .. }));
    }

    #[test]
    fn zero_width_rows_still_count() {
        let rows: Vec<Vec<f64>> = vec![vec![], vec![]];
        let m = Matrix::from_rows(rows).unwrap();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.rows().count(), 2);
    }

    #[test]
    fn batch_requires_one_label_per_row() {
        let x = Matrix::from_rows([[1.0], [2.0]]).unwrap();
        assert!(TrainingBatch::new(x.clone(), vec![1.0]).is_err());
        assert_eq!(TrainingBatch::new(x, vec![1.0, 2.0]).unwrap().len(), 2);
    }
}
