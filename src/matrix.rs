use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::{NnErr, Result};

/// The `(rows, cols)` shape of a matrix.
pub type Size = (usize, usize);

/// A dense, row-major matrix of real numbers.
///
/// Every operation returns a new matrix, the only in place mutation is `set`. Operations on
/// incompatible shapes fail with `NnErr::ShapeMismatch` instead of producing a value.
///
/// On the wire a matrix is a plain `number[][]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Matrix {
    data: Array2<f64>,
}

impl Matrix {
    /// Creates a matrix of the given size where every element is `fill`.
    pub fn from_params(size: Size, fill: f64) -> Self {
        Self {
            data: Array2::from_elem(size, fill),
        }
    }

    /// Creates a matrix of the given size, calling `f` once per element in row-major order.
    pub fn from_fn<F>(size: Size, mut f: F) -> Self
    where
        F: FnMut() -> f64,
    {
        Self {
            data: Array2::from_shape_fn(size, |_| f()),
        }
    }

    /// Creates a matrix from a list of rows.
    ///
    /// # Arguments
    /// * `rows` - The rows of the matrix, all of them must have the same length.
    ///
    /// # Returns
    /// The new matrix or an error if there are no elements or the rows are ragged.
    pub fn from_array(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or_default();
        if cols == 0 {
            return Err(NnErr::EmptyMatrix);
        }

        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(NnErr::RaggedRows {
                row,
                got: r.len(),
                expected: cols,
            });
        }

        let data = Array2::from_shape_fn((rows.len(), cols), |(r, c)| rows[r][c]);
        Ok(Self { data })
    }

    /// Creates a matrix of the given size from its elements in row-major order.
    pub fn from_shape_vec(size: Size, values: Vec<f64>) -> Result<Self> {
        let from = (values.len(), 1);
        if from.0 != size.0 * size.1 {
            return Err(NnErr::ElementCountMismatch { from, to: size });
        }

        let data = Array2::from_shape_vec(size, values)
            .map_err(|_| NnErr::ElementCountMismatch { from, to: size })?;

        Ok(Self { data })
    }

    /// Creates a column vector, a `values.len() x 1` matrix.
    pub fn column(values: &[f64]) -> Self {
        Self {
            data: Array2::from_shape_fn((values.len(), 1), |(r, _)| values[r]),
        }
    }

    pub fn size(&self) -> Size {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Returns the element at `(row, col)` or `None` if out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get((row, col)).copied()
    }

    /// Overwrites the element at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let size = self.size();
        let slot = self
            .data
            .get_mut((row, col))
            .ok_or(NnErr::IndexOutOfBounds {
                index: (row, col),
                size,
            })?;

        *slot = value;
        Ok(())
    }

    /// Matrix product `self · other`, requires `self.cols() == other.rows()`.
    pub fn dot(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols() != other.rows() {
            return Err(self.mismatch("dot", other));
        }

        Ok(Self {
            data: self.data.dot(&other.data),
        })
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_size("add", other)?;
        Ok(Self {
            data: &self.data + &other.data,
        })
    }

    pub fn subtract(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_size("subtract", other)?;
        Ok(Self {
            data: &self.data - &other.data,
        })
    }

    /// Elementwise product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_size("hadamard", other)?;
        Ok(Self {
            data: &self.data * &other.data,
        })
    }

    /// Multiplies every element by `factor`.
    pub fn multiply(&self, factor: f64) -> Matrix {
        Self {
            data: self.data.mapv(|x| x * factor),
        }
    }

    /// Maps every element through `f`.
    pub fn apply<F>(&self, f: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.mapv(f),
        }
    }

    /// Combines two matrices of the same size element by element.
    pub fn zip_map<F>(&self, other: &Matrix, f: F) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.check_same_size("zip_map", other)?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| f(a, b));

        Ok(Self { data })
    }

    pub fn transpose(&self) -> Matrix {
        Self {
            data: self.data.t().to_owned(),
        }
    }

    /// Reflows the elements, in row-major order, into a matrix of a new shape.
    ///
    /// # Arguments
    /// * `size` - The new shape, it must hold the same amount of elements.
    ///
    /// # Returns
    /// The reshaped matrix or an error if the element counts differ.
    pub fn resize(&self, size: Size) -> Result<Matrix> {
        let from = self.size();
        if from.0 * from.1 != size.0 * size.1 {
            return Err(NnErr::ElementCountMismatch { from, to: size });
        }

        Self::from_shape_vec(size, self.to_vec())
    }

    /// Returns the rows of the matrix.
    pub fn to_array(&self) -> Vec<Vec<f64>> {
        self.data.outer_iter().map(|row| row.to_vec()).collect()
    }

    /// Returns the elements flattened in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Iterates the elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    fn check_same_size(&self, op: &'static str, other: &Matrix) -> Result<()> {
        if self.size() != other.size() {
            return Err(self.mismatch(op, other));
        }

        Ok(())
    }

    fn mismatch(&self, op: &'static str, other: &Matrix) -> NnErr {
        NnErr::ShapeMismatch {
            op,
            left: self.size(),
            right: other.size(),
        }
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = NnErr;

    fn try_from(value: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_array(&value)
    }
}

impl From<Matrix> for Vec<Vec<f64>> {
    fn from(value: Matrix) -> Self {
        value.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn m(rows: &[&[f64]]) -> Matrix {
        let rows: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
        Matrix::from_array(&rows).unwrap()
    }

    fn assert_close(a: &Matrix, b: &Matrix) {
        assert_eq!(a.size(), b.size());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < EPS, "{x} != {y}");
        }
    }

    #[test]
    fn dot_is_associative() {
        let a = m(&[&[1., 2., 3.], &[4., 5., 6.]]);
        let b = m(&[&[0.5, -1.], &[2., 0.25], &[-3., 1.5]]);
        let c = m(&[&[1.5, 0., -2.], &[0.1, 7., 3.]]);

        let left = a.dot(&b).unwrap().dot(&c).unwrap();
        let right = a.dot(&b.dot(&c).unwrap()).unwrap();
        assert_close(&left, &right);
    }

    #[test]
    fn dot_computes_the_product() {
        let a = m(&[&[1., 2.], &[3., 4.]]);
        let b = m(&[&[5.], &[6.]]);
        assert_eq!(a.dot(&b).unwrap().to_array(), vec![vec![17.], vec![39.]]);
    }

    #[test]
    fn dot_rejects_incompatible_shapes() {
        let a = Matrix::from_params((2, 3), 1.);
        let b = Matrix::from_params((2, 3), 1.);

        match a.dot(&b) {
            Err(NnErr::ShapeMismatch { op, left, right }) => {
                assert_eq!(op, "dot");
                assert_eq!(left, (2, 3));
                assert_eq!(right, (2, 3));
            }
            other => panic!("expected a shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn add_then_subtract_restores_the_matrix() {
        let a = m(&[&[1.25, -2.], &[3., 4.5]]);
        let b = m(&[&[0.1, 0.2], &[-0.3, 0.4]]);
        assert_close(&a.add(&b).unwrap().subtract(&b).unwrap(), &a);
    }

    #[test]
    fn elementwise_ops_require_equal_shapes() {
        let a = Matrix::from_params((2, 2), 1.);
        let b = Matrix::from_params((2, 1), 1.);
        assert!(a.add(&b).is_err());
        assert!(a.subtract(&b).is_err());
        assert!(a.hadamard(&b).is_err());
    }

    #[test]
    fn double_transpose_is_identity() {
        let a = m(&[&[1., 2., 3.], &[4., 5., 6.]]);
        let t = a.transpose();
        assert_eq!(t.size(), (3, 2));
        assert_eq!(t.get(2, 0), Some(3.));
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn resize_keeps_row_major_order() {
        let a = m(&[&[1., 2., 3.], &[4., 5., 6.]]);
        let r = a.resize((3, 2)).unwrap();
        assert_eq!(r.to_array(), vec![vec![1., 2.], vec![3., 4.], vec![5., 6.]]);
        assert_eq!(r.to_vec(), a.to_vec());
    }

    #[test]
    fn resize_fails_when_element_count_changes() {
        let a = Matrix::from_params((2, 3), 0.);
        assert!(matches!(
            a.resize((4, 2)),
            Err(NnErr::ElementCountMismatch {
                from: (2, 3),
                to: (4, 2)
            })
        ));
    }

    #[test]
    fn from_array_rejects_ragged_and_empty_input() {
        let ragged = vec![vec![1., 2.], vec![3.]];
        assert!(matches!(
            Matrix::from_array(&ragged),
            Err(NnErr::RaggedRows {
                row: 1,
                got: 1,
                expected: 2
            })
        ));
        assert!(matches!(Matrix::from_array(&[]), Err(NnErr::EmptyMatrix)));
        assert!(matches!(
            Matrix::from_array(&[vec![]]),
            Err(NnErr::EmptyMatrix)
        ));
    }

    #[test]
    fn set_and_get_respect_bounds() {
        let mut a = Matrix::from_params((2, 2), 0.);
        a.set(1, 0, 7.).unwrap();
        assert_eq!(a.get(1, 0), Some(7.));
        assert_eq!(a.get(2, 0), None);
        assert!(matches!(
            a.set(0, 2, 1.),
            Err(NnErr::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn operations_do_not_mutate_their_operands() {
        let a = m(&[&[1., 2.]]);
        let before = a.clone();
        let _ = a.multiply(3.);
        let _ = a.apply(|x| x * x);
        let _ = a.add(&a).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn column_builds_a_single_column() {
        let c = Matrix::column(&[1., 2., 3.]);
        assert_eq!(c.size(), (3, 1));
        assert_eq!(c.get(2, 0), Some(3.));
    }

    #[test]
    fn serializes_as_nested_arrays() {
        let a = m(&[&[1., 2.], &[3., 4.]]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "[[1.0,2.0],[3.0,4.0]]");

        let back: Matrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Matrix>("[[1.0],[2.0,3.0]]").is_err());
    }
}
