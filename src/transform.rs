//! Affine transforms in homogeneous coordinates.
//!
//! A transform of `k`-dimensional points is a `(k+1) x (k+1)` matrix whose
//! last row is `[0, ..., 0, 1]`. Only invertible matrices are accepted, so
//! every [`AffineTransform`] carries its inverse.

use nalgebra::DMatrix;

use crate::coords::Coords;
use crate::error::{Error, Result};

const AFFINE_ROW_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    matrix: DMatrix<f64>,
    inverse: DMatrix<f64>,
    identity: bool,
}

impl AffineTransform {
    /// The identity transform of `dim`-dimensional points.
    ///
    /// # Panics
    /// If `dim` is zero.
    #[must_use]
    pub fn identity(dim: usize) -> Self {
        assert!(dim > 0, "transform dimension must be positive");
        let matrix = DMatrix::identity(dim + 1, dim + 1);
        AffineTransform {
            inverse: matrix.clone(),
            matrix,
            identity: true,
        }
    }

    /// Validates a homogeneous matrix and wraps it.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(Error::transform(format!(
                "matrix must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let size = matrix.nrows();
        if size < 2 {
            return Err(Error::transform(format!(
                "matrix must be at least 2x2, got {size}x{size}"
            )));
        }
        if matrix.iter().any(|x| !x.is_finite()) {
            return Err(Error::transform("matrix contains non-finite values"));
        }
        let last = size - 1;
        for j in 0..size {
            let expected = if j == last { 1.0 } else { 0.0 };
            if (matrix[(last, j)] - expected).abs() > AFFINE_ROW_TOLERANCE {
                return Err(Error::transform(
                    "last row must be [0, ..., 0, 1] for an affine transform",
                ));
            }
        }
        let inverse = matrix
            .clone()
            .try_inverse()
            .filter(|inv| inv.iter().all(|x| x.is_finite()))
            .ok_or_else(|| Error::transform("matrix is not invertible"))?;
        Ok(AffineTransform::assemble(matrix, inverse))
    }

    /// Builds a transform from row-major matrix rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != size {
                return Err(Error::transform(format!(
                    "row {i} has {} entries, a {size}x{size} matrix is required",
                    row.len()
                )));
            }
            values.extend_from_slice(row);
        }
        AffineTransform::from_matrix(DMatrix::from_row_slice(size, size, &values))
    }

    /// Shifts every point by `offset`.
    pub fn translation(offset: &[f64]) -> Result<Self> {
        let dim = offset.len();
        if dim == 0 {
            return Err(Error::transform("translation needs at least one dimension"));
        }
        let mut matrix = DMatrix::identity(dim + 1, dim + 1);
        for (i, &t) in offset.iter().enumerate() {
            matrix[(i, dim)] = t;
        }
        AffineTransform::from_matrix(matrix)
    }

    /// Scales every axis by its factor. Zero factors are singular.
    pub fn scaling(factors: &[f64]) -> Result<Self> {
        let dim = factors.len();
        if dim == 0 {
            return Err(Error::transform("scaling needs at least one dimension"));
        }
        let mut matrix = DMatrix::identity(dim + 1, dim + 1);
        for (i, &s) in factors.iter().enumerate() {
            matrix[(i, i)] = s;
        }
        AffineTransform::from_matrix(matrix)
    }

    /// Rotates by `angle` radians in the plane spanned by `axis_a` and
    /// `axis_b`, turning `axis_a` towards `axis_b`.
    pub fn rotation(dim: usize, axis_a: usize, axis_b: usize, angle: f64) -> Result<Self> {
        if axis_a >= dim || axis_b >= dim || axis_a == axis_b {
            return Err(Error::transform(format!(
                "rotation plane ({axis_a}, {axis_b}) must be two distinct axes below {dim}"
            )));
        }
        let (sin, cos) = angle.sin_cos();
        let mut matrix = DMatrix::identity(dim + 1, dim + 1);
        matrix[(axis_a, axis_a)] = cos;
        matrix[(axis_a, axis_b)] = -sin;
        matrix[(axis_b, axis_a)] = sin;
        matrix[(axis_b, axis_b)] = cos;
        AffineTransform::from_matrix(matrix)
    }

    /// The transform applying `self` first and `next` second.
    pub fn then(&self, next: &AffineTransform) -> Result<Self> {
        if self.dim() != next.dim() {
            return Err(Error::transform(format!(
                "cannot compose a {}-dimensional transform with a {}-dimensional one",
                self.dim(),
                next.dim()
            )));
        }
        Ok(AffineTransform::assemble(
            &next.matrix * &self.matrix,
            &self.inverse * &next.inverse,
        ))
    }

    #[must_use]
    pub fn inverse(&self) -> Self {
        AffineTransform {
            matrix: self.inverse.clone(),
            inverse: self.matrix.clone(),
            identity: self.identity,
        }
    }

    fn assemble(matrix: DMatrix<f64>, inverse: DMatrix<f64>) -> Self {
        let size = matrix.nrows();
        let identity = matrix == DMatrix::identity(size, size);
        AffineTransform {
            matrix,
            inverse,
            identity,
        }
    }

    /// Dimension `k` of the points this transform acts on.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.matrix.nrows() - 1
    }

    /// The homogeneous `(k+1) x (k+1)` matrix.
    #[must_use]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transforms the leading `k` coordinates of `point`.
    ///
    /// # Panics
    /// If `point` has fewer than `k` coordinates.
    #[must_use]
    pub fn apply(&self, point: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dim());
        self.apply_into(point, &mut out);
        out
    }

    /// Like [`apply`](Self::apply), writing into a reused buffer.
    pub fn apply_into(&self, point: &[f64], out: &mut Vec<f64>) {
        let dim = self.dim();
        let point = &point[..dim];
        out.clear();
        if self.is_identity() {
            out.extend_from_slice(point);
            return;
        }
        for i in 0..dim {
            let mut value = self.matrix[(i, dim)];
            for (j, x) in point.iter().enumerate() {
                value += self.matrix[(i, j)] * x;
            }
            out.push(value);
        }
    }

    /// Transforms every point of `coords`.
    pub fn apply_coords(&self, coords: &Coords) -> Result<Coords> {
        if coords.dim() != self.dim() {
            return Err(Error::transform(format!(
                "a {}x{} matrix cannot transform {}-dimensional points",
                self.dim() + 1,
                self.dim() + 1,
                coords.dim()
            )));
        }
        if self.is_identity() {
            return Ok(coords.clone());
        }
        let mut data = Vec::with_capacity(coords.as_flat().len());
        let mut buffer = Vec::with_capacity(self.dim());
        for point in coords.iter() {
            self.apply_into(point, &mut buffer);
            data.extend_from_slice(&buffer);
        }
        Coords::new(data, self.dim())
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn identity_is_a_no_op() {
        let t = AffineTransform::identity(3);
        assert!(t.is_identity());
        assert_eq!(t.dim(), 3);
        assert_eq!(t.apply(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn translate_then_rotate() {
        let shift = AffineTransform::translation(&[1.0, 0.0]).expect("valid");
        let turn = AffineTransform::rotation(2, 0, 1, FRAC_PI_2).expect("valid");
        let t = shift.then(&turn).expect("same dimension");
        assert_close(&t.apply(&[1.0, 0.0]), &[0.0, 2.0]);
        assert_close(&t.inverse().apply(&[0.0, 2.0]), &[1.0, 0.0]);
    }

    #[test]
    fn extra_coordinates_are_ignored() {
        let t = AffineTransform::scaling(&[2.0, 3.0]).expect("valid");
        assert_close(&t.apply(&[1.0, 1.0, 9.0]), &[2.0, 3.0]);
    }

    #[test]
    fn singular_matrices_are_rejected() {
        assert!(matches!(
            AffineTransform::scaling(&[1.0, 0.0]),
            Err(Error::InvalidTransform { .. })
        ));
    }

    #[test]
    fn malformed_matrices_are_rejected() {
        let not_square = AffineTransform::from_rows(&[vec![1.0, 0.0], vec![0.0]]);
        assert!(matches!(not_square, Err(Error::InvalidTransform { .. })));

        let projective = AffineTransform::from_rows(&[
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.5, 0.0, 1.0],
        ]);
        assert!(matches!(projective, Err(Error::InvalidTransform { .. })));

        assert!(AffineTransform::rotation(2, 0, 0, 1.0).is_err());
        assert!(AffineTransform::rotation(2, 0, 2, 1.0).is_err());
    }

    #[test]
    fn coords_must_match_dimension() {
        let coords = Coords::from_rows(&[[0.0, 0.0, 0.0]]).expect("valid");
        let t = AffineTransform::identity(2);
        assert!(matches!(
            t.apply_coords(&coords),
            Err(Error::InvalidTransform { .. })
        ));
    }

    #[test]
    fn coords_are_transformed() {
        let coords = Coords::from_rows(&[[0.0, 0.0], [1.0, 2.0]]).expect("valid");
        let t = AffineTransform::translation(&[10.0, -1.0]).expect("valid");
        let moved = t.apply_coords(&coords).expect("same dimension");
        assert_eq!(moved.as_flat(), &[10.0, -1.0, 11.0, 1.0]);
    }
}
