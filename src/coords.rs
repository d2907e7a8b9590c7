//! Canonical `(n, k)` coordinate storage.
//!
//! Every point set handed to the index, and every batch of query points, goes
//! through [`Coords`] so that downstream code can rely on a rectangular,
//! non-empty, finite, row-major layout.

use conv::ValueFrom;

use crate::error::{Error, Result};

/// An immutable, ordered sequence of `n` points with `k` coordinates each.
///
/// Point `i` is row `i`; its identifier is `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coords {
    data: Vec<f64>,
    dim: usize,
}

impl Coords {
    /// Wraps a flat row-major buffer of `n * dim` values.
    pub fn new(data: Vec<f64>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::shape("points need at least one dimension"));
        }
        if data.is_empty() {
            return Err(Error::shape("at least one point is required"));
        }
        if data.len() % dim != 0 {
            return Err(Error::shape(format!(
                "{} values cannot be split into rows of {dim} coordinates",
                data.len()
            )));
        }
        if let Some(pos) = data.iter().position(|x| !x.is_finite()) {
            return Err(Error::shape(format!(
                "coordinate {} of point {} is not finite",
                pos % dim,
                pos / dim
            )));
        }
        Ok(Coords { data, dim })
    }

    /// Builds coordinates from rows of `f64`; every row must have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map_or(0, |row| row.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(ragged(i, row.len(), dim));
            }
            data.extend_from_slice(row);
        }
        Coords::new(data, dim)
    }

    /// Builds coordinates from rows of any numeric type that converts to `f64`
    /// without loss, e.g. integer grid indices.
    pub fn from_numeric_rows<T, R>(rows: &[R]) -> Result<Self>
    where
        T: Copy,
        f64: ValueFrom<T>,
        R: AsRef<[T]>,
    {
        let dim = rows.first().map_or(0, |row| row.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(ragged(i, row.len(), dim));
            }
            for (j, &value) in row.iter().enumerate() {
                let value = f64::value_from(value).map_err(|_| {
                    Error::shape(format!(
                        "coordinate {j} of point {i} has no exact floating-point representation"
                    ))
                })?;
                data.push(value);
            }
        }
        Coords::new(data, dim)
    }

    /// Builds coordinates from fixed-size points.
    pub fn from_points<const D: usize>(points: &[[f64; D]]) -> Result<Self> {
        Coords::new(points.iter().flatten().copied().collect(), D)
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Always false: a `Coords` holds at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of coordinates per point.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Coordinates of point `id`.
    ///
    /// # Panics
    /// If `id >= self.len()`.
    #[must_use]
    pub fn point(&self, id: usize) -> &[f64] {
        &self.data[id * self.dim..(id + 1) * self.dim]
    }

    /// Value of point `id` on `axis`.
    #[must_use]
    pub fn value(&self, id: usize, axis: usize) -> f64 {
        self.data[id * self.dim + axis]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.dim)
    }

    #[must_use]
    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }
}

fn ragged(row: usize, len: usize, dim: usize) -> Error {
    Error::shape(format!(
        "row {row} has {len} coordinates, expected {dim} like the first row"
    ))
}
