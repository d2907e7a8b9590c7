use crate::coords::Coords;
use crate::distance::Metric;
use crate::error::{Error, Result};

/// An inclusive axis-aligned box.
///
/// Bounds both tree nodes and box queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl Extent {
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<Extent> {
        if min.len() != max.len() || min.is_empty() {
            return Err(Error::parameter(
                "extent",
                format!(
                    "needs the same positive number of minimum and maximum bounds, got {} and {}",
                    min.len(),
                    max.len()
                ),
            ));
        }
        for (axis, (lo, hi)) in min.iter().zip(&max).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(Error::parameter(
                    "extent",
                    format!("minimum {lo} exceeds maximum {hi} on axis {axis}"),
                ));
            }
        }
        Ok(Extent { min, max })
    }

    /// Splits `[min_0, ..., min_k-1, max_0, ..., max_k-1]`.
    pub fn from_bounds(bounds: &[f64]) -> Result<Extent> {
        if bounds.len() % 2 != 0 {
            return Err(Error::parameter(
                "extent",
                format!("expected 2k bounds, got {}", bounds.len()),
            ));
        }
        let (min, max) = bounds.split_at(bounds.len() / 2);
        Extent::new(min.to_vec(), max.to_vec())
    }

    /// Tight extent of the points `ids` of `coords`. `ids` must not be empty.
    pub(crate) fn of_points(coords: &Coords, ids: &[usize]) -> Extent {
        let first = coords.point(ids[0]);
        let mut extent = Extent {
            min: first.to_vec(),
            max: first.to_vec(),
        };
        for &id in &ids[1..] {
            extent.include_point(coords.point(id));
        }
        extent
    }

    pub(crate) fn include_point(&mut self, point: &[f64]) {
        for (axis, &x) in point.iter().enumerate() {
            self.min[axis] = self.min[axis].min(x);
            self.max[axis] = self.max[axis].max(x);
        }
    }

    pub(crate) fn include(&mut self, other: &Extent) {
        for axis in 0..self.dim() {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    pub(crate) fn center(&self, axis: usize) -> f64 {
        0.5 * (self.min[axis] + self.max[axis])
    }

    pub(crate) fn width(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    #[must_use]
    pub fn contains_point(&self, point: &[f64]) -> bool {
        point
            .iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(x, (lo, hi))| lo <= x && x <= hi)
    }

    pub(crate) fn contains(&self, other: &Extent) -> bool {
        (0..self.dim())
            .all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    pub(crate) fn intersects(&self, other: &Extent) -> bool {
        (0..self.dim())
            .all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    /// Smallest distance from `point` to any location inside the box.
    pub(crate) fn min_distance(&self, point: &[f64], metric: Metric) -> f64 {
        metric.combine(
            point
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .map(|(x, (lo, hi))| (lo - x).max(x - hi).max(0.0)),
        )
    }

    /// Largest distance from `point` to any location inside the box.
    pub(crate) fn max_distance(&self, point: &[f64], metric: Metric) -> f64 {
        metric.combine(
            point
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .map(|(x, (lo, hi))| (x - lo).abs().max((hi - x).abs())),
        )
    }
}
