use crate::error::{Error, Result};

/// Minkowski distances supported by the ball and k-NN queries.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    /// p = 1
    Manhattan,
    /// p = 2
    #[default]
    Euclidean,
    /// p = infinity, balls are axis-aligned cubes.
    Chebyshev,
    /// General finite p >= 1.
    Minkowski(f64),
}

impl Metric {
    /// Picks the metric for exponent `p`, mapping 1, 2 and infinity to their
    /// named variants.
    pub fn minkowski(p: f64) -> Result<Metric> {
        if p.is_nan() || p < 1.0 {
            return Err(Error::parameter(
                "p",
                format!("Minkowski exponent must be at least 1, got {p}"),
            ));
        }
        Ok(if p == 1.0 {
            Metric::Manhattan
        } else if p == 2.0 {
            Metric::Euclidean
        } else if p.is_infinite() {
            Metric::Chebyshev
        } else {
            Metric::Minkowski(p)
        })
    }

    /// Re-checks a directly constructed `Minkowski(p)`.
    pub(crate) fn validated(self) -> Result<Metric> {
        match self {
            Metric::Minkowski(p) => Metric::minkowski(p),
            named => Ok(named),
        }
    }

    /// Distance between two points of equal dimension.
    #[must_use]
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        self.combine(a.iter().zip(b).map(|(x, y)| (x - y).abs()))
    }

    /// Folds per-axis absolute differences into a distance.
    pub(crate) fn combine(self, gaps: impl Iterator<Item = f64> + Clone) -> f64 {
        match self {
            Metric::Manhattan => gaps.sum(),
            Metric::Euclidean => gaps.map(|g| g * g).sum::<f64>().sqrt(),
            Metric::Chebyshev => gaps.fold(0.0, f64::max),
            Metric::Minkowski(p) => {
                // Gaps are scaled by the largest one so that g^p cannot overflow.
                let largest = gaps.clone().fold(0.0, f64::max);
                if largest == 0.0 || largest.is_infinite() {
                    return largest;
                }
                let sum: f64 = gaps.map(|g| (g / largest).powf(p)).sum();
                largest * sum.powf(p.recip())
            }
        }
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    Metric::Euclidean.distance(a, b)
}
