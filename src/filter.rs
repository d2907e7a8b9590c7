/// Decides whether a ball candidate is kept, given the ball center and the
/// candidate's coordinates, both in index space.
pub trait BallFilter {
    fn accept(&self, center: &[f64], candidate: &[f64]) -> bool;
}

impl<F> BallFilter for F
where
    F: Fn(&[f64], &[f64]) -> bool,
{
    fn accept(&self, center: &[f64], candidate: &[f64]) -> bool {
        self(center, candidate)
    }
}

/// Keeps candidates strictly above the center on `axis`.
///
/// Negative axes count from the last one; `-1` is elevation for 3-D clouds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Above {
    pub axis: isize,
}

/// Keeps candidates strictly below the center on `axis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Below {
    pub axis: isize,
}

impl Above {
    #[must_use]
    pub fn last() -> Self {
        Above { axis: -1 }
    }
}

impl Below {
    #[must_use]
    pub fn last() -> Self {
        Below { axis: -1 }
    }
}

impl Default for Above {
    fn default() -> Self {
        Above::last()
    }
}

impl Default for Below {
    fn default() -> Self {
        Below::last()
    }
}

impl BallFilter for Above {
    fn accept(&self, center: &[f64], candidate: &[f64]) -> bool {
        resolve_axis(self.axis, center.len()).is_some_and(|axis| candidate[axis] > center[axis])
    }
}

impl BallFilter for Below {
    fn accept(&self, center: &[f64], candidate: &[f64]) -> bool {
        resolve_axis(self.axis, center.len()).is_some_and(|axis| candidate[axis] < center[axis])
    }
}

/// Maps a possibly negative axis onto `[0, dim)`.
#[must_use]
pub fn resolve_axis(axis: isize, dim: usize) -> Option<usize> {
    let resolved = if axis < 0 {
        dim.checked_sub(axis.unsigned_abs())?
    } else {
        axis.unsigned_abs()
    };
    (resolved < dim).then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_axes() {
        assert_eq!(resolve_axis(-1, 3), Some(2));
        assert_eq!(resolve_axis(-3, 3), Some(0));
        assert_eq!(resolve_axis(-4, 3), None);
        assert_eq!(resolve_axis(2, 3), Some(2));
        assert_eq!(resolve_axis(3, 3), None);
    }

    #[test]
    fn above_and_below() {
        let center = [0.0, 0.0, 1.0];
        assert!(Above::last().accept(&center, &[5.0, 5.0, 1.5]));
        assert!(!Above::last().accept(&center, &[5.0, 5.0, 1.0]));
        assert!(Below::last().accept(&center, &[5.0, 5.0, 0.5]));
        assert!(!Below { axis: 0 }.accept(&center, &[0.0, -9.0, -9.0]));
    }

    #[test]
    fn closures_are_filters() {
        let same_x = |a: &[f64], b: &[f64]| a[0] == b[0];
        assert!(same_x.accept(&[1.0, 2.0], &[1.0, 7.0]));
        assert!(!same_x.accept(&[1.0, 2.0], &[2.0, 2.0]));
    }
}
