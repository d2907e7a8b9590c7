use crate::error::{Error, Result};

/// A query parameter that is either shared by every query point or given
/// once per query point.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam<T> {
    Uniform(T),
    PerPoint(Vec<T>),
}

/// Ball radius, one for all query points or one each.
pub type Radius = QueryParam<f64>;

/// Number of neighbours, one for all query points or one each.
pub type K = QueryParam<usize>;

impl<T: Copy> QueryParam<T> {
    /// Value for query point `i`.
    ///
    /// # Panics
    /// If a per-point list is shorter than `i + 1`; lists are checked against
    /// the batch size before any query runs.
    #[must_use]
    pub fn get(&self, i: usize) -> T {
        match self {
            QueryParam::Uniform(value) => *value,
            QueryParam::PerPoint(values) => values[i],
        }
    }

    pub(crate) fn values(&self) -> &[T] {
        match self {
            QueryParam::Uniform(value) => std::slice::from_ref(value),
            QueryParam::PerPoint(values) => values,
        }
    }

    /// Checks that a per-point list has one entry per query point and that
    /// every value passes `check`.
    pub(crate) fn validate(
        &self,
        name: &'static str,
        num_queries: usize,
        check: impl Fn(T) -> Result<()>,
    ) -> Result<()> {
        if let QueryParam::PerPoint(values) = self {
            if values.len() != num_queries {
                return Err(Error::parameter(
                    name,
                    format!(
                        "expected one value per query point ({num_queries}), got {}",
                        values.len()
                    ),
                ));
            }
        }
        self.values().iter().try_for_each(|&value| check(value))
    }
}

impl From<f64> for Radius {
    fn from(value: f64) -> Self {
        QueryParam::Uniform(value)
    }
}

impl From<usize> for K {
    fn from(value: usize) -> Self {
        QueryParam::Uniform(value)
    }
}

impl<T> From<Vec<T>> for QueryParam<T> {
    fn from(values: Vec<T>) -> Self {
        QueryParam::PerPoint(values)
    }
}

impl<T: Clone> From<&[T]> for QueryParam<T> {
    fn from(values: &[T]) -> Self {
        QueryParam::PerPoint(values.to_vec())
    }
}
