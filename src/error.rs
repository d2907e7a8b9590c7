use thiserror::Error;

/// Errors raised by index construction and queries.
///
/// Construction errors abort construction. Query errors abort only the
/// offending query; the index stays usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Coordinate input is not a rectangular `(n, k)` array of finite numbers.
    #[error("invalid coordinate shape: {reason}")]
    InvalidShape { reason: String },

    /// A scalar query or construction parameter is out of its domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A transform matrix is malformed, of the wrong dimension, or singular.
    #[error("invalid transform: {reason}")]
    InvalidTransform { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        Error::InvalidShape {
            reason: reason.into(),
        }
    }

    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn transform(reason: impl Into<String>) -> Self {
        Error::InvalidTransform {
            reason: reason.into(),
        }
    }
}

// Shared checks for the positive scalars used throughout the query surface.
pub(crate) fn ensure_positive_radius(name: &'static str, r: f64) -> Result<()> {
    if r.is_nan() || r <= 0.0 {
        return Err(Error::parameter(
            name,
            format!("must be a number greater than zero, got {r}"),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_positive_count(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::parameter(name, "must be an integer greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = ensure_positive_radius("r", -1.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter `r`: must be a number greater than zero, got -1"
        );
        assert!(ensure_positive_radius("r", f64::NAN).is_err());
        assert!(ensure_positive_radius("r", 0.0).is_err());
        assert!(ensure_positive_radius("r", f64::INFINITY).is_ok());
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(matches!(
            ensure_positive_count("bulk", 0),
            Err(Error::InvalidParameter { name: "bulk", .. })
        ));
        assert!(ensure_positive_count("bulk", 1).is_ok());
    }
}
