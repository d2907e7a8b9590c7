use crate::error::{ensure_positive_count, Result};

/// Trade-off between kd-tree build time and query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuildMode {
    /// Midpoint splits with cell bounds: cheap to build, looser balance.
    #[default]
    QuickBuild,
    /// Median splits with tight node bounds: slower to build, faster to query.
    QuickQuery,
}

/// Construction settings of an [`IndexKd`](crate::IndexKd).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IndexOptions {
    /// Maximum number of points in a kd-tree leaf.
    pub leaf_size: usize,
    pub build_mode: BuildMode,
    /// Number of query points processed per chunk by batch queries.
    pub bulk_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            leaf_size: 16,
            build_mode: BuildMode::QuickBuild,
            bulk_size: 100_000,
        }
    }
}

impl IndexOptions {
    #[must_use]
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    #[must_use]
    pub fn with_build_mode(mut self, build_mode: BuildMode) -> Self {
        self.build_mode = build_mode;
        self
    }

    #[must_use]
    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure_positive_count("leaf_size", self.leaf_size)?;
        ensure_positive_count("bulk_size", self.bulk_size)
    }
}
