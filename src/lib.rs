//! Spatial queries over large, fixed sets of k-dimensional points.
//!
//! ```
//! use kdindex::{Coords, Extent, IndexKd, IndexOptions};
//!
//! let rows: Vec<[i32; 2]> = (0..5).flat_map(|i| (0..10).map(move |j| [i, j])).collect();
//! let index = IndexKd::new(Coords::from_numeric_rows(&rows)?, IndexOptions::default())?;
//! assert_eq!(index.len(), 50);
//! assert_eq!(index.dim(), 2);
//!
//! assert_eq!(index.ball(&[0.0, 0.0], 1.0)?, vec![0, 1, 10]);
//! assert_eq!(index.closest(3)?, (1.0, 2));
//!
//! let extent = Extent::from_bounds(&[0.0, 0.0, 1.0, 2.0])?;
//! assert_eq!(index.box_count(&extent)?, 6);
//! # Ok::<(), kdindex::Error>(())
//! ```

mod bulk;
mod coords;
mod distance;
mod error;
mod extent;
mod filter;
mod index;
mod kdtree;
mod options;
mod params;
mod rtree;
mod transform;

pub use bulk::BulkIter;
pub use coords::Coords;
pub use distance::{euclidean, Metric};
pub use error::{Error, Result};
pub use extent::Extent;
pub use filter::{resolve_axis, Above, BallFilter, Below};
pub use index::{IndexKd, Neighbours};
pub use kdtree::KdTree;
pub use options::{BuildMode, IndexOptions};
pub use params::{QueryParam, Radius, K};
pub use rtree::RTree;
pub use transform::AffineTransform;
