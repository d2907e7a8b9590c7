//! The spatial index façade.
//!
//! [`IndexKd`] stores a transformed snapshot of the input points and answers
//! every query family from one of two lazily built structures: a [`KdTree`]
//! for distance queries (balls, shells, nearest neighbours) and an [`RTree`]
//! for box queries. Either structure is built on the first query that needs
//! it and reused afterwards.
//!
//! Point-shaped query inputs (ball centers, k-NN query points) are given in
//! the same space as the input coordinates and go through the index transform.
//! Box extents and slice thresholds are compared against the stored, already
//! transformed coordinates, because an axis-aligned box does not stay
//! axis-aligned under rotation.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use rayon::prelude::*;

use crate::bulk::BulkIter;
use crate::coords::Coords;
use crate::distance::Metric;
use crate::error::{ensure_positive_count, ensure_positive_radius, Error, Result};
use crate::extent::Extent;
use crate::filter::{resolve_axis, Above, BallFilter, Below};
use crate::kdtree::KdTree;
use crate::options::IndexOptions;
use crate::params::{Radius, K};
use crate::rtree::RTree;
use crate::transform::AffineTransform;

/// Neighbours of one query point, nearest first; or, for [`IndexKd::nn`] and
/// [`IndexKd::closest_many`], one neighbour per queried point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Neighbours {
    pub ids: Vec<usize>,
    pub distances: Vec<f64>,
}

impl Neighbours {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, distance)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.ids.iter().copied().zip(self.distances.iter().copied())
    }
}

impl FromIterator<(usize, f64)> for Neighbours {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        let (ids, distances) = iter.into_iter().unzip();
        Neighbours { ids, distances }
    }
}

/// Where batch query points live: in input space, or already in index space.
#[derive(Clone, Copy)]
enum Space {
    Input,
    Index,
}

/// Spatial index over an immutable set of `n` points in `k` dimensions.
pub struct IndexKd {
    coords: Arc<Coords>,
    transform: AffineTransform,
    options: IndexOptions,
    kd_tree: OnceLock<KdTree>,
    r_tree: OnceLock<RTree>,
    nn: OnceLock<Neighbours>,
}

impl IndexKd {
    /// Indexes `coords` as given.
    pub fn new(coords: Coords, options: IndexOptions) -> Result<Self> {
        let transform = AffineTransform::identity(coords.dim());
        Self::with_transform(coords, transform, options)
    }

    /// Indexes `coords` after applying `transform` to every point.
    pub fn with_transform(
        coords: Coords,
        transform: AffineTransform,
        options: IndexOptions,
    ) -> Result<Self> {
        options.validate()?;
        if transform.dim() != coords.dim() {
            return Err(Error::transform(format!(
                "{}-dimensional points need a {}x{} matrix, got {}x{}",
                coords.dim(),
                coords.dim() + 1,
                coords.dim() + 1,
                transform.dim() + 1,
                transform.dim() + 1
            )));
        }
        let coords = transform.apply_coords(&coords)?;
        tracing::debug!(
            points = coords.len(),
            dim = coords.dim(),
            transformed = !transform.is_identity(),
            "created spatial index"
        );
        Ok(IndexKd {
            coords: Arc::new(coords),
            transform,
            options,
            kd_tree: OnceLock::new(),
            r_tree: OnceLock::new(),
            nn: OnceLock::new(),
        })
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of coordinate dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.coords.dim()
    }

    /// The indexed (transformed) coordinates.
    #[must_use]
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    #[must_use]
    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Indexed coordinates of point `id`.
    pub fn point(&self, id: usize) -> Result<&[f64]> {
        self.ensure_id(id)?;
        Ok(self.coords.point(id))
    }

    /// `(id, coordinates)` of every indexed point.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (usize, &[f64])> + '_ {
        self.coords.iter().enumerate()
    }

    /// The distance structure, built on first use.
    pub fn kd_tree(&self) -> &KdTree {
        self.kd_tree.get_or_init(|| {
            KdTree::new(
                Arc::clone(&self.coords),
                self.options.leaf_size,
                self.options.build_mode,
            )
        })
    }

    /// The range structure, built on first use.
    pub fn r_tree(&self) -> &RTree {
        self.r_tree.get_or_init(|| RTree::new(Arc::clone(&self.coords)))
    }

    #[must_use]
    pub fn has_kd_tree(&self) -> bool {
        self.kd_tree.get().is_some()
    }

    #[must_use]
    pub fn has_r_tree(&self) -> bool {
        self.r_tree.get().is_some()
    }

    // ---------------------------------------------------------------------
    // Ball queries

    /// Ids of all points within Euclidean distance `r` of `point`, ascending.
    pub fn ball(&self, point: &[f64], r: f64) -> Result<Vec<usize>> {
        self.ball_with(point, r, Metric::Euclidean)
    }

    /// Ids of all points within distance `r` of `point` under `metric`.
    pub fn ball_with(&self, point: &[f64], r: f64, metric: Metric) -> Result<Vec<usize>> {
        ensure_positive_radius("r", r)?;
        let metric = metric.validated()?;
        let point = self.to_index_space(point)?;
        Ok(self.kd_tree().query(&point, r, metric))
    }

    /// Ids of all points inside the axis-aligned cube of half-width `r`
    /// around `point`.
    pub fn cube(&self, point: &[f64], r: f64) -> Result<Vec<usize>> {
        self.ball_with(point, r, Metric::Chebyshev)
    }

    /// One ball per query point, in input order.
    pub fn balls(
        &self,
        points: &Coords,
        radius: impl Into<Radius>,
        metric: Metric,
    ) -> Result<Vec<Vec<usize>>> {
        Ok(self.ball_iter(points, radius, metric)?.collect())
    }

    /// One cube per query point, in input order.
    pub fn cubes(&self, points: &Coords, radius: impl Into<Radius>) -> Result<Vec<Vec<usize>>> {
        self.balls(points, radius, Metric::Chebyshev)
    }

    /// Streaming [`balls`](Self::balls) with the configured bulk size.
    pub fn ball_iter<'a>(
        &'a self,
        points: &'a Coords,
        radius: impl Into<Radius>,
        metric: Metric,
    ) -> Result<BulkIter<'a, Vec<usize>>> {
        self.ball_iter_bulk(points, radius, metric, self.options.bulk_size)
    }

    /// Streaming [`balls`](Self::balls), querying `bulk` points at a time.
    pub fn ball_iter_bulk<'a>(
        &'a self,
        points: &'a Coords,
        radius: impl Into<Radius>,
        metric: Metric,
        bulk: usize,
    ) -> Result<BulkIter<'a, Vec<usize>>> {
        let radius = radius.into();
        let metric = self.check_batch(points, &radius, metric, bulk)?;
        let tree = self.kd_tree();
        Ok(self.chunked(points, Space::Input, bulk, move |point, i| {
            tree.query(point, radius.get(i), metric)
        }))
    }

    /// Number of points within the ball of every query point.
    pub fn ball_count(
        &self,
        points: &Coords,
        radius: impl Into<Radius>,
        metric: Metric,
    ) -> Result<Vec<usize>> {
        let radius = radius.into();
        let metric = self.check_batch(points, &radius, metric, self.options.bulk_size)?;
        let tree = self.kd_tree();
        Ok(self
            .chunked(points, Space::Input, self.options.bulk_size, move |point, i| {
                tree.count(point, radius.get(i), metric)
            })
            .collect())
    }

    /// Number of points within the ball around every indexed point, the
    /// point itself included.
    pub fn ball_count_self(&self, radius: impl Into<Radius>, metric: Metric) -> Result<Vec<usize>> {
        let radius = radius.into();
        let metric = self.check_batch(&self.coords, &radius, metric, self.options.bulk_size)?;
        let tree = self.kd_tree();
        Ok(self
            .chunked(&self.coords, Space::Index, self.options.bulk_size, move |point, i| {
                tree.count(point, radius.get(i), metric)
            })
            .collect())
    }

    // ---------------------------------------------------------------------
    // Shells and filtered balls

    /// Ids of points in the Euclidean shell around `center`: inside the
    /// `r_max` ball but not inside the `r_min` ball. Ascending.
    pub fn shell(&self, center: &[f64], r_min: f64, r_max: f64) -> Result<Vec<usize>> {
        self.shell_with(center, r_min, r_max, Metric::Euclidean)
    }

    pub fn shell_with(
        &self,
        center: &[f64],
        r_min: f64,
        r_max: f64,
        metric: Metric,
    ) -> Result<Vec<usize>> {
        ensure_positive_radius("r_min", r_min)?;
        if r_max.is_nan() || r_max <= r_min {
            return Err(Error::parameter(
                "r_max",
                format!("must be greater than r_min ({r_min}), got {r_max}"),
            ));
        }
        let metric = metric.validated()?;
        let center = self.to_index_space(center)?;
        let tree = self.kd_tree();
        let inner = tree.query(&center, r_min, metric);
        let mut outer = tree.query(&center, r_max, metric);
        outer.retain(|id| inner.binary_search(id).is_err());
        Ok(outer)
    }

    /// The subset of a ball whose points `filter` accepts.
    pub fn ball_filtered(
        &self,
        center: &[f64],
        r: f64,
        metric: Metric,
        filter: &impl BallFilter,
    ) -> Result<Vec<usize>> {
        ensure_positive_radius("r", r)?;
        let metric = metric.validated()?;
        let center = self.to_index_space(center)?;
        let mut ids = self.kd_tree().query(&center, r, metric);
        ids.retain(|&id| filter.accept(&center, self.coords.point(id)));
        Ok(ids)
    }

    /// Ball neighbours strictly above `center` on `axis` (`-1` is the last axis).
    pub fn upper_ball(
        &self,
        center: &[f64],
        r: f64,
        metric: Metric,
        axis: isize,
    ) -> Result<Vec<usize>> {
        self.ensure_axis(axis)?;
        self.ball_filtered(center, r, metric, &Above { axis })
    }

    /// Ball neighbours strictly below `center` on `axis` (`-1` is the last axis).
    pub fn lower_ball(
        &self,
        center: &[f64],
        r: f64,
        metric: Metric,
        axis: isize,
    ) -> Result<Vec<usize>> {
        self.ensure_axis(axis)?;
        self.ball_filtered(center, r, metric, &Below { axis })
    }

    // ---------------------------------------------------------------------
    // Nearest neighbours

    /// The `k` points nearest to `point` in Euclidean distance.
    pub fn knn(&self, point: &[f64], k: usize) -> Result<Neighbours> {
        self.knn_with(point, k, Metric::Euclidean)
    }

    /// The `k` points nearest to `point` under `metric`, nearest first.
    pub fn knn_with(&self, point: &[f64], k: usize, metric: Metric) -> Result<Neighbours> {
        self.ensure_k(k)?;
        let metric = metric.validated()?;
        let point = self.to_index_space(point)?;
        Ok(self
            .kd_tree()
            .query_neighbors(&point, k, metric)
            .into_iter()
            .collect())
    }

    /// Nearest neighbours of every query point, in input order.
    pub fn knns(
        &self,
        points: &Coords,
        k: impl Into<K>,
        metric: Metric,
    ) -> Result<Vec<Neighbours>> {
        Ok(self.knn_iter(points, k, metric)?.collect())
    }

    /// Streaming [`knns`](Self::knns) with the configured bulk size.
    pub fn knn_iter<'a>(
        &'a self,
        points: &'a Coords,
        k: impl Into<K>,
        metric: Metric,
    ) -> Result<BulkIter<'a, Neighbours>> {
        self.knn_iter_bulk(points, k, metric, self.options.bulk_size)
    }

    /// Streaming [`knns`](Self::knns), querying `bulk` points at a time.
    pub fn knn_iter_bulk<'a>(
        &'a self,
        points: &'a Coords,
        k: impl Into<K>,
        metric: Metric,
        bulk: usize,
    ) -> Result<BulkIter<'a, Neighbours>> {
        let k = k.into();
        ensure_positive_count("bulk", bulk)?;
        self.ensure_query_dim(points.dim())?;
        k.validate("k", points.len(), |k| self.ensure_k(k))?;
        let metric = metric.validated()?;
        let tree = self.kd_tree();
        Ok(self.chunked(points, Space::Input, bulk, move |point, i| {
            tree.query_neighbors(point, k.get(i), metric)
                .into_iter()
                .collect()
        }))
    }

    /// Nearest other point of every indexed point, computed once.
    pub fn nn(&self) -> Result<&Neighbours> {
        self.ensure_pairs()?;
        Ok(self.nn.get_or_init(|| {
            let ids: Vec<usize> = (0..self.len()).collect();
            self.closest_unchecked(&ids)
        }))
    }

    /// Nearest other point of indexed point `id` as `(distance, id)`.
    pub fn closest(&self, id: usize) -> Result<(f64, usize)> {
        self.ensure_pairs()?;
        self.ensure_id(id)?;
        let (other, distance) = self.nearest_other(id);
        Ok((distance, other))
    }

    /// Nearest other point of each of `ids`, in the order given.
    pub fn closest_many(&self, ids: &[usize]) -> Result<Neighbours> {
        self.ensure_pairs()?;
        ids.iter().try_for_each(|&id| self.ensure_id(id))?;
        Ok(self.closest_unchecked(ids))
    }

    fn closest_unchecked(&self, ids: &[usize]) -> Neighbours {
        let mut neighbours = Neighbours::default();
        for chunk in ids.chunks(self.options.bulk_size) {
            let nearest: Vec<(usize, f64)> =
                chunk.par_iter().map(|&id| self.nearest_other(id)).collect();
            neighbours.ids.extend(nearest.iter().map(|&(id, _)| id));
            neighbours.distances.extend(nearest.iter().map(|&(_, d)| d));
        }
        neighbours
    }

    // The two nearest points of a stored point include the point itself
    // unless duplicates outrank it; either way the first entry that is not
    // `id` is its nearest other point.
    fn nearest_other(&self, id: usize) -> (usize, f64) {
        self.kd_tree()
            .query_neighbors(self.coords.point(id), 2, Metric::Euclidean)
            .into_iter()
            .find(|&(other, _)| other != id)
            .unwrap_or((id, f64::INFINITY))
    }

    // ---------------------------------------------------------------------
    // Boxes and slices

    /// Ids of points inside `extent` (inclusive), ascending.
    pub fn box_query(&self, extent: &Extent) -> Result<Vec<usize>> {
        self.ensure_extent(extent)?;
        Ok(self.r_tree().intersection(extent))
    }

    /// Number of points inside `extent`, without collecting their ids.
    pub fn box_count(&self, extent: &Extent) -> Result<usize> {
        self.ensure_extent(extent)?;
        Ok(self.r_tree().count(extent))
    }

    /// One box query per extent, in input order.
    pub fn boxes(&self, extents: &[Extent]) -> Result<Vec<Vec<usize>>> {
        Ok(self.box_iter_bulk(extents, self.options.bulk_size)?.collect())
    }

    /// Streaming [`boxes`](Self::boxes), querying `bulk` extents at a time.
    pub fn box_iter_bulk<'a>(
        &'a self,
        extents: &'a [Extent],
        bulk: usize,
    ) -> Result<BulkIter<'a, Vec<usize>>> {
        ensure_positive_count("bulk", bulk)?;
        extents.iter().try_for_each(|extent| self.ensure_extent(extent))?;
        let tree = self.r_tree();
        Ok(BulkIter::new(extents.len(), bulk, move |range| {
            extents[range]
                .par_iter()
                .map(|extent| tree.intersection(extent))
                .collect()
        }))
    }

    /// Ids of points with `min_th <= value <= max_th` on `axis`, ascending.
    /// Negative axes count from the last one.
    pub fn slice(&self, min_th: f64, max_th: f64, axis: isize) -> Result<Vec<usize>> {
        if min_th.is_nan() {
            return Err(Error::parameter("min_th", "must be a number, got NaN"));
        }
        if max_th.is_nan() || max_th < min_th {
            return Err(Error::parameter(
                "max_th",
                format!("must not be below min_th ({min_th}), got {max_th}"),
            ));
        }
        let axis = self.ensure_axis(axis)?;

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            self.coords.value(a, axis).total_cmp(&self.coords.value(b, axis))
        });
        let lower = order.partition_point(|&id| self.coords.value(id, axis) < min_th);
        let upper = order.partition_point(|&id| self.coords.value(id, axis) <= max_th);

        let mut ids = order[lower..upper].to_vec();
        ids.sort_unstable();
        Ok(ids)
    }

    /// [`slice`](Self::slice) on the last axis.
    pub fn slice_last(&self, min_th: f64, max_th: f64) -> Result<Vec<usize>> {
        self.slice(min_th, max_th, -1)
    }

    // ---------------------------------------------------------------------
    // Helpers

    fn chunked<'a, T, F>(
        &'a self,
        points: &'a Coords,
        space: Space,
        bulk: usize,
        query: F,
    ) -> BulkIter<'a, T>
    where
        T: Send + 'a,
        F: Fn(&[f64], usize) -> T + Send + Sync + 'a,
    {
        BulkIter::new(points.len(), bulk, move |range| {
            range
                .into_par_iter()
                .map(|i| match space {
                    Space::Input => query(&self.project(points.point(i)), i),
                    Space::Index => query(&points.point(i)[..self.dim()], i),
                })
                .collect()
        })
    }

    fn check_batch(
        &self,
        points: &Coords,
        radius: &Radius,
        metric: Metric,
        bulk: usize,
    ) -> Result<Metric> {
        ensure_positive_count("bulk", bulk)?;
        self.ensure_query_dim(points.dim())?;
        radius.validate("r", points.len(), |r| ensure_positive_radius("r", r))?;
        metric.validated()
    }

    fn to_index_space<'p>(&self, point: &'p [f64]) -> Result<Cow<'p, [f64]>> {
        self.ensure_query_dim(point.len())?;
        if point[..self.dim()].iter().any(|x| !x.is_finite()) {
            return Err(Error::shape("query point has non-finite coordinates"));
        }
        Ok(self.project(point))
    }

    fn project<'p>(&self, point: &'p [f64]) -> Cow<'p, [f64]> {
        if self.transform.is_identity() {
            Cow::Borrowed(&point[..self.dim()])
        } else {
            Cow::Owned(self.transform.apply(point))
        }
    }

    fn ensure_query_dim(&self, dim: usize) -> Result<()> {
        if dim < self.dim() {
            return Err(Error::shape(format!(
                "query points need {} coordinates, got {dim}",
                self.dim()
            )));
        }
        Ok(())
    }

    fn ensure_k(&self, k: usize) -> Result<()> {
        if k == 0 || k > self.len() {
            return Err(Error::parameter(
                "k",
                format!("must be between 1 and the number of points ({}), got {k}", self.len()),
            ));
        }
        Ok(())
    }

    fn ensure_id(&self, id: usize) -> Result<()> {
        if id >= self.len() {
            return Err(Error::parameter(
                "id",
                format!("point {id} does not exist, the index holds {} points", self.len()),
            ));
        }
        Ok(())
    }

    fn ensure_pairs(&self) -> Result<()> {
        if self.len() < 2 {
            return Err(Error::parameter(
                "id",
                "nearest other point needs an index of at least two points",
            ));
        }
        Ok(())
    }

    fn ensure_axis(&self, axis: isize) -> Result<usize> {
        resolve_axis(axis, self.dim()).ok_or_else(|| {
            Error::parameter(
                "axis",
                format!("must lie in [-{dim}, {dim}), got {axis}", dim = self.dim()),
            )
        })
    }

    fn ensure_extent(&self, extent: &Extent) -> Result<()> {
        if extent.dim() != self.dim() {
            return Err(Error::parameter(
                "extent",
                format!(
                    "needs {} bounds per side, got {}",
                    self.dim(),
                    extent.dim()
                ),
            ));
        }
        Ok(())
    }
}
