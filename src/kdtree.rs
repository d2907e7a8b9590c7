use std::collections::BinaryHeap;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::coords::Coords;
use crate::distance::Metric;
use crate::extent::Extent;
use crate::options::BuildMode;

/// Balanced partition tree over a fixed point set, answering metric queries.
///
/// Nodes live in one vector; each node owns a contiguous range of `order`,
/// the permutation of point ids produced while splitting.
pub struct KdTree {
    coords: Arc<Coords>,
    nodes: Vec<Node>,
    order: Vec<usize>,
}

struct Node {
    extent: Extent,
    start: usize,
    end: usize,
    children: Option<(usize, usize)>,
}

impl Node {
    fn new(extent: Extent, start: usize, end: usize) -> Node {
        Node {
            extent,
            start,
            end,
            children: None,
        }
    }
}

const ROOT: usize = 0;

impl KdTree {
    /// Builds the tree over all points of `coords`.
    ///
    /// `QuickBuild` splits at the midpoint of a node's cell and bounds
    /// children by the halved cell. `QuickQuery` splits at the median and
    /// shrinks every node to the tight extent of its points. `leaf_size` is
    /// validated by [`IndexOptions`](crate::IndexOptions).
    #[must_use]
    pub(crate) fn new(coords: Arc<Coords>, leaf_size: usize, mode: BuildMode) -> KdTree {
        debug_assert!(leaf_size > 0);
        let n = coords.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut nodes = vec![Node::new(Extent::of_points(&coords, &order), 0, n)];

        let mut pending = vec![ROOT];
        while let Some(node_id) = pending.pop() {
            let Node {
                ref extent,
                start,
                end,
                ..
            } = nodes[node_id];
            if end - start <= leaf_size {
                continue;
            }
            let axis = (0..coords.dim())
                .max_by_key(|&axis| OrderedFloat(extent.width(axis)))
                .unwrap_or(0);
            if extent.width(axis) <= 0.0 {
                // All points coincide.
                continue;
            }

            let (mid, split) = match mode {
                BuildMode::QuickBuild => {
                    midpoint_split(&coords, &mut order[start..end], axis, extent.center(axis))
                }
                BuildMode::QuickQuery => median_split(&coords, &mut order[start..end], axis),
            };
            let mid = start + mid;

            let (left_extent, right_extent) = match mode {
                BuildMode::QuickBuild => {
                    let mut left = extent.clone();
                    let mut right = extent.clone();
                    left.max[axis] = split;
                    right.min[axis] = split;
                    (left, right)
                }
                BuildMode::QuickQuery => (
                    Extent::of_points(&coords, &order[start..mid]),
                    Extent::of_points(&coords, &order[mid..end]),
                ),
            };

            let left = nodes.len();
            nodes.push(Node::new(left_extent, start, mid));
            let right = nodes.len();
            nodes.push(Node::new(right_extent, mid, end));
            nodes[node_id].children = Some((left, right));
            pending.push(left);
            pending.push(right);
        }

        tracing::debug!(
            points = n,
            dim = coords.dim(),
            leaf_size,
            ?mode,
            nodes = nodes.len(),
            "built kd-tree"
        );
        KdTree {
            coords,
            nodes,
            order,
        }
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of all points within distance `radius` of `point`, ascending.
    #[must_use]
    pub fn query(&self, point: &[f64], radius: f64, metric: Metric) -> Vec<usize> {
        let mut result = Vec::new();
        self.visit_ball(point, radius, metric, |ids| result.extend_from_slice(ids));
        result.sort_unstable();
        result
    }

    /// Number of points within distance `radius` of `point`.
    #[must_use]
    pub fn count(&self, point: &[f64], radius: f64, metric: Metric) -> usize {
        let mut count = 0;
        self.visit_ball(point, radius, metric, |ids| count += ids.len());
        count
    }

    // Hands every matching id to `sink`, whole subtrees at once when the
    // node lies inside the ball.
    fn visit_ball(
        &self,
        point: &[f64],
        radius: f64,
        metric: Metric,
        mut sink: impl FnMut(&[usize]),
    ) {
        let mut queue = vec![ROOT];
        let mut matched = Vec::new();
        while let Some(node_id) = queue.pop() {
            let node = &self.nodes[node_id];
            if node.extent.min_distance(point, metric) > radius {
                continue;
            }
            let ids = &self.order[node.start..node.end];
            if node.extent.max_distance(point, metric) <= radius {
                sink(ids);
                continue;
            }
            match node.children {
                Some((left, right)) => {
                    queue.push(left);
                    queue.push(right);
                }
                None => {
                    matched.clear();
                    matched.extend(ids.iter().copied().filter(|&id| {
                        metric.distance(point, self.coords.point(id)) <= radius
                    }));
                    sink(&matched);
                }
            }
        }
    }

    /// The `k` points nearest to `point` as `(id, distance)`, nearest first.
    /// Equal distances are ordered by id.
    #[must_use]
    pub fn query_neighbors(&self, point: &[f64], k: usize, metric: Metric) -> Vec<(usize, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let mut neighbors = BinaryHeap::with_capacity(k + 1);
        self.query_recursive(ROOT, point, k, metric, &mut neighbors);
        neighbors
            .into_sorted_vec()
            .into_iter()
            .map(|(distance, id)| (id, distance.into_inner()))
            .collect()
    }

    fn query_recursive(
        &self,
        node_id: usize,
        point: &[f64],
        k: usize,
        metric: Metric,
        neighbors: &mut BinaryHeap<(OrderedFloat<f64>, usize)>,
    ) {
        let node = &self.nodes[node_id];
        match node.children {
            None => {
                for &id in &self.order[node.start..node.end] {
                    let distance = metric.distance(point, self.coords.point(id));
                    let candidate = (OrderedFloat(distance), id);
                    if neighbors.len() < k {
                        neighbors.push(candidate);
                    } else if neighbors.peek().is_some_and(|kth| candidate < *kth) {
                        neighbors.pop();
                        neighbors.push(candidate);
                    }
                }
            }
            Some((left, right)) => {
                let mut children = [left, right].map(|child_id| {
                    let distance = self.nodes[child_id].extent.min_distance(point, metric);
                    (OrderedFloat(distance), child_id)
                });
                children.sort_unstable();

                for (distance, child_id) in children {
                    let full = neighbors.len() == k;
                    if full && neighbors.peek().is_some_and(|kth| distance > kth.0) {
                        break;
                    }
                    self.query_recursive(child_id, point, k, metric, neighbors);
                }
            }
        }
    }
}

// Points on the lower side of `split` first. Falls back to the median when
// one side would be empty.
fn midpoint_split(coords: &Coords, ids: &mut [usize], axis: usize, split: f64) -> (usize, f64) {
    let mut mid = 0;
    for i in 0..ids.len() {
        if coords.value(ids[i], axis) <= split {
            ids.swap(mid, i);
            mid += 1;
        }
    }
    if mid == 0 || mid == ids.len() {
        return median_split(coords, ids, axis);
    }
    (mid, split)
}

fn median_split(coords: &Coords, ids: &mut [usize], axis: usize) -> (usize, f64) {
    let mid = ids.len() / 2;
    ids.select_nth_unstable_by(mid, |&a, &b| {
        coords.value(a, axis).total_cmp(&coords.value(b, axis))
    });
    (mid, coords.value(ids[mid], axis))
}
