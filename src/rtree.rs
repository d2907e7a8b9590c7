use std::sync::Arc;

use crate::coords::Coords;
use crate::extent::Extent;

const FANOUT: usize = 10;

/// Bounding-volume tree over a fixed point set, answering box queries.
///
/// Bulk-loaded with sort-tile-recursive packing, so every node except the
/// last of each level is full. Nodes store the number of points below them.
pub struct RTree {
    coords: Arc<Coords>,
    root: usize,
    nodes: Vec<Node>,
}

struct Node {
    extent: Extent,
    weight: usize,
    is_leaf: bool,
    // Point ids in a leaf, node ids otherwise.
    children: Vec<usize>,
}

impl RTree {
    #[must_use]
    pub(crate) fn new(coords: Arc<Coords>) -> RTree {
        let dim = coords.dim();
        let mut nodes: Vec<Node> = Vec::new();

        let mut ids: Vec<usize> = (0..coords.len()).collect();
        let mut groups = Vec::new();
        tile(&mut ids, 0, dim, &|id, axis| coords.value(id, axis), &mut groups);
        let mut level: Vec<usize> = groups
            .into_iter()
            .map(|children| {
                nodes.push(Node {
                    extent: Extent::of_points(&coords, &children),
                    weight: children.len(),
                    is_leaf: true,
                    children,
                });
                nodes.len() - 1
            })
            .collect();

        while level.len() > 1 {
            let mut groups = Vec::new();
            tile(
                &mut level,
                0,
                dim,
                &|id, axis| nodes[id].extent.center(axis),
                &mut groups,
            );
            level = groups
                .into_iter()
                .map(|children| {
                    let mut extent = nodes[children[0]].extent.clone();
                    let mut weight = 0;
                    for &child in &children {
                        extent.include(&nodes[child].extent);
                        weight += nodes[child].weight;
                    }
                    nodes.push(Node {
                        extent,
                        weight,
                        is_leaf: false,
                        children,
                    });
                    nodes.len() - 1
                })
                .collect();
        }

        tracing::debug!(
            points = coords.len(),
            dim,
            nodes = nodes.len(),
            "built r-tree"
        );
        RTree {
            root: level[0],
            coords,
            nodes,
        }
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.nodes[self.root].weight
    }

    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.nodes[self.root];
        while !node.is_leaf {
            node = &self.nodes[node.children[0]];
            height += 1;
        }
        height
    }

    /// Ids of all points inside `extent` (bounds inclusive), ascending.
    #[must_use]
    pub fn intersection(&self, extent: &Extent) -> Vec<usize> {
        let mut result = Vec::new();
        let mut queue = vec![self.root];
        while let Some(node_id) = queue.pop() {
            let node = &self.nodes[node_id];
            if !extent.intersects(&node.extent) {
                continue;
            }
            if extent.contains(&node.extent) {
                self.collect(node_id, &mut result);
            } else if node.is_leaf {
                result.extend(
                    node.children
                        .iter()
                        .copied()
                        .filter(|&id| extent.contains_point(self.coords.point(id))),
                );
            } else {
                queue.extend_from_slice(&node.children);
            }
        }
        result.sort_unstable();
        result
    }

    /// Number of points inside `extent`, without collecting their ids.
    #[must_use]
    pub fn count(&self, extent: &Extent) -> usize {
        let mut count = 0;
        let mut queue = vec![self.root];
        while let Some(node_id) = queue.pop() {
            let node = &self.nodes[node_id];
            if !extent.intersects(&node.extent) {
                continue;
            }
            if extent.contains(&node.extent) {
                count += node.weight;
            } else if node.is_leaf {
                count += node
                    .children
                    .iter()
                    .filter(|&&id| extent.contains_point(self.coords.point(id)))
                    .count();
            } else {
                queue.extend_from_slice(&node.children);
            }
        }
        count
    }

    fn collect(&self, node_id: usize, result: &mut Vec<usize>) {
        let mut queue = vec![node_id];
        while let Some(node_id) = queue.pop() {
            let node = &self.nodes[node_id];
            if node.is_leaf {
                result.extend_from_slice(&node.children);
            } else {
                queue.extend_from_slice(&node.children);
            }
        }
    }
}

// Sort-tile-recursive packing: sorts along `axis`, cuts into slabs so that
// each remaining axis gets about the same number of cuts, and recurses into
// every slab on the next axis. The last axis is cut into groups of FANOUT.
fn tile<F>(items: &mut [usize], axis: usize, dim: usize, key: &F, groups: &mut Vec<Vec<usize>>)
where
    F: Fn(usize, usize) -> f64,
{
    if items.len() <= FANOUT {
        groups.push(items.to_vec());
        return;
    }
    items.sort_unstable_by(|&a, &b| key(a, axis).total_cmp(&key(b, axis)));
    if axis + 1 == dim {
        groups.extend(items.chunks(FANOUT).map(<[usize]>::to_vec));
        return;
    }
    let pages = ceil_div(items.len(), FANOUT);
    let slabs = slab_count(pages, dim - axis);
    let slab_size = FANOUT * ceil_div(pages, slabs);
    for slab in items.chunks_mut(slab_size) {
        tile(slab, axis + 1, dim, key, groups);
    }
}

// Smallest s with s^axes >= pages.
fn slab_count(pages: usize, axes: usize) -> usize {
    let axes = u32::try_from(axes).unwrap_or(u32::MAX);
    let mut slabs = 1;
    while slabs < pages && slabs.checked_pow(axes).is_some_and(|covered| covered < pages) {
        slabs += 1;
    }
    slabs
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn random_coords(n: usize, dim: usize, seed: u64) -> Arc<Coords> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..n * dim).map(|_| rng.gen_range(0.0..100.0)).collect();
        Arc::new(Coords::new(data, dim).expect("valid coordinates"))
    }

    #[test]
    fn slab_counts() {
        assert_eq!(slab_count(1, 2), 1);
        assert_eq!(slab_count(4, 2), 2);
        assert_eq!(slab_count(5, 2), 3);
        assert_eq!(slab_count(27, 3), 3);
        assert_eq!(slab_count(1000, 64), 2);
    }

    #[test]
    fn packing_covers_every_point_once() {
        let coords = random_coords(1234, 3, 0);
        let tree = RTree::new(Arc::clone(&coords));
        assert_eq!(tree.num_points(), 1234);
        assert!(tree.height() >= 3);

        let everything = Extent::new(vec![0.0; 3], vec![100.0; 3]).expect("valid extent");
        let all = tree.intersection(&everything);
        assert_eq!(all, (0..1234).collect::<Vec<_>>());
    }

    #[test]
    fn intersection_and_count() {
        let coords = random_coords(800, 2, 1);
        let tree = RTree::new(Arc::clone(&coords));

        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let x: f64 = rng.gen_range(0.0..100.0);
            let y: f64 = rng.gen_range(0.0..100.0);
            let extent = Extent::new(
                vec![x, y],
                vec![x + rng.gen_range(0.0..30.0), y + rng.gen_range(0.0..30.0)],
            )
            .expect("valid extent");

            let expected: Vec<usize> = (0..coords.len())
                .filter(|&id| extent.contains_point(coords.point(id)))
                .collect();
            assert_eq!(tree.intersection(&extent), expected);
            assert_eq!(tree.count(&extent), expected.len());
        }
    }

    #[test]
    fn single_point() {
        let coords = Arc::new(Coords::from_rows(&[[1.0, 2.0]]).expect("valid coordinates"));
        let tree = RTree::new(coords);
        assert_eq!(tree.height(), 1);
        let extent = Extent::new(vec![1.0, 2.0], vec![1.0, 2.0]).expect("valid extent");
        assert_eq!(tree.intersection(&extent), vec![0]);
        assert_eq!(tree.count(&extent), 1);
    }
}
