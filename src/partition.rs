use crate::{
    body::Body,
    error::Result,
    quadtree::{Quad, Quadtree, center_of_mass},
};
use ultraviolet::Vec2;

/// Quadtree built top-down by partitioning the body array in place.
///
/// Leaves hold up to `leaf_capacity` bodies as a contiguous range of the
/// (reordered) body slice, and nearby leaves are summed body by body.
#[derive(Debug, Clone)]
pub struct PartitionTree {
    pub tree: Quadtree,
    pub leaf_capacity: usize,
}

impl PartitionTree {
    pub const DEFAULT_LEAF_CAPACITY: usize = 16;

    pub fn new(theta: f32, epsilon: f32, leaf_capacity: usize) -> Self {
        Self {
            tree: Quadtree::new(theta, epsilon),
            leaf_capacity,
        }
    }

    pub fn with_capacity(theta: f32, epsilon: f32, leaf_capacity: usize, n: usize) -> Result<Self> {
        Ok(Self {
            tree: Quadtree::with_capacity(theta, epsilon, n)?,
            leaf_capacity,
        })
    }

    /// Rebuilds the tree over `bodies`, reordering them so every node covers a contiguous range.
    pub fn build(&mut self, bodies: &mut [Body]) -> Result<()> {
        self.tree.clear(Quad::new_containing(bodies))?;
        self.tree.nodes[Quadtree::ROOT].end = bodies.len() as u32;

        // Children are appended behind the cursor, so this visits the tree breadth-first.
        let mut node = Quadtree::ROOT;
        while node < self.tree.nodes.len() {
            let (begin, end) = (self.tree.nodes[node].begin as usize, self.tree.nodes[node].end as usize);
            let quad = self.tree.nodes[node].quad;

            if end - begin > self.leaf_capacity && !quad.is_degenerate() {
                let split = split_quadrants(&mut bodies[begin..end], quad);
                let children = self.tree.subdivide(node)?;
                for i in 0..4 {
                    let child = &mut self.tree.nodes[children + i];
                    child.begin = (begin + split[i]) as u32;
                    child.end = (begin + split[i + 1]) as u32;
                }
            } else {
                let (pos, mass) = center_of_mass(&bodies[begin..end]);
                self.tree.nodes[node].pos = pos;
                self.tree.nodes[node].mass = mass;
            }
            node += 1;
        }

        self.tree.propagate();
        Ok(())
    }

    /// Acceleration at `pos`; `bodies` must be the slice the tree was last built over.
    #[inline(always)]
    pub fn acc(&self, pos: Vec2, bodies: &[Body]) -> Vec2 {
        self.tree.acc_with(pos, bodies)
    }
}

/// Reorders `bodies` into the four quadrants of `quad` and returns the boundaries
/// `[0, q1, q2, q3, len]`. Ties with the center stay low, as in [`Quad::find_quadrant`].
pub fn split_quadrants(bodies: &mut [Body], quad: Quad) -> [usize; 5] {
    let len = bodies.len();
    let c = quad.center;

    let mid = partition(bodies, |b| b.pos.y <= c.y);
    let low = partition(&mut bodies[..mid], |b| b.pos.x <= c.x);
    let high = mid + partition(&mut bodies[mid..], |b| b.pos.x <= c.x);

    [0, low, mid, high, len]
}

/// Moves every body satisfying `pred` to the front; returns how many did.
fn partition(bodies: &mut [Body], pred: impl Fn(&Body) -> bool) -> usize {
    let mut split = 0;
    for i in 0..bodies.len() {
        if pred(&bodies[i]) {
            bodies.swap(split, i);
            split += 1;
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Body> {
        (0..n)
            .map(|i| {
                let pos = Vec2::new((i % 10) as f32 * 3.0, (i / 10) as f32 * 2.0);
                Body::new(pos, Vec2::zero(), 1.0 + (i % 3) as f32, 0.5)
            })
            .collect()
    }

    #[test]
    fn test_split_quadrants_matches_find_quadrant() {
        let mut bodies = grid(40);
        let quad = Quad::new_containing(&bodies);
        let split = split_quadrants(&mut bodies, quad);
        for k in 0..4 {
            for body in &bodies[split[k]..split[k + 1]] {
                assert_eq!(quad.find_quadrant(body.pos), k);
            }
        }
    }

    #[test]
    fn test_leaves_respect_capacity() {
        let mut bodies = grid(100);
        let mut tree = PartitionTree::new(1.0, 1.0, 4);
        tree.build(&mut bodies).unwrap();

        for node in tree.tree.nodes.iter().filter(|n| n.is_leaf()) {
            assert!(node.end - node.begin <= 4);
            for body in &bodies[node.begin as usize..node.end as usize] {
                assert!(node.quad.contains(body.pos));
            }
        }
    }

    #[test]
    fn test_root_mass() {
        let mut bodies = grid(100);
        let total: f32 = bodies.iter().map(|b| b.mass).sum();
        let mut tree = PartitionTree::new(1.0, 1.0, 8);
        tree.build(&mut bodies).unwrap();
        assert!((tree.tree.nodes[Quadtree::ROOT].mass - total).abs() < 1e-3);
    }

    #[test]
    fn test_small_set_is_single_leaf() {
        let mut bodies = grid(5);
        let mut tree = PartitionTree::new(1.0, 1.0, PartitionTree::DEFAULT_LEAF_CAPACITY);
        tree.build(&mut bodies).unwrap();
        assert_eq!(tree.tree.nodes.len(), 1);
        assert!(tree.tree.parents.is_empty());
        assert_eq!((tree.tree.nodes[0].begin, tree.tree.nodes[0].end), (0, 5));
    }

    #[test]
    fn test_coincident_bodies_stop_splitting() {
        let mut bodies = vec![Body::new(Vec2::new(2.0, 2.0), Vec2::zero(), 1.0, 1.0); 20];
        let mut tree = PartitionTree::new(1.0, 1.0, 2);
        tree.build(&mut bodies).unwrap();
        assert_eq!(tree.tree.nodes.len(), 1);
        assert_eq!(tree.tree.nodes[0].mass, 20.0);
    }

    #[test]
    fn test_empty_build() {
        let mut tree = PartitionTree::new(1.0, 1.0, 4);
        tree.build(&mut []).unwrap();
        assert_eq!(tree.tree.nodes.len(), 1);
        assert!(tree.tree.nodes[0].is_empty());
        assert_eq!(tree.acc(Vec2::zero(), &[]), Vec2::zero());
    }
}
