use crate::{
    body::Body,
    error::{Error, Result, reserve},
};
use ultraviolet::Vec2;

/// Represents a square region in the quadtree.
/// Used to define the bounds of nodes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quad {
    pub center: Vec2,
    pub size: f32,
}

impl Quad {
    /// Creates the smallest square centered on the bounding box of all given bodies.
    /// An empty slice yields a zero-sized quad at the origin.
    pub fn new_containing(bodies: &[Body]) -> Self {
        if bodies.is_empty() {
            return Self::default();
        }

        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;

        for body in bodies {
            min_x = min_x.min(body.pos.x);
            min_y = min_y.min(body.pos.y);
            max_x = max_x.max(body.pos.x);
            max_y = max_y.max(body.pos.y);
        }

        let center = Vec2::new(min_x + max_x, min_y + max_y) * 0.5;
        let size = (max_x - min_x).max(max_y - min_y);

        Self { center, size }
    }

    /// Determines which quadrant a position falls into relative to the quad's center.
    /// Bit 0 is set when `pos.x > center.x`, bit 1 when `pos.y > center.y`.
    /// A coordinate equal to the center stays on the low side.
    pub fn find_quadrant(&self, pos: Vec2) -> usize {
        ((pos.y > self.center.y) as usize) << 1 | (pos.x > self.center.x) as usize
    }

    /// Transforms the current Quad into one of its sub-quadrants.
    pub fn into_quadrant(mut self, quadrant: usize) -> Self {
        self.size *= 0.5;
        self.center.x += ((quadrant & 1) as f32 - 0.5) * self.size;
        self.center.y += ((quadrant >> 1) as f32 - 0.5) * self.size;
        self
    }

    /// Divides the quad into 4 equal sub-quadrants, indexed like [`Quad::find_quadrant`].
    pub fn subdivide(&self) -> [Quad; 4] {
        [0, 1, 2, 3].map(|i| self.into_quadrant(i))
    }

    /// True when halving the quad no longer moves the child centers at f32 precision.
    pub fn is_degenerate(&self) -> bool {
        let offset = self.size * 0.25;
        !(offset > 0.0) || self.center.x + offset == self.center.x || self.center.y + offset == self.center.y
    }

    /// Whether `pos` lies inside the closed square.
    pub fn contains(&self, pos: Vec2) -> bool {
        let half = self.size * 0.5;
        (pos.x - self.center.x).abs() <= half && (pos.y - self.center.y).abs() <= half
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    /// Index of the first of four contiguous children (0 if leaf).
    pub children: u32,
    /// Node visited once this subtree is done (0 ends the traversal).
    pub next: u32,
    /// Center of mass of the node.
    pub pos: Vec2,
    /// Total mass of the node.
    pub mass: f32,
    /// Spatial bounds of the node.
    pub quad: Quad,
    /// First body covered by a partition-built node.
    pub begin: u32,
    /// One past the last body covered by a partition-built node.
    pub end: u32,
}

impl Node {
    pub fn new(next: u32, quad: Quad) -> Self {
        Self {
            children: 0,
            next,
            pos: Vec2::zero(),
            mass: 0.0,
            quad,
            begin: 0,
            end: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children == 0
    }

    pub fn is_branch(&self) -> bool {
        self.children != 0
    }

    pub fn is_empty(&self) -> bool {
        self.mass == 0.0
    }

    /// Whether this leaf keeps the exact bodies it covers.
    pub fn has_bodies(&self) -> bool {
        self.is_leaf() && self.begin < self.end
    }
}

/// Largest per-source acceleration factor; stands in for infinity as `d² -> 0`.
pub const MAX_PULL: f32 = f32::MAX;

/// Softened inverse-square pull towards a mass at offset `d` (with `d_sq = |d|²`).
#[inline(always)]
pub fn pull(d: Vec2, d_sq: f32, mass: f32, e_sq: f32) -> Vec2 {
    let denom = (d_sq + e_sq) * d_sq.sqrt();
    d * (mass / denom).min(MAX_PULL)
}

/// Total mass of `bodies` and its center; an empty or massless set sits at the origin.
pub fn center_of_mass(bodies: &[Body]) -> (Vec2, f32) {
    let mut weighted = Vec2::zero();
    let mut mass = 0.0;
    for body in bodies {
        weighted += body.pos * body.mass;
        mass += body.mass;
    }
    if mass > 0.0 {
        (weighted / mass.max(f32::MIN_POSITIVE), mass)
    } else {
        (Vec2::zero(), 0.0)
    }
}

/// The Quadtree data structure for the Barnes-Hut simulation.
/// Uses a flat vector `nodes` for better cache locality.
#[derive(Debug, Clone)]
pub struct Quadtree {
    /// Theta squared (opening angle threshold for approximation).
    pub t_sq: f32,
    /// Epsilon squared (softening parameter to avoid singularities).
    pub e_sq: f32,
    /// Linearized tree nodes.
    pub nodes: Vec<Node>,
    /// Indices of branch nodes in creation order, used for bottom-up propagation.
    pub parents: Vec<usize>,
    /// Largest arena the tree may grow to; subdividing past it fails.
    pub node_limit: usize,
}

impl Default for Quadtree {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl Quadtree {
    pub const ROOT: usize = 0;

    pub fn new(theta: f32, epsilon: f32) -> Self {
        Self {
            t_sq: theta * theta,
            e_sq: epsilon * epsilon,
            nodes: Vec::new(),
            parents: Vec::new(),
            node_limit: usize::MAX,
        }
    }

    /// Creates a tree with the node arena and parent list pre-sized for `n` bodies.
    pub fn with_capacity(theta: f32, epsilon: f32, n: usize) -> Result<Self> {
        let mut tree = Self::new(theta, epsilon);
        reserve(&mut tree.nodes, n, "quadtree nodes")?;
        reserve(&mut tree.parents, n, "quadtree parents")?;
        Ok(tree)
    }

    /// Resets the tree and initializes the root node with the given bounds.
    pub fn clear(&mut self, quad: Quad) -> Result<()> {
        self.nodes.clear();
        self.parents.clear();
        reserve(&mut self.nodes, 1, "quadtree nodes")?;
        self.nodes.push(Node::new(0, quad));
        Ok(())
    }

    /// Subdivides a leaf node into 4 children.
    /// Returns the index of the first child. Nothing is modified if growing fails.
    pub(crate) fn subdivide(&mut self, node: usize) -> Result<usize> {
        if self.nodes.len() + 4 > self.node_limit {
            return Err(Error::NodeLimit {
                limit: self.node_limit,
            });
        }
        reserve(&mut self.nodes, 4, "quadtree nodes")?;
        reserve(&mut self.parents, 1, "quadtree parents")?;

        self.parents.push(node);
        let children = self.nodes.len() as u32;
        self.nodes[node].children = children;

        // Siblings chain into each other; the last child resumes wherever the parent would have.
        let nexts = [
            children + 1,
            children + 2,
            children + 3,
            self.nodes[node].next,
        ];
        let quads = self.nodes[node].quad.subdivide();
        for i in 0..4 {
            self.nodes.push(Node::new(nexts[i], quads[i]));
        }

        Ok(children as usize)
    }

    /// Inserts a point mass into the tree.
    pub fn insert(&mut self, pos: Vec2, mass: f32) -> Result<()> {
        let mut node = Self::ROOT;

        // Traverse down to a leaf
        while self.nodes[node].is_branch() {
            let quadrant = self.nodes[node].quad.find_quadrant(pos);
            node = (self.nodes[node].children as usize) + quadrant;
        }

        // If leaf is empty, just place the body there
        if self.nodes[node].is_empty() {
            self.nodes[node].pos = pos;
            self.nodes[node].mass = mass;
            return Ok(());
        }

        let (p, m) = (self.nodes[node].pos, self.nodes[node].mass);

        // Identical positions can never be separated, so their masses merge
        if pos == p {
            self.nodes[node].mass += mass;
            return Ok(());
        }

        // Otherwise, split the node until the bodies are in different quadrants
        loop {
            if self.nodes[node].quad.is_degenerate() {
                let total = m + mass;
                self.nodes[node].pos = if total > 0.0 { (p * m + pos * mass) / total } else { p };
                self.nodes[node].mass = total;
                return Ok(());
            }

            let children = self.subdivide(node)?;

            let q1 = self.nodes[node].quad.find_quadrant(p);
            let q2 = self.nodes[node].quad.find_quadrant(pos);

            if q1 == q2 {
                node = children + q1;
            } else {
                let n1 = children + q1;
                let n2 = children + q2;

                self.nodes[n1].pos = p;
                self.nodes[n1].mass = m;

                self.nodes[n2].pos = pos;
                self.nodes[n2].mass = mass;
                return Ok(());
            }
        }
    }

    /// Shrinks the tree to a lone root leaf holding the given aggregate.
    /// Never allocates; an empty arena stays empty.
    pub fn reset_root(&mut self, quad: Quad, pos: Vec2, mass: f32) {
        self.parents.clear();
        self.nodes.truncate(1);
        if let Some(root) = self.nodes.first_mut() {
            *root = Node {
                pos,
                mass,
                ..Node::new(0, quad)
            };
        }
    }

    /// Calculates center of mass and total mass for every branch (bottom-up).
    /// Children always sit after their parent, so one reverse pass over `parents` suffices.
    pub fn propagate(&mut self) {
        for &node in self.parents.iter().rev() {
            let i = self.nodes[node].children as usize;

            let weighted = self.nodes[i].pos * self.nodes[i].mass
                + self.nodes[i + 1].pos * self.nodes[i + 1].mass
                + self.nodes[i + 2].pos * self.nodes[i + 2].mass
                + self.nodes[i + 3].pos * self.nodes[i + 3].mass;

            let mass = self.nodes[i].mass
                + self.nodes[i + 1].mass
                + self.nodes[i + 2].mass
                + self.nodes[i + 3].mass;

            self.nodes[node].mass = mass;
            self.nodes[node].pos = if mass > 0.0 {
                weighted / mass.max(f32::MIN_POSITIVE)
            } else {
                Vec2::zero()
            };
        }
    }

    /// Calculates the gravitational acceleration at a given position, treating
    /// every leaf as a single aggregate point.
    #[inline(always)]
    pub fn acc(&self, pos: Vec2) -> Vec2 {
        self.acc_with(pos, &[])
    }

    /// Barnes-Hut walk over the arena without an explicit stack.
    ///
    /// A node is resolved when it is a leaf or `size² < d²·θ²`. Resolved nodes
    /// far enough away contribute their aggregate; nearby leaves that carry a
    /// body range sum the exact contribution of each body in `bodies`.
    #[inline(always)]
    pub fn acc_with(&self, pos: Vec2, bodies: &[Body]) -> Vec2 {
        let mut acc = Vec2::zero();
        if self.nodes.is_empty() {
            return acc;
        }

        let mut node_idx = Self::ROOT;
        loop {
            let n = &self.nodes[node_idx];

            let d = n.pos - pos;
            let d_sq = d.mag_sq();
            let far = n.quad.size * n.quad.size < d_sq * self.t_sq;

            if far || n.is_leaf() {
                if !far && n.has_bodies() {
                    for body in &bodies[n.begin as usize..n.end as usize] {
                        let d = body.pos - pos;
                        acc += pull(d, d.mag_sq(), body.mass, self.e_sq);
                    }
                } else if !n.is_empty() {
                    acc += pull(d, d_sq, n.mass, self.e_sq);
                }

                if n.next == 0 {
                    break;
                }
                node_idx = n.next as usize;
            } else {
                node_idx = n.children as usize;
            }
        }

        acc
    }

    /// Depth of every node, computed in one forward pass over the arena.
    pub fn depths(nodes: &[Node]) -> Vec<u32> {
        let mut depths = vec![0; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            if node.is_branch() {
                let first = node.children as usize;
                let depth = depths[i] + 1;
                depths[first..first + 4].fill(depth);
            }
        }
        depths
    }
}
