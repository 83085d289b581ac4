//! The spatial index seam used by the attract phase.
//!
//! [`Quadtree`] inserts bodies one at a time and keeps a single aggregate
//! point per leaf. [`PartitionTree`] partitions the body array in place and
//! keeps body ranges at its leaves. Which one runs is picked at runtime by
//! [`TreeStrategy`].

use std::fmt;

use serde::{Deserialize, Serialize};
use ultraviolet::Vec2;

use crate::{
    body::Body,
    error::Result,
    partition::PartitionTree,
    quadtree::{Quad, Quadtree, center_of_mass},
};

/// A Barnes-Hut tree that can be rebuilt from a body set and queried for accelerations.
pub trait SpatialIndex: Send + Sync + fmt::Debug {
    /// Rebuilds the tree from scratch (including aggregates) for the current positions.
    /// Implementations may reorder `bodies`.
    fn build(&mut self, bodies: &mut [Body]) -> Result<()>;

    /// Recomputes branch aggregates from the leaves.
    fn propagate(&mut self);

    /// Acceleration at `pos`; `bodies` is the slice passed to the last `build`.
    fn acc(&self, pos: Vec2, bodies: &[Body]) -> Vec2;

    /// Read-only view of the node arena.
    fn tree(&self) -> &Quadtree;

    fn tree_mut(&mut self) -> &mut Quadtree;

    /// Replaces the tree with a single root leaf aggregating `bodies` directly,
    /// leaving a consistent tree behind after a failed `build`.
    fn collapse(&mut self, bodies: &[Body]);
}

impl SpatialIndex for Quadtree {
    fn build(&mut self, bodies: &mut [Body]) -> Result<()> {
        self.clear(Quad::new_containing(bodies))?;
        for body in bodies.iter() {
            self.insert(body.pos, body.mass)?;
        }
        Quadtree::propagate(self);
        Ok(())
    }

    fn propagate(&mut self) {
        Quadtree::propagate(self);
    }

    fn acc(&self, pos: Vec2, _bodies: &[Body]) -> Vec2 {
        Quadtree::acc(self, pos)
    }

    fn tree(&self) -> &Quadtree {
        self
    }

    fn tree_mut(&mut self) -> &mut Quadtree {
        self
    }

    fn collapse(&mut self, bodies: &[Body]) {
        let (pos, mass) = center_of_mass(bodies);
        self.reset_root(Quad::new_containing(bodies), pos, mass);
    }
}

impl SpatialIndex for PartitionTree {
    fn build(&mut self, bodies: &mut [Body]) -> Result<()> {
        PartitionTree::build(self, bodies)
    }

    fn propagate(&mut self) {
        self.tree.propagate();
    }

    fn acc(&self, pos: Vec2, bodies: &[Body]) -> Vec2 {
        PartitionTree::acc(self, pos, bodies)
    }

    fn tree(&self) -> &Quadtree {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut Quadtree {
        &mut self.tree
    }

    fn collapse(&mut self, bodies: &[Body]) {
        let (pos, mass) = center_of_mass(bodies);
        self.tree.reset_root(Quad::new_containing(bodies), pos, mass);
        if let Some(root) = self.tree.nodes.first_mut() {
            root.end = bodies.len() as u32;
        }
    }
}

/// How the spatial tree is constructed every tick.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeStrategy {
    /// Insert bodies one by one; leaves hold one aggregate point.
    #[default]
    Incremental,
    /// Partition the body array in place; leaves keep up to `leaf_capacity` bodies.
    Partition {
        #[serde(default = "default_leaf_capacity")]
        leaf_capacity: usize,
    },
}

fn default_leaf_capacity() -> usize {
    PartitionTree::DEFAULT_LEAF_CAPACITY
}

impl TreeStrategy {
    /// Creates an empty index pre-sized for `capacity` bodies.
    pub fn build_index(self, theta: f32, epsilon: f32, capacity: usize) -> Result<Box<dyn SpatialIndex>> {
        Ok(match self {
            Self::Incremental => Box::new(Quadtree::with_capacity(theta, epsilon, capacity)?),
            Self::Partition { leaf_capacity } => Box::new(PartitionTree::with_capacity(
                theta,
                epsilon,
                leaf_capacity,
                capacity,
            )?),
        })
    }
}
