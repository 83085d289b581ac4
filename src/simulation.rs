use crate::{
    body::Body,
    collision::{self, CollisionIndex},
    config::SimulationConfig,
    error::{Result, reserve},
    quadtree::Node,
    spatial::SpatialIndex,
    utils,
};

use rayon::prelude::*;
use tracing::{debug, info};
use ultraviolet::Vec2;

/// Manages the Barnes-Hut N-body simulation state and logic.
#[derive(Debug)]
pub struct Simulation {
    /// Time step per frame.
    pub dt: f32,
    /// Current frame count.
    pub frame: usize,
    /// Collection of all bodies in the simulation.
    pub bodies: Vec<Body>,
    /// Broad-phase collision buffers.
    pub collisions: CollisionIndex,
    /// Spatial tree rebuilt by every attract phase.
    pub tree: Box<dyn SpatialIndex>,
    /// Number of overlapping pairs found by the last collide phase.
    pub collision_count: usize,
    /// Whether to use Rayon for the per-body phases.
    pub parallel: bool,
    /// Seed for [`Simulation::reset`].
    pub seed: u64,
    /// Accelerations computed against the read-only tree before being written back.
    accels: Vec<Vec2>,
    /// Bodies as they were before the tick in progress, restored if it fails.
    backup: Vec<Body>,
}

impl Simulation {
    /// Initializes a simulation with a uniform disc of `config.bodies` bodies.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let bodies = utils::uniform_disc(config.bodies, config.seed);
        Self::with_bodies(bodies, config)
    }

    /// Initializes a simulation with the given bodies; `config.bodies` is ignored.
    pub fn with_bodies(mut bodies: Vec<Body>, config: &SimulationConfig) -> Result<Self> {
        let capacity = config.capacity().max(bodies.len());
        let extra = capacity - bodies.len();
        reserve(&mut bodies, extra, "bodies")?;

        let mut tree = config
            .strategy
            .build_index(config.theta, config.epsilon, capacity)?;
        if let Some(limit) = config.max_nodes {
            tree.tree_mut().node_limit = limit;
        }
        let collisions = CollisionIndex::with_capacity(capacity)?;
        let mut accels = Vec::new();
        reserve(&mut accels, capacity, "accelerations")?;
        let mut backup = Vec::new();
        reserve(&mut backup, capacity, "body backup")?;

        info!(
            bodies = bodies.len(),
            capacity,
            strategy = ?config.strategy,
            "simulation created"
        );

        Ok(Self {
            dt: config.dt,
            frame: 0,
            bodies,
            collisions,
            tree,
            collision_count: 0,
            parallel: config.parallel,
            seed: config.seed,
            accels,
            backup,
        })
    }

    /// Resets the simulation with a new disc of `n` bodies.
    pub fn reset(&mut self, n: usize) {
        self.bodies = utils::uniform_disc(n, self.seed);
        self.frame = 0;
        self.collision_count = 0;
    }

    /// Sets whether to use Rayon for parallelism.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Appends an externally created body; it takes part from the next tick on.
    pub fn add_body(&mut self, body: Body) -> Result<()> {
        reserve(&mut self.bodies, 1, "bodies")?;
        self.bodies.push(body);
        Ok(())
    }

    /// Appends a batch of bodies, all or nothing.
    pub fn extend_bodies(&mut self, bodies: &[Body]) -> Result<()> {
        reserve(&mut self.bodies, bodies.len(), "bodies")?;
        self.bodies.extend_from_slice(bodies);
        Ok(())
    }

    /// Nodes of the tree built by the last attract phase.
    pub fn nodes(&self) -> &[Node] {
        &self.tree.tree().nodes
    }

    /// Advances the simulation by one step: integrate, collide, attract.
    ///
    /// A step either completes or leaves no trace: on error the bodies,
    /// frame counter and collision count are restored to their values before
    /// the call, and the tree collapses to a single root aggregating them.
    pub fn step(&mut self) -> Result<()> {
        self.backup.clear();
        reserve(&mut self.backup, self.bodies.len(), "body backup")?;
        self.backup.extend_from_slice(&self.bodies);
        let collision_count = self.collision_count;

        let result = self.advance();
        if let Err(err) = &result {
            debug!(%err, frame = self.frame, "step failed, rolling back");
            self.bodies.copy_from_slice(&self.backup);
            self.collision_count = collision_count;
            self.tree.collapse(&self.bodies);
            return result;
        }

        self.frame += 1;
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.iterate();
        self.collide()?;
        self.attract()
    }

    /// Updates the position and velocity of all bodies based on their current acceleration and time step.
    pub fn iterate(&mut self) {
        let dt = self.dt;
        if self.parallel {
            self.bodies.par_iter_mut().for_each(|body| body.update(dt));
        } else {
            self.bodies.iter_mut().for_each(|body| body.update(dt));
        }
    }

    /// Detects and resolves collisions between bodies with sweep and prune.
    pub fn collide(&mut self) -> Result<()> {
        self.collision_count = 0;
        if self.bodies.is_empty() {
            return Ok(());
        }

        self.collisions.update(&self.bodies)?;

        let bodies = &mut self.bodies;
        let mut count = 0;
        self.collisions.sweep(|i, j| {
            if collision::resolve(bodies, i, j) {
                count += 1;
            }
        });
        self.collision_count = count;

        debug!(frame = self.frame, collisions = count, "collide");
        Ok(())
    }

    /// Calculates gravitational forces (acceleration) for all bodies using the Barnes-Hut algorithm.
    /// 1. Rebuilds the tree from current body positions.
    /// 2. Propagates center of mass information up the tree.
    /// 3. Approximates forces for each body using the tree.
    pub fn attract(&mut self) -> Result<()> {
        self.tree.build(&mut self.bodies)?;

        let n = self.bodies.len();
        self.accels.clear();
        reserve(&mut self.accels, n, "accelerations")?;
        self.accels.resize(n, Vec2::zero());

        let tree = &*self.tree;
        let bodies = &self.bodies;
        if self.parallel {
            self.accels
                .par_iter_mut()
                .zip(bodies.par_iter())
                .for_each(|(acc, body)| *acc = tree.acc(body.pos, bodies));
        } else {
            for (acc, body) in self.accels.iter_mut().zip(bodies) {
                *acc = tree.acc(body.pos, bodies);
            }
        }

        for (body, &acc) in self.bodies.iter_mut().zip(&self.accels) {
            body.acc = acc;
        }

        let nodes = self.tree.tree();
        debug!(
            frame = self.frame,
            nodes = nodes.nodes.len(),
            parents = nodes.parents.len(),
            "attract"
        );
        Ok(())
    }
}
