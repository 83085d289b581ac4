//! Runs a [`Simulation`] on a dedicated thread and lets a presentation
//! thread observe and steer it.
//!
//! One mutex guards everything. The worker holds it for exactly one tick and
//! sleeps unlocked; readers hold it only long enough to copy a [`Snapshot`].

use std::{
    any::Any,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{error, info, warn};

use crate::{
    body::Body,
    config::ShellConfig,
    error::{Error, Result, reserve},
    quadtree::{Node, Quad, Quadtree},
    simulation::Simulation,
};

#[derive(Debug)]
struct Shared {
    running: bool,
    paused: bool,
    sim: Simulation,
    /// Bodies handed over by the presentation side, folded in before the next tick.
    pending: Vec<Body>,
}

/// Copy of the simulation state taken at a tick boundary.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub bodies: Vec<Body>,
    pub nodes: Vec<Node>,
    pub frame: usize,
    pub collision_count: usize,
}

impl Snapshot {
    /// Deepest level present in the tree.
    pub fn max_depth(&self) -> u32 {
        Quadtree::depths(&self.nodes).into_iter().max().unwrap_or(0)
    }

    /// Bounding squares of every node whose depth lies in `min..=max`, with their depth.
    pub fn quads_in_depth_range(&self, min: u32, max: u32) -> Vec<(Quad, u32)> {
        Quadtree::depths(&self.nodes)
            .into_iter()
            .zip(&self.nodes)
            .filter(|&(depth, _)| (min..=max).contains(&depth))
            .map(|(depth, node)| (node.quad, depth))
            .collect()
    }
}

/// Handle to the simulation worker thread.
#[derive(Debug)]
pub struct Shell {
    shared: Arc<Mutex<Shared>>,
    worker: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panicking tick leaves the simulation consistent at tick granularity.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shell {
    /// Moves `sim` onto a new worker thread and starts ticking it.
    pub fn spawn(sim: Simulation, config: &ShellConfig) -> Result<Self> {
        let shared = Arc::new(Mutex::new(Shared {
            running: true,
            paused: false,
            sim,
            pending: Vec::new(),
        }));

        let tick = config.tick_interval();
        let pause = config.pause_interval();
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("simulation".into())
                .spawn(move || run(&shared, tick, pause))
                .map_err(Error::ThreadSpawn)?
        };

        info!(?tick, ?pause, "simulation thread started");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn pause(&self) {
        lock(&self.shared).paused = true;
    }

    pub fn resume(&self) {
        lock(&self.shared).paused = false;
    }

    /// Flips the pause flag and returns the new state.
    pub fn toggle_pause(&self) -> bool {
        let mut state = lock(&self.shared);
        state.paused = !state.paused;
        state.paused
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.shared).paused
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    /// Queues an externally created body for the simulation to pick up.
    pub fn spawn_body(&self, body: Body) -> Result<()> {
        let mut state = lock(&self.shared);
        reserve(&mut state.pending, 1, "pending bodies")?;
        state.pending.push(body);
        Ok(())
    }

    /// Copies the current state.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        self.snapshot_into(&mut snapshot);
        snapshot
    }

    /// Copies the current state into `out`, reusing its buffers.
    pub fn snapshot_into(&self, out: &mut Snapshot) {
        let state = lock(&self.shared);
        out.bodies.clear();
        out.bodies.extend_from_slice(&state.sim.bodies);
        out.nodes.clear();
        out.nodes.extend_from_slice(state.sim.nodes());
        out.frame = state.sim.frame;
        out.collision_count = state.sim.collision_count;
    }

    /// Runs `f` with shared access to the simulation between ticks.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&Simulation) -> R) -> R {
        f(&lock(&self.shared).sim)
    }

    /// Asks the worker to finish its current tick and waits for it.
    /// Calling it again after a successful stop does nothing.
    pub fn stop(&mut self) -> Result<()> {
        lock(&self.shared).running = false;

        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|payload| Error::ThreadJoin(panic_message(payload.as_ref())))?;
            info!("simulation thread stopped");
        }
        Ok(())
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!(%err, "failed to stop simulation thread");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run(shared: &Mutex<Shared>, tick: Duration, pause: Duration) {
    info!("simulation loop started");

    loop {
        let paused = {
            let mut state = lock(shared);
            if !state.running {
                break;
            }

            if state.paused {
                true
            } else {
                let Shared { sim, pending, .. } = &mut *state;
                if !pending.is_empty() {
                    match sim.extend_bodies(pending) {
                        Ok(()) => pending.clear(),
                        Err(err) => warn!(%err, queued = pending.len(), "could not add spawned bodies"),
                    }
                }

                if let Err(err) = sim.step() {
                    warn!(%err, frame = sim.frame, "tick failed, retrying next cycle");
                }
                false
            }
        };

        thread::sleep(if paused { pause } else { tick });
    }

    info!("simulation loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use std::time::Instant;

    fn small_sim() -> Simulation {
        let config = SimulationConfig {
            bodies: 50,
            parallel: false,
            ..SimulationConfig::default()
        };
        Simulation::new(&config).unwrap()
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut shell = Shell::spawn(small_sim(), &ShellConfig::default()).unwrap();
        assert!(shell.is_running());
        shell.stop().unwrap();
        assert!(!shell.is_running());
        shell.stop().unwrap();
    }

    #[test]
    fn test_toggle_pause() {
        let shell = Shell::spawn(small_sim(), &ShellConfig::default()).unwrap();
        assert!(!shell.is_paused());
        assert!(shell.toggle_pause());
        assert!(shell.is_paused());
        assert!(!shell.toggle_pause());
    }

    #[test]
    fn test_spawned_body_is_folded_in() {
        let shell = Shell::spawn(small_sim(), &ShellConfig::default()).unwrap();
        shell.spawn_body(Body::with_mass(ultraviolet::Vec2::new(500.0, 0.0), ultraviolet::Vec2::zero(), 2.0)).unwrap();
        assert!(wait_for(|| shell.snapshot().bodies.len() == 51));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
