use crate::{
    body::Body,
    config::{ShellConfig, SimulationConfig},
    quadtree::Node,
    shell::Shell,
    simulation::Simulation,
};
use std::ptr;
use ultraviolet::Vec2;

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_Create(n: usize) -> *mut Shell {
    let config = SimulationConfig {
        bodies: n,
        ..SimulationConfig::default()
    };
    match Simulation::new(&config).and_then(|sim| Shell::spawn(sim, &ShellConfig::default())) {
        Ok(shell) => Box::into_raw(Box::new(shell)),
        Err(err) => {
            tracing::error!(%err, "failed to start simulation");
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_Destroy(handle: *mut Shell) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_SetPaused(handle: *const Shell, paused: bool) {
    if let Some(shell) = unsafe { handle.as_ref() } {
        if paused { shell.pause() } else { shell.resume() }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_TogglePause(handle: *const Shell) -> bool {
    unsafe { handle.as_ref() }.is_some_and(|shell| shell.toggle_pause())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_SpawnBody(
    handle: *const Shell,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    mass: f32,
) -> bool {
    unsafe { handle.as_ref() }.is_some_and(|shell| {
        shell
            .spawn_body(Body::with_mass(Vec2::new(x, y), Vec2::new(vx, vy), mass))
            .is_ok()
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_GetBodyCount(handle: *const Shell) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |shell| shell.with_simulation(|sim| sim.bodies.len()))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_GetNodeCount(handle: *const Shell) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |shell| shell.with_simulation(|sim| sim.nodes().len()))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_GetFrame(handle: *const Shell) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |shell| shell.with_simulation(|sim| sim.frame))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_GetCollisionCount(handle: *const Shell) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |shell| shell.with_simulation(|sim| sim.collision_count))
}

/// Copies up to `capacity` bodies into `out` and returns how many were written.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_CopyBodies(handle: *const Shell, out: *mut Body, capacity: usize) -> usize {
    let Some(shell) = (unsafe { handle.as_ref() }) else { return 0 };
    if out.is_null() {
        return 0;
    }
    shell.with_simulation(|sim| {
        let n = sim.bodies.len().min(capacity);
        unsafe { ptr::copy_nonoverlapping(sim.bodies.as_ptr(), out, n) };
        n
    })
}

/// Copies up to `capacity` tree nodes into `out` and returns how many were written.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Shell_CopyNodes(handle: *const Shell, out: *mut Node, capacity: usize) -> usize {
    let Some(shell) = (unsafe { handle.as_ref() }) else { return 0 };
    if out.is_null() {
        return 0;
    }
    shell.with_simulation(|sim| {
        let nodes = sim.nodes();
        let n = nodes.len().min(capacity);
        unsafe { ptr::copy_nonoverlapping(nodes.as_ptr(), out, n) };
        n
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles_are_ignored() {
        unsafe {
            Shell_Destroy(ptr::null_mut());
            Shell_SetPaused(ptr::null(), true);
            assert!(!Shell_TogglePause(ptr::null()));
            assert!(!Shell_SpawnBody(ptr::null(), 0.0, 0.0, 0.0, 0.0, 1.0));
            assert_eq!(Shell_GetBodyCount(ptr::null()), 0);
            assert_eq!(Shell_CopyBodies(ptr::null(), ptr::null_mut(), 10), 0);
        }
    }

    #[test]
    fn test_round_trip_through_handle() {
        unsafe {
            let handle = Shell_Create(20);
            assert!(!handle.is_null());
            Shell_SetPaused(handle, true);

            let mut bodies = vec![Body::default(); 64];
            let n = Shell_CopyBodies(handle, bodies.as_mut_ptr(), bodies.len());
            assert_eq!(n, 20);
            assert_eq!(Shell_GetBodyCount(handle), 20);

            assert!(Shell_SpawnBody(handle, 1000.0, 0.0, 0.0, 0.0, 8.0));
            Shell_Destroy(handle);
        }
    }
}
