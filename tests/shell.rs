use std::{
    panic::{self, AssertUnwindSafe},
    thread,
    time::{Duration, Instant},
};

use barnes_hut_core::{Body, Quadtree, Shell, ShellConfig, Simulation, SimulationConfig, TreeStrategy};
use ultraviolet::Vec2;

fn init_logging() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .finish(),
    )
    .ok();
}

fn start(strategy: TreeStrategy) -> Shell {
    init_logging();
    let config = SimulationConfig {
        bodies: 200,
        parallel: false,
        strategy,
        ..SimulationConfig::default()
    };
    let sim = Simulation::new(&config).unwrap();
    Shell::spawn(sim, &ShellConfig::default()).unwrap()
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
fn pause_freezes_frame_counter() {
    let shell = start(TreeStrategy::Incremental);
    assert!(wait_for(|| shell.snapshot().frame >= 2));

    shell.pause();
    let frozen = shell.snapshot().frame;
    thread::sleep(Duration::from_millis(50));
    assert_eq!(shell.snapshot().frame, frozen);

    shell.resume();
    assert!(wait_for(|| shell.snapshot().frame > frozen));
}

#[test]
fn spawned_bodies_wait_while_paused() {
    let shell = start(TreeStrategy::Incremental);
    shell.pause();
    shell
        .spawn_body(Body::with_mass(Vec2::new(900.0, 900.0), Vec2::zero(), 27.0))
        .unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(shell.snapshot().bodies.len(), 200);

    shell.resume();
    assert!(wait_for(|| shell.snapshot().bodies.len() == 201));
    assert!(shell.with_simulation(|sim| sim.bodies.iter().any(|b| b.mass == 27.0 && (b.radius - 3.0).abs() < 1e-5)));
}

#[test]
fn snapshots_are_tick_consistent() {
    for strategy in [TreeStrategy::Incremental, TreeStrategy::Partition { leaf_capacity: 4 }] {
        let shell = start(strategy);
        assert!(wait_for(|| shell.snapshot().frame >= 1));

        let mut snapshot = Default::default();
        for _ in 0..20 {
            shell.snapshot_into(&mut snapshot);
            let total: f32 = snapshot.bodies.iter().map(|b| b.mass).sum();
            let root = snapshot.nodes[Quadtree::ROOT];
            assert!((root.mass - total).abs() <= total * 1e-5, "{strategy:?}");
            thread::sleep(Duration::from_millis(1));
        }

        let max = snapshot.max_depth();
        assert!(max >= 1);
        assert_eq!(snapshot.quads_in_depth_range(0, max).len(), snapshot.nodes.len());
        assert!(snapshot.quads_in_depth_range(max, max).iter().all(|&(_, depth)| depth == max));
        assert_eq!(snapshot.quads_in_depth_range(0, 0).len(), 1);
    }
}

#[test]
fn stop_joins_worker() {
    let mut shell = start(TreeStrategy::Incremental);
    assert!(wait_for(|| shell.snapshot().frame >= 1));
    shell.stop().unwrap();
    assert!(!shell.is_running());

    let frame = shell.snapshot().frame;
    thread::sleep(Duration::from_millis(20));
    assert_eq!(shell.snapshot().frame, frame);
}

#[test]
fn failing_ticks_leave_consistent_snapshots() {
    init_logging();
    for strategy in [TreeStrategy::Incremental, TreeStrategy::Partition { leaf_capacity: 4 }] {
        let config = SimulationConfig {
            bodies: 200,
            parallel: false,
            strategy,
            max_nodes: Some(9),
            ..SimulationConfig::default()
        };
        let sim = Simulation::new(&config).unwrap();
        let initial = sim.bodies.clone();
        let total: f32 = initial.iter().map(|b| b.mass).sum();
        let shell = Shell::spawn(sim, &ShellConfig::default()).unwrap();

        assert!(wait_for(|| shell.snapshot().nodes.len() == 1));
        thread::sleep(Duration::from_millis(20));

        let snapshot = shell.snapshot();
        assert_eq!(snapshot.frame, 0, "{strategy:?}");
        assert_eq!(snapshot.bodies, initial, "{strategy:?}");
        assert_eq!(snapshot.nodes.len(), 1, "{strategy:?}");
        let root = snapshot.nodes[Quadtree::ROOT];
        assert!((root.mass - total).abs() <= total * 1e-5, "{strategy:?}");
    }
}

#[test]
fn panicking_reader_does_not_wedge_the_worker() {
    let shell = start(TreeStrategy::Incremental);
    assert!(wait_for(|| shell.snapshot().frame >= 1));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        shell.with_simulation(|sim| assert!(sim.bodies.is_empty(), "reader failed"));
    }));
    assert!(result.is_err());

    let frame = shell.snapshot().frame;
    assert!(wait_for(|| shell.snapshot().frame > frame));
    assert!(shell.is_running());
}
