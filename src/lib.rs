pub mod body;
pub mod c_api;
pub mod collision;
pub mod config;
pub mod error;
pub mod partition;
pub mod quadtree;
pub mod shell;
pub mod simulation;
pub mod spatial;
pub mod utils;

pub use body::Body;
pub use collision::{Aabb, CollisionIndex};
pub use config::{Config, ShellConfig, SimulationConfig};
pub use error::{Error, Result};
pub use partition::PartitionTree;
pub use quadtree::{Node, Quad, Quadtree};
pub use shell::{Shell, Snapshot};
pub use simulation::Simulation;
pub use spatial::{SpatialIndex, TreeStrategy};
