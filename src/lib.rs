pub mod actor;
pub mod error;
pub mod harness;
pub mod sync;

pub use actor::{Actor, ActorReport, Timing};
pub use error::MonitorError;
pub use harness::{Harness, HarnessConfig, RunReport};
pub use sync::{neighbor_monitor::NeighborMonitor, ActorState, Grant, ResourceMonitor};
