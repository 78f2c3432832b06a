pub mod block_window;
pub mod blocks;
pub mod clock;
pub mod coordinator;
pub mod env;
pub mod events;
pub mod interactive;
pub mod log;
pub mod monitor;
pub mod network;
pub mod race;
pub mod render;
pub mod rpc;
#[cfg(test)]
mod rpc_testing;
pub mod units;

pub use coordinator::{ComparisonCoordinator, CoordinatorError, NetworkSetup};
pub use events::Event;
pub use monitor::{MonitorState, NetworkBlockMonitor, RefreshOutcome};
pub use network::{Network, NetworkProfile};
pub use race::{AttemptId, LatencyRace, RaceError, RaceResult};
pub use rpc::{JsonRpcClient, RpcClient, RpcError};
