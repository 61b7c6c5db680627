pub mod fleet;
pub mod monitor;
pub mod provisioner;
pub mod recovery;
pub mod snapshot;

pub use fleet::FleetManager;
pub use monitor::{probe_vm, HealthMonitor};
pub use provisioner::Provisioner;
pub use recovery::FailureHandler;
pub use snapshot::SnapshotManager;
