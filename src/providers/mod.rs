pub mod alert;
pub mod hypervisor;
pub mod probe;

pub use alert::{AlertSink, LogAlertSink, WebhookAlertSink};
pub use hypervisor::{Hypervisor, VBoxHypervisor};
pub use probe::{NetworkProbe, SystemProbe};
