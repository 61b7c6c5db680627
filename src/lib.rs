pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod providers;
pub mod registry;
pub mod types;

pub use config::Config;
pub use error::{FleetError, Result};
pub use types::*;
