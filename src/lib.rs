pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{HttpRegistry, InMemoryRegistry};
pub use core::settings::WorkflowSettings;
pub use core::workflow::{Workflow, WorkflowState};
pub use domain::model::{Plate, SlotChoice};
pub use domain::ports::ConfigProvider;
pub use utils::error::{AssignError, Result};
