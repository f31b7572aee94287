use crate::core::settings::WorkflowSettings;
use crate::core::ConfigProvider;
use crate::domain::model::{SlotChoice, SlotId, YardId};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "park-assign")]
#[command(about = "Assign a scanned vehicle to a free parking slot")]
pub struct CliConfig {
    /// Plate as typed or scanned; it is normalized before use.
    #[arg(long)]
    pub plate: String,

    #[arg(long, default_value = "http://localhost:8080/api")]
    pub registry_url: String,

    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,

    /// TOML configuration; overrides the registry flags above.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Yard to park in (defaults to the vehicle's current or first yard)")]
    pub yard: Option<YardId>,

    #[arg(long, help = "Slot to park in (defaults to the first free slot)")]
    pub slot: Option<SlotId>,

    #[arg(long, help = "List free slots without assigning")]
    pub dry_run: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn slot_choice(&self) -> SlotChoice {
        SlotChoice::from(self.slot)
    }
}

impl ConfigProvider for CliConfig {
    fn registry_url(&self) -> &str {
        &self.registry_url
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            default_yard: self.yard,
            ..WorkflowSettings::default()
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("plate", &self.plate)?;
        validation::validate_url("registry_url", &self.registry_url)?;
        validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 300)?;
        Ok(())
    }
}
