use crate::core::settings::WorkflowSettings;
use crate::core::ConfigProvider;
use crate::utils::error::{AssignError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub workflow: WorkflowSettings,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// "compact" (default) or "json"
    pub format: Option<String>,
}

impl TomlConfig {
    /// Loads a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AssignError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| AssignError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("registry.base_url", &self.registry.base_url)?;

        if let Some(timeout) = self.registry.timeout_seconds {
            validation::validate_range("registry.timeout_seconds", timeout, 1, 300)?;
        }

        validation::validate_status_list("workflow.blocked_statuses", &self.workflow.blocked_statuses)?;
        validation::validate_status_list(
            "workflow.free_slot_statuses",
            &self.workflow.free_slot_statuses,
        )?;
        validation::validate_route("workflow.map_path", &self.workflow.map_path)?;
        validation::validate_route("workflow.registration_path", &self.workflow.registration_path)?;

        if let Some(format) = self.log_format() {
            if format != "compact" && format != "json" {
                return Err(AssignError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_format(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.format.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn registry_url(&self) -> &str {
        &self.registry.base_url
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.registry
                .timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }

    fn workflow_settings(&self) -> WorkflowSettings {
        self.workflow.clone()
    }

    fn registry_headers(&self) -> Vec<(String, String)> {
        self.registry
            .headers
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
