use crate::domain::model::YardId;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BLOCKED_STATUSES: &[&str] = &[
    "BLOQUEADO",
    "INATIVO",
    "DESABILITADO",
    "BLOCKED",
    "INACTIVE",
    "DISABLED",
];

pub const DEFAULT_FREE_SLOT_STATUSES: &[&str] = &["L", "S", "LIVRE", "FREE"];

/// Tunables shared by the resolvers and the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Vehicle statuses that forbid parking. Anything else is eligible.
    pub blocked_statuses: Vec<String>,
    /// Stored slot statuses that count as free, before the session check.
    pub free_slot_statuses: Vec<String>,
    pub default_yard: Option<YardId>,
    pub map_path: String,
    pub registration_path: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            blocked_statuses: DEFAULT_BLOCKED_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            free_slot_statuses: DEFAULT_FREE_SLOT_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_yard: None,
            map_path: "/vagas/mapa".to_string(),
            registration_path: "/veiculo/cadastrar".to_string(),
        }
    }
}

impl WorkflowSettings {
    pub fn is_blocked_status(&self, status: &str) -> bool {
        let status = status.trim();
        self.blocked_statuses
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(status))
    }

    pub fn is_free_slot_status(&self, status: &str) -> bool {
        let status = status.trim();
        self.free_slot_statuses
            .iter()
            .any(|free| free.eq_ignore_ascii_case(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_matching_ignores_case() {
        let settings = WorkflowSettings::default();
        assert!(settings.is_blocked_status("blocked"));
        assert!(settings.is_blocked_status(" Bloqueado "));
        assert!(!settings.is_blocked_status("OPERACIONAL"));
        assert!(!settings.is_blocked_status("SOMETHING_NEW"));

        assert!(settings.is_free_slot_status("l"));
        assert!(settings.is_free_slot_status("LIVRE"));
        assert!(!settings.is_free_slot_status("O"));
    }
}
