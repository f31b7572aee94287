use crate::domain::model::{Session, SlotId, YardId};
use thiserror::Error;

/// What kind of double booking the registry refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    SlotTaken,
    VehicleParked,
    Unspecified,
}

/// Raw failure reported by a registry collaborator.
///
/// Resolvers convert these into [`AssignError`] before anything reaches the
/// workflow, so the state machine never matches on this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Registry conflict ({kind:?}): {message}")]
    Conflict { kind: ConflictKind, message: String },

    #[error("Registry rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Registry request timed out")]
    Timeout,

    #[error("Registry transport failure: {message}")]
    Transport { message: String },

    #[error("Unexpected registry payload: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RegistryError::Timeout
        } else if err.is_decode() {
            RegistryError::Decode {
                message: err.to_string(),
            }
        } else {
            RegistryError::Transport {
                message: err.to_string(),
            }
        }
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum AssignError {
    #[error("Invalid plate \"{input}\": {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("Vehicle {plate} is not registered")]
    VehicleNotFound { plate: String },

    #[error("Vehicle {plate} has status \"{status}\" and cannot park")]
    VehicleBlocked { plate: String, status: String },

    #[error("Vehicle {plate} is already parked in slot {} ({})", .session.slot.name, .session.yard.name)]
    AlreadyParked { plate: String, session: Box<Session> },

    /// The registry refused the commit because the vehicle is parked, but
    /// where could not be looked up.
    #[error("Vehicle {plate} is already parked elsewhere: {message}")]
    VehicleConflict { plate: String, message: String },

    #[error("No free slot in yard {yard_id}")]
    NoFreeSlot { yard_id: YardId },

    #[error("Slot assignment conflict for {plate}: {message}")]
    Conflict {
        plate: String,
        slot_id: Option<SlotId>,
        message: String,
    },

    #[error("Yard {yard_id} does not exist")]
    UnknownYard { yard_id: YardId },

    #[error("Registry unavailable: {message}")]
    Transport { message: String, outcome_unknown: bool },

    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Eligibility,
    Occupancy,
    Network,
    Workflow,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AssignError {
    /// Converts a registry failure into the workflow taxonomy.
    pub fn from_registry(err: RegistryError, plate: &str) -> Self {
        match err {
            // Nothing was written; only a timed-out create leaves the outcome
            // open, and the executor handles that case itself.
            RegistryError::Timeout => AssignError::Transport {
                message: "registry request timed out".to_string(),
                outcome_unknown: false,
            },
            RegistryError::Conflict { message, .. } => AssignError::Conflict {
                plate: plate.to_string(),
                slot_id: None,
                message,
            },
            other => AssignError::Transport {
                message: other.to_string(),
                outcome_unknown: false,
            },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AssignError::InvalidFormat { .. } => ErrorCategory::Validation,
            AssignError::VehicleNotFound { .. } | AssignError::VehicleBlocked { .. } => {
                ErrorCategory::Eligibility
            }
            AssignError::AlreadyParked { .. }
            | AssignError::VehicleConflict { .. }
            | AssignError::NoFreeSlot { .. }
            | AssignError::Conflict { .. }
            | AssignError::UnknownYard { .. } => ErrorCategory::Occupancy,
            AssignError::Transport { .. } => ErrorCategory::Network,
            AssignError::InvalidTransition { .. } => ErrorCategory::Workflow,
            AssignError::ConfigError { .. }
            | AssignError::ConfigValidationError { .. }
            | AssignError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AssignError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AssignError::InvalidFormat { .. }
            | AssignError::VehicleNotFound { .. }
            | AssignError::AlreadyParked { .. }
            | AssignError::VehicleConflict { .. } => ErrorSeverity::Low,
            AssignError::NoFreeSlot { .. }
            | AssignError::Conflict { .. }
            | AssignError::Transport { .. } => ErrorSeverity::Medium,
            AssignError::VehicleBlocked { .. }
            | AssignError::UnknownYard { .. }
            | AssignError::InvalidTransition { .. } => ErrorSeverity::High,
            AssignError::IoError(_)
            | AssignError::ConfigError { .. }
            | AssignError::ConfigValidationError { .. }
            | AssignError::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    /// True when the operator can act on the error without leaving the flow.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AssignError::VehicleBlocked { .. }
                | AssignError::InvalidTransition { .. }
                | AssignError::IoError(_)
                | AssignError::ConfigError { .. }
                | AssignError::ConfigValidationError { .. }
                | AssignError::InvalidConfigValueError { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AssignError::InvalidFormat { .. } => {
                "Invalid plate format. Use the legacy (ABC1234) or Mercosul (ABC1D23) format."
                    .to_string()
            }
            AssignError::VehicleNotFound { plate } => {
                format!("Vehicle {} was not found in the registry.", plate)
            }
            AssignError::VehicleBlocked { plate, status } => {
                format!(
                    "Vehicle {} has status \"{}\" and cannot park.",
                    plate, status
                )
            }
            AssignError::AlreadyParked { plate, session } => format!(
                "Vehicle {} is already parked in slot {} ({}). Release the slot before parking again.",
                plate, session.slot.name, session.yard.name
            ),
            AssignError::VehicleConflict { plate, .. } => format!(
                "Vehicle {} is already parked in another slot. Its location could not be loaded.",
                plate
            ),
            AssignError::NoFreeSlot { .. } => {
                "No free slot in the selected yard. Try another yard.".to_string()
            }
            AssignError::Conflict { slot_id, .. } => match slot_id {
                Some(id) => format!("Slot {} was just taken by another vehicle.", id),
                None => "The chosen slot was just taken by another vehicle.".to_string(),
            },
            AssignError::UnknownYard { yard_id } => format!("Yard {} does not exist.", yard_id),
            AssignError::Transport {
                outcome_unknown: true,
                ..
            } => "The registry did not answer in time; the assignment may or may not have been recorded."
                .to_string(),
            AssignError::Transport { .. } => {
                "Could not reach the parking registry.".to_string()
            }
            AssignError::InvalidTransition { action, state } => {
                format!("Cannot {} while {}.", action, state)
            }
            AssignError::IoError(e) => format!("File operation failed: {}", e),
            AssignError::ConfigError { message } => format!("Configuration error: {}", message),
            AssignError::ConfigValidationError { field, message } => {
                format!("Invalid configuration for {}: {}", field, message)
            }
            AssignError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AssignError::InvalidFormat { .. } => "Rescan the plate or type it manually.".to_string(),
            AssignError::VehicleNotFound { .. } => {
                "Register the vehicle first, or cancel and scan another plate.".to_string()
            }
            AssignError::VehicleBlocked { .. } => {
                "Resolve the vehicle status in the registry before parking.".to_string()
            }
            AssignError::AlreadyParked { .. } => {
                "Open the slot map to locate the vehicle, or release its slot.".to_string()
            }
            AssignError::VehicleConflict { .. } => {
                "Cancel and look the vehicle up on the slot map before parking it again.".to_string()
            }
            AssignError::NoFreeSlot { .. } => "Choose another yard.".to_string(),
            AssignError::Conflict { .. } => {
                "Pick another slot from the refreshed list and confirm again.".to_string()
            }
            AssignError::UnknownYard { .. } => "Reload the yard list.".to_string(),
            AssignError::Transport { .. } => {
                "Retry; the vehicle is re-checked before any new attempt.".to_string()
            }
            AssignError::InvalidTransition { .. } => "Cancel and start over.".to_string(),
            AssignError::IoError(_) => "Check file paths and permissions.".to_string(),
            AssignError::ConfigError { .. }
            | AssignError::ConfigValidationError { .. }
            | AssignError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line arguments.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AssignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_timeout_is_plain_transport_failure() {
        let err = AssignError::from_registry(RegistryError::Timeout, "ABC1234");
        assert_eq!(err.user_friendly_message(), "Could not reach the parking registry.");
        match err {
            AssignError::Transport {
                outcome_unknown, ..
            } => assert!(!outcome_unknown),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_registry_conflict_maps_to_conflict() {
        let err = AssignError::from_registry(
            RegistryError::Conflict {
                kind: ConflictKind::SlotTaken,
                message: "Box A1 ocupado".to_string(),
            },
            "ABC1234",
        );
        assert!(matches!(err, AssignError::Conflict { .. }));
        assert_eq!(err.category(), ErrorCategory::Occupancy);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_blocked_is_not_recoverable() {
        let err = AssignError::VehicleBlocked {
            plate: "ABC1234".to_string(),
            status: "BLOQUEADO".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("BLOQUEADO"));
    }
}
