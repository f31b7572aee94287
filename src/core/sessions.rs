use crate::domain::model::{Plate, Session, YardId};
use crate::domain::ports::SessionRegistry;
use crate::utils::error::{AssignError, RegistryError, Result};
use std::sync::Arc;

/// Advisory answer to "is this plate parked right now?".
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveLookup {
    Parked(Session),
    NotParked,
    /// The check itself failed. The flow goes on; the commit step is the
    /// authoritative guard.
    Unknown(String),
}

impl ActiveLookup {
    pub fn session(&self) -> Option<&Session> {
        match self {
            ActiveLookup::Parked(session) => Some(session),
            _ => None,
        }
    }
}

pub struct ActiveSessionChecker<S: SessionRegistry + ?Sized> {
    registry: Arc<S>,
}

impl<S: SessionRegistry + ?Sized> ActiveSessionChecker<S> {
    pub fn new(registry: Arc<S>) -> Self {
        Self { registry }
    }

    pub async fn find_active_by_plate(&self, plate: &Plate) -> ActiveLookup {
        match self.registry.find_active_by_plate(plate).await {
            Ok(Some(session)) => {
                tracing::debug!(
                    "Vehicle {} is parked in slot {} (yard {})",
                    plate,
                    session.slot.name,
                    session.yard.id
                );
                ActiveLookup::Parked(session)
            }
            Ok(None) | Err(RegistryError::NotFound { .. }) => ActiveLookup::NotParked,
            Err(e) => {
                tracing::warn!("Could not check active session for {}: {}", plate, e);
                ActiveLookup::Unknown(e.to_string())
            }
        }
    }

    pub async fn list_active_by_yard(&self, yard_id: YardId) -> Result<Vec<Session>> {
        let sessions = self
            .registry
            .list_active_by_yard(yard_id)
            .await
            .map_err(|e| {
                tracing::warn!("Could not list active sessions for yard {}: {}", yard_id, e);
                AssignError::from_registry(e, "")
            })?;

        Ok(sessions.into_iter().filter(Session::is_active).collect())
    }
}
