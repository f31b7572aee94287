//! Free-slot resolution.
//!
//! The stored slot status drifts from the session ledger, so a slot is free
//! only when its status is free-like AND no active session references it.
//! Inventory order is kept; the first entry is what "automatic" picks.

use crate::core::sessions::ActiveSessionChecker;
use crate::core::settings::WorkflowSettings;
use crate::domain::model::{Session, Slot, Yard, YardId};
use crate::domain::ports::{SessionRegistry, SlotRegistry, YardRegistry};
use crate::utils::error::{AssignError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Keeps the slots whose stored status is free-like and that no active
/// session points at.
pub fn reconcile(inventory: Vec<Slot>, active: &[Session], settings: &WorkflowSettings) -> Vec<Slot> {
    let occupied: HashSet<_> = active
        .iter()
        .filter(|s| s.is_active())
        .map(|s| s.slot.id)
        .collect();

    inventory
        .into_iter()
        .filter(|slot| {
            let free_like = settings.is_free_slot_status(&slot.status);
            let referenced = occupied.contains(&slot.id);
            if free_like && referenced {
                tracing::debug!(
                    "Slot {} is marked \"{}\" but has an active session",
                    slot.name,
                    slot.status
                );
            }
            free_like && !referenced
        })
        .collect()
}

pub struct SlotCandidateResolver<R>
where
    R: YardRegistry + SlotRegistry + SessionRegistry + ?Sized,
{
    registry: Arc<R>,
    sessions: ActiveSessionChecker<R>,
    settings: WorkflowSettings,
}

impl<R> SlotCandidateResolver<R>
where
    R: YardRegistry + SlotRegistry + SessionRegistry + ?Sized,
{
    pub fn new(registry: Arc<R>, settings: WorkflowSettings) -> Self {
        Self {
            sessions: ActiveSessionChecker::new(Arc::clone(&registry)),
            registry,
            settings,
        }
    }

    pub async fn free_slots(&self, yard_id: YardId) -> Result<Vec<Slot>> {
        let yard = self.find_yard(yard_id).await?;
        self.free_slots_in(&yard).await
    }

    /// Same as [`Self::free_slots`] for a yard snapshot the caller already holds.
    pub async fn free_slots_in(&self, yard: &Yard) -> Result<Vec<Slot>> {
        let inventory = self
            .registry
            .list_slots(yard.id, &yard.status)
            .await
            .map_err(|e| AssignError::from_registry(e, ""))?;
        let active = self.sessions.list_active_by_yard(yard.id).await?;

        let total = inventory.len();
        let free = reconcile(inventory, &active, &self.settings);
        tracing::debug!(
            "Yard {}: {} slots, {} active sessions, {} free",
            yard.id,
            total,
            active.len(),
            free.len()
        );
        Ok(free)
    }

    async fn find_yard(&self, yard_id: YardId) -> Result<Yard> {
        let yards = self
            .registry
            .list_yards()
            .await
            .map_err(|e| AssignError::from_registry(e, ""))?;

        yards
            .into_iter()
            .find(|y| y.id == yard_id)
            .ok_or(AssignError::UnknownYard { yard_id })
    }
}
