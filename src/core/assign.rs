use crate::core::sessions::{ActiveLookup, ActiveSessionChecker};
use crate::core::settings::WorkflowSettings;
use crate::core::slots::SlotCandidateResolver;
use crate::domain::model::{NewSession, Plate, Session, SlotId, YardId};
use crate::domain::ports::Registry;
use crate::utils::error::{AssignError, ConflictKind, RegistryError, Result};
use serde::Serialize;
use std::sync::Arc;

/// Where the operator lands after a successful assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationTarget {
    pub yard_id: YardId,
    pub slot_id: SlotId,
    pub slot_name: String,
    pub plate: String,
}

impl NavigationTarget {
    pub fn from_session(session: &Session) -> Self {
        Self {
            yard_id: session.yard.id,
            slot_id: session.slot.id,
            slot_name: session.slot.name.clone(),
            plate: session.plate.clone(),
        }
    }

    /// Slot-map link with the assigned slot highlighted.
    pub fn to_link(&self, map_path: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("highlight", &self.slot_id.to_string())
            .append_pair("plate", &self.plate)
            .append_pair("slot", &self.slot_name)
            .append_pair("yardId", &self.yard_id.to_string())
            .finish();
        format!("{}?{}", map_path, query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub session: Session,
    pub target: NavigationTarget,
    pub link: String,
}

pub struct AssignmentExecutor<R: Registry + ?Sized> {
    registry: Arc<R>,
    sessions: ActiveSessionChecker<R>,
    slots: SlotCandidateResolver<R>,
    settings: WorkflowSettings,
}

impl<R: Registry + ?Sized> AssignmentExecutor<R> {
    pub fn new(registry: Arc<R>, settings: WorkflowSettings) -> Self {
        Self {
            sessions: ActiveSessionChecker::new(Arc::clone(&registry)),
            slots: SlotCandidateResolver::new(Arc::clone(&registry), settings.clone()),
            registry,
            settings,
        }
    }

    /// Parks `plate` in `slot_id`, or in the first free slot of `yard_id`
    /// when no slot is given.
    ///
    /// The live active-session check always runs first, so a retried call for
    /// a plate that already got its session short-circuits without creating a
    /// second one.
    pub async fn assign(
        &self,
        plate: &Plate,
        slot_id: Option<SlotId>,
        yard_id: YardId,
    ) -> Result<Assignment> {
        match self.sessions.find_active_by_plate(plate).await {
            ActiveLookup::Parked(session) => {
                tracing::info!(
                    "Vehicle {} already parked in slot {}, skipping commit",
                    plate,
                    session.slot.name
                );
                return Err(already_parked(plate, session));
            }
            ActiveLookup::Unknown(reason) => {
                tracing::warn!(
                    "Active session check for {} inconclusive ({}), relying on commit",
                    plate,
                    reason
                );
            }
            ActiveLookup::NotParked => {}
        }

        // Automatic choice is resolved from a fresh snapshot, never from the
        // list the operator was shown.
        let slot_id = match slot_id {
            Some(id) => id,
            None => {
                let free = self.slots.free_slots(yard_id).await?;
                match free.first() {
                    Some(slot) => {
                        tracing::info!("Automatic choice for {}: slot {}", plate, slot.name);
                        slot.id
                    }
                    None => return Err(AssignError::NoFreeSlot { yard_id }),
                }
            }
        };

        let request = NewSession {
            plate: plate.as_str().to_string(),
            slot_id: Some(slot_id),
            yard_id: Some(yard_id),
        };

        tracing::debug!("Creating session {:?}", request);
        match self.registry.create_session(&request).await {
            Ok(session) => {
                tracing::info!(
                    "Parked {} in slot {} (yard {}), session {}",
                    plate,
                    session.slot.name,
                    session.yard.id,
                    session.id
                );
                Ok(self.assignment(session))
            }
            Err(RegistryError::Timeout) => self.recover_timeout(plate, slot_id).await,
            Err(RegistryError::Conflict { kind, message }) => {
                Err(self.explain_conflict(plate, slot_id, kind, message).await)
            }
            Err(RegistryError::NotFound { message }) => {
                // Slot removed under us; same recovery as a taken slot.
                Err(AssignError::Conflict {
                    plate: plate.as_str().to_string(),
                    slot_id: Some(slot_id),
                    message,
                })
            }
            Err(e) => Err(AssignError::from_registry(e, plate.as_str())),
        }
    }

    /// Tells "this vehicle is parked elsewhere" apart from "someone else took
    /// the slot". The live lookup wins; the registry's own classification is
    /// used when the lookup is inconclusive.
    async fn explain_conflict(
        &self,
        plate: &Plate,
        slot_id: SlotId,
        kind: ConflictKind,
        message: String,
    ) -> AssignError {
        match self.sessions.find_active_by_plate(plate).await {
            ActiveLookup::Parked(session) => already_parked(plate, session),
            ActiveLookup::Unknown(reason) if kind == ConflictKind::VehicleParked => {
                tracing::warn!(
                    "Registry reports {} already parked, location unavailable: {}",
                    plate,
                    reason
                );
                AssignError::VehicleConflict {
                    plate: plate.as_str().to_string(),
                    message,
                }
            }
            _ => {
                tracing::info!("Slot {} was taken before {} could park: {}", slot_id, plate, message);
                AssignError::Conflict {
                    plate: plate.as_str().to_string(),
                    slot_id: Some(slot_id),
                    message,
                }
            }
        }
    }

    async fn recover_timeout(&self, plate: &Plate, slot_id: SlotId) -> Result<Assignment> {
        tracing::warn!("Create session for {} timed out, re-checking", plate);
        match self.sessions.find_active_by_plate(plate).await {
            ActiveLookup::Parked(session) if session.slot.id == slot_id => {
                tracing::info!("Session {} for {} was committed despite the timeout", session.id, plate);
                Ok(self.assignment(session))
            }
            ActiveLookup::Parked(session) => Err(already_parked(plate, session)),
            ActiveLookup::NotParked => Err(AssignError::Transport {
                message: format!("request timed out and {} is not parked", plate),
                outcome_unknown: false,
            }),
            ActiveLookup::Unknown(reason) => Err(AssignError::Transport {
                message: format!("request timed out and re-check failed: {}", reason),
                outcome_unknown: true,
            }),
        }
    }

    fn assignment(&self, session: Session) -> Assignment {
        let target = NavigationTarget::from_session(&session);
        let link = target.to_link(&self.settings.map_path);
        Assignment {
            session,
            target,
            link,
        }
    }
}

fn already_parked(plate: &Plate, session: Session) -> AssignError {
    AssignError::AlreadyParked {
        plate: plate.as_str().to_string(),
        session: Box::new(session),
    }
}
