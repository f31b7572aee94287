//! Operator workflow: `Scanning → Confirming → Assigning → {Done, Failed}`.
//!
//! Every operator selection lives in the [`Confirmation`] value carried by
//! the state, and every failure ends up in [`Workflow::last_error`] instead
//! of escaping as an `Err`. Only misuse of the machine (an action that is
//! not allowed in the current state) is returned to the caller.

use crate::core::assign::{Assignment, AssignmentExecutor};
use crate::core::sessions::{ActiveLookup, ActiveSessionChecker};
use crate::core::settings::WorkflowSettings;
use crate::core::slots::SlotCandidateResolver;
use crate::core::vehicle::{VehicleLookup, VehicleResolver};
use crate::domain::model::{Plate, Session, Slot, SlotChoice, SlotId, Vehicle, Yard, YardId};
use crate::domain::ports::Registry;
use crate::utils::error::{AssignError, Result};
use std::sync::Arc;

/// What the operator is looking at while deciding where to park.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub plate: Plate,
    pub vehicle: Vehicle,
    /// Informational only; the commit step re-checks.
    pub already_parked: Option<Session>,
    pub parked_check_failed: bool,
    pub yards: Vec<Yard>,
    pub yard_id: Option<YardId>,
    pub free_slots: Vec<Slot>,
    pub choice: SlotChoice,
}

impl Confirmation {
    pub fn selected_yard(&self) -> Option<&Yard> {
        self.yard_id
            .and_then(|id| self.yards.iter().find(|y| y.id == id))
    }
}

/// Identifies one in-flight assignment. A result is applied only if the
/// workflow is still waiting on the same ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignTicket {
    pub plate: Plate,
    pub request_id: u64,
    pub slot_id: Option<SlotId>,
    pub yard_id: YardId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Scanning {
        /// Set when the last scanned plate is unknown and the operator has to
        /// choose between registering it and cancelling.
        pending_registration: Option<Plate>,
    },
    Confirming(Box<Confirmation>),
    Assigning {
        ticket: AssignTicket,
        confirmation: Box<Confirmation>,
    },
    Done(Box<Assignment>),
    Failed {
        plate: Plate,
        vehicle: Option<Vehicle>,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Scanning { .. } => "scanning",
            WorkflowState::Confirming(_) => "confirming",
            WorkflowState::Assigning { .. } => "assigning",
            WorkflowState::Done(_) => "done",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    fn idle() -> Self {
        WorkflowState::Scanning {
            pending_registration: None,
        }
    }
}

pub struct Workflow<R: Registry + ?Sized> {
    registry: Arc<R>,
    settings: WorkflowSettings,
    vehicles: VehicleResolver<R>,
    sessions: ActiveSessionChecker<R>,
    slots: SlotCandidateResolver<R>,
    executor: AssignmentExecutor<R>,
    state: WorkflowState,
    last_error: Option<AssignError>,
    next_request_id: u64,
}

impl<R: Registry + ?Sized> Workflow<R> {
    pub fn new(registry: Arc<R>, settings: WorkflowSettings) -> Self {
        Self {
            vehicles: VehicleResolver::new(Arc::clone(&registry), settings.clone()),
            sessions: ActiveSessionChecker::new(Arc::clone(&registry)),
            slots: SlotCandidateResolver::new(Arc::clone(&registry), settings.clone()),
            executor: AssignmentExecutor::new(Arc::clone(&registry), settings.clone()),
            registry,
            settings,
            state: WorkflowState::idle(),
            last_error: None,
            next_request_id: 0,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&AssignError> {
        self.last_error.as_ref()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Feeds a raw plate from the scanner or the keyboard.
    pub async fn scan(&mut self, raw: &str) -> Result<&WorkflowState> {
        if !matches!(self.state, WorkflowState::Scanning { .. }) {
            return Err(self.invalid("scan a plate"));
        }
        self.last_error = None;
        self.state = WorkflowState::idle();

        let plate = match Plate::parse(raw) {
            Ok(plate) => plate,
            Err(e) => {
                tracing::debug!("Rejected plate input {:?}: {}", raw, e);
                self.last_error = Some(e);
                return Ok(&self.state);
            }
        };

        let vehicle = match self.vehicles.find_by_plate(&plate).await {
            Ok(VehicleLookup::Eligible(vehicle)) => vehicle,
            Ok(VehicleLookup::NotFound) => {
                self.last_error = Some(AssignError::VehicleNotFound {
                    plate: plate.to_string(),
                });
                self.state = WorkflowState::Scanning {
                    pending_registration: Some(plate),
                };
                return Ok(&self.state);
            }
            Ok(VehicleLookup::Blocked { vehicle, status }) => {
                self.last_error = Some(AssignError::VehicleBlocked {
                    plate: plate.to_string(),
                    status,
                });
                self.state = WorkflowState::Failed {
                    plate,
                    vehicle: Some(vehicle),
                };
                return Ok(&self.state);
            }
            Err(e) => {
                self.last_error = Some(e);
                return Ok(&self.state);
            }
        };

        let (already_parked, parked_check_failed) =
            match self.sessions.find_active_by_plate(&plate).await {
                ActiveLookup::Parked(session) => (Some(session), false),
                ActiveLookup::NotParked => (None, false),
                ActiveLookup::Unknown(_) => (None, true),
            };

        let mut confirmation = Confirmation {
            plate,
            vehicle,
            already_parked,
            parked_check_failed,
            yards: Vec::new(),
            yard_id: None,
            free_slots: Vec::new(),
            choice: SlotChoice::Automatic,
        };

        if let Err(e) = self.load_yards(&mut confirmation).await {
            self.last_error = Some(e);
        } else if let Err(e) = self.load_free_slots(&mut confirmation).await {
            self.last_error = Some(e);
        }

        tracing::info!(
            "Plate {} ready for confirmation ({} free slots)",
            confirmation.plate,
            confirmation.free_slots.len()
        );
        self.state = WorkflowState::Confirming(Box::new(confirmation));
        Ok(&self.state)
    }

    /// Switches the yard and re-resolves its free slots.
    pub async fn select_yard(&mut self, yard_id: YardId) -> Result<&WorkflowState> {
        let mut confirmation = self.take_confirmation("select a yard")?;
        self.last_error = None;

        if confirmation.yards.iter().any(|y| y.id == yard_id) {
            confirmation.yard_id = Some(yard_id);
            confirmation.choice = SlotChoice::Automatic;
            if let Err(e) = self.load_free_slots(&mut confirmation).await {
                self.last_error = Some(e);
            }
        } else {
            self.last_error = Some(AssignError::UnknownYard { yard_id });
        }

        self.state = WorkflowState::Confirming(confirmation);
        Ok(&self.state)
    }

    pub fn select_slot(&mut self, choice: SlotChoice) -> Result<&WorkflowState> {
        match &mut self.state {
            WorkflowState::Confirming(confirmation) => {
                if let SlotChoice::Slot(id) = choice {
                    if !confirmation.free_slots.iter().any(|s| s.id == id) {
                        tracing::debug!("Slot {} is not in the last free-slot snapshot", id);
                    }
                }
                confirmation.choice = choice;
                Ok(&self.state)
            }
            _ => Err(self.invalid("select a slot")),
        }
    }

    /// Reloads yards (if missing) and the free slots of the selected yard.
    pub async fn refresh_slots(&mut self) -> Result<&WorkflowState> {
        let mut confirmation = self.take_confirmation("refresh slots")?;
        self.last_error = None;

        let loaded = if confirmation.yards.is_empty() {
            self.load_yards(&mut confirmation).await
        } else {
            Ok(())
        };
        if let Err(e) = loaded {
            self.last_error = Some(e);
        } else if let Err(e) = self.load_free_slots(&mut confirmation).await {
            self.last_error = Some(e);
        }

        self.state = WorkflowState::Confirming(confirmation);
        Ok(&self.state)
    }

    /// Back to `Scanning` from wherever the workflow is. An assignment still
    /// in flight is orphaned and its result will be discarded.
    pub fn cancel(&mut self) -> &WorkflowState {
        if let WorkflowState::Assigning { ticket, .. } = &self.state {
            tracing::info!("Cancelled in-flight assignment for {}", ticket.plate);
        }
        self.last_error = None;
        self.state = WorkflowState::idle();
        &self.state
    }

    /// Link to the vehicle registration form for an unknown plate.
    pub fn registration_link(&self) -> Option<String> {
        match &self.state {
            WorkflowState::Scanning {
                pending_registration: Some(plate),
            } => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("placa", plate.as_str())
                    .finish();
                Some(format!("{}?{}", self.settings.registration_path, query))
            }
            _ => None,
        }
    }

    /// Confirms the current selection: begin, run and apply in one go.
    pub async fn confirm(&mut self) -> Result<&WorkflowState> {
        let ticket = self.begin_assignment()?;
        let outcome = self.execute(&ticket).await;
        self.complete_assignment(&ticket, outcome).await;
        Ok(&self.state)
    }

    /// Moves `Confirming → Assigning` and hands out the ticket the result
    /// must be reported with.
    pub fn begin_assignment(&mut self) -> Result<AssignTicket> {
        let confirmation = match &self.state {
            WorkflowState::Confirming(c) => c,
            _ => return Err(self.invalid("confirm")),
        };
        let yard_id = confirmation.yard_id.ok_or_else(|| AssignError::InvalidTransition {
            action: "confirm".to_string(),
            state: "no yard is selected".to_string(),
        })?;

        self.next_request_id += 1;
        let ticket = AssignTicket {
            plate: confirmation.plate.clone(),
            request_id: self.next_request_id,
            slot_id: confirmation.choice.slot_id(),
            yard_id,
        };

        let confirmation = self.take_confirmation("confirm")?;
        self.last_error = None;
        tracing::info!(
            "Assigning {} (request {}) in yard {}",
            ticket.plate,
            ticket.request_id,
            ticket.yard_id
        );
        self.state = WorkflowState::Assigning {
            ticket: ticket.clone(),
            confirmation,
        };
        Ok(ticket)
    }

    /// Runs the commit for a ticket. Does not touch the workflow state.
    pub async fn execute(&self, ticket: &AssignTicket) -> Result<Assignment> {
        self.executor
            .assign(&ticket.plate, ticket.slot_id, ticket.yard_id)
            .await
    }

    /// Applies an assignment result. Returns `false` when the result belongs
    /// to a ticket the workflow is no longer waiting on.
    pub async fn complete_assignment(
        &mut self,
        ticket: &AssignTicket,
        outcome: Result<Assignment>,
    ) -> bool {
        let current = match &self.state {
            WorkflowState::Assigning { ticket: current, .. } => Some(current),
            _ => None,
        };
        if current != Some(ticket) {
            tracing::warn!(
                "Discarding stale assignment result for {} (request {})",
                ticket.plate,
                ticket.request_id
            );
            return false;
        }

        let mut confirmation = match std::mem::replace(&mut self.state, WorkflowState::idle()) {
            WorkflowState::Assigning { confirmation, .. } => confirmation,
            other => {
                self.state = other;
                return false;
            }
        };

        match outcome {
            Ok(assignment) => {
                self.last_error = None;
                self.state = WorkflowState::Done(Box::new(assignment));
                return true;
            }
            Err(AssignError::AlreadyParked { plate, session }) => {
                confirmation.already_parked = Some((*session).clone());
                self.last_error = Some(AssignError::AlreadyParked { plate, session });
            }
            Err(err @ AssignError::Conflict { .. }) => {
                // Someone else got the slot: offer a freshly resolved list.
                confirmation.choice = SlotChoice::Automatic;
                if let Err(e) = self.load_free_slots(&mut confirmation).await {
                    tracing::warn!("Could not refresh free slots after conflict: {}", e);
                }
                self.last_error = Some(err);
            }
            Err(err @ AssignError::NoFreeSlot { .. }) => {
                confirmation.free_slots.clear();
                confirmation.choice = SlotChoice::Automatic;
                self.last_error = Some(err);
            }
            Err(err) => {
                self.last_error = Some(err);
            }
        }

        if let Some(err) = &self.last_error {
            tracing::info!("Assignment for {} not completed: {}", confirmation.plate, err);
        }
        self.state = WorkflowState::Confirming(confirmation);
        true
    }

    async fn load_yards(&self, confirmation: &mut Confirmation) -> Result<()> {
        let yards = self
            .registry
            .list_yards()
            .await
            .map_err(|e| AssignError::from_registry(e, confirmation.plate.as_str()))?;

        let parked_yard = confirmation.already_parked.as_ref().map(|s| s.yard.id);
        let default_yard = parked_yard
            .into_iter()
            .chain(self.settings.default_yard)
            .find(|id| yards.iter().any(|y| y.id == *id))
            .or_else(|| yards.first().map(|y| y.id));

        confirmation.yards = yards;
        confirmation.yard_id = default_yard;
        Ok(())
    }

    async fn load_free_slots(&self, confirmation: &mut Confirmation) -> Result<()> {
        confirmation.free_slots.clear();
        let Some(yard) = confirmation.selected_yard().cloned() else {
            return Ok(());
        };
        confirmation.free_slots = self.slots.free_slots_in(&yard).await?;
        Ok(())
    }

    fn take_confirmation(&mut self, action: &str) -> Result<Box<Confirmation>> {
        match std::mem::replace(&mut self.state, WorkflowState::idle()) {
            WorkflowState::Confirming(confirmation) => Ok(confirmation),
            other => {
                self.state = other;
                Err(self.invalid(action))
            }
        }
    }

    fn invalid(&self, action: &str) -> AssignError {
        AssignError::InvalidTransition {
            action: action.to_string(),
            state: self.state.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryRegistry, Operation};
    use crate::utils::error::RegistryError;

    async fn seeded() -> InMemoryRegistry {
        let registry = InMemoryRegistry::new();
        for (id, plate, status) in [
            (1, "ABC1234", "OPERACIONAL"),
            (2, "DEF5678", "ATIVO"),
            (3, "GHI1J23", "BLOQUEADO"),
        ] {
            registry
                .add_vehicle(Vehicle {
                    id,
                    plate: plate.to_string(),
                    model: None,
                    manufacturer: None,
                    status: status.to_string(),
                })
                .await;
        }
        for (id, name) in [(1, "Guarulhos"), (2, "Limão")] {
            registry
                .add_yard(Yard {
                    id,
                    name: name.to_string(),
                    status: "A".to_string(),
                })
                .await;
        }
        for (id, name, yard_id) in [(11, "G001", 1), (12, "G002", 1), (21, "L001", 2)] {
            registry
                .add_slot(Slot {
                    id,
                    name: name.to_string(),
                    yard_id,
                    status: "L".to_string(),
                })
                .await;
        }
        registry
    }

    fn workflow(registry: &InMemoryRegistry) -> Workflow<InMemoryRegistry> {
        Workflow::new(Arc::new(registry.clone()), WorkflowSettings::default())
    }

    fn confirmation(state: &WorkflowState) -> &Confirmation {
        match state {
            WorkflowState::Confirming(c) => c,
            other => panic!("expected confirming, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scan_moves_to_confirming_with_default_yard() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);

        let state = wf.scan("abc-1234").await.unwrap();
        let c = confirmation(state);
        assert_eq!(c.plate.as_str(), "ABC1234");
        assert_eq!(c.yard_id, Some(1));
        assert_eq!(c.free_slots.len(), 2);
        assert!(c.already_parked.is_none());
        assert!(wf.last_error().is_none());
    }

    #[tokio::test]
    async fn test_invalid_plate_stays_scanning() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);

        wf.scan("12").await.unwrap();
        assert_eq!(wf.state().name(), "scanning");
        assert!(matches!(wf.last_error(), Some(AssignError::InvalidFormat { .. })));
        assert_eq!(registry.calls(Operation::FindVehicle).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_offers_registration() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);

        wf.scan("XYZ1A23").await.unwrap();
        assert!(matches!(wf.last_error(), Some(AssignError::VehicleNotFound { .. })));
        assert_eq!(
            wf.registration_link().as_deref(),
            Some("/veiculo/cadastrar?placa=XYZ1A23")
        );

        wf.cancel();
        assert!(wf.registration_link().is_none());
        assert!(wf.last_error().is_none());
    }

    #[tokio::test]
    async fn test_lookup_timeout_does_not_claim_unknown_assignment() {
        let registry = seeded().await;
        registry
            .fail_next(Operation::FindVehicle, RegistryError::Timeout)
            .await;
        let mut wf = workflow(&registry);

        wf.scan("ABC1234").await.unwrap();

        assert_eq!(wf.state().name(), "scanning");
        let err = wf.last_error().unwrap();
        assert!(matches!(
            err,
            AssignError::Transport {
                outcome_unknown: false,
                ..
            }
        ));
        assert_eq!(err.user_friendly_message(), "Could not reach the parking registry.");
        assert_eq!(registry.calls(Operation::CreateSession).await, 0);
    }

    #[tokio::test]
    async fn test_parked_vehicle_defaults_to_its_yard() {
        let registry = seeded().await;
        registry.insert_active_session("ABC1234", 21).await;
        let mut wf = workflow(&registry);

        let c = confirmation(wf.scan("ABC1234").await.unwrap());
        assert_eq!(c.yard_id, Some(2));
        assert_eq!(c.already_parked.as_ref().map(|s| s.slot.id), Some(21));
    }

    #[tokio::test]
    async fn test_advisory_check_failure_does_not_block() {
        let registry = seeded().await;
        registry
            .fail_next(Operation::FindActiveByPlate, RegistryError::Timeout)
            .await;
        let mut wf = workflow(&registry);

        let c = confirmation(wf.scan("ABC1234").await.unwrap());
        assert!(c.parked_check_failed);
        assert!(wf.last_error().is_none());
    }

    #[tokio::test]
    async fn test_select_yard_reloads_slots() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);
        wf.scan("ABC1234").await.unwrap();

        let c = confirmation(wf.select_yard(2).await.unwrap());
        assert_eq!(c.yard_id, Some(2));
        let names: Vec<_> = c.free_slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["L001"]);

        wf.select_yard(42).await.unwrap();
        assert!(matches!(wf.last_error(), Some(AssignError::UnknownYard { yard_id: 42 })));
        assert_eq!(confirmation(wf.state()).yard_id, Some(2));
    }

    #[tokio::test]
    async fn test_conflict_returns_to_confirming_with_fresh_slots() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);
        wf.scan("ABC1234").await.unwrap();
        wf.select_slot(SlotChoice::Slot(11)).unwrap();

        // Another terminal parks in G001 meanwhile.
        registry.insert_active_session("DEF5678", 11).await;

        let c = confirmation(wf.confirm().await.unwrap());
        assert_eq!(c.choice, SlotChoice::Automatic);
        let ids: Vec<_> = c.free_slots.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![12]);
        assert!(matches!(wf.last_error(), Some(AssignError::Conflict { .. })));

        // Retry with the refreshed list succeeds.
        let state = wf.confirm().await.unwrap();
        assert_eq!(state.name(), "done");
    }

    #[tokio::test]
    async fn test_refresh_recovers_from_failed_yard_load() {
        let registry = seeded().await;
        registry
            .fail_next(
                Operation::ListYards,
                RegistryError::Transport {
                    message: "connection reset".to_string(),
                },
            )
            .await;
        let mut wf = workflow(&registry);

        let c = confirmation(wf.scan("ABC1234").await.unwrap());
        assert!(c.yards.is_empty());
        assert!(c.free_slots.is_empty());
        assert!(matches!(wf.last_error(), Some(AssignError::Transport { .. })));

        let c = confirmation(wf.refresh_slots().await.unwrap());
        assert_eq!(c.yard_id, Some(1));
        assert_eq!(c.free_slots.len(), 2);
        assert!(wf.last_error().is_none());
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);
        wf.scan("ABC1234").await.unwrap();

        let ticket = wf.begin_assignment().unwrap();
        let outcome = wf.execute(&ticket).await;

        // Operator walks away and scans another plate before the reply lands.
        wf.cancel();
        wf.scan("DEF5678").await.unwrap();

        assert!(!wf.complete_assignment(&ticket, outcome).await);
        let c = confirmation(wf.state());
        assert_eq!(c.plate.as_str(), "DEF5678");
    }

    #[tokio::test]
    async fn test_actions_rejected_in_wrong_state() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);

        assert!(matches!(
            wf.confirm().await,
            Err(AssignError::InvalidTransition { .. })
        ));
        assert!(wf.select_slot(SlotChoice::Automatic).is_err());

        wf.scan("ABC1234").await.unwrap();
        assert!(wf.scan("DEF5678").await.is_err());
        assert_eq!(wf.state().name(), "confirming");
    }

    #[tokio::test]
    async fn test_blocked_vehicle_fails_attempt() {
        let registry = seeded().await;
        let mut wf = workflow(&registry);

        wf.scan("GHI1J23").await.unwrap();
        assert_eq!(wf.state().name(), "failed");
        assert!(wf.confirm().await.is_err());

        wf.cancel();
        assert_eq!(wf.state().name(), "scanning");
    }
}
