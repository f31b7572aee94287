use crate::domain::model::{
    NewSession, Plate, Session, SessionId, Slot, SlotRef, Vehicle, Yard, YardId, YardRef,
};
use crate::domain::ports::{SessionRegistry, SlotRegistry, VehicleRegistry, YardRegistry};
use crate::utils::error::{ConflictKind, RegistryError, RegistryResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry operations that can have a failure injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindVehicle,
    ListYards,
    ListSlots,
    FindActiveByPlate,
    ListActiveByYard,
    CreateSession,
}

#[derive(Default)]
struct State {
    vehicles: Vec<Vehicle>,
    yards: Vec<Yard>,
    slots: Vec<Slot>,
    sessions: Vec<Session>,
    next_session_id: SessionId,
    failures: HashMap<Operation, VecDeque<RegistryError>>,
    commit_then_timeout: bool,
    calls: HashMap<Operation, usize>,
}

/// Registry held in memory, enforcing the one-active-session-per-vehicle and
/// per-slot rules the real backend enforces. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    state: Arc<Mutex<State>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        self.state.lock().await.vehicles.push(vehicle);
    }

    pub async fn add_yard(&self, yard: Yard) {
        self.state.lock().await.yards.push(yard);
    }

    pub async fn add_slot(&self, slot: Slot) {
        self.state.lock().await.slots.push(slot);
    }

    /// Inserts an active session directly, bypassing conflict checks. Used to
    /// stage drifted data or another terminal's booking.
    pub async fn insert_active_session(&self, plate: &str, slot_id: i64) -> Session {
        let mut state = self.state.lock().await;
        let session = state.build_session(plate, slot_id);
        state.sessions.push(session.clone());
        session
    }

    /// Queues an error returned by the next call to `op`.
    pub async fn fail_next(&self, op: Operation, err: RegistryError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Makes the next create commit the session and then report a timeout.
    pub async fn commit_then_timeout(&self) {
        self.state.lock().await.commit_then_timeout = true;
    }

    pub async fn calls(&self, op: Operation) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn active_sessions(&self) -> Vec<Session> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    async fn enter(&self, op: Operation) -> RegistryResult<tokio::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().await;
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(err) = state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        Ok(state)
    }
}

impl State {
    fn build_session(&mut self, plate: &str, slot_id: i64) -> Session {
        self.next_session_id += 1;
        let slot = self.slots.iter().find(|s| s.id == slot_id);
        let slot_name = slot.map(|s| s.name.clone()).unwrap_or_default();
        let yard_id = slot.map(|s| s.yard_id).unwrap_or_default();
        let yard_name = self
            .yards
            .iter()
            .find(|y| y.id == yard_id)
            .map(|y| y.name.clone())
            .unwrap_or_default();
        let vehicle_id = self
            .vehicles
            .iter()
            .find(|v| v.plate == plate)
            .map(|v| v.id)
            .unwrap_or_default();

        Session {
            id: self.next_session_id,
            vehicle_id,
            plate: plate.to_string(),
            slot: SlotRef {
                id: slot_id,
                name: slot_name,
            },
            yard: YardRef {
                id: yard_id,
                name: yard_name,
            },
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn slot_is_taken(&self, slot_id: i64) -> bool {
        self.sessions
            .iter()
            .any(|s| s.is_active() && s.slot.id == slot_id)
    }
}

#[async_trait]
impl VehicleRegistry for InMemoryRegistry {
    async fn find_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Vehicle>> {
        let state = self.enter(Operation::FindVehicle).await?;
        Ok(state
            .vehicles
            .iter()
            .find(|v| v.plate.eq_ignore_ascii_case(plate.as_str()))
            .cloned())
    }
}

#[async_trait]
impl YardRegistry for InMemoryRegistry {
    async fn list_yards(&self) -> RegistryResult<Vec<Yard>> {
        let state = self.enter(Operation::ListYards).await?;
        Ok(state.yards.clone())
    }
}

#[async_trait]
impl SlotRegistry for InMemoryRegistry {
    async fn list_slots(&self, yard_id: YardId, _yard_status: &str) -> RegistryResult<Vec<Slot>> {
        let state = self.enter(Operation::ListSlots).await?;
        Ok(state
            .slots
            .iter()
            .filter(|s| s.yard_id == yard_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionRegistry for InMemoryRegistry {
    async fn find_active_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Session>> {
        let state = self.enter(Operation::FindActiveByPlate).await?;
        Ok(state
            .sessions
            .iter()
            .find(|s| s.is_active() && s.plate == plate.as_str())
            .cloned())
    }

    async fn list_active_by_yard(&self, yard_id: YardId) -> RegistryResult<Vec<Session>> {
        let state = self.enter(Operation::ListActiveByYard).await?;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.is_active() && s.yard.id == yard_id)
            .cloned()
            .collect())
    }

    async fn create_session(&self, request: &NewSession) -> RegistryResult<Session> {
        let mut state = self.enter(Operation::CreateSession).await?;

        if !state.vehicles.iter().any(|v| v.plate == request.plate) {
            return Err(RegistryError::NotFound {
                message: format!("vehicle {} not found", request.plate),
            });
        }

        if state
            .sessions
            .iter()
            .any(|s| s.is_active() && s.plate == request.plate)
        {
            return Err(RegistryError::Conflict {
                kind: ConflictKind::VehicleParked,
                message: format!("vehicle {} is already parked", request.plate),
            });
        }

        let slot_id = match request.slot_id {
            Some(id) => {
                if !state.slots.iter().any(|s| s.id == id) {
                    return Err(RegistryError::NotFound {
                        message: format!("slot {} not found", id),
                    });
                }
                if state.slot_is_taken(id) {
                    return Err(RegistryError::Conflict {
                        kind: ConflictKind::SlotTaken,
                        message: format!("slot {} is occupied", id),
                    });
                }
                id
            }
            None => {
                let candidate = state
                    .slots
                    .iter()
                    .filter(|s| request.yard_id.map_or(true, |y| s.yard_id == y))
                    .map(|s| s.id)
                    .find(|id| !state.slot_is_taken(*id));
                match candidate {
                    Some(id) => id,
                    None => {
                        return Err(RegistryError::NotFound {
                            message: "no free slot".to_string(),
                        })
                    }
                }
            }
        };

        let session = state.build_session(&request.plate, slot_id);
        state.sessions.push(session.clone());

        if std::mem::take(&mut state.commit_then_timeout) {
            return Err(RegistryError::Timeout);
        }
        Ok(session)
    }
}
