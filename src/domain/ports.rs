use crate::core::settings::WorkflowSettings;
use crate::domain::model::{NewSession, Plate, Session, Slot, Vehicle, Yard, YardId};
use crate::utils::error::RegistryResult;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait VehicleRegistry: Send + Sync {
    async fn find_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Vehicle>>;
}

#[async_trait]
pub trait YardRegistry: Send + Sync {
    async fn list_yards(&self) -> RegistryResult<Vec<Yard>>;
}

#[async_trait]
pub trait SlotRegistry: Send + Sync {
    async fn list_slots(&self, yard_id: YardId, yard_status: &str) -> RegistryResult<Vec<Slot>>;
}

/// Session ledger. `create_session` must fail with
/// [`crate::utils::error::RegistryError::Conflict`] when the slot or the
/// vehicle already has an active session.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn find_active_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Session>>;
    async fn list_active_by_yard(&self, yard_id: YardId) -> RegistryResult<Vec<Session>>;
    async fn create_session(&self, request: &NewSession) -> RegistryResult<Session>;
}

/// Everything the workflow talks to.
pub trait Registry: VehicleRegistry + YardRegistry + SlotRegistry + SessionRegistry {}

impl<T> Registry for T where T: VehicleRegistry + YardRegistry + SlotRegistry + SessionRegistry {}

pub trait ConfigProvider: Send + Sync {
    fn registry_url(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn workflow_settings(&self) -> WorkflowSettings;

    /// Extra headers sent with every registry request (auth tokens etc.).
    fn registry_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
