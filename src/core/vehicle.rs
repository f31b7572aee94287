use crate::core::settings::WorkflowSettings;
use crate::domain::model::{Plate, Vehicle};
use crate::domain::ports::VehicleRegistry;
use crate::utils::error::{AssignError, Result};
use std::sync::Arc;

/// Outcome of looking a plate up in the vehicle registry.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleLookup {
    Eligible(Vehicle),
    Blocked { vehicle: Vehicle, status: String },
    /// Unknown plate: the operator decides between registering it and
    /// cancelling. Never registered automatically.
    NotFound,
}

pub struct VehicleResolver<V: VehicleRegistry + ?Sized> {
    registry: Arc<V>,
    settings: WorkflowSettings,
}

impl<V: VehicleRegistry + ?Sized> VehicleResolver<V> {
    pub fn new(registry: Arc<V>, settings: WorkflowSettings) -> Self {
        Self { registry, settings }
    }

    pub async fn find_by_plate(&self, plate: &Plate) -> Result<VehicleLookup> {
        tracing::debug!("Looking up vehicle {}", plate);
        let vehicle = self
            .registry
            .find_by_plate(plate)
            .await
            .map_err(|e| AssignError::from_registry(e, plate.as_str()))?;

        let Some(vehicle) = vehicle else {
            tracing::info!("Vehicle {} is not registered", plate);
            return Ok(VehicleLookup::NotFound);
        };

        // Blocklist, not allowlist: statuses we have never seen stay eligible.
        if self.settings.is_blocked_status(&vehicle.status) {
            tracing::info!(
                "Vehicle {} has blocking status \"{}\"",
                plate,
                vehicle.status
            );
            let status = vehicle.status.clone();
            return Ok(VehicleLookup::Blocked { vehicle, status });
        }

        tracing::debug!("Vehicle {} with status \"{}\" can park", plate, vehicle.status);
        Ok(VehicleLookup::Eligible(vehicle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryRegistry, Operation};
    use crate::utils::error::RegistryError;

    fn vehicle(plate: &str, status: &str) -> Vehicle {
        Vehicle {
            id: 1,
            plate: plate.to_string(),
            model: Some("Pop 110i".to_string()),
            manufacturer: Some("Honda".to_string()),
            status: status.to_string(),
        }
    }

    async fn resolver_with(vehicles: Vec<Vehicle>) -> (VehicleResolver<InMemoryRegistry>, InMemoryRegistry) {
        let registry = InMemoryRegistry::new();
        for v in vehicles {
            registry.add_vehicle(v).await;
        }
        let resolver = VehicleResolver::new(Arc::new(registry.clone()), WorkflowSettings::default());
        (resolver, registry)
    }

    #[tokio::test]
    async fn test_operational_vehicle_is_eligible() {
        let (resolver, _) = resolver_with(vec![vehicle("ABC1234", "OPERACIONAL")]).await;
        let plate = Plate::parse("ABC1234").unwrap();

        let lookup = resolver.find_by_plate(&plate).await.unwrap();
        assert!(matches!(lookup, VehicleLookup::Eligible(v) if v.plate == "ABC1234"));
    }

    #[tokio::test]
    async fn test_blocked_status_is_reported() {
        let (resolver, _) = resolver_with(vec![vehicle("ABC1234", "blocked")]).await;
        let plate = Plate::parse("ABC1234").unwrap();

        match resolver.find_by_plate(&plate).await.unwrap() {
            VehicleLookup::Blocked { status, .. } => assert_eq!(status, "blocked"),
            other => panic!("unexpected lookup: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_status_fails_open() {
        let (resolver, _) = resolver_with(vec![vehicle("ABC1D23", "EM_MANUTENCAO")]).await;
        let plate = Plate::parse("ABC1D23").unwrap();

        let lookup = resolver.find_by_plate(&plate).await.unwrap();
        assert!(matches!(lookup, VehicleLookup::Eligible(_)));
    }

    #[tokio::test]
    async fn test_missing_vehicle_is_not_found() {
        let (resolver, _) = resolver_with(vec![]).await;
        let plate = Plate::parse("ZZZ9999").unwrap();

        let lookup = resolver.find_by_plate(&plate).await.unwrap();
        assert_eq!(lookup, VehicleLookup::NotFound);
    }

    #[tokio::test]
    async fn test_transport_failure_is_converted() {
        let (resolver, registry) = resolver_with(vec![]).await;
        registry
            .fail_next(
                Operation::FindVehicle,
                RegistryError::Transport {
                    message: "connection refused".to_string(),
                },
            )
            .await;
        let plate = Plate::parse("ABC1234").unwrap();

        let err = resolver.find_by_plate(&plate).await.unwrap_err();
        assert!(matches!(err, AssignError::Transport { .. }));
    }
}
