use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type VehicleId = i64;
pub type YardId = i64;
pub type SlotId = i64;
pub type SessionId = i64;

/// Which of the two accepted plate shapes a plate matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateFormat {
    /// `LLLDDDD`, e.g. ABC1234
    Legacy,
    /// `LLLDLDD`, e.g. ABC1D23
    Mercosul,
}

/// A normalized, shape-checked license plate.
///
/// Only constructed through [`crate::core::plate::validate`], so holding a
/// `Plate` means the value is 7 uppercase ASCII alphanumerics in one of the
/// two [`PlateFormat`] shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Plate {
    value: String,
    format: PlateFormat,
}

impl Plate {
    pub(crate) fn new_unchecked(value: String, format: PlateFormat) -> Self {
        Self { value, format }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn format(&self) -> PlateFormat {
        self.format
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Plate {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Yard {
    pub id: YardId,
    pub name: String,
    pub status: String,
}

/// A physical parking space. `status` is the registry's stored flag and may
/// lag behind the session ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    pub yard_id: YardId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRef {
    pub id: SlotId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YardRef {
    pub id: YardId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub vehicle_id: VehicleId,
    pub plate: String,
    pub slot: SlotRef,
    pub yard: YardRef,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Create-session request. `None` for the slot lets the registry pick one;
/// `None` for the yard searches every yard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub plate: String,
    pub slot_id: Option<SlotId>,
    pub yard_id: Option<YardId>,
}

/// Operator's slot choice on the confirmation screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotChoice {
    #[default]
    Automatic,
    Slot(SlotId),
}

impl SlotChoice {
    pub fn slot_id(&self) -> Option<SlotId> {
        match self {
            SlotChoice::Automatic => None,
            SlotChoice::Slot(id) => Some(*id),
        }
    }
}

impl From<Option<SlotId>> for SlotChoice {
    fn from(slot: Option<SlotId>) -> Self {
        slot.map(SlotChoice::Slot).unwrap_or_default()
    }
}
