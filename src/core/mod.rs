pub mod assign;
pub mod plate;
pub mod sessions;
pub mod settings;
pub mod slots;
pub mod vehicle;
pub mod workflow;

pub use crate::domain::model::{Plate, PlateFormat, Session, Slot, SlotChoice, Vehicle, Yard};
pub use crate::domain::ports::{ConfigProvider, Registry};
pub use crate::utils::error::Result;
