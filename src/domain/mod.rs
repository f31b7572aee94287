// Domain layer: entity snapshots and the registry ports the workflow depends on.

pub mod model;
pub mod ports;
