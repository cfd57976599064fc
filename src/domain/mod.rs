// Domain layer: entity records and the ports the core consumes.

pub mod model;
pub mod ports;
