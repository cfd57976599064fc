pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::config::{cli::LocalStorage, scoring::ScoringConfig};
pub use crate::core::{elapsed::ElapsedTime, portal::CyclingPortal, report::OutputFormat};
pub use crate::domain::model::{
    CheckpointId, CheckpointType, RaceId, RiderId, StageId, StageState, StageType, TeamId,
};
pub use crate::utils::error::{PortalError, Result};
