use std::fmt;
use thiserror::Error;

/// Kind of record an identifier failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Race,
    Stage,
    Checkpoint,
    Team,
    Rider,
    Result,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Race => "race",
            EntityKind::Stage => "stage",
            EntityKind::Checkpoint => "checkpoint",
            EntityKind::Team => "team",
            EntityKind::Rider => "rider",
            EntityKind::Result => "result",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Unknown {kind} ID: {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("Invalid state for stage {stage_id}: {message}")]
    InvalidState { stage_id: u32, message: String },

    #[error("Rider {rider_id} already has a result registered for stage {stage_id}")]
    DuplicateResult { stage_id: u32, rider_id: u32 },

    #[error("Invalid number of checkpoint times: expected {expected}, got {actual}")]
    InvalidTimeCount { expected: usize, actual: usize },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Name '{name}' is already in use")]
    IllegalName { name: String },

    #[error("Invalid stage length {length} km: must be at least {minimum} km")]
    InvalidLength { length: f64, minimum: f64 },

    #[error("Invalid checkpoint location {location} km: stage is {stage_length} km long")]
    InvalidLocation { location: f64, stage_length: f64 },

    #[error("Stage {stage_id} does not accept this operation: {message}")]
    InvalidStageType { stage_id: u32, message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lookup,
    State,
    Validation,
    Io,
    Config,
}

impl PortalError {
    pub fn unknown(kind: EntityKind, id: impl fmt::Display) -> Self {
        PortalError::UnknownEntity {
            kind,
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::UnknownEntity { .. } => ErrorCategory::Lookup,
            PortalError::InvalidState { .. } | PortalError::DuplicateResult { .. } => {
                ErrorCategory::State
            }
            PortalError::InvalidTimeCount { .. }
            | PortalError::InvalidName { .. }
            | PortalError::IllegalName { .. }
            | PortalError::InvalidLength { .. }
            | PortalError::InvalidLocation { .. }
            | PortalError::InvalidStageType { .. }
            | PortalError::InvalidArgument { .. } => ErrorCategory::Validation,
            PortalError::IoError(_)
            | PortalError::SerializationError(_)
            | PortalError::CsvError(_) => ErrorCategory::Io,
            PortalError::ConfigError { .. } | PortalError::InvalidConfigValueError { .. } => {
                ErrorCategory::Config
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PortalError::UnknownEntity { .. } => {
                "Check the ID against the output of the summary command"
            }
            PortalError::InvalidState { .. } => {
                "Conclude stage preparation before registering results, and edit checkpoints only while preparing"
            }
            PortalError::DuplicateResult { .. } => {
                "Delete the existing result before registering a new one"
            }
            PortalError::InvalidTimeCount { .. } => {
                "Provide the start time, one time per checkpoint, and the finish time"
            }
            PortalError::InvalidName { .. } | PortalError::IllegalName { .. } => {
                "Use a unique name of at most 30 characters without whitespace"
            }
            PortalError::InvalidLength { .. } | PortalError::InvalidLocation { .. } => {
                "Check the distances against the stage length"
            }
            PortalError::InvalidStageType { .. } => "Time-trial stages cannot hold checkpoints",
            PortalError::InvalidArgument { .. } => "Check the command arguments",
            PortalError::IoError(_) => "Check that the file exists and is readable/writable",
            PortalError::SerializationError(_) => {
                "The portal file is corrupt or was written by an incompatible version"
            }
            PortalError::CsvError(_) => "Retry with a different output format",
            PortalError::ConfigError { .. } | PortalError::InvalidConfigValueError { .. } => {
                "Fix the scoring configuration file and try again"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Lookup => format!("Not found: {}", self),
            ErrorCategory::State => format!("Operation not allowed right now: {}", self),
            ErrorCategory::Validation => format!("Invalid input: {}", self),
            ErrorCategory::Io => format!("Could not read or write data: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
