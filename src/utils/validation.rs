use crate::utils::error::{PortalError, Result};
use chrono::NaiveTime;

pub const MAX_NAME_LENGTH: usize = 30;
pub const MIN_STAGE_LENGTH_KM: f64 = 5.0;
pub const MIN_YEAR_OF_BIRTH: i32 = 1900;
pub const MAX_POINTS: u32 = 1_000;
pub const MAX_BUNCH_GAP_MS: u64 = 300_000;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Race, stage and team names: non-empty, at most 30 characters, no
/// whitespace.
pub fn validate_entity_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name cannot be empty".to_string())
    } else if name.chars().count() > MAX_NAME_LENGTH {
        Some(format!("name exceeds {} characters", MAX_NAME_LENGTH))
    } else if name.chars().any(char::is_whitespace) {
        Some("name cannot contain whitespace".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PortalError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn validate_stage_length(length: f64) -> Result<()> {
    if !length.is_finite() || length < MIN_STAGE_LENGTH_KM {
        return Err(PortalError::InvalidLength {
            length,
            minimum: MIN_STAGE_LENGTH_KM,
        });
    }
    Ok(())
}

pub fn validate_checkpoint_location(location: f64, stage_length: f64) -> Result<()> {
    if !location.is_finite() || location < 0.0 || location > stage_length {
        return Err(PortalError::InvalidLocation {
            location,
            stage_length,
        });
    }
    Ok(())
}

pub fn validate_in_range(field_name: &str, value: u64, min_value: u64, max_value: u64) -> Result<()> {
    if value < min_value || value > max_value {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min_value, max_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::InvalidArgument {
            message: format!("{} cannot be empty or whitespace-only", field_name),
        });
    }
    Ok(())
}

/// Points tables must never award more to a later position than to an
/// earlier one.
pub fn validate_non_increasing(field_name: &str, values: &[u32]) -> Result<()> {
    if let Some(value) = values.iter().find(|value| **value > MAX_POINTS) {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("points cannot exceed {}", MAX_POINTS),
        });
    }
    if let Some(window) = values.windows(2).find(|w| w[1] > w[0]) {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{:?}", values),
            reason: format!("points increase from {} to {}", window[0], window[1]),
        });
    }
    Ok(())
}

/// Parses a time of day written as `hh:mm:ss` with optional fractional
/// seconds.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f").map_err(|e| {
        PortalError::InvalidArgument {
            message: format!("'{}' is not a valid hh:mm:ss time: {}", value, e),
        }
    })
}
