use crate::domain::model::{CheckpointType, StageType};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{
    validate_in_range, validate_non_increasing, Validate, MAX_BUNCH_GAP_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Points tables and timing rules used by the ranking engine. Every section
/// is optional in TOML and falls back to the standard grand-tour scales.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub stage_points: StagePointsConfig,
    pub sprint_points: SprintPointsConfig,
    pub mountain_points: MountainPointsConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePointsConfig {
    pub flat: Vec<u32>,
    pub medium_mountain: Vec<u32>,
    pub high_mountain: Vec<u32>,
    pub time_trial: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprintPointsConfig {
    pub intermediate: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountainPointsConfig {
    pub c4: Vec<u32>,
    pub c3: Vec<u32>,
    pub c2: Vec<u32>,
    pub c1: Vec<u32>,
    pub hc: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub grouping: GroupingBasis,
    pub bunch_gap_ms: u64,
}

/// What the same-time rule compares between consecutive finishers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingBasis {
    #[default]
    FinishClock,
    Elapsed,
}

const LOW_SCALE: [u32; 15] = [20, 17, 15, 13, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1];

impl Default for StagePointsConfig {
    fn default() -> Self {
        Self {
            flat: vec![50, 30, 20, 18, 16, 14, 12, 10, 8, 7, 6, 5, 4, 3, 2],
            medium_mountain: vec![30, 25, 22, 19, 17, 15, 13, 11, 9, 7, 6, 5, 4, 3, 2],
            high_mountain: LOW_SCALE.to_vec(),
            time_trial: LOW_SCALE.to_vec(),
        }
    }
}

impl Default for SprintPointsConfig {
    fn default() -> Self {
        Self {
            intermediate: LOW_SCALE.to_vec(),
        }
    }
}

impl Default for MountainPointsConfig {
    fn default() -> Self {
        Self {
            c4: vec![1],
            c3: vec![2, 1],
            c2: vec![5, 3, 2, 1],
            c1: vec![10, 8, 6, 4, 2, 1],
            hc: vec![20, 15, 12, 10, 8, 6, 4, 2],
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            grouping: GroupingBasis::FinishClock,
            bunch_gap_ms: 1000,
        }
    }
}

impl ScoringConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PortalError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PortalError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Finish points for a stage type, indexed by finishing rank.
    pub fn finish_table(&self, stage_type: StageType) -> &[u32] {
        match stage_type {
            StageType::Flat => &self.stage_points.flat,
            StageType::MediumMountain => &self.stage_points.medium_mountain,
            StageType::HighMountain => &self.stage_points.high_mountain,
            StageType::TimeTrial => &self.stage_points.time_trial,
        }
    }

    /// Points for crossing a checkpoint, indexed by crossing order.
    pub fn checkpoint_table(&self, checkpoint_type: CheckpointType) -> &[u32] {
        match checkpoint_type {
            CheckpointType::Sprint => &self.sprint_points.intermediate,
            CheckpointType::C4 => &self.mountain_points.c4,
            CheckpointType::C3 => &self.mountain_points.c3,
            CheckpointType::C2 => &self.mountain_points.c2,
            CheckpointType::C1 => &self.mountain_points.c1,
            CheckpointType::Hc => &self.mountain_points.hc,
        }
    }

    pub fn bunch_gap(&self) -> chrono::TimeDelta {
        let millis = self.timing.bunch_gap_ms.min(MAX_BUNCH_GAP_MS);
        chrono::TimeDelta::milliseconds(i64::try_from(millis).unwrap_or(0))
    }

    fn tables(&self) -> [(&'static str, &[u32]); 10] {
        [
            ("stage_points.flat", self.stage_points.flat.as_slice()),
            ("stage_points.medium_mountain", self.stage_points.medium_mountain.as_slice()),
            ("stage_points.high_mountain", self.stage_points.high_mountain.as_slice()),
            ("stage_points.time_trial", self.stage_points.time_trial.as_slice()),
            ("sprint_points.intermediate", self.sprint_points.intermediate.as_slice()),
            ("mountain_points.c4", self.mountain_points.c4.as_slice()),
            ("mountain_points.c3", self.mountain_points.c3.as_slice()),
            ("mountain_points.c2", self.mountain_points.c2.as_slice()),
            ("mountain_points.c1", self.mountain_points.c1.as_slice()),
            ("mountain_points.hc", self.mountain_points.hc.as_slice()),
        ]
    }
}

impl Validate for ScoringConfig {
    fn validate(&self) -> Result<()> {
        for (field, table) in self.tables() {
            validate_non_increasing(field, table)?;
        }
        validate_in_range("timing.bunch_gap_ms", self.timing.bunch_gap_ms, 1, MAX_BUNCH_GAP_MS)?;
        Ok(())
    }
}
