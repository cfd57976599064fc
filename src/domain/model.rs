use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(RaceId);
entity_id!(StageId);
entity_id!(CheckpointId);
entity_id!(TeamId);
entity_id!(RiderId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    Flat,
    MediumMountain,
    HighMountain,
    TimeTrial,
}

impl StageType {
    pub fn is_time_trial(self) -> bool {
        matches!(self, StageType::TimeTrial)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageType::Flat => "FLAT",
            StageType::MediumMountain => "MEDIUM_MOUNTAIN",
            StageType::HighMountain => "HIGH_MOUNTAIN",
            StageType::TimeTrial => "TIME_TRIAL",
        };
        f.write_str(name)
    }
}

/// Category of a checkpoint. Climbs are ordered from easiest (`C4`) to
/// hardest (`HC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointType {
    Sprint,
    C4,
    C3,
    C2,
    C1,
    Hc,
}

impl CheckpointType {
    pub fn is_climb(self) -> bool {
        !matches!(self, CheckpointType::Sprint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Preparing,
    AwaitingResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    pub description: String,
    pub stage_ids: Vec<StageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub race_id: RaceId,
    pub name: String,
    pub description: String,
    pub length: f64,
    pub start_time: NaiveDateTime,
    pub stage_type: StageType,
    pub checkpoint_ids: Vec<CheckpointId>,
    pub state: StageState,
}

impl Stage {
    pub fn is_awaiting_results(&self) -> bool {
        self.state == StageState::AwaitingResults
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoint_ids.len()
    }

    /// Number of time values a result for this stage must carry: start,
    /// one per checkpoint, finish.
    pub fn expected_time_count(&self) -> usize {
        self.checkpoint_count() + 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub stage_id: StageId,
    pub location: f64,
    pub checkpoint_type: CheckpointType,
    pub average_gradient: f64,
    pub climb_length: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub description: String,
    pub rider_ids: Vec<RiderId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: RiderId,
    pub team_id: TeamId,
    pub name: String,
    pub year_of_birth: i32,
}

/// A rider's timings for one stage: start, each checkpoint in location
/// order, finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_id: StageId,
    pub rider_id: RiderId,
    times: Vec<NaiveTime>,
}

impl StageResult {
    /// `times` must hold at least a start and a finish; the repository
    /// enforces the exact length before constructing one.
    pub(crate) fn new(stage_id: StageId, rider_id: RiderId, times: Vec<NaiveTime>) -> Self {
        debug_assert!(times.len() >= 2);
        Self {
            stage_id,
            rider_id,
            times,
        }
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn start(&self) -> NaiveTime {
        self.times[0]
    }

    pub fn finish(&self) -> NaiveTime {
        self.times[self.times.len() - 1]
    }

    /// Time recorded at the checkpoint with the given position in the
    /// stage's location-sorted checkpoint list.
    pub fn checkpoint_time(&self, position: usize) -> Option<NaiveTime> {
        let intermediate = &self.times[1..self.times.len() - 1];
        intermediate.get(position).copied()
    }
}
