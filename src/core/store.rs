use crate::domain::model::{
    Checkpoint, CheckpointId, CheckpointType, Race, RaceId, Rider, RiderId, Stage, StageId,
    StageState, StageType, Team, TeamId,
};
use crate::domain::ports::EntityLookup;
use crate::utils::error::{EntityKind, PortalError, Result};
use crate::utils::validation::{
    validate_checkpoint_location, validate_entity_name, validate_non_empty_string,
    validate_stage_length, MIN_YEAR_OF_BIRTH,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdCounters {
    race: u32,
    stage: u32,
    checkpoint: u32,
    team: u32,
    rider: u32,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            race: 1,
            stage: 1,
            checkpoint: 1,
            team: 1,
            rider: 1,
        }
    }
}

fn mint(counter: &mut u32) -> u32 {
    let id = *counter;
    *counter += 1;
    id
}

/// Typed tables for every portal entity plus the counters that mint their
/// IDs. Parent records hold child IDs; children hold a forward key to their
/// parent, so the graph serialises without cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    races: BTreeMap<RaceId, Race>,
    stages: BTreeMap<StageId, Stage>,
    checkpoints: BTreeMap<CheckpointId, Checkpoint>,
    teams: BTreeMap<TeamId, Team>,
    riders: BTreeMap<RiderId, Rider>,
    counters: IdCounters,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn race(&self, id: RaceId) -> Result<&Race> {
        self.races
            .get(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Race, id))
    }

    fn race_mut(&mut self, id: RaceId) -> Result<&mut Race> {
        self.races
            .get_mut(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Race, id))
    }

    pub fn stage(&self, id: StageId) -> Result<&Stage> {
        self.stages
            .get(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, id))
    }

    fn stage_mut(&mut self, id: StageId) -> Result<&mut Stage> {
        self.stages
            .get_mut(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, id))
    }

    fn team(&self, id: TeamId) -> Result<&Team> {
        self.teams
            .get(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Team, id))
    }

    pub fn rider(&self, id: RiderId) -> Result<&Rider> {
        self.riders
            .get(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Rider, id))
    }

    // Races

    pub fn race_ids(&self) -> Vec<RaceId> {
        self.races.keys().copied().collect()
    }

    pub fn create_race(&mut self, name: &str, description: &str) -> Result<RaceId> {
        validate_entity_name(name)?;
        if self.races.values().any(|race| race.name == name) {
            return Err(PortalError::IllegalName {
                name: name.to_string(),
            });
        }

        let id = RaceId(mint(&mut self.counters.race));
        self.races.insert(
            id,
            Race {
                id,
                name: name.to_string(),
                description: description.to_string(),
                stage_ids: Vec::new(),
            },
        );
        tracing::debug!("Created race {} '{}'", id, name);
        Ok(id)
    }

    pub fn view_race_details(&self, id: RaceId) -> Result<String> {
        let race = self.race(id)?;
        let total_length: f64 = race
            .stage_ids
            .iter()
            .filter_map(|stage_id| self.stages.get(stage_id))
            .map(|stage| stage.length)
            .sum();

        Ok(format!(
            "Race ID: {}\nName: {}\nDescription: {}\nNumber of Stages: {}\nTotal Length: {:.2} km",
            race.id,
            race.name,
            race.description,
            race.stage_ids.len(),
            total_length
        ))
    }

    /// Removes the race with all of its stages and their checkpoints.
    /// Returns the removed stage IDs so results can be purged by the caller.
    pub fn remove_race(&mut self, id: RaceId) -> Result<Vec<StageId>> {
        let race = self
            .races
            .remove(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Race, id))?;

        for stage_id in &race.stage_ids {
            self.drop_stage(*stage_id);
        }
        tracing::debug!("Removed race {} and {} stages", id, race.stage_ids.len());
        Ok(race.stage_ids)
    }

    pub fn number_of_stages(&self, race_id: RaceId) -> Result<usize> {
        Ok(self.race(race_id)?.stage_ids.len())
    }

    pub fn add_stage_to_race(
        &mut self,
        race_id: RaceId,
        name: &str,
        description: &str,
        length: f64,
        start_time: NaiveDateTime,
        stage_type: StageType,
    ) -> Result<StageId> {
        let race = self.race(race_id)?;
        validate_entity_name(name)?;
        let name_taken = race
            .stage_ids
            .iter()
            .filter_map(|stage_id| self.stages.get(stage_id))
            .any(|stage| stage.name == name);
        if name_taken {
            return Err(PortalError::IllegalName {
                name: name.to_string(),
            });
        }
        validate_stage_length(length)?;

        let id = StageId(mint(&mut self.counters.stage));
        self.stages.insert(
            id,
            Stage {
                id,
                race_id,
                name: name.to_string(),
                description: description.to_string(),
                length,
                start_time,
                stage_type,
                checkpoint_ids: Vec::new(),
                state: StageState::Preparing,
            },
        );
        self.race_mut(race_id)?.stage_ids.push(id);
        tracing::debug!("Added {} stage {} to race {}", stage_type, id, race_id);
        Ok(id)
    }

    /// Stage IDs of a race ordered by stage start time.
    pub fn race_stages(&self, race_id: RaceId) -> Result<Vec<StageId>> {
        let race = self.race(race_id)?;
        let mut stages: Vec<&Stage> = race
            .stage_ids
            .iter()
            .filter_map(|stage_id| self.stages.get(stage_id))
            .collect();
        stages.sort_by_key(|stage| (stage.start_time, stage.id));
        Ok(stages.into_iter().map(|stage| stage.id).collect())
    }

    pub fn stage_length(&self, id: StageId) -> Result<f64> {
        Ok(self.stage(id)?.length)
    }

    pub fn remove_stage(&mut self, id: StageId) -> Result<()> {
        let race_id = self.stage(id)?.race_id;
        if let Some(race) = self.races.get_mut(&race_id) {
            race.stage_ids.retain(|stage_id| *stage_id != id);
        }
        self.drop_stage(id);
        tracing::debug!("Removed stage {}", id);
        Ok(())
    }

    fn drop_stage(&mut self, id: StageId) {
        if let Some(stage) = self.stages.remove(&id) {
            for checkpoint_id in stage.checkpoint_ids {
                self.checkpoints.remove(&checkpoint_id);
            }
        }
    }

    // Checkpoints

    fn editable_stage(&mut self, stage_id: StageId, location: f64) -> Result<&mut Stage> {
        let stage = self.stage_mut(stage_id)?;
        if stage.stage_type.is_time_trial() {
            return Err(PortalError::InvalidStageType {
                stage_id: stage_id.0,
                message: "time-trial stages cannot contain checkpoints".to_string(),
            });
        }
        if stage.is_awaiting_results() {
            return Err(PortalError::InvalidState {
                stage_id: stage_id.0,
                message: "checkpoints cannot change once preparation is concluded".to_string(),
            });
        }
        validate_checkpoint_location(location, stage.length)?;
        Ok(stage)
    }

    fn push_checkpoint(
        &mut self,
        stage_id: StageId,
        location: f64,
        checkpoint_type: CheckpointType,
        average_gradient: f64,
        climb_length: Option<f64>,
    ) -> Result<CheckpointId> {
        self.editable_stage(stage_id, location)?;

        let id = CheckpointId(mint(&mut self.counters.checkpoint));
        self.stage_mut(stage_id)?.checkpoint_ids.push(id);
        self.checkpoints.insert(
            id,
            Checkpoint {
                id,
                stage_id,
                location,
                checkpoint_type,
                average_gradient,
                climb_length,
            },
        );
        tracing::debug!(
            "Added {:?} checkpoint {} at {} km to stage {}",
            checkpoint_type,
            id,
            location,
            stage_id
        );
        Ok(id)
    }

    pub fn add_categorized_climb(
        &mut self,
        stage_id: StageId,
        location: f64,
        category: CheckpointType,
        average_gradient: f64,
        length: f64,
    ) -> Result<CheckpointId> {
        if !category.is_climb() {
            return Err(PortalError::InvalidArgument {
                message: "a categorized climb needs a climb category".to_string(),
            });
        }
        self.push_checkpoint(stage_id, location, category, average_gradient, Some(length))
    }

    pub fn add_intermediate_sprint(
        &mut self,
        stage_id: StageId,
        location: f64,
    ) -> Result<CheckpointId> {
        self.push_checkpoint(stage_id, location, CheckpointType::Sprint, 0.0, None)
    }

    pub fn remove_checkpoint(&mut self, id: CheckpointId) -> Result<()> {
        let stage_id = self
            .checkpoints
            .get(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Checkpoint, id))?
            .stage_id;

        let stage = self.stage_mut(stage_id)?;
        if stage.is_awaiting_results() {
            return Err(PortalError::InvalidState {
                stage_id: stage_id.0,
                message: "checkpoints cannot change once preparation is concluded".to_string(),
            });
        }
        stage.checkpoint_ids.retain(|checkpoint_id| *checkpoint_id != id);
        self.checkpoints.remove(&id);
        tracing::debug!("Removed checkpoint {} from stage {}", id, stage_id);
        Ok(())
    }

    pub fn conclude_stage_preparation(&mut self, id: StageId) -> Result<()> {
        let stage = self.stage_mut(id)?;
        if stage.is_awaiting_results() {
            return Err(PortalError::InvalidState {
                stage_id: id.0,
                message: "stage is already waiting for results".to_string(),
            });
        }
        stage.state = StageState::AwaitingResults;
        tracing::debug!("Stage {} is now waiting for results", id);
        Ok(())
    }

    pub fn stage_checkpoints(&self, id: StageId) -> Result<Vec<CheckpointId>> {
        let checkpoints = self
            .checkpoints_of(id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, id))?;
        Ok(checkpoints.into_iter().map(|checkpoint| checkpoint.id).collect())
    }

    // Teams and riders

    pub fn create_team(&mut self, name: &str, description: &str) -> Result<TeamId> {
        validate_entity_name(name)?;
        if self.teams.values().any(|team| team.name == name) {
            return Err(PortalError::IllegalName {
                name: name.to_string(),
            });
        }

        let id = TeamId(mint(&mut self.counters.team));
        self.teams.insert(
            id,
            Team {
                id,
                name: name.to_string(),
                description: description.to_string(),
                rider_ids: Vec::new(),
            },
        );
        tracing::debug!("Created team {} '{}'", id, name);
        Ok(id)
    }

    /// Removes the team and its riders. Returns the removed rider IDs so
    /// their results can be purged by the caller.
    pub fn remove_team(&mut self, id: TeamId) -> Result<Vec<RiderId>> {
        let team = self
            .teams
            .remove(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Team, id))?;
        for rider_id in &team.rider_ids {
            self.riders.remove(rider_id);
        }
        tracing::debug!("Removed team {} and {} riders", id, team.rider_ids.len());
        Ok(team.rider_ids)
    }

    pub fn team_ids(&self) -> Vec<TeamId> {
        self.teams.keys().copied().collect()
    }

    pub fn team_riders(&self, id: TeamId) -> Result<Vec<RiderId>> {
        Ok(self.team(id)?.rider_ids.clone())
    }

    pub fn create_rider(&mut self, team_id: TeamId, name: &str, year_of_birth: i32) -> Result<RiderId> {
        validate_non_empty_string("rider name", name)?;
        if year_of_birth < MIN_YEAR_OF_BIRTH {
            return Err(PortalError::InvalidArgument {
                message: format!("year of birth must be {} or later", MIN_YEAR_OF_BIRTH),
            });
        }
        self.team(team_id)?;

        let id = RiderId(mint(&mut self.counters.rider));
        self.riders.insert(
            id,
            Rider {
                id,
                team_id,
                name: name.to_string(),
                year_of_birth,
            },
        );
        if let Some(team) = self.teams.get_mut(&team_id) {
            team.rider_ids.push(id);
        }
        tracing::debug!("Created rider {} in team {}", id, team_id);
        Ok(id)
    }

    pub fn remove_rider(&mut self, id: RiderId) -> Result<()> {
        let rider = self
            .riders
            .remove(&id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Rider, id))?;
        if let Some(team) = self.teams.get_mut(&rider.team_id) {
            team.rider_ids.retain(|rider_id| *rider_id != id);
        }
        tracing::debug!("Removed rider {}", id);
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Every checkpoint listed by a stage must exist and point back at
    /// that stage.
    pub(crate) fn check_checkpoint_links(&self) -> Result<()> {
        for stage in self.stages.values() {
            for checkpoint_id in &stage.checkpoint_ids {
                let checkpoint = self
                    .checkpoints
                    .get(checkpoint_id)
                    .ok_or_else(|| PortalError::unknown(EntityKind::Checkpoint, checkpoint_id))?;
                if checkpoint.stage_id != stage.id {
                    return Err(PortalError::InvalidArgument {
                        message: format!(
                            "checkpoint {} is listed by stage {} but belongs to stage {}",
                            checkpoint_id, stage.id, checkpoint.stage_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

impl EntityLookup for EntityStore {
    fn lookup_stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    fn lookup_rider(&self, id: RiderId) -> Option<&Rider> {
        self.riders.get(&id)
    }

    fn checkpoints_of(&self, id: StageId) -> Option<Vec<&Checkpoint>> {
        let stage = self.stages.get(&id)?;
        let mut checkpoints: Vec<&Checkpoint> = stage
            .checkpoint_ids
            .iter()
            .filter_map(|checkpoint_id| self.checkpoints.get(checkpoint_id))
            .collect();
        checkpoints.sort_by(|a, b| a.location.total_cmp(&b.location).then(a.id.cmp(&b.id)));
        Some(checkpoints)
    }
}
