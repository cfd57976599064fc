use crate::config::scoring::ScoringConfig;
use crate::core::elapsed::ElapsedTime;
use crate::core::ranking::{ClassificationRow, RankingEngine};
use crate::core::report::{ReportRow, StageReport};
use crate::core::results::ResultsRepository;
use crate::core::store::EntityStore;
use crate::domain::model::{
    CheckpointId, CheckpointType, RaceId, RiderId, StageId, StageType, TeamId,
};
use crate::domain::ports::{EntityLookup, Storage};
use crate::utils::error::{EntityKind, PortalError, Result};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Serialised form of the whole portal.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    store: EntityStore,
    results: ResultsRepository,
}

/// Entry point owning the entity store, the results repository and the
/// scoring configuration.
#[derive(Debug, Clone, Default)]
pub struct CyclingPortal {
    store: EntityStore,
    results: ResultsRepository,
    scoring: ScoringConfig,
}

impl CyclingPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scoring(scoring: ScoringConfig) -> Self {
        Self {
            scoring,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn set_scoring(&mut self, scoring: ScoringConfig) {
        self.scoring = scoring;
    }

    fn engine(&self) -> RankingEngine<'_, EntityStore> {
        RankingEngine::new(&self.store, &self.results, &self.scoring)
    }

    fn require_pair(&self, stage_id: StageId, rider_id: RiderId) -> Result<()> {
        self.store.stage(stage_id)?;
        self.store.rider(rider_id)?;
        Ok(())
    }

    // Races and stages

    pub fn get_race_ids(&self) -> Vec<RaceId> {
        self.store.race_ids()
    }

    pub fn create_race(&mut self, name: &str, description: &str) -> Result<RaceId> {
        self.store.create_race(name, description)
    }

    pub fn view_race_details(&self, race_id: RaceId) -> Result<String> {
        self.store.view_race_details(race_id)
    }

    pub fn remove_race(&mut self, race_id: RaceId) -> Result<()> {
        for stage_id in self.store.remove_race(race_id)? {
            self.results.purge_stage(stage_id);
        }
        Ok(())
    }

    pub fn get_number_of_stages(&self, race_id: RaceId) -> Result<usize> {
        self.store.number_of_stages(race_id)
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
        self.store
            .add_stage_to_race(race_id, name, description, length, start_time, stage_type)
    }

    pub fn get_race_stages(&self, race_id: RaceId) -> Result<Vec<StageId>> {
        self.store.race_stages(race_id)
    }

    pub fn get_stage_length(&self, stage_id: StageId) -> Result<f64> {
        self.store.stage_length(stage_id)
    }

    pub fn remove_stage(&mut self, stage_id: StageId) -> Result<()> {
        self.store.remove_stage(stage_id)?;
        let purged = self.results.purge_stage(stage_id);
        tracing::debug!("Purged {} results of removed stage {}", purged, stage_id);
        Ok(())
    }

    pub fn add_categorized_climb(
        &mut self,
        stage_id: StageId,
        location: f64,
        category: CheckpointType,
        average_gradient: f64,
        length: f64,
    ) -> Result<CheckpointId> {
        self.store
            .add_categorized_climb(stage_id, location, category, average_gradient, length)
    }

    pub fn add_intermediate_sprint(&mut self, stage_id: StageId, location: f64) -> Result<CheckpointId> {
        self.store.add_intermediate_sprint(stage_id, location)
    }

    pub fn remove_checkpoint(&mut self, checkpoint_id: CheckpointId) -> Result<()> {
        self.store.remove_checkpoint(checkpoint_id)
    }

    pub fn conclude_stage_preparation(&mut self, stage_id: StageId) -> Result<()> {
        self.store.conclude_stage_preparation(stage_id)
    }

    pub fn get_stage_checkpoints(&self, stage_id: StageId) -> Result<Vec<CheckpointId>> {
        self.store.stage_checkpoints(stage_id)
    }

    // Teams and riders

    pub fn create_team(&mut self, name: &str, description: &str) -> Result<TeamId> {
        self.store.create_team(name, description)
    }

    pub fn remove_team(&mut self, team_id: TeamId) -> Result<()> {
        for rider_id in self.store.remove_team(team_id)? {
            self.results.purge_rider(rider_id);
        }
        Ok(())
    }

    pub fn get_teams(&self) -> Vec<TeamId> {
        self.store.team_ids()
    }

    pub fn get_team_riders(&self, team_id: TeamId) -> Result<Vec<RiderId>> {
        self.store.team_riders(team_id)
    }

    pub fn create_rider(&mut self, team_id: TeamId, name: &str, year_of_birth: i32) -> Result<RiderId> {
        self.store.create_rider(team_id, name, year_of_birth)
    }

    /// Removes the rider and every result they registered.
    pub fn remove_rider(&mut self, rider_id: RiderId) -> Result<()> {
        self.store.remove_rider(rider_id)?;
        let purged = self.results.purge_rider(rider_id);
        tracing::debug!("Purged {} results of removed rider {}", purged, rider_id);
        Ok(())
    }

    // Results

    pub fn register_result(
        &mut self,
        stage_id: StageId,
        rider_id: RiderId,
        times: Vec<NaiveTime>,
    ) -> Result<()> {
        self.results.register(&self.store, stage_id, rider_id, times)
    }

    /// Copy of the registered times, `None` when the rider has no result in
    /// the stage.
    pub fn get_raw_result(&self, stage_id: StageId, rider_id: RiderId) -> Result<Option<Vec<NaiveTime>>> {
        self.require_pair(stage_id, rider_id)?;
        Ok(self
            .results
            .get(stage_id, rider_id)
            .map(|result| result.times().to_vec()))
    }

    pub fn get_adjusted_elapsed_time(
        &self,
        stage_id: StageId,
        rider_id: RiderId,
    ) -> Result<Option<ElapsedTime>> {
        self.require_pair(stage_id, rider_id)?;
        self.engine().adjusted_elapsed_time(stage_id, rider_id)
    }

    pub fn delete_result(&mut self, stage_id: StageId, rider_id: RiderId) -> Result<()> {
        self.require_pair(stage_id, rider_id)?;
        self.results.delete(stage_id, rider_id)?;
        Ok(())
    }

    pub fn result_count(&self, stage_id: StageId) -> usize {
        self.results.result_count(stage_id)
    }

    // Rankings

    pub fn rank_riders(&self, stage_id: StageId) -> Result<Vec<RiderId>> {
        self.engine().rank_riders(stage_id)
    }

    pub fn ranked_adjusted_elapsed_times(&self, stage_id: StageId) -> Result<Vec<ElapsedTime>> {
        self.engine().ranked_adjusted_elapsed_times(stage_id)
    }

    pub fn points_in_stage(&self, stage_id: StageId) -> Result<Vec<u32>> {
        self.engine().points_in_stage(stage_id)
    }

    pub fn mountain_points_in_stage(&self, stage_id: StageId) -> Result<Vec<u32>> {
        self.engine().mountain_points_in_stage(stage_id)
    }

    pub fn stage_classification(&self, stage_id: StageId) -> Result<Vec<ClassificationRow>> {
        self.engine().stage_classification(stage_id)
    }

    pub fn stage_report(&self, stage_id: StageId) -> Result<StageReport> {
        let stage = self.store.stage(stage_id)?;
        let rows = self
            .stage_classification(stage_id)?
            .into_iter()
            .map(|row| ReportRow {
                rider_name: self
                    .store
                    .lookup_rider(row.rider_id)
                    .map(|rider| rider.name.clone())
                    .unwrap_or_default(),
                row,
            })
            .collect();

        Ok(StageReport {
            stage_id,
            stage_name: stage.name.clone(),
            stage_type: stage.stage_type,
            rows,
        })
    }

    // Whole-state operations

    /// Clears every entity and result and resets ID counters. The scoring
    /// configuration is kept.
    pub fn erase(&mut self) {
        self.store.clear();
        self.results.clear();
        tracing::debug!("Erased portal state");
    }

    pub fn save<S: Storage>(&self, storage: &S, path: &str) -> Result<()> {
        let snapshot = SnapshotRef {
            store: &self.store,
            results: &self.results,
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        storage.write_file(path, &data)?;
        tracing::debug!("Saved portal snapshot ({} bytes) to {}", data.len(), path);
        Ok(())
    }

    /// Replaces the current state with the snapshot at `path`. On failure
    /// the current state is left untouched.
    pub fn load<S: Storage>(&mut self, storage: &S, path: &str) -> Result<()> {
        let data = storage.read_file(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        Self::check_snapshot(&snapshot)?;

        self.store = snapshot.store;
        self.results = snapshot.results;
        tracing::debug!("Loaded portal snapshot from {}", path);
        Ok(())
    }

    fn check_snapshot(snapshot: &Snapshot) -> Result<()> {
        snapshot.store.check_checkpoint_links()?;
        for (stage_id, rider_id, result) in snapshot.results.entries() {
            if result.stage_id != stage_id || result.rider_id != rider_id {
                return Err(PortalError::InvalidArgument {
                    message: format!(
                        "result for stage {} / rider {} is filed under stage {} / rider {}",
                        result.stage_id, result.rider_id, stage_id, rider_id
                    ),
                });
            }
            let stage = snapshot
                .store
                .lookup_stage(result.stage_id)
                .ok_or_else(|| PortalError::unknown(EntityKind::Stage, result.stage_id))?;
            snapshot
                .store
                .lookup_rider(result.rider_id)
                .ok_or_else(|| PortalError::unknown(EntityKind::Rider, result.rider_id))?;
            if result.times().len() != stage.expected_time_count() {
                return Err(PortalError::InvalidTimeCount {
                    expected: stage.expected_time_count(),
                    actual: result.times().len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    store: &'a EntityStore,
    results: &'a ResultsRepository,
}
