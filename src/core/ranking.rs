use crate::config::scoring::ScoringConfig;
use crate::core::elapsed::{
    adjusted_elapsed_times, elapsed_between, raw_elapsed, ElapsedTime, GroupingRule,
};
use crate::core::results::ResultsRepository;
use crate::domain::model::{Checkpoint, RiderId, Stage, StageId, StageResult};
use crate::domain::ports::EntityLookup;
use crate::utils::error::{EntityKind, PortalError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// One line of a stage classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRow {
    pub rank: usize,
    pub rider_id: RiderId,
    pub elapsed: ElapsedTime,
    pub adjusted_elapsed: ElapsedTime,
    pub points: u32,
    pub mountain_points: u32,
}

/// Ranks and scores riders from the stored results of a stage. Every query
/// is computed on demand; nothing is cached between calls.
pub struct RankingEngine<'a, L: EntityLookup> {
    store: &'a L,
    results: &'a ResultsRepository,
    scoring: &'a ScoringConfig,
}

impl<'a, L: EntityLookup> RankingEngine<'a, L> {
    pub fn new(store: &'a L, results: &'a ResultsRepository, scoring: &'a ScoringConfig) -> Self {
        Self {
            store,
            results,
            scoring,
        }
    }

    fn stage(&self, stage_id: StageId) -> Result<&'a Stage> {
        self.store
            .lookup_stage(stage_id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, stage_id))
    }

    fn grouping_rule(&self) -> GroupingRule {
        GroupingRule {
            basis: self.scoring.timing.grouping,
            gap: self.scoring.bunch_gap(),
        }
    }

    /// Results of the stage in ranking order: ascending raw elapsed time,
    /// ties by rider ID.
    fn ranked_results(&self, stage_id: StageId) -> Result<Vec<&'a StageResult>> {
        self.stage(stage_id)?;
        let mut ranked = self.results.stage_results(stage_id);
        // stage_results is already ordered by rider ID and the sort is stable
        ranked.sort_by_key(|result| raw_elapsed(result));
        Ok(ranked)
    }

    pub fn rank_riders(&self, stage_id: StageId) -> Result<Vec<RiderId>> {
        Ok(self
            .ranked_results(stage_id)?
            .into_iter()
            .map(|result| result.rider_id)
            .collect())
    }

    pub fn adjusted_elapsed_time(
        &self,
        stage_id: StageId,
        rider_id: RiderId,
    ) -> Result<Option<ElapsedTime>> {
        let stage = self.stage(stage_id)?;
        if self.results.get(stage_id, rider_id).is_none() {
            return Ok(None);
        }
        let results = self.results.stage_results(stage_id);
        let adjusted = adjusted_elapsed_times(stage.stage_type, &results, self.grouping_rule());
        Ok(adjusted.get(&rider_id).copied())
    }

    pub fn ranked_adjusted_elapsed_times(&self, stage_id: StageId) -> Result<Vec<ElapsedTime>> {
        let stage = self.stage(stage_id)?;
        let ranked = self.ranked_results(stage_id)?;
        let adjusted = adjusted_elapsed_times(stage.stage_type, &ranked, self.grouping_rule());
        Ok(ranked
            .iter()
            .filter_map(|result| adjusted.get(&result.rider_id).copied())
            .collect())
    }

    /// Finish points by rank for the stage type plus intermediate sprint
    /// points, aligned with `rank_riders`.
    pub fn points_in_stage(&self, stage_id: StageId) -> Result<Vec<u32>> {
        let stage = self.stage(stage_id)?;
        let ranked = self.ranked_results(stage_id)?;
        let finish_table = self.scoring.finish_table(stage.stage_type);
        let sprint_points = self.checkpoint_points(stage_id, &ranked, |checkpoint| {
            !checkpoint.checkpoint_type.is_climb()
        })?;

        Ok(ranked
            .iter()
            .enumerate()
            .map(|(position, result)| {
                let finish = finish_table.get(position).copied().unwrap_or(0);
                let sprint = sprint_points.get(&result.rider_id).copied().unwrap_or(0);
                finish.saturating_add(sprint)
            })
            .collect())
    }

    /// Climb points accumulated over every categorised climb, aligned with
    /// `rank_riders`.
    pub fn mountain_points_in_stage(&self, stage_id: StageId) -> Result<Vec<u32>> {
        let ranked = self.ranked_results(stage_id)?;
        let mountain_points = self.checkpoint_points(stage_id, &ranked, |checkpoint| {
            checkpoint.checkpoint_type.is_climb()
        })?;

        Ok(ranked
            .iter()
            .map(|result| mountain_points.get(&result.rider_id).copied().unwrap_or(0))
            .collect())
    }

    pub fn stage_classification(&self, stage_id: StageId) -> Result<Vec<ClassificationRow>> {
        let ranked = self.ranked_results(stage_id)?;
        let adjusted = self.ranked_adjusted_elapsed_times(stage_id)?;
        let points = self.points_in_stage(stage_id)?;
        let mountain_points = self.mountain_points_in_stage(stage_id)?;

        Ok(ranked
            .iter()
            .zip(adjusted)
            .zip(points.into_iter().zip(mountain_points))
            .enumerate()
            .map(
                |(position, ((result, adjusted_elapsed), (points, mountain_points)))| {
                    ClassificationRow {
                        rank: position + 1,
                        rider_id: result.rider_id,
                        elapsed: raw_elapsed(result),
                        adjusted_elapsed,
                        points,
                        mountain_points,
                    }
                },
            )
            .collect())
    }

    /// Sums, per rider, the points won at every checkpoint selected by
    /// `include`. At each checkpoint riders are ordered by the time taken
    /// from their own start to reach it, ties by rider ID.
    fn checkpoint_points(
        &self,
        stage_id: StageId,
        results: &[&StageResult],
        include: impl Fn(&Checkpoint) -> bool,
    ) -> Result<BTreeMap<RiderId, u32>> {
        let checkpoints = self
            .store
            .checkpoints_of(stage_id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, stage_id))?;

        let mut totals: BTreeMap<RiderId, u32> = BTreeMap::new();
        for (position, checkpoint) in checkpoints.into_iter().enumerate() {
            if !include(checkpoint) {
                continue;
            }
            let table = self.scoring.checkpoint_table(checkpoint.checkpoint_type);

            let mut crossings: Vec<(ElapsedTime, RiderId)> = results
                .iter()
                .filter_map(|result| {
                    let crossed = result.checkpoint_time(position)?;
                    Some((elapsed_between(result.start(), crossed), result.rider_id))
                })
                .collect();
            crossings.sort();

            for ((_, rider_id), points) in crossings.iter().zip(table) {
                let total = totals.entry(*rider_id).or_insert(0);
                *total = total.saturating_add(*points);
            }
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::EntityStore;
    use crate::domain::model::{CheckpointType, StageType};
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    struct Fixture {
        store: EntityStore,
        results: ResultsRepository,
        scoring: ScoringConfig,
        stage: StageId,
        riders: Vec<RiderId>,
    }

    impl Fixture {
        /// Concluded stage of the given type with the given checkpoints
        /// (location, type) and `rider_count` riders.
        fn new(stage_type: StageType, checkpoints: &[(f64, CheckpointType)], rider_count: usize) -> Self {
            let mut store = EntityStore::new();
            let race = store.create_race("Tour", "").unwrap();
            let start = NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap();
            let stage = store
                .add_stage_to_race(race, "Stage1", "", 180.0, start, stage_type)
                .unwrap();
            for (location, checkpoint_type) in checkpoints {
                let added = match checkpoint_type {
                    CheckpointType::Sprint => store.add_intermediate_sprint(stage, *location),
                    climb => store.add_categorized_climb(stage, *location, *climb, 6.0, 8.0),
                };
                added.unwrap();
            }
            store.conclude_stage_preparation(stage).unwrap();

            let team = store.create_team("Team", "").unwrap();
            let riders = (0..rider_count)
                .map(|i| store.create_rider(team, &format!("Rider{}", i), 1995).unwrap())
                .collect();

            Self {
                store,
                results: ResultsRepository::new(),
                scoring: ScoringConfig::default(),
                stage,
                riders,
            }
        }

        fn register(&mut self, rider: usize, times: Vec<NaiveTime>) {
            self.results
                .register(&self.store, self.stage, self.riders[rider], times)
                .unwrap();
        }

        fn engine(&self) -> RankingEngine<'_, EntityStore> {
            RankingEngine::new(&self.store, &self.results, &self.scoring)
        }
    }

    #[test]
    fn test_unknown_stage_fails_every_query() {
        let fixture = Fixture::new(StageType::Flat, &[], 1);
        let engine = fixture.engine();
        let unknown = StageId(42);

        assert!(engine.rank_riders(unknown).is_err());
        assert!(engine.ranked_adjusted_elapsed_times(unknown).is_err());
        assert!(engine.points_in_stage(unknown).is_err());
        assert!(engine.mountain_points_in_stage(unknown).is_err());
        assert!(engine.adjusted_elapsed_time(unknown, fixture.riders[0]).is_err());
    }

    #[test]
    fn test_empty_stage_returns_empty() {
        let fixture = Fixture::new(StageType::Flat, &[], 1);
        let engine = fixture.engine();

        assert!(engine.rank_riders(fixture.stage).unwrap().is_empty());
        assert!(engine.ranked_adjusted_elapsed_times(fixture.stage).unwrap().is_empty());
        assert!(engine.points_in_stage(fixture.stage).unwrap().is_empty());
        assert!(engine.mountain_points_in_stage(fixture.stage).unwrap().is_empty());
        assert_eq!(
            engine.adjusted_elapsed_time(fixture.stage, fixture.riders[0]).unwrap(),
            None
        );
    }

    #[test]
    fn test_ranking_example_with_offset_starts() {
        let mut fixture = Fixture::new(
            StageType::MediumMountain,
            &[
                (5.0, CheckpointType::Sprint),
                (60.0, CheckpointType::C2),
                (120.0, CheckpointType::C1),
            ],
            2,
        );
        fixture.register(0, vec![t(10, 0, 0), t(10, 30, 0), t(11, 0, 0), t(11, 30, 0), t(12, 0, 0)]);
        fixture.register(1, vec![t(10, 1, 0), t(10, 31, 0), t(11, 1, 0), t(11, 31, 0), t(12, 1, 0)]);

        let engine = fixture.engine();
        assert_eq!(engine.rank_riders(fixture.stage).unwrap(), fixture.riders);
        assert_eq!(
            engine.ranked_adjusted_elapsed_times(fixture.stage).unwrap(),
            vec![ElapsedTime::from_hms(2, 0, 0), ElapsedTime::from_hms(2, 0, 0)]
        );
    }

    #[test]
    fn test_ranking_orders_by_raw_elapsed() {
        let mut fixture = Fixture::new(StageType::Flat, &[], 3);
        fixture.register(0, vec![t(10, 0, 0), t(14, 10, 0)]);
        fixture.register(1, vec![t(10, 0, 0), t(14, 0, 0)]);
        fixture.register(2, vec![t(10, 0, 0), t(14, 5, 0)]);

        let engine = fixture.engine();
        let riders = &fixture.riders;
        assert_eq!(
            engine.rank_riders(fixture.stage).unwrap(),
            vec![riders[1], riders[2], riders[0]]
        );
    }

    #[test]
    fn test_ties_break_by_rider_id() {
        let mut fixture = Fixture::new(StageType::Flat, &[], 3);
        fixture.register(2, vec![t(10, 0, 0), t(14, 0, 0)]);
        fixture.register(0, vec![t(10, 0, 0), t(14, 0, 0)]);
        fixture.register(1, vec![t(9, 0, 0), t(13, 0, 0)]);

        let engine = fixture.engine();
        assert_eq!(engine.rank_riders(fixture.stage).unwrap(), fixture.riders);
    }

    #[test]
    fn test_ranked_adjusted_times_follow_rank_order() {
        let mut fixture = Fixture::new(StageType::Flat, &[], 3);
        fixture.register(0, vec![t(10, 0, 0), t(14, 0, 0)]);
        fixture.register(
            1,
            vec![t(10, 0, 0), NaiveTime::from_hms_milli_opt(14, 0, 0, 500).unwrap()],
        );
        fixture.register(2, vec![t(10, 0, 0), t(14, 0, 30)]);

        let engine = fixture.engine();
        assert_eq!(
            engine.ranked_adjusted_elapsed_times(fixture.stage).unwrap(),
            vec![
                ElapsedTime::from_hms(4, 0, 0),
                ElapsedTime::from_hms(4, 0, 0),
                ElapsedTime::from_hms(4, 0, 30),
            ]
        );
        assert_eq!(
            engine.adjusted_elapsed_time(fixture.stage, fixture.riders[1]).unwrap(),
            Some(ElapsedTime::from_hms(4, 0, 0))
        );
    }

    #[test]
    fn test_points_include_finish_and_sprint() {
        let mut fixture = Fixture::new(StageType::Flat, &[(50.0, CheckpointType::Sprint)], 2);
        // Rider 1 wins the sprint, rider 0 wins the stage.
        fixture.register(0, vec![t(10, 0, 0), t(11, 0, 5), t(14, 0, 0)]);
        fixture.register(1, vec![t(10, 0, 0), t(11, 0, 0), t(14, 1, 0)]);

        let engine = fixture.engine();
        assert_eq!(engine.rank_riders(fixture.stage).unwrap(), fixture.riders);
        assert_eq!(engine.points_in_stage(fixture.stage).unwrap(), vec![50 + 17, 30 + 20]);
        assert_eq!(engine.mountain_points_in_stage(fixture.stage).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_positions_beyond_table_score_zero() {
        let mut fixture = Fixture::new(StageType::Flat, &[], 3);
        fixture.scoring.stage_points.flat = vec![10, 5];
        fixture.register(0, vec![t(10, 0, 0), t(14, 0, 0)]);
        fixture.register(1, vec![t(10, 0, 0), t(14, 1, 0)]);
        fixture.register(2, vec![t(10, 0, 0), t(14, 2, 0)]);

        let engine = fixture.engine();
        assert_eq!(engine.points_in_stage(fixture.stage).unwrap(), vec![10, 5, 0]);
    }

    #[test]
    fn test_unchecked_huge_tables_saturate() {
        let mut fixture = Fixture::new(
            StageType::Flat,
            &[(50.0, CheckpointType::Sprint), (100.0, CheckpointType::Sprint)],
            1,
        );
        fixture.scoring.stage_points.flat = vec![u32::MAX];
        fixture.scoring.sprint_points.intermediate = vec![u32::MAX];
        fixture.register(0, vec![t(10, 0, 0), t(11, 0, 0), t(12, 0, 0), t(14, 0, 0)]);

        let engine = fixture.engine();
        assert_eq!(engine.points_in_stage(fixture.stage).unwrap(), vec![u32::MAX]);
    }

    #[test]
    fn test_mountain_points_by_crossing_order() {
        let mut fixture = Fixture::new(
            StageType::HighMountain,
            &[(40.0, CheckpointType::C3), (150.0, CheckpointType::Hc)],
            3,
        );
        // Rider 2 wins the stage but is last over the C3 and second on the HC.
        fixture.register(0, vec![t(10, 0, 0), t(11, 0, 0), t(14, 0, 0), t(15, 0, 0)]);
        fixture.register(1, vec![t(10, 0, 0), t(11, 1, 0), t(14, 5, 0), t(15, 10, 0)]);
        fixture.register(2, vec![t(10, 0, 0), t(11, 2, 0), t(14, 1, 0), t(14, 50, 0)]);

        let engine = fixture.engine();
        let riders = &fixture.riders;
        assert_eq!(
            engine.rank_riders(fixture.stage).unwrap(),
            vec![riders[2], riders[0], riders[1]]
        );
        // C3 pays [2, 1], HC pays [20, 15, 12, ...].
        assert_eq!(
            engine.mountain_points_in_stage(fixture.stage).unwrap(),
            vec![15, 2 + 20, 1 + 12]
        );
    }

    #[test]
    fn test_classification_rows_align() {
        let mut fixture = Fixture::new(StageType::TimeTrial, &[], 2);
        fixture.register(0, vec![t(10, 0, 0), t(10, 40, 0)]);
        fixture.register(1, vec![t(10, 2, 0), t(10, 38, 0)]);

        let engine = fixture.engine();
        let rows = engine.stage_classification(fixture.stage).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].rider_id, fixture.riders[1]);
        assert_eq!(rows[0].elapsed, ElapsedTime::from_hms(0, 36, 0));
        assert_eq!(rows[0].adjusted_elapsed, rows[0].elapsed);
        assert_eq!(rows[0].points, 20);
        assert_eq!(rows[1].points, 17);
        assert_eq!(rows[1].mountain_points, 0);
    }
}
