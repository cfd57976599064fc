use crate::domain::model::{RiderId, StageId, StageResult};
use crate::domain::ports::EntityLookup;
use crate::utils::error::{EntityKind, PortalError, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-stage map of rider timings. At most one result exists per
/// (stage, rider) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsRepository {
    by_stage: BTreeMap<StageId, BTreeMap<RiderId, StageResult>>,
}

impl ResultsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a rider's timings for a stage. Nothing is
    /// written unless every check passes.
    pub fn register<L: EntityLookup>(
        &mut self,
        store: &L,
        stage_id: StageId,
        rider_id: RiderId,
        times: Vec<NaiveTime>,
    ) -> Result<()> {
        let stage = store
            .lookup_stage(stage_id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Stage, stage_id))?;
        store
            .lookup_rider(rider_id)
            .ok_or_else(|| PortalError::unknown(EntityKind::Rider, rider_id))?;

        if !stage.is_awaiting_results() {
            return Err(PortalError::InvalidState {
                stage_id: stage_id.0,
                message: "stage is not waiting for results".to_string(),
            });
        }

        if self.get(stage_id, rider_id).is_some() {
            return Err(PortalError::DuplicateResult {
                stage_id: stage_id.0,
                rider_id: rider_id.0,
            });
        }

        let expected = stage.expected_time_count();
        if times.len() != expected {
            return Err(PortalError::InvalidTimeCount {
                expected,
                actual: times.len(),
            });
        }

        self.by_stage
            .entry(stage_id)
            .or_default()
            .insert(rider_id, StageResult::new(stage_id, rider_id, times));
        tracing::debug!("Registered result for rider {} in stage {}", rider_id, stage_id);
        Ok(())
    }

    pub fn get(&self, stage_id: StageId, rider_id: RiderId) -> Option<&StageResult> {
        self.by_stage.get(&stage_id)?.get(&rider_id)
    }

    /// Removes a stored result. A missing result is reported the same way
    /// as an unknown ID.
    pub fn delete(&mut self, stage_id: StageId, rider_id: RiderId) -> Result<StageResult> {
        let stage_results = self.by_stage.get_mut(&stage_id);
        let removed = stage_results.and_then(|results| results.remove(&rider_id));
        let removed = removed.ok_or_else(|| {
            PortalError::unknown(
                EntityKind::Result,
                format!("stage {} / rider {}", stage_id, rider_id),
            )
        })?;

        if self.by_stage.get(&stage_id).is_some_and(BTreeMap::is_empty) {
            self.by_stage.remove(&stage_id);
        }
        tracing::debug!("Deleted result for rider {} in stage {}", rider_id, stage_id);
        Ok(removed)
    }

    /// All results of a stage, ordered by rider ID.
    pub fn stage_results(&self, stage_id: StageId) -> Vec<&StageResult> {
        self.by_stage
            .get(&stage_id)
            .map(|results| results.values().collect())
            .unwrap_or_default()
    }

    pub fn result_count(&self, stage_id: StageId) -> usize {
        self.by_stage.get(&stage_id).map_or(0, BTreeMap::len)
    }

    /// Drops every result of the rider across all stages.
    pub fn purge_rider(&mut self, rider_id: RiderId) -> usize {
        let mut purged = 0;
        for results in self.by_stage.values_mut() {
            if results.remove(&rider_id).is_some() {
                purged += 1;
            }
        }
        self.by_stage.retain(|_, results| !results.is_empty());
        purged
    }

    pub fn purge_stage(&mut self, stage_id: StageId) -> usize {
        self.by_stage.remove(&stage_id).map_or(0, |results| results.len())
    }

    pub fn clear(&mut self) {
        self.by_stage.clear();
    }

    /// Every stored result with the (stage, rider) key it is filed under.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (StageId, RiderId, &StageResult)> {
        self.by_stage.iter().flat_map(|(stage_id, results)| {
            results
                .iter()
                .map(move |(rider_id, result)| (*stage_id, *rider_id, result))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::EntityStore;
    use crate::domain::model::StageType;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    /// Store with one concluded flat stage holding a single sprint, and two
    /// riders.
    fn fixture() -> (EntityStore, StageId, RiderId, RiderId) {
        let mut store = EntityStore::new();
        let race = store.create_race("Tour", "").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let stage = store
            .add_stage_to_race(race, "Stage1", "", 150.0, start, StageType::Flat)
            .unwrap();
        store.add_intermediate_sprint(stage, 70.0).unwrap();
        store.conclude_stage_preparation(stage).unwrap();
        let team = store.create_team("Visma", "").unwrap();
        let a = store.create_rider(team, "Jonas", 1996).unwrap();
        let b = store.create_rider(team, "Wout", 1994).unwrap();
        (store, stage, a, b)
    }

    #[test]
    fn test_register_then_get_returns_times_verbatim() {
        let (store, stage, rider, _) = fixture();
        let mut repo = ResultsRepository::new();
        // Non-monotonic times are stored as given.
        let times = vec![t(10, 0, 0), t(12, 0, 0), t(11, 30, 0)];

        repo.register(&store, stage, rider, times.clone()).unwrap();
        assert_eq!(repo.get(stage, rider).unwrap().times(), times.as_slice());
        assert_eq!(repo.result_count(stage), 1);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let (store, stage, rider, _) = fixture();
        let mut repo = ResultsRepository::new();
        let first = vec![t(10, 0, 0), t(11, 0, 0), t(12, 0, 0)];

        repo.register(&store, stage, rider, first.clone()).unwrap();
        let second = repo.register(&store, stage, rider, vec![t(9, 0, 0), t(9, 1, 0), t(9, 2, 0)]);

        assert!(matches!(second, Err(PortalError::DuplicateResult { .. })));
        assert_eq!(repo.get(stage, rider).unwrap().times(), first.as_slice());
    }

    #[test]
    fn test_wrong_time_count_rejected() {
        let (store, stage, rider, _) = fixture();
        let mut repo = ResultsRepository::new();

        let err = repo
            .register(&store, stage, rider, vec![t(10, 0, 0), t(12, 0, 0)])
            .unwrap_err();
        assert!(matches!(
            err,
            PortalError::InvalidTimeCount {
                expected: 3,
                actual: 2
            }
        ));
        assert!(repo.get(stage, rider).is_none());
    }

    #[test]
    fn test_unknown_ids_and_state() {
        let (mut store, stage, rider, _) = fixture();
        let mut repo = ResultsRepository::new();
        let times = vec![t(10, 0, 0), t(11, 0, 0), t(12, 0, 0)];

        assert!(matches!(
            repo.register(&store, StageId(99), rider, times.clone()),
            Err(PortalError::UnknownEntity {
                kind: EntityKind::Stage,
                ..
            })
        ));
        assert!(matches!(
            repo.register(&store, stage, RiderId(99), times.clone()),
            Err(PortalError::UnknownEntity {
                kind: EntityKind::Rider,
                ..
            })
        ));

        let race = store.race_ids()[0];
        let start = store.stage(stage).unwrap().start_time;
        let preparing = store
            .add_stage_to_race(race, "Stage2", "", 100.0, start, StageType::Flat)
            .unwrap();
        assert!(matches!(
            repo.register(&store, preparing, rider, vec![t(10, 0, 0), t(12, 0, 0)]),
            Err(PortalError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_delete_then_reregister() {
        let (store, stage, rider, _) = fixture();
        let mut repo = ResultsRepository::new();
        let times = vec![t(10, 0, 0), t(11, 0, 0), t(12, 0, 0)];

        assert!(repo.delete(stage, rider).is_err());
        repo.register(&store, stage, rider, times.clone()).unwrap();
        repo.delete(stage, rider).unwrap();
        assert!(repo.get(stage, rider).is_none());
        assert!(repo.register(&store, stage, rider, times).is_ok());
    }

    #[test]
    fn test_purge_rider() {
        let (store, stage, a, b) = fixture();
        let mut repo = ResultsRepository::new();
        repo.register(&store, stage, a, vec![t(10, 0, 0), t(11, 0, 0), t(12, 0, 0)])
            .unwrap();
        repo.register(&store, stage, b, vec![t(10, 0, 0), t(11, 0, 0), t(12, 5, 0)])
            .unwrap();

        assert_eq!(repo.purge_rider(a), 1);
        let remaining: Vec<RiderId> = repo
            .stage_results(stage)
            .iter()
            .map(|result| result.rider_id)
            .collect();
        assert_eq!(remaining, vec![b]);
        assert_eq!(repo.purge_stage(stage), 1);
        assert!(repo.stage_results(stage).is_empty());
    }
}
