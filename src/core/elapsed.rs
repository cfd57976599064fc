//! Raw and adjusted elapsed times.
//!
//! Outside time trials, riders finishing less than the bunch gap behind the
//! rider in front of them are credited with the same time as the first rider
//! of their bunch. Bunches chain: a rider joins as long as the gap to the
//! immediately preceding finisher stays under the threshold.

use crate::config::scoring::GroupingBasis;
use crate::domain::model::{RiderId, StageResult, StageType};
use chrono::{NaiveTime, TimeDelta};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A non-negative duration measured from a rider's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElapsedTime(TimeDelta);

impl ElapsedTime {
    pub fn from_hms(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self(TimeDelta::hours(hours) + TimeDelta::minutes(minutes) + TimeDelta::seconds(seconds))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }
}

impl From<TimeDelta> for ElapsedTime {
    fn from(delta: TimeDelta) -> Self {
        Self(delta)
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds();
        let millis = self.0.subsec_nanos() / 1_000_000;
        write!(f, "{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)?;
        if millis > 0 {
            write!(f, ".{:03}", millis)?;
        }
        Ok(())
    }
}

impl Serialize for ElapsedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// `finish - start` as time-of-day values. A finish before the start is
/// read as having crossed midnight once.
pub fn elapsed_between(start: NaiveTime, finish: NaiveTime) -> ElapsedTime {
    let delta = finish.signed_duration_since(start);
    if delta < TimeDelta::zero() {
        ElapsedTime(delta + TimeDelta::days(1))
    } else {
        ElapsedTime(delta)
    }
}

pub fn raw_elapsed(result: &StageResult) -> ElapsedTime {
    elapsed_between(result.start(), result.finish())
}

/// Bunch-grouping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingRule {
    pub basis: GroupingBasis,
    pub gap: TimeDelta,
}

impl Default for GroupingRule {
    fn default() -> Self {
        Self {
            basis: GroupingBasis::FinishClock,
            gap: TimeDelta::seconds(1),
        }
    }
}

/// Adjusted elapsed time for every rider of a stage.
pub fn adjusted_elapsed_times(
    stage_type: StageType,
    results: &[&StageResult],
    rule: GroupingRule,
) -> BTreeMap<RiderId, ElapsedTime> {
    if stage_type.is_time_trial() {
        return results
            .iter()
            .map(|result| (result.rider_id, raw_elapsed(result)))
            .collect();
    }

    let mut finishers: Vec<(&StageResult, ElapsedTime)> = results
        .iter()
        .map(|result| (*result, raw_elapsed(result)))
        .collect();
    match rule.basis {
        GroupingBasis::FinishClock => {
            finishers.sort_by_key(|(result, _)| (result.finish(), result.rider_id))
        }
        GroupingBasis::Elapsed => finishers.sort_by_key(|(result, raw)| (*raw, result.rider_id)),
    }

    let mut adjusted = BTreeMap::new();
    let mut previous: Option<&(&StageResult, ElapsedTime)> = None;
    let mut bunch_time = ElapsedTime(TimeDelta::zero());

    for finisher in &finishers {
        let (result, raw) = finisher;
        let joins_bunch = previous.is_some_and(|(prev_result, prev_raw)| {
            let gap = match rule.basis {
                GroupingBasis::FinishClock => {
                    result.finish().signed_duration_since(prev_result.finish())
                }
                GroupingBasis::Elapsed => raw.0 - prev_raw.0,
            };
            gap < rule.gap
        });

        if !joins_bunch {
            bunch_time = *raw;
        }
        adjusted.insert(result.rider_id, bunch_time);
        previous = Some(finisher);
    }

    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StageId;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn result(rider: u32, start: NaiveTime, finish: NaiveTime) -> StageResult {
        StageResult::new(StageId(1), RiderId(rider), vec![start, finish])
    }

    #[test]
    fn test_elapsed_between() {
        assert_eq!(
            elapsed_between(t(10, 0, 0), t(12, 30, 15)),
            ElapsedTime::from_hms(2, 30, 15)
        );
        assert_eq!(
            elapsed_between(t(23, 0, 0), t(1, 0, 0)),
            ElapsedTime::from_hms(2, 0, 0)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ElapsedTime::from_hms(2, 5, 9).to_string(), "2:05:09");
        let with_millis = ElapsedTime::from(TimeDelta::milliseconds(3_723_250));
        assert_eq!(with_millis.to_string(), "1:02:03.250");
    }

    #[test]
    fn test_sub_second_finish_shares_leader_time() {
        let a = result(1, t(10, 0, 0), t(12, 0, 0));
        let b = result(
            2,
            t(10, 0, 0),
            NaiveTime::from_hms_milli_opt(12, 0, 0, 999).unwrap(),
        );

        let adjusted = adjusted_elapsed_times(StageType::Flat, &[&b, &a], GroupingRule::default());
        assert_eq!(adjusted[&RiderId(1)], ElapsedTime::from_hms(2, 0, 0));
        assert_eq!(adjusted[&RiderId(2)], ElapsedTime::from_hms(2, 0, 0));
    }

    #[test]
    fn test_bunches_chain_and_break() {
        let riders = [
            result(1, t(10, 0, 0), t(14, 0, 0)),
            result(2, t(10, 0, 0), NaiveTime::from_hms_milli_opt(14, 0, 0, 600).unwrap()),
            result(3, t(10, 0, 0), NaiveTime::from_hms_milli_opt(14, 0, 1, 400).unwrap()),
            result(4, t(10, 0, 0), NaiveTime::from_hms_milli_opt(14, 0, 2, 400).unwrap()),
        ];
        let refs: Vec<&StageResult> = riders.iter().collect();

        let adjusted = adjusted_elapsed_times(StageType::HighMountain, &refs, GroupingRule::default());
        let leader = ElapsedTime::from_hms(4, 0, 0);
        assert_eq!(adjusted[&RiderId(1)], leader);
        assert_eq!(adjusted[&RiderId(2)], leader);
        assert_eq!(adjusted[&RiderId(3)], leader);
        // Exactly one second behind rider 3 starts a new bunch.
        assert_eq!(adjusted[&RiderId(4)], raw_elapsed(&riders[3]));
    }

    #[test]
    fn test_time_trial_keeps_raw_times() {
        let a = result(1, t(10, 0, 0), t(10, 30, 0));
        let b = result(
            2,
            t(10, 0, 0),
            NaiveTime::from_hms_milli_opt(10, 30, 0, 500).unwrap(),
        );

        let adjusted = adjusted_elapsed_times(StageType::TimeTrial, &[&a, &b], GroupingRule::default());
        assert_eq!(adjusted[&RiderId(1)], raw_elapsed(&a));
        assert_eq!(adjusted[&RiderId(2)], raw_elapsed(&b));
    }

    #[test]
    fn test_staggered_starts_compare_finish_clock() {
        // One minute apart on the clock: separate bunches.
        let a = result(1, t(10, 0, 0), t(12, 0, 0));
        let b = result(2, t(10, 1, 0), t(12, 1, 0));

        let adjusted = adjusted_elapsed_times(StageType::Flat, &[&a, &b], GroupingRule::default());
        assert_eq!(adjusted[&RiderId(1)], ElapsedTime::from_hms(2, 0, 0));
        assert_eq!(adjusted[&RiderId(2)], ElapsedTime::from_hms(2, 0, 0));
    }

    #[test]
    fn test_elapsed_basis_groups_by_duration() {
        let a = result(1, t(10, 0, 0), t(12, 0, 0));
        let b = result(
            2,
            t(10, 1, 0),
            NaiveTime::from_hms_milli_opt(12, 1, 0, 300).unwrap(),
        );
        let rule = GroupingRule {
            basis: GroupingBasis::Elapsed,
            gap: TimeDelta::seconds(1),
        };

        let adjusted = adjusted_elapsed_times(StageType::Flat, &[&a, &b], rule);
        assert_eq!(adjusted[&RiderId(2)], ElapsedTime::from_hms(2, 0, 0));

        let by_clock = adjusted_elapsed_times(StageType::Flat, &[&a, &b], GroupingRule::default());
        assert_eq!(by_clock[&RiderId(2)], raw_elapsed(&b));
    }
}
