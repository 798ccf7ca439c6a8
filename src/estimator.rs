//! Buffer-size estimator.
//!
//! Replays, per zone and per year, the transition search a runtime performs,
//! and records how many transitions it must hold at once. The global maximum
//! sizes the fixed-capacity buffer of embedded runtimes, so it must never be
//! an underestimate.
//!
//! ```text
//! ValidatedDatabase
//!   │  par_iter over zones (rayon)
//!   │    ZoneSimulator: years [start-1, until+1)
//!   │      year candidates ──> year requirement = candidate count (min 1)
//!   │                      └──> group by instant, tie-break, carry winner
//!   │    BufferSize { max, year }
//!   v
//! BufferStats { per_zone, max_buffer_size }   (associative max-reduce)
//!   │
//!   v  check_capacity: max_buffer_size <= runtime capacity (default 8)
//! ```
//!
//! Zones share nothing while simulating, so completion order never changes
//! the result.

#[path = "estimator/simulate.rs"]
mod simulate;

use std::collections::BTreeMap;

use log::{info, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::error::EstimateError;
use crate::transformer::ValidatedDatabase;
use crate::types::{MAX_TO_YEAR, MIN_YEAR};

use simulate::ZoneSimulator;

/// Peak working-set size of one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferSize {
    pub max: usize,
    /// First simulated year reaching `max`.
    pub year: i32,
}

/// Transition capacity of the embedded runtime's buffer.
pub const DEFAULT_MAX_TRANSITIONS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub per_zone: BTreeMap<String, BufferSize>,
    pub max_buffer_size: usize,
}

impl BufferStats {
    /// Zones whose peak equals `max_buffer_size`, with the year it is first reached.
    pub fn peak_zones(&self) -> impl Iterator<Item = (&str, i32)> {
        self.per_zone.iter().filter(|(_, size)| size.max == self.max_buffer_size).map(|(name, size)| (name.as_str(), size.year))
    }

    /// Refuse a maximum the runtime cannot hold. With `ignore_too_large` the
    /// overflow is only logged.
    pub fn check_capacity(&self, capacity: usize, ignore_too_large: bool) -> Result<(), EstimateError> {
        if self.max_buffer_size <= capacity {
            return Ok(());
        }
        let (zone, year) = self.peak_zones().next().unwrap_or_default();
        let err = EstimateError::BufferTooLarge { max: self.max_buffer_size, capacity, zone: zone.to_string(), year };
        if ignore_too_large {
            warn!("{err}");
            return Ok(());
        }
        Err(err)
    }
}

/// Estimate over the window the database was truncated to.
pub fn estimate(db: &ValidatedDatabase) -> Result<BufferStats, EstimateError> {
    estimate_window(db, db.start_year, db.until_year)
}

/// Estimate over an explicit `[start_year, until_year)` window.
pub fn estimate_window(db: &ValidatedDatabase, start_year: i32, until_year: i32) -> Result<BufferStats, EstimateError> {
    if start_year >= until_year || start_year <= MIN_YEAR || until_year > MAX_TO_YEAR {
        return Err(EstimateError::WindowOutOfRange { start: start_year, until: until_year });
    }
    let zones: Vec<(&String, &Vec<_>)> = db.zones.iter().collect();

    let per_zone = zones
        .par_iter()
        .map(|(name, eras)| {
            let size = ZoneSimulator::new(name, eras, &db.policies)?.run(start_year, until_year)?;
            Ok(((*name).clone(), size))
        })
        .collect::<Result<BTreeMap<String, BufferSize>, EstimateError>>()?;

    let max_buffer_size = per_zone.par_iter().map(|(_, size)| size.max).reduce(|| 0, usize::max);

    info!("estimated {} zones over [{start_year}, {until_year}): max buffer size {max_buffer_size}", per_zone.len());
    let stats = BufferStats { per_zone, max_buffer_size };
    for (zone, year) in stats.peak_zones() {
        info!("  {zone} in {year}");
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::transformer::tests::{ROUND_TRIP, options, run};
    use crate::types::DstRef;

    #[test]
    fn round_trip_needs_two() {
        let db = run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap();
        let stats = estimate(&db).unwrap();
        assert_eq!(stats.per_zone["Z"].max, 2);
        assert_eq!(stats.per_zone["Z"].year, 2020);
        assert_eq!(stats.max_buffer_size, 2);
    }

    #[test]
    fn more_transitions_per_year_need_more_room() {
        let double_summer = "\
Rule GB 2020 2022 - Mar lastSun 1:00u 1:00 BST
Rule GB 2020 2022 - May Sun>=1 1:00u 2:00 BDST
Rule GB 2020 2022 - Aug Sun>=8 1:00u 1:00 BST
Rule GB 2020 2022 - Oct lastSun 1:00u 0 GMT
Zone G 0:00 GB %s
";
        let four = estimate(&run(double_summer, &options(2020, 2023, Scope::Extended)).unwrap()).unwrap();
        let two = estimate(&run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap()).unwrap();
        assert_eq!(four.per_zone["G"], BufferSize { max: 4, year: 2020 });
        assert!(four.max_buffer_size > two.max_buffer_size);
    }

    #[test]
    fn fixed_zone_needs_one() {
        let db = run("Zone F 5:30 - IST\n", &options(2020, 2023, Scope::Extended)).unwrap();
        let stats = estimate(&db).unwrap();
        assert_eq!(stats.per_zone["F"], BufferSize { max: 1, year: 2019 });
    }

    #[test]
    fn era_start_coinciding_with_rule_is_a_tie() {
        // The second era starts at 2021-03-28 01:00 UTC, exactly when the EU
        // March rule fires in that era.
        let text = "\
Rule EU 2020 max - Mar lastSun 1:00u 1:00 S
Rule EU 2020 max - Oct lastSun 1:00u 0 -
Zone T 0:00 - GMT 2021 Mar 28 1:00u
\t1:00 EU CE%sT
";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        let stats = estimate(&db).unwrap();
        assert_eq!(stats.per_zone["T"], BufferSize { max: 3, year: 2021 });
    }

    #[test]
    fn widening_the_window_never_shrinks_the_peak() {
        let text = "\
Rule EU 2020 max - Mar lastSun 1:00u 1:00 S
Rule EU 2020 max - Oct lastSun 1:00u 0 -
Rule P 2000 2022 - Mar lastSun 2:00 1:00 D
Rule P 2000 2022 - Nov Sun>=1 2:00 0 S
Zone T 0:00 - GMT 2021 Mar 28 1:00u
\t1:00 EU CE%sT
Zone Z 1:00 P EU%sT
";
        let db = run(text, &options(2000, 2100, Scope::Extended)).unwrap();
        assert_eq!(estimate_window(&db, 2023, 2030).unwrap().max_buffer_size, 2);
        let mut previous = 0;
        for (start, until) in [(2023, 2030), (2021, 2030), (2010, 2040), (2000, 2100)] {
            let max = estimate_window(&db, start, until).unwrap().max_buffer_size;
            assert!(max >= previous, "[{start}, {until}) shrank to {max}");
            previous = max;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn inconsistent_database_is_reported() {
        let mut db = run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap();
        db.policies.get_mut("P").unwrap().clear();
        assert_eq!(
            estimate(&db).unwrap_err(),
            EstimateError::EmptyPolicy { zone: "Z".into(), policy: "P".into() }
        );

        db.zones.get_mut("Z").unwrap()[0].dst = DstRef::Policy("Q".into());
        assert_eq!(
            estimate(&db).unwrap_err(),
            EstimateError::UnknownPolicy { zone: "Z".into(), policy: "Q".into() }
        );

        db.zones.get_mut("Z").unwrap().clear();
        assert_eq!(estimate(&db).unwrap_err(), EstimateError::NoActiveEra { zone: "Z".into(), year: 2019 });
    }

    #[test]
    fn peak_above_capacity_is_fatal_unless_ignored() {
        let db = run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap();
        let stats = estimate(&db).unwrap();
        assert_eq!(stats.peak_zones().collect::<Vec<_>>(), [("Z", 2020)]);
        assert!(stats.check_capacity(DEFAULT_MAX_TRANSITIONS, false).is_ok());
        assert_eq!(
            stats.check_capacity(1, false).unwrap_err(),
            EstimateError::BufferTooLarge { max: 2, capacity: 1, zone: "Z".into(), year: 2020 }
        );
        assert!(stats.check_capacity(1, true).is_ok());
    }

    #[test]
    fn window_outside_the_sentinels_cannot_be_simulated() {
        let db = run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap();
        assert_eq!(
            estimate_window(&db, 2000, i32::MAX).unwrap_err(),
            EstimateError::WindowOutOfRange { start: 2000, until: i32::MAX }
        );
        assert!(matches!(estimate_window(&db, 2023, 2020), Err(EstimateError::WindowOutOfRange { .. })));
    }

    #[test]
    fn missing_anchor_leaves_no_prior_rule() {
        let mut db = run(ROUND_TRIP, &options(2020, 2023, Scope::Extended)).unwrap();
        db.policies.get_mut("P").unwrap().retain(|r| !r.anchor);
        assert!(matches!(estimate(&db), Err(EstimateError::NoPriorRule { .. })));
    }
}
