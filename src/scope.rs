//! Output scopes and the numeric widths each one allows.
//!
//! A scope decides two things:
//!
//! - the **granularity** time fields are truncated to before the estimator
//!   runs (minutes for basic/extended, seconds for complete), and
//! - the **encoded range** of every numeric field the runtime tables store.
//!
//! ```text
//!            years               STDOFF          AT/UNTIL        SAVE
//! basic      int8, base 2100     60s  ±1905      60s  0..=3825    900s -4..=11
//! extended   int16               60s  ±1905      60s  0..=3825    900s -4..=11
//! complete   int16               1s   i32        1s   i32         1s   i16
//! ```
//!
//! `ScopeConfig` is the only place these numbers live. The transformer asks
//! it for granularities, the assembler asks it whether values fit.

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::types::{MAX_TO_YEAR, MAX_UNTIL_YEAR, MIN_YEAR};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Narrow tables for memory-constrained runtimes.
    Basic,
    #[default]
    Extended,
    /// Second-accurate tables.
    Complete,
}

/// Encoding of a year field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum YearWidth {
    /// Signed byte relative to `base`; sentinels take the extreme codes.
    Tiny { base: i32 },
    /// Signed 16-bit absolute year.
    Short,
}

impl YearWidth {
    pub fn encode(&self, year: i32) -> Option<i64> {
        match *self {
            YearWidth::Tiny { base } => match year {
                MIN_YEAR => Some(-127),
                MAX_TO_YEAR => Some(126),
                MAX_UNTIL_YEAR => Some(127),
                _ => {
                    let code = year as i64 - base as i64;
                    (-127 < code && code < 126).then_some(code)
                }
            },
            YearWidth::Short => i16::try_from(year).ok().map(i64::from),
        }
    }
}

/// Granularity and encoded range of a time-like field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldWidth {
    /// Seconds per encoded unit.
    pub granularity: i32,
    pub min: i64,
    pub max: i64,
}

impl FieldWidth {
    const fn new(granularity: i32, min: i64, max: i64) -> Self {
        Self { granularity, min, max }
    }

    /// Truncate toward zero to a multiple of the granularity.
    pub fn truncate(&self, seconds: i32) -> i32 {
        (seconds / self.granularity) * self.granularity
    }

    pub fn encode(&self, seconds: i32) -> Option<i64> {
        let code = seconds as i64 / self.granularity as i64;
        (self.min..=self.max).contains(&code).then_some(code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeConfig {
    pub scope: Scope,
    pub years: YearWidth,
    pub std_offset: FieldWidth,
    /// AT and UNTIL times.
    pub time: FieldWidth,
    pub save: FieldWidth,
    /// Runtime cannot handle non-wall UNTIL, two transitions per month,
    /// Jan 1 transitions or multi-character letters.
    pub simple_rules: bool,
}

pub const TINY_YEAR_BASE: i32 = 2100;

const MINUTE_OFFSET: FieldWidth = FieldWidth::new(60, -1905, 1905);
const MINUTE_TIME: FieldWidth = FieldWidth::new(60, 0, 3825);
const QUARTER_SAVE: FieldWidth = FieldWidth::new(900, -4, 11);

impl ScopeConfig {
    pub fn for_scope(scope: Scope) -> Self {
        match scope {
            Scope::Basic => Self {
                scope,
                years: YearWidth::Tiny { base: TINY_YEAR_BASE },
                std_offset: MINUTE_OFFSET,
                time: MINUTE_TIME,
                save: QUARTER_SAVE,
                simple_rules: true,
            },
            Scope::Extended => Self {
                scope,
                years: YearWidth::Short,
                std_offset: MINUTE_OFFSET,
                time: MINUTE_TIME,
                save: QUARTER_SAVE,
                simple_rules: false,
            },
            Scope::Complete => Self {
                scope,
                years: YearWidth::Short,
                std_offset: FieldWidth::new(1, i32::MIN as i64, i32::MAX as i64),
                time: FieldWidth::new(1, i32::MIN as i64, i32::MAX as i64),
                save: FieldWidth::new(1, i16::MIN as i64, i16::MAX as i64),
                simple_rules: false,
            },
        }
    }
}
