//! Per-zone transition replay.

use chrono::{Datelike, NaiveDate};
use log::trace;

use super::BufferSize;
use crate::calendar;
use crate::error::EstimateError;
use crate::types::{DstRef, Policies, TimeSuffix, ZoneEra, ZoneRule};

const DAY: i64 = 86_400;
/// Local dates may sit this far from the UTC year they fall in.
const YEAR_SLACK: i64 = 2 * DAY;

/// Where a candidate came from. Era starts order before rules, rules by
/// their index within the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    EraStart(usize),
    Rule(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate<'a> {
    /// UTC seconds.
    instant: i64,
    /// Empty for eras without a policy.
    policy: &'a str,
    origin: Origin,
    save: i32,
}

impl<'a> Candidate<'a> {
    /// Total order used to pick one winner among same-instant candidates.
    fn tie_key(&self) -> (&'a str, Origin) {
        (self.policy, self.origin)
    }
}

/// An era with its policy resolved and its UTC validity interval.
struct EraSpan<'a> {
    era: &'a ZoneEra,
    policy: Option<(&'a str, &'a [ZoneRule])>,
    /// `[start, until)` in UTC seconds.
    start: i64,
    until: i64,
    /// Local (date, seconds) of `start`, i.e. the previous era's UNTIL.
    start_local: Option<(NaiveDate, i32)>,
}

impl<'a> EraSpan<'a> {
    fn policy_name(&self) -> &'a str {
        self.policy.map_or("", |(name, _)| name)
    }

    fn contains(&self, instant: i64) -> bool {
        self.start <= instant && instant < self.until
    }
}

/// A rule occurrence before it is converted to UTC.
struct Pending<'s, 'a> {
    span_idx: usize,
    span: &'s EraSpan<'a>,
    index: usize,
    rule: &'a ZoneRule,
    local: i64,
}

pub(super) struct ZoneSimulator<'a> {
    zone: &'a str,
    spans: Vec<EraSpan<'a>>,
}

impl<'a> ZoneSimulator<'a> {
    pub(super) fn new(zone: &'a str, eras: &'a [ZoneEra], policies: &'a Policies) -> Result<Self, EstimateError> {
        let mut sim = Self { zone, spans: Vec::with_capacity(eras.len()) };
        let mut start = i64::MIN;
        let mut start_local = None;

        for era in eras {
            let policy = match era.dst.policy() {
                None => None,
                Some(name) => {
                    let (name, rules) = policies.get_key_value(name).ok_or_else(|| EstimateError::UnknownPolicy {
                        zone: zone.to_string(),
                        policy: name.to_string(),
                    })?;
                    if rules.is_empty() {
                        return Err(EstimateError::EmptyPolicy { zone: zone.to_string(), policy: name.clone() });
                    }
                    Some((name.as_str(), rules.as_slice()))
                }
            };

            let mut span = EraSpan { era, policy, start, until: i64::MAX, start_local };
            if !era.until.is_open() {
                let u = era.until;
                let date = NaiveDate::from_ymd_opt(u.year, u.month, u.day)
                    .ok_or_else(|| EstimateError::NoActiveEra { zone: zone.to_string(), year: u.year })?;
                let save = match u.suffix {
                    TimeSuffix::Wall => sim.save_before(&span, (date, u.seconds))?,
                    _ => 0,
                };
                span.until = calendar::epoch_seconds(date, u.seconds) - utc_offset(u.suffix, era.std_offset_seconds, save);
                start = span.until;
                start_local = Some((date, u.seconds));
            }
            sim.spans.push(span);
        }
        Ok(sim)
    }

    /// Simulate `[start_year - 1, until_year + 1)` and return the peak.
    pub(super) fn run(&self, start_year: i32, until_year: i32) -> Result<BufferSize, EstimateError> {
        let (Some(first), Some(last)) = (start_year.checked_sub(1), until_year.checked_add(1)) else {
            return Err(EstimateError::WindowOutOfRange { start: start_year, until: until_year });
        };
        let mut carried = self.initial_save(first)?;
        let mut peak = BufferSize { max: 0, year: first };

        for year in first..last {
            let need = self.simulate_year(year, &mut carried)?;
            if need > peak.max {
                peak = BufferSize { max: need, year };
            }
        }
        trace!("zone {}: peak {} in {}", self.zone, peak.max, peak.year);
        Ok(peak)
    }

    /// SAVE in effect at the first moment of `year`.
    fn initial_save(&self, year: i32) -> Result<i32, EstimateError> {
        let jan1 = jan1(year).ok_or_else(|| self.no_active_era(year))?;
        let instant = calendar::epoch_seconds(jan1, 0);
        let span = self.spans.iter().find(|s| s.contains(instant)).ok_or_else(|| self.no_active_era(year))?;
        self.save_before(span, (jan1, 1))
    }

    /// Working-set size needed for `year`; updates the carried SAVE.
    fn simulate_year(&self, year: i32, carried: &mut i32) -> Result<usize, EstimateError> {
        let (Some(begin), Some(end)) = (jan1(year), jan1(year + 1)) else {
            return Err(self.no_active_era(year));
        };
        let (begin, end) = (calendar::epoch_seconds(begin, 0), calendar::epoch_seconds(end, 0));

        let active: Vec<(usize, &EraSpan<'a>)> = self
            .spans
            .iter()
            .enumerate()
            .filter(|(_, s)| s.start < end + YEAR_SLACK && begin - YEAR_SLACK < s.until)
            .collect();
        if active.is_empty() {
            return Err(self.no_active_era(year));
        }

        let mut candidates = Vec::new();
        let mut pending = Vec::new();
        // SAVE at the start of each span that begins during this year.
        let mut start_saves = vec![None; self.spans.len()];
        for &(idx, span) in &active {
            if let Some(local) = span.start_local.filter(|_| begin <= span.start && span.start < end) {
                let save = self.save_before(span, (local.0, local.1 + 1))?;
                start_saves[idx] = Some(save);
                candidates.push(Candidate { instant: span.start, policy: span.policy_name(), origin: Origin::EraStart(idx), save });
            }
            let Some((name, rules)) = span.policy else { continue };
            for (index, rule) in rules.iter().enumerate().filter(|(_, r)| r.covers(year)) {
                let date = calendar::occurrence(year, rule.in_month, rule.on)
                    .ok_or_else(|| EstimateError::InvalidRuleDate { policy: name.to_string(), year })?;
                pending.push(Pending { span_idx: idx, span, index, rule, local: calendar::epoch_seconds(date, rule.at_seconds) });
            }
        }

        // Provisional order on standard time, then convert with a running SAVE
        // that restarts from the era-start SAVE when a new span begins.
        pending.sort_by_key(|p| p.local - p.span.era.std_offset_seconds as i64);
        let mut save = *carried;
        let mut current_span = None;
        for p in pending {
            if current_span != Some(p.span_idx) {
                current_span = Some(p.span_idx);
                if let Some(start_save) = start_saves[p.span_idx] {
                    save = start_save;
                }
            }
            let instant = p.local - utc_offset(p.rule.at_suffix, p.span.era.std_offset_seconds, save);
            if !p.span.contains(instant) {
                continue;
            }
            save = p.rule.save_seconds;
            candidates.push(Candidate {
                instant,
                policy: p.span.policy_name(),
                origin: Origin::Rule(p.index),
                save: p.rule.save_seconds,
            });
        }
        candidates.sort_by_key(|c| c.instant);

        // Every candidate is held before same-instant ties collapse.
        let need = candidates.len().max(1);
        for group in candidates.chunk_by(|a, b| a.instant == b.instant) {
            let Some(winner) = group.iter().min_by_key(|c| c.tie_key()) else { continue };
            if group.len() > 1 {
                trace!("zone {}: {} candidates at {}, kept {:?}", self.zone, group.len(), winner.instant, winner.tie_key());
            }
            *carried = winner.save;
        }
        Ok(need)
    }

    /// SAVE of the span's DST reference strictly before local `bound`.
    fn save_before(&self, span: &EraSpan<'_>, bound: (NaiveDate, i32)) -> Result<i32, EstimateError> {
        match (&span.era.dst, span.policy) {
            (DstRef::Fixed(amount), _) => Ok(*amount),
            (DstRef::Policy(_), Some((name, rules))) => {
                latest_rule(rules, bound).map(|r| r.save_seconds).ok_or_else(|| EstimateError::NoPriorRule {
                    zone: self.zone.to_string(),
                    policy: name.to_string(),
                    year: bound.0.year(),
                })
            }
            _ => Ok(0),
        }
    }

    fn no_active_era(&self, year: i32) -> EstimateError {
        EstimateError::NoActiveEra { zone: self.zone.to_string(), year }
    }
}

/// Latest rule occurrence whose local (date, AT) is before `bound`.
fn latest_rule(rules: &[ZoneRule], bound: (NaiveDate, i32)) -> Option<&ZoneRule> {
    let year = bound.0.year();
    rules
        .iter()
        .filter_map(|rule| {
            // The occurrence in the bound's own year may still lie after it.
            let last = rule.to_year.min(year);
            (last - 1..=last)
                .rev()
                .filter(|y| *y >= rule.from_year)
                .filter_map(|y| calendar::occurrence(y, rule.in_month, rule.on))
                .map(|date| (date, rule.at_seconds))
                .find(|key| *key < bound)
                .map(|key| (key, rule))
        })
        .max_by_key(|(key, _)| *key)
        .map(|(_, rule)| rule)
}

fn utc_offset(suffix: TimeSuffix, std_offset: i32, save: i32) -> i64 {
    match suffix {
        TimeSuffix::Wall => (std_offset + save) as i64,
        TimeSuffix::Standard => std_offset as i64,
        TimeSuffix::Utc => 0,
    }
}

fn jan1(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}
