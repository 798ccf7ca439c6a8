//! The anchor rule: a synthetic rule at `MIN_YEAR` carrying the DST state in
//! effect just before the window, so that a runtime always finds a prior rule.

use chrono::NaiveDate;

use crate::calendar;
use crate::types::{DaySpec, MIN_YEAR, TimeSuffix, ZoneRule};

/// Build the anchor for `rules`, as seen from the start of `boundary`.
///
/// The SAVE and LETTER come from the latest occurrence of any rule before
/// `boundary`. Without one, the policy is taken to start on standard time
/// and borrows the LETTER of its earliest SAVE=0 rule.
pub(super) fn anchor_rule(rules: &[ZoneRule], boundary: i32) -> ZoneRule {
    let template = latest_before(rules, boundary)
        .map(|rule| (rule.save_seconds, rule.letter.clone(), rule.raw_line.as_str()))
        .or_else(|| earliest_standard(rules).map(|rule| (0, rule.letter.clone(), rule.raw_line.as_str())));

    let (save_seconds, letter, source) = match template {
        Some(found) => found,
        None => (0, String::new(), rules.first().map_or("", |r| r.raw_line.as_str())),
    };

    ZoneRule {
        from_year: MIN_YEAR,
        to_year: MIN_YEAR,
        in_month: 1,
        on: DaySpec::Day(1),
        at_seconds: 0,
        at_suffix: TimeSuffix::Wall,
        save_seconds,
        letter,
        anchor: true,
        raw_line: format!("Anchor: {source}"),
    }
}

fn latest_before(rules: &[ZoneRule], boundary: i32) -> Option<&ZoneRule> {
    let mut best: Option<((NaiveDate, i32), &ZoneRule)> = None;
    for rule in rules.iter().filter(|r| !r.anchor && r.from_year < boundary) {
        let year = rule.to_year.min(boundary - 1);
        let Some(date) = calendar::occurrence(year, rule.in_month, rule.on) else {
            continue;
        };
        let key = (date, rule.at_seconds);
        if best.as_ref().is_none_or(|(best_key, _)| key > *best_key) {
            best = Some((key, rule));
        }
    }
    best.map(|(_, rule)| rule)
}

fn earliest_standard(rules: &[ZoneRule]) -> Option<&ZoneRule> {
    rules
        .iter()
        .filter(|r| !r.anchor && r.save_seconds == 0)
        .min_by_key(|r| (r.from_year, calendar::occurrence(r.from_year, r.in_month, r.on)))
}
