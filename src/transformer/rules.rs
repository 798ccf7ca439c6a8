//! Rule passes: normalization, then selection of the rules a window needs.
//!
//! Selection is coarse. A rule is kept when its year range
//! overlaps an era's year range, or when it is among the last rules before
//! (or first rules after) that range. Comparing (year, month) instead of the
//! exact transition instant may keep a few extra rules, never too few.

use std::collections::{BTreeMap, BTreeSet};

use super::{Transformer, Truncation, anchor, fit, referenced_policies};
use crate::calendar;
use crate::types::{DaySpec, MAX_TO_YEAR, Policies, RawPolicies, RawRule, ZoneRule, Zones};

impl Transformer {
    /// Normalize every referenced policy; unreferenced ones are dropped here.
    pub(super) fn normalize_policies(&mut self, policies: RawPolicies, zones: &Zones) -> Policies {
        let used = referenced_policies(zones);
        let mut out = Policies::new();

        'policies: for (name, rules) in policies {
            if !used.contains(name.as_str()) {
                self.remove_policy(&name, "unused");
                continue;
            }
            let mut normalized = Vec::with_capacity(rules.len());
            for rule in &rules {
                match self.normalize_rule(&name, rule) {
                    Ok(rule) => normalized.push(rule),
                    Err(reason) => {
                        self.remove_policy(&name, reason);
                        continue 'policies;
                    }
                }
            }
            out.insert(name, normalized);
        }
        out
    }

    fn normalize_rule(&mut self, policy: &str, rule: &RawRule) -> Result<ZoneRule, String> {
        let strict = self.options.strict;
        let cfg = self.config;

        if calendar::may_leave_year(rule.in_month, rule.on) {
            return Err(format!("ON '{}' in month {} can fall in another year", rule.on, rule.in_month));
        }
        if let DaySpec::Day(day) = rule.on {
            if !exact_day_exists(rule.from_year, rule.to_year, rule.in_month, day) {
                return Err(format!("ON '{day}' does not exist in month {} of every year", rule.in_month));
            }
        }

        let (at_seconds, note) = fit(cfg.time, strict, rule.at_seconds, "AT")?;
        self.note_policy(policy, note);
        let (save_seconds, note) = fit(cfg.save, strict, rule.save_seconds, "SAVE")?;
        self.note_policy(policy, note);

        Ok(ZoneRule {
            from_year: rule.from_year,
            to_year: rule.to_year,
            in_month: rule.in_month,
            on: rule.on,
            at_seconds,
            at_suffix: rule.at_suffix,
            save_seconds,
            letter: if rule.letter == "-" { String::new() } else { rule.letter.clone() },
            anchor: false,
            raw_line: rule.source.text.replace('\t', "    "),
        })
    }

    /// Keep the rules each era needs and prepend the anchor rule.
    pub(super) fn select_rules(&mut self, policies: Policies, zones: &Zones) -> Policies {
        let (start, until) = (self.options.start_year, self.options.until_year);
        let mut used: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();

        for eras in zones.values() {
            let mut begin_year = start - 1;
            for era in eras {
                if let Some((name, rules)) = era.dst.policy().and_then(|p| policies.get_key_value(p)) {
                    let until_year = era.until.year.min(until);
                    let marks = used.entry(name.as_str()).or_default();
                    marks.extend(find_matching(rules, begin_year, until_year + 1));
                    marks.extend(find_latest_prior(rules, begin_year));
                    marks.extend(find_earliest_subsequent(rules, until_year + 1));
                }
                begin_year = era.until.year;
            }
        }

        let mut out = Policies::new();
        for (name, rules) in &policies {
            let Some(marks) = used.get(name.as_str()).filter(|m| !m.is_empty()) else {
                self.remove_policy(name, format!("no rules needed for [{start}, {until})"));
                continue;
            };

            for (idx, rule) in rules.iter().enumerate().filter(|(idx, _)| !marks.contains(idx)) {
                if rule.to_year < start {
                    self.truncation |= Truncation::LOWER;
                } else if rule.from_year >= until {
                    self.truncation |= Truncation::UPPER;
                }
                log::trace!("policy {name}: dropped rule #{idx} ({}..{})", rule.from_year, rule.to_year);
            }

            let mut kept = Vec::with_capacity(marks.len() + 1);
            kept.push(anchor::anchor_rule(rules, start - 1));
            kept.extend(marks.iter().map(|&idx| rules[idx].clone()));
            kept.sort_by_key(|r| r.from_year);
            out.insert(name.clone(), kept);
        }
        out
    }
}

/// `Day(n)` must exist in every year of `[from, to]`; only Feb 29 varies.
fn exact_day_exists(from: i32, to: i32, month: u32, day: u32) -> bool {
    if day <= 28 {
        return true;
    }
    // The Gregorian cycle repeats every 400 years.
    let last = to.min(from.saturating_add(399)).min(MAX_TO_YEAR);
    (from..=last).all(|year| day <= calendar::days_in_month(year, month))
}

/// Rules whose `[from, to]` overlaps `[era_from, era_until)`.
fn find_matching(rules: &[ZoneRule], era_from: i32, era_until: i32) -> Vec<usize> {
    rules.iter().enumerate().filter(|(_, r)| r.from_year < era_until && era_from <= r.to_year).map(|(i, _)| i).collect()
}

/// Rules sharing the latest (to_year, month) strictly before `year`.
fn find_latest_prior(rules: &[ZoneRule], year: i32) -> Vec<usize> {
    let best = rules.iter().filter(|r| r.to_year < year).map(|r| (r.to_year, r.in_month)).max();
    match best {
        Some(key) => rules.iter().enumerate().filter(|(_, r)| (r.to_year, r.in_month) == key).map(|(i, _)| i).collect(),
        None => Vec::new(),
    }
}

/// Rules sharing the earliest (to_year, month) on or after `year`.
fn find_earliest_subsequent(rules: &[ZoneRule], year: i32) -> Vec<usize> {
    let best = rules.iter().filter(|r| r.to_year >= year).map(|r| (r.to_year, r.in_month)).min();
    match best {
        Some(key) => rules.iter().enumerate().filter(|(_, r)| (r.to_year, r.in_month) == key).map(|(i, _)| i).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{options, run};
    use super::*;
    use crate::scope::Scope;
    use crate::types::{MIN_YEAR, TimeSuffix};

    fn rule(from: i32, to: i32, month: u32) -> ZoneRule {
        ZoneRule {
            from_year: from,
            to_year: to,
            in_month: month,
            on: DaySpec::Day(1),
            at_seconds: 0,
            at_suffix: TimeSuffix::Wall,
            save_seconds: 0,
            letter: String::new(),
            anchor: false,
            raw_line: String::new(),
        }
    }

    #[test]
    fn matching_uses_half_open_era_interval() {
        let rules = [rule(1990, 1999, 4), rule(2000, 2005, 4), rule(2010, MAX_TO_YEAR, 4)];
        assert_eq!(find_matching(&rules, 2000, 2010), vec![1]);
        assert_eq!(find_matching(&rules, 1999, 2011), vec![0, 1, 2]);
    }

    #[test]
    fn prior_and_subsequent_group_by_month() {
        let rules = [rule(1980, 1990, 3), rule(1980, 1990, 9), rule(1985, 1990, 9), rule(2030, 2040, 4)];
        assert_eq!(find_latest_prior(&rules, 2000), vec![1, 2]);
        assert_eq!(find_earliest_subsequent(&rules, 2000), vec![3]);
        assert!(find_latest_prior(&rules, 1980).is_empty());
    }

    #[test]
    fn feb_29_only_valid_in_leap_only_ranges() {
        assert!(exact_day_exists(2024, 2024, 2, 29));
        assert!(!exact_day_exists(2024, 2025, 2, 29));
        assert!(exact_day_exists(1900, MAX_TO_YEAR, 3, 31));
        assert!(!exact_day_exists(2000, 2000, 4, 31));
    }

    #[test]
    fn old_rules_are_dropped_but_latest_prior_survives() {
        let text = "\
Rule R 1950 1960 - Apr 1 2:00 1:00 D
Rule R 1950 1960 - Oct 1 2:00 0 S
Rule R 1990 only - May 1 2:00 1:00 D
Rule R 2020 max - Mar lastSun 2:00 1:00 D
Rule R 2020 max - Oct lastSun 2:00 0 S
Zone Z 1:00 R CE%sT
";
        let db = run(text, &options(2020, 2030, Scope::Extended)).unwrap();
        let rules = &db.policies["R"];
        assert_eq!(rules[0].from_year, MIN_YEAR);
        let years: Vec<(i32, i32)> = rules[1..].iter().map(|r| (r.from_year, r.to_year)).collect();
        assert_eq!(years, [(1990, 1990), (2020, MAX_TO_YEAR), (2020, MAX_TO_YEAR)]);
        assert!(db.truncation.contains(Truncation::LOWER));
        assert!(!db.truncation.contains(Truncation::UPPER));
    }

    #[test]
    fn dash_letter_becomes_empty() {
        let text = "Rule R 2020 only - Mar 1 2:00 1:00 -\nZone Z 1:00 R CE%sT\n";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        assert!(db.policies["R"].iter().all(|r| r.letter.is_empty()));
    }

    #[test]
    fn year_crossing_day_spec_removes_policy_and_zone() {
        let text = "Rule R 2020 max - Dec Sun>=27 0:00 1:00 D\nZone Z 1:00 R CE%sT\nLink Z Y\n";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        assert!(db.policies.is_empty());
        assert!(db.zones.is_empty());
        assert!(db.links.is_empty());
        assert!(db.comments.removed_zones["Z"].iter().any(|r| r.contains("policy 'R'")));
    }

    #[test]
    fn at_and_save_are_truncated_to_scope() {
        let text = "Rule R 2020 only - Mar 1 2:00:30 0:20 D\nZone Z 1:00 R CE%sT\n";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        let rule = db.policies["R"].iter().find(|r| !r.anchor).unwrap();
        assert_eq!(rule.at_seconds, 7200);
        assert_eq!(rule.save_seconds, 900);
        assert_eq!(db.comments.notable_policies["R"].len() >= 2, true);
    }
}
