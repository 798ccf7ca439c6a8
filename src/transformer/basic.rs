//! Restrictions of the `basic` scope, whose runtime only understands simple
//! zones: wall-clock UNTIL, one transition per month, no Jan 1 transitions
//! and single-character letters.

use super::Transformer;
use crate::types::{DaySpec, Policies, TimeSuffix, ZoneRule, Zones};

impl Transformer {
    pub(super) fn apply_basic_zone_limits(&mut self, zones: Zones) -> Zones {
        if !self.config.simple_rules {
            return zones;
        }
        let mut out = Zones::new();
        for (name, eras) in zones {
            let bad = eras.iter().find(|era| !era.until.is_open() && era.until.suffix != TimeSuffix::Wall);
            match bad {
                Some(era) => {
                    let reason = format!("UNTIL suffix '{}' is not supported in basic scope", era.until.suffix.marker());
                    self.remove_zone(&name, reason);
                }
                None => {
                    out.insert(name, eras);
                }
            }
        }
        out
    }

    pub(super) fn apply_basic_policy_limits(&mut self, policies: Policies) -> Policies {
        if !self.config.simple_rules {
            return policies;
        }
        let mut out = Policies::new();
        for (name, rules) in policies {
            match basic_violation(&rules) {
                Some(reason) => self.remove_policy(&name, reason),
                None => {
                    out.insert(name, rules);
                }
            }
        }
        out
    }
}

fn basic_violation(rules: &[ZoneRule]) -> Option<String> {
    let rules: Vec<&ZoneRule> = rules.iter().filter(|r| !r.anchor).collect();

    for (i, a) in rules.iter().enumerate() {
        if a.letter.chars().count() > 1 {
            return Some(format!("LETTER '{}' is longer than one character", a.letter));
        }
        if a.in_month == 1 && matches!(a.on, DaySpec::Day(1) | DaySpec::OnOrAfter(_, 1)) {
            return Some(format!("transition on Jan {} crosses the year border", a.on));
        }
        let clash = rules[i + 1..]
            .iter()
            .find(|b| b.in_month == a.in_month && a.from_year <= b.to_year && b.from_year <= a.to_year);
        if let Some(b) = clash {
            return Some(format!(
                "two transitions in month {} ({}..{} and {}..{})",
                a.in_month, a.from_year, a.to_year, b.from_year, b.to_year
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::tests::{ROUND_TRIP, options, run};
    use crate::scope::Scope;

    #[test]
    fn round_trip_is_basic_compatible() {
        let db = run(ROUND_TRIP, &options(2020, 2023, Scope::Basic)).unwrap();
        assert!(db.zones.contains_key("Z"));
        assert_eq!(db.policies["P"].len(), 3);
    }

    #[test]
    fn standard_until_is_rejected_only_in_basic() {
        let text = "Zone Z 1:00 - CET 2021 Mar 1 2:00s\n\t2:00 - EET\n";
        let db = run(text, &options(2020, 2023, Scope::Basic)).unwrap();
        assert!(db.zones.is_empty());
        assert!(db.comments.removed_zones["Z"].iter().any(|r| r.contains("'s'")));

        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        assert!(db.zones.contains_key("Z"));
    }

    #[test]
    fn two_rules_in_one_month_remove_policy_and_zone() {
        let text = "\
Rule R 2020 max - Apr 1 2:00 1:00 D
Rule R 2020 max - Apr 20 2:00 0 S
Zone Z 1:00 R CE%sT
";
        let db = run(text, &options(2020, 2023, Scope::Basic)).unwrap();
        assert!(db.policies.is_empty());
        assert!(db.comments.removed_policies["R"].iter().any(|r| r.contains("month 4")));
        assert!(db.comments.removed_zones.contains_key("Z"));
    }

    #[test]
    fn january_first_and_long_letters_are_rejected() {
        let jan = "Rule R 2020 max - Jan 1 0:00 1:00 D\nRule R 2020 max - Jun 1 0:00 0 S\nZone Z 1:00 R CE%sT\n";
        let db = run(jan, &options(2020, 2023, Scope::Basic)).unwrap();
        assert!(db.comments.removed_policies["R"].iter().any(|r| r.contains("Jan")));

        let long = "Rule R 2020 max - Apr 1 0:00 1:00 DST\nRule R 2020 max - Oct 1 0:00 0 -\nZone Z 1:00 R CE%sT\n";
        let db = run(long, &options(2020, 2023, Scope::Basic)).unwrap();
        assert!(db.comments.removed_policies["R"].iter().any(|r| r.contains("LETTER")));
        assert!(run(long, &options(2020, 2023, Scope::Extended)).unwrap().policies.contains_key("R"));
    }
}
