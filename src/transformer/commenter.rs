//! Policy comments merged into the zones that reference the policy.

use std::collections::{BTreeMap, BTreeSet};

use super::{Transformer, is_policy_token};
use crate::types::{CommentsMap, MergedCommentsMap, RawZones, Zones};

/// Zone name -> names of the policies its eras reference.
pub(super) type ZonePolicies = BTreeMap<String, BTreeSet<String>>;

pub(super) fn raw_zone_policies(zones: &RawZones) -> ZonePolicies {
    zones
        .iter()
        .map(|(name, eras)| {
            let policies = eras.iter().filter(|era| is_policy_token(&era.rules)).map(|era| era.rules.clone()).collect();
            (name.clone(), policies)
        })
        .collect()
}

fn zone_policies(zones: &Zones) -> ZonePolicies {
    zones
        .iter()
        .map(|(name, eras)| {
            let policies = eras.iter().filter_map(|era| era.dst.policy()).map(str::to_string).collect();
            (name.clone(), policies)
        })
        .collect()
}

impl Transformer {
    /// Fill `merged_notable_zones` from the surviving zones and
    /// `merged_removed_zones` from the zones as they were read.
    pub(super) fn merge_comments(&mut self, zones: &Zones, raw: &ZonePolicies) {
        let kept = zone_policies(zones);
        let removed: ZonePolicies = raw
            .iter()
            .filter(|(name, _)| self.comments.removed_zones.contains_key(*name))
            .map(|(name, policies)| (name.clone(), policies.clone()))
            .collect();

        let comments = &mut self.comments;
        comments.merged_notable_zones = merge(&comments.notable_zones, &comments.notable_policies, &kept);
        comments.merged_removed_zones = merge(&comments.removed_zones, &comments.removed_policies, &removed);
    }
}

fn merge(zone_comments: &CommentsMap, policy_comments: &CommentsMap, zone_policies: &ZonePolicies) -> MergedCommentsMap {
    let mut merged = MergedCommentsMap::new();
    for (zone, reasons) in zone_comments {
        merged.entry(zone.clone()).or_default().reasons.extend(reasons.iter().cloned());
    }
    for (zone, policies) in zone_policies {
        let sub: CommentsMap = policies
            .iter()
            .filter_map(|policy| policy_comments.get(policy).map(|reasons| (policy.clone(), reasons.clone())))
            .collect();
        if !sub.is_empty() {
            merged.entry(zone.clone()).or_default().policies.extend(sub);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use crate::scope::Scope;
    use crate::transformer::tests::{options, run};

    #[test]
    fn policy_notes_reach_every_zone_using_the_policy() {
        let text = "\
Rule P 2020 2022 - Mar lastSun 2:00 0:30 D
Rule P 2020 2022 - Nov Sun>=1 2:00 0 S
Zone A 1:00 P E%sT
Zone B 1:00 P W%sT
Zone C 1:00 - CET
";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        let merged = &db.comments.merged_notable_zones;
        let policy_notes = &db.comments.notable_policies["P"];
        assert!(policy_notes.iter().any(|n| n.contains("SAVE 0:30")));
        assert_eq!(&merged["A"].policies["P"], policy_notes);
        assert_eq!(&merged["B"].policies["P"], policy_notes);
        assert!(!merged.contains_key("C"));
        assert_eq!(merged.keys().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[test]
    fn removed_zones_carry_the_reason_their_policy_went() {
        let text = "\
Rule Q 2020 2022 - Dec Sun>=26 2:00 1:00 D
Rule Q 2020 2022 - Jun 1 2:00 0 S
Zone Z 1:00 Q E%sT
Zone Y 1:00 - CET
";
        let db = run(text, &options(2020, 2023, Scope::Extended)).unwrap();
        let z = &db.comments.merged_removed_zones["Z"];
        assert!(z.reasons.iter().any(|r| r.contains("'Q'")));
        assert_eq!(z.policies["Q"], db.comments.removed_policies["Q"]);
        assert!(!db.comments.merged_removed_zones.contains_key("Y"));
    }
}
