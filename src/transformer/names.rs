//! Name-level validation: link chains, dangling references, and collisions
//! between normalized names or name hashes.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::types::{Links, RawPolicies, RawZones};

/// Map a zone or link name onto an identifier-safe form.
///
/// `+` becomes `_PLUS_` so that `Etc/GMT+1` and `Etc/GMT-1` stay distinct;
/// every other character outside `[A-Za-z0-9_]` becomes `_`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '+' => out.push_str("_PLUS_"),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => out.push('_'),
        }
    }
    out
}

/// 32-bit djb2 hash; runtimes use it as the stable zone/link id.
pub fn hash_name(name: &str) -> u32 {
    name.bytes().fold(5381u32, |hash, b| hash.wrapping_mul(33).wrapping_add(b as u32))
}

pub(super) fn check_links_to_links(links: &Links) -> Result<(), ValidationError> {
    for (link, target) in links {
        if links.contains_key(target) {
            return Err(ValidationError::LinkToLink { link: link.clone(), target: target.clone() });
        }
    }
    Ok(())
}

pub(super) fn check_references(zones: &RawZones, policies: &RawPolicies, links: &Links) -> Result<(), ValidationError> {
    for (link, target) in links {
        if !zones.contains_key(target) {
            return Err(ValidationError::UnknownZone { link: link.clone(), target: target.clone() });
        }
    }
    for (zone, eras) in zones {
        for era in eras {
            if super::is_policy_token(&era.rules) && !policies.contains_key(&era.rules) {
                return Err(ValidationError::UnknownPolicy { zone: zone.clone(), policy: era.rules.clone() });
            }
        }
    }
    Ok(())
}

/// Zones and links share one namespace, both normalized and hashed.
pub(super) fn check_duplicates(zones: &RawZones, links: &Links) -> Result<(), ValidationError> {
    let mut normalized: BTreeMap<String, &str> = BTreeMap::new();
    let mut hashes: BTreeMap<u32, &str> = BTreeMap::new();

    for name in zones.keys().chain(links.keys()) {
        let norm = normalize_name(name);
        if let Some(existing) = normalized.insert(norm.clone(), name) {
            return Err(ValidationError::DuplicateName {
                name: name.clone(),
                existing: existing.to_string(),
                normalized: norm,
            });
        }
        let hash = hash_name(name);
        if let Some(existing) = hashes.insert(hash, name) {
            return Err(ValidationError::HashCollision { name: name.clone(), existing: existing.to_string(), hash });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_keeps_plus_distinct() {
        assert_eq!(normalize_name("America/Port-au-Prince"), "America_Port_au_Prince");
        assert_eq!(normalize_name("Etc/GMT+1"), "Etc_GMT_PLUS_1");
        assert_eq!(normalize_name("Etc/GMT-1"), "Etc_GMT_1");
        assert_eq!(normalize_name("Etc/GMT-0"), normalize_name("Etc/GMT_0"));
    }

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(hash_name(""), 5381);
        assert_eq!(hash_name("a"), 5381 * 33 + 97);
        // Stable across runs and platforms.
        assert_eq!(hash_name("America/Los_Angeles"), hash_name("America/Los_Angeles"));
        assert_ne!(hash_name("Europe/Paris"), hash_name("Europe/Pariz"));
    }

    #[test]
    fn link_chain_is_rejected() {
        let links: Links = [("A".to_string(), "B".to_string()), ("B".to_string(), "C".to_string())].into();
        assert_eq!(
            check_links_to_links(&links),
            Err(ValidationError::LinkToLink { link: "A".into(), target: "B".into() })
        );
    }
}
