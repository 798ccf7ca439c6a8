//! Transformer: raw records -> validated, normalized, truncated database.
//!
//! The transformer is a fixed sequence of passes. Each pass either raises a
//! fatal [`ValidationError`] or narrows the data, recording *why* something
//! was dropped (`removed_*`) or flagged (`notable_*`) in [`Comments`].
//!
//! ```text
//! RawDatabase
//!   │ window check, link chains                    (names.rs)
//!   │ include-list filter
//!   │ dangling references, duplicate names/hashes  (names.rs)
//!   │ era truncation to [start-1, until+1]         (eras.rs)
//!   │ era normalization: DST ref, UNTIL, STDOFF    (eras.rs)
//!   │ rule normalization: AT, SAVE, LETTER         (rules.rs)
//!   │ rule selection + anchor rule                 (rules.rs, anchor.rs)
//!   │ basic-scope restrictions                     (basic.rs)
//!   │ dangling-reference pruning, unused policies
//!   │ notable anomalies                            (notable.rs)
//!   │ policy comments merged into zones            (commenter.rs)
//!   v
//! ValidatedDatabase
//! ```
//!
//! ## Invariants on the output
//!
//! - Every era's policy reference names a policy in `policies`.
//! - Every link targets a zone in `zones`, never another link.
//! - Every policy starts with exactly one anchor rule at `MIN_YEAR` and is
//!   sorted by `from_year`.
//! - Each zone's UNTIL instants increase strictly and its last era is open.
//!
//! Time fields are truncated to the scope granularity here, so the estimator
//! sees exactly what the runtime tables will encode.

#[path = "transformer/anchor.rs"]
mod anchor;
#[path = "transformer/basic.rs"]
mod basic;
#[path = "transformer/commenter.rs"]
mod commenter;
#[path = "transformer/eras.rs"]
mod eras;
#[path = "transformer/names.rs"]
mod names;
#[path = "transformer/notable.rs"]
mod notable;
#[path = "transformer/rules.rs"]
mod rules;

use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;

use crate::error::ValidationError;
use crate::extractor::RawDatabase;
use crate::scope::{FieldWidth, Scope, ScopeConfig};
use crate::types::{
    Comments, Links, MAX_TO_YEAR, MAX_UNTIL_YEAR, MIN_YEAR, Policies, RawPolicies, RawZones, Zones, add_comment,
    hms_string,
};

pub use names::{hash_name, normalize_name};

// --- Options and output ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// First year the output must be accurate for.
    pub start_year: i32,
    /// First year past the accurate range (exclusive).
    pub until_year: i32,
    pub scope: Scope,
    /// Remove entities whose times do not sit on the scope granularity
    /// instead of truncating them.
    pub strict: bool,
    /// Restrict output to these zone and link names.
    pub include: Option<BTreeSet<String>>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self { start_year: 2000, until_year: 2100, scope: Scope::default(), strict: false, include: None }
    }
}

bitflags::bitflags! {
    /// Which ends of the year window cut off source data.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Truncation: u8 {
        const LOWER = 1 << 0;
        const UPPER = 1 << 1;
    }
}

/// Smallest and largest real years seen (sentinels excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearSpan {
    pub min: i32,
    pub max: i32,
}

impl YearSpan {
    const EMPTY: YearSpan = YearSpan { min: MAX_TO_YEAR, max: MIN_YEAR };

    fn include(&mut self, year: i32) {
        if year == MIN_YEAR || year == MAX_TO_YEAR || year == MAX_UNTIL_YEAR {
            return;
        }
        self.min = self.min.min(year);
        self.max = self.max.max(year);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDatabase {
    pub zones: Zones,
    pub policies: Policies,
    pub links: Links,
    pub comments: Comments,
    pub start_year: i32,
    pub until_year: i32,
    pub scope: ScopeConfig,
    pub strict: bool,
    pub truncation: Truncation,
    /// Years present in the source before truncation.
    pub original_years: YearSpan,
    /// Years present in the output (anchors excluded).
    pub generated_years: YearSpan,
}

impl ValidatedDatabase {
    /// Earliest year whose transitions are faithful to the source.
    pub fn start_year_accurate(&self) -> i32 {
        if self.truncation.contains(Truncation::LOWER) { self.start_year } else { MIN_YEAR }
    }

    /// Year from which transitions are no longer faithful (exclusive bound).
    pub fn until_year_accurate(&self) -> i32 {
        if self.truncation.contains(Truncation::UPPER) { self.until_year } else { MAX_UNTIL_YEAR }
    }
}

/// Run every transformer pass over `raw`.
pub fn transform(raw: RawDatabase, options: &TransformOptions) -> Result<ValidatedDatabase, ValidationError> {
    Transformer::new(options.clone()).run(raw)
}

// --- Transformer -------------------------------------------------------------

pub(crate) struct Transformer {
    options: TransformOptions,
    config: ScopeConfig,
    comments: Comments,
    truncation: Truncation,
}

impl Transformer {
    pub(crate) fn new(options: TransformOptions) -> Self {
        let config = ScopeConfig::for_scope(options.scope);
        Self { options, config, comments: Comments::default(), truncation: Truncation::empty() }
    }

    pub(crate) fn run(mut self, raw: RawDatabase) -> Result<ValidatedDatabase, ValidationError> {
        let (start, until) = (self.options.start_year, self.options.until_year);
        if start >= until {
            return Err(ValidationError::EmptyWindow { start, until });
        }
        if start <= MIN_YEAR || until > MAX_TO_YEAR {
            return Err(ValidationError::WindowOutOfRange { start, until, min: MIN_YEAR, max: MAX_TO_YEAR });
        }

        names::check_links_to_links(&raw.links)?;
        let (zones, links) = self.filter_include(raw.zones, raw.links);
        names::check_references(&zones, &raw.policies, &links)?;
        names::check_duplicates(&zones, &links)?;
        let original_years = detect_raw_years(&zones, &raw.policies);
        let raw_zone_policies = commenter::raw_zone_policies(&zones);

        let zones = self.truncate_eras(zones);
        let zones = self.normalize_eras(zones);
        let mut zones = self.apply_basic_zone_limits(zones);
        let mut links = links;

        let policies = self.normalize_policies(raw.policies, &zones);
        self.prune_dangling(&mut zones, &policies, &mut links);
        let policies = self.select_rules(policies, &zones);
        let policies = self.apply_basic_policy_limits(policies);
        self.prune_dangling(&mut zones, &policies, &mut links);
        let policies = self.drop_unused_policies(policies, &zones);

        self.note_anomalies(&zones, &policies);
        self.merge_comments(&zones, &raw_zone_policies);
        let generated_years = detect_years(&zones, &policies);

        info!(
            "transformed into {} zones, {} policies, {} links (removed {} zones, {} policies, {} links)",
            zones.len(),
            policies.len(),
            links.len(),
            self.comments.removed_zones.len(),
            self.comments.removed_policies.len(),
            self.comments.removed_links.len()
        );

        Ok(ValidatedDatabase {
            zones,
            policies,
            links,
            comments: self.comments,
            start_year: start,
            until_year: until,
            scope: self.config,
            strict: self.options.strict,
            truncation: self.truncation,
            original_years,
            generated_years,
        })
    }

    fn filter_include(&mut self, zones: RawZones, links: Links) -> (RawZones, Links) {
        let Some(include) = self.options.include.clone() else {
            return (zones, links);
        };
        let mut kept_zones = RawZones::new();
        for (name, eras) in zones {
            if include.contains(&name) {
                kept_zones.insert(name, eras);
            } else {
                self.remove_zone(&name, "not in the include list");
            }
        }
        let mut kept_links = Links::new();
        for (name, target) in links {
            if !include.contains(&name) {
                self.remove_link(&name, "not in the include list");
            } else if !kept_zones.contains_key(&target) && self.comments.removed_zones.contains_key(&target) {
                self.remove_link(&name, format!("target zone '{target}' is not in the include list"));
            } else {
                kept_links.insert(name, target);
            }
        }
        (kept_zones, kept_links)
    }

    /// Remove zones whose policy vanished and links whose zone vanished.
    fn prune_dangling(&mut self, zones: &mut Zones, policies: &Policies, links: &mut Links) {
        let dangling: Vec<(String, String)> = zones
            .iter()
            .filter_map(|(name, eras)| {
                let missing = eras.iter().filter_map(|e| e.dst.policy()).find(|p| !policies.contains_key(*p))?;
                Some((name.clone(), missing.to_string()))
            })
            .collect();
        for (name, policy) in dangling {
            zones.remove(&name);
            self.remove_zone(&name, format!("policy '{policy}' was removed"));
        }

        let orphans: Vec<(String, String)> =
            links.iter().filter(|(_, target)| !zones.contains_key(*target)).map(|(n, t)| (n.clone(), t.clone())).collect();
        for (name, target) in orphans {
            links.remove(&name);
            self.remove_link(&name, format!("target zone '{target}' was removed"));
        }
    }

    fn drop_unused_policies(&mut self, mut policies: Policies, zones: &Zones) -> Policies {
        let used = referenced_policies(zones);
        let unused: Vec<String> = policies.keys().filter(|name| !used.contains(name.as_str())).cloned().collect();
        for name in unused {
            policies.remove(&name);
            self.remove_policy(&name, "unused");
        }
        policies
    }

    // --- Comment helpers ---------------------------------------------------

    fn remove_zone(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("removed zone {name}: {reason}");
        add_comment(&mut self.comments.removed_zones, name, reason);
    }

    fn remove_policy(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("removed policy {name}: {reason}");
        add_comment(&mut self.comments.removed_policies, name, reason);
    }

    fn remove_link(&mut self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        debug!("removed link {name}: {reason}");
        add_comment(&mut self.comments.removed_links, name, reason);
    }

    fn note_zone(&mut self, name: &str, note: Option<String>) {
        if let Some(note) = note {
            debug!("notable zone {name}: {note}");
            add_comment(&mut self.comments.notable_zones, name, note);
        }
    }

    fn note_policy(&mut self, name: &str, note: Option<String>) {
        if let Some(note) = note {
            debug!("notable policy {name}: {note}");
            add_comment(&mut self.comments.notable_policies, name, note);
        }
    }
}

// --- Shared helpers ----------------------------------------------------------

/// A RULES token that is a fixed amount such as `1:00` or `-0:30`.
fn is_fixed_token(token: &str) -> bool {
    token.strip_prefix('-').unwrap_or(token).starts_with(|c: char| c.is_ascii_digit())
}

/// A RULES token that names a policy.
fn is_policy_token(token: &str) -> bool {
    token != "-" && !is_fixed_token(token)
}

fn referenced_policies(zones: &Zones) -> BTreeSet<&str> {
    zones.values().flatten().filter_map(|era| era.dst.policy()).collect()
}

/// Snap `value` onto the granularity of `width`.
///
/// Returns the value plus an optional note when it had to be truncated; in
/// strict mode truncation is refused and the reason comes back as `Err`.
fn fit(width: FieldWidth, strict: bool, value: i32, field: &str) -> Result<(i32, Option<String>), String> {
    let truncated = width.truncate(value);
    if truncated == value {
        return Ok((value, None));
    }
    let message = format!("{field} {} not a multiple of {}s", hms_string(value), width.granularity);
    if strict {
        return Err(message);
    }
    Ok((truncated, Some(format!("{message}, truncated to {}", hms_string(truncated)))))
}

fn detect_raw_years(zones: &RawZones, policies: &RawPolicies) -> YearSpan {
    let mut span = YearSpan::EMPTY;
    zones.values().flatten().for_each(|era| span.include(era.until_year()));
    for rule in policies.values().flatten() {
        span.include(rule.from_year);
        span.include(rule.to_year);
    }
    span
}

fn detect_years(zones: &Zones, policies: &Policies) -> YearSpan {
    let mut span = YearSpan::EMPTY;
    zones.values().flatten().for_each(|era| span.include(era.until.year));
    for rule in policies.values().flatten().filter(|r| !r.anchor) {
        span.include(rule.from_year);
        span.include(rule.to_year);
    }
    span
}
