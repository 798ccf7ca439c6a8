//! Era passes: truncation to the year window, then normalization.

use chrono::Datelike;

use super::{Transformer, Truncation, fit, is_fixed_token};
use crate::calendar;
use crate::extractor::parse_hms;
use crate::types::{DstRef, RawEra, RawZones, Until, ZoneEra, Zones, add_comment};

impl Transformer {
    /// Keep eras that can affect `[start_year - 1, until_year + 1]`.
    ///
    /// Eras ending before `start_year - 1` are dropped, as are eras starting
    /// after `until_year + 1`. When the tail was cut, the last remaining era
    /// is extended to the far future so every zone still ends open.
    pub(super) fn truncate_eras(&mut self, zones: RawZones) -> RawZones {
        let (start, until) = (self.options.start_year, self.options.until_year);
        let mut out = RawZones::new();

        for (name, eras) in zones {
            let total = eras.len();
            let mut begin_year = None;
            let mut too_old = 0;
            let mut too_new = 0;
            let mut kept: Vec<RawEra> = Vec::with_capacity(total);

            for era in eras {
                let era_begin = begin_year;
                begin_year = Some(era.until_year());
                if era.until_year() < start - 1 {
                    too_old += 1;
                } else if era_begin.is_some_and(|y| y > until + 1) {
                    too_new += 1;
                } else {
                    kept.push(era);
                }
            }

            if too_old > 0 {
                self.truncation |= Truncation::LOWER;
            }
            if too_new > 0 {
                self.truncation |= Truncation::UPPER;
                if let Some(last) = kept.last_mut() {
                    last.until = None;
                }
            }

            if kept.is_empty() {
                self.remove_zone(&name, format!("all {total} eras fall outside [{start}, {until})"));
                continue;
            }
            if too_old > 0 {
                self.note_zone(&name, Some(format!("removed {too_old} eras before {start}")));
            }
            if too_new > 0 {
                self.note_zone(&name, Some(format!("removed {too_new} eras after {until}")));
            }
            out.insert(name, kept);
        }
        out
    }

    pub(super) fn normalize_eras(&mut self, zones: RawZones) -> Zones {
        let mut out = Zones::new();

        'zones: for (name, eras) in zones {
            let mut normalized = Vec::with_capacity(eras.len());
            for era in &eras {
                match self.normalize_era(&name, era) {
                    Ok(era) => normalized.push(era),
                    Err(reason) => {
                        self.remove_zone(&name, reason);
                        continue 'zones;
                    }
                }
            }

            if let Some(pair) = normalized.windows(2).find(|w| w[0].until.key() >= w[1].until.key()) {
                let (a, b) = (pair[0].until, pair[1].until);
                self.remove_zone(
                    &name,
                    format!("UNTIL {}-{:02}-{:02} does not follow {}-{:02}-{:02}", b.year, b.month, b.day, a.year, a.month, a.day),
                );
                continue;
            }
            out.insert(name, normalized);
        }
        out
    }

    fn normalize_era(&mut self, zone: &str, era: &RawEra) -> Result<ZoneEra, String> {
        let strict = self.options.strict;
        let cfg = self.config;

        let (std_offset_seconds, note) = fit(cfg.std_offset, strict, era.std_offset_seconds, "STDOFF")?;
        self.note_zone(zone, note);

        let dst = if era.rules == "-" {
            DstRef::None
        } else if is_fixed_token(&era.rules) {
            let amount = parse_hms(&era.rules).map_err(|e| format!("RULES: {e}"))?;
            let (amount, note) = fit(cfg.save, strict, amount, "RULES")?;
            self.note_zone(zone, note);
            if amount == 0 {
                self.note_zone(zone, Some("fixed RULES of 0:00".to_string()));
            }
            DstRef::Fixed(amount)
        } else {
            DstRef::Policy(era.rules.clone())
        };

        let has_letter_slot = era.format.contains("%s");
        match &dst {
            DstRef::Policy(policy) if !has_letter_slot && !era.format.contains('/') => {
                let note = format!("FORMAT '{}' ignores the LETTER of policy '{policy}'", era.format);
                add_comment(&mut self.comments.notable_zones, zone, note);
            }
            DstRef::None | DstRef::Fixed(_) if has_letter_slot => {
                return Err(format!("FORMAT '{}' has %s but RULES '{}' is not a policy", era.format, era.rules));
            }
            _ => {}
        }

        let until = match era.until {
            None => Until::OPEN,
            Some(raw) => {
                let date = calendar::occurrence(raw.year, raw.month, raw.day)
                    .ok_or_else(|| format!("UNTIL day '{}' does not exist in {}-{:02}", raw.day, raw.year, raw.month))?;
                if date.year() != raw.year {
                    return Err(format!("UNTIL '{} {} {}' leaves its year", raw.year, raw.month, raw.day));
                }
                let (seconds, note) = fit(cfg.time, strict, raw.seconds, "UNTIL time")?;
                self.note_zone(zone, note);
                Until { year: raw.year, month: date.month(), day: date.day(), seconds, suffix: raw.suffix }
            }
        };

        Ok(ZoneEra {
            std_offset_seconds,
            dst,
            format: era.format.clone(),
            until,
            raw_line: era.source.text.replace('\t', "    "),
        })
    }
}
