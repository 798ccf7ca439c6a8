//! Extractor: tzdb source text -> raw policies, zones and links.
//!
//! The extractor is a structural parser only. It checks that every record
//! matches the line grammar and turns fields into typed values, but it does
//! not look across records: a zone may reference a policy that appears later
//! in the same file, in another file, or nowhere at all. Cross-checks happen
//! in the transformer.
//!
//! ```text
//! Rule  US   2007 max  -  Mar Sun>=8  2:00  1:00 D      -> RawRule
//! Zone  America/New_York  -4:56:02 - LMT 1883 Nov 18 12:03:58
//!                         -5:00    US  E%sT           -> RawEra x2
//! Link  America/New_York  US/Eastern                    -> Links
//! ```
//!
//! Lines are processed with a small state machine: a Zone line (or
//! continuation) that carries an UNTIL leaves the zone *open*, and the next
//! non-comment line must be a whitespace-led continuation. Comment and blank
//! lines may appear anywhere, including between continuations.

#[path = "extractor/fields.rs"]
mod fields;

pub(crate) use fields::hms as parse_hms;

use log::{debug, info};

use crate::error::{ParseError, ParseErrorKind};
use crate::types::{Links, RawPolicies, RawZones, SourceLine};

/// Output of the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDatabase {
    pub policies: RawPolicies,
    pub zones: RawZones,
    pub links: Links,
    pub stats: ExtractStats,
}

/// Counts gathered while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub lines: usize,
    pub rules: usize,
    pub zones: usize,
    pub eras: usize,
    pub links: usize,
    /// Recognized records the compiler has no use for (`Leap`, `Expires`).
    pub ignored: usize,
}

/// Incremental extractor; feed it any number of files, then [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct Extractor {
    db: RawDatabase,
}

enum Keyword {
    Rule,
    Zone,
    Link,
    Ignored,
}

fn keyword(token: &str) -> Option<Keyword> {
    match token.to_ascii_lowercase().as_str() {
        "rule" | "r" => Some(Keyword::Rule),
        "zone" | "z" => Some(Keyword::Zone),
        "link" | "l" => Some(Keyword::Link),
        "leap" | "expires" => Some(Keyword::Ignored),
        _ => None,
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one source file. Records accumulate across calls.
    pub fn parse_file(&mut self, file: &str, text: &str) -> Result<(), ParseError> {
        let mut open_zone: Option<String> = None;
        let mut last_line = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            last_line = line;
            self.db.stats.lines += 1;

            let content = raw.split('#').next().unwrap_or("").trim_end();
            if content.trim_start().is_empty() {
                continue;
            }
            let err = |kind| ParseError { file: file.to_string(), line, kind };
            let source = || SourceLine { file: file.to_string(), line, text: raw.trim_end().to_string() };
            let tokens: Vec<&str> = content.split_whitespace().collect();

            if content.starts_with(char::is_whitespace) {
                let Some(zone) = open_zone.take() else {
                    return Err(err(ParseErrorKind::OrphanContinuation));
                };
                let era = fields::era(&tokens, "continuation", source()).map_err(err)?;
                if era.until.is_some() {
                    open_zone = Some(zone.clone());
                }
                self.push_era(&zone, era);
                continue;
            }

            if let Some(zone) = open_zone.take() {
                return Err(err(ParseErrorKind::UnterminatedZone(zone)));
            }

            match keyword(tokens[0]) {
                Some(Keyword::Rule) => {
                    if tokens.len() != 10 {
                        return Err(err(ParseErrorKind::FieldCount { record: "Rule", found: tokens.len() }));
                    }
                    let rule = fields::rule(&tokens[2..], source()).map_err(err)?;
                    self.db.policies.entry(tokens[1].to_string()).or_default().push(rule);
                    self.db.stats.rules += 1;
                }
                Some(Keyword::Zone) => {
                    if tokens.len() < 2 {
                        return Err(err(ParseErrorKind::FieldCount { record: "Zone", found: tokens.len() }));
                    }
                    let name = tokens[1].to_string();
                    if self.db.zones.contains_key(&name) {
                        return Err(err(ParseErrorKind::DuplicateZone(name)));
                    }
                    let era = fields::era(&tokens[2..], "Zone", source()).map_err(err)?;
                    if era.until.is_some() {
                        open_zone = Some(name.clone());
                    }
                    self.db.stats.zones += 1;
                    self.push_era(&name, era);
                }
                Some(Keyword::Link) => {
                    let &[_, target, alias] = tokens.as_slice() else {
                        return Err(err(ParseErrorKind::FieldCount { record: "Link", found: tokens.len() }));
                    };
                    if self.db.links.insert(alias.to_string(), target.to_string()).is_some() {
                        return Err(err(ParseErrorKind::DuplicateLink(alias.to_string())));
                    }
                    self.db.stats.links += 1;
                }
                Some(Keyword::Ignored) => {
                    debug!("{file}:{line}: ignoring '{}' record", tokens[0]);
                    self.db.stats.ignored += 1;
                }
                None => return Err(err(ParseErrorKind::UnknownKeyword(tokens[0].to_string()))),
            }
        }

        if let Some(zone) = open_zone {
            return Err(ParseError { file: file.to_string(), line: last_line, kind: ParseErrorKind::UnterminatedZone(zone) });
        }
        self.db.stats.files += 1;
        Ok(())
    }

    fn push_era(&mut self, zone: &str, era: crate::types::RawEra) {
        self.db.zones.entry(zone.to_string()).or_default().push(era);
        self.db.stats.eras += 1;
    }

    pub fn finish(self) -> RawDatabase {
        let s = &self.db.stats;
        info!(
            "extracted {} rules in {} policies, {} zones with {} eras, {} links ({} lines, {} ignored)",
            s.rules,
            self.db.policies.len(),
            s.zones,
            s.eras,
            s.links,
            s.lines,
            s.ignored
        );
        self.db
    }
}

/// Parse a single in-memory source.
pub fn parse(text: &str) -> Result<RawDatabase, ParseError> {
    let mut extractor = Extractor::new();
    extractor.parse_file("<input>", text)?;
    Ok(extractor.finish())
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;
    use crate::types::{DaySpec, MAX_TO_YEAR, TimeSuffix};

    const SAMPLE: &str = "\
# Rule  NAME FROM TO   -  IN  ON      AT    SAVE LETTER
Rule    US   2007 max  -  Mar Sun>=8  2:00  1:00 D
Rule    US   2007 max  -  Nov Sun>=1  2:00  0    S

Zone America/New_York  -4:56:02 -   LMT  1883 Nov 18 12:03:58
                        # comments between continuations are fine
                        -5:00   US  E%sT
Link America/New_York US/Eastern
";

    #[test]
    fn parses_rules_zones_and_links() {
        let db = parse(SAMPLE).unwrap();

        let us = &db.policies["US"];
        assert_eq!(us.len(), 2);
        assert_eq!(us[0].from_year, 2007);
        assert_eq!(us[0].to_year, MAX_TO_YEAR);
        assert_eq!(us[0].in_month, 3);
        assert_eq!(us[0].on, DaySpec::OnOrAfter(Weekday::Sun, 8));
        assert_eq!(us[0].at_seconds, 7200);
        assert_eq!(us[0].save_seconds, 3600);
        assert_eq!(us[1].letter, "S");
        assert_eq!(us[1].source.line, 3);

        let eras = &db.zones["America/New_York"];
        assert_eq!(eras.len(), 2);
        assert_eq!(eras[0].std_offset_seconds, -(4 * 3600 + 56 * 60 + 2));
        let until = eras[0].until.unwrap();
        assert_eq!((until.year, until.month, until.day), (1883, 11, DaySpec::Day(18)));
        assert_eq!(until.seconds, 12 * 3600 + 3 * 60 + 58);
        assert_eq!(until.suffix, TimeSuffix::Wall);
        assert_eq!(eras[1].rules, "US");
        assert!(eras[1].until.is_none());

        assert_eq!(db.links["US/Eastern"], "America/New_York");
        assert_eq!(db.stats.eras, 2);
    }

    #[test]
    fn rules_may_follow_the_zones_that_use_them() {
        let text = "Zone Z 1:00 P CE%sT\nRule P 2020 only - Mar lastSun 2:00 1:00 S\n";
        let db = parse(text).unwrap();
        assert_eq!(db.zones["Z"][0].rules, "P");
        assert_eq!(db.policies["P"].len(), 1);
    }

    #[test]
    fn abbreviated_keywords_are_accepted() {
        let db = parse("R P 2020 o - Mar lastSun 2 1 S\nZ Z 1 P CE%sT\nL Z Y\n").unwrap();
        assert_eq!(db.policies["P"][0].to_year, 2020);
        assert_eq!(db.links["Y"], "Z");
    }

    #[test]
    fn malformed_field_reports_position() {
        let text = "# header\nRule P 2020 only - Mar lastSun 2:00x 1:00 S\n";
        let err = parse(text).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.file, "<input>");
        assert!(matches!(err.kind, ParseErrorKind::InvalidSuffix(_)));
        assert_eq!(err.to_string(), "<input>:2: invalid time suffix in '2:00x'");
    }

    #[test]
    fn wrong_field_count_is_fatal() {
        let err = parse("Rule P 2020 only - Mar lastSun 2:00 1:00\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::FieldCount { record: "Rule", found: 9 });
        let err = parse("Link A\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::FieldCount { record: "Link", found: 2 });
    }

    #[test]
    fn continuation_without_zone_is_fatal() {
        let err = parse("\t-5:00 US E%sT\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::OrphanContinuation);
    }

    #[test]
    fn zone_with_dangling_until_is_fatal() {
        let err = parse("Zone Z 1:00 - CET 1990\nLink Z Y\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ParseErrorKind::UnterminatedZone("Z".into()));

        let err = parse("Zone Z 1:00 - CET 1990\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn duplicates_are_fatal() {
        let err = parse("Zone Z 1:00 - CET\nZone Z 2:00 - EET\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateZone("Z".into()));
        let err = parse("Link A B\nLink C B\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateLink("B".into()));
    }

    #[test]
    fn unknown_keyword_is_fatal_but_leap_lines_are_ignored() {
        let db = parse("Leap 2016 Dec 31 23:59:60 + S\nExpires 2025 Jun 28 00:00:00\n").unwrap();
        assert_eq!(db.stats.ignored, 2);
        let err = parse("Zoon Z 1:00 - CET\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownKeyword("Zoon".into()));
    }

    #[test]
    fn multiple_files_accumulate() {
        let mut ex = Extractor::new();
        ex.parse_file("europe", "Rule EU 1981 max - Mar lastSun 1:00u 1:00 S\n").unwrap();
        ex.parse_file("backward", "Link Europe/Paris Europe/Monaco\n").unwrap();
        let err = ex.parse_file("broken", "Zone X 1:00 - CET 1990 Foo\n").unwrap_err();
        assert_eq!(err.file, "broken");
        let db = ex.finish();
        assert_eq!(db.stats.files, 2);
        assert_eq!(db.policies["EU"][0].at_suffix, TimeSuffix::Utc);
        assert_eq!(db.links.len(), 1);
    }
}
