//! Field-level parsers for the tzdb line grammar.
//!
//! Each parser takes one whitespace-delimited token and returns either the
//! typed value or the `ParseErrorKind` describing what was wrong; the caller
//! attaches the file/line position.

use chrono::Weekday;

use crate::error::ParseErrorKind;
use crate::types::{DaySpec, MAX_TO_YEAR, MIN_YEAR, RawEra, RawRule, RawUntil, SourceLine, TimeSuffix};

const MONTHS: [&str; 12] =
    ["january", "february", "march", "april", "may", "june", "july", "august", "september", "october", "november", "december"];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

// --- Scalars -----------------------------------------------------------------

pub(super) fn year(token: &str) -> Result<i32, ParseErrorKind> {
    match token.parse::<i32>() {
        Ok(y) if (MIN_YEAR..=MAX_TO_YEAR).contains(&y) => Ok(y),
        _ => Err(ParseErrorKind::InvalidYear(token.to_string())),
    }
}

/// Rule TO field: a year, `only`, or `max`.
pub(super) fn to_year(token: &str, from: i32) -> Result<i32, ParseErrorKind> {
    let lower = token.to_ascii_lowercase();
    let to = match lower.as_str() {
        "only" | "o" => from,
        "max" | "maximum" | "ma" => MAX_TO_YEAR,
        _ => year(token)?,
    };
    if to < from {
        return Err(ParseErrorKind::ReversedYears { from, to });
    }
    Ok(to)
}

/// Case-insensitive prefix of at least three letters ("Mar", "April").
pub(super) fn month(token: &str) -> Result<u32, ParseErrorKind> {
    let lower = token.to_ascii_lowercase();
    if lower.len() >= 3 {
        if let Some(idx) = MONTHS.iter().position(|m| m.starts_with(&lower)) {
            return Ok(idx as u32 + 1);
        }
    }
    Err(ParseErrorKind::InvalidMonth(token.to_string()))
}

fn weekday(token: &str) -> Option<Weekday> {
    let lower = token.to_ascii_lowercase();
    if lower.len() < 2 {
        return None;
    }
    let mut hits = WEEKDAYS.iter().filter(|(name, _)| name.starts_with(&lower));
    let (_, wd) = hits.next()?;
    // "T" or "S" alone would be ambiguous.
    if hits.next().is_some() {
        return None;
    }
    Some(*wd)
}

pub(super) fn day_spec(token: &str) -> Result<DaySpec, ParseErrorKind> {
    let invalid = || ParseErrorKind::InvalidDay(token.to_string());

    if let Some(caps) = regex!(r"^(\d{1,2})$").captures(token) {
        let day: u32 = caps[1].parse().map_err(|_| invalid())?;
        return if (1..=31).contains(&day) { Ok(DaySpec::Day(day)) } else { Err(invalid()) };
    }

    if let Some(caps) = regex!(r"^last([A-Za-z]+)$").captures(token) {
        return weekday(&caps[1]).map(DaySpec::Last).ok_or_else(invalid);
    }

    if let Some(caps) = regex!(r"^([A-Za-z]+)(>=|<=)(\d{1,2})$").captures(token) {
        let wd = weekday(&caps[1]).ok_or_else(invalid)?;
        let day: u32 = caps[3].parse().map_err(|_| invalid())?;
        if !(1..=31).contains(&day) {
            return Err(invalid());
        }
        return Ok(if &caps[2] == ">=" { DaySpec::OnOrAfter(wd, day) } else { DaySpec::OnOrBefore(wd, day) });
    }

    Err(invalid())
}

/// Signed `[-]h[:mm[:ss]]` to seconds. A lone `-` means zero.
pub(crate) fn hms(token: &str) -> Result<i32, ParseErrorKind> {
    if token == "-" {
        return Ok(0);
    }
    let caps = regex!(r"^(-)?(\d{1,3})(?::([0-5]\d))?(?::([0-5]\d))?$")
        .captures(token)
        .ok_or_else(|| ParseErrorKind::InvalidTime(token.to_string()))?;

    let part = |idx: usize| caps.get(idx).map_or(Ok(0), |m| m.as_str().parse::<i32>());
    let (h, m, s) = match (part(2), part(3), part(4)) {
        (Ok(h), Ok(m), Ok(s)) => (h, m, s),
        _ => return Err(ParseErrorKind::InvalidTime(token.to_string())),
    };
    let total = h * 3600 + m * 60 + s;
    Ok(if caps.get(1).is_some() { -total } else { total })
}

/// A time followed by an optional `w`/`s`/`u`/`g`/`z` frame letter.
pub(super) fn time_with_suffix(token: &str) -> Result<(i32, TimeSuffix), ParseErrorKind> {
    let caps = regex!(r"^(-?[0-9:]+)([A-Za-z]?)$")
        .captures(token)
        .ok_or_else(|| ParseErrorKind::InvalidTime(token.to_string()))?;
    let seconds = hms(&caps[1])?;
    let marker = caps[2].chars().next().map(|c| c.to_ascii_lowercase());
    let suffix = TimeSuffix::from_marker(marker).ok_or_else(|| ParseErrorKind::InvalidSuffix(token.to_string()))?;
    Ok((seconds, suffix))
}

/// SAVE field; a trailing `s` (standard) or `d` (daylight) marker is accepted
/// and dropped.
pub(super) fn save(token: &str) -> Result<i32, ParseErrorKind> {
    let trimmed = token.strip_suffix(|c: char| c == 's' || c == 'd').unwrap_or(token);
    hms(trimmed)
}

// --- Records -----------------------------------------------------------------

/// `Rule NAME FROM TO - IN ON AT SAVE LETTER/S`; `fields` starts at FROM.
pub(super) fn rule(fields: &[&str], source: SourceLine) -> Result<RawRule, ParseErrorKind> {
    let [from, to, _kind, in_month, on, at, save_token, letter] = fields else {
        return Err(ParseErrorKind::FieldCount { record: "Rule", found: fields.len() + 2 });
    };
    let from_year = year(from)?;
    let to_year = to_year(to, from_year)?;
    let (at_seconds, at_suffix) = time_with_suffix(at)?;
    Ok(RawRule {
        from_year,
        to_year,
        in_month: month(in_month)?,
        on: day_spec(on)?,
        at_seconds,
        at_suffix,
        save_seconds: save(save_token)?,
        letter: (*letter).to_string(),
        source,
    })
}

/// `STDOFF RULES FORMAT [UNTIL...]`, shared by Zone and continuation lines.
pub(super) fn era(fields: &[&str], record: &'static str, source: SourceLine) -> Result<RawEra, ParseErrorKind> {
    if !(3..=7).contains(&fields.len()) {
        let found = if record == "Zone" { fields.len() + 2 } else { fields.len() };
        return Err(ParseErrorKind::FieldCount { record, found });
    }
    let std_offset_seconds = hms(fields[0])?;
    let until = match &fields[3..] {
        [] => None,
        rest => Some(until(rest)?),
    };
    Ok(RawEra { std_offset_seconds, rules: fields[1].to_string(), format: fields[2].to_string(), until, source })
}

fn until(fields: &[&str]) -> Result<RawUntil, ParseErrorKind> {
    let year = year(fields[0])?;
    let month = fields.get(1).map_or(Ok(1), |m| month(m))?;
    let day = fields.get(2).map_or(Ok(DaySpec::Day(1)), |d| day_spec(d))?;
    let (seconds, suffix) = fields.get(3).map_or(Ok((0, TimeSuffix::Wall)), |t| time_with_suffix(t))?;
    Ok(RawUntil { year, month, day, seconds, suffix })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_accept_prefixes() {
        assert_eq!(month("Mar"), Ok(3));
        assert_eq!(month("april"), Ok(4));
        assert_eq!(month("SEPT"), Ok(9));
        assert!(month("Ma").is_err());
        assert!(month("Marc h").is_err());
    }

    #[test]
    fn day_specs_parse() {
        assert_eq!(day_spec("lastSun"), Ok(DaySpec::Last(Weekday::Sun)));
        assert_eq!(day_spec("Sun>=8"), Ok(DaySpec::OnOrAfter(Weekday::Sun, 8)));
        assert_eq!(day_spec("Fri<=1"), Ok(DaySpec::OnOrBefore(Weekday::Fri, 1)));
        assert_eq!(day_spec("lastThu"), Ok(DaySpec::Last(Weekday::Thu)));
        assert_eq!(day_spec("15"), Ok(DaySpec::Day(15)));
        assert!(day_spec("0").is_err());
        assert!(day_spec("32").is_err());
        assert!(day_spec("lastT").is_err());
        assert!(day_spec("Sun>8").is_err());
    }

    #[test]
    fn times_parse_with_sign_and_seconds() {
        assert_eq!(hms("2"), Ok(7200));
        assert_eq!(hms("2:00"), Ok(7200));
        assert_eq!(hms("-0:30"), Ok(-1800));
        assert_eq!(hms("-0:14:08"), Ok(-848));
        assert_eq!(hms("25:00"), Ok(90_000));
        assert_eq!(hms("-"), Ok(0));
        assert!(hms("1:60").is_err());
        assert!(hms("abc").is_err());
    }

    #[test]
    fn suffixes_are_recognized() {
        assert_eq!(time_with_suffix("2:00"), Ok((7200, TimeSuffix::Wall)));
        assert_eq!(time_with_suffix("2:00s"), Ok((7200, TimeSuffix::Standard)));
        assert_eq!(time_with_suffix("1:00u"), Ok((3600, TimeSuffix::Utc)));
        assert_eq!(time_with_suffix("0z"), Ok((0, TimeSuffix::Utc)));
        assert!(matches!(time_with_suffix("2:00x"), Err(ParseErrorKind::InvalidSuffix(_))));
    }

    #[test]
    fn to_year_keywords() {
        assert_eq!(to_year("only", 1990), Ok(1990));
        assert_eq!(to_year("max", 1990), Ok(MAX_TO_YEAR));
        assert_eq!(to_year("1995", 1990), Ok(1995));
        assert_eq!(to_year("1985", 1990), Err(ParseErrorKind::ReversedYears { from: 1990, to: 1985 }));
    }

    #[test]
    fn save_drops_dst_marker() {
        assert_eq!(save("1:00d"), Ok(3600));
        assert_eq!(save("0s"), Ok(0));
        assert_eq!(save("-1:00"), Ok(-3600));
    }
}
