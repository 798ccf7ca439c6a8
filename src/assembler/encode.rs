//! Range checks of encoded fields against the selected scope.

use crate::error::EncodingRangeError;
use crate::scope::{FieldWidth, ScopeConfig};

/// Encodes fields of one entity, naming it in any error.
pub(super) struct FieldEncoder<'a> {
    config: &'a ScopeConfig,
    entity: String,
}

impl<'a> FieldEncoder<'a> {
    pub(super) fn zone(config: &'a ScopeConfig, name: &str) -> Self {
        Self { config, entity: format!("zone '{name}'") }
    }

    pub(super) fn policy(config: &'a ScopeConfig, name: &str) -> Self {
        Self { config, entity: format!("policy '{name}'") }
    }

    pub(super) fn year(&self, field: &'static str, year: i32) -> Result<i64, EncodingRangeError> {
        self.config.years.encode(year).ok_or_else(|| self.error(field, year as i64))
    }

    pub(super) fn std_offset(&self, field: &'static str, seconds: i32) -> Result<i64, EncodingRangeError> {
        self.width(self.config.std_offset, field, seconds)
    }

    pub(super) fn time(&self, field: &'static str, seconds: i32) -> Result<i64, EncodingRangeError> {
        self.width(self.config.time, field, seconds)
    }

    pub(super) fn save(&self, field: &'static str, seconds: i32) -> Result<i64, EncodingRangeError> {
        self.width(self.config.save, field, seconds)
    }

    fn width(&self, width: FieldWidth, field: &'static str, seconds: i32) -> Result<i64, EncodingRangeError> {
        width.encode(seconds).ok_or_else(|| self.error(field, seconds as i64))
    }

    fn error(&self, field: &'static str, value: i64) -> EncodingRangeError {
        EncodingRangeError { entity: self.entity.clone(), field, value, scope: self.config.scope }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    #[test]
    fn errors_name_entity_field_and_scope() {
        let basic = ScopeConfig::for_scope(Scope::Basic);
        let enc = FieldEncoder::policy(&basic, "US");
        assert_eq!(enc.year("from_year", 2000), Ok(-100));
        let err = enc.year("from_year", 1918).unwrap_err();
        assert_eq!(err.to_string(), "policy 'US': from_year value 1918 does not fit the basic scope");
    }

    #[test]
    fn time_codes_are_in_granularity_units() {
        let extended = ScopeConfig::for_scope(Scope::Extended);
        let enc = FieldEncoder::zone(&extended, "Z");
        assert_eq!(enc.time("until_time", 7200), Ok(120));
        assert_eq!(enc.std_offset("std_offset", -5 * 3600), Ok(-300));
        assert!(enc.time("until_time", -60).is_err());
        assert_eq!(enc.save("save", 1800), Ok(2));

        let complete = ScopeConfig::for_scope(Scope::Complete);
        assert_eq!(FieldEncoder::zone(&complete, "Z").time("until_time", 7201), Ok(7201));
    }
}
