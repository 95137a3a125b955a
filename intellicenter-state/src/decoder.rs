//! Notification decoder - converts object parameter deltas to typed field changes
//!
//! This module decodes the `(objnam, params)` entries of a controller
//! notification into [`FieldChange`]s that can be applied to the
//! [`SnapshotStore`](crate::SnapshotStore). Only parameters present in the
//! entry produce changes; unknown parameters are ignored.

use intellicenter_api::{keys, ObjectEntry};

use crate::model::{Body, Role};

/// Heat-source value reported while no heater is engaged
pub const DEFAULT_HEATER_OFF_VALUE: &str = "00000";

/// Controller-specific decoding rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Heat-source value that means "heater off"; anything else means on
    pub heater_off_value: String,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            heater_off_value: DEFAULT_HEATER_OFF_VALUE.to_string(),
        }
    }
}

/// A single field change
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Orp(i64),
    PhVal(f64),
    PhTank(i64),
    Saturation(f64),
    SetPoint(Body, i64),
    HeaterStatus(Body, bool),
    BodyStatus(Body, bool),
    Temperature(Body, i64),
    Salt(i64),
    FreezeMode(bool),
    CircuitStatus(String, bool),
}

/// Decode one entry already classified as `role`
pub fn decode_entry(entry: &ObjectEntry, role: &Role, options: &DecoderOptions) -> Vec<FieldChange> {
    match role {
        Role::Chemistry => decode_chemistry(entry),
        Role::Body(body) => decode_body(entry, *body, options),
        Role::Chlorinator => entry
            .text(keys::SALT)
            .and_then(parse_leading_int)
            .map(FieldChange::Salt)
            .into_iter()
            .collect(),
        Role::Freeze => status_of(entry)
            .map(|status| FieldChange::FreezeMode(is_on(status)))
            .into_iter()
            .collect(),
        Role::Circuit => status_of(entry)
            .map(|status| FieldChange::CircuitStatus(entry.objnam.clone(), is_on(status)))
            .into_iter()
            .collect(),
        Role::Untracked => vec![],
    }
}

fn decode_chemistry(entry: &ObjectEntry) -> Vec<FieldChange> {
    let mut changes = vec![];

    if let Some(orp) = entry.text(keys::ORPVAL).and_then(parse_leading_int) {
        changes.push(FieldChange::Orp(orp));
    }
    if let Some(ph) = entry.text(keys::PHVAL).and_then(parse_leading_float) {
        changes.push(FieldChange::PhVal(ph));
    }
    if let Some(tank) = entry.text(keys::PHTNK).and_then(parse_leading_int) {
        changes.push(FieldChange::PhTank(tank));
    }
    if let Some(saturation) = entry.text(keys::QUALTY).and_then(parse_leading_float) {
        changes.push(FieldChange::Saturation(saturation));
    }

    changes
}

fn decode_body(entry: &ObjectEntry, body: Body, options: &DecoderOptions) -> Vec<FieldChange> {
    let mut changes = vec![];

    if let Some(setpoint) = entry.text(keys::LOTMP).and_then(parse_leading_int) {
        changes.push(FieldChange::SetPoint(body, setpoint));
    }

    // Heat source: the off sentinel is firmware-dependent
    if let Some(source) = entry.text(keys::HTSRC).filter(|s| !s.is_empty()) {
        changes.push(FieldChange::HeaterStatus(
            body,
            source != options.heater_off_value,
        ));
    }

    if let Some(status) = status_of(entry) {
        changes.push(FieldChange::BodyStatus(body, is_on(status)));
    }

    if let Some(temperature) = entry.text(keys::LSTTMP).and_then(parse_leading_int) {
        changes.push(FieldChange::Temperature(body, temperature));
    }

    changes
}

/// Run status, if reported
fn status_of(entry: &ObjectEntry) -> Option<&str> {
    entry.text(keys::STATUS).filter(|s| !s.is_empty())
}

fn is_on(status: &str) -> bool {
    status == "ON"
}

/// The `[+-]?digits` prefix of `value`, empty when there are no digits
fn int_prefix(value: &str) -> &str {
    let bytes = value.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        ""
    } else {
        &value[..end]
    }
}

/// Parse the leading integer of `value` (`"80.6"` -> 80, `"12abc"` -> 12)
pub fn parse_leading_int(value: &str) -> Option<i64> {
    let prefix = int_prefix(value.trim_start());
    if prefix.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

/// Parse the leading decimal number of `value` (`"7.4abc"` -> 7.4, `".5"` -> 0.5)
pub fn parse_leading_float(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let bytes = value.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut fraction_end = end + 1;
        while fraction_end < bytes.len() && bytes[fraction_end].is_ascii_digit() {
            fraction_end += 1;
            digits += 1;
        }
        end = fraction_end;
    }
    if digits == 0 {
        return None;
    }

    // exponent only counts when it has digits
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let exponent = int_prefix(&value[end + 1..]);
        if !exponent.is_empty() {
            end += 1 + exponent.len();
        }
    }

    value[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("80", Some(80))]
    #[case("80.6", Some(80))]
    #[case("12abc", Some(12))]
    #[case("  -4", Some(-4))]
    #[case("+7", Some(7))]
    #[case("", None)]
    #[case("abc", None)]
    #[case("-", None)]
    fn test_parse_leading_int(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_leading_int(input), expected);
    }

    #[rstest]
    #[case("7.4", Some(7.4))]
    #[case("7.4abc", Some(7.4))]
    #[case(".5", Some(0.5))]
    #[case("-0.12", Some(-0.12))]
    #[case("3.", Some(3.0))]
    #[case("1e2", Some(100.0))]
    #[case("2e", Some(2.0))]
    #[case("", None)]
    #[case(".", None)]
    #[case("n/a", None)]
    fn test_parse_leading_float(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_leading_float(input), expected);
    }

    #[test]
    fn test_decode_chemistry() {
        let entry = ObjectEntry::new("CHM01")
            .with(keys::ORPVAL, "650")
            .with(keys::PHVAL, "7.3")
            .with(keys::PHTNK, "4")
            .with(keys::QUALTY, "-0.2");

        let changes = decode_entry(&entry, &Role::Chemistry, &DecoderOptions::default());
        assert_eq!(
            changes,
            vec![
                FieldChange::Orp(650),
                FieldChange::PhVal(7.3),
                FieldChange::PhTank(4),
                FieldChange::Saturation(-0.2),
            ]
        );
    }

    #[test]
    fn test_decode_body() {
        let entry = ObjectEntry::new("B1202")
            .with(keys::LOTMP, "101")
            .with(keys::HTSRC, "H0001")
            .with(keys::STATUS, "OFF")
            .with(keys::LSTTMP, "98");

        let changes = decode_entry(&entry, &Role::Body(Body::Spa), &DecoderOptions::default());
        assert_eq!(
            changes,
            vec![
                FieldChange::SetPoint(Body::Spa, 101),
                FieldChange::HeaterStatus(Body::Spa, true),
                FieldChange::BodyStatus(Body::Spa, false),
                FieldChange::Temperature(Body::Spa, 98),
            ]
        );
    }

    #[test]
    fn test_heater_off_sentinel_is_configurable() {
        let entry = ObjectEntry::new("B1101").with(keys::HTSRC, "00000");
        let changes = decode_entry(&entry, &Role::Body(Body::Pool), &DecoderOptions::default());
        assert_eq!(changes, vec![FieldChange::HeaterStatus(Body::Pool, false)]);

        let options = DecoderOptions {
            heater_off_value: "OFF".to_string(),
        };
        let changes = decode_entry(&entry, &Role::Body(Body::Pool), &options);
        assert_eq!(changes, vec![FieldChange::HeaterStatus(Body::Pool, true)]);
    }

    #[test]
    fn test_decode_ignores_unknown_and_unparseable() {
        let entry = ObjectEntry::new("CHR01")
            .with(keys::SALT, "")
            .with("SUPER", "ON");
        assert!(decode_entry(&entry, &Role::Chlorinator, &DecoderOptions::default()).is_empty());

        let entry = ObjectEntry::new("B1101").with(keys::LSTTMP, "--");
        assert!(decode_entry(&entry, &Role::Body(Body::Pool), &DecoderOptions::default()).is_empty());
    }

    #[test]
    fn test_decode_circuit_and_freeze() {
        let entry = ObjectEntry::new("C0001").with(keys::STATUS, "ON");
        assert_eq!(
            decode_entry(&entry, &Role::Circuit, &DecoderOptions::default()),
            vec![FieldChange::CircuitStatus("C0001".to_string(), true)]
        );

        let entry = ObjectEntry::new("X0044").with(keys::STATUS, "OFF");
        assert_eq!(
            decode_entry(&entry, &Role::Freeze, &DecoderOptions::default()),
            vec![FieldChange::FreezeMode(false)]
        );
    }

    #[test]
    fn test_untracked_decodes_nothing() {
        let entry = ObjectEntry::new("Z9").with(keys::STATUS, "ON");
        assert!(decode_entry(&entry, &Role::Untracked, &DecoderOptions::default()).is_empty());
    }
}
