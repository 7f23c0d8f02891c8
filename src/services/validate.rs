//! Row validation: raw cells to a fully defaulted canonical record

use std::collections::HashMap;

use crate::defaults::{DEFAULT_CLIENT_TYPE, NOT_AVAILABLE};
use crate::services::sheet::{excel_serial_to_display, RawRow};
use crate::types::{CanonicalRecord, FieldKey};

/// Error recorded when the natural-key field is missing.
pub const REQUIRED_NAME_MESSAGE: &str = "Company Name/Client Name is required";

/// Validate one raw row against the column mapping.
///
/// Copies trimmed values for mapped headers, converts Excel date serials in
/// date fields to `dd/mm/yyyy`, enforces the required-name rule and backfills
/// every other field with its documented default. The returned record always
/// has every field set; `is_valid` is false only when the name is empty.
pub fn validate_row(row: &RawRow, mapping: &HashMap<String, FieldKey>) -> CanonicalRecord {
    let mut record = CanonicalRecord::default();

    for (header, key) in mapping {
        let Some(raw) = row.get(header) else {
            continue;
        };
        let mut value = raw.trim().to_string();
        if value.is_empty() {
            continue;
        }
        if key.is_date() {
            if let Some(display) = serial_to_display_date(&value) {
                value = display;
            }
        }
        record.set(*key, value);
    }

    if record.name.is_empty() {
        record.errors.push(REQUIRED_NAME_MESSAGE.to_string());
        record.is_valid = false;
    } else {
        record.is_valid = true;
    }

    apply_defaults(&mut record);
    record
}

/// Date cells sometimes survive parsing as bare serial numbers (e.g. a CSV
/// exported from a workbook). Convert those to display dates.
fn serial_to_display_date(value: &str) -> Option<String> {
    let serial: f64 = value.parse().ok()?;
    excel_serial_to_display(serial)
}

/// Backfill empty optional fields with their documented defaults.
fn apply_defaults(record: &mut CanonicalRecord) {
    for key in [
        FieldKey::Address,
        FieldKey::IsoStandard,
        FieldKey::Scope,
        FieldKey::ChannelPartner,
    ] {
        if record.get(key).is_empty() {
            record.set(key, NOT_AVAILABLE.to_string());
        }
    }
    if record.client_type.is_empty() {
        record.client_type = DEFAULT_CLIENT_TYPE.to_string();
    }
    // Remaining fields (size, accreditation, logo, dates, certificate
    // number, revision, country, extra line, alignment) default to "".
}
