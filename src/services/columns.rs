//! Column normalization: raw spreadsheet headers to canonical field keys

use std::collections::HashMap;

use tracing::debug;

use crate::types::FieldKey;

/// Resolve one raw header to its canonical field key.
///
/// Headers are lowercased and stripped of all whitespace before lookup, so
/// `"Company Name"`, `"companyName"` and `"COMPANY NAME"` all resolve the
/// same way. Unknown headers resolve to `None`.
pub fn canonical_key(header: &str) -> Option<FieldKey> {
    let normalized: String = header
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    match normalized.as_str() {
        "companyname" | "clientname" | "name" => Some(FieldKey::Name),
        "address" => Some(FieldKey::Address),
        "addressalignment" => Some(FieldKey::AddressAlignment),
        "country" => Some(FieldKey::Country),
        "isostandard" | "standard" => Some(FieldKey::IsoStandard),
        "scope" => Some(FieldKey::Scope),
        "channelpartner" => Some(FieldKey::ChannelPartner),
        "type" => Some(FieldKey::ClientType),
        "size" => Some(FieldKey::Size),
        "accreditation" => Some(FieldKey::Accreditation),
        "logo" => Some(FieldKey::Logo),
        "certificatenumber" | "certificateno" | "certno" | "certnumber" => {
            Some(FieldKey::CertificateNumber)
        }
        "originalissuedate" | "originaldate" => Some(FieldKey::OriginalIssueDate),
        "issuedate" => Some(FieldKey::IssueDate),
        "surveillanceexpirydate" | "surveillanceexpiry" | "surveillance/expirydate" => {
            Some(FieldKey::SurveillanceExpiryDate)
        }
        "recertificationdate" | "recertdate" => Some(FieldKey::RecertificationDate),
        "initialregistrationdate" => Some(FieldKey::InitialRegistrationDate),
        "surveillanceduedate" => Some(FieldKey::SurveillanceDueDate),
        "expirydate" => Some(FieldKey::ExpiryDate),
        "revision" => Some(FieldKey::Revision),
        "extraline" => Some(FieldKey::ExtraLine),
        _ => None,
    }
}

/// Map a header row to canonical field keys.
///
/// Unrecognized headers are dropped silently; the fields they would have fed
/// simply stay at their defaults downstream.
pub fn normalize_headers(headers: &[String]) -> HashMap<String, FieldKey> {
    let mut mapping = HashMap::with_capacity(headers.len());
    for header in headers {
        match canonical_key(header) {
            Some(key) => {
                mapping.insert(header.clone(), key);
            }
            None => {
                debug!("Ignoring unrecognized column '{}'", header);
            }
        }
    }
    mapping
}
