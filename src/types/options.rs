//! Operator-facing generation options

use serde::{Deserialize, Serialize};

use super::record::FieldKey;

/// Which document profile a batch renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    /// Draft certificate, filename `<name>_<iso-number>_draft.pdf`.
    #[default]
    Draft,
    /// Soft copy, filename `<name>_SoftCopy_<standard>.pdf`.
    SoftCopy,
}

impl DocumentKind {
    /// Wire-format name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Draft => "draft",
            DocumentKind::SoftCopy => "softCopy",
        }
    }
}

/// Opt-in set for the optional document fields.
///
/// Core identity fields (name, address, scope, standard, size, accreditation,
/// logo, country, partner, type, alignment) are always included; the fields
/// below are included when selected or when the row carries a value anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    pub certificate_number: bool,
    pub original_issue_date: bool,
    pub issue_date: bool,
    pub surveillance_expiry_date: bool,
    pub recertification_date: bool,
    pub initial_registration_date: bool,
    pub surveillance_due_date: bool,
    pub expiry_date: bool,
    pub revision: bool,
    pub extra_line: bool,
}

impl FieldSelection {
    /// Documented defaults per document kind.
    pub fn for_kind(kind: DocumentKind) -> Self {
        let soft = matches!(kind, DocumentKind::SoftCopy);
        Self {
            certificate_number: true,
            original_issue_date: true,
            issue_date: true,
            surveillance_expiry_date: true,
            recertification_date: false,
            initial_registration_date: soft,
            surveillance_due_date: soft,
            expiry_date: soft,
            revision: false,
            extra_line: false,
        }
    }

    /// Whether an optional field key is selected. Non-optional keys are
    /// always on.
    pub fn includes(&self, key: FieldKey) -> bool {
        match key {
            FieldKey::CertificateNumber => self.certificate_number,
            FieldKey::OriginalIssueDate => self.original_issue_date,
            FieldKey::IssueDate => self.issue_date,
            FieldKey::SurveillanceExpiryDate => self.surveillance_expiry_date,
            FieldKey::RecertificationDate => self.recertification_date,
            FieldKey::InitialRegistrationDate => self.initial_registration_date,
            FieldKey::SurveillanceDueDate => self.surveillance_due_date,
            FieldKey::ExpiryDate => self.expiry_date,
            FieldKey::Revision => self.revision,
            FieldKey::ExtraLine => self.extra_line,
            _ => true,
        }
    }
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self::for_kind(DocumentKind::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_defaults_enable_core_dates_only() {
        let selection = FieldSelection::for_kind(DocumentKind::Draft);
        assert!(selection.certificate_number);
        assert!(selection.issue_date);
        assert!(selection.surveillance_expiry_date);
        assert!(!selection.initial_registration_date);
        assert!(!selection.expiry_date);
        assert!(!selection.revision);
    }

    #[test]
    fn test_soft_copy_defaults_enable_registration_dates() {
        let selection = FieldSelection::for_kind(DocumentKind::SoftCopy);
        assert!(selection.initial_registration_date);
        assert!(selection.surveillance_due_date);
        assert!(selection.expiry_date);
    }

    #[test]
    fn test_core_fields_always_included() {
        let selection = FieldSelection::for_kind(DocumentKind::Draft);
        assert!(selection.includes(FieldKey::Name));
        assert!(selection.includes(FieldKey::Logo));
        assert!(!selection.includes(FieldKey::ExtraLine));
    }

    #[test]
    fn test_document_kind_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&DocumentKind::SoftCopy).unwrap(),
            "\"softCopy\""
        );
        assert_eq!(
            serde_json::to_string(&DocumentKind::Draft).unwrap(),
            "\"draft\""
        );
    }
}
