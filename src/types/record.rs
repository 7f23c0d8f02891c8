//! Canonical row representation produced by column normalization + validation

use serde::{Deserialize, Serialize};

/// Canonical field keys a spreadsheet column can map to.
///
/// Every recognized header synonym resolves to exactly one of these; headers
/// that resolve to none are dropped before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    Name,
    Address,
    AddressAlignment,
    Country,
    IsoStandard,
    Scope,
    ChannelPartner,
    #[serde(rename = "type")]
    ClientType,
    Size,
    Accreditation,
    Logo,
    CertificateNumber,
    OriginalIssueDate,
    IssueDate,
    SurveillanceExpiryDate,
    RecertificationDate,
    InitialRegistrationDate,
    SurveillanceDueDate,
    ExpiryDate,
    Revision,
    ExtraLine,
}

impl FieldKey {
    pub const ALL: [FieldKey; 21] = [
        FieldKey::Name,
        FieldKey::Address,
        FieldKey::AddressAlignment,
        FieldKey::Country,
        FieldKey::IsoStandard,
        FieldKey::Scope,
        FieldKey::ChannelPartner,
        FieldKey::ClientType,
        FieldKey::Size,
        FieldKey::Accreditation,
        FieldKey::Logo,
        FieldKey::CertificateNumber,
        FieldKey::OriginalIssueDate,
        FieldKey::IssueDate,
        FieldKey::SurveillanceExpiryDate,
        FieldKey::RecertificationDate,
        FieldKey::InitialRegistrationDate,
        FieldKey::SurveillanceDueDate,
        FieldKey::ExpiryDate,
        FieldKey::Revision,
        FieldKey::ExtraLine,
    ];

    /// Display label the render service expects as a field-map key.
    pub fn display_label(&self) -> &'static str {
        match self {
            FieldKey::Name => "Company Name",
            FieldKey::Address => "Address",
            FieldKey::AddressAlignment => "Address alignment",
            FieldKey::Country => "Country",
            FieldKey::IsoStandard => "ISO Standard",
            FieldKey::Scope => "Scope",
            FieldKey::ChannelPartner => "Channel Partner",
            FieldKey::ClientType => "Type",
            FieldKey::Size => "Size",
            FieldKey::Accreditation => "Accreditation",
            FieldKey::Logo => "Logo",
            FieldKey::CertificateNumber => "Certificate Number",
            FieldKey::OriginalIssueDate => "Original Issue Date",
            FieldKey::IssueDate => "Issue Date",
            FieldKey::SurveillanceExpiryDate => "Surveillance/ Expiry Date",
            FieldKey::RecertificationDate => "Recertification Date",
            FieldKey::InitialRegistrationDate => "Initial Registration Date",
            FieldKey::SurveillanceDueDate => "Surveillance Due Date",
            FieldKey::ExpiryDate => "Expiry Date",
            FieldKey::Revision => "Revision",
            FieldKey::ExtraLine => "Extra Line",
        }
    }

    /// True for fields that hold display dates and take Excel serial
    /// conversion during validation.
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            FieldKey::OriginalIssueDate
                | FieldKey::IssueDate
                | FieldKey::SurveillanceExpiryDate
                | FieldKey::RecertificationDate
                | FieldKey::InitialRegistrationDate
                | FieldKey::SurveillanceDueDate
                | FieldKey::ExpiryDate
        )
    }
}

/// Fully defaulted row after normalization and validation.
///
/// Invariant: every field is set (possibly to its documented default) and
/// `is_valid` is true exactly when the trimmed name is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub name: String,
    pub address: String,
    pub address_alignment: String,
    pub country: String,
    pub iso_standard: String,
    pub scope: String,
    pub channel_partner: String,
    #[serde(rename = "type")]
    pub client_type: String,
    pub size: String,
    pub accreditation: String,
    pub logo: String,
    pub certificate_number: String,
    pub original_issue_date: String,
    pub issue_date: String,
    pub surveillance_expiry_date: String,
    pub recertification_date: String,
    pub initial_registration_date: String,
    pub surveillance_due_date: String,
    pub expiry_date: String,
    pub revision: String,
    pub extra_line: String,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl CanonicalRecord {
    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::Name => &self.name,
            FieldKey::Address => &self.address,
            FieldKey::AddressAlignment => &self.address_alignment,
            FieldKey::Country => &self.country,
            FieldKey::IsoStandard => &self.iso_standard,
            FieldKey::Scope => &self.scope,
            FieldKey::ChannelPartner => &self.channel_partner,
            FieldKey::ClientType => &self.client_type,
            FieldKey::Size => &self.size,
            FieldKey::Accreditation => &self.accreditation,
            FieldKey::Logo => &self.logo,
            FieldKey::CertificateNumber => &self.certificate_number,
            FieldKey::OriginalIssueDate => &self.original_issue_date,
            FieldKey::IssueDate => &self.issue_date,
            FieldKey::SurveillanceExpiryDate => &self.surveillance_expiry_date,
            FieldKey::RecertificationDate => &self.recertification_date,
            FieldKey::InitialRegistrationDate => &self.initial_registration_date,
            FieldKey::SurveillanceDueDate => &self.surveillance_due_date,
            FieldKey::ExpiryDate => &self.expiry_date,
            FieldKey::Revision => &self.revision,
            FieldKey::ExtraLine => &self.extra_line,
        }
    }

    pub fn set(&mut self, key: FieldKey, value: String) {
        match key {
            FieldKey::Name => self.name = value,
            FieldKey::Address => self.address = value,
            FieldKey::AddressAlignment => self.address_alignment = value,
            FieldKey::Country => self.country = value,
            FieldKey::IsoStandard => self.iso_standard = value,
            FieldKey::Scope => self.scope = value,
            FieldKey::ChannelPartner => self.channel_partner = value,
            FieldKey::ClientType => self.client_type = value,
            FieldKey::Size => self.size = value,
            FieldKey::Accreditation => self.accreditation = value,
            FieldKey::Logo => self.logo = value,
            FieldKey::CertificateNumber => self.certificate_number = value,
            FieldKey::OriginalIssueDate => self.original_issue_date = value,
            FieldKey::IssueDate => self.issue_date = value,
            FieldKey::SurveillanceExpiryDate => self.surveillance_expiry_date = value,
            FieldKey::RecertificationDate => self.recertification_date = value,
            FieldKey::InitialRegistrationDate => self.initial_registration_date = value,
            FieldKey::SurveillanceDueDate => self.surveillance_due_date = value,
            FieldKey::ExpiryDate => self.expiry_date = value,
            FieldKey::Revision => self.revision = value,
            FieldKey::ExtraLine => self.extra_line = value,
        }
    }
}
