//! Document rendering
//!
//! Composes the per-row field map and calls the external render service.
//! The field map layers, lowest to highest precedence: profile hard defaults,
//! stored draft values, row values, operator overrides. Empty and "N/A" row
//! cells never override a lower layer; "N/A" is a record-store marker, not
//! display text.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::defaults::{
    generate_certificate_number, generate_soft_certificate_number, DATE_PLACEHOLDER,
    DEFAULT_COUNTRY, DEFAULT_REVISION, DEFAULT_SCOPE, DEFAULT_STANDARD, NOT_AVAILABLE,
};
use crate::services::assets::AssetFile;
use crate::types::{CanonicalRecord, DocumentKind, Draft, FieldKey, FieldSelection};

#[derive(Debug, Error)]
pub enum RenderError {
    /// Transport failure reaching the render service
    #[error("failed to reach render service: {0}")]
    Transport(#[from] anyhow::Error),
    /// The render service answered with an error; message already normalized
    #[error("{0}")]
    Service(String),
}

/// RenderService trait - abstraction over the external document renderer
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Render one document from a display-keyed field map and an optional
    /// logo asset, returning the document bytes
    async fn render(
        &self,
        fields: &BTreeMap<String, String>,
        logo: Option<&AssetFile>,
    ) -> Result<Vec<u8>, RenderError>;

    /// Get the name of this renderer implementation
    fn name(&self) -> &'static str;
}

// ==========================================================================
// HttpRenderService Implementation
// ==========================================================================

const RENDER_TIMEOUT_SECS: u64 = 120;

/// HTTP render-service client.
///
/// Sends a multipart body: a `fields` part holding the JSON field map and,
/// when a logo matched, a `logo_files` file part.
pub struct HttpRenderService {
    endpoint: String,
    internal_token: String,
    client: reqwest::Client,
}

impl HttpRenderService {
    /// Create a new client
    pub fn new(endpoint: &str, internal_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Certforge-Worker/0.3")
            .timeout(Duration::from_secs(RENDER_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.to_string(),
            internal_token: internal_token.to_string(),
            client,
        }
    }
}

#[async_trait]
impl RenderService for HttpRenderService {
    async fn render(
        &self,
        fields: &BTreeMap<String, String>,
        logo: Option<&AssetFile>,
    ) -> Result<Vec<u8>, RenderError> {
        let fields_json =
            serde_json::to_string(fields).context("Failed to serialize render fields")?;

        let mut form = reqwest::multipart::Form::new().text("fields", fields_json);
        if let Some(asset) = logo {
            let part = reqwest::multipart::Part::bytes(asset.bytes.clone())
                .file_name(asset.name.clone());
            form = form.part("logo_files", part);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-internal-token", &self.internal_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to send render request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::Service(normalize_error_body(
                &body,
                status.as_u16(),
            )));
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read rendered document")?;
        if bytes.is_empty() {
            return Err(RenderError::Service(
                "render service returned an empty document".to_string(),
            ));
        }
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Collapse an error response into one message: a JSON `error` field if the
/// body parses, the raw text if not, the HTTP status as a last resort.
fn normalize_error_body(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            let message = message.trim();
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    let text = body.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    format!("document rendering failed: HTTP {}", status)
}

// ==========================================================================
// MockRenderService Implementation
// ==========================================================================

/// One recorded render call, for assertions.
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub fields: BTreeMap<String, String>,
    pub logo: Option<String>,
}

/// Mock renderer for tests - deterministic bytes, scriptable failures
#[derive(Default)]
pub struct MockRenderService {
    calls: parking_lot::Mutex<Vec<RenderCall>>,
    failures: parking_lot::Mutex<HashMap<String, String>>,
}

impl MockRenderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every render whose "Company Name" field equals `company`
    pub fn fail_for(&self, company: &str, message: &str) {
        self.failures
            .lock()
            .insert(company.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RenderService for MockRenderService {
    async fn render(
        &self,
        fields: &BTreeMap<String, String>,
        logo: Option<&AssetFile>,
    ) -> Result<Vec<u8>, RenderError> {
        let company = fields.get("Company Name").cloned().unwrap_or_default();
        self.calls.lock().push(RenderCall {
            fields: fields.clone(),
            logo: logo.map(|l| l.name.clone()),
        });

        if let Some(message) = self.failures.lock().get(&company) {
            return Err(RenderError::Service(message.clone()));
        }
        Ok(format!("%PDF-mock:{}", company).into_bytes())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// DocumentRenderer
// ==========================================================================

/// Per-batch renderer: field composition, selection gating, output naming.
pub struct DocumentRenderer<'a> {
    service: &'a dyn RenderService,
    kind: DocumentKind,
    selection: FieldSelection,
    overrides: HashMap<String, String>,
}

impl<'a> DocumentRenderer<'a> {
    pub fn new(
        service: &'a dyn RenderService,
        kind: DocumentKind,
        selection: Option<FieldSelection>,
        overrides: HashMap<String, String>,
    ) -> Self {
        Self {
            service,
            kind,
            selection: selection.unwrap_or_else(|| FieldSelection::for_kind(kind)),
            overrides,
        }
    }

    /// Render one validated row into document bytes.
    pub async fn render_row(
        &self,
        record: &CanonicalRecord,
        stored_draft: Option<&Draft>,
        logo: Option<&AssetFile>,
    ) -> Result<Vec<u8>, RenderError> {
        let fields = self.compose_fields(record, stored_draft);
        debug!(
            company = record.get(FieldKey::Name),
            fields = fields.len(),
            logo = logo.map(|l| l.name.as_str()).unwrap_or("-"),
            "Rendering document"
        );
        self.service.render(&fields, logo).await
    }

    /// Compose the display-keyed field map for one row.
    ///
    /// A field is present when selected, or when the row supplies a real
    /// value for it anyway. Every value is newline-collapsed and trimmed.
    pub fn compose_fields(
        &self,
        record: &CanonicalRecord,
        stored_draft: Option<&Draft>,
    ) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();

        for key in FieldKey::ALL {
            if !self.selection.includes(key) && !has_row_value(record, key) {
                continue;
            }
            fields.insert(key.display_label().to_string(), self.hard_default(key));
        }

        if let Some(draft) = stored_draft {
            overlay(&mut fields, FieldKey::Address, draft.address.as_deref());
            overlay(&mut fields, FieldKey::Scope, draft.scope.as_deref());
            overlay(
                &mut fields,
                FieldKey::IsoStandard,
                draft.iso_standard.as_deref(),
            );
            overlay(
                &mut fields,
                FieldKey::ClientType,
                draft.client_type.as_deref(),
            );
            overlay(&mut fields, FieldKey::Size, draft.size.as_deref());
            overlay(
                &mut fields,
                FieldKey::Accreditation,
                draft.accreditation.as_deref(),
            );
            overlay(&mut fields, FieldKey::Logo, draft.logo.as_deref());
        }

        for key in FieldKey::ALL {
            if has_row_value(record, key) {
                fields.insert(
                    key.display_label().to_string(),
                    record.get(key).trim().to_string(),
                );
            }
        }

        for (label, value) in &self.overrides {
            let value = value.trim();
            if !value.is_empty() {
                fields.insert(label.clone(), value.to_string());
            }
        }

        for value in fields.values_mut() {
            *value = clean_value(value);
        }
        fields
    }

    /// Lowest layer of the field map, per document profile.
    fn hard_default(&self, key: FieldKey) -> String {
        match key {
            FieldKey::CertificateNumber => match self.kind {
                DocumentKind::Draft => generate_certificate_number(),
                DocumentKind::SoftCopy => generate_soft_certificate_number(),
            },
            FieldKey::Revision => DEFAULT_REVISION.to_string(),
            FieldKey::Country => DEFAULT_COUNTRY.to_string(),
            FieldKey::Scope => DEFAULT_SCOPE.to_string(),
            FieldKey::IsoStandard => DEFAULT_STANDARD.to_string(),
            key if key.is_date() => DATE_PLACEHOLDER.to_string(),
            _ => String::new(),
        }
    }

    /// Output filename for one row, guaranteed free of illegal filesystem
    /// characters.
    pub fn output_filename(&self, record: &CanonicalRecord) -> String {
        let name = sanitize_filename(record.get(FieldKey::Name).trim());
        let standard = record.get(FieldKey::IsoStandard);
        match self.kind {
            DocumentKind::Draft => {
                format!("{}_{}_draft.pdf", name, iso_number(standard))
            }
            DocumentKind::SoftCopy => {
                format!("{}_SoftCopy_{}.pdf", name, standard_code(standard))
            }
        }
    }
}

fn has_row_value(record: &CanonicalRecord, key: FieldKey) -> bool {
    let value = record.get(key).trim();
    !value.is_empty() && value != NOT_AVAILABLE
}

fn overlay(fields: &mut BTreeMap<String, String>, key: FieldKey, value: Option<&str>) {
    let label = key.display_label();
    if !fields.contains_key(label) {
        return;
    }
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() && value != NOT_AVAILABLE {
            fields.insert(label.to_string(), value.to_string());
        }
    }
}

fn clean_value(value: &str) -> String {
    value
        .replace("\r\n", " ")
        .replace('\r', " ")
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// Replace illegal filename characters with `_`, then whitespace runs with
/// one `_`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(replaced.len());
    let mut in_whitespace = false;
    for c in replaced.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

/// First run of ASCII digits in the standard, or "Unknown".
pub fn iso_number(standard: &str) -> String {
    let digits: String = standard
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        "Unknown".to_string()
    } else {
        digits
    }
}

/// Standard code for soft-copy filenames: year suffix stripped, sanitized.
/// "ISO 27001:2022" becomes "ISO_27001".
pub fn standard_code(standard: &str) -> String {
    let standard = standard.trim();
    if standard.is_empty() || standard == NOT_AVAILABLE {
        return "Unknown".to_string();
    }
    let without_year = match standard.rsplit_once(':') {
        Some((head, tail)) if tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => standard,
    };
    sanitize_filename(without_year)
}
