//! Centralized field defaults for the generation pipeline.
//!
//! Every fallback value lives here so defaulting is auditable in one place
//! instead of being scattered across validators and renderers.

use rand::Rng;

/// Placeholder for free-text fields that must never reach the renderer empty.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default client type for rows that do not specify one.
pub const DEFAULT_CLIENT_TYPE: &str = "new";

/// Placeholder printed on documents when a date was not supplied.
pub const DATE_PLACEHOLDER: &str = "dd/mm/yyyy";

/// Defaults applied at render time when neither the stored draft nor the row
/// supplies a value.
pub const DEFAULT_REVISION: &str = "R0";
pub const DEFAULT_COUNTRY: &str = "Saudi Arabia";
pub const DEFAULT_SCOPE: &str = "General business operations and management";
pub const DEFAULT_STANDARD: &str = "ISO 9001";

/// Prefix for generated draft certificate numbers.
pub const CERT_NUMBER_PREFIX: &str = "AMER";

/// Prefix for generated soft-copy certificate numbers.
pub const SOFT_CERT_NUMBER_PREFIX: &str = "SOFT";

/// Generate a draft certificate number: prefix plus four random digits.
pub fn generate_certificate_number() -> String {
    let digits: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("{}{}", CERT_NUMBER_PREFIX, digits)
}

/// Generate a soft-copy certificate number: prefix, epoch millis, four digits.
pub fn generate_soft_certificate_number() -> String {
    let digits: u32 = rand::thread_rng().gen_range(1000..10000);
    format!(
        "{}-{}-{}",
        SOFT_CERT_NUMBER_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        digits
    )
}
