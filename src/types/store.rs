//! Record-store data types
//!
//! Shapes of the remote record-store RPC interface the pipeline consumes.
//! The store itself (schema, persistence) is not implemented here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backing client record as returned by the store's list operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub iso_standard: Option<String>,
    #[serde(default)]
    pub channel_partner_id: Option<Uuid>,
    #[serde(default)]
    pub client_type: Option<String>,
}

/// Fields for creating a new client record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntity {
    pub name: String,
    pub iso_standard: String,
    pub channel_partner_id: Option<Uuid>,
    pub client_type: String,
}

/// Mutable fields updated when a row matches an existing client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    pub iso_standard: String,
    pub channel_partner_id: Option<Uuid>,
    pub client_type: String,
}

/// Discriminated result of a create/update call.
///
/// `success == false` or a missing id is a hard failure for the row that
/// triggered the call; the pipeline never retries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAck {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Draft record scoped 1:1 to an entity by natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Uuid,
    pub company_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub iso_standard: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub accreditation: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// Fields for creating a draft alongside an upserted entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDraft {
    pub company_name: String,
    pub address: String,
    pub iso_standard: String,
    pub scope: String,
    pub client_type: String,
}

/// Result of a draft create call. The store returns the prior draft with
/// `is_existing == true` when the natural key was already taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAck {
    #[serde(default)]
    pub draft_id: Option<Uuid>,
    pub success: bool,
    #[serde(default)]
    pub is_existing: bool,
    #[serde(default)]
    pub draft_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Channel partner reference used to resolve partner names to ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPartner {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_ack_defaults_optional_fields() {
        let ack: StoreAck = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!ack.success);
        assert!(ack.id.is_none());
        assert!(ack.error.is_none());
    }

    #[test]
    fn test_draft_ack_is_existing_defaults_false() {
        let ack: DraftAck = serde_json::from_str(
            r#"{"draftId": "8f5d2f46-7f8f-4f0a-9a39-0e4a64d7b9a4", "success": true}"#,
        )
        .unwrap();
        assert!(ack.success);
        assert!(!ack.is_existing);
        assert!(ack.draft_id.is_some());
    }

    #[test]
    fn test_entity_deserializes_camel_case() {
        let entity: Entity = serde_json::from_str(
            r#"{"id": "8f5d2f46-7f8f-4f0a-9a39-0e4a64d7b9a4",
                "name": "Acme Ltd",
                "isoStandard": "ISO 9001:2015",
                "clientType": "new"}"#,
        )
        .unwrap();
        assert_eq!(entity.name, "Acme Ltd");
        assert_eq!(entity.iso_standard.as_deref(), Some("ISO 9001:2015"));
        assert!(entity.channel_partner_id.is_none());
    }
}
