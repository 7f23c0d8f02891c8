//! HTTP record-store client
//!
//! Production implementation of [`RecordStore`] against the platform record
//! store's internal RPC surface: POST {base_url}/rpc/<function> with a JSON
//! body, authenticated by the shared x-internal-token header.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::store::RecordStore;
use crate::types::{
    ChannelPartner, Draft, DraftAck, Entity, EntityPatch, NewDraft, NewEntity, StoreAck,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP record-store client
pub struct HttpRecordStore {
    base_url: String,
    internal_token: String,
    client: reqwest::Client,
}

impl HttpRecordStore {
    /// Create a new client
    pub fn new(base_url: &str, internal_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Certforge-Worker/0.3")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            internal_token: internal_token.to_string(),
            client,
        }
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rpc/{}", self.base_url, function)
    }

    async fn call<B, T>(&self, function: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.rpc_url(function))
            .header("x-internal-token", &self.internal_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call record store function '{}'", function))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Record store function '{}' returned HTTP {}: {}",
                function,
                status,
                body
            ));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse record store response for '{}'", function))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn list_entities(&self, tenant_id: Uuid) -> Result<Vec<Entity>> {
        self.call("list_tenant_clients", &json!({ "tenantId": tenant_id }))
            .await
    }

    async fn create_entity(
        &self,
        tenant_id: Uuid,
        entity: &NewEntity,
        actor_id: Uuid,
    ) -> Result<StoreAck> {
        self.call(
            "create_tenant_client",
            &json!({ "tenantId": tenant_id, "client": entity, "createdBy": actor_id }),
        )
        .await
    }

    async fn update_entity(
        &self,
        entity_id: Uuid,
        patch: &EntityPatch,
        actor_id: Uuid,
    ) -> Result<StoreAck> {
        self.call(
            "update_tenant_client",
            &json!({ "clientId": entity_id, "patch": patch, "updatedBy": actor_id }),
        )
        .await
    }

    async fn find_draft(&self, tenant_id: Uuid, entity_id: Uuid) -> Result<Option<Draft>> {
        self.call(
            "get_tenant_draft",
            &json!({ "tenantId": tenant_id, "clientId": entity_id }),
        )
        .await
    }

    async fn create_draft(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        draft: &NewDraft,
        actor_id: Uuid,
    ) -> Result<DraftAck> {
        self.call(
            "create_tenant_draft",
            &json!({
                "tenantId": tenant_id,
                "clientId": entity_id,
                "draft": draft,
                "createdBy": actor_id,
            }),
        )
        .await
    }

    async fn list_partners(&self, tenant_id: Uuid) -> Result<Vec<ChannelPartner>> {
        self.call("list_channel_partners", &json!({ "tenantId": tenant_id }))
            .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url_strips_trailing_slash() {
        let store = HttpRecordStore::new("http://records.internal:4000/", "token");
        assert_eq!(
            store.rpc_url("list_tenant_clients"),
            "http://records.internal:4000/rpc/list_tenant_clients"
        );
    }

    // Requires a running record store; run manually against a dev deployment
    #[tokio::test]
    #[ignore]
    async fn test_list_entities_against_dev_store() {
        let store = HttpRecordStore::new("http://localhost:4000", "dev-token");
        let entities = store.list_entities(Uuid::nil()).await.unwrap();
        assert!(entities.is_empty() || !entities[0].name.is_empty());
    }
}
