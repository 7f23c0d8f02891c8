//! Client record upsert
//!
//! Keeps the record store in sync with the rows of a batch: one client
//! record per distinct company name (matched case-insensitively on the
//! trimmed name) plus one draft per client. The client list is fetched once
//! per batch and updated locally, so a later row with the same name updates
//! the record an earlier row created.

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::defaults::NOT_AVAILABLE;
use crate::services::store::RecordStore;
use crate::types::{
    CanonicalRecord, ChannelPartner, Draft, Entity, EntityPatch, FieldKey, NewDraft, NewEntity,
    StoreAck,
};

#[derive(Debug, Error)]
pub enum UpsertError {
    /// Transport or protocol failure talking to the store
    #[error("record store call failed: {0}")]
    Store(#[from] anyhow::Error),
    /// The store acknowledged the call but rejected the write
    #[error("client record {action} rejected: {message}")]
    Rejected {
        action: &'static str,
        message: String,
    },
    #[error("draft creation rejected: {0}")]
    DraftRejected(String),
}

/// Result of upserting one row.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub entity_id: Uuid,
    /// True when this row created the client record, false when it updated one
    pub created: bool,
    pub draft_id: Uuid,
    /// True when a draft already existed for this client
    pub draft_reused: bool,
    /// The preexisting draft body when one was reused; rendering layers its
    /// values under the row's
    pub stored_draft: Option<Draft>,
}

/// Per-batch upserter holding the tenant's client and partner lists.
pub struct EntityUpserter<'a> {
    store: &'a dyn RecordStore,
    tenant_id: Uuid,
    actor_id: Uuid,
    entities: Vec<Entity>,
    partners: Vec<ChannelPartner>,
}

impl<'a> EntityUpserter<'a> {
    /// Fetch the tenant's clients and channel partners once for the batch.
    pub async fn load(
        store: &'a dyn RecordStore,
        tenant_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Self, UpsertError> {
        let entities = store.list_entities(tenant_id).await?;
        let partners = store.list_partners(tenant_id).await?;
        debug!(
            entities = entities.len(),
            partners = partners.len(),
            "Loaded tenant records for upsert"
        );
        Ok(Self {
            store,
            tenant_id,
            actor_id,
            entities,
            partners,
        })
    }

    /// Upsert the client record and draft for one validated row.
    ///
    /// Ack failures (success false, missing id) are hard failures for the
    /// row; they are never retried.
    pub async fn upsert(&mut self, record: &CanonicalRecord) -> Result<UpsertOutcome, UpsertError> {
        let name = record.get(FieldKey::Name).trim();
        let name_lower = name.to_lowercase();
        let partner_id = self.resolve_partner(record.get(FieldKey::ChannelPartner));

        let existing = self
            .entities
            .iter()
            .find(|e| e.name.trim().to_lowercase() == name_lower)
            .map(|e| e.id);

        let (entity_id, created) = match existing {
            Some(id) => {
                let patch = EntityPatch {
                    iso_standard: record.get(FieldKey::IsoStandard).to_string(),
                    channel_partner_id: partner_id,
                    client_type: record.get(FieldKey::ClientType).to_string(),
                };
                let ack = self.store.update_entity(id, &patch, self.actor_id).await?;
                let id = acked_id(ack, "update")?;
                if let Some(entity) = self.entities.iter_mut().find(|e| e.id == id) {
                    entity.iso_standard = Some(patch.iso_standard);
                    entity.channel_partner_id = patch.channel_partner_id;
                    entity.client_type = Some(patch.client_type);
                }
                (id, false)
            }
            None => {
                let new_entity = NewEntity {
                    name: name.to_string(),
                    iso_standard: record.get(FieldKey::IsoStandard).to_string(),
                    channel_partner_id: partner_id,
                    client_type: record.get(FieldKey::ClientType).to_string(),
                };
                let ack = self
                    .store
                    .create_entity(self.tenant_id, &new_entity, self.actor_id)
                    .await?;
                let id = acked_id(ack, "create")?;
                self.entities.push(Entity {
                    id,
                    name: new_entity.name,
                    iso_standard: Some(new_entity.iso_standard),
                    channel_partner_id: new_entity.channel_partner_id,
                    client_type: Some(new_entity.client_type),
                });
                (id, true)
            }
        };

        let (draft_id, draft_reused, stored_draft) = self.ensure_draft(entity_id, record).await?;

        Ok(UpsertOutcome {
            entity_id,
            created,
            draft_id,
            draft_reused,
            stored_draft,
        })
    }

    /// Find the client's draft, creating one from the row when absent.
    async fn ensure_draft(
        &self,
        entity_id: Uuid,
        record: &CanonicalRecord,
    ) -> Result<(Uuid, bool, Option<Draft>), UpsertError> {
        if let Some(draft) = self.store.find_draft(self.tenant_id, entity_id).await? {
            debug!(draft_id = %draft.id, "Reusing existing draft");
            let id = draft.id;
            return Ok((id, true, Some(draft)));
        }

        let new_draft = NewDraft {
            company_name: record.get(FieldKey::Name).trim().to_string(),
            address: record.get(FieldKey::Address).to_string(),
            iso_standard: record.get(FieldKey::IsoStandard).to_string(),
            scope: record.get(FieldKey::Scope).to_string(),
            client_type: record.get(FieldKey::ClientType).to_string(),
        };
        let ack = self
            .store
            .create_draft(self.tenant_id, entity_id, &new_draft, self.actor_id)
            .await?;
        if !ack.success {
            return Err(UpsertError::DraftRejected(
                ack.error.unwrap_or_else(|| "no error detail".to_string()),
            ));
        }
        let draft_id = ack
            .draft_id
            .ok_or_else(|| UpsertError::DraftRejected("store returned no draft id".to_string()))?;

        Ok((draft_id, ack.is_existing, None))
    }

    /// Resolve a channel partner cell to a partner id.
    ///
    /// Accepts a literal UUID or a partner name (case-insensitive). Empty
    /// and "N/A" cells, and names with no match, resolve to None.
    fn resolve_partner(&self, raw: &str) -> Option<Uuid> {
        let raw = raw.trim();
        if raw.is_empty() || raw == NOT_AVAILABLE {
            return None;
        }
        if let Ok(id) = Uuid::parse_str(raw) {
            return Some(id);
        }
        let raw_lower = raw.to_lowercase();
        self.partners
            .iter()
            .find(|p| p.name.trim().to_lowercase() == raw_lower)
            .map(|p| p.id)
    }
}

fn acked_id(ack: StoreAck, action: &'static str) -> Result<Uuid, UpsertError> {
    if !ack.success {
        return Err(UpsertError::Rejected {
            action,
            message: ack.error.unwrap_or_else(|| "no error detail".to_string()),
        });
    }
    ack.id.ok_or(UpsertError::Rejected {
        action,
        message: "store returned no record id".to_string(),
    })
}
