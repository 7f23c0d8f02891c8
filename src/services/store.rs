//! Record-store abstraction
//!
//! The pipeline talks to the platform record store (clients, drafts, channel
//! partners) through this trait:
//! - InMemoryRecordStore for tests and local CLI runs (deterministic, no network)
//! - HttpRecordStore for production (internal RPC, see store_http)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{
    ChannelPartner, Draft, DraftAck, Entity, EntityPatch, NewDraft, NewEntity, StoreAck,
};

/// RecordStore trait - abstraction over the platform record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List all client records of a tenant
    async fn list_entities(&self, tenant_id: Uuid) -> Result<Vec<Entity>>;

    /// Create a client record, returning the store's ack
    async fn create_entity(
        &self,
        tenant_id: Uuid,
        entity: &NewEntity,
        actor_id: Uuid,
    ) -> Result<StoreAck>;

    /// Update the mutable fields of an existing client record
    async fn update_entity(
        &self,
        entity_id: Uuid,
        patch: &EntityPatch,
        actor_id: Uuid,
    ) -> Result<StoreAck>;

    /// Look up the draft attached to a client, if any
    async fn find_draft(&self, tenant_id: Uuid, entity_id: Uuid) -> Result<Option<Draft>>;

    /// Create a draft for a client. The store reuses an existing draft for
    /// the same client and reports it via `is_existing`
    async fn create_draft(
        &self,
        tenant_id: Uuid,
        entity_id: Uuid,
        draft: &NewDraft,
        actor_id: Uuid,
    ) -> Result<DraftAck>;

    /// List channel partners available to a tenant
    async fn list_partners(&self, tenant_id: Uuid) -> Result<Vec<ChannelPartner>>;

    /// Get the name of this store implementation
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // InMemoryRecordStore Tests (TDD - these tests define the expected behavior)
    // ==========================================================================

    fn new_entity(name: &str) -> NewEntity {
        NewEntity {
            name: name.to_string(),
            iso_standard: "ISO 9001".to_string(),
            channel_partner_id: None,
            client_type: "new".to_string(),
        }
    }

    fn new_draft(name: &str) -> NewDraft {
        NewDraft {
            company_name: name.to_string(),
            address: "N/A".to_string(),
            iso_standard: "ISO 9001".to_string(),
            scope: "N/A".to_string(),
            client_type: "new".to_string(),
        }
    }

    #[tokio::test]
    async fn memory_store_create_then_list_roundtrips() {
        let store = InMemoryRecordStore::new();
        let tenant = Uuid::new_v4();

        let ack = store
            .create_entity(tenant, &new_entity("Acme Ltd"), Uuid::new_v4())
            .await
            .unwrap();

        assert!(ack.success);
        assert!(ack.id.is_some());

        let entities = store.list_entities(tenant).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Acme Ltd");
        assert_eq!(store.created_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_update_patches_mutable_fields() {
        let store = InMemoryRecordStore::new();
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let ack = store
            .create_entity(tenant, &new_entity("Acme Ltd"), actor)
            .await
            .unwrap();
        let id = ack.id.unwrap();

        let ack = store
            .update_entity(
                id,
                &EntityPatch {
                    iso_standard: "ISO 14001".to_string(),
                    channel_partner_id: None,
                    client_type: "renewal".to_string(),
                },
                actor,
            )
            .await
            .unwrap();
        assert!(ack.success);

        let entities = store.list_entities(tenant).await.unwrap();
        assert_eq!(entities[0].iso_standard.as_deref(), Some("ISO 14001"));
        assert_eq!(entities[0].client_type.as_deref(), Some("renewal"));
        assert_eq!(store.updated_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_update_unknown_id_fails_in_ack() {
        let store = InMemoryRecordStore::new();
        let ack = store
            .update_entity(
                Uuid::new_v4(),
                &EntityPatch {
                    iso_standard: "ISO 9001".to_string(),
                    channel_partner_id: None,
                    client_type: "new".to_string(),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert!(!ack.success);
        assert!(ack.error.is_some());
    }

    #[tokio::test]
    async fn memory_store_draft_is_one_per_entity() {
        let store = InMemoryRecordStore::new();
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let entity_id = store
            .create_entity(tenant, &new_entity("Acme Ltd"), actor)
            .await
            .unwrap()
            .id
            .unwrap();

        assert!(store.find_draft(tenant, entity_id).await.unwrap().is_none());

        let first = store
            .create_draft(tenant, entity_id, &new_draft("Acme Ltd"), actor)
            .await
            .unwrap();
        assert!(first.success);
        assert!(!first.is_existing);

        let second = store
            .create_draft(tenant, entity_id, &new_draft("Acme Ltd"), actor)
            .await
            .unwrap();
        assert!(second.success);
        assert!(second.is_existing, "same client must reuse the draft");
        assert_eq!(first.draft_id, second.draft_id);

        let found = store.find_draft(tenant, entity_id).await.unwrap().unwrap();
        assert_eq!(Some(found.id), first.draft_id);
        assert_eq!(found.company_name, "Acme Ltd");
        assert_eq!(store.draft_count(), 1);
    }

    #[tokio::test]
    async fn memory_store_failing_writes_return_unsuccessful_acks() {
        let store = InMemoryRecordStore::new();
        store.set_fail_writes(true);

        let ack = store
            .create_entity(Uuid::new_v4(), &new_entity("Acme Ltd"), Uuid::new_v4())
            .await
            .unwrap();
        assert!(!ack.success);
        assert!(ack.error.is_some());
        assert_eq!(store.created_count(), 0);
    }

    #[tokio::test]
    async fn memory_store_lists_seeded_partners() {
        let partner = ChannelPartner {
            id: Uuid::new_v4(),
            name: "Gulf Certifications".to_string(),
        };
        let store = InMemoryRecordStore::new().with_partners(vec![partner.clone()]);

        let partners = store.list_partners(Uuid::new_v4()).await.unwrap();
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].id, partner.id);
    }

    #[test]
    fn memory_store_name_is_memory() {
        assert_eq!(InMemoryRecordStore::new().name(), "memory");
    }
}

// ==========================================================================
// InMemoryRecordStore Implementation
// ==========================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

#[derive(Default)]
struct MemoryState {
    entities: Vec<Entity>,
    drafts: Vec<(Uuid, Draft)>,
    partners: Vec<ChannelPartner>,
    created: u32,
    updated: u32,
}

/// In-memory record store for tests and offline CLI runs.
///
/// Single-tenant: the `tenant_id` argument is accepted for trait parity and
/// ignored. Writes can be forced to fail to exercise error paths.
pub struct InMemoryRecordStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_partners(self, partners: Vec<ChannelPartner>) -> Self {
        self.state.lock().partners = partners;
        self
    }

    pub fn with_entities(self, entities: Vec<Entity>) -> Self {
        self.state.lock().entities = entities;
        self
    }

    /// Make every subsequent write return an unsuccessful ack
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn created_count(&self) -> u32 {
        self.state.lock().created
    }

    pub fn updated_count(&self) -> u32 {
        self.state.lock().updated
    }

    pub fn draft_count(&self) -> usize {
        self.state.lock().drafts.len()
    }

    fn failing(&self) -> bool {
        self.fail_writes.load(Ordering::Relaxed)
    }

    fn failed_ack() -> StoreAck {
        StoreAck {
            id: None,
            success: false,
            error: Some("simulated store failure".to_string()),
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_entities(&self, _tenant_id: Uuid) -> Result<Vec<Entity>> {
        Ok(self.state.lock().entities.clone())
    }

    async fn create_entity(
        &self,
        _tenant_id: Uuid,
        entity: &NewEntity,
        _actor_id: Uuid,
    ) -> Result<StoreAck> {
        if self.failing() {
            return Ok(Self::failed_ack());
        }

        let id = Uuid::new_v4();
        let mut state = self.state.lock();
        state.entities.push(Entity {
            id,
            name: entity.name.clone(),
            iso_standard: Some(entity.iso_standard.clone()),
            channel_partner_id: entity.channel_partner_id,
            client_type: Some(entity.client_type.clone()),
        });
        state.created += 1;

        Ok(StoreAck {
            id: Some(id),
            success: true,
            error: None,
        })
    }

    async fn update_entity(
        &self,
        entity_id: Uuid,
        patch: &EntityPatch,
        _actor_id: Uuid,
    ) -> Result<StoreAck> {
        if self.failing() {
            return Ok(Self::failed_ack());
        }

        let mut state = self.state.lock();
        match state.entities.iter_mut().find(|e| e.id == entity_id) {
            Some(entity) => {
                entity.iso_standard = Some(patch.iso_standard.clone());
                entity.channel_partner_id = patch.channel_partner_id;
                entity.client_type = Some(patch.client_type.clone());
                state.updated += 1;
                Ok(StoreAck {
                    id: Some(entity_id),
                    success: true,
                    error: None,
                })
            }
            None => Ok(StoreAck {
                id: None,
                success: false,
                error: Some(format!("no client record with id {}", entity_id)),
            }),
        }
    }

    async fn find_draft(&self, _tenant_id: Uuid, entity_id: Uuid) -> Result<Option<Draft>> {
        Ok(self
            .state
            .lock()
            .drafts
            .iter()
            .find(|(owner, _)| *owner == entity_id)
            .map(|(_, draft)| draft.clone()))
    }

    async fn create_draft(
        &self,
        _tenant_id: Uuid,
        entity_id: Uuid,
        draft: &NewDraft,
        _actor_id: Uuid,
    ) -> Result<DraftAck> {
        if self.failing() {
            return Ok(DraftAck {
                draft_id: None,
                success: false,
                is_existing: false,
                draft_name: None,
                error: Some("simulated store failure".to_string()),
            });
        }

        let mut state = self.state.lock();
        if let Some((_, existing)) = state.drafts.iter().find(|(owner, _)| *owner == entity_id) {
            return Ok(DraftAck {
                draft_id: Some(existing.id),
                success: true,
                is_existing: true,
                draft_name: Some(existing.company_name.clone()),
                error: None,
            });
        }

        let id = Uuid::new_v4();
        state.drafts.push((
            entity_id,
            Draft {
                id,
                company_name: draft.company_name.clone(),
                address: Some(draft.address.clone()),
                scope: Some(draft.scope.clone()),
                iso_standard: Some(draft.iso_standard.clone()),
                client_type: Some(draft.client_type.clone()),
                size: None,
                accreditation: None,
                logo: None,
            },
        ));
        Ok(DraftAck {
            draft_id: Some(id),
            success: true,
            is_existing: false,
            draft_name: Some(draft.company_name.clone()),
            error: None,
        })
    }

    async fn list_partners(&self, _tenant_id: Uuid) -> Result<Vec<ChannelPartner>> {
        Ok(self.state.lock().partners.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
