//! Versioned document store shared by the read views.

use std::collections::HashMap;
use std::sync::Arc;

use common::{AggregateId, TenantId};
use tokio::sync::RwLock;

use crate::error::{ProjectionError, Result};

type Key = (TenantId, AggregateId);

/// Per-(tenant, entity) document store with conditional commits.
///
/// `load` hands back the document together with the revision it was
/// read at; `store_if` applies a write only when that revision is still
/// current. A concurrent projector writing the same entity makes the
/// loser fail instead of silently dropping its update, and the relay's
/// redelivery retries the event.
#[derive(Clone)]
pub struct ViewStore<T: Clone + Send + Sync> {
    name: &'static str,
    docs: Arc<RwLock<HashMap<Key, (T, u64)>>>,
}

impl<T: Clone + Send + Sync> ViewStore<T> {
    /// Creates an empty store; `name` appears in conflict errors.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            docs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Loads a document with its revision. Revision 0 means the
    /// document does not exist yet.
    pub async fn load(&self, tenant_id: &TenantId, entity_id: AggregateId) -> (Option<T>, u64) {
        let docs = self.docs.read().await;
        match docs.get(&(tenant_id.clone(), entity_id)) {
            Some((doc, revision)) => (Some(doc.clone()), *revision),
            None => (None, 0),
        }
    }

    /// Conditionally writes a document.
    ///
    /// Fails with `Conflict` when the stored revision no longer matches
    /// `expected_revision` (0 = the document must not exist yet).
    pub async fn store_if(
        &self,
        tenant_id: &TenantId,
        entity_id: AggregateId,
        expected_revision: u64,
        doc: T,
    ) -> Result<()> {
        let mut docs = self.docs.write().await;
        let key = (tenant_id.clone(), entity_id);
        let current = docs.get(&key).map(|(_, revision)| *revision).unwrap_or(0);

        if current != expected_revision {
            metrics::counter!("view_commit_conflicts").increment(1);
            return Err(ProjectionError::Conflict {
                view: self.name,
                entity: entity_id.to_string(),
            });
        }

        docs.insert(key, (doc, expected_revision + 1));
        Ok(())
    }

    /// Returns a document by key.
    pub async fn get(&self, tenant_id: &TenantId, entity_id: AggregateId) -> Option<T> {
        self.load(tenant_id, entity_id).await.0
    }

    /// Returns all documents of one tenant.
    pub async fn list(&self, tenant_id: &TenantId) -> Vec<T> {
        let docs = self.docs.read().await;
        docs.iter()
            .filter(|((tenant, _), _)| tenant == tenant_id)
            .map(|(_, (doc, _))| doc.clone())
            .collect()
    }

    /// Number of documents across all tenants.
    pub async fn count(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Drops every document.
    pub async fn clear(&self) {
        self.docs.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    #[tokio::test]
    async fn load_missing_returns_revision_zero() {
        let store: ViewStore<String> = ViewStore::new("test");
        let (doc, revision) = store.load(&tenant(), AggregateId::new()).await;
        assert!(doc.is_none());
        assert_eq!(revision, 0);
    }

    #[tokio::test]
    async fn store_and_reload() {
        let store: ViewStore<String> = ViewStore::new("test");
        let id = AggregateId::new();

        store
            .store_if(&tenant(), id, 0, "v1".to_string())
            .await
            .unwrap();

        let (doc, revision) = store.load(&tenant(), id).await;
        assert_eq!(doc.as_deref(), Some("v1"));
        assert_eq!(revision, 1);
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let store: ViewStore<String> = ViewStore::new("test");
        let id = AggregateId::new();

        store
            .store_if(&tenant(), id, 0, "v1".to_string())
            .await
            .unwrap();

        let result = store.store_if(&tenant(), id, 0, "v2".to_string()).await;
        assert!(matches!(result, Err(ProjectionError::Conflict { .. })));

        store
            .store_if(&tenant(), id, 1, "v2".to_string())
            .await
            .unwrap();
        assert_eq!(store.get(&tenant(), id).await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn list_is_tenant_scoped() {
        let store: ViewStore<String> = ViewStore::new("test");
        let id = AggregateId::new();

        store
            .store_if(&TenantId::new("acme"), id, 0, "a".to_string())
            .await
            .unwrap();
        store
            .store_if(&TenantId::new("globex"), id, 0, "g".to_string())
            .await
            .unwrap();

        assert_eq!(store.list(&TenantId::new("acme")).await, vec!["a"]);
        assert_eq!(store.count().await, 2);
    }
}
