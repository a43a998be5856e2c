//! In-memory `ShareStore` for unit and router tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::gate::hash_password;
use super::storage::ShareStore;
use super::types::{AttemptState, ProtectedResource};

#[derive(Debug, Default)]
pub(crate) struct MemoryShareStore {
    records: Mutex<Vec<ProtectedResource>>,
    writes: AtomicUsize,
}

impl MemoryShareStore {
    pub(crate) async fn insert(&self, resource: ProtectedResource) {
        self.records.lock().await.push(resource);
    }

    pub(crate) async fn get(&self, id: Uuid) -> Option<ProtectedResource> {
        self.records
            .lock()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub(crate) async fn set_attempts(&self, id: Uuid, state: AttemptState) {
        if let Some(record) = self.records.lock().await.iter_mut().find(|r| r.id == id) {
            record.failed_attempts = state.failed_attempts;
            record.locked_until = state.locked_until;
        }
    }

    pub(crate) async fn rotate_password(&self, id: Uuid, salt: &str, password: &str) {
        if let Some(record) = self.records.lock().await.iter_mut().find(|r| r.id == id) {
            record.password_salt = Some(salt.to_string());
            record.password_hash = Some(hash_password(salt, password));
        }
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn find_active_by_token(&self, token: &str) -> Result<Option<ProtectedResource>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| record.share_token == token && record.deleted_at.is_none())
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProtectedResource>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|record| record.id == id && record.deleted_at.is_none())
            .cloned())
    }

    async fn compare_and_set_attempts(
        &self,
        id: Uuid,
        expected: AttemptState,
        next: AttemptState,
    ) -> Result<bool> {
        let mut records = self.records.lock().await;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id == id && record.deleted_at.is_none())
        else {
            return Ok(false);
        };
        if record.attempt_state() != expected {
            return Ok(false);
        }
        record.failed_attempts = next.failed_attempts;
        record.locked_until = next.locked_until;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn open_resource(token: &str) -> ProtectedResource {
    ProtectedResource {
        id: Uuid::new_v4(),
        share_token: token.to_string(),
        object_id: format!("report-{token}"),
        is_password_protected: false,
        password_salt: None,
        password_hash: None,
        failed_attempts: 0,
        locked_until: None,
        created_at: Utc::now(),
        deleted_at: None,
    }
}

pub(crate) fn protected_resource(token: &str, salt: &str, password: &str) -> ProtectedResource {
    ProtectedResource {
        is_password_protected: true,
        password_salt: Some(salt.to_string()),
        password_hash: Some(hash_password(salt, password)),
        ..open_resource(token)
    }
}

pub(crate) fn created_at(mut resource: ProtectedResource, at: DateTime<Utc>) -> ProtectedResource {
    resource.created_at = at;
    resource
}
