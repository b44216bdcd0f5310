use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::auth::{LoginAttemptRecord, User};
use crate::storage::{AttemptEntry, AttemptStore, CredentialStore, StoreError};

/// 内存存储，行为与 PostgresBackend 一致：每个用户名一把异步锁，
/// 修改在 commit 前只写入工作副本，新建的记录同样要 commit 后才可见
#[derive(Default)]
pub struct MemoryBackend {
    users: Mutex<HashMap<String, User>>,
    attempts: Mutex<HashMap<String, Arc<AsyncMutex<Option<LoginAttemptRecord>>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().map(|users| users.len()).unwrap_or(0)
    }

    /// 读取已提交的记录
    pub async fn attempt_record(&self, username: &str) -> Option<LoginAttemptRecord> {
        let slot = self.attempts.lock().ok()?.get(username).cloned()?;
        let record = slot.lock().await;
        record.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryBackend {
    async fn insert_user(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<User, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if users.contains_key(username) {
            return Err(StoreError::Conflict(username.to_string()));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_digest: password_digest.to_string(),
            created_at: Utc::now(),
        };
        users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(users.get(username).cloned())
    }
}

pub struct MemoryAttemptEntry {
    guard: OwnedMutexGuard<Option<LoginAttemptRecord>>,
    working: LoginAttemptRecord,
    is_new: bool,
}

#[async_trait]
impl AttemptStore for MemoryBackend {
    type Entry = MemoryAttemptEntry;

    async fn acquire(
        &self,
        username: &str,
        client_ip: Option<&str>,
    ) -> Result<MemoryAttemptEntry, StoreError> {
        let slot = self
            .attempts
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .entry(username.to_string())
            .or_default()
            .clone();

        // 锁住空槽位，等同于 Postgres 中未提交插入对并发插入的阻塞
        let guard = slot.lock_owned().await;
        let (working, is_new) = match guard.as_ref() {
            Some(record) => (record.clone(), false),
            None => (
                LoginAttemptRecord::new(username, client_ip.map(str::to_string)),
                true,
            ),
        };
        Ok(MemoryAttemptEntry {
            guard,
            working,
            is_new,
        })
    }
}

#[async_trait]
impl AttemptEntry for MemoryAttemptEntry {
    fn record(&self) -> &LoginAttemptRecord {
        &self.working
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    async fn save(&mut self, record: LoginAttemptRecord) -> Result<(), StoreError> {
        self.working = record;
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = Some(self.working);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_new_entry_leaves_no_record() {
        let backend = MemoryBackend::new();
        let mut entry = backend.acquire("bob", Some("10.0.0.1")).await.unwrap();
        assert!(entry.is_new());

        let mut record = entry.record().clone();
        record.attempt_count = 2;
        entry.save(record).await.unwrap();
        drop(entry);

        assert!(backend.attempt_record("bob").await.is_none());
        let entry = backend.acquire("bob", Some("10.0.0.9")).await.unwrap();
        assert!(entry.is_new());
        assert_eq!(entry.record().attempt_count, 0);
        assert_eq!(entry.record().last_ip.as_deref(), Some("10.0.0.9"));
    }

    #[tokio::test]
    async fn dropped_entry_keeps_committed_state() {
        let backend = MemoryBackend::new();
        let entry = backend.acquire("bob", Some("10.0.0.1")).await.unwrap();
        entry.commit().await.unwrap();

        let mut entry = backend.acquire("bob", None).await.unwrap();
        let mut record = entry.record().clone();
        record.attempt_count = 2;
        entry.save(record).await.unwrap();
        drop(entry);

        let stored = backend.attempt_record("bob").await.unwrap();
        assert_eq!(stored.attempt_count, 0);
        assert_eq!(stored.last_ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn committed_entry_is_visible_and_not_new() {
        let backend = MemoryBackend::new();
        let mut entry = backend.acquire("bob", None).await.unwrap();
        let mut record = entry.record().clone();
        record.attempt_count = 1;
        entry.save(record).await.unwrap();
        entry.commit().await.unwrap();

        let entry = backend.acquire("bob", Some("10.0.0.2")).await.unwrap();
        assert!(!entry.is_new());
        assert_eq!(entry.record().attempt_count, 1);
        assert_eq!(entry.record().last_ip, None);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let backend = MemoryBackend::new();
        backend.insert_user("alice", "digest").await.unwrap();
        let err = backend.insert_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(name) if name == "alice"));
        assert_eq!(backend.user_count(), 1);
    }
}
