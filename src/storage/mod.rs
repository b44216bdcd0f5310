use async_trait::async_trait;
use thiserror::Error;

use crate::auth::{LoginAttemptRecord, User};

#[cfg(test)]
pub mod memory_backend;
pub mod postgres_backend;

#[cfg(test)]
pub use memory_backend::MemoryBackend;
pub use postgres_backend::PostgresBackend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("记录已存在: {0}")]
    Conflict(String),

    #[error("存储错误: {0}")]
    Backend(String),
}

/// 用户凭据存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 写入新用户，用户名冲突时返回 `StoreError::Conflict`
    async fn insert_user(&self, username: &str, password_digest: &str)
        -> Result<User, StoreError>;

    /// 按用户名查找用户
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

/// 登录尝试记录存储
#[async_trait]
pub trait AttemptStore: Send + Sync {
    type Entry: AttemptEntry;

    /// 打开该用户名的原子作用域并锁定记录，不存在时以 client_ip 创建
    async fn acquire(
        &self,
        username: &str,
        client_ip: Option<&str>,
    ) -> Result<Self::Entry, StoreError>;
}

/// 已锁定的单条登录尝试记录。未 commit 即 drop 时所有修改回滚
#[async_trait]
pub trait AttemptEntry: Send + Sized {
    fn record(&self) -> &LoginAttemptRecord;

    /// 记录是否在本次作用域中新建
    fn is_new(&self) -> bool;

    async fn save(&mut self, record: LoginAttemptRecord) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
