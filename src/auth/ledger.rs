use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::storage::{AttemptEntry, AttemptStore, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;
pub const DEFAULT_BLOCK_SECONDS: i64 = 60;

/// 登录失败锁定策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockoutPolicy {
    /// 触发锁定的连续失败次数
    pub max_attempts: i32,
    /// 锁定时长
    pub block_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            block_duration: Duration::seconds(DEFAULT_BLOCK_SECONDS),
        }
    }
}

/// 单个用户名的登录尝试记录，用户名不要求已注册
#[derive(Debug, Clone, PartialEq)]
pub struct LoginAttemptRecord {
    pub username: String,
    pub attempt_count: i32,
    pub blocked_until: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
}

impl LoginAttemptRecord {
    pub fn new(username: &str, last_ip: Option<String>) -> Self {
        Self {
            username: username.to_string(),
            attempt_count: 0,
            blocked_until: None,
            last_ip,
        }
    }

    /// 仍处于锁定窗口内时返回解锁时间。过期的 blocked_until 直接忽略
    pub fn locked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.blocked_until.filter(|until| now < *until)
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until(now).is_some()
    }

    /// 失败计数加一，达到上限时设置锁定。返回本次是否设置了锁定
    pub fn register_failure(&mut self, policy: &LockoutPolicy, now: DateTime<Utc>) -> bool {
        self.attempt_count = self.attempt_count.saturating_add(1);
        if self.attempt_count >= policy.max_attempts {
            self.blocked_until = Some(
                now.checked_add_signed(policy.block_duration)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            return true;
        }
        false
    }

    pub fn register_success(&mut self) {
        self.attempt_count = 0;
        self.blocked_until = None;
    }

    pub fn remaining_attempts(&self, policy: &LockoutPolicy) -> i32 {
        (policy.max_attempts - self.attempt_count).max(0)
    }
}

/// 登录尝试账本，所有修改都在 AttemptStore 提供的单用户名作用域内完成
pub struct AttemptLedger<A> {
    store: Arc<A>,
    policy: LockoutPolicy,
}

impl<A: AttemptStore> AttemptLedger<A> {
    pub fn new(store: Arc<A>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub async fn get_or_create(
        &self,
        username: &str,
        client_ip: Option<&str>,
    ) -> Result<A::Entry, StoreError> {
        let entry = self.store.acquire(username, client_ip).await?;
        if entry.is_new() {
            info!("为用户 {} 创建登录尝试记录 (ip: {:?})", username, client_ip);
        }
        Ok(entry)
    }

    pub async fn record_failure(
        &self,
        entry: &mut A::Entry,
        now: DateTime<Utc>,
    ) -> Result<(LoginAttemptRecord, bool), StoreError> {
        let mut record = entry.record().clone();
        let locked = record.register_failure(&self.policy, now);
        if locked {
            warn!(
                "用户 {} 连续失败 {} 次，锁定至 {:?}",
                record.username, record.attempt_count, record.blocked_until
            );
        } else {
            warn!(
                "用户 {} 登录失败，当前失败次数: {}",
                record.username, record.attempt_count
            );
        }
        entry.save(record.clone()).await?;
        Ok((record, locked))
    }

    pub async fn record_success(
        &self,
        entry: &mut A::Entry,
    ) -> Result<LoginAttemptRecord, StoreError> {
        let mut record = entry.record().clone();
        record.register_success();
        debug!("重置用户 {} 的登录尝试次数", record.username);
        entry.save(record.clone()).await?;
        Ok(record)
    }

    pub fn is_locked(&self, record: &LoginAttemptRecord, now: DateTime<Utc>) -> bool {
        record.is_locked(now)
    }

    pub fn locked_until(
        &self,
        record: &LoginAttemptRecord,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        record.locked_until(now)
    }
}
