use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

use super::credentials::{CredentialService, PasswordHasher};
use super::error::AuthError;
use super::jwt::TokenIssuer;
use super::ledger::{AttemptLedger, LockoutPolicy};
use super::types::IssuedToken;
use crate::storage::{AttemptEntry, AttemptStore, CredentialStore};

/// 登录编排：先查锁定，再校验凭据，最后更新账本并签发 token
pub struct Authenticator<C, A> {
    credentials: CredentialService<C>,
    ledger: AttemptLedger<A>,
    tokens: Arc<TokenIssuer>,
}

impl<C: CredentialStore, A: AttemptStore> Authenticator<C, A> {
    pub fn new(
        credential_store: Arc<C>,
        attempt_store: Arc<A>,
        hasher: PasswordHasher,
        policy: LockoutPolicy,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        info!(
            "初始化认证器: 最多 {} 次失败，锁定 {} 秒",
            policy.max_attempts,
            policy.block_duration.num_seconds()
        );
        Self {
            credentials: CredentialService::new(credential_store, hasher),
            ledger: AttemptLedger::new(attempt_store, policy),
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let user = self.credentials.register(username, password).await?;
        self.tokens.issue(&user.username)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        debug!("尝试登录用户: {}", username);
        let mut entry = self.ledger.get_or_create(username, client_ip).await?;

        // 锁定期间不查询凭据，也不增加计数
        if let Some(blocked_until) = self.ledger.locked_until(entry.record(), now) {
            entry.commit().await?;
            warn!("用户 {} 处于锁定状态，解锁时间: {}", username, blocked_until);
            return Err(AuthError::Locked {
                retry_after: blocked_until - now,
                blocked_until,
            });
        }

        if !self.credentials.verify(username, password).await? {
            let (record, locked) = self.ledger.record_failure(&mut entry, now).await?;
            entry.commit().await?;

            if let (true, Some(blocked_until)) = (locked, record.blocked_until) {
                return Err(AuthError::Locked {
                    retry_after: self.ledger.policy().block_duration,
                    blocked_until,
                });
            }
            return Err(AuthError::InvalidCredentials {
                remaining: record.remaining_attempts(self.ledger.policy()),
            });
        }

        self.ledger.record_success(&mut entry).await?;
        entry.commit().await?;
        info!("用户 {} 登录成功", username);

        // now 只用于锁定判断，token 有效期按实际时间计算
        self.tokens.issue(username)
    }
}
