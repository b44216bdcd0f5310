use bcrypt::{hash, verify};
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::error::AuthError;
use super::types::User;
use crate::storage::{CredentialStore, StoreError};

/// bcrypt 密码哈希
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        debug!("加密密码");
        hash(password.as_bytes(), self.cost).map_err(|e| {
            error!("密码加密失败: {}", e);
            AuthError::Hash(e)
        })
    }

    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        verify(password, digest).map_err(|e| {
            error!("密码验证过程出错: {}", e);
            AuthError::Hash(e)
        })
    }
}

pub struct CredentialService<C> {
    store: Arc<C>,
    hasher: PasswordHasher,
    // 用户不存在时用它做一次同成本的校验
    dummy_digest: Option<String>,
}

impl<C: CredentialStore> CredentialService<C> {
    pub fn new(store: Arc<C>, hasher: PasswordHasher) -> Self {
        let dummy_digest = hasher.hash("authgate-dummy-password").ok();
        Self {
            store,
            hasher,
            dummy_digest,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        if self.store.find_by_username(username).await?.is_some() {
            warn!("用户名已存在: {}", username);
            return Err(AuthError::DuplicateUsername);
        }

        let digest = self.hasher.hash(password)?;
        // 并发注册由唯一约束兜底
        match self.store.insert_user(username, &digest).await {
            Ok(user) => {
                info!("用户注册成功: {}", username);
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => {
                warn!("用户名已存在: {}", username);
                Err(AuthError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.store.find_by_username(username).await?)
    }

    /// 用户存在且密码匹配时返回 true，不区分两种失败
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        match self.find_by_username(username).await? {
            Some(user) => {
                let ok = self.hasher.verify(password, &user.password_digest)?;
                if !ok {
                    debug!("用户 {} 密码不匹配", username);
                }
                Ok(ok)
            }
            None => {
                debug!("用户 {} 不存在", username);
                if let Some(digest) = &self.dummy_digest {
                    self.hasher.verify(password, digest)?;
                }
                Ok(false)
            }
        }
    }
}
