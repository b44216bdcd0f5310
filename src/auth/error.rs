use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("用户名已被注册")]
    DuplicateUsername,

    #[error("尝试次数过多，账户已锁定，请在 {} 分钟后重试", minutes_remaining(.retry_after))]
    Locked {
        retry_after: Duration,
        blocked_until: DateTime<Utc>,
    },

    #[error("用户名或密码错误，剩余尝试次数: {remaining}")]
    InvalidCredentials { remaining: i32 },

    #[error("无效的 token")]
    InvalidToken,

    #[error("token 已过期")]
    Expired,

    #[error("密码处理失败: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token 签发失败: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// 存储、哈希、签名失败属于服务端故障，其余均为调用方可处理的结果
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::Hash(_) | AuthError::Signing(_) | AuthError::Store(_)
        )
    }
}

/// 向上取整的剩余分钟数，不足一分钟按一分钟计
pub fn minutes_remaining(retry_after: &Duration) -> i64 {
    let secs = retry_after.num_seconds().max(0);
    ((secs + 59) / 60).max(1)
}
