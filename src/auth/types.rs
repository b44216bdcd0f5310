use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // username
    pub iat: usize,  // issued at
    pub exp: usize,  // expiration time
}

/// 已注册用户，password_digest 为 bcrypt 摘要
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

/// 签发给客户端的 bearer token
#[derive(Debug, Serialize, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
}

impl IssuedToken {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}
