use crate::auth::error::AuthError;
use crate::auth::types::{Claims, IssuedToken};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error, info, warn};
use std::fmt;

pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;

/// token 签名配置，只支持 HMAC 系列算法
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish()
    }
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(config.algorithm);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            header: Header::new(config.algorithm),
            validation,
            ttl: config.ttl,
        }
    }

    pub fn issue(&self, username: &str) -> Result<IssuedToken, AuthError> {
        self.issue_at(username, Utc::now())
    }

    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        debug!("为用户 {} 生成 JWT token", username);
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp()
                .max(0) as usize,
        };

        match encode(&self.header, &claims, &self.encoding_key) {
            Ok(token) => {
                info!("成功为用户 {} 生成 token", username);
                Ok(IssuedToken::bearer(token))
            }
            Err(e) => {
                error!("为用户 {} 生成 token 失败: {}", username, e);
                Err(AuthError::Signing(e))
            }
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        debug!("验证 JWT token");
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    warn!("token 已过期");
                    AuthError::Expired
                }
                _ => {
                    warn!("token 验证失败: {}", e);
                    AuthError::InvalidToken
                }
            })
    }
}
