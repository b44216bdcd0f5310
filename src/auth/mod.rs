mod authenticator;
mod credentials;
mod error;
mod jwt;
mod ledger;
mod middleware;
mod types;

pub use authenticator::Authenticator;
pub use credentials::PasswordHasher;
pub use error::{minutes_remaining, AuthError};
pub use jwt::{TokenConfig, TokenIssuer, DEFAULT_TOKEN_TTL_MINUTES};
pub use ledger::{LockoutPolicy, LoginAttemptRecord, DEFAULT_BLOCK_SECONDS, DEFAULT_MAX_ATTEMPTS};
pub use middleware::AuthMiddleware;
pub use types::{Claims, IssuedToken, User};
