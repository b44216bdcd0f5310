use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{minutes_remaining, AuthError, AuthMiddleware, TokenIssuer};
use crate::storage::{AttemptStore, CredentialStore};

mod handlers;

pub use handlers::{login, me, register};

// 统一响应结构体
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: &str, data: Value) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn fail(message: String, data: Option<Value>) -> Self {
        Self {
            success: false,
            message,
            data,
        }
    }
}

/// 把认证结果映射为 HTTP 响应，致命错误不向客户端暴露细节
pub fn error_response(err: &AuthError) -> HttpResponse {
    match err {
        AuthError::DuplicateUsername => {
            HttpResponse::BadRequest().json(ApiResponse::fail(err.to_string(), None))
        }
        AuthError::Locked {
            retry_after,
            blocked_until,
        } => HttpResponse::Forbidden().json(ApiResponse::fail(
            err.to_string(),
            Some(json!({
                "retry_after_seconds": retry_after.num_seconds().max(0),
                "retry_after_minutes": minutes_remaining(retry_after),
                "blocked_until": blocked_until,
            })),
        )),
        AuthError::InvalidCredentials { remaining } => HttpResponse::BadRequest().json(
            ApiResponse::fail(err.to_string(), Some(json!({ "remaining_attempts": remaining }))),
        ),
        AuthError::InvalidToken | AuthError::Expired => {
            HttpResponse::Unauthorized().json(ApiResponse::fail(err.to_string(), None))
        }
        AuthError::Hash(_) | AuthError::Signing(_) | AuthError::Store(_) => {
            HttpResponse::InternalServerError()
                .json(ApiResponse::fail("服务器内部错误".to_string(), None))
        }
    }
}

/// 注册 /register、/token 与受保护的 /me
pub fn configure<C, A>(cfg: &mut web::ServiceConfig, tokens: Arc<TokenIssuer>)
where
    C: CredentialStore + 'static,
    A: AttemptStore + 'static,
{
    cfg.route("/register", web::post().to(register::<C, A>))
        .route("/token", web::post().to(login::<C, A>))
        .service(
            web::resource("/me")
                .wrap(AuthMiddleware::new(tokens))
                .route(web::get().to(me)),
        );
}
