use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{error_response, ApiResponse};
use crate::auth::{AuthError, Claims, IssuedToken};
use crate::storage::{AttemptStore, CredentialStore};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "用户名长度必须在1到64个字符之间"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "密码长度必须在1到128个字符之间"))]
    pub password: String,
}

// OAuth2 password 表单，其余字段忽略
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

fn token_response(message: &str, token: IssuedToken) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(message, json!(token)))
}

fn log_failure(action: &str, username: &str, err: &AuthError) {
    if err.is_fatal() {
        error!("{}失败 ({}): {}", action, username, err);
    } else {
        warn!("{}失败 ({}): {}", action, username, err);
    }
}

pub async fn register<C, A>(
    body: web::Json<RegisterRequest>,
    data: web::Data<AppState<C, A>>,
) -> HttpResponse
where
    C: CredentialStore + 'static,
    A: AttemptStore + 'static,
{
    info!("开始处理注册请求");

    if let Err(e) = body.validate() {
        warn!("注册参数验证失败: {}", e);
        return HttpResponse::BadRequest().json(ApiResponse::fail(e.to_string(), None));
    }

    match data
        .authenticator
        .register(&body.username, &body.password)
        .await
    {
        Ok(token) => token_response("注册成功", token),
        Err(e) => {
            log_failure("注册", &body.username, &e);
            error_response(&e)
        }
    }
}

pub async fn login<C, A>(
    form: web::Form<LoginForm>,
    req: HttpRequest,
    data: web::Data<AppState<C, A>>,
) -> HttpResponse
where
    C: CredentialStore + 'static,
    A: AttemptStore + 'static,
{
    let client_ip = req.peer_addr().map(|addr| addr.ip().to_string());
    debug!("收到登录请求: {} (ip: {:?})", form.username, client_ip);

    match data
        .authenticator
        .login(
            &form.username,
            &form.password,
            client_ip.as_deref(),
            Utc::now(),
        )
        .await
    {
        Ok(token) => token_response("登录成功", token),
        Err(e) => {
            log_failure("登录", &form.username, &e);
            error_response(&e)
        }
    }
}

pub async fn me(claims: web::ReqData<Claims>) -> HttpResponse {
    debug!("查询当前用户: {}", claims.sub);
    HttpResponse::Ok().json(ApiResponse::ok(
        "ok",
        json!({ "username": claims.sub }),
    ))
}
