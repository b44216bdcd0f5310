mod api;
mod auth;
mod config;
mod db;
mod logger;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use auth::{Authenticator, PasswordHasher, TokenIssuer};
use config::AppConfig;
use storage::PostgresBackend;

// 应用状态
pub struct AppState<C, A> {
    pub authenticator: Authenticator<C, A>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载 .env
    dotenv().ok();

    let config = AppConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("配置错误: {}", e)))?;

    // 初始化日志系统
    if let Err(e) = logger::init(&config) {
        eprintln!("初始化日志系统失败: {}", e);
    }

    info!("应用程序启动");

    // 连接数据库
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("数据库连接错误: {}", e)))?;

    // 初始化数据库
    db::initialize_db(pool.clone())
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("数据库初始化错误: {}", e)))?;

    let backend = Arc::new(PostgresBackend::new(pool));
    let tokens = Arc::new(TokenIssuer::new(&config.token));
    let authenticator = Authenticator::new(
        backend.clone(),
        backend,
        PasswordHasher::new(config.bcrypt_cost),
        config.lockout,
        tokens.clone(),
    );

    let app_state = web::Data::new(AppState { authenticator });

    info!("服务器启动在 http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let tokens = tokens.clone();
        App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(move |cfg| {
                api::configure::<PostgresBackend, PostgresBackend>(cfg, tokens)
            })
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
