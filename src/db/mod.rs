use crate::storage::StoreError;
use log::{error, info};
use sqlx::PgPool;

pub struct DbInitializer {
    pool: PgPool,
}

impl DbInitializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 初始化用户表
    pub async fn init_user_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR PRIMARY KEY,
                username VARCHAR UNIQUE NOT NULL,
                password_hash VARCHAR NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("创建用户表失败: {}", e)))?;

        Ok(())
    }

    /// 初始化登录尝试表，每个用户名一行
    pub async fn init_attempt_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                username VARCHAR PRIMARY KEY,
                attempts INTEGER NOT NULL DEFAULT 0 CHECK (attempts >= 0),
                blocked_until TIMESTAMPTZ,
                ip_address VARCHAR
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("创建登录尝试表失败: {}", e)))?;

        // 检查是否需要添加列
        let existing_columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_name = 'login_attempts'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("检查登录尝试表列失败: {}", e)))?;

        if !existing_columns.iter().any(|c| c == "ip_address") {
            sqlx::query("ALTER TABLE login_attempts ADD COLUMN ip_address VARCHAR")
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("添加ip_address列失败: {}", e)))?;
        }

        Ok(())
    }
}

/// 初始化所有数据库表
pub async fn initialize_db(pool: PgPool) -> Result<(), StoreError> {
    info!("开始初始化数据库...");
    let initializer = DbInitializer::new(pool);

    initializer.init_user_tables().await.map_err(|e| {
        error!("用户表初始化失败: {:?}", e);
        e
    })?;

    initializer.init_attempt_tables().await.map_err(|e| {
        error!("登录尝试表初始化失败: {:?}", e);
        e
    })?;

    info!("数据库初始化完成");
    Ok(())
}
