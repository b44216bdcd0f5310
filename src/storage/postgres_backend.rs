use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::{LoginAttemptRecord, User};
use crate::storage::{AttemptEntry, AttemptStore, CredentialStore, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_digest: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    username: String,
    attempts: i32,
    blocked_until: Option<DateTime<Utc>>,
    ip_address: Option<String>,
}

impl From<AttemptRow> for LoginAttemptRecord {
    fn from(row: AttemptRow) -> Self {
        LoginAttemptRecord {
            username: row.username,
            attempt_count: row.attempts,
            blocked_until: row.blocked_until,
            last_ip: row.ip_address,
        }
    }
}

fn backend_error(context: &str, e: sqlx::Error) -> StoreError {
    error!("{}: {}", context, e);
    StoreError::Backend(format!("{}: {}", context, e))
}

#[async_trait]
impl CredentialStore for PostgresBackend {
    async fn insert_user(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<User, StoreError> {
        let user_id = Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(password_digest)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    return StoreError::Conflict(username.to_string());
                }
            }
            backend_error("创建用户失败", e)
        })?;

        debug!("用户 {} 已写入, id: {}", username, row.id);
        Ok(row.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend_error("查询用户失败", e))?;

        Ok(row.map(User::from))
    }
}

pub struct PostgresAttemptEntry {
    tx: Transaction<'static, Postgres>,
    record: LoginAttemptRecord,
    is_new: bool,
}

#[async_trait]
impl AttemptStore for PostgresBackend {
    type Entry = PostgresAttemptEntry;

    async fn acquire(
        &self,
        username: &str,
        client_ip: Option<&str>,
    ) -> Result<PostgresAttemptEntry, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend_error("开启事务失败", e))?;

        // 并发的同名插入会在唯一索引上等待，随后 DO NOTHING
        let inserted = sqlx::query(
            r#"
            INSERT INTO login_attempts (username, attempts, blocked_until, ip_address)
            VALUES ($1, 0, NULL, $2)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(client_ip)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend_error("创建登录尝试记录失败", e))?
        .rows_affected()
            == 1;

        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT username, attempts, blocked_until, ip_address
            FROM login_attempts
            WHERE username = $1
            FOR UPDATE
            "#,
        )
        .bind(username)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| backend_error("锁定登录尝试记录失败", e))?;

        if inserted {
            debug!("为 {} 新建登录尝试记录", username);
        }

        Ok(PostgresAttemptEntry {
            tx,
            record: row.into(),
            is_new: inserted,
        })
    }
}

#[async_trait]
impl AttemptEntry for PostgresAttemptEntry {
    fn record(&self) -> &LoginAttemptRecord {
        &self.record
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    async fn save(&mut self, record: LoginAttemptRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE login_attempts
            SET attempts = $2, blocked_until = $3, ip_address = $4
            WHERE username = $1
            "#,
        )
        .bind(&record.username)
        .bind(record.attempt_count)
        .bind(record.blocked_until)
        .bind(&record.last_ip)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| backend_error("更新登录尝试记录失败", e))?;

        self.record = record;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| backend_error("提交事务失败", e))
    }
}
