//! Session storage backed by the `sessions` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use super::SessionStore;
use crate::{
    error::AppError,
    models::{SessionRecord, SessionState},
};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    state: Json<SessionState>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            key: row.id,
            state: row.state.0,
            expires_at: row.expires_at,
        }
    }
}

pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, key: &str) -> Result<Option<SessionRecord>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, state, expires_at FROM sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, state, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET state = EXCLUDED.state, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.key)
        .bind(Json(&record.state))
        .bind(record.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(key)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
