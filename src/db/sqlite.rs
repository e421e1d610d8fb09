use crate::db::models::DbSession;
use crate::db::schema::SQLITE_INIT;
use crate::error::FirebaseError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct SessionStorage {
    pool: SqlitePool,
    schema_ready: Arc<OnceCell<()>>,
}

impl SessionStorage {
    /// Build the pool without opening a connection; the schema is created on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self, FirebaseError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(connect_opts);
        Ok(Self::new(pool))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), FirebaseError> {
        self.schema_ready
            .get_or_try_init(|| async {
                for stmt in SQLITE_INIT.split(';') {
                    let s = stmt.trim();
                    if s.is_empty() {
                        continue;
                    }
                    sqlx::query(s).execute(&self.pool).await?;
                }
                debug!("auth session schema ready");
                Ok::<(), FirebaseError>(())
            })
            .await?;
        Ok(())
    }

    /// Insert or replace the session stored under `session.storage_key`.
    pub async fn save(&self, session: DbSession) -> Result<(), FirebaseError> {
        self.init_schema().await?;
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (storage_key, user_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(storage_key) DO UPDATE SET
                user_json=excluded.user_json,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(session.storage_key)
        .bind(session.user_json)
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, storage_key: &str) -> Result<Option<DbSession>, FirebaseError> {
        self.init_schema().await?;
        let row = sqlx::query(
            r#"SELECT storage_key, user_json, updated_at
               FROM auth_sessions WHERE storage_key = ?"#,
        )
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn remove(&self, storage_key: &str) -> Result<(), FirebaseError> {
        self.init_schema().await?;
        sqlx::query("DELETE FROM auth_sessions WHERE storage_key = ?")
            .bind(storage_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<DbSession, FirebaseError> {
        let storage_key: String = row.try_get("storage_key")?;
        let user_json: String = row.try_get("user_json")?;
        let updated_str: String = row.try_get("updated_at")?;

        let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);

        Ok(DbSession {
            storage_key,
            user_json,
            updated_at,
        })
    }
}
