use async_trait::async_trait;
use serde_json::Value;
use tokio_rusqlite::{params, Connection, OptionalExtension, Result};

use crate::cache::KeyValueStore;
use crate::error::FeedError;

pub async fn init_db(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path).await?;
    create_schema(&conn).await?;
    Ok(conn)
}

async fn create_schema(conn: &Connection) -> Result<()> {
    conn.call(|conn| {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
                )",
            [],
        )?;
        Ok(())
    })
    .await
}

/// Key-value store kept in SQLite so cached feeds and settings outlive the
/// process. Values are stored as JSON text.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(db_path: &str) -> Result<Self> {
        Ok(Self {
            conn: init_db(db_path).await?,
        })
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        create_schema(&conn).await?;
        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<Value>, FeedError> {
        let key = key.to_string();
        let text = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?")?;
                let value = stmt
                    .query_row(params![key], |row| row.get::<_, String>(0))
                    .optional()?;
                Ok(value)
            })
            .await?;

        match text {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> std::result::Result<(), FeedError> {
        let key = key.to_string();
        let text = serde_json::to_string(&value)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, text],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
