//! Database layer for Forge.
//!
//! Provides the SQLite connection pool and the chat history queries.

mod chat_history;

pub use chat_history::*;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Initialize the database connection pool.
///
/// Creates parent directories if needed. An in-memory database gets a
/// single connection so every query sees the same data.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    let in_memory = path == ":memory:";

    if !in_memory {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .journal_mode(if in_memory {
            SqliteJournalMode::Memory
        } else {
            SqliteJournalMode::Wal
        })
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .pragma("temp_store", "memory");

    let max_connections = if in_memory { 1 } else { 10 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let schema = include_str!("../../schema.sql");

    info!("Initializing database schema");

    for statement in schema_statements(schema) {
        sqlx::query(&statement).execute(pool).await?;
    }

    info!("Database schema initialized successfully");

    Ok(())
}

/// Split a schema into statements. Comment lines are dropped first so a
/// `;` inside a comment never breaks a statement apart.
fn schema_statements(schema: &str) -> Vec<String> {
    let sql: String = schema
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_in_memory() {
        let pool = init_pool(":memory:").await.unwrap();
        assert!(pool.size() > 0);
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(table_names, vec!["chat_history"]);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/forge.db");
        let pool = init_pool(path.to_str().unwrap()).await.unwrap();
        initialize_schema(&pool).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_semicolons_in_comments_do_not_split_statements() {
        let schema = "-- applied at startup; keep idempotent\nCREATE TABLE a (id INTEGER);\n-- second; table\nCREATE TABLE b (id INTEGER);\n";
        let statements = schema_statements(schema);
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INTEGER)", "CREATE TABLE b (id INTEGER)"]
        );
    }

    #[test]
    fn test_bundled_schema_has_only_sql_statements() {
        let statements = schema_statements(include_str!("../../schema.sql"));
        assert!(!statements.is_empty());
        assert!(statements
            .iter()
            .all(|s| s.starts_with("CREATE TABLE") || s.starts_with("CREATE INDEX")));
    }
}
