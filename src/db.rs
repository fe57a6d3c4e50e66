//! SQLite pool setup and migrations.

use std::path::Path;

use anyhow::Context as _;
use sqlx::SqlitePool;

/// Open (creating if needed) the instance database and bring the schema up
/// to date.
pub async fn connect(instance_dir: &Path) -> crate::Result<SqlitePool> {
    let path = instance_dir.join("armorybot.db");
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let pool = SqlitePool::connect(&url)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(pool)
}

#[cfg(test)]
pub async fn connect_in_memory() -> SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let options = SqliteConnectOptions::new().in_memory(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
