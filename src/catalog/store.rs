//! Persistence for mirrored catalog items.
//!
//! Rows are only ever inserted or updated. An item the API stops listing
//! stays on record so the channels that already show it keep being
//! maintained.

use anyhow::Context as _;
use sqlx::SqlitePool;

use crate::catalog::ContentItem;
use crate::content::ContentKind;

#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new item or refresh the date of a known one.
    pub async fn upsert(&self, kind: ContentKind, name: &str, date: &str) -> crate::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_items (type, name, date)
            VALUES (?, ?, ?)
            ON CONFLICT (type, name) DO UPDATE SET date = excluded.date
            "#,
        )
        .bind(kind.api_route())
        .bind(name)
        .bind(date)
        .execute(&self.pool)
        .await
        .context("failed to save catalog item")?;
        Ok(())
    }

    pub async fn get(&self, kind: ContentKind, name: &str) -> crate::Result<Option<ContentItem>> {
        let row = sqlx::query("SELECT name, date FROM content_items WHERE type = ? AND name = ?")
            .bind(kind.api_route())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load catalog item")?;

        Ok(row.map(|row| ContentItem {
            kind,
            name: row.try_get("name").unwrap_or_default(),
            updated_at: row.try_get("date").unwrap_or_default(),
        }))
    }

    /// All persisted items of a kind, oldest first. This is the listing the
    /// sync pipeline works from, so items missing from one API response are
    /// still refreshed.
    pub async fn list(&self, kind: ContentKind) -> crate::Result<Vec<ContentItem>> {
        let rows = sqlx::query("SELECT name, date FROM content_items WHERE type = ? ORDER BY id")
            .bind(kind.api_route())
            .fetch_all(&self.pool)
            .await
            .context("failed to list catalog items")?;

        Ok(rows
            .into_iter()
            .map(|row| ContentItem {
                kind,
                name: row.try_get("name").unwrap_or_default(),
                updated_at: row.try_get("date").unwrap_or_default(),
            })
            .collect())
    }
}

use sqlx::Row as _;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = CatalogStore::new(connect_in_memory().await);
        store
            .upsert(ContentKind::Weapon, "Plasma Rifle", "2025-01-01T10:00:00Z")
            .await
            .unwrap();

        let item = store
            .get(ContentKind::Weapon, "Plasma Rifle")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.name, "Plasma Rifle");
        assert_eq!(item.updated_at, "2025-01-01T10:00:00Z");
    }

    #[tokio::test]
    async fn second_upsert_refreshes_the_date() {
        let store = CatalogStore::new(connect_in_memory().await);
        store
            .upsert(ContentKind::Mode, "Domination", "2025-01-01T10:00:00Z")
            .await
            .unwrap();
        store
            .upsert(ContentKind::Mode, "Domination", "2025-02-01T08:30:00Z")
            .await
            .unwrap();

        let items = store.list(ContentKind::Mode).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].updated_at, "2025-02-01T08:30:00Z");
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_kind_and_keeps_order() {
        let store = CatalogStore::new(connect_in_memory().await);
        store
            .upsert(ContentKind::Map, "Polaris", "2025-01-01")
            .await
            .unwrap();
        store
            .upsert(ContentKind::Map, "Artefact", "2025-01-02")
            .await
            .unwrap();
        store
            .upsert(ContentKind::Hero, "Sentinel", "2025-01-03")
            .await
            .unwrap();

        let maps = store.list(ContentKind::Map).await.unwrap();
        let names: Vec<&str> = maps.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Polaris", "Artefact"]);
        assert!(store.get(ContentKind::Hero, "Polaris").await.unwrap().is_none());
    }
}
