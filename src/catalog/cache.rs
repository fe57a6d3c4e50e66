//! Screenshot artifact cache.
//!
//! Maps (kind, item, language) to the attachment URL of the published
//! artifact plus the raw source date it was rendered from. Names are
//! canonicalized to lowercase on both write and read so lookups never depend
//! on the caller's casing.

use anyhow::Context as _;
use sqlx::SqlitePool;

use crate::content::ContentKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub source_updated_at: String,
}

impl CacheEntry {
    /// The one freshness rule: an artifact is reusable exactly when it was
    /// rendered from the item's current date. Raw string comparison, no
    /// parsing.
    pub fn is_fresh(&self, item_updated_at: &str) -> bool {
        self.source_updated_at == item_updated_at
    }
}

#[derive(Clone)]
pub struct ImageCache {
    pool: SqlitePool,
}

impl ImageCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn lookup(
        &self,
        kind: ContentKind,
        name: &str,
        language: &str,
    ) -> crate::Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT url, date FROM content_images WHERE type = ? AND name = ? AND language = ?",
        )
        .bind(kind.api_route())
        .bind(name.to_lowercase())
        .bind(language)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load cached artifact")?;

        Ok(row.map(|row| CacheEntry {
            url: row.try_get("url").unwrap_or_default(),
            source_updated_at: row.try_get("date").unwrap_or_default(),
        }))
    }

    /// Record a published artifact. Overwrites any previous entry for the
    /// same (kind, item, language).
    pub async fn put(
        &self,
        kind: ContentKind,
        name: &str,
        language: &str,
        url: &str,
        source_updated_at: &str,
    ) -> crate::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_images (type, name, language, url, date)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (type, name, language) DO UPDATE
            SET url = excluded.url, date = excluded.date
            "#,
        )
        .bind(kind.api_route())
        .bind(name.to_lowercase())
        .bind(language)
        .bind(url)
        .bind(source_updated_at)
        .execute(&self.pool)
        .await
        .context("failed to save cached artifact")?;
        Ok(())
    }
}

use sqlx::Row as _;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn put_then_lookup_round_trips() {
        let cache = ImageCache::new(connect_in_memory().await);
        cache
            .put(
                ContentKind::Weapon,
                "Plasma Rifle",
                "en",
                "https://cdn.example/a.png",
                "2025-01-01T10:00:00Z",
            )
            .await
            .unwrap();

        let entry = cache
            .lookup(ContentKind::Weapon, "Plasma Rifle", "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.url, "https://cdn.example/a.png");
        assert!(entry.is_fresh("2025-01-01T10:00:00Z"));
        assert!(!entry.is_fresh("2025-02-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn lookups_ignore_name_casing() {
        let cache = ImageCache::new(connect_in_memory().await);
        cache
            .put(ContentKind::Hero, "IRON Sentinel", "fr", "https://cdn.example/b.png", "2025-01-01")
            .await
            .unwrap();

        let entry = cache
            .lookup(ContentKind::Hero, "iron sentinel", "fr")
            .await
            .unwrap();
        assert!(entry.is_some());
    }

    #[tokio::test]
    async fn entries_are_scoped_by_language_and_kind() {
        let cache = ImageCache::new(connect_in_memory().await);
        cache
            .put(ContentKind::Map, "Polaris", "en", "https://cdn.example/c.png", "2025-01-01")
            .await
            .unwrap();

        assert!(cache
            .lookup(ContentKind::Map, "Polaris", "fr")
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .lookup(ContentKind::Mode, "Polaris", "en")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn a_second_put_replaces_the_entry() {
        let cache = ImageCache::new(connect_in_memory().await);
        cache
            .put(ContentKind::Weapon, "Falcon", "en", "https://cdn.example/old.png", "2025-01-01")
            .await
            .unwrap();
        cache
            .put(ContentKind::Weapon, "Falcon", "en", "https://cdn.example/new.png", "2025-02-01")
            .await
            .unwrap();

        let entry = cache
            .lookup(ContentKind::Weapon, "Falcon", "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.url, "https://cdn.example/new.png");
        assert_eq!(entry.source_updated_at, "2025-02-01");
    }
}
