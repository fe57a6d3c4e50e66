//! Catalog data model and the services that keep it current.

pub mod api;
pub mod cache;
pub mod store;

pub use api::CatalogApi;
pub use cache::ImageCache;
pub use store::CatalogStore;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::content::ContentKind;

/// One catalog entry as mirrored from the site API. `updated_at` is kept as
/// the raw API string; freshness comparisons are raw string equality so a
/// format change upstream reads as an update, never as silent staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub name: String,
    pub updated_at: String,
}

/// Render a raw item date for display, `dd/mm/yyyy hh:mm` in UTC. Returns a
/// placeholder on unparseable input so a bad API date can never panic the
/// pipeline.
pub fn format_item_date(raw: &str) -> String {
    parse_item_date(raw)
        .map(|date| date.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "Invalid date".to_string())
}

fn parse_item_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_dates_render_in_utc() {
        assert_eq!(format_item_date("2025-01-01T10:00:00Z"), "01/01/2025 10:00");
        assert_eq!(
            format_item_date("2025-01-01T10:00:00+02:00"),
            "01/01/2025 08:00"
        );
    }

    #[test]
    fn plain_timestamps_parse_too() {
        assert_eq!(format_item_date("2024-11-30 23:59:59"), "30/11/2024 23:59");
        assert_eq!(format_item_date("2024-11-30"), "30/11/2024 00:00");
    }

    #[test]
    fn garbage_renders_a_placeholder() {
        assert_eq!(format_item_date("soon"), "Invalid date");
        assert_eq!(format_item_date(""), "Invalid date");
    }
}
