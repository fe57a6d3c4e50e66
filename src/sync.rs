//! Synchronization pipeline.
//!
//! A cycle runs in two stages: pull the catalog and refresh artifacts, then
//! reconcile every bound channel against the resulting snapshot. The
//! snapshot is built once per cycle and read-only afterwards, so every part
//! of the pipeline sees the same catalog state.

pub mod engine;
pub mod reconciler;

pub use engine::{RefreshSummary, SyncEngine};
pub use reconciler::{ReconcileOutcome, Reconciler};

use std::collections::HashMap;

use crate::catalog::ContentItem;
use crate::content::ContentKind;

/// Catalog state for one pass: items and per-language page base URLs for
/// each kind.
#[derive(Debug, Default, Clone)]
pub struct CatalogSnapshot {
    items: HashMap<ContentKind, Vec<ContentItem>>,
    base_urls: HashMap<ContentKind, HashMap<String, String>>,
}

impl CatalogSnapshot {
    pub fn insert(
        &mut self,
        kind: ContentKind,
        items: Vec<ContentItem>,
        base_urls: HashMap<String, String>,
    ) {
        self.items.insert(kind, items);
        self.base_urls.insert(kind, base_urls);
    }

    pub fn items(&self, kind: ContentKind) -> &[ContentItem] {
        self.items.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn base_url(&self, kind: ContentKind, language: &str) -> Option<&str> {
        self.base_urls
            .get(&kind)
            .and_then(|urls| urls.get(language))
            .map(String::as_str)
    }
}
