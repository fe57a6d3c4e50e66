//! REST client for the site's Discord API.
//!
//! Every fetch fails soft: a network error, a non-2xx status or a malformed
//! payload logs and yields an empty result, so a bad cycle never clears
//! state that previous cycles persisted.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use crate::content::ContentKind;

/// One item as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiItem {
    pub name: String,
    pub date: String,
}

pub struct CatalogApi {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogApi {
    /// `base_url` is the full route prefix, e.g.
    /// `https://ebp.gg/back/api-discord/?route=`.
    pub fn new(base_url: impl Into<String>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch the item listing for a kind.
    pub async fn fetch_items(&self, kind: ContentKind) -> Vec<ApiItem> {
        match self.get_json::<Vec<ApiItem>>(kind.api_route()).await {
            Ok(items) => items,
            Err(error) => {
                tracing::error!(kind = %kind, %error, "catalog listing fetch failed");
                Vec::new()
            }
        }
    }

    /// Fetch the per-language page base URLs for a kind.
    pub async fn fetch_base_urls(&self, kind: ContentKind) -> HashMap<String, String> {
        let route = format!("{}_urls", kind.api_route());
        match self.get_json::<HashMap<String, String>>(&route).await {
            Ok(urls) => urls,
            Err(error) => {
                tracing::error!(kind = %kind, %error, "catalog url fetch failed");
                HashMap::new()
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, route: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, route);
        let payload = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("request to {url} rejected"))?
            .json()
            .await
            .with_context(|| format!("response from {url} is not the expected shape"))?;
        Ok(payload)
    }
}
