//! Cycle orchestration.
//!
//! `run` waits for the gateway, primes the catalog once, then sweeps on the
//! configured interval. A sweep syncs the catalog (including artifact
//! refresh) and reconciles every bound channel of every server, channels in
//! parallel, kinds within one channel in order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration};

use crate::capture::{artifact_file_name, artifact_label, ArtifactPublisher, CaptureSession};
use crate::catalog::{format_item_date, CatalogApi, CatalogStore, ContentItem, ImageCache};
use crate::chat::{ChannelId, ChannelInfo, ChatClient, ServerId, TrackedMessage};
use crate::config::Config;
use crate::content::ContentKind;
use crate::error::CaptureError;
use crate::i18n::I18n;
use crate::sync::{CatalogSnapshot, Reconciler};

/// Aggregated result of a refresh, reported back to invoking commands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub channels: usize,
    pub sent: usize,
    pub edited: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RefreshSummary {
    pub fn absorb(&mut self, outcome: crate::sync::ReconcileOutcome) {
        self.sent += outcome.sent;
        self.edited += outcome.edited;
        self.skipped += outcome.skipped;
    }

    pub fn merge(&mut self, other: RefreshSummary) {
        self.channels += other.channels;
        self.sent += other.sent;
        self.edited += other.edited;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} channels: {} sent, {} edited, {} skipped, {} failed",
            self.channels, self.sent, self.edited, self.skipped, self.failed
        )
    }
}

pub struct SyncEngine<C> {
    chat: Arc<C>,
    store: CatalogStore,
    cache: ImageCache,
    api: CatalogApi,
    i18n: I18n,
    config: Arc<Config>,
    /// Snapshot from the most recent catalog sync, read by commands.
    latest: RwLock<Arc<CatalogSnapshot>>,
}

impl<C: ChatClient> SyncEngine<C> {
    pub fn new(
        chat: Arc<C>,
        pool: SqlitePool,
        api: CatalogApi,
        i18n: I18n,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store: CatalogStore::new(pool.clone()),
            cache: ImageCache::new(pool),
            chat,
            api,
            i18n,
            config,
            latest: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    pub fn chat(&self) -> &Arc<C> {
        &self.chat
    }

    pub fn i18n(&self) -> &I18n {
        &self.i18n
    }

    pub async fn latest_snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.latest.read().await)
    }

    /// Wait for the gateway, prime the catalog, then sweep on the interval.
    pub async fn run(self: Arc<Self>, mut ready: watch::Receiver<bool>) {
        if ready.wait_for(|connected| *connected).await.is_err() {
            return;
        }

        // The first pass only syncs the catalog; channels keep their state
        // until the first scheduled sweep or an explicit refresh command.
        self.sync_catalog().await;

        let mut ticker = interval(Duration::from_secs(self.config.sync.interval_secs));
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One full sweep: catalog sync plus a refresh of every server.
    pub async fn run_cycle(self: &Arc<Self>) {
        let snapshot = self.sync_catalog().await;

        let servers = match self.chat.servers().await {
            Ok(servers) => servers,
            Err(error) => {
                tracing::error!(%error, "server listing failed, skipping sweep");
                return;
            }
        };
        tracing::info!(server_count = servers.len(), "starting channel sweep");

        for server in servers {
            if let Some(only) = self.config.sync.only_guild_id {
                if server.id != only {
                    continue;
                }
            }
            match self.refresh_server(server.id, Arc::clone(&snapshot)).await {
                Ok(summary) => {
                    tracing::info!(server = %server.name, %summary, "server refreshed");
                }
                Err(error) => {
                    tracing::error!(%error, server = %server.name, "server refresh failed");
                }
            }
        }
    }

    /// Pull all four kinds from the API, persist them, refresh artifacts,
    /// and publish the resulting snapshot. Failures degrade to whatever the
    /// store already holds.
    pub async fn sync_catalog(&self) -> Arc<CatalogSnapshot> {
        tracing::info!("syncing catalog from the site api");
        let mut snapshot = CatalogSnapshot::default();

        for kind in ContentKind::ALL {
            for api_item in self.api.fetch_items(kind).await {
                if let Err(error) = self.store.upsert(kind, &api_item.name, &api_item.date).await {
                    tracing::error!(%error, kind = %kind, item = %api_item.name, "failed to persist catalog item");
                }
            }
            let items = match self.store.list(kind).await {
                Ok(items) => items,
                Err(error) => {
                    tracing::error!(%error, kind = %kind, "failed to list catalog items");
                    Vec::new()
                }
            };
            let base_urls = self.api.fetch_base_urls(kind).await;

            self.refresh_artifacts(kind, &items, &base_urls).await;

            tracing::info!(kind = %kind, item_count = items.len(), "catalog kind synced");
            snapshot.insert(kind, items, base_urls);
        }

        let snapshot = Arc::new(snapshot);
        *self.latest.write().await = Arc::clone(&snapshot);
        snapshot
    }

    /// Bring every (item, language) artifact of one kind up to date. The
    /// browser is launched only when an item actually needs rendering, and
    /// closed before returning.
    pub async fn refresh_artifacts(
        &self,
        kind: ContentKind,
        items: &[ContentItem],
        base_urls: &HashMap<String, String>,
    ) {
        if items.is_empty() {
            return;
        }
        if base_urls.is_empty() {
            tracing::warn!(kind = %kind, "no page urls published for kind, skipping artifact refresh");
            return;
        }
        let Some(storage_channel) = self.locate_storage_channel().await else {
            return;
        };
        let publisher = ArtifactPublisher::new(
            self.chat.as_ref(),
            storage_channel,
            self.config.sync.storage_lookback,
        );

        let mut storage: Option<Vec<TrackedMessage>> = None;
        let mut session: Option<CaptureSession> = None;

        'batch: for language in &self.config.sync.languages {
            let Some(base_url) = base_urls.get(language) else {
                tracing::warn!(kind = %kind, language = %language, "no page url for language");
                continue;
            };
            for item in items {
                let refreshed = self
                    .refresh_artifact(
                        kind,
                        item,
                        language,
                        base_url,
                        &publisher,
                        &mut storage,
                        &mut session,
                    )
                    .await;
                if let Err(error) = refreshed {
                    let launch_failed =
                        matches!(error, crate::Error::Capture(CaptureError::Launch(_)));
                    tracing::error!(
                        %error,
                        kind = %kind,
                        item = %item.name,
                        language = %language,
                        "artifact refresh failed"
                    );
                    if launch_failed {
                        break 'batch;
                    }
                }
            }
        }

        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Refresh one artifact. Cheapest path wins: a fresh cache entry is a
    /// no-op, an already-published storage message is adopted into the
    /// cache, and only then is the page rendered and uploaded.
    async fn refresh_artifact(
        &self,
        kind: ContentKind,
        item: &ContentItem,
        language: &str,
        base_url: &str,
        publisher: &ArtifactPublisher<'_, C>,
        storage: &mut Option<Vec<TrackedMessage>>,
        session: &mut Option<CaptureSession>,
    ) -> crate::Result<()> {
        if let Some(entry) = self.cache.lookup(kind, &item.name, language).await? {
            if entry.is_fresh(&item.updated_at) {
                return Ok(());
            }
        }

        let label = artifact_label(language, &item.name);
        let stamp = format_item_date(&item.updated_at);

        if storage.is_none() {
            *storage = Some(publisher.load_recent().await?);
        }
        let messages = storage.as_deref().unwrap_or_default();

        if let Some(found) = publisher.find_current(messages, &label, &stamp) {
            if let Some(url) = found.attachment_url.clone() {
                publisher.delete_stale(messages, &label, &stamp).await;
                self.cache
                    .put(kind, &item.name, language, &url, &item.updated_at)
                    .await?;
                tracing::debug!(
                    kind = %kind,
                    item = %item.name,
                    language = %language,
                    "adopted already-published artifact"
                );
                return Ok(());
            }
        }

        if session.is_none() {
            let viewport = self.config.capture.viewport_for(kind);
            *session = Some(CaptureSession::launch(&self.config.capture, viewport).await?);
        }
        let Some(active) = session.as_ref() else {
            return Ok(());
        };

        let url = kind.capture_url(base_url, &item.name);
        let file = self
            .config
            .capture
            .screenshot_dir
            .join(kind.api_route())
            .join(artifact_file_name(language, &item.name));
        active.capture(&url, &file).await?;

        publisher.delete_stale(messages, &label, &stamp).await;
        if let Some(published) = publisher.publish(&label, &stamp, &file).await? {
            self.cache
                .put(kind, &item.name, language, &published, &item.updated_at)
                .await?;
            tracing::info!(
                kind = %kind,
                item = %item.name,
                language = %language,
                "published artifact"
            );
        }
        Ok(())
    }

    /// Reconcile every bound channel of one server, channels in parallel.
    pub async fn refresh_server(
        self: &Arc<Self>,
        server: ServerId,
        snapshot: Arc<CatalogSnapshot>,
    ) -> crate::Result<RefreshSummary> {
        let channels = self.chat.server_channels(server).await?;
        let bound: Vec<(ChannelInfo, Vec<ContentKind>)> = channels
            .into_iter()
            .filter_map(|channel| {
                let kinds = bound_kinds(&channel);
                (!kinds.is_empty()).then_some((channel, kinds))
            })
            .collect();

        if bound.is_empty() {
            tracing::debug!(server = server, "no bound channels on server");
            return Ok(RefreshSummary::default());
        }

        let mut tasks = JoinSet::new();
        for (channel, kinds) in bound {
            let engine = Arc::clone(self);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn(async move {
                let mut summary = RefreshSummary {
                    channels: 1,
                    ..RefreshSummary::default()
                };
                for kind in kinds {
                    match engine.reconciler().reconcile(&channel, kind, &snapshot).await {
                        Ok(outcome) => summary.absorb(outcome),
                        Err(error) => {
                            tracing::error!(
                                %error,
                                server = %channel.server_name,
                                channel = %channel.name,
                                kind = %kind,
                                "channel reconciliation failed"
                            );
                            summary.failed += 1;
                        }
                    }
                }
                summary
            });
        }

        let mut total = RefreshSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(summary) => total.merge(summary),
                Err(error) => tracing::error!(%error, "channel task panicked"),
            }
        }
        Ok(total)
    }

    /// Reconcile one channel for every kind its topic is bound to.
    pub async fn refresh_channel(
        &self,
        channel: ChannelId,
        snapshot: &CatalogSnapshot,
    ) -> crate::Result<RefreshSummary> {
        let info = self.chat.channel_info(channel).await?;
        let mut summary = RefreshSummary {
            channels: 1,
            ..RefreshSummary::default()
        };
        for kind in bound_kinds(&info) {
            match self.reconciler().reconcile(&info, kind, snapshot).await {
                Ok(outcome) => summary.absorb(outcome),
                Err(error) => {
                    tracing::error!(
                        %error,
                        server = %info.server_name,
                        channel = %info.name,
                        kind = %kind,
                        "channel reconciliation failed"
                    );
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Delete the recent messages of a channel, used by the admin rebuild
    /// commands before a refresh. Failures are logged per message.
    pub async fn purge_channel(&self, channel: ChannelId) -> crate::Result<usize> {
        let history = self
            .chat
            .channel_history(channel, self.config.sync.history_limit)
            .await?;
        let mut deleted = 0;
        for message in &history {
            match self.chat.delete_message(channel, message.id).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    tracing::error!(
                        %error,
                        channel = channel,
                        message = message.id,
                        "failed to delete message during purge"
                    );
                }
            }
        }
        Ok(deleted)
    }

    fn reconciler(&self) -> Reconciler<'_, C> {
        Reconciler {
            chat: self.chat.as_ref(),
            cache: &self.cache,
            i18n: &self.i18n,
            site_url: &self.config.catalog.site_url,
            install_url: &self.config.install_url,
            history_limit: self.config.sync.history_limit,
        }
    }

    /// The storage channel must exist in the configured server before any
    /// upload. Logs and returns `None` when it does not.
    async fn locate_storage_channel(&self) -> Option<ChannelId> {
        let channels = match self
            .chat
            .server_channels(self.config.storage.guild_id)
            .await
        {
            Ok(channels) => channels,
            Err(error) => {
                tracing::error!(
                    %error,
                    server = self.config.storage.guild_id,
                    "storage server lookup failed, skipping artifact refresh"
                );
                return None;
            }
        };
        if !channels
            .iter()
            .any(|channel| channel.id == self.config.storage.channel_id)
        {
            tracing::error!(
                channel = self.config.storage.channel_id,
                "storage channel not found, skipping artifact refresh"
            );
            return None;
        }
        Some(self.config.storage.channel_id)
    }
}

/// Kinds a channel topic is bound to.
fn bound_kinds(channel: &ChannelInfo) -> Vec<ContentKind> {
    let Some(topic) = channel.topic.as_deref() else {
        return Vec::new();
    };
    ContentKind::ALL
        .into_iter()
        .filter(|kind| topic.contains(kind.channel_tag()))
        .collect()
}
