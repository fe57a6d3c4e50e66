//! Channel reconciliation.
//!
//! A bound channel is the state of record: each pass re-reads its history
//! and converges it toward the catalog, one embed per item, newest edits
//! applied in place. Nothing about a channel is remembered between passes,
//! which is what lets a wiped database or a hand-deleted message heal on
//! the next run.

use crate::catalog::{format_item_date, ImageCache};
use crate::chat::{ChannelInfo, ChatClient, ItemEmbed, TrackedMessage};
use crate::content::ContentKind;
use crate::i18n::I18n;
use crate::sync::CatalogSnapshot;

/// Separator messages are recognized by this prefix.
pub const SEPARATOR_PREFIX: &str = "─────────────";
/// Horizontal rule posted at the top of a fresh separator.
pub const SEPARATOR_RULE: &str = "───────────────────────────────────";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Item messages created.
    pub sent: usize,
    /// Item messages edited in place.
    pub edited: usize,
    /// Items skipped because no artifact is cached yet.
    pub skipped: usize,
}

/// One reconciliation pass over one channel, borrowed out of the engine.
pub struct Reconciler<'a, C> {
    pub chat: &'a C,
    pub cache: &'a ImageCache,
    pub i18n: &'a I18n,
    pub site_url: &'a str,
    pub install_url: &'a str,
    pub history_limit: usize,
}

impl<C: ChatClient> Reconciler<'_, C> {
    /// Converge `channel` toward the snapshot for `kind`. Per-item failures
    /// are logged and do not stop the pass; a history fetch failure aborts
    /// it.
    pub async fn reconcile(
        &self,
        channel: &ChannelInfo,
        kind: ContentKind,
        snapshot: &CatalogSnapshot,
    ) -> crate::Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        let Some(language) = channel
            .topic
            .as_deref()
            .and_then(|topic| kind.language_from_topic(topic))
        else {
            return Ok(outcome);
        };

        tracing::info!(
            server = %channel.server_name,
            channel = %channel.name,
            kind = %kind,
            language = %language,
            "reconciling channel"
        );

        let history = self.chat.channel_history(channel.id, self.history_limit).await?;
        let bot_messages: Vec<&TrackedMessage> = history
            .iter()
            .filter(|message| message.authored_by_bot)
            .collect();

        for item in snapshot.items(kind) {
            let title = item.name.to_uppercase();
            let footer = format_item_date(&item.updated_at);

            let Some(entry) = self.cache.lookup(kind, &item.name, &language).await? else {
                tracing::error!(
                    server = %channel.server_name,
                    channel = %channel.name,
                    item = %item.name,
                    language = %language,
                    "no cached artifact for item, skipping"
                );
                outcome.skipped += 1;
                continue;
            };

            let base_url = snapshot.base_url(kind, &language);
            let embed = ItemEmbed {
                url: kind.item_link(base_url, self.site_url, &language, &item.name),
                image_url: entry.url,
                title: title.clone(),
                footer: footer.clone(),
            };

            let existing = bot_messages
                .iter()
                .find(|message| message.embed_title.as_deref() == Some(title.as_str()));

            match existing {
                Some(message) => {
                    if message.embed_footer.as_deref() == Some(footer.as_str()) {
                        continue;
                    }
                    match self.chat.edit_embed(channel.id, message.id, &embed).await {
                        Ok(()) => outcome.edited += 1,
                        Err(error) => tracing::error!(
                            %error,
                            server = %channel.server_name,
                            channel = %channel.name,
                            item = %item.name,
                            "failed to edit item message"
                        ),
                    }
                }
                None => match self.chat.send_embed(channel.id, &embed).await {
                    Ok(_) => outcome.sent += 1,
                    Err(error) => tracing::error!(
                        %error,
                        server = %channel.server_name,
                        channel = %channel.name,
                        item = %item.name,
                        "failed to send item message"
                    ),
                },
            }
        }

        self.maintain_separator(channel, kind, snapshot, &language, &bot_messages, &outcome)
            .await;

        Ok(outcome)
    }

    /// Keep exactly one separator under the listing. Reposted whenever the
    /// pass changed something, so it stays the newest message; duplicates
    /// and a missing separator are repaired the same way.
    async fn maintain_separator(
        &self,
        channel: &ChannelInfo,
        kind: ContentKind,
        snapshot: &CatalogSnapshot,
        language: &str,
        bot_messages: &[&TrackedMessage],
        outcome: &ReconcileOutcome,
    ) {
        let separators: Vec<_> = bot_messages
            .iter()
            .filter(|message| message.content.starts_with(SEPARATOR_PREFIX))
            .collect();

        let changed = outcome.sent > 0 || outcome.edited > 0;
        if !changed && separators.len() == 1 {
            return;
        }

        for message in &separators {
            if let Err(error) = self.chat.delete_message(channel.id, message.id).await {
                tracing::error!(
                    %error,
                    server = %channel.server_name,
                    channel = %channel.name,
                    "failed to delete old separator"
                );
            }
        }

        let source = kind.source_link(snapshot.base_url(kind, language), self.site_url, language);
        let text = format!(
            "{SEPARATOR_RULE}\n{}: <{}>\n{}: <{}>",
            self.i18n.get("source", language),
            source,
            self.i18n.get("install", language),
            self.install_url,
        );
        if let Err(error) = self.chat.send_text(channel.id, &text).await {
            tracing::error!(
                %error,
                server = %channel.server_name,
                channel = %channel.name,
                "failed to post separator"
            );
        }
    }
}
