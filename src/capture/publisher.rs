//! Publication of rendered artifacts through the storage channel.
//!
//! Every artifact is uploaded as a file message whose body is the label on
//! the first line and the formatted source date on the second. That body is
//! the dedup key: an exact match means the artifact is already published,
//! a label match with a different date is stale and gets deleted so the
//! channel holds at most one message per label.

use std::path::Path;

use crate::chat::{ChannelId, ChatClient, TrackedMessage};
use crate::error::Result;

pub struct ArtifactPublisher<'a, C> {
    chat: &'a C,
    storage_channel: ChannelId,
    lookback: usize,
}

impl<'a, C: ChatClient> ArtifactPublisher<'a, C> {
    pub fn new(chat: &'a C, storage_channel: ChannelId, lookback: usize) -> Self {
        Self {
            chat,
            storage_channel,
            lookback,
        }
    }

    /// Message body for one artifact.
    pub fn body(label: &str, formatted_date: &str) -> String {
        format!("{label}\n{formatted_date}")
    }

    /// Recent storage-channel messages, scanned once per refresh batch.
    pub async fn load_recent(&self) -> Result<Vec<TrackedMessage>> {
        self.chat
            .channel_history(self.storage_channel, self.lookback)
            .await
    }

    /// Find the already-published message for this exact label and date.
    pub fn find_current<'m>(
        &self,
        messages: &'m [TrackedMessage],
        label: &str,
        formatted_date: &str,
    ) -> Option<&'m TrackedMessage> {
        let body = Self::body(label, formatted_date);
        messages.iter().find(|message| message.content == body)
    }

    /// Delete messages carrying this label with any other date. Returns the
    /// number deleted; failures are logged and skipped.
    pub async fn delete_stale(
        &self,
        messages: &[TrackedMessage],
        label: &str,
        formatted_date: &str,
    ) -> usize {
        let prefix = format!("{label}\n");
        let body = Self::body(label, formatted_date);
        let mut deleted = 0;
        for message in messages {
            if !message.content.starts_with(&prefix) || message.content == body {
                continue;
            }
            match self.chat.delete_message(self.storage_channel, message.id).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    tracing::error!(%error, label, "failed to delete stale artifact message");
                }
            }
        }
        deleted
    }

    /// Upload the file and return the attachment URL the platform assigned.
    pub async fn publish(
        &self,
        label: &str,
        formatted_date: &str,
        file: &Path,
    ) -> Result<Option<String>> {
        let body = Self::body(label, formatted_date);
        let url = self
            .chat
            .send_file(self.storage_channel, &body, file)
            .await?;
        if url.is_none() {
            tracing::warn!(label, "upload succeeded but no attachment came back");
        }
        Ok(url)
    }
}
