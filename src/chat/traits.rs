//! Platform-neutral chat operations required by the sync pipeline.

use std::future::Future;
use std::path::Path;

use crate::chat::{
    ChannelId, ChannelInfo, ItemEmbed, MessageId, OwnerInfo, ServerId, ServerInfo, TrackedMessage,
};
use crate::error::Result;

/// Everything the pipeline needs from a chat platform. Adapters are expected
/// to pre-check their own permissions before mutating and to return
/// [`crate::error::ChatError::MissingPermission`] instead of attempting a
/// call that would be rejected.
pub trait ChatClient: Send + Sync + 'static {
    /// Servers the bot is currently a member of.
    fn servers(&self) -> impl Future<Output = Result<Vec<ServerInfo>>> + Send;

    /// Text channels of one server that the bot can see.
    fn server_channels(&self, server: ServerId)
        -> impl Future<Output = Result<Vec<ChannelInfo>>> + Send;

    fn channel_info(&self, channel: ChannelId) -> impl Future<Output = Result<ChannelInfo>> + Send;

    /// Most recent messages, newest first, at most `limit`.
    fn channel_history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TrackedMessage>>> + Send;

    fn send_embed(
        &self,
        channel: ChannelId,
        embed: &ItemEmbed,
    ) -> impl Future<Output = Result<MessageId>> + Send;

    fn edit_embed(
        &self,
        channel: ChannelId,
        message: MessageId,
        embed: &ItemEmbed,
    ) -> impl Future<Output = Result<()>> + Send;

    fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> impl Future<Output = Result<MessageId>> + Send;

    /// Upload a file with `body` as the message text. Returns the attachment
    /// URL the platform assigned, if any.
    fn send_file(
        &self,
        channel: ChannelId,
        body: &str,
        file: &Path,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create a text channel with the given topic, locked down so only the
    /// bot can post in it.
    fn create_channel(
        &self,
        server: ServerId,
        name: &str,
        topic: &str,
    ) -> impl Future<Output = Result<ChannelInfo>> + Send;

    fn server_owner(&self, server: ServerId) -> impl Future<Output = Result<OwnerInfo>> + Send;
}
