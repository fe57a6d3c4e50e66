//! Discord adapter built on serenity.
//!
//! The gateway client runs on its own task; [`DiscordChat`] holds slots that
//! the ready handler fills once the shard is up. Slash command interactions
//! are forwarded over a channel so dispatch happens outside the event
//! handler.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serenity::all::{
    Cache, ChannelId as DiscordChannelId, ChannelType, Command, CommandInteraction,
    Context as DiscordContext, CreateAttachment, CreateChannel, CreateCommand, CreateEmbed,
    CreateEmbedFooter, CreateMessage, EditMessage, GatewayIntents, GetMessages, GuildChannel,
    GuildId, Http, Interaction, Message, MessageId as DiscordMessageId, PermissionOverwrite,
    PermissionOverwriteType, Permissions, Ready, RoleId, ShardManager, UserId,
};
use serenity::async_trait;
use serenity::Client;
use tokio::sync::{mpsc, watch, RwLock, Semaphore, SemaphorePermit};

use crate::chat::{
    paginate_history, ChannelId, ChannelInfo, ChatClient, ItemEmbed, MessageId, OwnerInfo,
    ServerId, ServerInfo, TrackedMessage, EMBED_COLOR,
};
use crate::error::{ChatError, Result};

/// A slash command invocation, forwarded out of the event handler.
pub type CommandEvent = (DiscordContext, CommandInteraction);

/// Concurrent message mutations allowed in flight. Bursts across many
/// channels queue here instead of piling onto the platform rate limiter.
const MUTATION_CONCURRENCY: usize = 4;

/// Streams handed back by [`DiscordChat::start`].
pub struct DiscordEvents {
    pub commands: mpsc::Receiver<CommandEvent>,
    /// Flips to `true` once the gateway session is ready.
    pub ready: watch::Receiver<bool>,
}

pub struct DiscordChat {
    token: String,
    http: Arc<RwLock<Option<Arc<Http>>>>,
    cache: Arc<RwLock<Option<Arc<Cache>>>>,
    bot_user_id: Arc<RwLock<Option<UserId>>>,
    shard_manager: Arc<RwLock<Option<Arc<ShardManager>>>>,
    mutation_gate: Semaphore,
}

impl DiscordChat {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            http: Arc::new(RwLock::new(None)),
            cache: Arc::new(RwLock::new(None)),
            bot_user_id: Arc::new(RwLock::new(None)),
            shard_manager: Arc::new(RwLock::new(None)),
            mutation_gate: Semaphore::new(MUTATION_CONCURRENCY),
        }
    }

    /// Connect to the gateway and register `commands` globally once ready.
    /// The client runs on a background task until [`Self::shutdown`].
    pub async fn start(&self, commands: Vec<CreateCommand>) -> Result<DiscordEvents> {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = watch::channel(false);

        let handler = Handler {
            http_slot: self.http.clone(),
            cache_slot: self.cache.clone(),
            bot_user_id: self.bot_user_id.clone(),
            ready_tx,
            command_tx,
            commands,
        };

        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES;
        let mut client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
            .context("failed to build discord client")?;

        *self.shard_manager.write().await = Some(client.shard_manager.clone());

        tokio::spawn(async move {
            if let Err(error) = client.start().await {
                tracing::error!(%error, "discord client exited with error");
            }
        });

        Ok(DiscordEvents {
            commands: command_rx,
            ready: ready_rx,
        })
    }

    pub async fn shutdown(&self) {
        if let Some(shard_manager) = self.shard_manager.read().await.clone() {
            shard_manager.shutdown_all().await;
        }
    }

    async fn http(&self) -> Result<Arc<Http>> {
        let http = self.http.read().await.clone().ok_or(ChatError::NotConnected)?;
        Ok(http)
    }

    async fn cache(&self) -> Result<Arc<Cache>> {
        let cache = self.cache.read().await.clone().ok_or(ChatError::NotConnected)?;
        Ok(cache)
    }

    async fn bot_id(&self) -> Option<UserId> {
        *self.bot_user_id.read().await
    }

    async fn mutation_permit(&self) -> Result<SemaphorePermit<'_>> {
        let permit = self
            .mutation_gate
            .acquire()
            .await
            .context("mutation gate closed")?;
        Ok(permit)
    }

    /// Best-effort permission pre-check from the gateway cache. Fails only
    /// when the cache positively reports the permission as missing; an
    /// uncached channel falls through to the API call itself.
    async fn ensure_permission(
        &self,
        channel: ChannelId,
        required: Permissions,
        label: &'static str,
    ) -> Result<()> {
        let Some(cache) = self.cache.read().await.clone() else {
            return Ok(());
        };
        let Some(bot) = self.bot_id().await else {
            return Ok(());
        };
        let Some((_, guild_channel)) =
            locate_cached_channel(&cache, DiscordChannelId::new(channel))
        else {
            return Ok(());
        };
        if let Ok(permissions) = guild_channel.permissions_for_user(&cache, bot) {
            if !permissions.contains(required) {
                return Err(ChatError::MissingPermission {
                    permission: label,
                    channel: guild_channel.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl ChatClient for DiscordChat {
    async fn servers(&self) -> Result<Vec<ServerInfo>> {
        let cache = self.cache().await?;
        let mut servers = Vec::new();
        for guild_id in cache.guilds() {
            if let Some(guild) = cache.guild(guild_id) {
                servers.push(ServerInfo {
                    id: guild_id.get(),
                    name: guild.name.clone(),
                });
            }
        }
        Ok(servers)
    }

    async fn server_channels(&self, server: ServerId) -> Result<Vec<ChannelInfo>> {
        let cache = self.cache().await?;
        let bot = self.bot_id().await;
        let guild_id = GuildId::new(server);

        // Clone out of the cache guard before computing permissions, which
        // takes cache locks of its own.
        let (server_name, guild_channels) = {
            let guild = cache
                .guild(guild_id)
                .ok_or_else(|| ChatError::ServerNotFound(server.to_string()))?;
            let channels: Vec<GuildChannel> = guild.channels.values().cloned().collect();
            (guild.name.clone(), channels)
        };

        let mut channels = Vec::new();
        for channel in guild_channels {
            if channel.kind != ChannelType::Text {
                continue;
            }
            if let Some(bot) = bot {
                if let Ok(permissions) = channel.permissions_for_user(&cache, bot) {
                    if !permissions.view_channel() {
                        continue;
                    }
                }
            }
            channels.push(ChannelInfo {
                id: channel.id.get(),
                server_id: server,
                server_name: server_name.clone(),
                name: channel.name.clone(),
                topic: channel.topic.clone(),
            });
        }
        Ok(channels)
    }

    async fn channel_info(&self, channel: ChannelId) -> Result<ChannelInfo> {
        let cache = self.cache().await?;
        let Some((guild_id, guild_channel)) =
            locate_cached_channel(&cache, DiscordChannelId::new(channel))
        else {
            return Err(ChatError::ChannelNotFound(channel.to_string()).into());
        };
        let server_name = cache
            .guild(guild_id)
            .map(|guild| guild.name.clone())
            .unwrap_or_default();
        Ok(ChannelInfo {
            id: channel,
            server_id: guild_id.get(),
            server_name,
            name: guild_channel.name,
            topic: guild_channel.topic,
        })
    }

    async fn channel_history(&self, channel: ChannelId, limit: usize) -> Result<Vec<TrackedMessage>> {
        self.ensure_permission(
            channel,
            Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
            "Read Message History",
        )
        .await?;
        let http = self.http().await?;
        let bot = self.bot_id().await;
        let target = DiscordChannelId::new(channel);

        paginate_history(limit, move |before, size| {
            let http = Arc::clone(&http);
            async move {
                let mut request = GetMessages::new().limit(size);
                if let Some(before) = before {
                    request = request.before(DiscordMessageId::new(before));
                }
                let page = target
                    .messages(&http, request)
                    .await
                    .with_context(|| format!("failed to fetch history for channel {channel}"))?;
                Ok(page.iter().map(|message| to_tracked(message, bot)).collect())
            }
        })
        .await
    }

    async fn send_embed(&self, channel: ChannelId, embed: &ItemEmbed) -> Result<MessageId> {
        self.ensure_permission(channel, Permissions::SEND_MESSAGES, "Send Messages")
            .await?;
        let http = self.http().await?;
        let _permit = self.mutation_permit().await?;
        let message = DiscordChannelId::new(channel)
            .send_message(&http, CreateMessage::new().embed(build_embed(embed)))
            .await
            .with_context(|| format!("failed to send message in channel {channel}"))?;
        Ok(message.id.get())
    }

    async fn edit_embed(
        &self,
        channel: ChannelId,
        message: MessageId,
        embed: &ItemEmbed,
    ) -> Result<()> {
        self.ensure_permission(channel, Permissions::SEND_MESSAGES, "Send Messages")
            .await?;
        let http = self.http().await?;
        let _permit = self.mutation_permit().await?;
        DiscordChannelId::new(channel)
            .edit_message(
                &http,
                DiscordMessageId::new(message),
                EditMessage::new().embed(build_embed(embed)),
            )
            .await
            .with_context(|| format!("failed to edit message {message} in channel {channel}"))?;
        Ok(())
    }

    async fn send_text(&self, channel: ChannelId, text: &str) -> Result<MessageId> {
        self.ensure_permission(channel, Permissions::SEND_MESSAGES, "Send Messages")
            .await?;
        let http = self.http().await?;
        let _permit = self.mutation_permit().await?;
        let message = DiscordChannelId::new(channel)
            .send_message(&http, CreateMessage::new().content(text))
            .await
            .with_context(|| format!("failed to send message in channel {channel}"))?;
        Ok(message.id.get())
    }

    async fn send_file(&self, channel: ChannelId, body: &str, file: &Path) -> Result<Option<String>> {
        self.ensure_permission(
            channel,
            Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES,
            "Attach Files",
        )
        .await?;
        let http = self.http().await?;
        let attachment = CreateAttachment::path(file)
            .await
            .with_context(|| format!("failed to read attachment {}", file.display()))?;
        let _permit = self.mutation_permit().await?;
        let message = DiscordChannelId::new(channel)
            .send_message(&http, CreateMessage::new().content(body).add_file(attachment))
            .await
            .with_context(|| format!("failed to upload file to channel {channel}"))?;
        Ok(message
            .attachments
            .first()
            .map(|attachment| attachment.url.clone()))
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let http = self.http().await?;
        let _permit = self.mutation_permit().await?;
        DiscordChannelId::new(channel)
            .delete_message(&http, DiscordMessageId::new(message))
            .await
            .with_context(|| format!("failed to delete message {message} in channel {channel}"))?;
        Ok(())
    }

    async fn create_channel(
        &self,
        server: ServerId,
        name: &str,
        topic: &str,
    ) -> Result<ChannelInfo> {
        let http = self.http().await?;
        let cache = self.cache().await?;
        let bot = self.bot_id().await.ok_or(ChatError::NotConnected)?;
        let guild_id = GuildId::new(server);

        let server_name = {
            let guild = cache
                .guild(guild_id)
                .ok_or_else(|| ChatError::ServerNotFound(server.to_string()))?;
            if let Some(member) = guild.members.get(&bot) {
                if !guild.member_permissions(member).manage_channels() {
                    return Err(ChatError::MissingPermission {
                        permission: "Manage Channels",
                        channel: guild.name.clone(),
                    }
                    .into());
                }
            }
            guild.name.clone()
        };

        let overwrites = vec![
            PermissionOverwrite {
                allow: Permissions::VIEW_CHANNEL
                    | Permissions::SEND_MESSAGES
                    | Permissions::READ_MESSAGE_HISTORY
                    | Permissions::ATTACH_FILES,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(bot),
            },
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::SEND_MESSAGES
                    | Permissions::CREATE_PUBLIC_THREADS
                    | Permissions::CREATE_PRIVATE_THREADS
                    | Permissions::SEND_MESSAGES_IN_THREADS,
                kind: PermissionOverwriteType::Role(RoleId::new(server)),
            },
        ];

        let channel = guild_id
            .create_channel(
                &http,
                CreateChannel::new(name)
                    .kind(ChannelType::Text)
                    .topic(topic)
                    .permissions(overwrites),
            )
            .await
            .with_context(|| format!("failed to create channel in server {server}"))?;

        Ok(ChannelInfo {
            id: channel.id.get(),
            server_id: server,
            server_name,
            name: channel.name.clone(),
            topic: channel.topic.clone(),
        })
    }

    async fn server_owner(&self, server: ServerId) -> Result<OwnerInfo> {
        let http = self.http().await?;
        let guild = http.get_guild(GuildId::new(server)).await.map_err(|error| {
            tracing::debug!(%error, server = server, "guild lookup failed");
            ChatError::ServerNotFound(server.to_string())
        })?;
        let owner = http
            .get_user(guild.owner_id)
            .await
            .with_context(|| format!("failed to fetch owner of server {server}"))?;
        Ok(OwnerInfo {
            id: owner.id.get(),
            name: owner.name.clone(),
        })
    }
}

struct Handler {
    http_slot: Arc<RwLock<Option<Arc<Http>>>>,
    cache_slot: Arc<RwLock<Option<Arc<Cache>>>>,
    bot_user_id: Arc<RwLock<Option<UserId>>>,
    ready_tx: watch::Sender<bool>,
    command_tx: mpsc::Sender<CommandEvent>,
    commands: Vec<CreateCommand>,
}

#[async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, ctx: DiscordContext, ready: Ready) {
        *self.http_slot.write().await = Some(ctx.http.clone());
        *self.cache_slot.write().await = Some(ctx.cache.clone());
        *self.bot_user_id.write().await = Some(ready.user.id);

        match Command::set_global_commands(&ctx.http, self.commands.clone()).await {
            Ok(registered) => {
                tracing::info!(count = registered.len(), "registered global commands");
            }
            Err(error) => tracing::error!(%error, "failed to register global commands"),
        }

        tracing::info!(
            bot_name = %ready.user.name,
            guild_count = ready.guilds.len(),
            "discord connected"
        );
        let _ = self.ready_tx.send(true);
    }

    async fn interaction_create(&self, ctx: DiscordContext, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if self.command_tx.send((ctx, command)).await.is_err() {
                tracing::warn!("command dropped, dispatcher is gone");
            }
        }
    }
}

fn build_embed(embed: &ItemEmbed) -> CreateEmbed {
    CreateEmbed::new()
        .title(embed.title.clone())
        .url(embed.url.clone())
        .image(embed.image_url.clone())
        .footer(CreateEmbedFooter::new(embed.footer.clone()))
        .colour(EMBED_COLOR)
}

fn to_tracked(message: &Message, bot: Option<UserId>) -> TrackedMessage {
    let embed = message.embeds.first();
    TrackedMessage {
        id: message.id.get(),
        authored_by_bot: bot.is_some_and(|id| message.author.id == id),
        content: message.content.clone(),
        embed_title: embed.and_then(|embed| embed.title.clone()),
        embed_footer: embed
            .and_then(|embed| embed.footer.as_ref())
            .map(|footer| footer.text.clone()),
        attachment_url: message
            .attachments
            .first()
            .map(|attachment| attachment.url.clone()),
    }
}

/// Find a channel in the cached guilds, cloning it out of the cache guard.
fn locate_cached_channel(
    cache: &Cache,
    channel: DiscordChannelId,
) -> Option<(GuildId, GuildChannel)> {
    for guild_id in cache.guilds() {
        if let Some(guild) = cache.guild(guild_id) {
            if let Some(found) = guild.channels.get(&channel) {
                return Some((guild_id, found.clone()));
            }
        }
    }
    None
}
