//! Slash command definitions and dispatch.
//!
//! All replies are ephemeral. The `ebp_admin_*` commands are gated on the
//! configured operator id; the per-server commands require the Administrator
//! permission of the invoking member.

use std::sync::Arc;

use anyhow::Context as _;
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context as DiscordContext,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, InteractionResponseFlags,
    Permissions,
};

use crate::chat::discord::DiscordChat;
use crate::chat::ChatClient as _;
use crate::config::Config;
use crate::content::ContentKind;
use crate::error::{ChatError, Error};
use crate::sync::SyncEngine;

/// Discord caps message content at 2000 characters; stay under it.
const REPLY_CHUNK: usize = 1900;

pub fn definitions() -> Vec<CreateCommand> {
    let mode_option = CreateCommandOption::new(
        CommandOptionType::String,
        "mode",
        "Content shown in the channel",
    )
    .required(true)
    .add_string_choice("Weapons", "weapons")
    .add_string_choice("Modes", "modes")
    .add_string_choice("Maps", "maps")
    .add_string_choice("Heroes", "heroes");

    let language_option = CreateCommandOption::new(
        CommandOptionType::String,
        "language",
        "Channel language",
    )
    .required(true)
    .add_string_choice("English", "en")
    .add_string_choice("Français", "fr")
    .add_string_choice("Español", "es")
    .add_string_choice("Deutsch", "de")
    .add_string_choice("Română", "ro");

    let server_id_option = || {
        CreateCommandOption::new(CommandOptionType::String, "server_id", "Server id").required(true)
    };

    vec![
        CreateCommand::new("ebp_refresh_server")
            .description("Refresh every bound channel on this server")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ebp_refresh_channel")
            .description("Refresh the current channel")
            .default_member_permissions(Permissions::ADMINISTRATOR),
        CreateCommand::new("ebp_create_channel")
            .description("Create a content channel and fill it")
            .default_member_permissions(Permissions::ADMINISTRATOR)
            .add_option(mode_option)
            .add_option(language_option),
        CreateCommand::new("ebp_admin_list").description("List servers using the bot"),
        CreateCommand::new("ebp_admin_sync")
            .description("Sync the catalog and refresh artifacts now"),
        CreateCommand::new("ebp_admin_refresh_all").description("Run a full sweep now"),
        CreateCommand::new("ebp_admin_refresh_server")
            .description("Rebuild every bound channel of a server")
            .add_option(server_id_option()),
        CreateCommand::new("ebp_admin_refresh_channel")
            .description("Rebuild one channel of a server")
            .add_option(server_id_option())
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "channel_id", "Channel id")
                    .required(true),
            ),
        CreateCommand::new("ebp_admin_get_server_owner")
            .description("Look up the owner of a server")
            .add_option(server_id_option()),
    ]
}

pub async fn dispatch(
    ctx: DiscordContext,
    interaction: CommandInteraction,
    engine: Arc<SyncEngine<DiscordChat>>,
    config: Arc<Config>,
) {
    let name = interaction.data.name.clone();
    tracing::info!(command = %name, user = %interaction.user.name, "command received");

    let result = match name.as_str() {
        "ebp_refresh_server" => refresh_server(&ctx, &interaction, &engine).await,
        "ebp_refresh_channel" => refresh_channel(&ctx, &interaction, &engine).await,
        "ebp_create_channel" => create_channel(&ctx, &interaction, &engine).await,
        "ebp_admin_list" => admin_list(&ctx, &interaction, &engine, &config).await,
        "ebp_admin_sync" => admin_sync(&ctx, &interaction, &engine, &config).await,
        "ebp_admin_refresh_all" => admin_refresh_all(&ctx, &interaction, &engine, &config).await,
        "ebp_admin_refresh_server" => {
            admin_refresh_server(&ctx, &interaction, &engine, &config).await
        }
        "ebp_admin_refresh_channel" => {
            admin_refresh_channel(&ctx, &interaction, &engine, &config).await
        }
        "ebp_admin_get_server_owner" => {
            admin_get_server_owner(&ctx, &interaction, &engine, &config).await
        }
        other => {
            tracing::warn!(command = other, "unknown command");
            Ok(())
        }
    };

    if let Err(error) = result {
        tracing::error!(%error, command = %name, "command failed");
        let _ = followup(&ctx, &interaction, &user_facing(&error)).await;
    }
}

async fn refresh_server(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
) -> crate::Result<()> {
    if !is_admin(interaction) {
        return reply(ctx, interaction, "This command needs the Administrator permission.").await;
    }
    let Some(guild_id) = interaction.guild_id else {
        return reply(ctx, interaction, "This command only works in a server.").await;
    };

    reply(ctx, interaction, "Refreshing this server...").await?;
    let snapshot = engine.latest_snapshot().await;
    let summary = engine.refresh_server(guild_id.get(), snapshot).await?;
    followup(ctx, interaction, &format!("Refreshed {summary}.")).await
}

async fn refresh_channel(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
) -> crate::Result<()> {
    if !is_admin(interaction) {
        return reply(ctx, interaction, "This command needs the Administrator permission.").await;
    }

    reply(ctx, interaction, "Refreshing this channel...").await?;
    let snapshot = engine.latest_snapshot().await;
    let summary = engine
        .refresh_channel(interaction.channel_id.get(), &snapshot)
        .await?;
    followup(ctx, interaction, &format!("Refreshed {summary}.")).await
}

async fn create_channel(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
) -> crate::Result<()> {
    if !is_admin(interaction) {
        return reply(ctx, interaction, "This command needs the Administrator permission.").await;
    }
    let Some(guild_id) = interaction.guild_id else {
        return reply(ctx, interaction, "This command only works in a server.").await;
    };
    let Some(kind) = option_str(interaction, "mode").and_then(ContentKind::from_route) else {
        return reply(ctx, interaction, "Unknown mode.").await;
    };
    let Some(language) = option_str(interaction, "language") else {
        return reply(ctx, interaction, "Unknown language.").await;
    };

    reply(ctx, interaction, "Creating the channel...").await?;

    let name = format!("{}{}", kind.emoji(), engine.i18n().get(kind.api_route(), language));
    let topic = format!("{}{})", kind.channel_tag(), language);
    let channel = engine
        .chat()
        .create_channel(guild_id.get(), &name, &topic)
        .await?;

    let snapshot = engine.latest_snapshot().await;
    let summary = engine.refresh_channel(channel.id, &snapshot).await?;
    followup(
        ctx,
        interaction,
        &format!("Created <#{}> and filled it ({summary}).", channel.id),
    )
    .await
}

async fn admin_list(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }

    reply(ctx, interaction, "Fetching the server list...").await?;
    let servers = engine.chat().servers().await?;
    let lines: Vec<String> = servers
        .iter()
        .map(|server| format!("{} ({})", server.name, server.id))
        .collect();
    let text = format!("{} servers:\n{}", servers.len(), lines.join("\n"));
    for chunk in split_message(&text, REPLY_CHUNK) {
        followup(ctx, interaction, &chunk).await?;
    }
    Ok(())
}

async fn admin_sync(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }

    reply(ctx, interaction, "Syncing the catalog...").await?;
    engine.sync_catalog().await;
    followup(ctx, interaction, "Catalog synced.").await
}

async fn admin_refresh_all(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }

    reply(ctx, interaction, "Running a full sweep...").await?;
    engine.run_cycle().await;
    followup(ctx, interaction, "Sweep complete.").await
}

async fn admin_refresh_server(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }
    let Some(server_id) = option_u64(interaction, "server_id") else {
        return reply(ctx, interaction, "Give a numeric server id.").await;
    };

    reply(ctx, interaction, &format!("Rebuilding server {server_id}...")).await?;

    let channels = engine.chat().server_channels(server_id).await?;
    for channel in &channels {
        if channel
            .topic
            .as_deref()
            .is_some_and(|topic| topic.contains("#EBP_"))
        {
            match engine.purge_channel(channel.id).await {
                Ok(deleted) => {
                    tracing::info!(channel = %channel.name, deleted, "purged channel");
                }
                Err(error) => {
                    tracing::error!(%error, channel = %channel.name, "failed to purge channel");
                }
            }
        }
    }

    let snapshot = engine.latest_snapshot().await;
    let summary = engine.refresh_server(server_id, snapshot).await?;
    followup(ctx, interaction, &format!("Rebuilt {summary}.")).await
}

async fn admin_refresh_channel(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }
    let Some(server_id) = option_u64(interaction, "server_id") else {
        return reply(ctx, interaction, "Give a numeric server id.").await;
    };
    let Some(channel_id) = option_u64(interaction, "channel_id") else {
        return reply(ctx, interaction, "Give a numeric channel id.").await;
    };

    let channels = match engine.chat().server_channels(server_id).await {
        Ok(channels) => channels,
        Err(error) => return reply(ctx, interaction, &user_facing(&error)).await,
    };
    if !channels.iter().any(|channel| channel.id == channel_id) {
        return reply(ctx, interaction, "That channel was not found on that server.").await;
    }

    reply(ctx, interaction, &format!("Rebuilding channel {channel_id}...")).await?;

    if let Err(error) = engine.purge_channel(channel_id).await {
        tracing::error!(%error, channel = channel_id, "failed to purge channel");
    }
    let snapshot = engine.latest_snapshot().await;
    let summary = engine.refresh_channel(channel_id, &snapshot).await?;
    followup(ctx, interaction, &format!("Rebuilt {summary}.")).await
}

async fn admin_get_server_owner(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    engine: &Arc<SyncEngine<DiscordChat>>,
    config: &Config,
) -> crate::Result<()> {
    if !ensure_operator(ctx, interaction, config).await? {
        return Ok(());
    }
    let Some(server_id) = option_u64(interaction, "server_id") else {
        return reply(ctx, interaction, "Give a numeric server id.").await;
    };

    let owner = match engine.chat().server_owner(server_id).await {
        Ok(owner) => owner,
        Err(error) => return reply(ctx, interaction, &user_facing(&error)).await,
    };
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(format!(
                        "Owner of server {server_id}: **{}** (https://discord.com/users/{})",
                        owner.name, owner.id
                    ))
                    .flags(
                        InteractionResponseFlags::EPHEMERAL
                            | InteractionResponseFlags::SUPPRESS_EMBEDS,
                    ),
            ),
        )
        .await
        .context("failed to send interaction response")?;
    Ok(())
}

/// Member has the Administrator permission in the invoking server.
fn is_admin(interaction: &CommandInteraction) -> bool {
    interaction
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.administrator())
}

/// Invoker is the configured operator.
async fn ensure_operator(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    config: &Config,
) -> crate::Result<bool> {
    let allowed = config
        .admin_user_id
        .is_some_and(|id| interaction.user.id.get() == id);
    if !allowed {
        reply(ctx, interaction, "You are not allowed to run this command.").await?;
    }
    Ok(allowed)
}

fn option_str<'a>(interaction: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    interaction
        .data
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match &option.value {
            CommandDataOptionValue::String(value) => Some(value.as_str()),
            _ => None,
        })
}

fn option_u64(interaction: &CommandInteraction, name: &str) -> Option<u64> {
    option_str(interaction, name).and_then(|value| value.trim().parse().ok())
}

async fn reply(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    text: &str,
) -> crate::Result<()> {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await
        .context("failed to send interaction response")?;
    Ok(())
}

async fn followup(
    ctx: &DiscordContext,
    interaction: &CommandInteraction,
    text: &str,
) -> crate::Result<()> {
    interaction
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(text)
                .ephemeral(true),
        )
        .await
        .context("failed to send interaction followup")?;
    Ok(())
}

fn user_facing(error: &Error) -> String {
    match error {
        Error::Chat(ChatError::ServerNotFound(id)) => format!("Server {id} was not found."),
        Error::Chat(ChatError::ChannelNotFound(id)) => format!("Channel {id} was not found."),
        Error::Chat(ChatError::MissingPermission {
            permission,
            channel,
        }) => format!("Missing the {permission} permission in {channel}."),
        Error::Chat(ChatError::NotConnected) => {
            "Not connected to Discord yet, try again shortly.".to_string()
        }
        _ => "Something went wrong, check the logs.".to_string(),
    }
}

/// Split a reply into chunks the platform accepts, preferring newline
/// boundaries.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() <= limit {
            current.push_str(line);
            continue;
        }
        for ch in line.chars() {
            if current.len() + ch.len_utf8() > limit {
                chunks.push(std::mem::take(&mut current));
            }
            current.push(ch);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::split_message;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 100), vec!["hello"]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "alpha\nbravo\ncharlie\n";
        let chunks = split_message(text, 12);
        assert_eq!(chunks, vec!["alpha\nbravo\n", "charlie\n"]);
    }

    #[test]
    fn hard_splits_oversized_lines_without_breaking_chars() {
        let text = "héhéhéhé";
        let chunks = split_message(text, 5);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 5));
        assert_eq!(chunks.concat(), text);
    }
}
