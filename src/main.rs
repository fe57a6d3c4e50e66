//! Armorybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use armorybot::catalog::CatalogApi;
use armorybot::chat::discord::DiscordChat;
use armorybot::commands;
use armorybot::config::Config;
use armorybot::i18n::I18n;
use armorybot::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "armorybot")]
#[command(about = "Discord bot that mirrors the EBP game catalog into channels")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting armorybot");

    let config = Arc::new(
        Config::load(cli.config.as_deref()).context("failed to load configuration")?,
    );
    tracing::info!(instance_dir = %config.instance_dir.display(), "configuration loaded");

    let pool = armorybot::db::connect(&config.instance_dir)
        .await
        .context("failed to open database")?;

    let i18n = I18n::load().context("failed to load translations")?;
    let api = CatalogApi::new(config.catalog.api_url.clone())?;

    let chat = Arc::new(DiscordChat::new(config.discord_token.clone()));
    let mut events = chat.start(commands::definitions()).await?;

    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&chat),
        pool,
        api,
        i18n,
        Arc::clone(&config),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let web_handle = if config.web.enabled {
        let bind: SocketAddr = format!("{}:{}", config.web.bind, config.web.port)
            .parse()
            .context("invalid web bind address")?;
        Some(armorybot::web::start(bind, shutdown_rx.clone()).await?)
    } else {
        None
    };

    // Sync loop waits for the gateway ready signal before the first pass.
    let engine_task = tokio::spawn(Arc::clone(&engine).run(events.ready.clone()));

    // Each command dispatches on its own task so a long rebuild does not
    // block other interactions.
    let dispatcher = {
        let engine = Arc::clone(&engine);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            while let Some((ctx, interaction)) = events.commands.recv().await {
                tokio::spawn(commands::dispatch(
                    ctx,
                    interaction,
                    Arc::clone(&engine),
                    Arc::clone(&config),
                ));
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    engine_task.abort();
    dispatcher.abort();
    chat.shutdown().await;
    if let Some(handle) = web_handle {
        let _ = handle.await;
    }

    tracing::info!("armorybot stopped");
    Ok(())
}
