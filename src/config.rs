//! Configuration loading.
//!
//! Reads `config.toml` from the instance directory (or an explicit path),
//! writes a commented starter file on first run, and resolves `env:VAR`
//! indirections so tokens can stay out of the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use serde::Deserialize;

use crate::content::ContentKind;

#[derive(Debug, Clone)]
pub struct Config {
    /// Instance root directory (~/.armorybot or ARMORYBOT_DIR).
    pub instance_dir: PathBuf,
    pub discord_token: String,
    /// User allowed to run the `ebp_admin_*` commands.
    pub admin_user_id: Option<u64>,
    /// Link advertised in separator messages.
    pub install_url: String,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub capture: CaptureConfig,
    pub web: WebConfig,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Site root, used for localized fallback links.
    pub site_url: String,
    /// Full API route prefix; route names are appended verbatim.
    pub api_url: String,
}

/// Server and channel where rendered screenshots are archived.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub guild_id: u64,
    pub channel_id: u64,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seconds between full refresh sweeps.
    pub interval_secs: u64,
    /// Messages fetched per channel when reconciling.
    pub history_limit: usize,
    /// Messages scanned in the storage channel when deduplicating uploads.
    pub storage_lookback: usize,
    pub languages: Vec<String>,
    /// When set, refresh sweeps only touch this server.
    pub only_guild_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub headless: bool,
    pub executable_path: Option<String>,
    pub nav_timeout_secs: u64,
    /// Pause after navigation before the screenshot, lets the page settle.
    pub settle_ms: u64,
    pub screenshot_dir: PathBuf,
    /// Per-kind window size overrides, keyed by API route.
    pub viewports: HashMap<String, (u32, u32)>,
}

impl CaptureConfig {
    pub fn viewport_for(&self, kind: ContentKind) -> (u32, u32) {
        self.viewports
            .get(kind.api_route())
            .copied()
            .unwrap_or_else(|| kind.default_viewport())
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Config {
    /// Load from `path` if given, otherwise from `config.toml` in the
    /// instance directory. Writes a starter file and errors when none exists
    /// yet.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let instance_dir = default_instance_dir()?;
        std::fs::create_dir_all(&instance_dir)
            .with_context(|| format!("failed to create {}", instance_dir.display()))?;

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => instance_dir.join("config.toml"),
        };
        if !path.exists() {
            std::fs::write(&path, TEMPLATE)
                .with_context(|| format!("failed to write {}", path.display()))?;
            bail!(
                "wrote a starter config to {}, fill in discord_token and [storage] first",
                path.display()
            );
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&raw, instance_dir)
    }

    pub fn from_toml(raw: &str, instance_dir: PathBuf) -> anyhow::Result<Self> {
        let parsed: TomlConfig = toml::from_str(raw).context("failed to parse config")?;

        let discord_token = match parsed.discord_token.as_deref() {
            Some(value) if !value.is_empty() => resolve_env_value(value)?,
            _ => std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default(),
        };
        if discord_token.is_empty() {
            bail!("discord_token is not set, put it in the config or export DISCORD_BOT_TOKEN");
        }

        let catalog = parsed.catalog.unwrap_or_default();
        let site_url = catalog
            .site_url
            .unwrap_or_else(|| "https://ebp.gg".to_string());
        let api_url = catalog
            .api_url
            .unwrap_or_else(|| format!("{site_url}/back/api-discord/?route="));

        let Some(storage) = parsed.storage else {
            bail!("the [storage] section is required");
        };
        if storage.guild_id == 0 || storage.channel_id == 0 {
            bail!("[storage] guild_id and channel_id must both be set");
        }

        let sync = parsed.sync.unwrap_or_default();
        let capture = parsed.capture.unwrap_or_default();
        let web = parsed.web.unwrap_or_default();

        let screenshot_dir = capture
            .screenshot_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| instance_dir.join("screenshots"));

        let viewports = capture
            .viewports
            .unwrap_or_default()
            .into_iter()
            .map(|(kind, [width, height])| (kind, (width, height)))
            .collect();

        Ok(Self {
            instance_dir,
            discord_token,
            admin_user_id: parsed.admin_user_id,
            install_url: parsed
                .install_url
                .unwrap_or_else(|| "https://github.com/ebp-gg/armorybot".to_string()),
            catalog: CatalogConfig { site_url, api_url },
            storage: StorageConfig {
                guild_id: storage.guild_id,
                channel_id: storage.channel_id,
            },
            sync: SyncConfig {
                interval_secs: sync.interval_secs.unwrap_or(86_400),
                history_limit: sync.history_limit.unwrap_or(100),
                storage_lookback: sync.storage_lookback.unwrap_or(300),
                languages: sync.languages.unwrap_or_else(|| {
                    ["en", "fr", "es", "de", "ro"]
                        .into_iter()
                        .map(String::from)
                        .collect()
                }),
                only_guild_id: sync.only_guild_id,
            },
            capture: CaptureConfig {
                headless: capture.headless.unwrap_or(true),
                executable_path: capture.executable_path,
                nav_timeout_secs: capture.nav_timeout_secs.unwrap_or(30),
                settle_ms: capture.settle_ms.unwrap_or(1_000),
                screenshot_dir,
                viewports,
            },
            web: WebConfig {
                enabled: web.enabled.unwrap_or(true),
                bind: web.bind.unwrap_or_else(|| "0.0.0.0".to_string()),
                port: web.port.unwrap_or(3_000),
            },
        })
    }
}

/// `ARMORYBOT_DIR` if set, otherwise `~/.armorybot`.
pub fn default_instance_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("ARMORYBOT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".armorybot"))
}

/// Resolve `env:VAR` indirections, pass every other value through.
fn resolve_env_value(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => {
            std::env::var(var).with_context(|| format!("environment variable {var} is not set"))
        }
        None => Ok(value.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    discord_token: Option<String>,
    admin_user_id: Option<u64>,
    install_url: Option<String>,
    catalog: Option<TomlCatalog>,
    storage: Option<TomlStorage>,
    sync: Option<TomlSync>,
    capture: Option<TomlCapture>,
    web: Option<TomlWeb>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlCatalog {
    site_url: Option<String>,
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlStorage {
    #[serde(default)]
    guild_id: u64,
    #[serde(default)]
    channel_id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct TomlSync {
    interval_secs: Option<u64>,
    history_limit: Option<usize>,
    storage_lookback: Option<usize>,
    languages: Option<Vec<String>>,
    only_guild_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlCapture {
    headless: Option<bool>,
    executable_path: Option<String>,
    nav_timeout_secs: Option<u64>,
    settle_ms: Option<u64>,
    screenshot_dir: Option<String>,
    viewports: Option<HashMap<String, [u32; 2]>>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlWeb {
    enabled: Option<bool>,
    bind: Option<String>,
    port: Option<u16>,
}

const TEMPLATE: &str = r#"# armorybot configuration

# Discord bot token, or "env:DISCORD_BOT_TOKEN" to read it from the
# environment.
discord_token = ""

# Discord user id allowed to run the ebp_admin_* commands.
#admin_user_id = 0

# Link advertised in separator messages.
#install_url = "https://github.com/ebp-gg/armorybot"

[catalog]
#site_url = "https://ebp.gg"
#api_url = "https://ebp.gg/back/api-discord/?route="

# Server and channel where rendered screenshots are archived.
[storage]
guild_id = 0
channel_id = 0

[sync]
#interval_secs = 86400
#history_limit = 100
#storage_lookback = 300
#languages = ["en", "fr", "es", "de", "ro"]
#only_guild_id = 0

[capture]
#headless = true
#executable_path = "/usr/bin/chromium"
#nav_timeout_secs = 30
#settle_ms = 1000
#[capture.viewports]
#weapons = [1728, 972]

[web]
#enabled = true
#port = 3000
#bind = "0.0.0.0"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> String {
        r#"
discord_token = "token"

[storage]
guild_id = 10
channel_id = 11
"#
        .to_string()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(&minimal(), PathBuf::from("/tmp/armorybot")).unwrap();
        assert_eq!(config.catalog.site_url, "https://ebp.gg");
        assert_eq!(
            config.catalog.api_url,
            "https://ebp.gg/back/api-discord/?route="
        );
        assert_eq!(config.sync.interval_secs, 86_400);
        assert_eq!(config.sync.history_limit, 100);
        assert_eq!(config.sync.storage_lookback, 300);
        assert_eq!(config.sync.languages.len(), 5);
        assert_eq!(config.web.port, 3_000);
        assert!(config.web.enabled);
        assert_eq!(
            config.capture.screenshot_dir,
            PathBuf::from("/tmp/armorybot/screenshots")
        );
        assert_eq!(config.capture.viewport_for(ContentKind::Hero), (1550, 1300));
    }

    #[test]
    fn viewport_overrides_win_over_defaults() {
        let raw = format!("{}\n[capture.viewports]\nweapons = [800, 600]\n", minimal());
        let config = Config::from_toml(&raw, PathBuf::from("/tmp/armorybot")).unwrap();
        assert_eq!(config.capture.viewport_for(ContentKind::Weapon), (800, 600));
        assert_eq!(config.capture.viewport_for(ContentKind::Mode), (1200, 800));
    }

    #[test]
    fn storage_section_is_required() {
        let raw = "discord_token = \"token\"\n";
        let error = Config::from_toml(raw, PathBuf::from("/tmp")).unwrap_err();
        assert!(error.to_string().contains("[storage]"));
    }

    #[test]
    fn zeroed_storage_ids_are_rejected() {
        let raw = "discord_token = \"token\"\n\n[storage]\nguild_id = 0\nchannel_id = 0\n";
        assert!(Config::from_toml(raw, PathBuf::from("/tmp")).is_err());
    }

    #[test]
    fn custom_site_url_feeds_the_api_default() {
        let raw = format!(
            "{}\n[catalog]\nsite_url = \"https://staging.ebp.gg\"\n",
            minimal()
        );
        let config = Config::from_toml(&raw, PathBuf::from("/tmp")).unwrap();
        assert_eq!(
            config.catalog.api_url,
            "https://staging.ebp.gg/back/api-discord/?route="
        );
    }
}
