use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use shieldpost_core::{
    ClientConfig, CoreError, DispatchMode, DispatchOptions, ServiceKind, ServiceProfile,
    TokenAmount,
};
use url::Url;

use crate::cli::{Cli, OutputFormat};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub wallet: Option<String>,
    pub gateway: Option<String>,
    pub protector_url: Option<String>,
    pub telegram_relay_url: Option<String>,
    pub mail_relay_url: Option<String>,
    pub account_url: Option<String>,
    pub telegram_app: Option<String>,
    pub mail_app: Option<String>,
    pub max_price: Option<String>,
    pub mode: Option<String>,
    pub timeout_ms: Option<u64>,
    pub format: Option<String>,
}

/// Keys accepted by `config set`
pub const KEYS: &[&str] = &[
    "wallet",
    "gateway",
    "protector_url",
    "telegram_relay_url",
    "mail_relay_url",
    "account_url",
    "telegram_app",
    "mail_app",
    "max_price",
    "mode",
    "timeout_ms",
    "format",
];

impl ProfileConfig {
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = Some(value.to_string());
        match key {
            "wallet" => self.wallet = value,
            "gateway" => self.gateway = value,
            "protector_url" => self.protector_url = value,
            "telegram_relay_url" => self.telegram_relay_url = value,
            "mail_relay_url" => self.mail_relay_url = value,
            "account_url" => self.account_url = value,
            "telegram_app" => self.telegram_app = value,
            "mail_app" => self.mail_app = value,
            "max_price" => {
                TokenAmount::parse(value.as_deref().unwrap_or_default())?;
                self.max_price = value;
            }
            "mode" => {
                value.as_deref().unwrap_or_default().parse::<DispatchMode>()?;
                self.mode = value;
            }
            "timeout_ms" => {
                let ms = value
                    .as_deref()
                    .unwrap_or_default()
                    .parse::<u64>()
                    .context("timeout_ms must be a number of milliseconds")?;
                self.timeout_ms = Some(ms);
            }
            "format" => {
                parse_format(value.as_deref().unwrap_or_default())?;
                self.format = value;
            }
            other => anyhow::bail!("Unknown config key: {other}. Valid keys: {}", KEYS.join(", ")),
        }
        Ok(())
    }

    /// Stored output format, if any
    pub fn output_format(&self) -> Result<Option<OutputFormat>> {
        self.format.as_deref().map(parse_format).transpose()
    }

    /// `(key, value)` pairs for display
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("wallet", self.wallet.clone()),
            ("gateway", self.gateway.clone()),
            ("protector_url", self.protector_url.clone()),
            ("telegram_relay_url", self.telegram_relay_url.clone()),
            ("mail_relay_url", self.mail_relay_url.clone()),
            ("account_url", self.account_url.clone()),
            ("telegram_app", self.telegram_app.clone()),
            ("mail_app", self.mail_app.clone()),
            ("max_price", self.max_price.clone()),
            ("mode", self.mode.clone()),
            ("timeout_ms", self.timeout_ms.map(|ms| ms.to_string())),
            ("format", self.format.clone()),
        ]
    }
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(value, true)
        .map_err(|_| anyhow::anyhow!("Invalid format \"{value}\". Valid formats: table, json"))
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".shieldpost");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_all_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::new());
    }
    let content = fs::read_to_string(path)?;
    let cfg: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(cfg)
}

pub fn load_profile_from(path: &Path, profile: &str) -> Result<ProfileConfig> {
    let mut all = load_all_from(path)?;
    Ok(all.remove(profile).unwrap_or_default())
}

pub fn save_profile_to(path: &Path, profile: &str, config: &ProfileConfig) -> Result<()> {
    let mut all = load_all_from(path)?;
    all.insert(profile.to_string(), config.clone());
    let content = toml::to_string_pretty(&all)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_profile(profile: &str) -> Result<ProfileConfig> {
    load_profile_from(&config_path()?, profile)
}

pub fn save_profile(profile: &str, config: &ProfileConfig) -> Result<()> {
    save_profile_to(&config_path()?, profile, config)
}

/// Where each collaborator lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub protector: Url,
    pub telegram_relay: Url,
    pub mail_relay: Url,
    pub account: Url,
}

impl Endpoints {
    pub fn relay(&self, kind: ServiceKind) -> &Url {
        match kind {
            ServiceKind::Telegram => &self.telegram_relay,
            ServiceKind::Mail => &self.mail_relay,
        }
    }
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub endpoints: Endpoints,
    pub api_key: String,
}

/// Merge flags/env with the stored profile. Flags win over the profile.
pub fn resolve(cli: &Cli, profile: &ProfileConfig) -> Result<Settings> {
    let wallet = cli
        .wallet
        .clone()
        .or_else(|| profile.wallet.clone())
        .ok_or_else(|| {
            CoreError::configuration(
                "No wallet configured. Use --wallet, set SHIELDPOST_WALLET, or run: shieldpost config set wallet <address>",
            )
        })?;

    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            CoreError::configuration("No API key configured. Use --api-key or set SHIELDPOST_API_KEY")
        })?;

    let gateway = cli.gateway.clone().or_else(|| profile.gateway.clone());
    let endpoints = Endpoints {
        protector: endpoint(&profile.protector_url, &gateway, "protector")?,
        telegram_relay: endpoint(&profile.telegram_relay_url, &gateway, "relay/telegram")?,
        mail_relay: endpoint(&profile.mail_relay_url, &gateway, "relay/mail")?,
        account: endpoint(&profile.account_url, &gateway, "account")?,
    };

    let mut dispatch = DispatchOptions::default();
    if let Some(mode) = &profile.mode {
        dispatch.mode = mode.parse()?;
    }
    dispatch.timeout = profile.timeout_ms.map(Duration::from_millis);

    let max_price = match &profile.max_price {
        Some(price) => TokenAmount::parse(price)?,
        None => TokenAmount::ZERO,
    };

    let client = ClientConfig::new(wallet)?
        .with_service(ServiceProfile::new(
            ServiceKind::Telegram,
            app_or_default(&profile.telegram_app, ServiceKind::Telegram),
        ))
        .with_service(ServiceProfile::new(
            ServiceKind::Mail,
            app_or_default(&profile.mail_app, ServiceKind::Mail),
        ))
        .with_max_price(max_price)
        .with_dispatch(dispatch);

    Ok(Settings {
        client,
        endpoints,
        api_key,
    })
}

fn app_or_default(app: &Option<String>, kind: ServiceKind) -> String {
    app.clone()
        .unwrap_or_else(|| kind.default_app().to_string())
}

fn endpoint(explicit: &Option<String>, gateway: &Option<String>, path: &str) -> Result<Url> {
    let raw = match (explicit, gateway) {
        (Some(url), _) => url.clone(),
        (None, Some(gateway)) => format!("{}/{path}", gateway.trim_end_matches('/')),
        (None, None) => {
            return Err(CoreError::configuration(format!(
                "No endpoint for {path}. Use --gateway, set SHIELDPOST_GATEWAY, or run: shieldpost config set gateway <url>"
            ))
            .into());
        }
    };
    Url::parse(&raw).with_context(|| format!("Invalid endpoint URL: {raw}"))
}
