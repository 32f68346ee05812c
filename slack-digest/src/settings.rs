use std::{env, path::PathBuf, time::Duration};

use config::{Config, File};
use log::debug;
use serde::Deserialize;

use crate::api::rate_limit::RetryPolicy;
use crate::api::{ClientConfig, DEFAULT_API_URL};
use crate::cli::{Args, Command};
use crate::error::DigestError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub marker: Option<String>,
    pub jobs: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

const CONFIG_FILE_NAME: &str = env!("CARGO_PKG_NAME");

// Function to get the XDG_CONFIG_HOME path
fn get_xdg_config_path() -> Option<PathBuf> {
    // First check XDG_CONFIG_HOME environment variable
    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config));
    }

    // If XDG_CONFIG_HOME is not set, fall back to $HOME/.config
    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home).join(".config"));
    }

    None
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let Some(xdg_config) = get_xdg_config_path() else {
        return Ok(Settings::default());
    };

    let config_path = xdg_config.join(CONFIG_FILE_NAME).join("config.toml");
    if !config_path.exists() {
        return Ok(Settings::default());
    }

    let settings = Config::builder()
        .add_source(File::from(config_path.clone()).required(false))
        .build()?
        .try_deserialize()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to deserialize config file {}: {}",
                config_path.display(),
                e
            )
        })?;

    debug!("loaded settings from {}", config_path.display());
    Ok(settings)
}

/// Fills arguments left unset on the command line from the settings file.
pub fn merge_settings_with_args(args: &Args, settings: &Settings) -> Args {
    let mut new_args = args.clone();

    macro_rules! apply_if_empty {
        ($args:expr, $field:ident, $config:expr) => {
            if let Some(value) = &$config.$field {
                if $args.$field.is_empty() {
                    $args.$field = value.clone();
                }
            }
        };
    }

    apply_if_empty!(new_args, token, settings);
    apply_if_empty!(new_args, api_url, settings);

    if new_args.api_url.is_empty() {
        new_args.api_url = DEFAULT_API_URL.to_string();
    }

    if let Command::Digest(digest) = &mut new_args.command {
        if digest.marker.is_none() {
            digest.marker = settings.marker.clone();
        }
        if digest.jobs.is_none() {
            digest.jobs = settings.jobs;
        }
    }

    debug!("merged config: {:?}", RedactedArgs(&new_args));

    new_args
}

struct RedactedArgs<'a>(&'a Args);

impl std::fmt::Debug for RedactedArgs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("token", &if self.0.token.is_empty() { "" } else { "***" })
            .field("api_url", &self.0.api_url)
            .field("command", &self.0.command)
            .finish()
    }
}

/// Client configuration for the merged arguments. A missing token is a
/// configuration error.
pub fn client_config(args: &Args, settings: &Settings) -> Result<ClientConfig, DigestError> {
    if args.token.trim().is_empty() {
        return Err(DigestError::configuration(
            "no Slack token, pass --token or set SLACK_API_TOKEN",
        ));
    }

    let mut config = ClientConfig::new(args.api_url.clone(), args.token.trim());
    if let Some(secs) = settings.request_timeout_secs {
        config.timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(ms) = settings.retry_base_ms {
        config.retry = RetryPolicy {
            base_delay: Duration::from_millis(ms),
            ..RetryPolicy::default()
        };
    }

    Ok(config)
}
