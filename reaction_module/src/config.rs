//! Runtime configuration from the environment plus an optional TOML file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use sheets_module::GoogleAuthConfig;

use crate::record::RecordDefaults;

pub const DEFAULT_TARGET_REACTION: &str = "white_check_mark";
pub const DEFAULT_SHEET_TITLE: &str = "Slack Messages";
const DEFAULT_CONFIG_FILE: &str = "recorder.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("no Google credentials; set GOOGLE_SERVICE_ACCOUNT_KEY, GOOGLE_ACCESS_TOKEN or GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET/GOOGLE_REFRESH_TOKEN")]
    MissingGoogleCredentials,
    #[error("failed to read {path}: {message}")]
    File { path: PathBuf, message: String },
}

/// `[sheet]` table of the config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetSettings {
    /// Title of the tab created when the spreadsheet has none.
    pub title: String,
    pub system_tag: String,
    pub default_assignee: Option<String>,
    pub assign_reactor: bool,
    pub completed: String,
    pub utc_offset_hours: i32,
    pub dedup_retention_secs: u64,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_SHEET_TITLE.to_string(),
            system_tag: String::new(),
            default_assignee: None,
            assign_reactor: false,
            completed: String::new(),
            utc_offset_hours: 9,
            dedup_retention_secs: 60 * 60,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecorderConfigFile {
    #[serde(default)]
    sheet: SheetSettings,
}

/// Everything needed to reach the destination spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetAccess {
    pub spreadsheet_id: String,
    pub google: GoogleAuthConfig,
    pub settings: SheetSettings,
}

impl SheetAccess {
    pub fn from_env() -> Result<Self, ConfigError> {
        let spreadsheet_id = non_empty_env("GOOGLE_SPREADSHEET_ID")
            .ok_or(ConfigError::Missing("GOOGLE_SPREADSHEET_ID"))?;
        let google = GoogleAuthConfig::from_env();
        if !google.is_valid() {
            return Err(ConfigError::MissingGoogleCredentials);
        }
        let settings = match resolve_config_path() {
            Some(path) => load_sheet_settings(&path)?,
            None => SheetSettings::default(),
        };
        settings.utc_offset()?;
        // Zero retention would forget every event as soon as it is marked.
        if settings.dedup_retention_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "dedup_retention_secs",
                value: settings.dedup_retention_secs.to_string(),
            });
        }
        Ok(Self {
            spreadsheet_id,
            google,
            settings,
        })
    }
}

impl SheetSettings {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        offset_from_hours(self.utc_offset_hours)
    }

    pub fn record_defaults(&self) -> Result<RecordDefaults, ConfigError> {
        Ok(RecordDefaults {
            system_tag: self.system_tag.clone(),
            default_assignee: self
                .default_assignee
                .clone()
                .filter(|value| !value.trim().is_empty()),
            assign_reactor: self.assign_reactor,
            completed: self.completed.clone(),
            utc_offset: self.utc_offset()?,
        })
    }

    pub fn dedup_retention(&self) -> Duration {
        Duration::from_secs(self.dedup_retention_secs)
    }
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub slack_bot_token: String,
    /// Request signature checks are skipped when unset.
    pub slack_signing_secret: Option<String>,
    pub host: String,
    pub port: u16,
    pub target_reaction: String,
    pub sheets: SheetAccess,
}

impl RecorderConfig {
    /// Read the process environment. Callers load `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let slack_bot_token =
            non_empty_env("SLACK_BOT_TOKEN").ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;
        let sheets = SheetAccess::from_env()?;

        let port = match non_empty_env("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => 3000,
        };

        Ok(Self {
            slack_bot_token,
            slack_signing_secret: non_empty_env("SLACK_SIGNING_SECRET"),
            host: non_empty_env("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            target_reaction: non_empty_env("TARGET_REACTION")
                .unwrap_or_else(|| DEFAULT_TARGET_REACTION.to_string()),
            sheets,
        })
    }
}

/// `RECORDER_CONFIG_PATH`, else `./recorder.toml` when it exists.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env("RECORDER_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    let direct = env::current_dir().ok()?.join(DEFAULT_CONFIG_FILE);
    direct.exists().then_some(direct)
}

pub fn load_sheet_settings(path: &Path) -> Result<SheetSettings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|err| ConfigError::File {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let file: RecorderConfigFile = toml::from_str(&content).map_err(|err| ConfigError::File {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(file.sheet)
}

fn offset_from_hours(hours: i32) -> Result<FixedOffset, ConfigError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::Invalid {
            name: "utc_offset_hours",
            value: hours.to_string(),
        })
}

/// Tracing filter from `RUST_LOG` when set, else `LOG_LEVEL`, else info.
pub fn log_filter_from_env() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter(non_empty_env("LOG_LEVEL").as_deref()))
}

/// `level` accepts any filter directive; unparsable values mean info.
pub fn log_filter(level: Option<&str>) -> EnvFilter {
    level
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
