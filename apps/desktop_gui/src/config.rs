use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use client_core::DEFAULT_PROFILE_COLLECTION;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "app.toml";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Firebase,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "firebase" => Ok(Self::Firebase),
            other => Err(anyhow!(
                "unknown backend '{other}'; expected 'local' or 'firebase'"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Firebase => "firebase",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendKind,
    pub database_url: String,
    pub firebase_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub profile_collection: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            database_url: default_database_url(),
            firebase_api_key: None,
            firebase_project_id: None,
            profile_collection: DEFAULT_PROFILE_COLLECTION.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn default_database_url() -> String {
    let root = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("./data"));
    let path = root.join("gear_reviews").join("app.db");
    format!("sqlite://{}", path.display().to_string().replace('\\', "/"))
}

/// Flat keys accepted in the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    backend: Option<String>,
    database_url: Option<String>,
    firebase_api_key: Option<String>,
    firebase_project_id: Option<String>,
    profile_collection: Option<String>,
    log_filter: Option<String>,
}

/// Defaults, then the config file, then `APP__*` environment variables.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

pub fn load_settings_with(
    config_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg = toml::from_str::<FileSettings>(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg)?;
        }
        Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, env)?;
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) -> Result<()> {
    if let Some(v) = file_cfg.backend {
        settings.backend = v.parse()?;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.firebase_api_key {
        settings.firebase_api_key = Some(v);
    }
    if let Some(v) = file_cfg.firebase_project_id {
        settings.firebase_project_id = Some(v);
    }
    if let Some(v) = file_cfg.profile_collection {
        settings.profile_collection = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = env("APP__BACKEND") {
        settings.backend = v.parse()?;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__FIREBASE_API_KEY") {
        settings.firebase_api_key = Some(v);
    }
    if let Some(v) = env("APP__FIREBASE_PROJECT_ID") {
        settings.firebase_project_id = Some(v);
    }
    if let Some(v) = env("APP__PROFILE_COLLECTION") {
        settings.profile_collection = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    Ok(())
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.profile_collection.trim().is_empty() {
        bail!("profile_collection must not be empty");
    }
    if settings.backend == BackendKind::Firebase {
        let missing = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());
        if missing(&settings.firebase_api_key) {
            bail!("firebase backend selected but APP__FIREBASE_API_KEY / firebase_api_key is not set");
        }
        if missing(&settings.firebase_project_id) {
            bail!(
                "firebase backend selected but APP__FIREBASE_PROJECT_ID / firebase_project_id is not set"
            );
        }
    }
    Ok(())
}
