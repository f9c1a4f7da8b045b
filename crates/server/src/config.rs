use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub uploads_dir: PathBuf,
    pub admin_password: Option<String>,
    pub max_upload_bytes: usize,
    /// Comma-separated list of origins allowed to call with credentials.
    pub allowed_origins: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".into(),
            database_url: "sqlite://./data/repertoire.db".into(),
            uploads_dir: PathBuf::from("./data/uploads"),
            admin_password: None,
            max_upload_bytes: 16 * 1024 * 1024,
            allowed_origins: "http://localhost:5173,http://127.0.0.1:5173".into(),
        }
    }
}

impl Settings {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Reads `server.toml` (optional) and `APP__*` variables over the defaults.
pub fn load_settings() -> anyhow::Result<Settings> {
    let env: HashMap<String, String> = std::env::vars().collect();
    settings_from(Path::new("server.toml"), &env)
}

pub(crate) fn settings_from(
    config_file: &Path,
    env: &HashMap<String, String>,
) -> anyhow::Result<Settings> {
    let raw = Config::builder()
        .add_source(File::from(config_file).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .source(Some(env.clone().into_iter().collect())),
        )
        .build()
        .context("failed to read server configuration")?;
    let mut settings: Settings = raw
        .try_deserialize()
        .context("invalid server configuration")?;

    if !env.contains_key("APP__DATABASE_URL") {
        if let Some(v) = env.get("DATABASE_URL") {
            settings.database_url = v.clone();
        }
    }
    if !env.contains_key("APP__ADMIN_PASSWORD") {
        if let Some(v) = env.get("ADMIN_PASSWORD") {
            settings.admin_password = Some(v.clone());
        }
    }
    settings.admin_password = settings.admin_password.filter(|p| !p.is_empty());

    Ok(settings)
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    format!("sqlite://{path}")
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(parent) = sqlite_path(database_url)
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
    else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(&parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
