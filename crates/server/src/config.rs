use std::{fs, path::Path};

use anyhow::Context;
use mailer::GraphConfig;
use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Mock SSO: identity comes from the `x-user-email` header.
    #[default]
    Dev,
    Jwt,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub mode: AuthMode,
    pub jwt_secret: Option<String>,
    pub dev_default_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub from_address: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            from_address: "noreply@example.com".into(),
        }
    }
}

impl MailSettings {
    /// Graph credentials, or `None` when any of them is missing.
    pub fn graph_config(&self) -> Option<GraphConfig> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(GraphConfig {
            tenant_id: present(&self.tenant_id)?,
            client_id: present(&self.client_id)?,
            client_secret: present(&self.client_secret)?,
            from_address: self.from_address.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    /// Admin directory database. In-memory admin state when unset.
    pub database_url: Option<String>,
    pub dashboard_url: String,
    pub cors_origins: Vec<String>,
    pub mock_control_count: usize,
    pub mock_seed: u64,
    pub max_ingest_bytes: usize,
    pub auth: AuthSettings,
    pub mail: MailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".into(),
            database_url: None,
            dashboard_url: "http://localhost:3000".into(),
            cors_origins: vec!["http://localhost:3000".into()],
            mock_control_count: 100,
            mock_seed: 2025,
            max_ingest_bytes: 10 * 1024 * 1024,
            auth: AuthSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = read_settings_file(Path::new(SETTINGS_FILE))?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

/// Legacy variable names first, then `APP__*`, so the prefixed form wins.
pub(crate) fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(port) = var("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
        settings.bind_addr = format!("0.0.0.0:{port}");
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = Some(v);
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = Some(v);
    }

    if let Some(v) = var("APP__DASHBOARD_URL") {
        settings.dashboard_url = v;
    }
    if let Some(v) = var("APP__CORS_ORIGINS") {
        settings.cors_origins = v
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = var("APP__MOCK_CONTROL_COUNT").and_then(|v| v.parse().ok()) {
        settings.mock_control_count = v;
    }
    if let Some(v) = var("APP__MOCK_SEED").and_then(|v| v.parse().ok()) {
        settings.mock_seed = v;
    }
    if let Some(v) = var("APP__MAX_INGEST_BYTES").and_then(|v| v.parse().ok()) {
        settings.max_ingest_bytes = v;
    }

    match var("APP__AUTH__MODE").as_deref().map(str::trim) {
        Some("dev") => settings.auth.mode = AuthMode::Dev,
        Some("jwt") => settings.auth.mode = AuthMode::Jwt,
        _ => {}
    }
    if let Some(v) = var("APP__AUTH__JWT_SECRET") {
        settings.auth.jwt_secret = Some(v);
    }
    if let Some(v) = var("APP__AUTH__DEV_DEFAULT_EMAIL") {
        settings.auth.dev_default_email = Some(v);
    }

    let mail = &mut settings.mail;
    for (legacy, prefixed, slot) in [
        ("AZURE_TENANT_ID", "APP__MAIL__TENANT_ID", &mut mail.tenant_id),
        ("AZURE_CLIENT_ID", "APP__MAIL__CLIENT_ID", &mut mail.client_id),
        (
            "AZURE_CLIENT_SECRET",
            "APP__MAIL__CLIENT_SECRET",
            &mut mail.client_secret,
        ),
    ] {
        if let Some(v) = var(legacy) {
            *slot = Some(v);
        }
        if let Some(v) = var(prefixed) {
            *slot = Some(v);
        }
    }
    if let Some(v) = var("MAIL_FROM_ADDRESS") {
        mail.from_address = v;
    }
    if let Some(v) = var("APP__MAIL__FROM_ADDRESS") {
        mail.from_address = v;
    }
}

/// Accepts bare paths as well as `sqlite:` URLs, and keeps Windows drive
/// paths in the single-colon form sqlx understands.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    let path = if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        path
    } else if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        path
    } else if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    } else {
        raw_database_url
    };

    let path = path.replace('\\', "/");
    if has_windows_drive(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_windows_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
