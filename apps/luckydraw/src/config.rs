use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use draw_core::WorkerOptions;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub operator_id: Option<String>,
    pub storage_timeout_ms: u64,
    pub queue_capacity: usize,
    pub draw_seed: Option<u64>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/luckydraw.db".into(),
            operator_id: None,
            storage_timeout_ms: 10_000,
            queue_capacity: 64,
            draw_seed: None,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            queue_capacity: self.queue_capacity.max(1),
            request_timeout: Duration::from_millis(self.storage_timeout_ms.max(1)),
        }
    }
}

/// Defaults, then `path` if it exists, then environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("LUCKYDRAW__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("LUCKYDRAW__OPERATOR_ID") {
        settings.operator_id = Some(v);
    }

    if let Some(v) = lookup("LUCKYDRAW__STORAGE_TIMEOUT_MS") {
        settings.storage_timeout_ms = v
            .parse()
            .with_context(|| format!("LUCKYDRAW__STORAGE_TIMEOUT_MS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("LUCKYDRAW__QUEUE_CAPACITY") {
        settings.queue_capacity = v
            .parse()
            .with_context(|| format!("LUCKYDRAW__QUEUE_CAPACITY is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("LUCKYDRAW__DRAW_SEED") {
        settings.draw_seed = Some(
            v.parse()
                .with_context(|| format!("LUCKYDRAW__DRAW_SEED is not a number: '{v}'"))?,
        );
    }

    if let Some(v) = lookup("LUCKYDRAW__LOG_FILTER") {
        settings.log_filter = v;
    }

    Ok(())
}

/// Turns a bare file path into a sqlite url. `Storage::new` creates the directory.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
