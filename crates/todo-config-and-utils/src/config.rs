//! Client configuration.
//!
//! Resolution order, lowest to highest precedence:
//! compile-time defaults, `config.json`, `TODO_SYNC_*` environment variables.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (overridable at compile time via SUPABASE_URL).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://project.supabase.co",
};

/// Default Supabase publishable key (overridable at compile time via SUPABASE_PUBLISHABLE_KEY).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "publishable-key",
};

/// Where confirmation emails send the user after sign-up.
pub const DEFAULT_EMAIL_REDIRECT: &str = match option_env!("EMAIL_REDIRECT_TO") {
    Some(url) => url,
    None => "http://localhost:5173",
};

pub const DEFAULT_TODOS_TABLE: &str = "todos";

pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_LOG_LEVEL: &str = "TODO_SYNC_LOG_LEVEL";
const ENV_SUPABASE_URL: &str = "TODO_SYNC_SUPABASE_URL";
const ENV_SUPABASE_KEY: &str = "TODO_SYNC_SUPABASE_KEY";
const ENV_EMAIL_REDIRECT: &str = "TODO_SYNC_EMAIL_REDIRECT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Publishable (anon) API key, safe to ship in the client.
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    #[serde(default = "default_email_redirect")]
    pub email_redirect_to: String,
    #[serde(default = "default_todos_table")]
    pub todos_table: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_email_redirect() -> String {
    DEFAULT_EMAIL_REDIRECT.to_string()
}

fn default_todos_table() -> String {
    DEFAULT_TODOS_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_publishable_key: default_supabase_publishable_key(),
            email_redirect_to: default_email_redirect(),
            todos_table: default_todos_table(),
        }
    }
}

impl Config {
    /// Load `config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `TODO_SYNC_*` overrides. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(ENV_LOG_LEVEL) {
            self.log_level = v;
        }
        if let Some(v) = get(ENV_SUPABASE_URL) {
            self.supabase_url = v;
        }
        if let Some(v) = get(ENV_SUPABASE_KEY) {
            self.supabase_publishable_key = v;
        }
        if let Some(v) = get(ENV_EMAIL_REDIRECT) {
            self.email_redirect_to = v;
        }
    }

    fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        if self.supabase_publishable_key.trim().is_empty() {
            return Err(CoreError::Config(
                "supabase_publishable_key must not be empty".to_string(),
            ));
        }
        if self.todos_table.trim().is_empty() {
            return Err(CoreError::Config("todos_table must not be empty".to_string()));
        }
        Ok(())
    }

    /// The Supabase URL, parsed.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }
}
