use std::{env, time::Duration};

use crate::{errors::Error, security::AdminAllowList, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretBackend {
    /// Secrets come from environment variables of the same name.
    Env,
    /// Google Secret Manager, `projects/<GOOGLE_CLOUD_PROJECT>/secrets/<name>`.
    Gcp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    /// Nothing persisted across restarts; for local runs.
    Memory,
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Access
    pub admins: AdminAllowList,

    // Startup
    pub port: u16,
    pub debug: bool,
    pub start_on_boot: bool,

    // Secrets
    pub secret_backend: SecretBackend,
    pub gcp_project: Option<String>,

    // Store
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub pair_list_key: String,

    // Pipeline
    pub send_delay: Duration,
    pub channel_capacity: usize,
}

impl Config {
    /// Load `.env` (if present, never overriding the environment) and read
    /// the configuration from environment variables.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("failed to read .env: {e}"))),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let admins = AdminAllowList::from_csv(&lookup("TWIN_LUNCH_ADMINS").unwrap_or_default());

        let port = match lookup("PORT").and_then(non_empty) {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {p}")))?,
            None => 8080,
        };
        let debug = parse_bool(lookup("DEBUG")).unwrap_or(false);
        let start_on_boot = parse_bool(lookup("START_ON_BOOT")).unwrap_or(false);

        let secret_backend = match lookup("SECRET_SOURCE")
            .and_then(non_empty)
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("gcp") => SecretBackend::Gcp,
            Some("env") => SecretBackend::Env,
            Some(other) => {
                return Err(Error::Config(format!(
                    "SECRET_SOURCE must be `env` or `gcp`, got `{other}`"
                )))
            }
        };
        let gcp_project = lookup("GOOGLE_CLOUD_PROJECT").and_then(non_empty);
        if secret_backend == SecretBackend::Gcp && gcp_project.is_none() {
            return Err(Error::Config(
                "GOOGLE_CLOUD_PROJECT environment variable is required with SECRET_SOURCE=gcp"
                    .to_string(),
            ));
        }

        let store_backend = match lookup("STORE")
            .and_then(non_empty)
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("sqlite") => StoreBackend::Sqlite,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(Error::Config(format!(
                    "STORE must be `sqlite` or `memory`, got `{other}`"
                )))
            }
        };
        let database_url = lookup("DATABASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "sqlite://twinlunch.db?mode=rwc".to_string());
        let pair_list_key = lookup("PAIR_LIST_KEY")
            .and_then(non_empty)
            .unwrap_or_else(|| "default".to_string());

        let send_delay = Duration::from_millis(parse_u64(lookup("SEND_DELAY_MS")).unwrap_or(1000));
        let channel_capacity = parse_u64(lookup("CHANNEL_CAPACITY"))
            .map(|n| n as usize)
            .unwrap_or(64)
            .max(1);

        Ok(Self {
            admins,
            port,
            debug,
            start_on_boot,
            secret_backend,
            gcp_project,
            store_backend,
            database_url,
            pair_list_key,
            send_delay,
            channel_capacity,
        })
    }
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
