//! Secret source port.
//!
//! Bot credentials are read once at startup. The environment implementation
//! lives here; the Google Secret Manager one is in `tlb-gcp`.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::{errors::Error, Result};

pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";

#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn secret(&self, name: &str) -> Result<SecretString>;
}

/// Reads each secret from the environment variable of the same name.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecretSource;

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn secret(&self, name: &str) -> Result<SecretString> {
        match std::env::var(name) {
            Ok(v) if !v.trim().is_empty() => Ok(SecretString::new(v.trim().to_string())),
            _ => Err(Error::Secret(format!("{name} is not set"))),
        }
    }
}

/// Slack credentials needed to start the transport.
pub struct SlackCredentials {
    pub bot_token: SecretString,
    pub app_token: SecretString,
}

impl SlackCredentials {
    pub async fn load(source: &dyn SecretSource) -> Result<Self> {
        Ok(Self {
            bot_token: source.secret(SLACK_BOT_TOKEN).await?,
            app_token: source.secret(SLACK_APP_TOKEN).await?,
        })
    }
}
