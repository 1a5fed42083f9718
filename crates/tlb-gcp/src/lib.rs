//! Google Secret Manager adapter.
//!
//! Reads the latest version of each secret through the REST API, using an
//! access token from the instance metadata server (App Engine / Cloud Run /
//! GCE service account).

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use tlb_core::{errors::Error, secrets::SecretSource, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    /// Base64-encoded secret bytes.
    data: String,
}

#[derive(Clone, Debug)]
pub struct GcpSecretManager {
    project: String,
    http: reqwest::Client,
}

impl GcpSecretManager {
    pub fn new(project: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::External(format!("reqwest client build: {e}")))?;
        Ok(Self {
            project: project.into(),
            http,
        })
    }

    fn secret_version_url(&self, name: &str) -> String {
        format!(
            "{SECRET_MANAGER_URL}/projects/{}/secrets/{name}/versions/latest:access",
            self.project
        )
    }

    async fn access_token(&self) -> Result<String> {
        let resp = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Secret(format!("error connecting to metadata server: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Secret(format!(
                "metadata server refused token request: {}",
                resp.status()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Secret(format!("metadata token json error: {e}")))?;
        Ok(token.access_token)
    }
}

fn decode_payload(data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Secret(format!("secret payload is not base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| Error::Secret("secret payload is not utf-8".to_string()))
}

#[async_trait]
impl SecretSource for GcpSecretManager {
    async fn secret(&self, name: &str) -> Result<SecretString> {
        let token = self.access_token().await?;

        let resp = self
            .http
            .get(self.secret_version_url(name))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| Error::Secret(format!("error reading secret {name}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Secret(format!(
                "error reading secret {name}: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: AccessSecretVersionResponse = resp
            .json()
            .await
            .map_err(|e| Error::Secret(format!("secret {name} json error: {e}")))?;

        debug!(secret = name, "read secret from secret manager");
        decode_payload(&v.payload.data).map(SecretString::new)
    }
}
