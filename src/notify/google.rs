// src/notify/google.rs
//! Google Indexing API client: service-account JWT → access token → publish.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{NotificationType, Notifier, PublishResponse};
use crate::error::{IndexerError, Result};

const INDEXING_SCOPE: &str = "https://www.googleapis.com/auth/indexing";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a service-account key file we need. No `Debug`: it holds the private key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| IndexerError::io(path, e))?;
        serde_json::from_str(&data).map_err(|e| {
            IndexerError::Config(format!(
                "invalid service account key {}: {e}",
                path.display()
            ))
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Serialize)]
struct PublishBody<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: NotificationType,
}

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

pub struct GoogleIndexingNotifier {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    endpoint: String,
    kind: NotificationType,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleIndexingNotifier {
    pub fn new(key: ServiceAccountKey, endpoint: &str, kind: NotificationType) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| IndexerError::Config(format!("service account private_key: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("sitemap-indexer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| IndexerError::Config(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key.token_uri,
            key_id: key.private_key_id,
            signing_key,
            endpoint: endpoint.to_string(),
            kind,
            token: Mutex::new(None),
        })
    }

    pub fn from_key_file(path: &Path, endpoint: &str, kind: NotificationType) -> Result<Self> {
        Self::new(ServiceAccountKey::from_file(path)?, endpoint, kind)
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(tok) = guard.as_ref() {
            if Instant::now() < tok.refresh_at {
                return Ok(tok.value.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: INDEXING_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        let assertion = jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| IndexerError::Transport(format!("signing token assertion: {e}")))?;

        let resp = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| IndexerError::Transport(format!("token request: {e}")))?
            .error_for_status()
            .map_err(|e| IndexerError::Transport(format!("token exchange rejected: {e}")))?;
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| IndexerError::Transport(format!("token response: {e}")))?;

        tracing::debug!(expires_in = body.expires_in, "obtained indexing access token");
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_SLACK);
        Ok(AccessToken {
            value: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for GoogleIndexingNotifier {
    async fn publish(&self, url: &str) -> Result<PublishResponse> {
        let token = self.access_token().await?;
        let t0 = Instant::now();
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&token)
            .json(&PublishBody {
                url,
                kind: self.kind,
            })
            .send()
            .await
            .map_err(|e| IndexerError::Transport(format!("publish request: {e}")))?;
        histogram!("indexer_publish_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let status = resp.status().as_u16();
        if status == 401 {
            // Force a new token for the next URL.
            *self.token.lock().await = None;
        }
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status, body = %body.chars().take(300).collect::<String>(), "publish rejected");
        }
        Ok(PublishResponse { status })
    }

    fn name(&self) -> &'static str {
        "google-indexing"
    }
}
