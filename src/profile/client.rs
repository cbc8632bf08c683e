//! Identity service client.
//!
//! Profiles are looked up by stable id or by display name:
//!
//! - `GET {base}/profile/uuid/{uuid}`
//! - `GET {base}/profile/username/{name}`
//!
//! A 200 carries a [`ProfileRecord`]; a 404 is a confirmed absence and maps
//! to `Ok(None)`. Any other status, transport failure, timeout or bad body
//! is a transient error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ProfileRecord;
use crate::config::HttpConfig;
use crate::{PortrayError, Result};

/// Default base URL of the identity service.
pub const DEFAULT_IDENTITY_URL: &str = "https://account-data.hytale.com";

/// Remote lookup of player profiles.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Look up a profile by stable id.
    async fn by_id(&self, id: Uuid) -> Result<Option<ProfileRecord>>;

    /// Look up a profile by display name (matched case-insensitively by
    /// the service).
    async fn by_name(&self, name: &str) -> Result<Option<ProfileRecord>>;
}

/// HTTP client for the identity service.
#[derive(Clone)]
pub struct HttpIdentityService {
    http: Client,
    base_url: Url,
    session_token: Option<String>,
    timeout: Duration,
}

impl HttpIdentityService {
    /// Build an identity client from the HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| PortrayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.identity_url).map_err(|e| {
            PortrayError::Configuration(format!("invalid identity url {}: {e}", config.identity_url))
        })?;
        Ok(Self {
            http,
            base_url,
            session_token: config.session_token.clone(),
            timeout: config.timeout(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PortrayError::Configuration(format!("identity url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn lookup(&self, url: Url) -> Result<Option<ProfileRecord>> {
        let mut request = self.http.get(url.clone()).header(ACCEPT, "application/json");
        if let Some(token) = &self.session_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortrayError::from_reqwest(e, self.timeout))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| PortrayError::from_reqwest(e, self.timeout))?;
                let record: ProfileRecord = serde_json::from_slice(&body)?;
                debug!(id = %record.uuid, username = %record.username, "resolved profile");
                Ok(Some(record))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(%url, status = status.as_u16(), "profile lookup failed");
                Err(PortrayError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn by_id(&self, id: Uuid) -> Result<Option<ProfileRecord>> {
        let url = self.endpoint(&["profile", "uuid", &id.to_string()])?;
        self.lookup(url).await
    }

    async fn by_name(&self, name: &str) -> Result<Option<ProfileRecord>> {
        let url = self.endpoint(&["profile", "username", name])?;
        self.lookup(url).await
    }
}
