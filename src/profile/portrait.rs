//! Portrait rendering: view variants and the rendering service client.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::CacheSource;
use crate::config::HttpConfig;
use crate::{PortrayError, Result};

/// Camera view a portrait is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortraitView {
    Face,
    Front,
    Back,
    Avatar,
}

impl PortraitView {
    /// Every view, in declaration order.
    pub const ALL: [PortraitView; 4] = [
        PortraitView::Face,
        PortraitView::Front,
        PortraitView::Back,
        PortraitView::Avatar,
    ];

    /// Identifier used by the rendering service and in asset paths.
    pub fn api_key(self) -> &'static str {
        match self {
            PortraitView::Face => "face",
            PortraitView::Front => "front",
            PortraitView::Back => "back",
            PortraitView::Avatar => "avatar",
        }
    }
}

impl fmt::Display for PortraitView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_key())
    }
}

impl FromStr for PortraitView {
    type Err = PortrayError;

    fn from_str(s: &str) -> Result<Self> {
        PortraitView::ALL
            .into_iter()
            .find(|view| view.api_key().eq_ignore_ascii_case(s))
            .ok_or_else(|| PortrayError::Configuration(format!("invalid view: {s}")))
    }
}

/// Renders a skin descriptor into image bytes.
///
/// `Ok(None)` means the service produced nothing for this skin and view.
#[async_trait]
pub trait PortraitRenderer: Send + Sync {
    async fn render(&self, skin: &str, view: PortraitView) -> Result<Option<Bytes>>;
}

/// Default base URL of the rendering service.
pub const DEFAULT_RENDERER_URL: &str = "https://hytlskins.com/skin/recipe";

/// HTTP client for the rendering service.
///
/// `GET {base}/{view}?recipe={base64url(skin)}`; redirects are followed.
#[derive(Clone)]
pub struct HttpPortraitRenderer {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpPortraitRenderer {
    /// Build a renderer client from the HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| PortrayError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(&config.renderer_url).map_err(|e| {
            PortrayError::Configuration(format!("invalid renderer url {}: {e}", config.renderer_url))
        })?;
        Ok(Self {
            http,
            base_url,
            timeout: config.timeout(),
        })
    }

    fn endpoint(&self, skin: &str, view: PortraitView) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PortrayError::Configuration(format!("renderer url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .push(view.api_key());
        url.query_pairs_mut().append_pair("recipe", &encode_recipe(skin));
        Ok(url)
    }
}

/// Encode a skin descriptor the way the rendering service expects it.
pub(crate) fn encode_recipe(skin: &str) -> String {
    URL_SAFE_NO_PAD.encode(skin.as_bytes())
}

#[async_trait]
impl PortraitRenderer for HttpPortraitRenderer {
    async fn render(&self, skin: &str, view: PortraitView) -> Result<Option<Bytes>> {
        let url = self.endpoint(skin, view)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PortrayError::from_reqwest(e, self.timeout))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| PortrayError::from_reqwest(e, self.timeout))?;
                Ok((!body.is_empty()).then_some(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(%view, status = status.as_u16(), "portrait render failed");
                Err(PortrayError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// Per-profile source for the portrait sub-cache.
pub(crate) struct PortraitSource {
    pub(crate) skin: Arc<str>,
    pub(crate) renderer: Arc<dyn PortraitRenderer>,
}

#[async_trait]
impl CacheSource<PortraitView, Bytes> for PortraitSource {
    async fn load(&self, view: &PortraitView) -> Result<Option<Bytes>> {
        self.renderer.render(&self.skin, *view).await
    }
}
