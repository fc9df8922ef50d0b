//! Client for the remote frame service.
//!
//! The service does the actual compositing. Only two calls are used:
//! `GET /list_devices` for the catalog listing and `POST /apply_frame`
//! (multipart) to frame a screenshot. [`FrameService`] is the seam the rest
//! of the crate talks to; [`HttpFrameService`] is the real implementation.

use crate::catalog::{CatalogEntry, RawListing};
use crate::config::Config;
use crate::error::{AppError, CatalogLoadError, FrameApplyError, Result};
use crate::image_processing::SourceImage;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

const APPLY_FRAME_FALLBACK_ERROR: &str = "Failed to apply device frame";

/// Everything the service needs to frame one screenshot.
#[derive(Clone, Debug)]
pub struct ApplyFrameRequest {
    pub category: Option<String>,
    pub device_type: String,
    pub device_variation: String,
    /// Hex color; `None` leaves the background transparent.
    pub background_color: Option<String>,
    pub image: SourceImage,
}

/// The two remote operations the engine depends on.
pub trait FrameService: Send + Sync {
    /// Fetches the nested device listing.
    fn list_catalog(&self) -> BoxFuture<'_, std::result::Result<RawListing, CatalogLoadError>>;

    /// Frames a screenshot and returns the encoded PNG.
    fn apply_frame(
        &self,
        request: ApplyFrameRequest,
    ) -> BoxFuture<'_, std::result::Result<Vec<u8>, FrameApplyError>>;
}

/// [`FrameService`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpFrameService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFrameService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: directory_url(&config.api_base_url),
        })
    }

    fn endpoint(&self, name: &str) -> std::result::Result<Url, url::ParseError> {
        self.base_url.join(name)
    }

    async fn fetch_listing(&self) -> std::result::Result<RawListing, CatalogLoadError> {
        let url = self
            .endpoint("list_devices")
            .map_err(|e| CatalogLoadError::Unreachable(e.to_string()))?;
        tracing::debug!(%url, "requesting device list");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CatalogLoadError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogLoadError::Unreachable(format!(
                "device list request failed with status {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogLoadError::Unreachable(e.to_string()))?;
        RawListing::from_json_str(&body)
    }

    async fn post_apply_frame(
        &self,
        request: ApplyFrameRequest,
    ) -> std::result::Result<Vec<u8>, FrameApplyError> {
        let url = self
            .endpoint("apply_frame")
            .map_err(|e| FrameApplyError::Transport(e.to_string()))?;

        let file = Part::bytes(request.image.bytes().to_vec())
            .file_name(request.image.file_name().to_string())
            .mime_str(request.image.mime_type())
            .map_err(|e| FrameApplyError::Transport(e.to_string()))?;

        let mut form = Form::new()
            .part("file", file)
            .text("device_type", request.device_type)
            .text("device_variation", request.device_variation);
        if let Some(category) = request.category.filter(|c| !c.is_empty()) {
            form = form.text("category", category);
        }
        if let Some(color) = request.background_color.filter(|c| !c.is_empty()) {
            form = form.text("background_color", color);
        }

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FrameApplyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_else(|e| {
                tracing::debug!(%status, error = %e, "could not read error body");
                Default::default()
            });
            return Err(FrameApplyError::Service {
                status: status.as_u16(),
                detail: service_error_detail(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FrameApplyError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl FrameService for HttpFrameService {
    fn list_catalog(&self) -> BoxFuture<'_, std::result::Result<RawListing, CatalogLoadError>> {
        self.fetch_listing().boxed()
    }

    fn apply_frame(
        &self,
        request: ApplyFrameRequest,
    ) -> BoxFuture<'_, std::result::Result<Vec<u8>, FrameApplyError>> {
        self.post_apply_frame(request).boxed()
    }
}

/// Absolute URL of a service-relative asset path such as `/frames/iOS/…/frame.png`.
pub fn asset_url(base: &Url, path: &str) -> std::result::Result<Url, url::ParseError> {
    let base = base.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        Url::parse(&format!("{}{}", base, path))
    } else {
        Url::parse(&format!("{}/{}", base, path))
    }
}

/// Bezel image URL for an entry.
pub fn frame_image_url(base: &Url, entry: &CatalogEntry) -> std::result::Result<Url, url::ParseError> {
    asset_url(base, &entry.frame_image_path)
}

/// Mask image URL for an entry, when the entry has one.
pub fn mask_image_url(
    base: &Url,
    entry: &CatalogEntry,
) -> Option<std::result::Result<Url, url::ParseError>> {
    entry.mask_image_path.as_deref().map(|p| asset_url(base, p))
}

/// Base URL with a trailing slash so relative endpoint joins append.
fn directory_url(base: &Url) -> Url {
    let mut url = base.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Pulls a human-readable message out of an error body.
///
/// Accepts `{"error": "..."}` and `{"detail": ...}`; a non-string `detail`
/// (e.g. a validation error list) is rendered as JSON.
fn service_error_detail(body: &[u8]) -> String {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return APPLY_FRAME_FALLBACK_ERROR.to_string();
    };

    for key in ["error", "detail"] {
        match map.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Null) | None => {}
            Some(Value::String(_)) => {}
            Some(other) => return other.to_string(),
        }
    }
    APPLY_FRAME_FALLBACK_ERROR.to_string()
}
