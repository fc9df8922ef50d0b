//! Device Frame Core Library
//!
//! This library drives the client side of the device-frames workflow: pick a
//! device model and color, preview a screenshot inside its bezel, and have the
//! remote frame service produce the final PNG.
//!
//! # Overview
//!
//! - **Catalog**: validated index of every frame, via [`catalog`]
//! - **Selection**: the category → device → variation cascade, via [`selection`]
//! - **Preview**: screen rectangle as fractions of the frame, via [`geometry`]
//! - **Requests**: race-safe "apply frame" calls, via [`coordinator`]
//! - **Service**: HTTP client for the frame service, via [`service`]
//! - **Gallery**: flat, searchable listing of all frames, via [`gallery`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`FrameStudio`] facade:
//!
//! ```ignore
//! use device_frame_core::{FrameStudio, SourceImage};
//!
//! let mut studio = FrameStudio::new(Config::load()?)?;
//! studio.load_catalog().await?;
//! studio.set_category("iOS")?;
//!
//! studio.submit_frame(SourceImage::from_path("shot.png")?);
//! studio.settle().await;
//! if let Some(png) = studio.result_bytes() {
//!     std::fs::write("framed.png", png)?;
//! }
//! ```
//!
//! # Module Structure
//!
//! - [`catalog`]: Catalog loading and traversal
//! - [`config`]: Configuration loading and management
//! - [`coordinator`]: Frame request generations and result handles
//! - [`error`]: Error types and result aliases
//! - [`gallery`]: Gallery rows, grouping and category labels
//! - [`geometry`]: Preview overlay geometry
//! - [`image_processing`]: Source image intake
//! - [`selection`]: Selection cascade
//! - [`service`]: Frame service client

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gallery;
pub mod geometry;
pub mod image_processing;
pub mod selection;
pub mod service;

// Re-export primary types for convenience
pub use catalog::{Catalog, CatalogEntry};
pub use config::Config;
pub use coordinator::{FrameRequestCoordinator, FrameStatus, FramedImage, Generation};
pub use error::{AppError, CatalogLoadError, FrameApplyError, Result, SelectionInvalidError};
pub use geometry::NormalizedRect;
pub use image_processing::SourceImage;
pub use selection::{Selection, SelectionCascade, SelectionState};
pub use service::{FrameService, HttpFrameService};

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Observable view of the selection side of a [`FrameStudio`].
///
/// Request progress is published separately through
/// [`FrameStudio::subscribe_requests`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudioSnapshot {
    pub catalog_loaded: bool,
    pub selection: Selection,
    pub background_color: Option<String>,
    pub has_source_image: bool,
    pub preview: Option<NormalizedRect>,
}

/// Main entry point for device framing.
///
/// Owns the catalog, the selection cascade and the request coordinator, and
/// keeps them in step: every committed selection change is published to
/// subscribers, and changing the selection while a screenshot is loaded
/// re-submits it automatically.
///
/// Mutators take `&mut self`; the studio is meant to be driven from a single
/// task. Frame requests run on the Tokio runtime in the background.
pub struct FrameStudio {
    config: Config,
    service: Arc<dyn FrameService>,
    catalog: Option<Catalog>,
    cascade: SelectionCascade,
    coordinator: FrameRequestCoordinator,
    snapshot: watch::Sender<StudioSnapshot>,
}

impl FrameStudio {
    /// Creates a studio talking to the configured frame service over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let service = HttpFrameService::new(&config)?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Creates a studio over any [`FrameService`] implementation.
    pub fn with_service(config: Config, service: Arc<dyn FrameService>) -> Self {
        let cascade = SelectionCascade::new(config.defaults.clone());
        let coordinator = FrameRequestCoordinator::new(Arc::clone(&service));
        let (snapshot, _) = watch::channel(StudioSnapshot::default());
        Self {
            config,
            service,
            catalog: None,
            cascade,
            coordinator,
            snapshot,
        }
    }

    /// Fetches and validates the device list, then reconciles the selection.
    ///
    /// On failure the previously loaded catalog, if any, stays in place. If
    /// the selection resolves to nothing afterwards, any result is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CatalogLoad`] if the listing is unreachable,
    /// malformed, or contains an entry with invalid geometry.
    pub async fn load_catalog(&mut self) -> Result<()> {
        let catalog = match self.service.list_catalog().await.and_then(Catalog::load) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load device list");
                return Err(e.into());
            }
        };

        let before = self.cascade.state().clone();
        self.cascade.reconcile(&catalog);
        self.catalog = Some(catalog);
        if self.current_entry().is_none() {
            self.coordinator.reset();
        }
        self.after_change(&before, true);
        Ok(())
    }

    /// Selects a category; device and variation follow.
    pub fn set_category(&mut self, category: &str) -> Result<()> {
        let catalog = self.catalog.as_ref().ok_or(SelectionInvalidError::CatalogNotLoaded)?;
        let before = self.cascade.state().clone();
        self.cascade.set_category(catalog, category)?;
        self.after_change(&before, false);
        Ok(())
    }

    /// Selects a device within the current category; variation follows.
    pub fn set_device(&mut self, device: &str) -> Result<()> {
        let catalog = self.catalog.as_ref().ok_or(SelectionInvalidError::CatalogNotLoaded)?;
        let before = self.cascade.state().clone();
        self.cascade.set_device(catalog, device)?;
        self.after_change(&before, false);
        Ok(())
    }

    /// Selects a variation of the current device.
    pub fn set_variation(&mut self, variation: &str) -> Result<()> {
        let catalog = self.catalog.as_ref().ok_or(SelectionInvalidError::CatalogNotLoaded)?;
        let before = self.cascade.state().clone();
        self.cascade.set_variation(catalog, variation)?;
        self.after_change(&before, false);
        Ok(())
    }

    /// Sets the hex background color; `None` or blank means transparent.
    pub fn set_background_color(&mut self, color: Option<&str>) {
        let before = self.cascade.state().clone();
        self.cascade.set_background_color(color);
        self.after_change(&before, false);
    }

    /// Loads a screenshot and requests a framed version of it.
    ///
    /// Returns the request generation, or `None` if the selection is not
    /// complete yet. The screenshot is kept either way and is submitted as
    /// soon as the selection resolves.
    pub fn submit_frame(&mut self, source: SourceImage) -> Option<Generation> {
        self.cascade.set_source_image(Some(source));
        let generation = self.submit_current();
        self.publish();
        generation
    }

    /// Starts over: drops the screenshot, background color and any result.
    ///
    /// The device selection is kept. Calling this repeatedly has the same
    /// effect as calling it once.
    pub fn reset_selection(&mut self) {
        self.cascade.start_over();
        self.coordinator.reset();
        self.publish();
    }

    /// Waits for all submitted frame requests to settle.
    pub async fn settle(&self) {
        self.coordinator.settle().await;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn selection(&self) -> &SelectionState {
        self.cascade.state()
    }

    /// The catalog entry the selection currently resolves to.
    pub fn current_entry(&self) -> Option<&CatalogEntry> {
        self.cascade.selection().resolve(self.catalog.as_ref()?)
    }

    /// Where to draw the screenshot over the current frame, as fractions.
    pub fn preview(&self) -> Option<NormalizedRect> {
        self.current_entry().map(geometry::overlay_rect)
    }

    /// Absolute URL of the current bezel image.
    pub fn frame_image_url(&self) -> Option<Url> {
        service::frame_image_url(&self.config.api_base_url, self.current_entry()?).ok()
    }

    pub fn request_status(&self) -> FrameStatus {
        self.coordinator.status()
    }

    /// Runs `f` against the visible framed image, if any.
    pub fn with_result<R>(&self, f: impl FnOnce(&FramedImage) -> R) -> Option<R> {
        self.coordinator.with_result(f)
    }

    /// Copy of the visible framed PNG.
    pub fn result_bytes(&self) -> Option<Vec<u8>> {
        self.coordinator.with_result(|image| image.bytes().to_vec())
    }

    /// Writes the visible framed PNG to `path`.
    ///
    /// Returns `false` without touching the filesystem when there is no result.
    pub fn save_result(&self, path: impl AsRef<Path>) -> Result<bool> {
        match self.result_bytes() {
            Some(bytes) => {
                std::fs::write(path.as_ref(), bytes)?;
                tracing::info!(path = %path.as_ref().display(), "saved framed image");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Suggested file name for saving the result on `date`.
    pub fn download_file_name(&self, date: NaiveDate) -> Option<String> {
        let selection = self.cascade.selection();
        selection.is_complete().then(|| {
            image_processing::download_file_name(&selection.device, &selection.variation, date)
        })
    }

    /// Receiver notified on every committed selection change.
    pub fn subscribe(&self) -> watch::Receiver<StudioSnapshot> {
        self.snapshot.subscribe()
    }

    /// Receiver notified on every frame request status change.
    pub fn subscribe_requests(&self) -> watch::Receiver<FrameStatus> {
        self.coordinator.subscribe()
    }

    pub fn coordinator(&self) -> &FrameRequestCoordinator {
        &self.coordinator
    }

    fn submit_current(&self) -> Option<Generation> {
        let catalog = self.catalog.as_ref()?;
        self.coordinator.submit(catalog, self.cascade.state())
    }

    /// Publishes and re-submits if anything the service depends on changed.
    fn after_change(&self, before: &SelectionState, force_publish: bool) {
        let state = self.cascade.state();
        let changed = state.selection != before.selection
            || state.background_color != before.background_color;
        if changed && state.source_image.is_some() {
            self.submit_current();
        }
        if changed || force_publish {
            self.publish();
        }
    }

    fn publish(&self) {
        let state = self.cascade.state();
        self.snapshot.send_replace(StudioSnapshot {
            catalog_loaded: self.catalog.is_some(),
            selection: state.selection.clone(),
            background_color: state.background_color.clone(),
            has_source_image: state.source_image.is_some(),
            preview: self.preview(),
        });
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present and sets up the environment.
pub fn init() {
    let _ = dotenvy::dotenv();
}
