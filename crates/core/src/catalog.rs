//! Device frame catalog.
//!
//! The frame service publishes a nested `category → device → variation`
//! listing. [`Catalog::load`] validates every leaf and turns the listing into
//! an immutable, ordered index. Iteration order is the order in which keys
//! appear in the listing; nothing here re-sorts.
//!
//! # Example
//!
//! ```ignore
//! use device_frame_core::catalog::{Catalog, RawListing};
//!
//! let listing = RawListing::from_json_str(body)?;
//! let catalog = Catalog::load(listing)?;
//! for category in catalog.categories() {
//!     println!("{}", category);
//! }
//! ```

use crate::error::CatalogLoadError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a screenshot is composited inside a frame image, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScreenRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pixel dimensions of a bezel image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// One device-model-and-color combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub category: String,
    pub device: String,
    pub variation: String,
    /// Service-relative path of the bezel PNG.
    pub frame_image_path: String,
    /// Service-relative path of the alpha mask, when known.
    pub mask_image_path: Option<String>,
    pub screen_rect: ScreenRect,
    pub frame_size: FrameSize,
}

/// The listing exactly as received, before validation.
///
/// Keys keep their wire order.
#[derive(Clone, Debug, Default)]
pub struct RawListing(Map<String, Value>);

impl RawListing {
    /// Parses a listing body.
    pub fn from_json_str(body: &str) -> Result<Self, CatalogLoadError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| CatalogLoadError::Malformed(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CatalogLoadError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CatalogLoadError::Malformed(format!(
                "expected an object of categories, found {}",
                json_kind(&other)
            ))),
        }
    }
}

#[derive(Deserialize)]
struct WireRect {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

#[derive(Deserialize)]
struct WireSize {
    width: i64,
    height: i64,
}

#[derive(Deserialize)]
struct WireTemplate {
    #[serde(default)]
    mask: Option<String>,
    screen: WireRect,
    #[serde(default, rename = "frameSize")]
    frame_size: Option<WireSize>,
}

#[derive(Deserialize)]
struct WireVariation {
    frame_png: String,
    template: WireTemplate,
    #[serde(default)]
    frame_size: Option<WireSize>,
}

#[derive(Clone, Debug)]
struct DeviceNode {
    name: String,
    variations: Vec<CatalogEntry>,
}

#[derive(Clone, Debug)]
struct CategoryNode {
    name: String,
    devices: Vec<DeviceNode>,
}

/// Validated, read-only index of every available frame.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    categories: Vec<CategoryNode>,
}

impl Catalog {
    /// Validates a raw listing and builds the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::Malformed`] when a level is not an object,
    /// a category or device lists nothing beneath it, or a leaf is missing
    /// fields, and [`CatalogLoadError::InvalidGeometry`]
    /// when any screen rectangle is empty or leaves its frame. A single bad
    /// entry fails the whole load.
    pub fn load(raw: RawListing) -> Result<Self, CatalogLoadError> {
        let mut categories = Vec::with_capacity(raw.0.len());

        for (category, devices) in raw.0 {
            let devices = as_object(devices, &category)?;
            if devices.is_empty() {
                return Err(empty_level(&category, "devices"));
            }
            let mut device_nodes = Vec::with_capacity(devices.len());

            for (device, variations) in devices {
                let path = format!("{}/{}", category, device);
                let variations = as_object(variations, &path)?;
                if variations.is_empty() {
                    return Err(empty_level(&path, "variations"));
                }
                let mut entries = Vec::with_capacity(variations.len());

                for (variation, leaf) in variations {
                    entries.push(build_entry(&category, &device, variation, leaf)?);
                }

                device_nodes.push(DeviceNode {
                    name: device,
                    variations: entries,
                });
            }

            categories.push(CategoryNode {
                name: category,
                devices: device_nodes,
            });
        }

        let catalog = Self { categories };
        tracing::info!(
            categories = catalog.categories.len(),
            entries = catalog.len(),
            "device catalog loaded"
        );
        Ok(catalog)
    }

    /// Category keys in listing order.
    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Device keys of `category`, or `None` if the category does not exist.
    pub fn devices_of<'a>(&'a self, category: &str) -> Option<impl Iterator<Item = &'a str> + use<'a>> {
        self.category(category)
            .map(|c| c.devices.iter().map(|d| d.name.as_str()))
    }

    /// Variation keys of `device` under `category`, or `None` if the path does not exist.
    pub fn variations_of<'a>(
        &'a self,
        category: &str,
        device: &str,
    ) -> Option<impl Iterator<Item = &'a str> + use<'a>> {
        self.device(category, device)
            .map(|d| d.variations.iter().map(|e| e.variation.as_str()))
    }

    pub fn entry(&self, category: &str, device: &str, variation: &str) -> Option<&CatalogEntry> {
        self.device(category, device)?
            .variations
            .iter()
            .find(|e| e.variation == variation)
    }

    /// Every entry, category by category, in listing order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> + '_ {
        self.categories
            .iter()
            .flat_map(|c| c.devices.iter())
            .flat_map(|d| d.variations.iter())
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category(category).is_some()
    }

    pub fn has_device(&self, category: &str, device: &str) -> bool {
        self.device(category, device).is_some()
    }

    pub fn first_category(&self) -> Option<&str> {
        self.categories().next()
    }

    pub fn first_device(&self, category: &str) -> Option<&str> {
        self.devices_of(category)?.next()
    }

    pub fn first_variation(&self, category: &str, device: &str) -> Option<&str> {
        self.variations_of(category, device)?.next()
    }

    /// Number of entries (leaves) in the catalog.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// True when the catalog has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    fn category(&self, category: &str) -> Option<&CategoryNode> {
        self.categories.iter().find(|c| c.name == category)
    }

    fn device(&self, category: &str, device: &str) -> Option<&DeviceNode> {
        self.category(category)?
            .devices
            .iter()
            .find(|d| d.name == device)
    }
}

fn as_object(value: Value, path: &str) -> Result<Map<String, Value>, CatalogLoadError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CatalogLoadError::Malformed(format!(
            "'{}' should be an object, found {}",
            path,
            json_kind(&other)
        ))),
    }
}

fn empty_level(path: &str, what: &str) -> CatalogLoadError {
    CatalogLoadError::Malformed(format!("'{}' lists no {}", path, what))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn build_entry(
    category: &str,
    device: &str,
    variation: String,
    leaf: Value,
) -> Result<CatalogEntry, CatalogLoadError> {
    let wire: WireVariation = serde_json::from_value(leaf).map_err(|e| {
        CatalogLoadError::Malformed(format!("{}/{}/{}: {}", category, device, variation, e))
    })?;

    let geometry_error = |reason: String| CatalogLoadError::InvalidGeometry {
        category: category.to_string(),
        device: device.to_string(),
        variation: variation.clone(),
        reason,
    };

    let size = wire
        .frame_size
        .or(wire.template.frame_size)
        .ok_or_else(|| {
            CatalogLoadError::Malformed(format!(
                "{}/{}/{}: missing frame_size",
                category, device, variation
            ))
        })?;
    if size.width <= 0 || size.height <= 0 {
        return Err(geometry_error(format!(
            "frame size {}x{} is not positive",
            size.width, size.height
        )));
    }

    let screen = &wire.template.screen;
    if screen.width <= 0 || screen.height <= 0 {
        return Err(geometry_error(format!(
            "screen size {}x{} is not positive",
            screen.width, screen.height
        )));
    }
    if screen.x < 0 || screen.y < 0 {
        return Err(geometry_error(format!(
            "screen origin ({}, {}) is negative",
            screen.x, screen.y
        )));
    }
    if screen.x + screen.width > size.width || screen.y + screen.height > size.height {
        return Err(geometry_error(format!(
            "screen {}x{} at ({}, {}) exceeds frame {}x{}",
            screen.width, screen.height, screen.x, screen.y, size.width, size.height
        )));
    }

    let to_u32 = |v: i64| {
        u32::try_from(v).map_err(|_| geometry_error(format!("dimension {} is out of range", v)))
    };

    let mask_image_path = wire
        .template
        .mask
        .filter(|m| !m.is_empty())
        .or_else(|| sibling_mask_path(&wire.frame_png));

    Ok(CatalogEntry {
        category: category.to_string(),
        device: device.to_string(),
        screen_rect: ScreenRect {
            x: to_u32(screen.x)?,
            y: to_u32(screen.y)?,
            width: to_u32(screen.width)?,
            height: to_u32(screen.height)?,
        },
        frame_size: FrameSize {
            width: to_u32(size.width)?,
            height: to_u32(size.height)?,
        },
        frame_image_path: wire.frame_png,
        mask_image_path,
        variation,
    })
}

/// `/a/b/frame.png` → `/a/b/mask.png`.
fn sibling_mask_path(frame_png: &str) -> Option<String> {
    frame_png
        .strip_suffix("frame.png")
        .map(|dir| format!("{}mask.png", dir))
}
