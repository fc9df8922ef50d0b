//! Browsable listing of every frame in the catalog.
//!
//! Flattens the nested catalog into rows with absolute asset URLs, groups
//! them per device and supports filtering by category and a search term.

use crate::catalog::{Catalog, FrameSize, ScreenRect};
use crate::service::{frame_image_url, mask_image_url};
use serde::Serialize;
use url::Url;

/// Display labels for well-known category keys.
pub const CATEGORY_LABELS: &[(&str, &str)] = &[
    ("android-phone", "Android Phones"),
    ("android-tablet", "Android Tablets"),
    ("iOS", "iPhones"),
    ("iPad", "iPads"),
];

/// Human-readable name for a category key; unknown keys are returned as-is.
pub fn category_label(key: &str) -> &str {
    CATEGORY_LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| *label)
        .unwrap_or(key)
}

/// One frame variant with everything needed to download it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameListing {
    /// Category key with dashes shown as spaces, e.g. `android phone`.
    pub category: String,
    pub device: String,
    pub variant: String,
    pub frame_url: String,
    pub mask_url: Option<String>,
    pub screen: ScreenRect,
    pub frame_size: FrameSize,
}

/// All variants of one device.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceGroup {
    pub category: String,
    pub device: String,
    pub variants: Vec<FrameListing>,
}

/// Filter applied by [`device_groups`].
#[derive(Clone, Debug, Default)]
pub struct GalleryFilter {
    /// Display category (as in [`FrameListing::category`]); `None` matches all.
    pub category: Option<String>,
    /// Case-insensitive substring of the device or any variant name.
    pub search: String,
}

/// Flattens `catalog` into one row per entry, in catalog order.
///
/// Entries whose asset paths cannot form a URL are skipped with a warning.
pub fn frame_listings(catalog: &Catalog, base: &Url) -> Vec<FrameListing> {
    catalog
        .entries()
        .filter_map(|entry| {
            let frame_url = match frame_image_url(base, entry) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::warn!(device = %entry.device, variation = %entry.variation, error = %e, "skipping frame with bad path");
                    return None;
                }
            };
            let mask_url = mask_image_url(base, entry)
                .and_then(|r| r.ok())
                .map(|u| u.to_string());
            Some(FrameListing {
                category: entry.category.replace('-', " "),
                device: entry.device.clone(),
                variant: entry.variation.clone(),
                frame_url,
                mask_url,
                screen: entry.screen_rect,
                frame_size: entry.frame_size,
            })
        })
        .collect()
}

/// Distinct display categories, sorted.
pub fn gallery_categories(listings: &[FrameListing]) -> Vec<String> {
    let mut categories: Vec<String> = listings.iter().map(|l| l.category.clone()).collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Groups listings per (category, device), applies `filter`, and sorts by
/// device name ignoring case.
pub fn device_groups(listings: &[FrameListing], filter: &GalleryFilter) -> Vec<DeviceGroup> {
    let mut groups: Vec<DeviceGroup> = Vec::new();
    for listing in listings {
        match groups
            .iter_mut()
            .find(|g| g.category == listing.category && g.device == listing.device)
        {
            Some(group) => group.variants.push(listing.clone()),
            None => groups.push(DeviceGroup {
                category: listing.category.clone(),
                device: listing.device.clone(),
                variants: vec![listing.clone()],
            }),
        }
    }

    let needle = filter.search.trim().to_lowercase();
    groups.retain(|group| {
        let category_ok = filter
            .category
            .as_ref()
            .is_none_or(|c| *c == group.category);
        let search_ok = needle.is_empty()
            || group.device.to_lowercase().contains(&needle)
            || group
                .variants
                .iter()
                .any(|v| v.variant.to_lowercase().contains(&needle));
        category_ok && search_ok
    });
    groups.sort_by_key(|g| g.device.to_lowercase());
    groups
}
