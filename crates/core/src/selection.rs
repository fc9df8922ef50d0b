//! Cascading device selection.
//!
//! [`SelectionCascade`] keeps a `(category, device, variation)` triple valid
//! against a [`Catalog`]. Changing a level re-derives every level below it and
//! never touches the levels above.
//!
//! Defaults are resolved with one rule everywhere: use the preferred default
//! when it exists at that level, otherwise the first key in catalog order.
//! [`SelectionCascade::reconcile`] applies the preferred defaults only on its
//! first run; afterwards it keeps whatever the user last picked as long as it
//! still resolves.

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::PreferredDefaults;
use crate::error::SelectionInvalidError;
use crate::image_processing::SourceImage;

/// The cascading triple. Empty strings mean "not selected".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub category: String,
    pub device: String,
    pub variation: String,
}

impl Selection {
    pub fn new(
        category: impl Into<String>,
        device: impl Into<String>,
        variation: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            device: device.into(),
            variation: variation.into(),
        }
    }

    /// True when all three levels are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.category.is_empty() && !self.device.is_empty() && !self.variation.is_empty()
    }

    /// Looks the triple up in `catalog`.
    pub fn resolve<'a>(&self, catalog: &'a Catalog) -> Option<&'a CatalogEntry> {
        catalog.entry(&self.category, &self.device, &self.variation)
    }
}

/// Everything the user has chosen for the next frame request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    pub selection: Selection,
    /// Hex color painted behind the framed device; `None` is transparent.
    pub background_color: Option<String>,
    pub source_image: Option<SourceImage>,
}

/// Stateful resolver for [`SelectionState`].
#[derive(Debug)]
pub struct SelectionCascade {
    defaults: PreferredDefaults,
    defaults_applied: bool,
    state: SelectionState,
}

impl SelectionCascade {
    pub fn new(defaults: PreferredDefaults) -> Self {
        Self {
            defaults,
            defaults_applied: false,
            state: SelectionState::default(),
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn defaults(&self) -> &PreferredDefaults {
        &self.defaults
    }

    /// Selects `category` and re-derives device and variation beneath it.
    ///
    /// # Errors
    ///
    /// [`SelectionInvalidError::UnknownCategory`] if the catalog has no such
    /// category; the state is left unchanged.
    pub fn set_category(
        &mut self,
        catalog: &Catalog,
        category: &str,
    ) -> Result<(), SelectionInvalidError> {
        if !catalog.has_category(category) {
            return Err(SelectionInvalidError::UnknownCategory(category.to_string()));
        }

        let device = self.preferred_device(catalog, category);
        let variation = self.preferred_variation(catalog, category, &device);
        self.commit(Selection::new(category, device, variation), "category");
        Ok(())
    }

    /// Selects `device` within the current category and re-derives the variation.
    ///
    /// # Errors
    ///
    /// [`SelectionInvalidError::UnknownDevice`] if the device is not listed
    /// under the current category.
    pub fn set_device(
        &mut self,
        catalog: &Catalog,
        device: &str,
    ) -> Result<(), SelectionInvalidError> {
        let category = self.state.selection.category.clone();
        if !catalog.has_device(&category, device) {
            return Err(SelectionInvalidError::UnknownDevice {
                category,
                device: device.to_string(),
            });
        }

        let variation = self.preferred_variation(catalog, &category, device);
        self.commit(Selection::new(category, device, variation), "device");
        Ok(())
    }

    /// Selects `variation` of the current device. Nothing cascades from here.
    ///
    /// # Errors
    ///
    /// [`SelectionInvalidError::UnknownVariation`] if the current device has
    /// no such variation.
    pub fn set_variation(
        &mut self,
        catalog: &Catalog,
        variation: &str,
    ) -> Result<(), SelectionInvalidError> {
        let current = &self.state.selection;
        if catalog
            .entry(&current.category, &current.device, variation)
            .is_none()
        {
            return Err(SelectionInvalidError::UnknownVariation {
                device: current.device.clone(),
                variation: variation.to_string(),
            });
        }

        let next = Selection::new(current.category.clone(), current.device.clone(), variation);
        self.commit(next, "variation");
        Ok(())
    }

    /// Brings the selection back in line with a newly loaded catalog.
    ///
    /// The first call that sees a non-empty catalog prefers the configured
    /// defaults. Later calls keep each level the user picked while it still
    /// exists and fall back to the first key otherwise. An empty catalog
    /// clears the selection.
    pub fn reconcile(&mut self, catalog: &Catalog) {
        let Some(first_category) = catalog.first_category() else {
            self.commit(Selection::default(), "reconcile");
            return;
        };

        let use_defaults = !self.defaults_applied;
        let current = &self.state.selection;

        let category = if use_defaults && catalog.has_category(&self.defaults.category) {
            self.defaults.category.as_str()
        } else if catalog.has_category(&current.category) {
            current.category.as_str()
        } else {
            first_category
        };

        let device = if use_defaults
            && category == self.defaults.category
            && catalog.has_device(category, &self.defaults.device)
        {
            self.defaults.device.as_str()
        } else if catalog.has_device(category, &current.device) {
            current.device.as_str()
        } else {
            catalog.first_device(category).unwrap_or("")
        };

        let variation = if use_defaults
            && device == self.defaults.device
            && catalog.entry(category, device, &self.defaults.variation).is_some()
        {
            self.defaults.variation.as_str()
        } else if catalog.entry(category, device, &current.variation).is_some() {
            current.variation.as_str()
        } else {
            catalog.first_variation(category, device).unwrap_or("")
        };

        let next = Selection::new(category, device, variation);
        self.defaults_applied = true;
        self.commit(next, "reconcile");
    }

    pub fn set_background_color(&mut self, color: Option<&str>) {
        self.state.background_color = color
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
    }

    pub fn set_source_image(&mut self, image: Option<SourceImage>) {
        self.state.source_image = image;
    }

    /// Drops the source image and background color. The device triple stays.
    pub fn start_over(&mut self) {
        self.state.source_image = None;
        self.state.background_color = None;
    }

    fn preferred_device(&self, catalog: &Catalog, category: &str) -> String {
        if catalog.has_device(category, &self.defaults.device) {
            self.defaults.device.clone()
        } else {
            catalog.first_device(category).unwrap_or("").to_string()
        }
    }

    fn preferred_variation(&self, catalog: &Catalog, category: &str, device: &str) -> String {
        if catalog.entry(category, device, &self.defaults.variation).is_some() {
            self.defaults.variation.clone()
        } else {
            catalog
                .first_variation(category, device)
                .unwrap_or("")
                .to_string()
        }
    }

    fn commit(&mut self, next: Selection, cause: &'static str) {
        if next != self.state.selection {
            tracing::debug!(
                cause,
                category = %next.category,
                device = %next.device,
                variation = %next.variation,
                "selection changed"
            );
        }
        self.state.selection = next;
    }
}
