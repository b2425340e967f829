//! Feature store: the set of features currently on the canvas.
//!
//! Every mutation is mirrored onto the `Canvas` synchronously, so the
//! canvas never shows a feature the store does not hold (and vice versa).

use crate::error::{AnnoError, Result};
use crate::geometry::Geometry;
use crate::id::{AnnotationId, FeatureKey, LocalId, PopupHandle};
use crate::model::VectorFeature;
use crate::overlay::Overlay;
use std::collections::HashMap;
use std::rc::Rc;

/// Rendering side of the map widget.
pub trait Canvas {
    fn add_primitive(&self, feature: &VectorFeature);
    fn remove_primitive(&self, feature: &VectorFeature);
    fn redraw(&self, feature: &VectorFeature);
    fn add_overlay(&self, overlay: &Overlay);
    /// Replace the content of an overlay already on screen.
    fn update_overlay(&self, overlay: &Overlay);
    fn remove_overlay(&self, handle: PopupHandle);
}

pub struct FeatureStore {
    features: HashMap<FeatureKey, VectorFeature>,
    canvas: Rc<dyn Canvas>,
}

impl FeatureStore {
    pub fn new(canvas: Rc<dyn Canvas>) -> Self {
        Self {
            features: HashMap::new(),
            canvas,
        }
    }

    /// Insert a feature, replacing any feature under the same key.
    pub fn upsert(&mut self, feature: VectorFeature) -> FeatureKey {
        let key = feature.key();
        if let Some(old) = self.features.remove(&key) {
            self.release(&old);
        }
        self.canvas.add_primitive(&feature);
        log::trace!("store: upsert {key}");
        self.features.insert(key, feature);
        key
    }

    /// Swap a provisional feature for its persisted replacement. The
    /// provisional one is gone before the replacement is added.
    pub fn replace_provisional(&mut self, local: LocalId, feature: VectorFeature) -> FeatureKey {
        self.remove_key(FeatureKey::Local(local));
        self.upsert(feature)
    }

    /// Remove the feature of an annotation. No-op when absent.
    pub fn remove(&mut self, id: AnnotationId) -> Option<VectorFeature> {
        self.remove_key(FeatureKey::Annotation(id))
    }

    pub fn remove_key(&mut self, key: FeatureKey) -> Option<VectorFeature> {
        let feature = self.features.remove(&key)?;
        self.release(&feature);
        log::trace!("store: removed {key}");
        Some(feature)
    }

    pub fn get(&self, id: AnnotationId) -> Result<&VectorFeature> {
        let key = FeatureKey::Annotation(id);
        self.features.get(&key).ok_or(AnnoError::NotFound(key))
    }

    pub fn get_key(&self, key: FeatureKey) -> Option<&VectorFeature> {
        self.features.get(&key)
    }

    pub fn contains(&self, key: FeatureKey) -> bool {
        self.features.contains_key(&key)
    }

    /// Drop every measurement feature. Returns how many were removed.
    pub fn clear_measure_only(&mut self) -> usize {
        let keys: Vec<FeatureKey> = self
            .features
            .iter()
            .filter(|(_, f)| f.attributes.measure_only)
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            self.remove_key(*key);
        }
        keys.len()
    }

    /// Record the popup opened for a feature.
    pub fn attach_popup(&mut self, key: FeatureKey, handle: PopupHandle) -> Result<()> {
        let feature = self.features.get_mut(&key).ok_or(AnnoError::NotFound(key))?;
        feature.attributes.popup = Some(handle);
        Ok(())
    }

    /// Close and forget the popup of a feature, if any.
    pub fn detach_popup(&mut self, key: FeatureKey) -> Option<PopupHandle> {
        let handle = self.features.get_mut(&key)?.attributes.popup.take()?;
        self.canvas.remove_overlay(handle);
        Some(handle)
    }

    pub fn popup_of(&self, key: FeatureKey) -> Option<PopupHandle> {
        self.features.get(&key)?.attributes.popup
    }

    /// Mirror a geometry the canvas already shows (after a reshape).
    pub fn set_geometry(&mut self, key: FeatureKey, geometry: Geometry) -> Result<()> {
        let feature = self.features.get_mut(&key).ok_or(AnnoError::NotFound(key))?;
        feature.geometry = geometry;
        Ok(())
    }

    pub fn set_hidden(&mut self, key: FeatureKey, hidden: bool) -> Result<()> {
        let feature = self.features.get_mut(&key).ok_or(AnnoError::NotFound(key))?;
        feature.style.hidden = hidden;
        self.canvas.redraw(feature);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VectorFeature> {
        self.features.values()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn release(&self, feature: &VectorFeature) {
        if let Some(handle) = feature.attributes.popup {
            self.canvas.remove_overlay(handle);
        }
        self.canvas.remove_primitive(feature);
    }
}
