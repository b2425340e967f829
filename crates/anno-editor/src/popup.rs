//! Popup presenter: decides what a feature's popup shows and where.

use crate::config::LayerConfig;
use crate::context::LayerContext;
use crate::state::{Services, SharedState, unselect_all};
use crate::suggest::SuggestionEngine;
use anno_core::{
    AnnoError, AnnotationDetails, AnnotationId, FeatureKey, Measurement, Overlay, Point,
    PopupContent, PopupHandle, Rect, Result, Size, SuggestionState, TermLabel,
};
use std::rc::Rc;

pub const DETAILS_SIZE: Size = Size::new(300.0, 200.0);
pub const MEASURE_SIZE: Size = Size::new(200.0, 60.0);

pub struct PopupPresenter {
    state: SharedState,
    services: Services,
    suggestions: SuggestionEngine,
    config: Rc<LayerConfig>,
    context: Rc<LayerContext>,
}

impl PopupPresenter {
    pub fn new(
        state: SharedState,
        services: Services,
        suggestions: SuggestionEngine,
        config: Rc<LayerConfig>,
        context: Rc<LayerContext>,
    ) -> Self {
        Self {
            state,
            services,
            suggestions,
            config,
            context,
        }
    }

    /// Open the popup of a selected feature. Opening a feature that
    /// already has one returns the existing handle.
    ///
    /// Annotation popups appear with their details first; the suggestion
    /// section is filled in once retrieval answers.
    pub async fn open(&self, key: FeatureKey) -> Result<Option<PopupHandle>> {
        let (bounds, measure_only) = {
            let state = self.state.borrow();
            let feature = state.features.get_key(key).ok_or(AnnoError::NotFound(key))?;
            if let Some(handle) = feature.attributes.popup {
                log::trace!("popup: {key} already open");
                return Ok(Some(handle));
            }
            (feature.geometry.bounds(), feature.attributes.measure_only)
        };
        if measure_only {
            return self.open_measure(key).map(Some);
        }
        let Some(id) = key.annotation_id() else {
            // Provisional features have nothing to show yet.
            return Ok(None);
        };

        let mut overlay = Overlay {
            handle: PopupHandle::next(),
            anchor: self.anchor(bounds),
            size: DETAILS_SIZE,
            content: PopupContent::Annotation(self.details(id).await?),
        };

        if !self.attach(key, &overlay) {
            return Ok(self.state.borrow().features.popup_of(key));
        }

        let suggestions = self.suggestions.popup_state(id).await;
        if self.state.borrow().features.popup_of(key) != Some(overlay.handle) {
            log::debug!("popup: {key} closed before suggestions arrived");
            return Ok(None);
        }
        if let PopupContent::Annotation(details) = &mut overlay.content {
            details.suggestions = suggestions;
        }
        self.services.canvas.update_overlay(&overlay);
        Ok(Some(overlay.handle))
    }

    /// Popup with the length of a measurement line.
    pub fn open_measure(&self, key: FeatureKey) -> Result<PopupHandle> {
        let (length, bounds) = {
            let state = self.state.borrow();
            let feature = state.features.get_key(key).ok_or(AnnoError::NotFound(key))?;
            if let Some(handle) = feature.attributes.popup {
                return Ok(handle);
            }
            (feature.geometry.length(), feature.geometry.bounds())
        };
        let overlay = Overlay {
            handle: PopupHandle::next(),
            anchor: self.anchor(bounds),
            size: MEASURE_SIZE,
            content: PopupContent::Measure(self.measure(length)),
        };
        self.attach(key, &overlay);
        Ok(overlay.handle)
    }

    /// Close the popup of a deselected feature. Measurement features go
    /// with their popup. True when the ontology tree may be showing it.
    pub fn close(&self, key: FeatureKey) -> bool {
        self.state.borrow_mut().release(key)
    }

    /// Hide a feature from the canvas. Its popup closes and nothing stays
    /// selected.
    pub fn hide(&self, id: AnnotationId) -> Result<()> {
        let key = FeatureKey::Annotation(id);
        {
            let mut state = self.state.borrow_mut();
            state.features.set_hidden(key, true)?;
            state.features.detach_popup(key);
        }
        unselect_all(&self.state, &self.services);
        Ok(())
    }

    pub fn show(&self, id: AnnotationId) -> Result<()> {
        self.state
            .borrow_mut()
            .features
            .set_hidden(FeatureKey::Annotation(id), false)
    }

    /// Length in the image's physical unit when it is calibrated.
    pub fn measure(&self, length: f64) -> Measurement {
        match self.context.image.resolution {
            Some(resolution) => {
                let scale = 10f64.powi(self.config.measure_precision as i32);
                Measurement::Physical {
                    value: (length * resolution * scale).round() / scale,
                    unit: self.config.physical_unit.clone(),
                }
            }
            None => Measurement::Pixels(length),
        }
    }

    fn anchor(&self, bounds: Rect) -> Point {
        Point::new(
            bounds.x1 + self.config.popup_offset,
            bounds.y1 + self.config.popup_offset,
        )
    }

    async fn details(&self, id: AnnotationId) -> Result<AnnotationDetails> {
        let annotation = self.services.store.fetch_annotation(id).await?;
        let owner = self
            .context
            .users
            .require(annotation.user)
            .inspect_err(|e| log::error!("popup: annotation {id}: {e}"))?
            .pretty_name();
        let terms = annotation
            .terms
            .iter()
            .map(|id| -> Result<TermLabel> {
                let term = self.context.terms.require(*id)?;
                Ok(TermLabel {
                    id: term.id,
                    name: term.name.clone(),
                    ontology: self.context.project.ontology,
                })
            })
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| log::error!("popup: annotation {id}: {e}"))?;
        Ok(AnnotationDetails {
            annotation: id,
            owner,
            terms,
            suggestions: SuggestionState::Loading,
            can_hide: true,
        })
    }

    /// Record and show a popup. False when the feature is gone or got a
    /// popup while this one was being built.
    fn attach(&self, key: FeatureKey, overlay: &Overlay) -> bool {
        let mut state = self.state.borrow_mut();
        match state.features.get_key(key) {
            Some(feature) if feature.attributes.popup.is_none() => {}
            _ => return false,
        }
        self.services.canvas.add_overlay(overlay);
        state.features.attach_popup(key, overlay.handle).is_ok()
    }
}
