//! The annotation layer: one image, one owner, one feature store.
//!
//! `AnnotationLayer` is the entry point the surrounding application talks
//! to. It routes gestures, mode switches and push notifications to the
//! sync engine and the popup presenter, and carries out the effects the
//! mode controller asks for.

use crate::config::LayerConfig;
use crate::context::LayerContext;
use crate::input::GestureEvent;
use crate::popup::PopupPresenter;
use crate::state::{LayerState, Services, SharedState, unselect_all};
use crate::suggest::SuggestionEngine;
use crate::sync::SyncEngine;
use crate::tools::{InteractionMode, ModeController, ModeEffect, ToolOptions};
use anno_core::{
    AnnotationId, FeatureKey, FeatureStore, Geometry, ImageId, PopupHandle, Result, TermId,
    VectorFeature,
};
use futures::future::LocalBoxFuture;
use std::cell::Ref;
use std::rc::Rc;

pub struct AnnotationLayer {
    state: SharedState,
    services: Services,
    config: Rc<LayerConfig>,
    context: Rc<LayerContext>,
    sync: SyncEngine,
    suggestions: SuggestionEngine,
    popups: PopupPresenter,
}

impl AnnotationLayer {
    pub fn new(config: LayerConfig, context: LayerContext, services: Services) -> Self {
        let config = Rc::new(config);
        let context = Rc::new(context);
        let state = LayerState::new(
            FeatureStore::new(services.canvas.clone()),
            ModeController::new(config.regular_sides),
        )
        .shared();
        let sync = SyncEngine::new(
            state.clone(),
            services.clone(),
            config.clone(),
            context.clone(),
        );
        let suggestions = SuggestionEngine::new(services.clone(), context.clone());
        let popups = PopupPresenter::new(
            state.clone(),
            services.clone(),
            suggestions.clone(),
            config.clone(),
            context.clone(),
        );
        services.controls.set_select_style(&config.select_style());
        log::info!(
            "layer {}: image {} of user {}",
            config.name,
            context.image.id,
            context.owner
        );
        Self {
            state,
            services,
            config,
            context,
            sync,
            suggestions,
            popups,
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn context(&self) -> &LayerContext {
        &self.context
    }

    /// Read access to the features on the canvas.
    pub fn features(&self) -> Ref<'_, FeatureStore> {
        Ref::map(self.state.borrow(), |s| &s.features)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.state
            .borrow()
            .features
            .contains(FeatureKey::Annotation(id))
    }

    pub fn mode(&self) -> InteractionMode {
        self.state.borrow().modes.mode()
    }

    pub fn selection(&self) -> Vec<FeatureKey> {
        self.state.borrow().selection().to_vec()
    }

    /// Current settings of the draw and modify handlers.
    pub fn tool_options(&self) -> ToolOptions {
        self.state.borrow().modes.flags().options()
    }

    pub fn popup_of(&self, key: FeatureKey) -> Option<PopupHandle> {
        self.state.borrow().features.popup_of(key)
    }

    /// Initial load of the owner's annotations on the image.
    pub async fn load_annotations(&self) -> Result<usize> {
        let loaded = self.sync.load_annotations().await?;
        // The layer starts idle: select armed, every other handler off.
        let effects = self.state.borrow_mut().modes.switch(InteractionMode::Idle);
        self.apply(effects);
        Ok(loaded)
    }

    // ─── Modes ───────────────────────────────────────────────────────────

    pub fn switch_mode(&self, mode: InteractionMode) {
        let effects = self.state.borrow_mut().modes.switch(mode);
        self.apply(effects);
    }

    pub fn toggle_edit(&self) {
        self.with_modes(ModeController::toggle_edit);
    }

    pub fn toggle_rotate(&self) {
        self.with_modes(ModeController::toggle_rotate);
    }

    pub fn toggle_resize(&self) {
        self.with_modes(ModeController::toggle_resize);
    }

    pub fn toggle_drag(&self) {
        self.with_modes(ModeController::toggle_drag);
    }

    pub fn toggle_irregular(&self) {
        self.with_modes(ModeController::toggle_irregular);
    }

    pub fn toggle_aspect_ratio(&self) {
        self.with_modes(ModeController::toggle_aspect_ratio);
    }

    pub fn set_sides(&self, sides: u32) {
        self.with_modes(|modes| modes.set_sides(sides));
    }

    fn with_modes(&self, f: impl FnOnce(&mut ModeController) -> Vec<ModeEffect>) {
        let effects = f(&mut self.state.borrow_mut().modes);
        self.apply(effects);
    }

    fn apply(&self, effects: Vec<ModeEffect>) {
        let controls = &self.services.controls;
        for effect in effects {
            match effect {
                ModeEffect::ClearMeasurements => {
                    let mut state = self.state.borrow_mut();
                    let removed = state.features.clear_measure_only();
                    state.prune_selection();
                    if removed > 0 {
                        log::debug!("layer: cleared {removed} measurement(s)");
                    }
                }
                ModeEffect::Disarm(tool) => controls.disarm(tool),
                ModeEffect::Arm(tool) => controls.arm(tool),
                ModeEffect::Configure(options) => controls.configure(&options),
                ModeEffect::EditSelection(mask) => {
                    for key in self.selection() {
                        controls.edit(key, mask);
                    }
                }
                ModeEffect::ReleaseSelection => {
                    for key in self.selection() {
                        controls.release(key);
                    }
                }
            }
        }
    }

    // ─── Gestures ────────────────────────────────────────────────────────

    /// Handle a gesture reported by the map widget. Failures have already
    /// been shown to the user when this returns them.
    pub async fn handle_gesture(&self, event: GestureEvent) -> Result<()> {
        log::trace!("layer: {event:?}");
        match event {
            GestureEvent::DrawComplete { geometry } => self.drawn(geometry).await,
            GestureEvent::Select { feature } => {
                self.state.borrow_mut().select(feature);
                self.selected(feature).await
            }
            GestureEvent::Deselect { feature } => {
                self.deselected(feature);
                Ok(())
            }
            GestureEvent::ModifyComplete { feature, geometry } => {
                self.sync.update(feature, geometry).await
            }
        }
    }

    /// A shape the user just drew. Measurements suppress persistence and
    /// only get a measure popup.
    async fn drawn(&self, geometry: Geometry) -> Result<()> {
        let style = self.config.draw_style();
        let feature = if self.state.borrow().modes.is_measuring() {
            VectorFeature::measurement(geometry, style)
        } else {
            VectorFeature::provisional(geometry, style)
        };
        if !feature.attributes.suppress_persist {
            let key = self.sync.create(feature).await?;
            return self.selected(key).await;
        }
        let key = self.state.borrow_mut().features.upsert(feature);
        self.select_only(key);
        self.popups.open(key).await?;
        Ok(())
    }

    /// Select handling: delete under erase, otherwise show the feature's
    /// terms and popup.
    async fn selected(&self, key: FeatureKey) -> Result<()> {
        if self.state.borrow().modes.erases_on_select() {
            return self.delete_feature(key)?.await;
        }
        if let Some(id) = key.annotation_id() {
            self.services.ontology.refresh(id);
        }
        self.popups.open(key).await?;
        Ok(())
    }

    fn deselected(&self, key: FeatureKey) {
        if self.popups.close(key) {
            self.services.ontology.clear();
            self.services.ontology.clear_annotation();
        }
    }

    /// Make `key` the only selected feature, on the layer's own behalf.
    fn select_only(&self, key: FeatureKey) {
        unselect_all(&self.state, &self.services);
        self.state.borrow_mut().select(key);
        self.services.controls.select(key);
    }

    /// Select a feature programmatically and run the select handling.
    pub async fn select_feature(&self, key: FeatureKey) -> Result<()> {
        self.select_only(key);
        self.selected(key).await
    }

    /// Remove a feature now; the returned future deletes it remotely.
    pub fn delete_feature(&self, key: FeatureKey) -> Result<LocalBoxFuture<'static, Result<()>>> {
        self.sync.delete(key)
    }

    // ─── Popups ──────────────────────────────────────────────────────────

    pub fn hide_feature(&self, id: AnnotationId) -> Result<()> {
        self.popups.hide(id)
    }

    pub fn show_feature(&self, id: AnnotationId) -> Result<()> {
        self.popups.show(id)
    }

    /// The user picked a suggested term in a popup.
    pub async fn accept_suggestion(&self, annotation: AnnotationId, term: TermId) -> Result<()> {
        self.suggestions.accept(annotation, term).await
    }

    // ─── Push notifications ──────────────────────────────────────────────

    /// An annotation was created elsewhere: show and select it. Erase is
    /// held off while the layer selects on its own behalf.
    pub async fn annotation_added(&self, id: AnnotationId) -> Result<()> {
        let saved = self.state.borrow_mut().modes.suspend_erase();
        let result = self.show_added(id).await;
        self.state.borrow_mut().modes.restore_erase(saved);
        if let Err(e) = &result {
            log::error!("layer: annotation {id} pushed but not shown: {e}");
        }
        self.services.browse.refresh_annotation_listings();
        result
    }

    async fn show_added(&self, id: AnnotationId) -> Result<()> {
        let key = self.sync.pull(id).await?;
        self.select_feature(key).await
    }

    pub fn annotation_removed(&self, id: AnnotationId) {
        if self.sync.drop_remote(id) {
            log::debug!("layer: annotation {id} removed remotely");
            self.services.ontology.clear_annotation();
            self.services.ontology.clear();
        }
        self.services.browse.refresh_annotation_listings();
    }

    /// Always a full re-fetch.
    pub async fn annotation_updated(&self, id: AnnotationId, image: ImageId) -> Result<()> {
        self.annotation_removed(id);
        if image != self.context.image.id {
            log::debug!("layer: annotation {id} moved to image {image}");
            return Ok(());
        }
        self.annotation_added(id).await
    }

    pub fn term_added(&self, term: TermId) {
        self.services.ontology.check(term);
    }

    pub fn term_removed(&self, term: TermId) {
        self.services.ontology.uncheck(term);
    }
}
