//! Mutable state shared by the layer's components.
//!
//! Everything runs on one thread, so the state lives in an
//! `Rc<RefCell<_>>`. Borrows are short and never held across an `.await`.

use crate::remote::{AnnotationStore, RetrievalService};
use crate::tools::ModeController;
use crate::views::{BrowseView, GestureControls, Notifier, OntologyTree};
use anno_core::{AnnoError, Canvas, FeatureKey, FeatureStore, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Every collaborator a layer talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Rc<dyn AnnotationStore>,
    pub retrieval: Rc<dyn RetrievalService>,
    pub ontology: Rc<dyn OntologyTree>,
    pub notifier: Rc<dyn Notifier>,
    pub browse: Rc<dyn BrowseView>,
    pub controls: Rc<dyn GestureControls>,
    pub canvas: Rc<dyn Canvas>,
}

pub type SharedState = Rc<RefCell<LayerState>>;

pub struct LayerState {
    pub features: FeatureStore,
    pub modes: ModeController,
    selection: Vec<FeatureKey>,
    /// Features with a create or update awaiting the store.
    in_flight: HashSet<FeatureKey>,
}

impl LayerState {
    pub fn new(features: FeatureStore, modes: ModeController) -> Self {
        Self {
            features,
            modes,
            selection: Vec::new(),
            in_flight: HashSet::new(),
        }
    }

    pub fn shared(self) -> SharedState {
        Rc::new(RefCell::new(self))
    }

    pub fn selection(&self) -> &[FeatureKey] {
        &self.selection
    }

    pub fn select(&mut self, key: FeatureKey) {
        if !self.selection.contains(&key) {
            self.selection.push(key);
        }
    }

    pub fn deselect(&mut self, key: FeatureKey) {
        self.selection.retain(|k| *k != key);
    }

    /// Deselect `key` and close its popup; a measurement goes along with
    /// its popup. True unless the feature was a measurement, that is when
    /// the ontology tree may be showing it.
    pub fn release(&mut self, key: FeatureKey) -> bool {
        self.deselect(key);
        let measure_only = self
            .features
            .get_key(key)
            .is_some_and(|f| f.attributes.measure_only);
        if measure_only {
            self.features.remove_key(key);
        } else if let Some(handle) = self.features.detach_popup(key) {
            log::trace!("popup: closed {handle:?} of {key}");
        }
        !measure_only
    }

    pub fn is_saving(&self, key: FeatureKey) -> bool {
        self.in_flight.contains(&key)
    }

    /// Drop selection entries whose feature left the store.
    pub fn prune_selection(&mut self) {
        let features = &self.features;
        self.selection.retain(|k| features.contains(*k));
    }
}

/// Deselect everything, as a click on empty canvas would. The widget
/// does not report these deselections back, so each selected feature is
/// released here.
pub fn unselect_all(state: &SharedState, services: &Services) {
    let showed_annotation = {
        let mut state = state.borrow_mut();
        let keys = std::mem::take(&mut state.selection);
        keys.into_iter().fold(false, |any, key| state.release(key) | any)
    };
    services.controls.unselect_all();
    if showed_annotation {
        services.ontology.clear();
        services.ontology.clear_annotation();
    }
}

/// Marks a feature as having a save in flight until dropped.
pub struct InFlight {
    state: SharedState,
    key: FeatureKey,
}

impl InFlight {
    /// Claim `key`, failing with `Busy` when another save holds it.
    pub fn claim(state: &SharedState, key: FeatureKey) -> Result<Self> {
        if !state.borrow_mut().in_flight.insert(key) {
            log::warn!("sync: {key} already has a save in flight");
            return Err(AnnoError::Busy(key));
        }
        Ok(Self {
            state: state.clone(),
            key,
        })
    }

    pub fn key(&self) -> FeatureKey {
        self.key
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.borrow_mut().in_flight.remove(&self.key);
    }
}
