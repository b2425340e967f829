//! Sync engine: local features ↔ remote annotation store.
//!
//! - **Create** runs as a pipeline of named steps inside a transaction
//!   scope: `ShellCreated → TermsAttached → Reconciled`. Any step failing
//!   short-circuits to one error handler; the scope is closed either way.
//! - **Update** re-fetches the annotation before saving so its terms are
//!   never overwritten with stale ones.
//! - **Delete** is optimistic: the feature leaves the store before any
//!   request is sent, and is not restored if the store refuses.
//!
//! A feature with a create or update in flight rejects further local
//! saves with `AnnoError::Busy`. Push notifications are never rejected.

use crate::config::LayerConfig;
use crate::context::LayerContext;
use crate::remote::TransactionId;
use crate::state::{InFlight, Services, SharedState, unselect_all};
use anno_core::{
    AnnoError, Annotation, AnnotationDraft, AnnotationId, AnnotationTerm, FeatureKey, Geometry,
    LocalId, Result, TermId, VectorFeature, emit_wkt,
};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::rc::Rc;

const TITLE: &str = "Annotation";

/// Progress of one create, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    ShellCreated(AnnotationId),
    TermsAttached { attached: usize, failed: usize },
    Reconciled(FeatureKey),
}

impl fmt::Display for CreateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateStep::ShellCreated(id) => write!(f, "shell created as annotation {id}"),
            CreateStep::TermsAttached { attached, failed } => {
                write!(f, "{attached} term(s) attached, {failed} failed")
            }
            CreateStep::Reconciled(key) => write!(f, "reconciled as {key}"),
        }
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    state: SharedState,
    services: Services,
    config: Rc<LayerConfig>,
    context: Rc<LayerContext>,
}

impl SyncEngine {
    pub fn new(
        state: SharedState,
        services: Services,
        config: Rc<LayerConfig>,
        context: Rc<LayerContext>,
    ) -> Self {
        Self {
            state,
            services,
            config,
            context,
        }
    }

    /// Feature for a persisted annotation, styled from its terms.
    pub fn feature_for(&self, annotation: &Annotation) -> Result<VectorFeature> {
        let geometry = annotation.geometry()?;
        let style = self.config.annotation_style(annotation, &self.context.terms);
        Ok(VectorFeature::authoritative(annotation.id, geometry, style))
    }

    // ─── Load ────────────────────────────────────────────────────────────

    /// Fetch every annotation of the layer's owner on the current image.
    /// Annotations with unreadable geometry are skipped.
    pub async fn load_annotations(&self) -> Result<usize> {
        let owner = self.context.owner;
        let image = self.context.image.id;
        let annotations = match self.services.store.list_annotations(owner, image).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("sync: listing annotations of user {owner} on image {image}: {e}");
                self.services.notifier.message(TITLE, &e.user_message());
                return Err(e);
            }
        };

        let mut loaded = 0;
        for annotation in &annotations {
            match self.feature_for(annotation) {
                Ok(feature) => {
                    self.state.borrow_mut().features.upsert(feature);
                    loaded += 1;
                }
                Err(e) => log::warn!("sync: skipping annotation {}: {e}", annotation.id),
            }
        }
        log::info!(
            "sync: loaded {loaded}/{} annotation(s) of user {owner} on image {image}",
            annotations.len()
        );
        self.services.browse.layer_loaded();
        Ok(loaded)
    }

    // ─── Create ──────────────────────────────────────────────────────────

    /// Persist a freshly drawn feature. The provisional feature is shown
    /// at once; on success it is replaced by the authoritative one, which
    /// ends up selected. Returns the key of the authoritative feature.
    pub async fn create(&self, draft: VectorFeature) -> Result<FeatureKey> {
        let local = draft.local_id;
        let location = match draft.to_wkt() {
            Ok(wkt) => wkt,
            Err(e) => {
                self.services.notifier.message(TITLE, &e.user_message());
                return Err(e);
            }
        };
        let key = self.state.borrow_mut().features.upsert(draft);
        let _guard = InFlight::claim(&self.state, key)?;

        let transaction = match self.services.store.begin_transaction().await {
            Ok(tx) => tx,
            Err(e) => {
                log::error!("sync: cannot open transaction for {key}: {e}");
                self.abandon(local, &e);
                return Err(e);
            }
        };
        log::debug!("sync: {key} in transaction {transaction:?}");

        let outcome = self.run_create(local, location, transaction).await;
        self.close(transaction).await;
        match outcome {
            Ok(key) => {
                self.services.browse.refresh_annotation_listings();
                Ok(key)
            }
            Err((shell, e)) => {
                if shell.is_some() {
                    // The annotation exists remotely even though the local
                    // copy could not be reconciled.
                    self.services.browse.refresh_annotation_listings();
                }
                self.abandon(local, &e);
                Err(e)
            }
        }
    }

    async fn run_create(
        &self,
        local: LocalId,
        location: String,
        transaction: TransactionId,
    ) -> std::result::Result<FeatureKey, (Option<AnnotationId>, AnnoError)> {
        let draft = AnnotationDraft {
            name: String::new(),
            location,
            image: self.context.image.id,
        };
        let created = self
            .services
            .store
            .create_annotation(&draft)
            .await
            .map_err(|e| (None, e))?;
        let id = created.annotation;
        self.step(local, CreateStep::ShellCreated(id));
        self.services.notifier.message(TITLE, &created.message);

        let terms = self.services.ontology.checked_terms();
        let step = self.attach_terms(id, &terms).await;
        self.step(local, step);

        let key = self
            .reconcile(local, id)
            .await
            .map_err(|e| (Some(id), e))?;
        self.step(local, CreateStep::Reconciled(key));
        log::trace!("sync: annotation {id} done within {transaction:?}");
        Ok(key)
    }

    /// Attach every checked term concurrently. Completions are tallied as
    /// they arrive, in whatever order; failures count toward the tally.
    async fn attach_terms(&self, id: AnnotationId, terms: &[TermId]) -> CreateStep {
        let total = terms.len();
        let mut pending: FuturesUnordered<_> = terms
            .iter()
            .map(|term| {
                let link = AnnotationTerm::new(id, *term);
                let store = self.services.store.clone();
                async move { (link.term, store.add_annotation_term(&link).await) }
            })
            .collect();

        let mut completed = 0;
        let mut failed = 0;
        while let Some((term, result)) = pending.next().await {
            completed += 1;
            if let Err(e) = result {
                failed += 1;
                log::warn!("sync: term {term} not attached to annotation {id}: {e}");
                self.services.notifier.message(TITLE, &e.user_message());
            }
            log::trace!("sync: annotation {id} terms {completed}/{total}");
        }
        debug_assert_eq!(completed, total);
        CreateStep::TermsAttached {
            attached: completed - failed,
            failed,
        }
    }

    /// Re-fetch the annotation with its terms and swap the provisional
    /// feature for it. The new feature becomes the only selection.
    async fn reconcile(&self, local: LocalId, id: AnnotationId) -> Result<FeatureKey> {
        let annotation = self.services.store.fetch_annotation(id).await?;
        let feature = self.feature_for(&annotation)?;

        unselect_all(&self.state, &self.services);
        let key = {
            let mut state = self.state.borrow_mut();
            let key = state.features.replace_provisional(local, feature);
            state.select(key);
            key
        };
        self.services.controls.select(key);
        Ok(key)
    }

    fn step(&self, local: LocalId, step: CreateStep) {
        log::debug!("sync: create {local}: {step}");
    }

    /// Drop a provisional feature whose create failed and tell the user.
    fn abandon(&self, local: LocalId, error: &AnnoError) {
        {
            let mut state = self.state.borrow_mut();
            state.features.remove_key(FeatureKey::Local(local));
            state.deselect(FeatureKey::Local(local));
        }
        self.services.notifier.message(TITLE, &error.user_message());
    }

    async fn close(&self, transaction: TransactionId) {
        if let Err(e) = self.services.store.end_transaction(transaction).await {
            log::error!("sync: closing transaction {transaction:?}: {e}");
            self.services.notifier.message(TITLE, &e.user_message());
        }
    }

    // ─── Update ──────────────────────────────────────────────────────────

    /// Save the geometry a modify gesture left on the canvas.
    pub async fn update(&self, key: FeatureKey, geometry: Geometry) -> Result<()> {
        let result = self.try_update(key, geometry).await;
        if let Err(e) = &result {
            log::error!("sync: update of {key} failed: {e}");
            self.services.notifier.message(TITLE, &e.user_message());
        }
        result
    }

    async fn try_update(&self, key: FeatureKey, geometry: Geometry) -> Result<()> {
        let _guard = InFlight::claim(&self.state, key)?;
        let id = key.annotation_id().ok_or(AnnoError::NotFound(key))?;
        let location = emit_wkt(&geometry)?;
        self.state.borrow_mut().features.set_geometry(key, geometry)?;

        let mut annotation = self.services.store.fetch_annotation(id).await?;
        annotation.location = location;
        let ack = self.services.store.update_annotation(&annotation).await?;
        log::info!("sync: annotation {id} geometry saved");
        self.services.notifier.message(TITLE, &ack.message);
        Ok(())
    }

    // ─── Delete ──────────────────────────────────────────────────────────

    /// Remove a feature now and return the future that deletes it
    /// remotely. The local removal is done by the time this returns.
    pub fn delete(&self, key: FeatureKey) -> Result<LocalBoxFuture<'static, Result<()>>> {
        if self.state.borrow().is_saving(key) {
            let e = AnnoError::Busy(key);
            self.services.notifier.message(TITLE, &e.user_message());
            return Err(e);
        }

        let checked = self.services.ontology.checked_terms();
        log::debug!("sync: deleting {key}, {} term(s) checked", checked.len());
        {
            let mut state = self.state.borrow_mut();
            if state.features.remove_key(key).is_none() {
                return Err(AnnoError::NotFound(key));
            }
            state.deselect(key);
        }
        self.services.ontology.clear_annotation();
        self.services.ontology.clear();
        unselect_all(&self.state, &self.services);

        let Some(id) = key.annotation_id() else {
            return Ok(futures::future::ready(Ok(())).boxed_local());
        };
        let services = self.services.clone();
        Ok(async move {
            match delete_remote(&services, id).await {
                Ok(message) => {
                    services.notifier.message(TITLE, &message);
                    services.browse.refresh_annotation_listings();
                    Ok(())
                }
                Err(e) => {
                    log::error!("sync: annotation {id} not deleted: {e}");
                    services.notifier.message(TITLE, &e.user_message());
                    Err(e)
                }
            }
        }
        .boxed_local())
    }

    // ─── Push reconciliation ─────────────────────────────────────────────

    /// Fetch an annotation created elsewhere and show it.
    pub async fn pull(&self, id: AnnotationId) -> Result<FeatureKey> {
        let annotation = self.services.store.fetch_annotation(id).await?;
        let feature = self.feature_for(&annotation)?;
        Ok(self.state.borrow_mut().features.upsert(feature))
    }

    /// Forget an annotation deleted elsewhere. No-op when absent.
    pub fn drop_remote(&self, id: AnnotationId) -> bool {
        let mut state = self.state.borrow_mut();
        let removed = state.features.remove(id).is_some();
        state.deselect(FeatureKey::Annotation(id));
        removed
    }
}

async fn delete_remote(services: &Services, id: AnnotationId) -> Result<String> {
    match services.store.annotation_terms(id).await {
        Ok(links) => log::debug!("sync: annotation {id} carried {} term(s)", links.len()),
        Err(e) => log::warn!("sync: terms of annotation {id} unavailable: {e}"),
    }
    let ack = services.store.delete_annotation(id).await?;
    Ok(ack.message)
}
