//! In-memory collaborators.
//!
//! A complete stand-in for the remote store, the retrieval service and the
//! widgets around the layer. Every call is appended to a shared `Journal`,
//! so a session can be replayed and its ordering inspected. Used by the
//! replay tool and the tests.

use crate::remote::{Ack, AnnotationStore, Created, RetrievalService, TransactionId};
use crate::state::Services;
use crate::tools::{EditMask, ToolKind, ToolOptions};
use crate::views::{BrowseView, GestureControls, Notifier, OntologyTree};
use anno_core::{
    AnnoError, Annotation, AnnotationDraft, AnnotationId, AnnotationTerm, Canvas, FeatureKey,
    ImageId, Overlay, PopupHandle, Result, RetrievalHit, Style, TermId, UserId, VectorFeature,
};
use async_trait::async_trait;
use serde::Deserialize;
use smallvec::smallvec;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Ordered record of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        let entry = entry.into();
        log::trace!("journal: {entry}");
        self.entries.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Entries starting with `prefix`.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries.borrow().iter().position(|e| e.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

// ─── Annotation store ────────────────────────────────────────────────────

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    BeginTransaction,
    EndTransaction,
    Create,
    Fetch,
    List,
    Update,
    Delete,
    AddTerm,
    AnnotationTerms,
}

pub struct MemoryStore {
    journal: Journal,
    annotations: RefCell<BTreeMap<AnnotationId, Annotation>>,
    next_annotation: Cell<u64>,
    next_transaction: Cell<u64>,
    open_transactions: RefCell<HashSet<TransactionId>>,
    failing: RefCell<HashMap<StoreOp, String>>,
    /// Scheduler yields before a term link completes, per term.
    term_delays: RefCell<HashMap<TermId, usize>>,
    /// Scheduler yields before fetch, update or delete answer.
    op_delays: RefCell<HashMap<StoreOp, usize>>,
    /// User recorded on annotations created through this store.
    author: UserId,
}

impl MemoryStore {
    pub fn new(journal: Journal, author: UserId) -> Self {
        Self {
            journal,
            annotations: RefCell::new(BTreeMap::new()),
            next_annotation: Cell::new(100),
            next_transaction: Cell::new(1),
            open_transactions: RefCell::new(HashSet::new()),
            failing: RefCell::new(HashMap::new()),
            term_delays: RefCell::new(HashMap::new()),
            op_delays: RefCell::new(HashMap::new()),
            author,
        }
    }

    /// Next created annotation gets `id`, later ones count up from it.
    pub fn set_next_id(&self, id: u64) {
        self.next_annotation.set(id);
    }

    pub fn insert(&self, annotation: Annotation) {
        self.annotations.borrow_mut().insert(annotation.id, annotation);
    }

    pub fn get(&self, id: AnnotationId) -> Option<Annotation> {
        self.annotations.borrow().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.annotations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.borrow().is_empty()
    }

    pub fn fail(&self, op: StoreOp, message: impl Into<String>) {
        self.failing.borrow_mut().insert(op, message.into());
    }

    pub fn recover(&self, op: StoreOp) {
        self.failing.borrow_mut().remove(&op);
    }

    /// Make the link of `term` complete only after `yields` turns of the
    /// scheduler.
    pub fn delay_term(&self, term: TermId, yields: usize) {
        self.term_delays.borrow_mut().insert(term, yields);
    }

    /// Make `op` answer only after `yields` turns of the scheduler.
    pub fn delay(&self, op: StoreOp, yields: usize) {
        self.op_delays.borrow_mut().insert(op, yields);
    }

    pub fn open_transactions(&self) -> usize {
        self.open_transactions.borrow().len()
    }

    async fn pause(&self, op: StoreOp) {
        let yields = self.op_delays.borrow().get(&op).copied().unwrap_or(0);
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        match self.failing.borrow().get(&op) {
            Some(message) => Err(AnnoError::remote(message.clone())),
            None => Ok(()),
        }
    }

    fn existing(&self, id: AnnotationId) -> Result<Annotation> {
        self.get(id).ok_or(AnnoError::AnnotationNotFound(id))
    }
}

#[async_trait(?Send)]
impl AnnotationStore for MemoryStore {
    async fn begin_transaction(&self) -> Result<TransactionId> {
        self.check(StoreOp::BeginTransaction)?;
        let tx = TransactionId(self.next_transaction.get());
        self.next_transaction.set(tx.0 + 1);
        self.open_transactions.borrow_mut().insert(tx);
        self.journal.record(format!("store.begin {}", tx.0));
        Ok(tx)
    }

    async fn end_transaction(&self, transaction: TransactionId) -> Result<()> {
        self.journal.record(format!("store.end {}", transaction.0));
        self.check(StoreOp::EndTransaction)?;
        if !self.open_transactions.borrow_mut().remove(&transaction) {
            return Err(AnnoError::remote(format!(
                "transaction {} is not open",
                transaction.0
            )));
        }
        Ok(())
    }

    async fn create_annotation(&self, draft: &AnnotationDraft) -> Result<Created> {
        self.journal
            .record(format!("store.create image={} {}", draft.image, draft.location));
        self.check(StoreOp::Create)?;
        let id = AnnotationId(self.next_annotation.get());
        self.next_annotation.set(id.get() + 1);
        self.insert(Annotation {
            id,
            image: draft.image,
            user: self.author,
            location: draft.location.clone(),
            terms: smallvec![],
        });
        Ok(Created {
            annotation: id,
            message: format!("Annotation {id} added"),
        })
    }

    async fn fetch_annotation(&self, id: AnnotationId) -> Result<Annotation> {
        self.journal.record(format!("store.fetch {id}"));
        self.pause(StoreOp::Fetch).await;
        self.check(StoreOp::Fetch)?;
        self.existing(id)
    }

    async fn list_annotations(&self, user: UserId, image: ImageId) -> Result<Vec<Annotation>> {
        self.journal
            .record(format!("store.list user={user} image={image}"));
        self.check(StoreOp::List)?;
        Ok(self
            .annotations
            .borrow()
            .values()
            .filter(|a| a.user == user && a.image == image)
            .cloned()
            .collect())
    }

    async fn update_annotation(&self, annotation: &Annotation) -> Result<Ack> {
        self.journal.record(format!(
            "store.update {} {}",
            annotation.id, annotation.location
        ));
        self.pause(StoreOp::Update).await;
        self.check(StoreOp::Update)?;
        self.existing(annotation.id)?;
        self.insert(annotation.clone());
        Ok(Ack {
            message: format!("Annotation {} updated", annotation.id),
        })
    }

    async fn delete_annotation(&self, id: AnnotationId) -> Result<Ack> {
        self.journal.record(format!("store.delete {id}"));
        self.pause(StoreOp::Delete).await;
        self.check(StoreOp::Delete)?;
        self.annotations
            .borrow_mut()
            .remove(&id)
            .ok_or(AnnoError::AnnotationNotFound(id))?;
        Ok(Ack {
            message: format!("Annotation {id} deleted"),
        })
    }

    async fn add_annotation_term(&self, link: &AnnotationTerm) -> Result<Ack> {
        self.journal
            .record(format!("store.add_term {} term={}", link.annotation, link.term));
        let delay = self.term_delays.borrow().get(&link.term).copied().unwrap_or(0);
        for _ in 0..delay {
            tokio::task::yield_now().await;
        }
        self.journal
            .record(format!("store.term_done {} term={}", link.annotation, link.term));
        self.check(StoreOp::AddTerm)?;

        let mut annotations = self.annotations.borrow_mut();
        let annotation = annotations
            .get_mut(&link.annotation)
            .ok_or(AnnoError::AnnotationNotFound(link.annotation))?;
        if link.clear_others {
            annotation.terms.clear();
        }
        if !annotation.has_term(link.term) {
            annotation.terms.push(link.term);
        }
        Ok(Ack {
            message: format!("Term {} added to annotation {}", link.term, link.annotation),
        })
    }

    async fn annotation_terms(&self, id: AnnotationId) -> Result<Vec<AnnotationTerm>> {
        self.journal.record(format!("store.terms {id}"));
        self.check(StoreOp::AnnotationTerms)?;
        let annotation = self.existing(id)?;
        Ok(annotation
            .terms
            .iter()
            .map(|term| AnnotationTerm::new(id, *term))
            .collect())
    }
}

// ─── Retrieval ───────────────────────────────────────────────────────────

/// Retrieval answering with a fixed hit list. `None` means unreachable.
pub struct MemoryRetrieval {
    journal: Journal,
    hits: RefCell<Option<Vec<RetrievalHit>>>,
}

impl MemoryRetrieval {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            hits: RefCell::new(Some(vec![])),
        }
    }

    pub fn set_hits(&self, hits: Vec<RetrievalHit>) {
        *self.hits.borrow_mut() = Some(hits);
    }

    pub fn set_unreachable(&self) {
        *self.hits.borrow_mut() = None;
    }
}

#[async_trait(?Send)]
impl RetrievalService for MemoryRetrieval {
    async fn similar(&self, annotation: AnnotationId) -> Result<Vec<RetrievalHit>> {
        self.journal.record(format!("retrieval.similar {annotation}"));
        self.hits
            .borrow()
            .clone()
            .ok_or_else(|| AnnoError::remote("cannot reach retrieval"))
    }
}

// ─── Views ───────────────────────────────────────────────────────────────

pub struct RecordingTree {
    journal: Journal,
    checked: RefCell<Vec<TermId>>,
}

impl RecordingTree {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            checked: RefCell::new(Vec::new()),
        }
    }

    pub fn set_checked(&self, terms: &[TermId]) {
        *self.checked.borrow_mut() = terms.to_vec();
    }
}

impl OntologyTree for RecordingTree {
    fn checked_terms(&self) -> Vec<TermId> {
        self.checked.borrow().clone()
    }

    fn check(&self, term: TermId) {
        self.journal.record(format!("tree.check {term}"));
        let mut checked = self.checked.borrow_mut();
        if !checked.contains(&term) {
            checked.push(term);
        }
    }

    fn uncheck(&self, term: TermId) {
        self.journal.record(format!("tree.uncheck {term}"));
        self.checked.borrow_mut().retain(|t| *t != term);
    }

    fn refresh(&self, annotation: AnnotationId) {
        self.journal.record(format!("tree.refresh {annotation}"));
    }

    fn clear(&self) {
        self.journal.record("tree.clear");
        self.checked.borrow_mut().clear();
    }

    fn clear_annotation(&self) {
        self.journal.record("tree.clear_annotation");
    }
}

pub struct RecordingNotifier {
    journal: Journal,
    messages: RefCell<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            messages: RefCell::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn message(&self, title: &str, body: &str) {
        self.journal.record(format!("notify {title}: {body}"));
        self.messages
            .borrow_mut()
            .push((title.to_string(), body.to_string()));
    }
}

pub struct RecordingBrowse {
    journal: Journal,
    refreshes: Cell<usize>,
    loaded: Cell<bool>,
}

impl RecordingBrowse {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            refreshes: Cell::new(0),
            loaded: Cell::new(false),
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.get()
    }

    pub fn loaded(&self) -> bool {
        self.loaded.get()
    }
}

impl BrowseView for RecordingBrowse {
    fn refresh_annotation_listings(&self) {
        self.journal.record("browse.refresh");
        self.refreshes.set(self.refreshes.get() + 1);
    }

    fn layer_loaded(&self) {
        self.journal.record("browse.loaded");
        self.loaded.set(true);
    }
}

/// Gesture handlers that remember what is armed and selected.
pub struct RecordingControls {
    journal: Journal,
    armed: RefCell<HashSet<ToolKind>>,
    selected: RefCell<Vec<FeatureKey>>,
    editing: RefCell<HashMap<FeatureKey, EditMask>>,
    options: Cell<Option<ToolOptions>>,
    select_style: Cell<Option<Style>>,
}

impl RecordingControls {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            armed: RefCell::new(HashSet::new()),
            selected: RefCell::new(Vec::new()),
            editing: RefCell::new(HashMap::new()),
            options: Cell::new(None),
            select_style: Cell::new(None),
        }
    }

    pub fn armed(&self) -> Vec<ToolKind> {
        self.armed.borrow().iter().copied().collect()
    }

    pub fn selected(&self) -> Vec<FeatureKey> {
        self.selected.borrow().clone()
    }

    pub fn edit_mask(&self, feature: FeatureKey) -> Option<EditMask> {
        self.editing.borrow().get(&feature).copied()
    }

    pub fn options(&self) -> Option<ToolOptions> {
        self.options.get()
    }

    pub fn select_style(&self) -> Option<Style> {
        self.select_style.get()
    }
}

impl GestureControls for RecordingControls {
    fn arm(&self, tool: ToolKind) {
        self.journal.record(format!("controls.arm {tool:?}"));
        self.armed.borrow_mut().insert(tool);
    }

    fn disarm(&self, tool: ToolKind) {
        if self.armed.borrow_mut().remove(&tool) {
            self.journal.record(format!("controls.disarm {tool:?}"));
        }
    }

    fn configure(&self, options: &ToolOptions) {
        self.options.set(Some(*options));
    }

    fn set_select_style(&self, style: &Style) {
        self.select_style.set(Some(*style));
    }

    fn select(&self, feature: FeatureKey) {
        self.journal.record(format!("controls.select {feature}"));
        self.selected.borrow_mut().push(feature);
    }

    fn unselect_all(&self) {
        self.selected.borrow_mut().clear();
    }

    fn edit(&self, feature: FeatureKey, mask: EditMask) {
        self.journal.record(format!("controls.edit {feature} {mask:?}"));
        self.editing.borrow_mut().insert(feature, mask);
    }

    fn release(&self, feature: FeatureKey) {
        self.journal.record(format!("controls.release {feature}"));
        self.editing.borrow_mut().remove(&feature);
    }
}

/// Canvas that keeps what it would draw.
pub struct RecordingCanvas {
    journal: Journal,
    primitives: RefCell<HashSet<FeatureKey>>,
    overlays: RefCell<HashMap<PopupHandle, Overlay>>,
}

impl RecordingCanvas {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            primitives: RefCell::new(HashSet::new()),
            overlays: RefCell::new(HashMap::new()),
        }
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.borrow().len()
    }

    pub fn shows(&self, feature: FeatureKey) -> bool {
        self.primitives.borrow().contains(&feature)
    }

    pub fn overlay(&self, handle: PopupHandle) -> Option<Overlay> {
        self.overlays.borrow().get(&handle).cloned()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.borrow().len()
    }
}

impl Canvas for RecordingCanvas {
    fn add_primitive(&self, feature: &VectorFeature) {
        self.journal.record(format!("canvas.add {}", feature.key()));
        self.primitives.borrow_mut().insert(feature.key());
    }

    fn remove_primitive(&self, feature: &VectorFeature) {
        self.journal.record(format!("canvas.remove {}", feature.key()));
        self.primitives.borrow_mut().remove(&feature.key());
    }

    fn redraw(&self, feature: &VectorFeature) {
        self.journal.record(format!("canvas.redraw {}", feature.key()));
    }

    fn add_overlay(&self, overlay: &Overlay) {
        self.journal.record(format!("canvas.popup {:?}", overlay.handle));
        self.overlays
            .borrow_mut()
            .insert(overlay.handle, overlay.clone());
    }

    fn update_overlay(&self, overlay: &Overlay) {
        self.overlays
            .borrow_mut()
            .insert(overlay.handle, overlay.clone());
    }

    fn remove_overlay(&self, handle: PopupHandle) {
        self.journal.record(format!("canvas.close {handle:?}"));
        self.overlays.borrow_mut().remove(&handle);
    }
}

// ─── Backend ─────────────────────────────────────────────────────────────

/// Every in-memory collaborator, sharing one journal.
pub struct MemoryBackend {
    pub journal: Journal,
    pub store: Rc<MemoryStore>,
    pub retrieval: Rc<MemoryRetrieval>,
    pub tree: Rc<RecordingTree>,
    pub notifier: Rc<RecordingNotifier>,
    pub browse: Rc<RecordingBrowse>,
    pub controls: Rc<RecordingControls>,
    pub canvas: Rc<RecordingCanvas>,
}

impl MemoryBackend {
    pub fn new(author: UserId) -> Self {
        let journal = Journal::default();
        Self {
            store: Rc::new(MemoryStore::new(journal.clone(), author)),
            retrieval: Rc::new(MemoryRetrieval::new(journal.clone())),
            tree: Rc::new(RecordingTree::new(journal.clone())),
            notifier: Rc::new(RecordingNotifier::new(journal.clone())),
            browse: Rc::new(RecordingBrowse::new(journal.clone())),
            controls: Rc::new(RecordingControls::new(journal.clone())),
            canvas: Rc::new(RecordingCanvas::new(journal.clone())),
            journal,
        }
    }

    pub fn services(&self) -> Services {
        Services {
            store: self.store.clone(),
            retrieval: self.retrieval.clone(),
            ontology: self.tree.clone(),
            notifier: self.notifier.clone(),
            browse: self.browse.clone(),
            controls: self.controls.clone(),
            canvas: self.canvas.clone(),
        }
    }
}
