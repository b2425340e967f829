//! Integration tests: create, update and delete against the store, and
//! push notifications from other clients.

mod common;

use anno_core::*;
use anno_editor::memory::StoreOp;
use anno_editor::{GestureEvent, InteractionMode};
use common::*;
use pretty_assertions::assert_eq;

// ─── Create ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn polygon_with_two_terms_attaches_then_reconciles_then_closes() {
    let f = fixture().loaded(vec![]).await;
    f.backend.tree.set_checked(&[TUMOR, STROMA]);
    f.backend.store.set_next_id(101);

    f.layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() })
        .await
        .unwrap();

    assert_eq!(f.count("store.begin"), 1);
    assert_eq!(f.count("store.add_term 101"), 2);
    assert_eq!(f.count("controls.select"), 1);
    assert_eq!(f.count("store.end"), 1);

    let last_term = f.backend.journal.entries()
        .iter()
        .rposition(|e| e.starts_with("store.term_done"))
        .unwrap();
    let select = f.position("controls.select annotation#101");
    let end = f.position("store.end 1");
    let refresh = f.position("browse.refresh");
    assert!(last_term < select, "terms must finish before the swap");
    assert!(select < end, "swap must happen inside the transaction");
    assert!(end < refresh, "listings refresh after the transaction");

    let stored = f.backend.store.get(AnnotationId(101)).unwrap();
    assert_eq!(stored.image, IMAGE);
    assert_eq!(stored.terms.len(), 2);
    assert_eq!(f.backend.store.open_transactions(), 0);

    // Only the authoritative feature is left, and it is selected.
    assert_eq!(f.layer.features().len(), 1);
    assert!(f.layer.contains(AnnotationId(101)));
    assert_eq!(f.layer.selection(), vec![key(101)]);
    assert_eq!(f.backend.canvas.primitive_count(), 1);

    // Two terms: drawn with the multi-term color.
    let feature = f.layer.features().get(AnnotationId(101)).unwrap().clone();
    assert_eq!(feature.style.fill_color, f.layer.config().multi_term_color);
}

#[tokio::test]
async fn term_completion_order_does_not_matter() {
    let f = fixture().loaded(vec![]).await;
    f.backend.tree.set_checked(&[TUMOR, STROMA, NECROSIS]);
    f.backend.store.set_next_id(200);
    f.backend.store.delay_term(TUMOR, 4);
    f.backend.store.delay_term(STROMA, 1);

    f.layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() })
        .await
        .unwrap();

    let done = f.backend.journal.matching("store.term_done");
    assert_eq!(
        done,
        vec![
            "store.term_done 200 term=11".to_string(),
            "store.term_done 200 term=9".to_string(),
            "store.term_done 200 term=7".to_string(),
        ]
    );
    // One reconcile fetch inside the transaction; the popup fetches later.
    let end = f.position("store.end");
    let fetches_in_tx = f.backend.journal.entries()[..end]
        .iter()
        .filter(|e| e.starts_with("store.fetch"))
        .count();
    assert_eq!(fetches_in_tx, 1);
    assert_eq!(f.count("controls.select"), 1);
}

#[tokio::test]
async fn create_without_terms_completes_immediately() {
    let f = fixture().loaded(vec![]).await;
    f.backend.store.set_next_id(300);

    f.layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() })
        .await
        .unwrap();

    assert_eq!(f.count("store.add_term"), 0);
    assert!(f.position("controls.select annotation#300") < f.position("store.end"));
    let feature = f.layer.features().get(AnnotationId(300)).unwrap().clone();
    assert_eq!(feature.style.fill_color, f.layer.config().untermed_color);
}

#[tokio::test]
async fn shell_failure_drops_provisional_and_closes_scope() {
    let f = fixture().loaded(vec![]).await;
    f.backend.store.fail(StoreOp::Create, "no rights");

    let result = f
        .layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() })
        .await;

    assert!(matches!(result, Err(AnnoError::RemoteRequestFailure { .. })));
    assert!(f.layer.features().is_empty());
    assert_eq!(f.backend.canvas.primitive_count(), 0);
    assert_eq!(f.count("store.end"), 1);
    assert_eq!(f.backend.store.open_transactions(), 0);
    assert_eq!(f.count("browse.refresh"), 0);
    assert!(f
        .backend
        .notifier
        .messages()
        .contains(&("Annotation".to_string(), "error:no rights".to_string())));
}

#[tokio::test]
async fn term_failure_still_reconciles() {
    let f = fixture().loaded(vec![]).await;
    f.backend.tree.set_checked(&[TUMOR, STROMA]);
    f.backend.store.set_next_id(400);
    f.backend.store.fail(StoreOp::AddTerm, "term locked");

    f.layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() })
        .await
        .unwrap();

    assert!(f.layer.contains(AnnotationId(400)));
    assert_eq!(f.count("notify Annotation: error:term locked"), 2);
    assert_eq!(f.count("store.end"), 1);
}

#[tokio::test]
async fn local_delete_of_feature_being_created_is_refused() {
    let f = fixture().loaded(vec![]).await;
    f.backend.tree.set_checked(&[TUMOR]);
    f.backend.store.delay_term(TUMOR, 5);

    let create = f
        .layer
        .handle_gesture(GestureEvent::DrawComplete { geometry: square() });
    let interfere = async {
        tokio::task::yield_now().await;
        let provisional = f
            .layer
            .features()
            .iter()
            .find(|feature| feature.is_provisional())
            .map(|feature| feature.key())
            .expect("provisional feature while saving");
        f.layer.delete_feature(provisional).map(|_| ())
    };
    let (created, refused) = futures::join!(create, interfere);

    created.unwrap();
    assert!(matches!(refused, Err(AnnoError::Busy(_))));
    assert_eq!(f.layer.features().len(), 1);
}

#[tokio::test]
async fn annotation_being_saved_refuses_delete_and_second_modify() {
    let f = fixture().loaded(vec![annotation(101, &[TUMOR])]).await;
    f.backend.store.delay(StoreOp::Update, 5);

    let save = f.layer.handle_gesture(GestureEvent::ModifyComplete {
        feature: key(101),
        geometry: square(),
    });
    let interfere = async {
        tokio::task::yield_now().await;
        let delete = f.layer.delete_feature(key(101)).map(|_| ());
        let modify = f
            .layer
            .handle_gesture(GestureEvent::ModifyComplete {
                feature: key(101),
                geometry: square(),
            })
            .await;
        (delete, modify)
    };
    let (saved, (delete, modify)) = futures::join!(save, interfere);

    saved.unwrap();
    assert_eq!(delete, Err(AnnoError::Busy(key(101))));
    assert_eq!(modify, Err(AnnoError::Busy(key(101))));
    assert!(f.layer.contains(AnnotationId(101)));
    assert_eq!(f.count("store.update 101"), 1);
    assert_eq!(f.count("store.delete"), 0);

    // Once saved, the feature can be deleted again.
    f.layer.delete_feature(key(101)).unwrap().await.unwrap();
    assert!(f.backend.store.get(AnnotationId(101)).is_none());
}

// ─── Update ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn modify_saves_geometry_and_keeps_terms() {
    let f = fixture().loaded(vec![annotation(101, &[TUMOR])]).await;
    let moved = Geometry::Polygon(vec![vec![
        Point::new(11.0, 10.0),
        Point::new(21.0, 10.0),
        Point::new(21.0, 20.0),
        Point::new(11.0, 10.0),
    ]]);

    f.layer
        .handle_gesture(GestureEvent::ModifyComplete {
            feature: key(101),
            geometry: moved.clone(),
        })
        .await
        .unwrap();

    assert!(f.position("store.fetch 101") < f.position("store.update 101"));
    let stored = f.backend.store.get(AnnotationId(101)).unwrap();
    assert_eq!(stored.location, "POLYGON((11 10,21 10,21 20,11 10))");
    assert_eq!(stored.terms.as_slice(), &[TUMOR]);
    assert_eq!(f.layer.features().get(AnnotationId(101)).unwrap().geometry, moved);
}

#[tokio::test]
async fn modify_of_unknown_feature_is_not_found() {
    let f = fixture().loaded(vec![]).await;
    let result = f
        .layer
        .handle_gesture(GestureEvent::ModifyComplete {
            feature: key(999),
            geometry: square(),
        })
        .await;
    assert_eq!(result, Err(AnnoError::NotFound(key(999))));
    assert_eq!(f.count("store.update"), 0);
}

// ─── Delete ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_is_optimistic() {
    let f = fixture().loaded(vec![annotation(101, &[TUMOR])]).await;
    f.layer
        .handle_gesture(GestureEvent::Select { feature: key(101) })
        .await
        .unwrap();

    let pending = f.layer.delete_feature(key(101)).unwrap();
    assert!(!f.layer.contains(AnnotationId(101)));
    assert!(!f.backend.canvas.shows(key(101)));
    assert!(f.layer.selection().is_empty());
    assert_eq!(f.count("tree.clear_annotation"), 1);

    pending.await.unwrap();
    assert!(f.position("store.terms 101") < f.position("store.delete 101"));
    assert!(f.backend.store.get(AnnotationId(101)).is_none());
    assert_eq!(f.backend.browse.refreshes(), 1);
}

#[tokio::test]
async fn failed_delete_is_not_restored() {
    let f = fixture().loaded(vec![annotation(101, &[])]).await;
    f.backend.store.fail(StoreOp::Delete, "forbidden");

    let pending = f.layer.delete_feature(key(101)).unwrap();
    assert!(!f.layer.contains(AnnotationId(101)));
    assert!(pending.await.is_err());

    assert!(!f.layer.contains(AnnotationId(101)));
    assert!(f.backend.store.get(AnnotationId(101)).is_some());
    assert_eq!(f.backend.browse.refreshes(), 0);
    assert_eq!(
        f.backend.notifier.messages().last().unwrap(),
        &("Annotation".to_string(), "error:forbidden".to_string())
    );
}

#[tokio::test]
async fn erase_deletes_on_select() {
    let f = fixture().loaded(vec![annotation(101, &[]), annotation(102, &[])]).await;
    f.layer.switch_mode(InteractionMode::Erase);

    f.layer
        .handle_gesture(GestureEvent::Select { feature: key(101) })
        .await
        .unwrap();

    assert!(!f.layer.contains(AnnotationId(101)));
    assert!(f.layer.contains(AnnotationId(102)));
    assert!(f.backend.store.get(AnnotationId(101)).is_none());
    assert_eq!(f.backend.canvas.overlay_count(), 0);
}

// ─── Push notifications ──────────────────────────────────────────────────

#[tokio::test]
async fn pushed_annotation_is_shown_and_selected_without_erasing() {
    let f = fixture().loaded(vec![]).await;
    f.layer.switch_mode(InteractionMode::Erase);
    f.backend.store.insert(annotation(500, &[STROMA]));

    f.layer.annotation_added(AnnotationId(500)).await.unwrap();

    assert!(f.layer.contains(AnnotationId(500)));
    assert!(f.backend.store.get(AnnotationId(500)).is_some());
    assert_eq!(f.layer.selection(), vec![key(500)]);
    assert_eq!(f.backend.browse.refreshes(), 1);

    // Erase is back once the push is handled.
    assert_eq!(f.layer.mode(), InteractionMode::Erase);
    f.layer
        .handle_gesture(GestureEvent::Select { feature: key(500) })
        .await
        .unwrap();
    assert!(!f.layer.contains(AnnotationId(500)));
}

#[tokio::test]
async fn pushed_removal_and_update() {
    let f = fixture().loaded(vec![annotation(101, &[]), annotation(102, &[])]).await;

    f.layer.annotation_removed(AnnotationId(101));
    assert!(!f.layer.contains(AnnotationId(101)));
    // Removing twice is harmless.
    f.layer.annotation_removed(AnnotationId(101));
    assert_eq!(f.count("tree.clear_annotation"), 1);

    let mut changed = annotation(102, &[TUMOR]);
    changed.location = "POINT(5 6)".to_string();
    f.backend.store.insert(changed);
    f.layer
        .annotation_updated(AnnotationId(102), IMAGE)
        .await
        .unwrap();

    let feature = f.layer.features().get(AnnotationId(102)).unwrap().clone();
    assert_eq!(feature.geometry, Geometry::Point(Point::new(5.0, 6.0)));
    assert_eq!(feature.style.fill_color.to_hex(), "#FF0000");
    assert_eq!(f.layer.features().len(), 1);
}

#[tokio::test]
async fn update_moving_annotation_elsewhere_only_removes_it() {
    let f = fixture().loaded(vec![annotation(101, &[])]).await;
    f.layer
        .annotation_updated(AnnotationId(101), ImageId(77))
        .await
        .unwrap();
    assert!(f.layer.features().is_empty());
    assert_eq!(f.count("store.fetch"), 0);
}

#[tokio::test]
async fn pushed_terms_go_to_the_tree() {
    let f = fixture().loaded(vec![]).await;
    f.layer.term_added(TUMOR);
    f.layer.term_removed(STROMA);
    assert_eq!(
        f.backend.journal.entries(),
        vec!["tree.check 7".to_string(), "tree.uncheck 9".to_string()]
    );
}

// ─── Load ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_shows_only_the_owner_annotations_on_the_image() {
    let f = fixture();
    let mut foreign = annotation(2, &[]);
    foreign.user = UserId(6);
    let mut elsewhere = annotation(3, &[]);
    elsewhere.image = ImageId(43);
    let mut broken = annotation(4, &[]);
    broken.location = "CIRCLE(1 2)".to_string();
    for a in [annotation(1, &[STROMA]), foreign, elsewhere, broken] {
        f.backend.store.insert(a);
    }

    let loaded = f.layer.load_annotations().await.unwrap();

    assert_eq!(loaded, 1);
    assert!(f.layer.contains(AnnotationId(1)));
    assert!(f.backend.browse.loaded());
    assert_eq!(f.layer.mode(), InteractionMode::Idle);
}
