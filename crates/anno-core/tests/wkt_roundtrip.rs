//! Integration tests: geometry → WKT → geometry, and feature store identity.
//!
//! Every shape the layer can draw must survive the wire format unchanged.

use anno_core::*;
use std::rc::Rc;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn assert_roundtrip(geometry: &Geometry) {
    let wkt = emit_wkt(geometry).expect("emit failed");
    let back = parse_wkt(&wkt).expect("re-parse failed");
    assert_eq!(&back, geometry, "geometry changed through {wkt}");
    assert_eq!(emit_wkt(&back).unwrap(), wkt, "emit is not stable");
}

struct NullCanvas;

impl Canvas for NullCanvas {
    fn add_primitive(&self, _: &VectorFeature) {}
    fn remove_primitive(&self, _: &VectorFeature) {}
    fn redraw(&self, _: &VectorFeature) {}
    fn add_overlay(&self, _: &Overlay) {}
    fn update_overlay(&self, _: &Overlay) {}
    fn remove_overlay(&self, _: PopupHandle) {}
}

// ─── Round-trips ─────────────────────────────────────────────────────────

#[test]
fn roundtrip_point() {
    assert_roundtrip(&Geometry::Point(Point::new(1234.5, -0.125)));
    assert_roundtrip(&Geometry::Point(Point::new(0.1 + 0.2, 1e-7)));
}

#[test]
fn roundtrip_line() {
    assert_roundtrip(&Geometry::LineString(vec![
        Point::new(0.0, 0.0),
        Point::new(10.0, 3.3333333333333335),
        Point::new(20.75, 8.0),
    ]));
}

#[test]
fn roundtrip_polygon_with_hole() {
    assert_roundtrip(&Geometry::Polygon(vec![
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 0.0),
        ],
        vec![
            Point::new(10.0, 10.0),
            Point::new(20.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(10.0, 10.0),
        ],
    ]));
}

#[test]
fn roundtrip_regular_polygons() {
    // Trigonometry leaves long fractional coordinates; they must survive.
    for sides in [3, 5, 8, 32] {
        let g = Geometry::regular_polygon(Point::new(512.0, 384.0), 57.3, sides, 0.7);
        assert_roundtrip(&g);
    }
    assert_roundtrip(&Geometry::stretched_polygon(
        Point::new(3.0, 4.0),
        Point::new(90.0, 41.5),
        6,
    ));
}

#[test]
fn roundtrip_multipolygon() {
    let square = |x: f64| {
        vec![vec![
            Point::new(x, 0.0),
            Point::new(x + 1.0, 0.0),
            Point::new(x + 1.0, 1.0),
            Point::new(x, 0.0),
        ]]
    };
    assert_roundtrip(&Geometry::MultiPolygon(vec![square(0.0), square(5.0)]));
}

#[test]
fn annotation_location_parses() {
    let annotation = Annotation {
        id: AnnotationId(8),
        image: ImageId(42),
        user: UserId(1),
        location: "polygon ((0 0, 4 0, 4 3, 0 0))".to_string(),
        terms: Default::default(),
    };
    let g = annotation.geometry().unwrap();
    assert_eq!(emit_wkt(&g).unwrap(), "POLYGON((0 0,4 0,4 3,0 0))");
}

// ─── Store identity ──────────────────────────────────────────────────────

#[test]
fn store_keeps_one_feature_per_annotation() {
    let mut store = FeatureStore::new(Rc::new(NullCanvas));
    let style = Style::filled(Color::BLACK, 0.6);
    // Deterministic mix of upserts and removes over a small id space.
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    for _ in 0..500 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let id = AnnotationId(seed % 7);
        if seed % 3 == 0 {
            store.remove(id);
        } else {
            store.upsert(VectorFeature::authoritative(
                id,
                Geometry::Point(Point::new(seed as f64 % 100.0, 0.0)),
                style,
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for feature in store.iter() {
            let key = feature.annotation_id.expect("authoritative feature");
            assert!(seen.insert(key), "duplicate feature for {key:?}");
        }
    }
}
