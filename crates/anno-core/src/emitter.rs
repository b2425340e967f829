//! Emitter: `Geometry` → well-known-text.
//!
//! Coordinates use the shortest decimal that parses back to the same
//! `f64`, so emit → parse is lossless.

use crate::error::Result;
use crate::geometry::{Geometry, Point, Ring};
use std::fmt::Write;

/// Emit a geometry as WKT. Fails on geometries the parser would reject.
pub fn emit_wkt(geometry: &Geometry) -> Result<String> {
    geometry.validate()?;

    let mut out = String::with_capacity(64);
    out.push_str(geometry.kind_name());
    match geometry {
        Geometry::Point(p) => {
            out.push('(');
            emit_coord(&mut out, p);
            out.push(')');
        }
        Geometry::LineString(points) => emit_coord_list(&mut out, points),
        Geometry::Polygon(rings) => emit_ring_list(&mut out, rings),
        Geometry::MultiPolygon(polygons) => {
            out.push('(');
            for (i, rings) in polygons.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit_ring_list(&mut out, rings);
            }
            out.push(')');
        }
    }
    Ok(out)
}

fn emit_coord(out: &mut String, p: &Point) {
    let _ = write!(out, "{} {}", p.x, p.y);
}

fn emit_coord_list(out: &mut String, points: &[Point]) {
    out.push('(');
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_coord(out, p);
    }
    out.push(')');
}

fn emit_ring_list(out: &mut String, rings: &[Ring]) {
    out.push('(');
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        emit_coord_list(out, ring);
    }
    out.push(')');
}
