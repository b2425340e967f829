//! In-memory geometry for annotation shapes.
//!
//! Coordinates are image pixels. Polygon rings are stored closed
//! (first point repeated at the end) the way WKT writes them.

use crate::error::{AnnoError, Result};
pub use kurbo::Point;
use kurbo::Rect;
use std::f64::consts::{PI, TAU};

/// A closed ring of a polygon.
pub type Ring = Vec<Point>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    /// Exterior ring followed by any holes.
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// WKT keyword for this geometry.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "POINT",
            Geometry::LineString(_) => "LINESTRING",
            Geometry::Polygon(_) => "POLYGON",
            Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        }
    }

    /// Visit every vertex in document order.
    pub fn for_each_point(&self, mut f: impl FnMut(Point)) {
        match self {
            Geometry::Point(p) => f(*p),
            Geometry::LineString(points) => points.iter().copied().for_each(f),
            Geometry::Polygon(rings) => rings.iter().flatten().copied().for_each(f),
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().flatten().flatten().copied().for_each(f)
            }
        }
    }

    /// Path length in pixels: segment sum for lines, ring perimeters for
    /// polygons, zero for a point.
    pub fn length(&self) -> f64 {
        match self {
            Geometry::Point(_) => 0.0,
            Geometry::LineString(points) => path_length(points),
            Geometry::Polygon(rings) => rings.iter().map(|r| path_length(r)).sum(),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .map(|r| path_length(r))
                .sum(),
        }
    }

    /// Axis-aligned bounds of all vertices.
    pub fn bounds(&self) -> Rect {
        let mut bounds: Option<Rect> = None;
        self.for_each_point(|p| {
            bounds = Some(match bounds {
                Some(b) => b.union_pt(p),
                None => Rect::from_points(p, p),
            });
        });
        bounds.unwrap_or(Rect::ZERO)
    }

    /// Structural checks WKT consumers rely on: finite coordinates, at
    /// least two points per line and three per ring.
    pub fn validate(&self) -> Result<()> {
        let mut finite = true;
        self.for_each_point(|p| finite &= p.x.is_finite() && p.y.is_finite());
        if !finite {
            return Err(AnnoError::InvalidGeometry(format!(
                "{} has a non-finite coordinate",
                self.kind_name()
            )));
        }
        match self {
            Geometry::Point(_) => Ok(()),
            Geometry::LineString(points) if points.len() < 2 => Err(AnnoError::InvalidGeometry(
                "LINESTRING needs at least two points".to_string(),
            )),
            Geometry::LineString(_) => Ok(()),
            Geometry::Polygon(rings) => validate_rings(rings),
            Geometry::MultiPolygon(polygons) => polygons.iter().try_for_each(|p| validate_rings(p)),
        }
    }

    /// Regular polygon with `sides` vertices on a circle of `radius`
    /// around `center`; the first vertex sits at `angle` radians.
    pub fn regular_polygon(center: Point, radius: f64, sides: u32, angle: f64) -> Self {
        let ring = regular_ring(center, radius, sides.max(3), angle);
        Geometry::Polygon(vec![ring])
    }

    /// Regular polygon stretched to fill the box spanned by `a` and `b`.
    pub fn stretched_polygon(a: Point, b: Point, sides: u32) -> Self {
        let sides = sides.max(3);
        // Unit polygon with a flat base, then scaled into the target box.
        let unit = regular_ring(Point::ORIGIN, 1.0, sides, PI * (1.0 / sides as f64 - 0.5));
        let unit_bounds = Geometry::Polygon(vec![unit.clone()]).bounds();
        let target = Rect::from_points(a, b);
        let sx = target.width() / unit_bounds.width().max(f64::EPSILON);
        let sy = target.height() / unit_bounds.height().max(f64::EPSILON);
        let ring = unit
            .into_iter()
            .map(|p| {
                Point::new(
                    target.x0 + (p.x - unit_bounds.x0) * sx,
                    target.y0 + (p.y - unit_bounds.y0) * sy,
                )
            })
            .collect();
        Geometry::Polygon(vec![ring])
    }
}

fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

fn validate_rings(rings: &[Ring]) -> Result<()> {
    if rings.is_empty() {
        return Err(AnnoError::InvalidGeometry(
            "POLYGON needs an exterior ring".to_string(),
        ));
    }
    if rings.iter().any(|r| r.len() < 3) {
        return Err(AnnoError::InvalidGeometry(
            "polygon ring needs at least three points".to_string(),
        ));
    }
    Ok(())
}

fn regular_ring(center: Point, radius: f64, sides: u32, angle: f64) -> Ring {
    let step = TAU / sides as f64;
    let mut ring: Ring = (0..sides)
        .map(|i| {
            let a = angle + step * i as f64;
            Point::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        })
        .collect();
    ring.push(ring[0]);
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
        ]])
    }

    #[test]
    fn polygon_length_is_perimeter() {
        assert!((square().length() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn line_length_sums_segments() {
        let line = Geometry::LineString(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ]);
        assert!((line.length() - 11.0).abs() < 1e-9);
        assert_eq!(Geometry::Point(Point::new(1.0, 1.0)).length(), 0.0);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let b = square().bounds();
        assert_eq!((b.x0, b.y0, b.x1, b.y1), (0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn regular_polygon_has_closed_ring() {
        let Geometry::Polygon(rings) = Geometry::regular_polygon(Point::ORIGIN, 5.0, 5, 0.0) else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 6);
        assert_eq!(rings[0].first(), rings[0].last());
        for p in &rings[0] {
            assert!((p.distance(Point::ORIGIN) - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn regular_polygon_clamps_sides() {
        let Geometry::Polygon(rings) = Geometry::regular_polygon(Point::ORIGIN, 1.0, 1, 0.0) else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 4);
    }

    #[test]
    fn stretched_polygon_fills_box() {
        let g = Geometry::stretched_polygon(Point::new(10.0, 20.0), Point::new(110.0, 70.0), 5);
        let b = g.bounds();
        assert!((b.x0 - 10.0).abs() < 1e-9);
        assert!((b.y0 - 20.0).abs() < 1e-9);
        assert!((b.x1 - 110.0).abs() < 1e-9);
        assert!((b.y1 - 70.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_degenerate_shapes() {
        assert!(Geometry::LineString(vec![Point::ORIGIN]).validate().is_err());
        assert!(Geometry::Polygon(vec![]).validate().is_err());
        assert!(
            Geometry::Point(Point::new(f64::NAN, 0.0))
                .validate()
                .is_err()
        );
        assert!(square().validate().is_ok());
    }
}
