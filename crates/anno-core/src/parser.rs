//! Parser for well-known-text geometry → `Geometry`.
//!
//! Built on `winnow` 0.7. Handles `POINT`, `LINESTRING`, `POLYGON` and
//! `MULTIPOLYGON` with case-insensitive keywords and free whitespace
//! around parentheses and commas.

use crate::error::{AnnoError, Result};
use crate::geometry::{Geometry, Point, Ring};
use winnow::ascii::{Caseless, float, multispace0, multispace1};
use winnow::combinator::{alt, delimited, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::literal;

/// Parse a WKT string into a `Geometry`.
#[must_use = "parsing result should be used"]
pub fn parse_wkt(input: &str) -> Result<Geometry> {
    let mut rest = input.trim_start();
    let geometry = parse_geometry
        .parse_next(&mut rest)
        .map_err(|e| AnnoError::InvalidGeometry(format!("WKT parse error: {e} in {input:?}")))?;

    let trailing = rest.trim();
    if !trailing.is_empty() {
        return Err(AnnoError::InvalidGeometry(format!(
            "unexpected trailing input {trailing:?}"
        )));
    }

    geometry.validate()?;
    Ok(geometry)
}

fn parse_geometry(input: &mut &str) -> ModalResult<Geometry> {
    alt((
        preceded(keyword("MULTIPOLYGON"), parse_polygon_list).map(Geometry::MultiPolygon),
        preceded(keyword("POLYGON"), parse_ring_list).map(Geometry::Polygon),
        preceded(keyword("LINESTRING"), parse_coord_list).map(Geometry::LineString),
        preceded(keyword("POINT"), parse_point_body).map(Geometry::Point),
    ))
    .parse_next(input)
}

/// A geometry keyword followed by optional whitespace.
fn keyword<'a>(name: &'static str) -> impl Parser<&'a str, (), ErrMode<ContextError>> {
    (literal(Caseless(name)), multispace0).void()
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn parse_number(input: &mut &str) -> ModalResult<f64> {
    float.parse_next(input)
}

/// `x y`: two numbers separated by whitespace.
fn parse_coord(input: &mut &str) -> ModalResult<Point> {
    (parse_number, preceded(multispace1, parse_number))
        .map(|(x, y)| Point::new(x, y))
        .parse_next(input)
}

fn open(input: &mut &str) -> ModalResult<()> {
    ('(', multispace0).void().parse_next(input)
}

fn close(input: &mut &str) -> ModalResult<()> {
    (multispace0, ')').void().parse_next(input)
}

fn comma(input: &mut &str) -> ModalResult<()> {
    (multispace0, ',', multispace0).void().parse_next(input)
}

fn parse_point_body(input: &mut &str) -> ModalResult<Point> {
    delimited(open, parse_coord, close).parse_next(input)
}

/// `(x y, x y, ...)`
fn parse_coord_list(input: &mut &str) -> ModalResult<Vec<Point>> {
    delimited(open, separated(1.., parse_coord, comma), close).parse_next(input)
}

/// `((x y, ...), (x y, ...))`
fn parse_ring_list(input: &mut &str) -> ModalResult<Vec<Ring>> {
    delimited(open, separated(1.., parse_coord_list, comma), close).parse_next(input)
}

/// `(((x y, ...)), ((x y, ...)))`
fn parse_polygon_list(input: &mut &str) -> ModalResult<Vec<Vec<Ring>>> {
    delimited(open, separated(1.., parse_ring_list, comma), close).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_point() {
        assert_eq!(
            parse_wkt("POINT(10 20.5)").unwrap(),
            Geometry::Point(Point::new(10.0, 20.5))
        );
    }

    #[test]
    fn parses_with_loose_whitespace_and_case() {
        let g = parse_wkt("  linestring ( 0 0 ,  3 4 )\n").unwrap();
        assert_eq!(
            g,
            Geometry::LineString(vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0)])
        );
    }

    #[test]
    fn parses_polygon_with_hole() {
        let g = parse_wkt("POLYGON((0 0,10 0,10 10,0 0),(2 2,3 2,3 3,2 2))").unwrap();
        match g {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[1][0], Point::new(2.0, 2.0));
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn parses_multipolygon() {
        let g = parse_wkt("MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))").unwrap();
        match g {
            Geometry::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            other => panic!("expected multipolygon, got {other:?}"),
        }
    }

    #[test]
    fn parses_scientific_and_negative_coordinates() {
        assert_eq!(
            parse_wkt("POINT(-1.5e2 3E-1)").unwrap(),
            Geometry::Point(Point::new(-150.0, 0.3))
        );
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert!(matches!(
            parse_wkt("CIRCLE(0 0, 5)"),
            Err(AnnoError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_wkt("POINT(1 2) extra").is_err());
    }

    #[test]
    fn rejects_missing_coordinate() {
        assert!(parse_wkt("POINT(1)").is_err());
        assert!(parse_wkt("LINESTRING(1 2)").is_err());
    }
}
