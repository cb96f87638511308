use anyhow::{bail, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile as shp;

/// Convert a shapefile Shape to geo::MultiPolygon<f64>, uplifting single
/// polygons. Null shapes become empty multipolygons.
pub(crate) fn shape_to_multipolygon(shape: shp::Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        shp::Shape::Polygon(polygon) => Ok(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| {
                ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect()
            }),
        )),
        shp::Shape::PolygonM(polygon) => Ok(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| {
                ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect()
            }),
        )),
        shp::Shape::PolygonZ(polygon) => Ok(rings_to_multipolygon(
            polygon.rings().iter().map(|ring| {
                ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect()
            }),
        )),
        shp::Shape::NullShape => Ok(MultiPolygon(vec![])),
        other => bail!("unsupported shape type: {}", other.shapetype()),
    }
}

/// Group a flat ring sequence into polygons: each exterior ring claims the
/// hole rings that follow it (Shapefile stores rings in this order, with
/// exteriors wound clockwise).
fn rings_to_multipolygon(rings: impl Iterator<Item = Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for mut coords in rings {
        ensure_closed(&mut coords);
        if coords.len() < 4 {
            continue; // degenerate ring
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ring = LineString(coords);

        if is_exterior {
            if let Some(ext) = exterior.take() {
                polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(ring);
        } else if exterior.is_some() {
            holes.push(ring);
        } else {
            // A hole with no preceding exterior: treat as its own polygon.
            polygons.push(Polygon::new(ring, vec![]));
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}

/// Ensure first and last coordinates are equal.
fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
}

/// Signed area of a closed coordinate ring (negative = clockwise = exterior
/// under the Shapefile convention).
fn signed_area(coords: &[Coord<f64>]) -> f64 {
    let mut area = 0.0;
    for w in coords.windows(2) {
        area += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    area / 2.0
}

/// Total perimeter of a MultiPolygon (exterior and interior rings) in the
/// units of its coordinate frame.
pub(crate) fn multipolygon_perimeter(mp: &MultiPolygon<f64>) -> f64 {
    fn ring_length(ring: &LineString<f64>) -> f64 {
        ring.0
            .windows(2)
            .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
            .sum()
    }

    mp.0.iter()
        .map(|polygon| {
            ring_length(polygon.exterior())
                + polygon.interiors().iter().map(ring_length).sum::<f64>()
        })
        .sum()
}
