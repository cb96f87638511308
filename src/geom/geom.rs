use geo::{Area, BoundingRect, Contains, MultiPolygon, Point};
use rstar::{RTree, AABB};

use crate::geom::BoundingBox;

/// A collection of MultiPolygons with an R-tree over their bounding boxes,
/// used for point-in-polygon joins at ingest.
#[derive(Debug, Clone, Default)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Shapes without a bounding rectangle (empty polygons) stay addressable
    /// by index but never match a spatial query.
    pub(crate) fn new(polygons: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons
                    .iter()
                    .enumerate()
                    .filter_map(|(i, polygon)| {
                        polygon.bounding_rect().map(|rect| BoundingBox::new(i, rect))
                    })
                    .collect(),
            ),
            shapes: polygons,
        }
    }

    /// Indices of shapes whose polygon contains the given point.
    /// Bounding boxes prefilter; containment is exact.
    pub(crate) fn containing(&self, point: Point<f64>) -> impl Iterator<Item = usize> + '_ {
        let envelope = AABB::from_point([point.x(), point.y()]);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|bbox| bbox.idx())
            .filter(move |&idx| self.shapes[idx].contains(&point))
    }

    /// Unsigned area of the shape at `idx` in the coordinate frame's units.
    #[inline]
    pub(crate) fn area(&self, idx: usize) -> f64 {
        self.shapes[idx].unsigned_area()
    }
}
