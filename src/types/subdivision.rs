use geo::{MultiPolygon, Point};

use crate::types::SubdivisionId;

/// A named polygon grouping parcels, typically a platted neighborhood.
#[derive(Debug, Clone)]
pub struct Subdivision {
    pub id: SubdivisionId,
    pub name: String,
    /// Name as it appears in the cadastral administration, often suffixed
    /// with the city.
    pub cama_name: Option<String>,
    /// Source-provided perimeter/area in the Cartesian frame (feet / sq feet).
    pub shape_length: Option<f64>,
    pub shape_area: Option<f64>,
    /// Polygon in EPSG:4326.
    pub geometry: MultiPolygon<f64>,
    pub centroid: Option<Point<f64>>,
    /// Area in the 4326 frame, used only to break containment ties.
    pub area: f64,
}
