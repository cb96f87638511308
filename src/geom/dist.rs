use geo::{Distance, Haversine, Point};
use rstar::AABB;

const METERS_PER_MILE: f64 = 1_609.344;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

#[inline]
pub(crate) fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

#[inline]
pub(crate) fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

/// Great-circle distance in meters between two lon/lat points.
#[inline]
pub(crate) fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Conservative lon/lat envelope around `center` covering `radius_meters`.
///
/// The envelope is a prefilter for R-tree queries; candidates still get an
/// exact haversine check. Padded 10% so the box never undershoots the circle.
pub(crate) fn degree_envelope(center: Point<f64>, radius_meters: f64) -> AABB<[f64; 2]> {
    let d_lat = radius_meters / METERS_PER_DEGREE * 1.1;
    let lat_scale = center.y().to_radians().cos().abs().max(1e-6);
    let d_lon = radius_meters / (METERS_PER_DEGREE * lat_scale) * 1.1;

    AABB::from_corners(
        [center.x() - d_lon, center.y() - d_lat],
        [center.x() + d_lon, center.y() + d_lat],
    )
}
