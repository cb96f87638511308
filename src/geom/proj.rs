use anyhow::{Context, Result};
use geo::{Coord, MapCoords, MultiPolygon, Point};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::IngestError;

/// PROJ.4 string for EPSG:4326 (WGS84 lon/lat).
const LONLAT_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// PROJ.4 definitions for the supported source systems: NAD83 state-plane
/// zones in US survey feet. Sources in any other system fail the load with a
/// coordinate-system mismatch rather than guessing a transform.
fn proj4_for_epsg(epsg: u32) -> Option<&'static str> {
    match epsg {
        // Oklahoma North (US ft)
        2268 => Some("+proj=lcc +lat_1=36.76666666666667 +lat_2=35.56666666666667 +lat_0=35 +lon_0=-98 +x_0=600000.0000000001 +y_0=0 +datum=NAD83 +units=us-ft +no_defs +type=crs"),
        // Oklahoma South (US ft)
        2269 => Some("+proj=lcc +lat_1=35.23333333333333 +lat_2=33.93333333333333 +lat_0=33.33333333333334 +lon_0=-98 +x_0=600000.0000000001 +y_0=0 +datum=NAD83 +units=us-ft +no_defs +type=crs"),
        // Texas North Central (US ft)
        2276 => Some("+proj=lcc +lat_1=33.96666666666667 +lat_2=32.13333333333333 +lat_0=31.66666666666667 +lon_0=-98.5 +x_0=600000 +y_0=2000000 +datum=NAD83 +units=us-ft +no_defs +type=crs"),
        // Illinois East (US ft)
        3435 => Some("+proj=tmerc +lat_0=36.66666666666666 +lon_0=-88.33333333333333 +k=0.9999749999999999 +x_0=300000.0000000001 +y_0=0 +datum=NAD83 +units=us-ft +no_defs +type=crs"),
        _ => None,
    }
}

/// Transforms between the parcel source frame (a Cartesian state-plane
/// projection in feet) and EPSG:4326 storage coordinates.
///
/// The source frame survives only as a computation frame: areas stay in
/// square feet there; everything stored is lon/lat.
pub(crate) struct Reprojector {
    plane: Proj4,
    lonlat: Proj4,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector").finish_non_exhaustive()
    }
}

impl Reprojector {
    /// Build a reprojector for the given source EPSG code.
    pub(crate) fn for_epsg(epsg: u32) -> Result<Self, IngestError> {
        let proj_string = proj4_for_epsg(epsg).ok_or(IngestError::CrsMismatch { epsg })?;
        let plane = Proj4::from_proj_string(proj_string)
            .map_err(|_| IngestError::CrsMismatch { epsg })?;
        let lonlat = Proj4::from_proj_string(LONLAT_PROJ4)
            .map_err(|_| IngestError::CrsMismatch { epsg: super::STORAGE_EPSG })?;
        Ok(Self { plane, lonlat })
    }

    /// Reproject a source-frame polygon to lon/lat degrees for storage.
    pub(crate) fn plane_to_lonlat(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        mp.try_map_coords(|coord: Coord<f64>| {
            let mut point = (coord.x, coord.y, 0.0);
            transform(&self.plane, &self.lonlat, &mut point)
                .context("state plane -> lon/lat transform failed")?;
            // proj4rs yields geographic coordinates in radians.
            Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
        })
    }

    /// Reproject a lon/lat polygon into the source frame (feet), used to
    /// compute square-foot building areas.
    pub(crate) fn lonlat_to_plane(&self, mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        mp.try_map_coords(|coord: Coord<f64>| {
            let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
            transform(&self.lonlat, &self.plane, &mut point)
                .context("lon/lat -> state plane transform failed")?;
            Ok(Coord { x: point.0, y: point.1 })
        })
    }

    /// Reproject a single lon/lat point into the source frame.
    pub(crate) fn point_to_plane(&self, point: Point<f64>) -> Result<Point<f64>> {
        let mut coords = (point.x().to_radians(), point.y().to_radians(), 0.0);
        transform(&self.lonlat, &self.plane, &mut coords)
            .context("lon/lat -> state plane transform failed")?;
        Ok(Point::new(coords.0, coords.1))
    }
}
