mod bbox;
mod dist;
mod geom;
mod polygon;
mod proj;
mod wkb;

pub(crate) use bbox::BoundingBox;
pub(crate) use dist::{degree_envelope, haversine_meters, meters_to_miles, miles_to_meters};
pub(crate) use geom::Geometries;
pub(crate) use polygon::{multipolygon_perimeter, shape_to_multipolygon};
pub(crate) use proj::Reprojector;
pub(crate) use wkb::{multipolygon_from_wkb, multipolygon_to_wkb};

/// EPSG code all stored geometries carry.
pub(crate) const STORAGE_EPSG: u32 = 4326;
