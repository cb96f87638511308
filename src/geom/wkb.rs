//! Minimal WKB encoder/decoder for MultiPolygon geometry columns.

use anyhow::{bail, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};

/// WKB geometry type for Polygon
const WKB_POLYGON: u32 = 3;
/// WKB geometry type for MultiPolygon
const WKB_MULTIPOLYGON: u32 = 6;
/// WKB byte order: little endian
const WKB_LE: u8 = 1;

/// Encode a MultiPolygon as little-endian WKB.
pub(crate) fn multipolygon_to_wkb(mp: &MultiPolygon<f64>) -> Vec<u8> {
    fn write_ring(out: &mut Vec<u8>, ring: &LineString<f64>) {
        out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
        for coord in &ring.0 {
            out.extend_from_slice(&coord.x.to_le_bytes());
            out.extend_from_slice(&coord.y.to_le_bytes());
        }
    }

    let mut out = Vec::new();
    out.push(WKB_LE);
    out.extend_from_slice(&WKB_MULTIPOLYGON.to_le_bytes());
    out.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());

    for polygon in &mp.0 {
        // Each member polygon is a full WKB record.
        out.push(WKB_LE);
        out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
        out.extend_from_slice(&((1 + polygon.interiors().len()) as u32).to_le_bytes());
        write_ring(&mut out, polygon.exterior());
        for interior in polygon.interiors() {
            write_ring(&mut out, interior);
        }
    }

    out
}

/// Decode a little-endian WKB MultiPolygon (or a single Polygon, uplifted).
pub(crate) fn multipolygon_from_wkb(bytes: &[u8]) -> Result<MultiPolygon<f64>> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let geometry_type = cursor.read_header()?;

    match geometry_type {
        WKB_MULTIPOLYGON => {
            let num_polygons = cursor.read_u32()?;
            let mut polygons = Vec::with_capacity(num_polygons as usize);
            for _ in 0..num_polygons {
                let inner_type = cursor.read_header()?;
                if inner_type != WKB_POLYGON {
                    bail!("expected polygon record inside multipolygon, got type {inner_type}");
                }
                polygons.push(cursor.read_polygon_body()?);
            }
            Ok(MultiPolygon(polygons))
        }
        WKB_POLYGON => Ok(MultiPolygon(vec![cursor.read_polygon_body()?])),
        other => bail!("unsupported WKB geometry type: {other}"),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn read_header(&mut self) -> Result<u32> {
        let order = self.read_u8()?;
        if order != WKB_LE {
            bail!("unsupported WKB byte order: {order}");
        }
        self.read_u32()
    }

    fn read_u8(&mut self) -> Result<u8> {
        let Some(&byte) = self.bytes.get(self.pos) else {
            bail!("truncated WKB at offset {}", self.pos);
        };
        self.pos += 1;
        Ok(byte)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let Some(slice) = self.bytes.get(self.pos..end) else {
            bail!("truncated WKB at offset {}", self.pos);
        };
        self.pos = end;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let end = self.pos + 8;
        let Some(slice) = self.bytes.get(self.pos..end) else {
            bail!("truncated WKB at offset {}", self.pos);
        };
        self.pos = end;
        Ok(f64::from_le_bytes(slice.try_into().unwrap()))
    }

    fn read_ring(&mut self) -> Result<LineString<f64>> {
        let count = self.read_u32()? as usize;
        let mut coords = Vec::with_capacity(count);
        for _ in 0..count {
            let x = self.read_f64()?;
            let y = self.read_f64()?;
            coords.push(Coord { x, y });
        }
        Ok(LineString(coords))
    }

    fn read_polygon_body(&mut self) -> Result<Polygon<f64>> {
        let num_rings = self.read_u32()? as usize;
        if num_rings == 0 {
            bail!("polygon record with zero rings");
        }
        let exterior = self.read_ring()?;
        let mut interiors = Vec::with_capacity(num_rings - 1);
        for _ in 1..num_rings {
            interiors.push(self.read_ring()?);
        }
        Ok(Polygon::new(exterior, interiors))
    }
}
