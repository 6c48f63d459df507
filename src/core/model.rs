//! Rows read from the routing network and the values derived from them

use aoi_common::{Error, Result};
use geo::{Area, Geometry, MultiPolygon};
use serde::Serialize;
use sha2::{Digest, Sha256};
use wkt::TryFromWkt;

/// Graph node identifier
pub type NodeId = i64;

/// One row of the routing network
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub id: i64,
    pub source: NodeId,
    pub target: NodeId,
    pub cost: f64,
    /// Line geometry as WKT
    pub geometry: String,
}

/// A radius-query row, before node identities are derived
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusEdgeRow {
    pub id: i64,
    pub cost: f64,
    pub geometry: String,
    /// `ST_AsText` of the start point
    pub start_point: String,
    /// `ST_AsText` of the end point
    pub end_point: String,
}

impl RadiusEdgeRow {
    /// Convert to an edge whose endpoints are hashed from their point text.
    ///
    /// Two endpoints are the same node only if their text is byte-identical;
    /// `POINT(1 2)` and `POINT(1.0 2.0)` become different nodes.
    pub fn into_edge(self) -> EdgeRecord {
        EdgeRecord {
            id: self.id,
            source: synthetic_node_id(&self.start_point),
            target: synthetic_node_id(&self.end_point),
            cost: self.cost,
            geometry: self.geometry,
        }
    }
}

/// Node identifier derived from the exact text of a point geometry.
///
/// First eight bytes of the SHA-256 digest, big-endian, with the sign bit
/// cleared so identifiers are never negative.
pub fn synthetic_node_id(point_text: &str) -> NodeId {
    let digest = Sha256::digest(point_text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) & (u64::MAX >> 1)) as NodeId
}

/// Isochrone boundary for one origin and budget
#[derive(Debug, Clone)]
pub struct ReachablePolygon {
    wkt: String,
    shape: MultiPolygon<f64>,
}

impl ReachablePolygon {
    /// Parse the polygon text returned by the isochrone function
    pub fn from_wkt(text: &str) -> Result<Self> {
        let geometry = Geometry::<f64>::try_from_wkt_str(text).map_err(|e| {
            Error::IsochroneComputation(format!("unreadable isochrone geometry: {e}"))
        })?;
        let shape = match geometry {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            Geometry::MultiPolygon(multi) => multi,
            other => {
                return Err(Error::IsochroneComputation(format!(
                    "expected a polygon, got {}",
                    geometry_kind(&other)
                )))
            }
        };
        if shape.0.iter().all(|polygon| polygon.exterior().0.is_empty()) {
            return Err(Error::IsochroneComputation(
                "isochrone polygon is empty".to_string(),
            ));
        }
        Ok(Self {
            wkt: text.to_string(),
            shape,
        })
    }

    pub fn wkt(&self) -> &str {
        &self.wkt
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Planar area in square degrees
    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) | Geometry::LineString(_) => "LINESTRING",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) => "RECT",
        Geometry::Triangle(_) => "TRIANGLE",
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => "POLYGON",
    }
}
