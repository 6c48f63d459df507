//! In-memory network source
//!
//! Holds vertices and directed edges in plain vectors and answers the same
//! four queries as the database: nearest vertex by haversine distance, a
//! convex-hull isochrone from a Dijkstra search over the `cost` column,
//! polygon intersection with a tolerance band, and a geodesic radius test
//! against the closest point of each line. Point and line text is
//! formatted the way `ST_AsText` prints it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use aoi_common::{Error, Result};
use geo::{
    Closest, Coord, ConvexHull, Distance, Haversine, HaversineClosestPoint, Intersects, LineString,
    MultiPoint, Point, Polygon,
};

use crate::core::aoi::{Coordinate, Profile};
use crate::core::model::{EdgeRecord, NodeId, RadiusEdgeRow, ReachablePolygon};
use crate::core::source::NetworkSource;

/// Column every edge carries
const DEFAULT_COST_COLUMN: &str = "cost";

#[derive(Debug, Clone)]
struct MemoryEdge {
    id: i64,
    source: NodeId,
    target: NodeId,
    costs: BTreeMap<String, f64>,
    line: LineString<f64>,
}

/// A routing network held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryNetworkSource {
    vertices: Vec<(NodeId, Point<f64>)>,
    edges: Vec<MemoryEdge>,
}

impl MemoryNetworkSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex at (lon, lat)
    pub fn with_vertex(mut self, id: NodeId, lon: f64, lat: f64) -> Self {
        self.vertices.push((id, Point::new(lon, lat)));
        self
    }

    /// Add an edge following the straight line between its endpoint vertices.
    ///
    /// Endpoints must already exist.
    pub fn with_edge(self, id: i64, source: NodeId, target: NodeId, cost: f64) -> Result<Self> {
        let start = self.vertex(source)?;
        let end = self.vertex(target)?;
        self.with_edge_geometry(id, source, target, cost, &[start.x_y(), end.x_y()])
    }

    /// Add an edge with an explicit (lon, lat) polyline
    pub fn with_edge_geometry(
        mut self,
        id: i64,
        source: NodeId,
        target: NodeId,
        cost: f64,
        coords: &[(f64, f64)],
    ) -> Result<Self> {
        if coords.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "edge {id} needs at least two coordinates"
            )));
        }
        let mut costs = BTreeMap::new();
        costs.insert(DEFAULT_COST_COLUMN.to_string(), cost);
        self.edges.push(MemoryEdge {
            id,
            source,
            target,
            costs,
            line: coords.iter().map(|&(x, y)| Coord { x, y }).collect(),
        });
        Ok(self)
    }

    /// Set an additional cost column on an existing edge
    pub fn with_profile_cost(mut self, id: i64, profile: Profile, cost: f64) -> Result<Self> {
        let edge = self
            .edges
            .iter_mut()
            .find(|edge| edge.id == id)
            .ok_or_else(|| Error::InvalidInput(format!("no edge with id {id}")))?;
        edge.costs.insert(profile.cost_column(), cost);
        Ok(self)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn vertex(&self, id: NodeId) -> Result<Point<f64>> {
        self.vertices
            .iter()
            .find(|(vertex, _)| *vertex == id)
            .map(|(_, point)| *point)
            .ok_or_else(|| Error::InvalidInput(format!("no vertex with id {id}")))
    }

    fn cost(edge: &MemoryEdge, column: &str) -> Result<f64> {
        edge.costs.get(column).copied().ok_or_else(|| {
            Error::Database(format!("column \"{column}\" does not exist (42703)"))
        })
    }

    /// Shortest cost from `origin` to every vertex reachable within `budget`
    fn reachable(&self, origin: NodeId, budget: f64) -> Result<HashMap<NodeId, f64>> {
        let mut best: HashMap<NodeId, f64> = HashMap::new();
        let mut heap = BinaryHeap::new();
        best.insert(origin, 0.0);
        heap.push(SearchState {
            node: origin,
            cost: 0.0,
        });

        while let Some(SearchState { node, cost }) = heap.pop() {
            if best.get(&node).is_some_and(|&known| cost > known) {
                continue;
            }
            for edge in self.edges.iter().filter(|edge| edge.source == node) {
                let next = cost + Self::cost(edge, DEFAULT_COST_COLUMN)?;
                if next > budget {
                    continue;
                }
                if best.get(&edge.target).map_or(true, |&known| next < known) {
                    best.insert(edge.target, next);
                    heap.push(SearchState {
                        node: edge.target,
                        cost: next,
                    });
                }
            }
        }

        Ok(best)
    }
}

#[derive(Debug, Clone, Copy)]
struct SearchState {
    node: NodeId,
    cost: f64,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// `ST_AsText`-style point text
pub fn point_text(coord: Coord<f64>) -> String {
    format!("POINT({} {})", coord.x, coord.y)
}

/// `ST_AsText`-style linestring text
pub fn line_text(line: &LineString<f64>) -> String {
    let coords: Vec<String> = line.0.iter().map(|c| format!("{} {}", c.x, c.y)).collect();
    format!("LINESTRING({})", coords.join(","))
}

/// `ST_AsText`-style polygon text
fn polygon_text(polygon: &Polygon<f64>) -> String {
    let ring: Vec<String> = polygon
        .exterior()
        .0
        .iter()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect();
    format!("POLYGON(({}))", ring.join(","))
}

/// Planar distance from `p` to segment `a`-`b`, in degrees
fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Haversine distance from `center` to the closest point of `line`, in meters
fn distance_to_line(center: Point<f64>, line: &LineString<f64>) -> Option<f64> {
    match line.haversine_closest_point(&center) {
        Closest::Intersection(point) | Closest::SinglePoint(point) => {
            Some(Haversine::distance(center, point))
        }
        Closest::Indeterminate => None,
    }
}

fn within_tolerance(line: &LineString<f64>, polygon: &ReachablePolygon, tolerance: f64) -> bool {
    if polygon.shape().intersects(line) {
        return true;
    }
    polygon.shape().0.iter().any(|shape| {
        let ring = &shape.exterior().0;
        line.0.iter().any(|&p| {
            if ring.len() == 1 {
                return segment_distance(p, ring[0], ring[0]) <= tolerance;
            }
            ring.windows(2)
                .any(|segment| segment_distance(p, segment[0], segment[1]) <= tolerance)
        })
    })
}

impl NetworkSource for MemoryNetworkSource {
    async fn nearest_node(&self, origin: Coordinate) -> Result<Option<NodeId>> {
        let target = Point::new(origin.lon, origin.lat);
        Ok(self
            .vertices
            .iter()
            .map(|(id, point)| (*id, Haversine::distance(target, *point)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(id, _)| id))
    }

    async fn isochrone(&self, node: NodeId, seconds: f64) -> Result<Option<String>> {
        if self.vertex(node).is_err() {
            return Ok(None);
        }
        let reached = self.reachable(node, seconds)?;
        let mut points: Vec<Point<f64>> = Vec::with_capacity(reached.len());
        for id in reached.keys() {
            points.push(self.vertex(*id)?);
        }
        let hull = MultiPoint::new(points).convex_hull();
        Ok(Some(polygon_text(&hull)))
    }

    async fn edges_near_polygon(
        &self,
        polygon: &ReachablePolygon,
        tolerance: f64,
        profile: Profile,
    ) -> Result<Vec<EdgeRecord>> {
        let column = profile.cost_column();
        let mut edges = Vec::new();
        for edge in &self.edges {
            if within_tolerance(&edge.line, polygon, tolerance) {
                edges.push(EdgeRecord {
                    id: edge.id,
                    source: edge.source,
                    target: edge.target,
                    cost: Self::cost(edge, &column)?,
                    geometry: line_text(&edge.line),
                });
            }
        }
        edges.sort_by_key(|edge| edge.id);
        Ok(edges)
    }

    async fn edges_within_radius(
        &self,
        origin: Coordinate,
        meters: f64,
        profile: Profile,
    ) -> Result<Vec<RadiusEdgeRow>> {
        let center = Point::new(origin.lon, origin.lat);
        let column = profile.cost_column();
        let mut rows = Vec::new();
        for edge in &self.edges {
            if distance_to_line(center, &edge.line).map_or(true, |d| d > meters) {
                continue;
            }
            let (Some(&first), Some(&last)) = (edge.line.0.first(), edge.line.0.last()) else {
                continue;
            };
            rows.push(RadiusEdgeRow {
                id: edge.id,
                cost: Self::cost(edge, &column)?,
                geometry: line_text(&edge.line),
                start_point: point_text(first),
                end_point: point_text(last),
            });
        }
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn chain() -> MemoryNetworkSource {
        MemoryNetworkSource::new()
            .with_vertex(1, 0.0, 0.0)
            .with_vertex(2, 0.01, 0.0)
            .with_vertex(3, 0.01, 0.01)
            .with_vertex(4, 0.5, 0.5)
            .with_edge(10, 1, 2, 60.0)
            .unwrap()
            .with_edge(11, 2, 3, 60.0)
            .unwrap()
            .with_edge(12, 3, 4, 6000.0)
            .unwrap()
    }

    #[test]
    fn test_point_and_line_text_match_postgis() {
        assert_eq!(point_text(Coord { x: 0.0, y: 0.0 }), "POINT(0 0)");
        assert_eq!(point_text(Coord { x: 0.05, y: 0.05 }), "POINT(0.05 0.05)");
        let line: LineString<f64> = vec![(0.0, 0.0), (-93.5, 41.25)].into();
        assert_eq!(line_text(&line), "LINESTRING(0 0,-93.5 41.25)");
    }

    #[test]
    fn test_nearest_node() {
        let network = chain();
        let origin = Coordinate::new(0.011, 0.009).unwrap();
        assert_eq!(block_on(network.nearest_node(origin)).unwrap(), Some(3));

        let empty = MemoryNetworkSource::new();
        assert_eq!(block_on(empty.nearest_node(origin)).unwrap(), None);
    }

    #[test]
    fn test_reachable_respects_budget() {
        let network = chain();
        let reached = network.reachable(1, 120.0).unwrap();
        assert_eq!(reached.len(), 3);
        assert_eq!(reached[&3], 120.0);
        assert!(!reached.contains_key(&4));
    }

    #[test]
    fn test_isochrone_polygon() {
        let network = chain();
        let text = block_on(network.isochrone(1, 120.0)).unwrap().unwrap();
        let polygon = ReachablePolygon::from_wkt(&text).unwrap();
        assert!(polygon.area() > 0.0);

        assert_eq!(block_on(network.isochrone(99, 120.0)).unwrap(), None);
    }

    #[test]
    fn test_edges_near_polygon_includes_partial_edges() {
        let network = chain();
        let polygon = ReachablePolygon::from_wkt(
            "POLYGON((-0.001 -0.001,0.011 -0.001,0.011 0.011,-0.001 0.011,-0.001 -0.001))",
        )
        .unwrap();
        let edges = block_on(network.edges_near_polygon(&polygon, 0.0001, Profile::Default)).unwrap();
        let ids: Vec<i64> = edges.iter().map(|e| e.id).collect();
        // Edge 12 leaves the polygon but starts inside it
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn test_missing_profile_column() {
        let network = chain();
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let err = block_on(network.edges_within_radius(origin, 5000.0, Profile::Car)).unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        let network = chain().with_profile_cost(10, Profile::Car, 30.0).unwrap();
        let rows = block_on(network.edges_within_radius(origin, 100.0, Profile::Car)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost, 30.0);
    }

    #[test]
    fn test_edges_within_radius_is_geodesic() {
        let network = chain();
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        // 0.01 degrees of longitude at the equator is about 1.1 km
        let near = block_on(network.edges_within_radius(origin, 500.0, Profile::Default)).unwrap();
        assert_eq!(near.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10]);
        let wider = block_on(network.edges_within_radius(origin, 1200.0, Profile::Default)).unwrap();
        assert_eq!(wider.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_with_edge_requires_vertices() {
        assert!(MemoryNetworkSource::new().with_edge(1, 1, 2, 1.0).is_err());

        let network = chain();
        assert_eq!(network.vertex_count(), 4);
        assert_eq!(network.edge_count(), 3);
    }

    #[test]
    fn test_radius_reaches_edge_passing_through_origin() {
        // Both endpoints are about 5.5 km from the origin; the line crosses it
        let network = MemoryNetworkSource::new()
            .with_vertex(1, -0.05, 0.0)
            .with_vertex(2, 0.05, 0.0)
            .with_edge(20, 1, 2, 600.0)
            .unwrap();
        let origin = Coordinate::new(0.0, 0.001).unwrap();
        let rows = block_on(network.edges_within_radius(origin, 500.0, Profile::Default)).unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![20]);
    }
}
