//! Network sources: where edge rows come from
//!
//! [`NetworkSource`] is the seam between the exporter and the routing
//! database. [`PgNetworkSource`] talks to PostGIS/pgRouting; the in-memory
//! source in [`crate::core::memory`] stands in for it without a database.

use std::future::Future;

use aoi_common::{Error, Result};
use log::{debug, error};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Row};

use crate::core::aoi::{Coordinate, Profile};
use crate::core::config::{validate_identifier, DatabaseConfig, NetworkSchema};
use crate::core::model::{EdgeRecord, NodeId, RadiusEdgeRow, ReachablePolygon};

/// Read access to a routing network
pub trait NetworkSource {
    /// Closest network node to `origin`, or `None` if the network has no nodes
    fn nearest_node(&self, origin: Coordinate) -> impl Future<Output = Result<Option<NodeId>>> + Send;

    /// Isochrone polygon (WKT) around `node` for a budget in seconds
    fn isochrone(&self, node: NodeId, seconds: f64) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Every edge intersecting `polygon` buffered by `tolerance` degrees
    fn edges_near_polygon(
        &self,
        polygon: &ReachablePolygon,
        tolerance: f64,
        profile: Profile,
    ) -> impl Future<Output = Result<Vec<EdgeRecord>>> + Send;

    /// Every edge within `meters` of `origin`, measured on the geography type
    fn edges_within_radius(
        &self,
        origin: Coordinate,
        meters: f64,
        profile: Profile,
    ) -> impl Future<Output = Result<Vec<RadiusEdgeRow>>> + Send;
}

/// PostGIS/pgRouting network source over a single connection
pub struct PgNetworkSource {
    client: Client,
    schema: NetworkSchema,
    driver: JoinHandle<()>,
}

impl PgNetworkSource {
    /// Open one connection for this invocation
    pub async fn connect(database: &DatabaseConfig, schema: NetworkSchema) -> Result<Self> {
        schema.validate()?;
        debug!("Connecting to {}", database.redacted());

        let (client, connection) = database.pg_config().connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {e}");
            }
        });

        Ok(Self {
            client,
            schema,
            driver,
        })
    }

    fn cost_column(profile: Profile) -> Result<String> {
        let column = profile.cost_column();
        validate_identifier(&column, false)?;
        Ok(column)
    }
}

fn nearest_node_sql(schema: &NetworkSchema) -> String {
    format!(
        "SELECT id::bigint FROM {} \
         ORDER BY {} <-> ST_SetSRID(ST_MakePoint($1, $2), 4326) LIMIT 1",
        schema.vertex_table, schema.vertex_geometry
    )
}

fn edges_near_polygon_sql(schema: &NetworkSchema, cost: &str) -> String {
    let geom = &schema.edge_geometry;
    format!(
        "SELECT id::bigint, source::bigint, target::bigint, {cost}::float8, ST_AsText({geom}) \
         FROM {} \
         WHERE ST_Intersects({geom}, ST_Buffer(ST_GeomFromText($1, 4326), $2)) \
         ORDER BY id",
        schema.edge_table
    )
}

fn edges_within_radius_sql(schema: &NetworkSchema, cost: &str) -> String {
    let geom = &schema.edge_geometry;
    format!(
        "SELECT id::bigint, {cost}::float8, ST_AsText({geom}), \
         ST_AsText(ST_StartPoint({geom})), ST_AsText(ST_EndPoint({geom})) \
         FROM {} \
         WHERE ST_DWithin({geom}::geography, \
               ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3) \
         ORDER BY id",
        schema.edge_table
    )
}

const ISOCHRONE_SQL: &str = "SELECT ST_AsText(iso.geom) \
     FROM pgr_isochrone($1::bigint, ARRAY[$2::float8]) AS iso \
     ORDER BY iso.agg_cost DESC";

impl Drop for PgNetworkSource {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

fn required<T>(value: Option<T>, edge_id: i64, column: &str) -> Result<T> {
    value.ok_or_else(|| Error::Database(format!("edge {edge_id} has NULL {column}")))
}

fn edge_from_row(row: &Row) -> Result<EdgeRecord> {
    let id: i64 = row.try_get(0)?;
    Ok(EdgeRecord {
        id,
        source: required(row.try_get(1)?, id, "source")?,
        target: required(row.try_get(2)?, id, "target")?,
        cost: required(row.try_get(3)?, id, "cost")?,
        geometry: required(row.try_get(4)?, id, "geometry")?,
    })
}

fn radius_row_from_row(row: &Row) -> Result<RadiusEdgeRow> {
    let id: i64 = row.try_get(0)?;
    Ok(RadiusEdgeRow {
        id,
        cost: required(row.try_get(1)?, id, "cost")?,
        geometry: required(row.try_get(2)?, id, "geometry")?,
        start_point: required(row.try_get(3)?, id, "start point")?,
        end_point: required(row.try_get(4)?, id, "end point")?,
    })
}

impl NetworkSource for PgNetworkSource {
    async fn nearest_node(&self, origin: Coordinate) -> Result<Option<NodeId>> {
        let row = self
            .client
            .query_opt(&nearest_node_sql(&self.schema), &[&origin.lon, &origin.lat])
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }

    async fn isochrone(&self, node: NodeId, seconds: f64) -> Result<Option<String>> {
        let rows = self
            .client
            .query(ISOCHRONE_SQL, &[&node, &seconds])
            .await
            .map_err(|e| Error::IsochroneComputation(Error::from(e).to_string()))?;

        for row in rows {
            let geometry: Option<String> = row
                .try_get(0)
                .map_err(|e| Error::IsochroneComputation(e.to_string()))?;
            if let Some(geometry) = geometry {
                return Ok(Some(geometry));
            }
        }
        Ok(None)
    }

    async fn edges_near_polygon(
        &self,
        polygon: &ReachablePolygon,
        tolerance: f64,
        profile: Profile,
    ) -> Result<Vec<EdgeRecord>> {
        let sql = edges_near_polygon_sql(&self.schema, &Self::cost_column(profile)?);
        let rows = self
            .client
            .query(&sql, &[&polygon.wkt(), &tolerance])
            .await?;
        rows.iter().map(edge_from_row).collect()
    }

    async fn edges_within_radius(
        &self,
        origin: Coordinate,
        meters: f64,
        profile: Profile,
    ) -> Result<Vec<RadiusEdgeRow>> {
        let sql = edges_within_radius_sql(&self.schema, &Self::cost_column(profile)?);
        let rows = self
            .client
            .query(&sql, &[&origin.lon, &origin.lat, &meters])
            .await?;
        rows.iter().map(radius_row_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_use_configured_schema() {
        let schema = NetworkSchema {
            edge_table: "routing.ways".to_string(),
            vertex_table: "routing.ways_vertices_pgr".to_string(),
            edge_geometry: "geom".to_string(),
            vertex_geometry: "the_geom".to_string(),
        };

        let sql = nearest_node_sql(&schema);
        assert!(sql.contains("FROM routing.ways_vertices_pgr"));
        assert!(sql.contains("the_geom <->"));
        assert!(sql.ends_with("LIMIT 1"));

        let sql = edges_near_polygon_sql(&schema, "cost_bike");
        assert!(sql.contains("cost_bike::float8"));
        assert!(sql.contains("FROM routing.ways"));
        assert!(sql.contains("ST_Buffer(ST_GeomFromText($1, 4326), $2)"));
        assert!(sql.ends_with("ORDER BY id"));

        let sql = edges_within_radius_sql(&schema, "cost");
        assert!(sql.contains("ST_StartPoint(geom)"));
        assert!(sql.contains("::geography, $3)"));
    }

    #[test]
    fn test_cost_column_per_profile() {
        assert_eq!(PgNetworkSource::cost_column(Profile::Default).unwrap(), "cost");
        assert_eq!(PgNetworkSource::cost_column(Profile::Foot).unwrap(), "cost_foot");
    }
}
