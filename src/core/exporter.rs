//! AOI slice exporter
//!
//! Turns a point and a budget into a graph artifact: resolve the nearest
//! node, compute the reachable region, pull the edges, then write GraphML
//! or build and package routing tiles. Every step is awaited in sequence
//! and any failure aborts the whole export.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use aoi_common::{Error, Result};
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::aoi::{AreaOfInterest, Profile};
use crate::core::config::ExportConfig;
use crate::core::graph::{SliceGraph, SliceMetadata, SliceMode};
use crate::core::graphml;
use crate::core::model::{EdgeRecord, RadiusEdgeRow, ReachablePolygon};
use crate::core::options::{ExportOptions, ExportStage};
use crate::core::process::ProcessRunner;
use crate::core::source::NetworkSource;
use crate::core::tiles::TileWorkspace;

/// Kind of artifact an export produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Graphml,
    TileArchive,
}

/// Time-budget export parameters
#[derive(Debug, Clone)]
pub struct IsochroneRequest {
    pub aoi: AreaOfInterest,
    pub profile: Profile,
    pub output: PathBuf,
    /// Produce a routing-tile archive instead of GraphML
    pub tiles: bool,
}

/// Radius export parameters
#[derive(Debug, Clone)]
pub struct RadiusRequest {
    pub aoi: AreaOfInterest,
    pub profile: Profile,
    pub output: PathBuf,
}

/// What an export wrote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub mode: SliceMode,
    pub nodes: usize,
    pub edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_files: Option<usize>,
    /// Hex SHA-256 of the written artifact
    pub sha256: String,
}

/// Hex SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Exports slices from a network source, using a process runner for tiles
pub struct SliceExporter<S, R> {
    source: S,
    runner: R,
    config: ExportConfig,
    options: ExportOptions,
}

impl<S: NetworkSource, R: ProcessRunner> SliceExporter<S, R> {
    pub fn new(source: S, runner: R, config: ExportConfig) -> Self {
        Self {
            source,
            runner,
            config,
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn report(&self, stage: ExportStage) {
        if let Some(progress) = &self.options.progress {
            progress(stage);
        }
    }

    /// Export everything reachable within a travel-time budget
    pub async fn export_isochrone(&self, request: &IsochroneRequest) -> Result<ExportSummary> {
        let seconds = request.aoi.budget.seconds().ok_or_else(|| {
            Error::InvalidInput("time-budget export needs a budget in minutes".to_string())
        })?;
        let origin = request.aoi.origin;

        self.report(ExportStage::ResolvingNode);
        let node = self
            .source
            .nearest_node(origin)
            .await?
            .ok_or(Error::NoNetworkNodeFound {
                lon: origin.lon,
                lat: origin.lat,
            })?;
        info!("Nearest network node to {origin}: {node}");

        let edges = if request.aoi.budget.is_zero() {
            warn!("Zero-minute budget: nothing is reachable, exporting an empty slice");
            Vec::new()
        } else {
            self.report(ExportStage::ComputingIsochrone);
            let text = self
                .source
                .isochrone(node, seconds)
                .await?
                .ok_or_else(|| {
                    Error::IsochroneComputation(format!(
                        "no isochrone geometry for node {node} within {seconds}s"
                    ))
                })?;
            let polygon = ReachablePolygon::from_wkt(&text)?;
            info!("Isochrone polygon covers {:.6} square degrees", polygon.area());

            self.report(ExportStage::FetchingEdges);
            self.source
                .edges_near_polygon(&polygon, self.config.buffer_tolerance, request.profile)
                .await?
        };
        info!("Selected {} edges", edges.len());

        let metadata = SliceMetadata {
            mode: SliceMode::Isochrone,
            profile: request.profile,
            aoi: request.aoi,
        };
        if request.tiles {
            self.write_tiles(edges, metadata, request).await
        } else {
            self.write_graph(edges, metadata, &request.output)
        }
    }

    /// Export every edge within a geodesic radius
    pub async fn export_radius(&self, request: &RadiusRequest) -> Result<ExportSummary> {
        let meters = request.aoi.budget.meters().ok_or_else(|| {
            Error::InvalidInput("radius export needs a budget in kilometers".to_string())
        })?;

        let rows: Vec<RadiusEdgeRow> = if request.aoi.budget.is_zero() {
            warn!("Zero radius: exporting an empty slice");
            Vec::new()
        } else {
            self.report(ExportStage::FetchingEdges);
            self.source
                .edges_within_radius(request.aoi.origin, meters, request.profile)
                .await?
        };
        info!("Selected {} edges", rows.len());

        let edges = rows.into_iter().map(RadiusEdgeRow::into_edge).collect();
        let metadata = SliceMetadata {
            mode: SliceMode::Radius,
            profile: request.profile,
            aoi: request.aoi,
        };
        self.write_graph(edges, metadata, &request.output)
    }

    fn write_graph(
        &self,
        edges: Vec<EdgeRecord>,
        metadata: SliceMetadata,
        output: &Path,
    ) -> Result<ExportSummary> {
        self.report(ExportStage::WritingGraph);
        let mode = metadata.mode;
        let graph = SliceGraph::from_edges(edges).with_metadata(metadata);
        graphml::write_graph_file(&graph, output)?;

        Ok(ExportSummary {
            output: output.to_path_buf(),
            format: OutputFormat::Graphml,
            mode,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            tile_files: None,
            sha256: file_sha256(output)?,
        })
    }

    async fn write_tiles(
        &self,
        edges: Vec<EdgeRecord>,
        metadata: SliceMetadata,
        request: &IsochroneRequest,
    ) -> Result<ExportSummary> {
        let graph = SliceGraph::from_edges(edges).with_metadata(metadata);

        self.report(ExportStage::BuildingTiles);
        let workspace = TileWorkspace::prepare(graph.edges())?;
        workspace
            .build(&self.config.tile_builder, &self.runner)
            .await?;

        self.report(ExportStage::Archiving);
        let tile_files = workspace.package(&request.output)?;
        info!(
            "Archived {tile_files} tile files into {}",
            request.output.display()
        );

        Ok(ExportSummary {
            output: request.output.clone(),
            format: OutputFormat::TileArchive,
            mode: SliceMode::Isochrone,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            tile_files: Some(tile_files),
            sha256: file_sha256(&request.output)?,
        })
    }
}
