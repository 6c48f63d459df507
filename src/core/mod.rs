//! Core library modules for aoi-slice

pub mod aoi;
pub mod config;
pub mod exporter;
pub mod graph;
pub mod graphml;
pub mod memory;
pub mod model;
pub mod options;
pub mod process;
pub mod source;
pub mod tiles;

pub use aoi::{AreaOfInterest, Budget, Coordinate, Profile};
pub use config::{DatabaseConfig, ExportConfig, NetworkSchema, TileBuilderConfig};
pub use exporter::{ExportSummary, IsochroneRequest, OutputFormat, RadiusRequest, SliceExporter};
pub use graph::{SliceGraph, SliceMetadata, SliceMode};
pub use memory::MemoryNetworkSource;
pub use model::{EdgeRecord, NodeId, RadiusEdgeRow, ReachablePolygon};
pub use options::{ExportOptions, ExportStage, StageCallback};
pub use process::{ExitOutcome, ProcessRunner, TokioProcessRunner};
pub use source::{NetworkSource, PgNetworkSource};
