//! Export options and progress reporting

use std::fmt;
use std::sync::Arc;

/// Steps of an export, reported in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    ResolvingNode,
    ComputingIsochrone,
    FetchingEdges,
    BuildingTiles,
    Archiving,
    WritingGraph,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExportStage::ResolvingNode => "Resolving nearest network node",
            ExportStage::ComputingIsochrone => "Computing isochrone",
            ExportStage::FetchingEdges => "Fetching edges",
            ExportStage::BuildingTiles => "Building routing tiles",
            ExportStage::Archiving => "Packaging tile archive",
            ExportStage::WritingGraph => "Writing GraphML",
        };
        f.write_str(text)
    }
}

/// Progress callback function type
pub type StageCallback = Arc<dyn Fn(ExportStage) + Send + Sync>;

/// Options for export operations
#[derive(Clone, Default)]
pub struct ExportOptions {
    /// Optional progress callback
    pub progress: Option<StageCallback>,
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
