//! Routing-tile output
//!
//! Edges are written to a CSV in a private work directory, the external tile
//! builder turns that into a tile tree, and the tree is zipped onto the
//! output path. The archive only appears once it is complete.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use aoi_common::{Error, Result};
use log::{debug, info};
use serde::Serialize;
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::config::TileBuilderConfig;
use crate::core::model::{EdgeRecord, NodeId};
use crate::core::process::ProcessRunner;

const EDGES_FILE: &str = "edges.csv";
const TILES_DIR: &str = "tiles";

#[derive(Serialize)]
struct EdgeTriple {
    source: NodeId,
    target: NodeId,
    cost: f64,
}

/// Write `source,target,cost` lines with a header
pub fn write_edge_csv(edges: &[EdgeRecord], path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(io::Error::from)?;
    writer
        .write_record(["source", "target", "cost"])
        .map_err(io::Error::from)?;
    for edge in edges {
        writer
            .serialize(EdgeTriple {
                source: edge.source,
                target: edge.target,
                cost: edge.cost,
            })
            .map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

/// Scratch space for one tile build; removed on drop
pub struct TileWorkspace {
    dir: TempDir,
    edges_csv: PathBuf,
    tiles_dir: PathBuf,
}

impl TileWorkspace {
    /// Create the work directory and write the edge file into it
    pub fn prepare(edges: &[EdgeRecord]) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("aoi-tiles-").tempdir()?;
        let edges_csv = dir.path().join(EDGES_FILE);
        let tiles_dir = dir.path().join(TILES_DIR);
        fs::create_dir_all(&tiles_dir)?;
        write_edge_csv(edges, &edges_csv)?;
        debug!("Wrote {} edges to {}", edges.len(), edges_csv.display());

        Ok(Self {
            dir,
            edges_csv,
            tiles_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn edges_csv(&self) -> &Path {
        &self.edges_csv
    }

    pub fn tiles_dir(&self) -> &Path {
        &self.tiles_dir
    }

    /// Run the tile builder; any unsuccessful exit is fatal
    pub async fn build<R: ProcessRunner>(
        &self,
        builder: &TileBuilderConfig,
        runner: &R,
    ) -> Result<()> {
        let args = builder.args(self.path(), &self.edges_csv, &self.tiles_dir);
        info!("Building tiles with {} ({})", builder.tool, builder.image);
        let outcome = runner.run(&builder.program, &args).await?;
        if !outcome.success() {
            return Err(Error::TileBuildFailed { code: outcome.code });
        }
        Ok(())
    }

    /// Zip the tile tree onto `output`, returning the number of files archived
    pub fn package(&self, output: &Path) -> Result<usize> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staging = NamedTempFile::new_in(parent)?;

        let mut zip = ZipWriter::new(staging.reopen()?);
        let files = add_directory(&mut zip, &self.tiles_dir, "")?;
        zip.finish().map_err(archive_error)?;

        if files == 0 {
            return Err(Error::ExternalProcess {
                program: "tile builder".to_string(),
                message: format!("no tiles were produced in {}", self.tiles_dir.display()),
            });
        }

        staging
            .persist(output)
            .map_err(|e| Error::IoError(e.error))?;
        Ok(files)
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
}

fn archive_error(e: zip::result::ZipError) -> Error {
    Error::Archive(e.to_string())
}

/// Recursively add `dir` under `prefix`, in name order
fn add_directory(zip: &mut ZipWriter<File>, dir: &Path, prefix: &str) -> Result<usize> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut files = 0;
    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            zip.add_directory(format!("{name}/"), entry_options())
                .map_err(archive_error)?;
            files += add_directory(zip, &path, &format!("{name}/"))?;
        } else {
            zip.start_file(name, entry_options()).map_err(archive_error)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, zip)?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges() -> Vec<EdgeRecord> {
        vec![
            EdgeRecord {
                id: 1,
                source: 10,
                target: 20,
                cost: 1.5,
                geometry: "LINESTRING(0 0,1 1)".to_string(),
            },
            EdgeRecord {
                id: 2,
                source: 20,
                target: 30,
                cost: 2.0,
                geometry: "LINESTRING(1 1,2 2)".to_string(),
            },
        ]
    }

    #[test]
    fn test_edge_csv_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        write_edge_csv(&edges(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "source,target,cost\n10,20,1.5\n20,30,2.0\n");
    }

    #[test]
    fn test_empty_edge_csv_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.csv");
        write_edge_csv(&[], &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "source,target,cost\n");
    }

    #[test]
    fn test_workspace_layout() {
        let workspace = TileWorkspace::prepare(&edges()).unwrap();
        assert!(workspace.edges_csv().exists());
        assert!(workspace.tiles_dir().is_dir());
        assert!(workspace.edges_csv().starts_with(workspace.path()));

        let root = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_package_nested_tiles() {
        let workspace = TileWorkspace::prepare(&edges()).unwrap();
        let level = workspace.tiles_dir().join("2").join("000");
        fs::create_dir_all(&level).unwrap();
        fs::write(level.join("123.gph"), b"tile").unwrap();
        fs::write(workspace.tiles_dir().join("config.json"), b"{}").unwrap();

        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("aoi.zip");
        assert_eq!(workspace.package(&archive).unwrap(), 2);

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["2/", "2/000/", "2/000/123.gph", "config.json"]);
    }

    #[test]
    fn test_package_without_tiles_leaves_no_file() {
        let workspace = TileWorkspace::prepare(&edges()).unwrap();
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("aoi.zip");

        assert!(workspace.package(&archive).is_err());
        assert!(!archive.exists());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
