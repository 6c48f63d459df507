//! # aoi-slice CLI
//!
//! Exports everything reachable from a point within a travel-time budget,
//! as GraphML or as a zip of routing tiles.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::error;

use aoi_slice::cli::{self, CommonArgs, ProgressManager};
use aoi_slice::{
    AreaOfInterest, Budget, Coordinate, ExportConfig, ExportOptions, IsochroneRequest, Profile,
    DEFAULT_BUFFER_TOLERANCE,
};

/// Command-line interface for aoi-slice
#[derive(Parser, Debug)]
#[command(name = "aoi-slice")]
#[command(about = "Export the road network reachable within a travel-time budget")]
#[command(long_about = "Exports the part of a pgRouting network reachable from a point:
  aoi-slice --lon -93.63 --lat 41.59                  # 60 minutes, aoi.graphml
  aoi-slice --lon -93.63 --lat 41.59 --minutes 15     # 15 minutes
  aoi-slice --lon 4.35 --lat 50.85 --profile bike     # cost_bike column
  aoi-slice --lon 4.35 --lat 50.85 --valhalla --outfile tiles.zip

The nearest network node is resolved first; the isochrone around it is
buffered slightly and every edge touching it is exported.")]
#[command(version = env!("AOI_SLICE_VERSION"))]
struct Cli {
    /// Longitude of the point of interest (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Latitude of the point of interest (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Travel-time budget in minutes
    #[arg(long, default_value_t = 60)]
    minutes: u32,

    /// Output file (GraphML, or a zip archive with --valhalla)
    #[arg(long, default_value = "aoi.graphml")]
    outfile: PathBuf,

    /// Cost profile: default, car, bike or foot
    #[arg(long, default_value = "default")]
    profile: Profile,

    /// Build routing tiles with the containerized builder and zip them
    #[arg(long)]
    valhalla: bool,

    /// Buffer around the isochrone polygon, in degrees
    #[arg(long, default_value_t = DEFAULT_BUFFER_TOLERANCE)]
    buffer: f64,

    /// Container image for the tile builder
    #[arg(long)]
    tile_image: Option<String>,

    /// Give up on the tile builder after this many seconds
    #[arg(long)]
    tile_timeout: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e:#}");
        std::process::exit(cli::exit_code(&e));
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();
    cli::init_logging(args.common.verbose);

    if args.common.verbose {
        eprintln!("🧭 aoi-slice v{} starting...", env!("AOI_SLICE_VERSION"));
    }

    let origin = Coordinate::new(args.lon, args.lat)?;
    let database = args.common.database()?;
    let config = export_config(&args);
    config.validate().context("invalid export settings")?;

    let request = IsochroneRequest {
        aoi: AreaOfInterest::new(origin, Budget::Minutes(args.minutes)),
        profile: args.profile,
        output: args.outfile.clone(),
        tiles: args.valhalla,
    };

    eprintln!("🗄️  Database: {}", database.redacted());
    let progress = ProgressManager::new(&format!(
        "🗺️  Slicing {} around {origin} ({} profile)",
        request.aoi.budget, request.profile
    ));
    let options = ExportOptions {
        progress: Some(progress.stage_callback()),
    };

    let result = aoi_slice::export_isochrone_with_options(&database, config, &request, options).await;
    match result {
        Ok(summary) => {
            progress.finish("Export completed");
            cli::report_summary(&summary, args.common.json)
        }
        Err(e) => {
            progress.abandon();
            Err(e.into())
        }
    }
}

fn export_config(args: &Cli) -> ExportConfig {
    let mut config = ExportConfig {
        buffer_tolerance: args.buffer,
        ..Default::default()
    };
    if let Some(image) = &args.tile_image {
        config.tile_builder.image = image.clone();
    }
    config.tile_builder.timeout = args.tile_timeout.map(Duration::from_secs);
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["aoi-slice", "--lon", "-93.63", "--lat", "41.59"]).unwrap();
        assert_eq!(cli.lon, -93.63);
        assert_eq!(cli.minutes, 60);
        assert_eq!(cli.outfile, PathBuf::from("aoi.graphml"));
        assert_eq!(cli.profile, Profile::Default);
        assert!(!cli.valhalla);

        let config = export_config(&cli);
        assert_eq!(config.buffer_tolerance, DEFAULT_BUFFER_TOLERANCE);
        assert_eq!(config.tile_builder.timeout, None);
    }

    #[test]
    fn test_tile_flags() {
        let cli = Cli::try_parse_from([
            "aoi-slice", "--lon", "4.35", "--lat", "50.85", "--valhalla",
            "--tile-image", "valhalla/valhalla:3.4", "--tile-timeout", "600",
            "--profile", "bike",
        ])
        .unwrap();
        assert!(cli.valhalla);
        assert_eq!(cli.profile, Profile::Bike);

        let config = export_config(&cli);
        assert_eq!(config.tile_builder.image, "valhalla/valhalla:3.4");
        assert_eq!(config.tile_builder.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let err = Cli::try_parse_from([
            "aoi-slice", "--lon", "0", "--lat", "0", "--profile", "bicycle",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("bike"));
    }
}
