//! # aoi-slice-radius CLI
//!
//! Exports every road edge within a geodesic radius of a point as GraphML.

use std::path::PathBuf;

use clap::Parser;
use log::error;

use aoi_slice::cli::{self, CommonArgs, ProgressManager};
use aoi_slice::{AreaOfInterest, Budget, Coordinate, ExportConfig, ExportOptions, Profile, RadiusRequest};

/// Command-line interface for aoi-slice-radius
#[derive(Parser, Debug)]
#[command(name = "aoi-slice-radius")]
#[command(about = "Export the road network within a radius of a point")]
#[command(long_about = "Exports every edge within a geodesic distance of a point:
  aoi-slice-radius --lon -93.63 --lat 41.59               # 10 km, aoi.graphml
  aoi-slice-radius --lon -93.63 --lat 41.59 --radius 2.5  # 2.5 km

Node identifiers are derived from the edge endpoint geometry.")]
#[command(version = env!("AOI_SLICE_VERSION"))]
struct Cli {
    /// Longitude of the point of interest (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Latitude of the point of interest (WGS84)
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Radius in kilometers
    #[arg(long, default_value_t = 10.0)]
    radius: f64,

    /// Output GraphML file
    #[arg(long, default_value = "aoi.graphml")]
    outfile: PathBuf,

    /// Cost profile: default, car, bike or foot
    #[arg(long, default_value = "default")]
    profile: Profile,

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
        eprintln!("🧭 aoi-slice-radius v{} starting...", env!("AOI_SLICE_VERSION"));
    }

    let origin = Coordinate::new(args.lon, args.lat)?;
    let budget = Budget::radius_km(args.radius)?;
    let database = args.common.database()?;

    let request = RadiusRequest {
        aoi: AreaOfInterest::new(origin, budget),
        profile: args.profile,
        output: args.outfile,
    };

    eprintln!("🗄️  Database: {}", database.redacted());
    let progress = ProgressManager::new(&format!(
        "🗺️  Slicing {budget} around {origin} ({} profile)",
        request.profile
    ));
    let options = ExportOptions {
        progress: Some(progress.stage_callback()),
    };

    let result =
        aoi_slice::export_radius_with_options(&database, ExportConfig::default(), &request, options)
            .await;
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
        let cli = Cli::try_parse_from(["aoi-slice-radius", "--lon", "-93.63", "--lat", "41.59"]).unwrap();
        assert_eq!(cli.radius, 10.0);
        assert_eq!(cli.outfile, PathBuf::from("aoi.graphml"));
        assert_eq!(cli.profile, Profile::Default);
    }
}
