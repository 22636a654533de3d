//! seahorse: ground elevation for point records.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use seahorse_elevation::{
    AccessorConfig, BoundingBox, CatalogClient, ElevationAccessor, NationalMapClient, Points,
    QueryFilter, TileCache,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "seahorse")]
#[command(author, version, about = "Elevation lookup from USGS National Map tiles", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tile cache directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fill in elevation for a JSON array of points
    Elevate {
        /// Input points: `[{"id": 1, "x": -122.3, "y": 47.6}, ...]`
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Maximum concurrent downloads
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List catalog items for a region or a tile name
    Query(QueryArgs),
    /// List tiles in the local cache
    Cache,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct QueryArgs {
    /// Bounding box as minX,minY,maxX,maxY
    #[arg(long, value_name = "BBOX", allow_hyphen_values = true)]
    bbox: Option<String>,

    /// Free-text name token, e.g. n48w123
    #[arg(long)]
    name: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }

    match cli.command {
        Commands::Elevate {
            input,
            output,
            concurrency,
        } => {
            if let Some(n) = concurrency {
                config.download_concurrency = n;
            }
            elevate(&config, &input, output.as_deref())
        }
        Commands::Query(args) => query(&config, &args),
        Commands::Cache => list_cache(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<AccessorConfig> {
    match path {
        Some(path) => AccessorConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AccessorConfig::default()),
    }
}

fn elevate(config: &AccessorConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let json = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut points: Points = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse points from {}", input.display()))?;
    info!(points = points.len(), input = %input.display(), "Loaded points");

    let start = Instant::now();
    let mut accessor = ElevationAccessor::connect(config, &points)?;
    let summary = accessor.get_elevation(&mut points)?;
    let stats = accessor.download_stats();
    info!(
        bytes = stats.bytes_downloaded,
        elapsed = ?start.elapsed(),
        "Done"
    );

    let rendered = serde_json::to_string_pretty(&points)?;
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }

    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn query(config: &AccessorConfig, args: &QueryArgs) -> Result<()> {
    let filter = match (&args.bbox, &args.name) {
        (Some(bbox), _) => QueryFilter::BoundingBox(parse_bbox(bbox)?),
        (None, Some(name)) => QueryFilter::Name(name.clone()),
        (None, None) => bail!("either --bbox or --name is required"),
    };

    let client = NationalMapClient::new(config)?;
    let result = client.query(&filter)?;
    info!(total = result.total, items = result.items.len(), "Catalog answered");

    println!("{}", serde_json::to_string_pretty(&result.items)?);
    Ok(())
}

/// Parse `minX,minY,maxX,maxY`, the catalog's own order.
fn parse_bbox(text: &str) -> Result<BoundingBox> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid bounding box {text:?}"))?;

    let [min_x, min_y, max_x, max_y] = values[..] else {
        bail!("Bounding box needs 4 values, got {}", values.len());
    };
    if min_x > max_x || min_y > max_y {
        bail!("Bounding box {text:?} has min greater than max");
    }
    Ok(BoundingBox::new(min_x, max_x, min_y, max_y))
}

fn list_cache(config: &AccessorConfig) -> Result<()> {
    let cache = TileCache::open(&config.cache_dir)?;
    let entries = cache.list()?;

    for entry in &entries {
        let size = fs::metadata(entry.path()).map(|m| m.len()).unwrap_or(0);
        println!("{:>12}  {}", size, entry.name);
    }
    info!(dir = %cache.dir().display(), tiles = entries.len(), "Cache listed");
    Ok(())
}
