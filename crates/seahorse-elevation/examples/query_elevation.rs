//! Example: Fetch elevation for one location from The National Map.
//!
//! Usage: cargo run --example query_elevation -- <lon> <lat> [cache_dir]

use seahorse_elevation::{AccessorConfig, ElevationAccessor, Point, Points};
use std::env;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <lon> <lat> [cache_dir]", args[0]);
        eprintln!("Example: {} -122.3321 47.6062 ./dem_cache", args[0]);
        std::process::exit(1);
    }

    let lon: f64 = args[1].parse().expect("Invalid longitude");
    let lat: f64 = args[2].parse().expect("Invalid latitude");

    let mut config = AccessorConfig::default();
    if let Some(dir) = args.get(3) {
        config.cache_dir = PathBuf::from(dir);
    }

    let mut points: Points = vec![Point::new(1, lon, lat)].into();

    println!("Querying catalog for ({}, {})...", lon, lat);
    let start = Instant::now();
    let mut accessor =
        ElevationAccessor::connect(&config, &points).expect("Failed to query catalog");
    println!(
        "{} catalog items, {} cached tiles ({:.2}s)",
        accessor.query_result().items.len(),
        accessor.cache_index().len(),
        start.elapsed().as_secs_f64()
    );

    let start = Instant::now();
    match accessor.get_elevation(&mut points) {
        Ok(summary) => {
            match points[0].elevation {
                Some(elevation) => println!("Elevation: {:.2} meters", elevation),
                None => println!("No elevation data at this location"),
            }
            println!(
                "{} tiles downloaded in {:.2}s",
                summary.tiles_downloaded,
                start.elapsed().as_secs_f64()
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
