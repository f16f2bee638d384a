use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geostamp::config::{self, Config};
use geostamp::exif;
use geostamp::generator::{self, ImageGenerating, ImageGenerator};
use geostamp::model::{
    CanvasSize, Coordinate, GenerationParams, ImageMetadata, ImagesCountRange, MapPoint,
};
use geostamp::pipeline::{self, PointBatch};

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser, Debug)]
#[command(
    name = "geostamp",
    version,
    about = "Generate placeholder JPEG images stamped with GPS and EXIF capture metadata"
)]
struct Cli {
    /// Location to generate images for, as LAT,LON (repeatable)
    #[arg(
        long = "point",
        value_name = "LAT,LON",
        value_parser = parse_point,
        allow_hyphen_values = true
    )]
    points: Vec<Coordinate>,

    /// JSON file with an array of {"latitude": .., "longitude": ..} objects
    #[arg(long = "points", value_name = "FILE")]
    points_file: Option<PathBuf>,

    /// Capture time of the first image (default: now)
    #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS")]
    date: Option<String>,

    /// IANA time zone for --date and the embedded stamps (default: config, then system)
    #[arg(long, value_name = "ZONE")]
    tz: Option<String>,

    /// Images per point, all with the same timestamp
    #[arg(long, conflicts_with = "range")]
    count: Option<usize>,

    /// Random images per point with time advancing between them: low, medium or high
    #[arg(long, value_name = "RANGE")]
    range: Option<ImagesCountRange>,

    /// Square canvas side in pixels (overrides config)
    #[arg(long, value_name = "PX")]
    size: Option<u32>,

    /// Output directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Generate without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the embedded GPS/EXIF fields of existing JPEGs and exit
    #[arg(long, value_name = "FILE", num_args = 1..)]
    show: Vec<PathBuf>,
}

fn parse_point(s: &str) -> Result<Coordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{s}'"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude '{lat}': {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude '{lon}': {e}"))?;
    Coordinate::new(lat, lon).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Handle --show
    if !cli.show.is_empty() {
        let mut shown = Vec::new();
        for path in &cli.show {
            let embedded = exif::read_embedded_file(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if cli.json {
                shown.push(embedded_json(path, &embedded));
            } else {
                print_embedded(path, &embedded);
            }
        }
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        return Ok(());
    }

    // Load config and apply overrides
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if let Some(ref dir) = cli.output {
        config.output.directory = dir.clone();
    }
    if let Some(side) = cli.size {
        config.generation.canvas_width = side;
        config.generation.canvas_height = side;
    }
    if let Some(range) = cli.range {
        config.batch.count_range = range;
    }

    let points = collect_points(&cli)?;
    if points.is_empty() {
        anyhow::bail!("No points specified. Use --point LAT,LON or --points FILE (see --help).");
    }

    let tz = match cli.tz.as_deref() {
        Some(name) => Some(config::parse_time_zone(name)?),
        None => config.time_zone()?,
    };

    match tz {
        Some(tz) => run(&cli, &config, points, tz).await,
        None => run(&cli, &config, points, Local).await,
    }
}

fn collect_points(cli: &Cli) -> Result<Vec<MapPoint>> {
    let mut coordinates = cli.points.clone();

    if let Some(ref file) = cli.points_file {
        let contents = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read points file {}", file.display()))?;
        let from_file: Vec<Coordinate> =
            serde_json::from_str(&contents).context("Failed to parse points file")?;
        log::debug!("Loaded {} point(s) from {}", from_file.len(), file.display());
        coordinates.extend(from_file);
    }

    Ok(coordinates.into_iter().map(MapPoint::new).collect())
}

async fn run<Tz>(cli: &Cli, config: &Config, points: Vec<MapPoint>, tz: Tz) -> Result<()>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Display,
{
    let first_date = match cli.date.as_deref() {
        Some(s) => {
            let naive = NaiveDateTime::parse_from_str(s, DATE_INPUT_FORMAT)
                .with_context(|| format!("Invalid --date '{s}', expected {DATE_INPUT_FORMAT}"))?;
            tz.from_local_datetime(&naive)
                .earliest()
                .with_context(|| format!("{s} does not exist in the selected time zone"))?
                .with_timezone(&Utc)
        }
        None => Utc::now(),
    };

    let mut image_generator = ImageGenerator::new().with_time_zone(tz);
    if let Some(color) = config.generation.color {
        image_generator = image_generator.with_color(color);
    }
    let image_generator: Arc<dyn ImageGenerating> = Arc::new(image_generator);

    let size = config.canvas_size()?;
    log::info!(
        "Generating for {} point(s) at {}x{}",
        points.len(),
        size.width(),
        size.height()
    );
    if config.output.dry_run {
        log::info!("DRY RUN: no files will be written");
    }

    let batches = if cli.range.is_some() {
        let plan = config.batch_plan(first_date)?;
        log::info!(
            "Batch mode: {} image(s) per point, {}..{} min apart",
            plan.count_range.title(),
            plan.min_offset.num_minutes(),
            plan.max_offset.num_minutes()
        );
        tokio::task::spawn_blocking(move || {
            pipeline::generate_for_points(&*image_generator, &points, &plan, &mut rand::rng())
        })
        .await?
    } else {
        let count = cli.count.unwrap_or(config.generation.count);
        generate_single(image_generator, points, count, size, first_date).await?
    };

    let mut report = Vec::new();
    let total = batches.len();
    for (i, batch) in batches.iter().enumerate() {
        let fallback = batch.images.iter().filter(|img| !img.metadata_embedded).count();
        log::info!(
            "[{}/{}] ({:.6}, {:.6}): {} image(s)",
            i + 1,
            total,
            batch.coordinate.latitude(),
            batch.coordinate.longitude(),
            batch.images.len()
        );
        if fallback > 0 {
            log::warn!("  {fallback} image(s) saved without GPS/EXIF metadata");
        }
        if let Some(ref err) = batch.error {
            log::error!("  Error: {err}");
        }

        let paths = if config.output.dry_run {
            Vec::new()
        } else {
            pipeline::save_images(&config.output.directory, &batch.images)?
        };
        for path in &paths {
            log::info!("  Saved: {}", path.display());
        }

        if cli.json {
            report.push(batch_json(batch, &paths)?);
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let images: usize = batches.iter().map(|b| b.images.len()).sum();
    let failed = batches.iter().filter(|b| b.error.is_some()).count();
    log::info!("Done: {images} image(s) for {total} point(s), {failed} point(s) with errors");

    Ok(())
}

/// One `count`-image generation per point, all at `date`.
async fn generate_single(
    image_generator: Arc<dyn ImageGenerating>,
    points: Vec<MapPoint>,
    count: usize,
    size: CanvasSize,
    date: chrono::DateTime<Utc>,
) -> Result<Vec<PointBatch>> {
    let mut batches = Vec::with_capacity(points.len());

    for point in points {
        let metadata = ImageMetadata::new(point.coordinate, date);
        let params = GenerationParams::new(count, size, metadata, Some(point.id))?;
        let result = generator::generate_async(image_generator.clone(), params).await;
        let (images, error) = match result {
            Ok(images) => (images, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        batches.push(PointBatch {
            point_id: point.id,
            coordinate: point.coordinate,
            images,
            error,
        });
    }

    Ok(batches)
}

/// The batch's own serialized form, plus a summary of each image and where
/// it was saved.
fn batch_json(batch: &PointBatch, paths: &[PathBuf]) -> Result<serde_json::Value> {
    let images: Vec<serde_json::Value> = batch
        .images
        .iter()
        .enumerate()
        .map(|(i, img)| {
            serde_json::json!({
                "id": img.id,
                "date": img.date,
                "metadata_embedded": img.metadata_embedded,
                "bytes": img.jpeg_data.len(),
                "path": paths.get(i).map(|p| p.display().to_string()),
            })
        })
        .collect();

    let mut value = serde_json::to_value(batch).context("Failed to serialize batch")?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("images".into(), images.into());
    }
    Ok(value)
}

fn embedded_json(path: &Path, embedded: &exif::EmbeddedMetadata) -> serde_json::Value {
    serde_json::json!({
        "path": path.display().to_string(),
        "gps": embedded.gps.as_ref().map(|gps| serde_json::json!({
            "latitude_ref": gps.latitude_ref.to_string(),
            "latitude": gps.latitude,
            "longitude_ref": gps.longitude_ref.to_string(),
            "longitude": gps.longitude,
            "altitude_ref": gps.altitude_ref,
            "time_stamp": gps.time_stamp,
            "date_stamp": gps.date_stamp,
        })),
        "exif": embedded.exif.as_ref().map(|exif| serde_json::json!({
            "date_time_original": exif.date_time_original,
            "date_time_digitized": exif.date_time_digitized,
        })),
    })
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the embedded GPS/EXIF fields of one file, organized by IFD.
fn print_embedded(path: &Path, embedded: &exif::EmbeddedMetadata) {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    if let Some(ref gps) = embedded.gps {
        println!("  {BOLD}GPS{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        print_row("GPSLatitudeRef", &gps.latitude_ref.to_string());
        print_row("GPSLatitude", &format!("{:.6}", gps.latitude));
        print_row("GPSLongitudeRef", &gps.longitude_ref.to_string());
        print_row("GPSLongitude", &format!("{:.6}", gps.longitude));
        print_row("GPSAltitudeRef", &gps.altitude_ref.to_string());
        print_row("GPSTimeStamp", &gps.time_stamp);
        print_row("GPSDateStamp", &gps.date_stamp);
        println!();
    } else if embedded.has_gps_ifd {
        println!("  {DIM}(GPS IFD present but incomplete){RESET}");
    }

    if let Some(ref exif) = embedded.exif {
        println!("  {BOLD}EXIF{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        print_row("DateTimeOriginal", &exif.date_time_original);
        print_row("DateTimeDigitized", &exif.date_time_digitized);
        println!();
    } else if embedded.has_exif_ifd {
        println!("  {DIM}(EXIF IFD present but incomplete){RESET}");
    }

    if embedded.is_empty() {
        println!("  {DIM}(no GPS/EXIF metadata found){RESET}");
        println!();
    }
}

/// Print a single row in the metadata table.
fn print_row(tag: &str, val: &str) {
    println!("  {:<22} : {val}", tag);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_point_accepts_signed_pairs() {
        let c = parse_point("-33.87, -151.21").unwrap();
        assert_eq!((c.latitude(), c.longitude()), (-33.87, -151.21));
    }

    #[test]
    fn parse_point_rejects_bad_input() {
        assert!(parse_point("49.8").is_err());
        assert!(parse_point("north,east").is_err());
        assert!(parse_point("91,0").is_err());
    }

    #[test]
    fn cli_parses_batch_flags() {
        let cli = Cli::try_parse_from([
            "geostamp",
            "--point",
            "-33.87,151.21",
            "--point=49.8397,24.0297",
            "--range",
            "high",
            "--tz",
            "Europe/Kyiv",
        ])
        .unwrap();
        assert_eq!(cli.points.len(), 2);
        assert_eq!(cli.range, Some(ImagesCountRange::High));
        assert_eq!(cli.tz.as_deref(), Some("Europe/Kyiv"));
    }

    #[test]
    fn count_conflicts_with_range() {
        assert!(Cli::try_parse_from(["geostamp", "--count", "2", "--range", "low"]).is_err());
    }

    #[test]
    fn batch_json_adds_saved_paths_to_batch_fields() {
        let size = CanvasSize::square(2).unwrap();
        let fixed =
            generator::FixedImageGenerator::new(size, geostamp::raster::FlatColor::Red).unwrap();
        let point = MapPoint::new(Coordinate::new(-33.87, 151.21).unwrap());
        let metadata = ImageMetadata::new(point.coordinate, Utc::now());
        let params = GenerationParams::new(2, size, metadata, Some(point.id)).unwrap();
        let batch = PointBatch {
            point_id: point.id,
            coordinate: point.coordinate,
            images: fixed.generate(params).unwrap(),
            error: Some("one failed".into()),
        };
        let paths = vec![PathBuf::from("out/a.jpg")];

        let value = batch_json(&batch, &paths).unwrap();
        assert_eq!(value["point_id"], point.id.to_string());
        assert_eq!(value["coordinate"]["latitude"], -33.87);
        assert_eq!(value["error"], "one failed");
        let images = value["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["path"], "out/a.jpg");
        assert!(images[1]["path"].is_null());
    }
}
