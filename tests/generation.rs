use chrono::{FixedOffset, TimeZone, Utc};
use geostamp::config::Config;
use geostamp::exif::{LatitudeRef, LongitudeRef, read_embedded, read_embedded_file};
use geostamp::generator::{FixedImageGenerator, ImageGenerating, ImageGenerator, generate_async};
use geostamp::model::{CanvasSize, Coordinate, GenerationParams, ImageMetadata, MapPoint};
use geostamp::pipeline::{generate_for_points, save_images};
use geostamp::raster::FlatColor;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn sydney_images_round_trip_through_disk() {
    let tz = FixedOffset::east_opt(11 * 3600).unwrap();
    let taken = tz.with_ymd_and_hms(2024, 1, 20, 8, 15, 42).unwrap().with_timezone(&Utc);
    let metadata = ImageMetadata::new(Coordinate::new(-33.87, -151.21).unwrap(), taken);
    let params =
        GenerationParams::new(3, CanvasSize::new(40, 30).unwrap(), metadata, None).unwrap();

    let images = ImageGenerator::new().with_time_zone(tz).generate(params).unwrap();
    assert_eq!(images.len(), 3);

    let dir = TempDir::new().unwrap();
    let paths = save_images(dir.path(), &images).unwrap();

    for path in &paths {
        let embedded = read_embedded_file(path).unwrap();
        let gps = embedded.gps.unwrap();
        assert_eq!(gps.latitude_ref, LatitudeRef::South);
        assert_eq!(gps.longitude_ref, LongitudeRef::West);
        assert!((gps.latitude - 33.87).abs() < 1e-6);
        assert!((gps.longitude - 151.21).abs() < 1e-6);
        assert_eq!(gps.time_stamp, "08:15:42");
        assert_eq!(gps.date_stamp, "2024:01:20");

        let exif = embedded.exif.unwrap();
        assert_eq!(exif.date_time_original, "2024:01:20 08:15:42");
        assert_eq!(exif.date_time_original, exif.date_time_digitized);
    }
}

#[test]
fn config_driven_batch() {
    let mut config = Config::default();
    config.generation.canvas_width = 12;
    config.generation.canvas_height = 12;
    config.generation.color = Some(FlatColor::Purple);
    config.batch.min_offset_minutes = 1;
    config.batch.max_offset_minutes = 1;

    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
    let plan = config.batch_plan(start).unwrap();
    let generator = ImageGenerator::new()
        .with_time_zone(Utc)
        .with_color(FlatColor::Purple);
    let points = vec![
        MapPoint::new(Coordinate::new(0.0, 0.0).unwrap()),
        MapPoint::new(Coordinate::new(51.5, -0.12).unwrap()),
    ];

    let batches = generate_for_points(&generator, &points, &plan, &mut StdRng::seed_from_u64(11));
    let images: Vec<_> = batches.iter().flat_map(|b| &b.images).collect();
    assert!(images.len() >= 2);

    // Fixed one-minute spacing across points.
    for (i, image) in images.iter().enumerate() {
        assert_eq!(image.date, start + chrono::TimeDelta::minutes(i as i64));
        let gps = read_embedded(&image.jpeg_data).unwrap().gps.unwrap();
        assert_eq!(gps.time_stamp, image.date.format("%H:%M:%S").to_string());
    }
}

#[tokio::test]
async fn test_double_through_async_entry_point() {
    let generator: Arc<dyn ImageGenerating> = Arc::new(
        FixedImageGenerator::new(CanvasSize::square(3).unwrap(), FlatColor::Green).unwrap(),
    );
    let metadata = ImageMetadata::new(Coordinate::new(1.0, 1.0).unwrap(), Utc::now());
    let params = GenerationParams::new(4, CanvasSize::square(3).unwrap(), metadata, None).unwrap();

    let images = generate_async(generator, params).await.unwrap();
    assert_eq!(images.len(), 4);
    assert!(images.iter().all(|i| read_embedded(&i.jpeg_data).unwrap().is_empty()));
}
