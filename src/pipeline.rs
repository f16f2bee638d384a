use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::generator::ImageGenerating;
use crate::model::{
    CanvasSize, Coordinate, GeneratedImage, GenerationParams, ImageMetadata, ImagesCountRange,
    MapPoint,
};

/// File name timestamp, e.g. `IMG_20240315_123000_1a2b3c4d.jpg`.
const FILE_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How to spread generated images over several points and over time.
///
/// The cursor starts at `first_date`; after every image it moves forward by a
/// random offset in `[min_offset, max_offset]`.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeDelta, Utc};
/// use geostamp::model::{CanvasSize, ImagesCountRange};
/// use geostamp::pipeline::BatchPlan;
///
/// let plan = BatchPlan {
///     count_range: ImagesCountRange::Medium,
///     max_offset: TimeDelta::hours(2),
///     ..BatchPlan::new(Utc::now(), CanvasSize::square(256).unwrap())
/// };
/// assert_eq!(plan.min_offset, TimeDelta::minutes(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub first_date: DateTime<Utc>,
    pub count_range: ImagesCountRange,
    pub min_offset: TimeDelta,
    pub max_offset: TimeDelta,
    pub size: CanvasSize,
}

impl BatchPlan {
    /// A plan with the `low` count range and 5 to 60 minute offsets.
    pub fn new(first_date: DateTime<Utc>, size: CanvasSize) -> Self {
        Self {
            first_date,
            count_range: ImagesCountRange::default(),
            min_offset: TimeDelta::minutes(5),
            max_offset: TimeDelta::minutes(60),
            size,
        }
    }

    fn next_offset<R: Rng>(&self, rng: &mut R) -> TimeDelta {
        let lo = self.min_offset.min(self.max_offset).num_seconds();
        let hi = self.min_offset.max(self.max_offset).num_seconds();
        TimeDelta::seconds(rng.random_range(lo..=hi))
    }
}

/// Everything generated for one [`MapPoint`].
#[derive(Debug, Serialize)]
pub struct PointBatch {
    pub point_id: Uuid,
    pub coordinate: Coordinate,
    #[serde(skip)]
    pub images: Vec<GeneratedImage>,
    /// Last generation error for this point, if any image could not be made.
    pub error: Option<String>,
}

/// Generate images for each point in order, advancing the capture time
/// between images.
///
/// Each image is a separate `count = 1` generation tagged with the point's id,
/// so a failure only costs that image. The generator never sees more than
/// one timestamp per call. If the capture time runs past the last
/// representable instant, the remaining images are skipped and each affected
/// point's `error` says so.
pub fn generate_for_points<R: Rng>(
    generator: &dyn ImageGenerating,
    points: &[MapPoint],
    plan: &BatchPlan,
    rng: &mut R,
) -> Vec<PointBatch> {
    // `None` once the schedule has run past the last representable instant.
    let mut cursor = Some(plan.first_date);
    let mut batches = Vec::with_capacity(points.len());

    for point in points {
        let count = plan.count_range.sample(rng);
        log::info!(
            "Point {} ({:.4}, {:.4}): {count} image(s)",
            point.id,
            point.coordinate.latitude(),
            point.coordinate.longitude()
        );

        let mut batch = PointBatch {
            point_id: point.id,
            coordinate: point.coordinate,
            images: Vec::with_capacity(count),
            error: None,
        };

        for _ in 0..count {
            let Some(date) = cursor else {
                log::warn!("  Capture time out of range, skipping remaining images");
                batch.error = Some("Capture time is out of range".into());
                break;
            };

            let metadata = ImageMetadata::new(point.coordinate, date);
            let result = GenerationParams::new(1, plan.size, metadata, Some(point.id))
                .map_err(|e| e.to_string())
                .and_then(|params| generator.generate(params).map_err(|e| e.to_string()));

            match result {
                Ok(images) => batch.images.extend(images),
                Err(e) => {
                    log::warn!("  Image at {date} failed: {e}");
                    batch.error = Some(e);
                }
            }
            cursor = date.checked_add_signed(plan.next_offset(rng));
        }

        batches.push(batch);
    }

    batches
}

/// File name an image is saved under.
///
/// The timestamp is the capture time in UTC, whatever zone the embedded
/// fields were rendered in, so names sort by capture time across zones.
pub fn file_name(image: &GeneratedImage) -> String {
    let id = image.id.simple().to_string();
    format!(
        "IMG_{}_{}.jpg",
        image.date.format(FILE_DATE_FORMAT),
        &id[..8]
    )
}

/// Write each image's JPEG bytes into `dir`, creating it if needed.
pub fn save_images(dir: &Path, images: &[GeneratedImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    images
        .iter()
        .map(|image| {
            let path = dir.join(file_name(image));
            std::fs::write(&path, &image.jpeg_data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::debug!("Saved {}", path.display());
            Ok(path)
        })
        .collect()
}
