use chrono::{DateTime, Utc};
use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// A geographic position in decimal degrees.
///
/// Always within `[-90, 90]` / `[-180, 180]`; construction and
/// deserialization both go through [`Coordinate::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ModelError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ModelError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ModelError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ModelError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Pixel dimensions of a generated canvas. Both sides are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Result<Self, ModelError> {
        if width == 0 || height == 0 {
            return Err(ModelError::EmptyCanvas { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn square(side: u32) -> Result<Self, ModelError> {
        Self::new(side, side)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Where and when a generated image claims to have been taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub coordinate: Coordinate,
    pub date: DateTime<Utc>,
}

impl ImageMetadata {
    pub fn new(coordinate: Coordinate, date: DateTime<Utc>) -> Self {
        Self { coordinate, date }
    }
}

/// Input to a single [`generate`](crate::generator::ImageGenerating::generate) call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    count: usize,
    size: CanvasSize,
    metadata: ImageMetadata,
    group_id: Option<Uuid>,
}

impl GenerationParams {
    pub fn new(
        count: usize,
        size: CanvasSize,
        metadata: ImageMetadata,
        group_id: Option<Uuid>,
    ) -> Result<Self, ModelError> {
        if count == 0 {
            return Err(ModelError::ZeroCount);
        }
        Ok(Self {
            count,
            size,
            metadata,
            group_id,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn group_id(&self) -> Option<Uuid> {
        self.group_id
    }
}

/// One finished image, owned by the caller.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub id: Uuid,
    /// Decoded pixels of `jpeg_data`.
    pub raster: RgbImage,
    pub jpeg_data: Vec<u8>,
    pub group_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    /// `false` when GPS/EXIF injection failed and `jpeg_data` is the plain
    /// baseline encoding.
    pub metadata_embedded: bool,
}

/// A user-picked location that groups the images generated for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub id: Uuid,
    pub coordinate: Coordinate,
}

impl MapPoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            id: Uuid::new_v4(),
            coordinate,
        }
    }
}

/// How many images to generate per point in batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagesCountRange {
    #[default]
    Low,
    Medium,
    High,
}

impl ImagesCountRange {
    pub const ALL: [ImagesCountRange; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Low => "1–3",
            Self::Medium => "3–5",
            Self::High => "5–10",
        }
    }

    pub fn bounds(&self) -> (usize, usize) {
        match self {
            Self::Low => (1, 3),
            Self::Medium => (3, 5),
            Self::High => (5, 10),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let (min, max) = self.bounds();
        rng.random_range(min..=max)
    }
}

impl std::str::FromStr for ImagesCountRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown count range '{other}' (expected low, medium or high)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // ── Coordinate ───────────────────────────────────────────────────

    #[test]
    fn coordinate_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(ModelError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -181.0),
            Err(ModelError::LongitudeOutOfRange(-181.0))
        );
    }

    #[test]
    fn coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn coordinate_deserialize_validates() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": 49.8397, "longitude": 24.0297}"#).unwrap();
        assert_eq!(ok.latitude(), 49.8397);

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 120.0, "longitude": 0.0}"#);
        assert!(bad.is_err());
    }

    // ── CanvasSize / GenerationParams ────────────────────────────────

    #[test]
    fn canvas_rejects_zero_side() {
        assert!(CanvasSize::new(0, 10).is_err());
        assert!(CanvasSize::new(10, 0).is_err());
        assert_eq!(CanvasSize::square(100).unwrap().width(), 100);
    }

    #[test]
    fn params_reject_zero_count() {
        let metadata = ImageMetadata::new(Coordinate::new(1.0, 2.0).unwrap(), Utc::now());
        let size = CanvasSize::square(8).unwrap();
        assert_eq!(
            GenerationParams::new(0, size, metadata, None),
            Err(ModelError::ZeroCount)
        );
        assert_eq!(GenerationParams::new(3, size, metadata, None).unwrap().count(), 3);
    }

    // ── ImagesCountRange ─────────────────────────────────────────────

    #[test]
    fn count_range_titles() {
        assert_eq!(ImagesCountRange::Low.title(), "1–3");
        assert_eq!(ImagesCountRange::Medium.title(), "3–5");
        assert_eq!(ImagesCountRange::High.title(), "5–10");
    }

    #[test]
    fn count_range_samples_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for range in ImagesCountRange::ALL {
            let (min, max) = range.bounds();
            for _ in 0..200 {
                let n = range.sample(&mut rng);
                assert!((min..=max).contains(&n), "{n} outside {range:?}");
            }
        }
    }

    #[test]
    fn count_range_from_str() {
        assert_eq!("HIGH".parse::<ImagesCountRange>(), Ok(ImagesCountRange::High));
        assert!("huge".parse::<ImagesCountRange>().is_err());
    }

    #[test]
    fn count_range_serde_lowercase() {
        let json = serde_json::to_string(&ImagesCountRange::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
