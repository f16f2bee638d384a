//! Image generation orchestration.
//!
//! [`ImageGenerating`] is the seam callers depend on. [`ImageGenerator`] is the
//! real implementation (raster, metadata blocks, encoder, fallback) and
//! [`FixedImageGenerator`] is a deterministic stand-in for tests.

use chrono::{Local, TimeZone};
use image::{ImageFormat, RgbImage};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EncodingError, GenerationError};
use crate::exif::{
    ExifFields, GpsFields, JpegMetadataEncoder, MetadataEncoder, build_exif_block, build_gps_block,
};
use crate::model::{CanvasSize, GeneratedImage, GenerationParams};
use crate::raster::{FlatColor, make_blank_image};

/// Something that can turn [`GenerationParams`] into finished images.
pub trait ImageGenerating: Send + Sync {
    /// Run `params.count()` independent attempts.
    ///
    /// Returns every image whose raster could be serialized, in attempt
    /// order. Fails with [`GenerationError::NoOutputProduced`] only when no
    /// attempt got that far.
    fn generate(&self, params: GenerationParams) -> Result<Vec<GeneratedImage>, GenerationError>;
}

/// Generates solid-color JPEGs with GPS/EXIF metadata injected.
///
/// Timestamps are rendered in `Tz` (the system zone by default).
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use geostamp::generator::{ImageGenerating, ImageGenerator};
/// use geostamp::model::{CanvasSize, Coordinate, GenerationParams, ImageMetadata};
///
/// let generator = ImageGenerator::new().with_time_zone(Utc);
/// let metadata = ImageMetadata::new(
///     Coordinate::new(49.8397, 24.0297).unwrap(),
///     Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap(),
/// );
/// let params = GenerationParams::new(2, CanvasSize::square(64).unwrap(), metadata, None).unwrap();
///
/// let images = generator.generate(params).unwrap();
/// assert_eq!(images.len(), 2);
/// ```
pub struct ImageGenerator<Tz = Local> {
    encoder: Box<dyn MetadataEncoder>,
    tz: Tz,
    color: Option<FlatColor>,
}

impl ImageGenerator<Local> {
    pub fn new() -> Self {
        Self {
            encoder: Box::new(JpegMetadataEncoder::new()),
            tz: Local,
            color: None,
        }
    }
}

impl Default for ImageGenerator<Local> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz> ImageGenerator<Tz> {
    /// Render GPS/EXIF timestamps in `tz` instead.
    pub fn with_time_zone<T>(self, tz: T) -> ImageGenerator<T> {
        ImageGenerator {
            encoder: self.encoder,
            tz,
            color: self.color,
        }
    }

    pub fn with_encoder(mut self, encoder: Box<dyn MetadataEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Fill every image with `color` instead of a random palette entry.
    pub fn with_color(mut self, color: FlatColor) -> Self {
        self.color = Some(color);
        self
    }
}

impl<Tz> ImageGenerator<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: fmt::Display,
{
    fn attempt(
        &self,
        index: usize,
        params: &GenerationParams,
        gps: &GpsFields,
        exif: &ExifFields,
    ) -> Result<GeneratedImage, EncodingError> {
        let color = self.color.unwrap_or_else(FlatColor::random);
        log::debug!("Attempt {index}: {color:?} canvas {:?}", params.size());

        let raster = make_blank_image(params.size(), color)?;
        let baseline = self.encoder.serialize_baseline(&raster)?;

        let (jpeg_data, metadata_embedded) = match self.encoder.embed(&baseline, gps, exif) {
            Ok(bytes) => (bytes, true),
            Err(e) if e.allows_fallback() => {
                log::warn!("Attempt {index}: keeping JPEG without metadata: {e}");
                (baseline, false)
            }
            Err(e) => return Err(e),
        };

        let raster = match image::load_from_memory_with_format(&jpeg_data, ImageFormat::Jpeg) {
            Ok(decoded) => decoded.into_rgb8(),
            Err(e) => {
                log::debug!("Attempt {index}: output did not decode, keeping source raster: {e}");
                raster
            }
        };

        Ok(GeneratedImage {
            id: Uuid::new_v4(),
            raster,
            jpeg_data,
            group_id: params.group_id(),
            date: params.metadata().date,
            metadata_embedded,
        })
    }
}

impl<Tz> ImageGenerating for ImageGenerator<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: fmt::Display,
{
    fn generate(&self, params: GenerationParams) -> Result<Vec<GeneratedImage>, GenerationError> {
        let metadata = params.metadata();
        let gps = build_gps_block(&metadata.coordinate, &metadata.date, &self.tz);
        let exif = build_exif_block(&metadata.date, &self.tz);

        let results: Vec<Result<GeneratedImage, EncodingError>> = (0..params.count())
            .into_par_iter()
            .map(|i| self.attempt(i, &params, &gps, &exif))
            .collect();

        let mut images = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(image) => images.push(image),
                Err(e) => {
                    log::warn!("Attempt {i} dropped: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) if images.is_empty() => Err(GenerationError::NoOutputProduced {
                attempts: params.count(),
                source,
            }),
            _ => Ok(images),
        }
    }
}

/// Returns copies of one pre-encoded image without any metadata.
///
/// Ids are `1..=count` so results are identical across runs. The canvas size
/// in the params is ignored in favor of the one given at construction.
#[derive(Debug, Clone)]
pub struct FixedImageGenerator {
    raster: RgbImage,
    jpeg_data: Vec<u8>,
}

impl FixedImageGenerator {
    pub fn new(size: CanvasSize, color: FlatColor) -> Result<Self, EncodingError> {
        let raster = make_blank_image(size, color)?;
        let jpeg_data = JpegMetadataEncoder::new().serialize_baseline(&raster)?;
        Ok(Self { raster, jpeg_data })
    }
}

impl ImageGenerating for FixedImageGenerator {
    fn generate(&self, params: GenerationParams) -> Result<Vec<GeneratedImage>, GenerationError> {
        Ok((1..=params.count())
            .map(|i| GeneratedImage {
                id: Uuid::from_u128(i as u128),
                raster: self.raster.clone(),
                jpeg_data: self.jpeg_data.clone(),
                group_id: params.group_id(),
                date: params.metadata().date,
                metadata_embedded: false,
            })
            .collect())
    }
}

/// Run a generation on tokio's blocking pool.
pub async fn generate_async(
    generator: Arc<dyn ImageGenerating>,
    params: GenerationParams,
) -> Result<Vec<GeneratedImage>, GenerationError> {
    tokio::task::spawn_blocking(move || generator.generate(params))
        .await
        .map_err(|e| GenerationError::TaskFailed(e.to_string()))?
}
