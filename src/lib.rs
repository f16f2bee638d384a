//! # geostamp
//!
//! Generate placeholder JPEG images stamped with GPS position and capture
//! time, for filling a photo library with test data tied to map locations.
//!
//! ## Quick Start
//!
//! The generator turns one coordinate and timestamp into `count` images:
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use geostamp::generator::{ImageGenerating, ImageGenerator};
//! use geostamp::model::{CanvasSize, Coordinate, GenerationParams, ImageMetadata};
//! use geostamp::pipeline::save_images;
//!
//! fn main() -> anyhow::Result<()> {
//!     let metadata = ImageMetadata::new(Coordinate::new(49.8397, 24.0297)?, Utc::now());
//!     let params = GenerationParams::new(3, CanvasSize::square(512)?, metadata, None)?;
//!
//!     let images = ImageGenerator::new().generate(params)?;
//!     for path in save_images("./generated".as_ref(), &images)? {
//!         println!("Saved: {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Several points
//!
//! [`pipeline::generate_for_points`] walks a list of map points, drawing a
//! random image count per point and moving the capture time forward by a
//! random offset after every image:
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use geostamp::generator::ImageGenerator;
//! use geostamp::model::{CanvasSize, Coordinate, ImagesCountRange, MapPoint};
//! use geostamp::pipeline::{BatchPlan, generate_for_points};
//!
//! # fn main() -> anyhow::Result<()> {
//! let points = vec![
//!     MapPoint::new(Coordinate::new(50.4501, 30.5234)?),
//!     MapPoint::new(Coordinate::new(49.8397, 24.0297)?),
//! ];
//! let plan = BatchPlan {
//!     count_range: ImagesCountRange::Medium,
//!     ..BatchPlan::new(Utc::now(), CanvasSize::square(256)?)
//! };
//!
//! let batches = generate_for_points(&ImageGenerator::new(), &points, &plan, &mut rand::rng());
//! for batch in &batches {
//!     println!("{}: {} image(s)", batch.point_id, batch.images.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Embedded fields
//!
//! - **GPS IFD**: GPSLatitudeRef, GPSLatitude, GPSLongitudeRef, GPSLongitude,
//!   GPSAltitudeRef, GPSTimeStamp, GPSDateStamp
//! - **EXIF IFD**: DateTimeOriginal, DateTimeDigitized
//!
//! When injection fails the image is still returned, as a plain JPEG with
//! [`GeneratedImage::metadata_embedded`](model::GeneratedImage::metadata_embedded)
//! set to `false`.
//!
//! ## Modules
//!
//! - [`config`]: Configuration types and loading/saving
//! - [`error`]: Error types
//! - [`exif`]: GPS/EXIF field building, injection and read-back
//! - [`generator`]: The image generator and its test double
//! - [`model`]: Coordinates, parameters and generated images
//! - [`pipeline`]: Multi-point batches and saving to disk
//! - [`raster`]: Solid-color canvases

pub mod config;
pub mod error;
pub mod exif;
pub mod generator;
pub mod model;
pub mod pipeline;
pub mod raster;
