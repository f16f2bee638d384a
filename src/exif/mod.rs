//! GPS/EXIF metadata for generated JPEGs.
//!
//! - [`fields`] turns a coordinate and timestamp into the GPS and EXIF blocks
//! - [`MetadataEncoder`] serializes a raster and injects those blocks
//! - [`read_embedded`] reads them back (only the fields written here)
//!
//! The encoder replaces the GPS and EXIF sub-IFDs wholesale and keeps every
//! other top-level field and JPEG segment of its source.

pub mod fields;
mod reader;
mod writer;

pub use fields::{
    ExifFields, GpsFields, LatitudeRef, LongitudeRef, build_exif_block, build_gps_block,
};
pub use reader::{EmbeddedMetadata, read_embedded, read_embedded_file};
pub use writer::{JpegMetadataEncoder, MetadataEncoder};
