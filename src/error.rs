//! Error types for the generation core.
//!
//! Only [`GenerationError`] ever reaches a caller of
//! [`ImageGenerating::generate`](crate::generator::ImageGenerating::generate).
//! The other enums describe failures that the orchestrator absorbs, either by
//! falling back to a metadata-free JPEG or by dropping a single attempt.

use thiserror::Error;

/// Invalid input to one of the model constructors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("canvas must be at least 1x1 pixels, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("image count must be at least 1")]
    ZeroCount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("could not allocate a {width}x{height} raster")]
    AllocationFailed { width: u32, height: u32 },
}

/// Failure while turning a raster plus metadata into JPEG bytes.
///
/// `RasterSerializationFailed` is fatal for the attempt. The other two
/// variants leave a usable baseline JPEG behind, see
/// [`EncodingError::allows_fallback`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("failed to serialize raster to JPEG: {0}")]
    RasterSerializationFailed(String),
    #[error("baseline JPEG could not be opened as an image source: {0}")]
    SourceUnreadable(String),
    #[error("failed to write metadata container: {0}")]
    DestinationWriteFailed(String),
}

impl EncodingError {
    /// Whether the unmodified baseline JPEG may be returned instead.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::RasterSerializationFailed(_))
    }
}

impl From<RasterError> for EncodingError {
    fn from(err: RasterError) -> Self {
        Self::RasterSerializationFailed(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no image could be produced: all {attempts} attempt(s) failed")]
    NoOutputProduced {
        attempts: usize,
        #[source]
        source: EncodingError,
    },
    #[error("generation task failed: {0}")]
    TaskFailed(String),
}
