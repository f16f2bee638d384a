//! Solid-fill canvases used as the pixel payload of generated images.

use image::RgbImage;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::model::CanvasSize;

/// The fixed palette generated images are filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlatColor {
    Red,
    Blue,
    Green,
    Orange,
    Yellow,
    Purple,
    Pink,
    Teal,
}

impl FlatColor {
    pub const PALETTE: [FlatColor; 8] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Orange,
        Self::Yellow,
        Self::Purple,
        Self::Pink,
        Self::Teal,
    ];

    /// sRGB value of the color.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Self::Red => [255, 59, 48],
            Self::Blue => [0, 122, 255],
            Self::Green => [52, 199, 89],
            Self::Orange => [255, 149, 0],
            Self::Yellow => [255, 204, 0],
            Self::Purple => [175, 82, 222],
            Self::Pink => [255, 45, 85],
            Self::Teal => [48, 176, 199],
        }
    }

    /// Pick a palette entry uniformly at random from the thread-local RNG.
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        *Self::PALETTE.choose(rng).unwrap_or(&Self::Blue)
    }
}

/// Allocate a `size` canvas filled with `color`.
///
/// The only failure is allocation: either the byte length overflows `usize`
/// or the allocator refuses the reservation.
pub fn make_blank_image(size: CanvasSize, color: FlatColor) -> Result<RgbImage, RasterError> {
    let (width, height) = (size.width(), size.height());
    let alloc_failed = || RasterError::AllocationFailed { width, height };

    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(alloc_failed)?;
    let len = pixels.checked_mul(3).ok_or_else(alloc_failed)?;

    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| alloc_failed())?;

    let rgb = color.rgb();
    for _ in 0..pixels {
        buf.extend_from_slice(&rgb);
    }

    RgbImage::from_raw(width, height, buf).ok_or_else(alloc_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn palette_has_eight_distinct_colors() {
        let rgbs: HashSet<[u8; 3]> = FlatColor::PALETTE.iter().map(|c| c.rgb()).collect();
        assert_eq!(rgbs.len(), 8);
    }

    #[test]
    fn blank_image_has_exact_size_and_fill() {
        let size = CanvasSize::new(7, 3).unwrap();
        let img = make_blank_image(size, FlatColor::Teal).unwrap();
        assert_eq!(img.dimensions(), (7, 3));
        assert!(img.pixels().all(|p| *p == Rgb(FlatColor::Teal.rgb())));
    }

    #[test]
    fn single_pixel_canvas() {
        let img = make_blank_image(CanvasSize::square(1).unwrap(), FlatColor::Red).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 59, 48]));
    }

    #[test]
    fn overflowing_size_is_allocation_failure() {
        let size = CanvasSize::new(u32::MAX, u32::MAX).unwrap();
        let err = make_blank_image(size, FlatColor::Blue).unwrap_err();
        assert_eq!(
            err,
            RasterError::AllocationFailed {
                width: u32::MAX,
                height: u32::MAX
            }
        );
    }

    #[test]
    fn random_with_covers_palette() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<FlatColor> = (0..500).map(|_| FlatColor::random_with(&mut rng)).collect();
        assert_eq!(seen.len(), FlatColor::PALETTE.len());
    }

    #[test]
    fn color_serde_lowercase() {
        let c: FlatColor = serde_json::from_str("\"purple\"").unwrap();
        assert_eq!(c, FlatColor::Purple);
    }
}
