use std::path::Path;
use std::sync::Arc;

use crate::HeightmapError;

/// Read-only grid of scalar height samples in row-major order.
///
/// `sample(x, z)` is only defined for `x < width()` and `z < height()`.
/// Implementations are free to panic outside that range.
pub trait HeightSource {
    /// Number of samples along X.
    fn width(&self) -> usize;

    /// Number of samples along Z.
    fn height(&self) -> usize;

    /// Normalized height at grid position `(x, z)`.
    fn sample(&self, x: usize, z: usize) -> f32;

    /// Total sample count.
    fn sample_count(&self) -> usize {
        self.width() * self.height()
    }
}

impl<T: HeightSource + ?Sized> HeightSource for &T {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn sample(&self, x: usize, z: usize) -> f32 {
        (**self).sample(x, z)
    }
}

impl<T: HeightSource + ?Sized> HeightSource for Arc<T> {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn sample(&self, x: usize, z: usize) -> f32 {
        (**self).sample(x, z)
    }
}

/// Heights decoded from an image, normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    heights: Vec<f32>,
    width: usize,
    height: usize,
}

impl Heightmap {
    /// Wrap raw row-major samples.
    pub fn from_raw(heights: Vec<f32>, width: usize, height: usize) -> Result<Self, HeightmapError> {
        check_dimensions(width, height)?;
        if heights.len() != width * height {
            return Err(HeightmapError::SizeMismatch {
                expected: width * height,
                actual: heights.len(),
            });
        }
        Ok(Self {
            heights,
            width,
            height,
        })
    }

    /// Build from a generator called once per `(x, z)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> Result<Self, HeightmapError> {
        check_dimensions(width, height)?;
        let mut heights = Vec::with_capacity(width * height);
        for z in 0..height {
            for x in 0..width {
                heights.push(f(x, z));
            }
        }
        Ok(Self {
            heights,
            width,
            height,
        })
    }

    /// Average the RGB channels of tightly packed RGBA8 pixels.
    ///
    /// Alpha is ignored. A pixel of `(r, g, b)` becomes `(r + g + b) / 3 / 255`.
    pub fn from_rgba(width: usize, height: usize, pixels: &[u8]) -> Result<Self, HeightmapError> {
        check_dimensions(width, height)?;
        let expected = width * height * 4;
        if pixels.len() != expected {
            return Err(HeightmapError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        let heights = pixels
            .chunks_exact(4)
            .map(|px| (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0 / 255.0)
            .collect();

        Ok(Self {
            heights,
            width,
            height,
        })
    }

    /// Build from an already decoded RGBA image.
    pub fn from_image(image: &image::RgbaImage) -> Result<Self, HeightmapError> {
        Self::from_rgba(
            image.width() as usize,
            image.height() as usize,
            image.as_raw(),
        )
    }

    /// Decode an image file (any format the `image` crate understands).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HeightmapError> {
        let path = path.as_ref();
        let image = image::open(path)?.into_rgba8();
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "decoded heightmap image"
        );
        Self::from_image(&image)
    }

    /// Row-major samples.
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// Smallest and largest sample.
    pub fn range(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }
}

impl HeightSource for Heightmap {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn sample(&self, x: usize, z: usize) -> f32 {
        assert!(
            x < self.width && z < self.height,
            "sample ({x}, {z}) out of range for {}x{}",
            self.width,
            self.height
        );
        self.heights[z * self.width + x]
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<(), HeightmapError> {
    if width == 0 || height == 0 {
        return Err(HeightmapError::EmptyDimensions { width, height });
    }
    Ok(())
}
