//! Accumulation buffers and image output.
//!
//! [`Film`] holds per-pixel running averages and is stored column-major so a
//! worker that owns a range of columns owns one contiguous slice.
//! [`SplatBuffer`] collects contributions that land on arbitrary pixels.

use crate::spectrum::{Spectrum, SpectrumExt};
use crate::RenderResult;
use lux_math::Vec2;
use parking_lot::Mutex;
use std::path::Path;

/// Per-pixel running averages, column-major (`x * height + y`).
#[derive(Debug, Clone)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Vec<Spectrum>,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Spectrum::ZERO; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        x as usize * self.height as usize + y as usize
    }

    /// Pixel `(x, y)` of a flat column-major index.
    #[inline]
    pub fn coords(&self, index: usize) -> (u32, u32) {
        let h = self.height as usize;
        ((index / h) as u32, (index % h) as u32)
    }

    pub fn get(&self, x: u32, y: u32) -> Spectrum {
        self.pixels[self.index(x, y)]
    }

    pub fn pixels_mut(&mut self) -> &mut [Spectrum] {
        &mut self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Spectrum::ZERO);
    }
}

/// Fold the `n`-th sample (0-based) into a running average.
#[inline]
pub fn accumulate(average: Spectrum, sample: Spectrum, n: u32) -> Spectrum {
    let n = n as f32;
    average * (n / (n + 1.0)) + sample / (n + 1.0)
}

/// Grid of locked pixels for contributions from any thread.
pub struct SplatBuffer {
    width: u32,
    height: u32,
    cells: Vec<Mutex<Spectrum>>,
}

impl SplatBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: (0..count).map(|_| Mutex::new(Spectrum::ZERO)).collect(),
        }
    }

    /// Add `value` to the pixel containing raster position `raster`.
    /// Positions outside the image and non-finite values are dropped.
    pub fn splat(&self, raster: Vec2, value: Spectrum) {
        if value.has_nan() {
            crate::warn_once!("Dropping non-finite splat at {:?}", raster);
            return;
        }
        if raster.x < 0.0 || raster.y < 0.0 {
            return;
        }
        let (x, y) = (raster.x as u32, raster.y as u32);
        if x >= self.width || y >= self.height {
            return;
        }
        *self.cells[(y * self.width + x) as usize].lock() += value;
    }

    pub fn get(&self, x: u32, y: u32) -> Spectrum {
        *self.cells[(y * self.width + x) as usize].lock()
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell.get_mut() = Spectrum::ZERO;
        }
    }
}

/// Final image, row-major, ready to be written out.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Spectrum>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Spectrum::ZERO; (width * height) as usize],
        }
    }

    /// Combine averaged pixels with splats scaled by `splat_scale`.
    pub fn resolve(film: &Film, splats: &SplatBuffer, splat_scale: f32) -> Self {
        let mut image = Self::new(film.width(), film.height());
        for y in 0..image.height {
            for x in 0..image.width {
                image.set(x, y, film.get(x, y) + splats.get(x, y) * splat_scale);
            }
        }
        image
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Spectrum {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Spectrum) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    pub fn mean(&self) -> Spectrum {
        if self.pixels.is_empty() {
            return Spectrum::ZERO;
        }
        self.pixels.iter().copied().sum::<Spectrum>() / self.pixels.len() as f32
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width * self.height * 4) as usize);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }

    /// Write the image. `.hdr` and `.exr` keep linear floats, anything else is
    /// gamma corrected to 8 bits.
    pub fn save(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let path = path.as_ref();
        let linear = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("hdr") || e.eq_ignore_ascii_case("exr"));

        if linear {
            let data: Vec<f32> = self.pixels.iter().flat_map(|c| c.to_array()).collect();
            let img = image::Rgb32FImage::from_raw(self.width, self.height, data)
                .ok_or_else(|| crate::RenderError::InvalidConfig("image size mismatch".into()))?;
            image::DynamicImage::ImageRgb32F(img).save(path)?;
        } else {
            let img = image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
                .ok_or_else(|| crate::RenderError::InvalidConfig("image size mismatch".into()))?;
            img.save(path)?;
        }
        log::info!("Saved {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Spectrum) -> [u8; 4] {
    // Apply gamma correction and convert to 0-255
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 0.0001);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 0.0001);
        assert_eq!(color_to_rgba(Spectrum::new(4.0, 0.25, -1.0)), [255, 127, 0, 255]);
    }

    #[test]
    fn test_running_average() {
        let samples = [1.0, 3.0, 5.0, 7.0];
        let mut avg = Spectrum::ZERO;
        for (n, &s) in samples.iter().enumerate() {
            avg = accumulate(avg, Spectrum::splat(s), n as u32);
        }
        assert!((avg.x - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_film_column_major() {
        let mut film = Film::new(4, 3);
        let i = film.index(2, 1);
        assert_eq!(i, 7);
        assert_eq!(film.coords(i), (2, 1));
        film.pixels_mut()[i] = Spectrum::ONE;
        assert_eq!(film.get(2, 1), Spectrum::ONE);
        film.clear();
        assert!(film.get(2, 1).is_black());
    }

    #[test]
    fn test_splat_buffer() {
        let mut splats = SplatBuffer::new(4, 3);
        splats.splat(Vec2::new(1.5, 2.9), Spectrum::ONE);
        splats.splat(Vec2::new(1.0, 2.0), Spectrum::ONE);
        splats.splat(Vec2::new(4.0, 0.0), Spectrum::ONE);
        splats.splat(Vec2::new(-0.5, 0.0), Spectrum::ONE);
        splats.splat(Vec2::new(0.0, 0.0), Spectrum::splat(f32::NAN));
        assert_eq!(splats.get(1, 2), Spectrum::splat(2.0));
        assert!(splats.get(0, 0).is_black());

        let film = Film::new(4, 3);
        let image = ImageBuffer::resolve(&film, &splats, 0.5);
        assert_eq!(image.get(1, 2), Spectrum::ONE);

        splats.clear();
        assert!(splats.get(1, 2).is_black());
    }
}
