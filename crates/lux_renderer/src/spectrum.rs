//! RGB radiance values.

use lux_math::Vec3;

/// RGB spectrum (linear, unbounded).
pub type Spectrum = Vec3;

/// Helpers the integrators need on top of plain vector math.
pub trait SpectrumExt {
    fn luminance(&self) -> f32;
    fn is_black(&self) -> bool;
    fn has_nan(&self) -> bool;
    fn max_component(&self) -> f32;
}

impl SpectrumExt for Spectrum {
    #[inline]
    fn luminance(&self) -> f32 {
        0.2126 * self.x + 0.7152 * self.y + 0.0722 * self.z
    }

    #[inline]
    fn is_black(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    #[inline]
    fn has_nan(&self) -> bool {
        !self.is_finite()
    }

    #[inline]
    fn max_component(&self) -> f32 {
        self.max_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_helpers() {
        assert!(Spectrum::ZERO.is_black());
        assert!(!Spectrum::new(0.0, 1e-9, 0.0).is_black());
        assert!((Spectrum::ONE.luminance() - 1.0).abs() < 1e-5);
        assert!(Spectrum::new(f32::NAN, 0.0, 0.0).has_nan());
        assert!(Spectrum::new(f32::INFINITY, 0.0, 0.0).has_nan());
        assert_eq!(Spectrum::new(0.1, 0.7, 0.3).max_component(), 0.7);
    }
}
