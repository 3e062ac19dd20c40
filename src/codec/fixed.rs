//! Signed 24.8 fixed-point numbers.
//!
//! The raw value is the number multiplied by 256 and truncated toward zero.
//! Integer conversions round-trip exactly for every integer in
//! `[-2^23, 2^23 - 1]`; float conversions have a granularity of 1/256.
//!
//! # Example
//!
//! ```
//! use westfield_server::codec::Fixed;
//!
//! let x = Fixed::from_f64(1234.56);
//! assert!((x.to_f64() - 1234.56).abs() < 1.0 / 256.0);
//! assert_eq!(Fixed::from_int(-7).to_int(), -7);
//! ```

use std::fmt;

/// A 24.8 fixed-point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(i32);

impl Fixed {
    /// Smallest integer that converts without loss.
    pub const MIN_INT: i32 = -(1 << 23);
    /// Largest integer that converts without loss.
    pub const MAX_INT: i32 = (1 << 23) - 1;

    /// Wrap a raw wire value.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw wire value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn from_int(value: i32) -> Self {
        Self(value << 8)
    }

    /// Integer part, rounded toward negative infinity.
    #[inline]
    pub const fn to_int(self) -> i32 {
        self.0 >> 8
    }

    /// Convert from `f64`, truncating toward zero. Out-of-range values saturate.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self((value * 256.0) as i32)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }

    #[inline]
    pub fn from_f32(value: f32) -> Self {
        Self::from_f64(value as f64)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }
}

impl From<i32> for Fixed {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl From<f64> for Fixed {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> Self {
        value.to_f64()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1.0 / 256.0;

    #[test]
    fn test_from_f64_within_tolerance() {
        let x = Fixed::from_f64(1234.56);
        assert!((x.to_f64() - 1234.56).abs() < TOLERANCE);

        let y = Fixed::from_f64(-0.75);
        assert_eq!(y.to_f64(), -0.75);
    }

    #[test]
    fn test_int_round_trip_at_limits() {
        for n in [Fixed::MIN_INT, -1, 0, 1, 42, Fixed::MAX_INT] {
            assert_eq!(Fixed::from_int(n).to_int(), n);
        }
    }

    #[test]
    fn test_raw_packing() {
        assert_eq!(Fixed::from_int(1).raw(), 256);
        assert_eq!(Fixed::from_f64(0.5).raw(), 128);
        assert_eq!(Fixed::from_raw(384).to_f64(), 1.5);
    }

    #[test]
    fn test_from_f64_truncates_toward_zero() {
        // 1/512 is below the granularity
        assert_eq!(Fixed::from_f64(1.0 / 512.0).raw(), 0);
        assert_eq!(Fixed::from_f64(-1.0 / 512.0).raw(), 0);
    }

    #[test]
    fn test_to_int_rounds_toward_negative_infinity() {
        assert_eq!(Fixed::from_f64(-0.5).to_int(), -1);
        assert_eq!(Fixed::from_f64(2.75).to_int(), 2);
    }

    #[test]
    fn test_f32_conversion() {
        let x = Fixed::from_f32(3.25);
        assert_eq!(x.to_f32(), 3.25);
    }

    #[test]
    fn test_display() {
        assert_eq!(Fixed::from_f64(2.5).to_string(), "2.5");
    }
}
