//! Unit conversion between pixels, millimetres and points.
//!
//! Form dimensions come from a pixel-based mockup, the layout works in millimetres and the PDF
//! operators take points.  Every conversion in the crate goes through this module so the three
//! systems never drift apart across the many draw calls of a page.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Physical size of one CSS pixel in millimetres.
pub const MM_PER_PX: f64 = 0.264583;

/// Number of typographic points in one millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Converts pixels to millimetres.
pub fn px_to_mm(px: f64) -> f64 {
    px * MM_PER_PX
}

/// Converts millimetres to pixels.
pub fn mm_to_px(mm: f64) -> f64 {
    mm / MM_PER_PX
}

/// Converts millimetres to points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * PT_PER_MM
}

/// Converts points to millimetres.
pub fn pt_to_mm(pt: f64) -> f64 {
    pt / PT_PER_MM
}

/// Converts pixels to points.
pub fn px_to_pt(px: f64) -> f64 {
    mm_to_pt(px_to_mm(px))
}

/// Unit attached to a [`Length`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    /// CSS pixel (0.264583mm).
    Px,
    /// Millimetre.
    Mm,
    /// PostScript point (1/72 inch).
    Pt,
}

/// A length that remembers the unit it was specified in.
///
/// Arithmetic between lengths of different units converts the right-hand side into the unit of
/// the left-hand side, so `Length::mm(10.0) + Length::pt(72.0)` is `Length::mm(35.4)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Length {
    value: f64,
    unit: Unit,
}

impl Length {
    /// Creates a length in pixels.
    pub const fn px(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Px,
        }
    }

    /// Creates a length in millimetres.
    pub const fn mm(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Mm,
        }
    }

    /// Creates a length in points.
    pub const fn pt(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Pt,
        }
    }

    /// Creates a zero length in millimetres.
    pub const fn zero() -> Self {
        Self::mm(0.0)
    }

    /// Returns the raw value in the length's own unit.
    pub fn value(self) -> f64 {
        self.value
    }

    /// Returns the unit the length was specified in.
    pub fn unit(self) -> Unit {
        self.unit
    }

    /// Returns the length in millimetres.
    pub fn to_mm(self) -> f64 {
        match self.unit {
            Unit::Px => px_to_mm(self.value),
            Unit::Mm => self.value,
            Unit::Pt => pt_to_mm(self.value),
        }
    }

    /// Returns the length in points.
    pub fn to_pt(self) -> f64 {
        match self.unit {
            Unit::Px => px_to_pt(self.value),
            Unit::Mm => mm_to_pt(self.value),
            Unit::Pt => self.value,
        }
    }

    /// Returns the length in pixels.
    pub fn to_px(self) -> f64 {
        match self.unit {
            Unit::Px => self.value,
            Unit::Mm => mm_to_px(self.value),
            Unit::Pt => mm_to_px(pt_to_mm(self.value)),
        }
    }

    /// Re-expresses the length in another unit.
    pub fn in_unit(self, unit: Unit) -> Self {
        let value = match unit {
            Unit::Px => self.to_px(),
            Unit::Mm => self.to_mm(),
            Unit::Pt => self.to_pt(),
        };
        Self { value, unit }
    }

    /// Returns the larger of two lengths, expressed in the unit of `self`.
    pub fn max(self, other: Self) -> Self {
        let other = other.in_unit(self.unit);
        Self {
            value: self.value.max(other.value),
            unit: self.unit,
        }
    }

    /// Returns the smaller of two lengths, expressed in the unit of `self`.
    pub fn min(self, other: Self) -> Self {
        let other = other.in_unit(self.unit);
        Self {
            value: self.value.min(other.value),
            unit: self.unit,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        Length {
            value: self.value + rhs.in_unit(self.unit).value,
            unit: self.unit,
        }
    }
}

impl Sub for Length {
    type Output = Length;

    fn sub(self, rhs: Length) -> Length {
        Length {
            value: self.value - rhs.in_unit(self.unit).value,
            unit: self.unit,
        }
    }
}

impl Mul<f64> for Length {
    type Output = Length;

    fn mul(self, rhs: f64) -> Length {
        Length {
            value: self.value * rhs,
            unit: self.unit,
        }
    }
}

impl Div<f64> for Length {
    type Output = Length;

    fn div(self, rhs: f64) -> Length {
        Length {
            value: self.value / rhs,
            unit: self.unit,
        }
    }
}

impl Neg for Length {
    type Output = Length;

    fn neg(self) -> Length {
        Length {
            value: -self.value,
            unit: self.unit,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            Unit::Px => "px",
            Unit::Mm => "mm",
            Unit::Pt => "pt",
        };
        write!(f, "{:.2}{}", self.value, suffix)
    }
}

/// Axis-aligned rectangle in millimetres, y-up from the bottom-left page corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle from its bottom-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its top-left corner and size.
    pub fn from_top(x: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(x, top - height, width, height)
    }

    /// Top edge.
    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Horizontal centre.
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Vertical centre.
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Returns `true` if `other` lies inside this rectangle (with a small tolerance).
    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.top() <= self.top() + EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_inch_is_72_points() {
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-9);
        assert!((pt_to_mm(72.0) - 25.4).abs() < 1e-9);
    }

    #[test]
    fn pixel_constant_matches_96_dpi() {
        assert!((px_to_mm(96.0) - 25.3999).abs() < 1e-3);
        assert!((px_to_pt(96.0) - 72.0).abs() < 1e-2);
    }

    #[test]
    fn mixed_unit_arithmetic_uses_left_unit() {
        let total = Length::mm(10.0) + Length::pt(72.0);
        assert_eq!(total.unit(), Unit::Mm);
        assert!((total.to_mm() - 35.4).abs() < 1e-9);

        let diff = Length::pt(72.0) - Length::mm(25.4);
        assert_eq!(diff.unit(), Unit::Pt);
        assert!(diff.to_pt().abs() < 1e-9);
    }

    #[test]
    fn rect_edges() {
        let rect = Rect::from_top(20.0, 282.0, 170.0, 30.0);
        assert_eq!(rect.y, 252.0);
        assert_eq!(rect.top(), 282.0);
        assert_eq!(rect.right(), 190.0);
        assert!(rect.contains(&Rect::new(25.0, 260.0, 10.0, 10.0)));
        assert!(!rect.contains(&Rect::new(25.0, 250.0, 10.0, 10.0)));
    }
}
