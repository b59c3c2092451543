//! The vertical position tracker shared by every section of a page.

use crate::error::LayoutError;

/// Tolerance for floating point comparisons against the margins, in millimetres.
const EPS: f64 = 1e-6;

/// Tracks the current top-down position on the page.
///
/// Coordinates are PDF-style: millimetres, y grows upwards from the bottom edge. The cursor
/// starts at the top margin and every drawn block moves it down. It never crosses the bottom
/// margin; [`LayoutCursor::advance`] fails instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutCursor {
    page_height: f64,
    margin_top: f64,
    margin_bottom: f64,
    y: f64,
}

impl LayoutCursor {
    /// Creates a cursor positioned at the top margin.
    pub fn new(page_height: f64, margin_top: f64, margin_bottom: f64) -> Self {
        Self {
            page_height,
            margin_top,
            margin_bottom,
            y: page_height - margin_top,
        }
    }

    /// Current position.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Position of the top margin.
    pub fn top(&self) -> f64 {
        self.page_height - self.margin_top
    }

    /// Position of the bottom margin.
    pub fn bottom(&self) -> f64 {
        self.margin_bottom
    }

    /// Height of the whole usable band, regardless of the current position.
    pub fn usable_height(&self) -> f64 {
        self.top() - self.bottom()
    }

    /// Height left between the current position and the bottom margin.
    pub fn remaining_height(&self) -> f64 {
        self.y - self.margin_bottom
    }

    /// Height consumed since the top margin.
    pub fn consumed_height(&self) -> f64 {
        self.top() - self.y
    }

    /// Returns the absolute position `offset` millimetres below the cursor.
    pub fn below(&self, offset: f64) -> f64 {
        self.y - offset
    }

    /// Moves the cursor down by `delta` and returns the new position.
    pub fn advance(&mut self, delta: f64) -> Result<f64, LayoutError> {
        let remaining = self.remaining_height();
        if delta < 0.0 || delta > remaining + EPS {
            return Err(LayoutError::CursorOverflow {
                requested: delta,
                remaining,
            });
        }
        // Snap to the margin so rounding never leaves the cursor a hair below it.
        self.y = (self.y - delta).max(self.margin_bottom);
        Ok(self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_top_margin() {
        let cursor = LayoutCursor::new(297.0, 15.0, 15.0);
        assert_eq!(cursor.y(), 282.0);
        assert_eq!(cursor.remaining_height(), 267.0);
        assert_eq!(cursor.usable_height(), 267.0);
        assert_eq!(cursor.consumed_height(), 0.0);
    }

    #[test]
    fn advance_moves_down() {
        let mut cursor = LayoutCursor::new(297.0, 15.0, 15.0);
        assert_eq!(cursor.advance(30.0).unwrap(), 252.0);
        assert_eq!(cursor.remaining_height(), 237.0);
        assert_eq!(cursor.below(2.0), 250.0);
    }

    #[test]
    fn advance_can_reach_but_not_cross_the_bottom_margin() {
        let mut cursor = LayoutCursor::new(297.0, 15.0, 15.0);
        assert_eq!(cursor.advance(267.0).unwrap(), 15.0);
        let err = cursor.advance(0.5).unwrap_err();
        assert_eq!(
            err,
            LayoutError::CursorOverflow {
                requested: 0.5,
                remaining: 0.0
            }
        );
        assert_eq!(cursor.y(), 15.0);
    }

    #[test]
    fn negative_advance_is_rejected() {
        let mut cursor = LayoutCursor::new(297.0, 15.0, 15.0);
        assert!(cursor.advance(-1.0).is_err());
    }
}
