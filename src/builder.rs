//! Page geometry for the report sheet.

use crate::cursor::LayoutCursor;
use crate::error::LayoutError;
use crate::units::Rect;

/// Paper size in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaperSize {
    /// Page width.
    pub width: f64,
    /// Page height.
    pub height: f64,
}

impl PaperSize {
    /// ISO A4 portrait.
    pub const A4: PaperSize = PaperSize {
        width: 210.0,
        height: 297.0,
    };

    /// Creates a paper size from width and height.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::A4
    }
}

impl From<(f64, f64)> for PaperSize {
    fn from((width, height): (f64, f64)) -> Self {
        Self::new(width, height)
    }
}

/// Page margins in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Margins {
    /// Distance from the top edge to the first block.
    pub top: f64,
    /// Distance from the right edge.
    pub right: f64,
    /// Distance from the bottom edge the cursor never crosses.
    pub bottom: f64,
    /// Distance from the left edge.
    pub left: f64,
}

impl Margins {
    /// Creates margins from top, right, bottom and left values.
    pub const fn trbl(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// `vertical` above and below, `horizontal` left and right.
    pub const fn vh(vertical: f64, horizontal: f64) -> Self {
        Self::trbl(vertical, horizontal, vertical, horizontal)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::vh(15.0, 20.0)
    }
}

impl From<f64> for Margins {
    fn from(value: f64) -> Self {
        Self::vh(value, value)
    }
}

impl From<(f64, f64)> for Margins {
    fn from((vertical, horizontal): (f64, f64)) -> Self {
        Self::vh(vertical, horizontal)
    }
}

/// Validated page geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSetup {
    paper: PaperSize,
    margins: Margins,
}

impl PageSetup {
    /// A4 portrait with 15mm vertical and 20mm horizontal margins.
    pub fn a4() -> Self {
        Self {
            paper: PaperSize::A4,
            margins: Margins::default(),
        }
    }

    /// Starts a builder with the A4 defaults.
    pub fn builder() -> PageSetupBuilder {
        PageSetupBuilder::new()
    }

    /// Paper size.
    pub fn paper(&self) -> PaperSize {
        self.paper
    }

    /// Margins.
    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Width between the left and right margins.
    pub fn content_width(&self) -> f64 {
        self.paper.width - self.margins.left - self.margins.right
    }

    /// Height between the top and bottom margins.
    pub fn content_height(&self) -> f64 {
        self.paper.height - self.margins.top - self.margins.bottom
    }

    /// The area inside the margins.
    pub fn content_rect(&self) -> Rect {
        Rect::new(
            self.margins.left,
            self.margins.bottom,
            self.content_width(),
            self.content_height(),
        )
    }

    /// A fresh cursor at the top margin.
    pub fn cursor(&self) -> LayoutCursor {
        LayoutCursor::new(self.paper.height, self.margins.top, self.margins.bottom)
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::a4()
    }
}

/// Builder for [`PageSetup`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageSetupBuilder {
    paper: Option<PaperSize>,
    margins: Option<Margins>,
}

impl PageSetupBuilder {
    /// Creates a builder with the A4 defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the paper size.
    pub fn with_paper_size(mut self, paper_size: impl Into<PaperSize>) -> Self {
        self.paper = Some(paper_size.into());
        self
    }

    /// Sets the margins.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Validates the geometry.
    ///
    /// Margins that leave no printable area, or negative sizes, make the page infeasible.
    pub fn build(self) -> Result<PageSetup, LayoutError> {
        let setup = PageSetup {
            paper: self.paper.unwrap_or_default(),
            margins: self.margins.unwrap_or_default(),
        };
        let margins = setup.margins;
        if [margins.top, margins.right, margins.bottom, margins.left]
            .iter()
            .any(|value| *value < 0.0)
        {
            return Err(LayoutError::InvalidPage(format!(
                "margins must not be negative: {:?}",
                margins
            )));
        }
        if setup.content_width() <= 0.0 {
            return Err(LayoutError::Infeasible {
                required: margins.left + margins.right,
                available: setup.paper.width,
            });
        }
        if setup.content_height() <= 0.0 {
            return Err(LayoutError::Infeasible {
                required: margins.top + margins.bottom,
                available: setup.paper.height,
            });
        }
        Ok(setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_a4() {
        let setup = PageSetup::builder().build().unwrap();
        assert_eq!(setup, PageSetup::a4());
        assert_eq!(setup.content_width(), 170.0);
        assert_eq!(setup.content_height(), 267.0);
        assert_eq!(setup.cursor().y(), 282.0);
    }

    #[test]
    fn margins_can_be_overridden() {
        let setup = PageSetup::builder()
            .with_paper_size((182.0, 257.0))
            .with_margins(10.0)
            .build()
            .unwrap();
        assert_eq!(setup.content_rect(), Rect::new(10.0, 10.0, 162.0, 237.0));
    }

    #[test]
    fn negative_margins_are_an_invalid_page() {
        let err = PageSetup::builder()
            .with_margins(Margins::trbl(15.0, -1.0, 15.0, 20.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidPage(_)), "{err}");
    }

    #[test]
    fn margins_wider_than_the_paper_are_rejected() {
        let err = PageSetup::builder().with_margins((10.0, 120.0)).build().unwrap_err();
        assert!(matches!(err, LayoutError::Infeasible { .. }));
    }
}
