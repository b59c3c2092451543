//! Error types shared by the layout engine and the PDF writer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Conditions under which a page cannot be laid out without clipping content.
///
/// All variants are detected while planning the page, before anything is drawn.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    /// The minimum heights of all sections do not fit into the usable band.
    #[error("sections need at least {required:.1}mm but only {available:.1}mm is usable")]
    Infeasible {
        /// Sum of the minimum heights.
        required: f64,
        /// Usable page height.
        available: f64,
    },
    /// A narrative field does not fit into its allotted cell even at the minimum font size.
    #[error(
        "text of '{field}' needs {needed:.1}mm at {size}pt but only {available:.1}mm is allotted"
    )]
    TextOverflow {
        /// Label of the field that overflowed.
        field: String,
        /// Height required at the minimum font size.
        needed: f64,
        /// Height of the cell content box.
        available: f64,
        /// Font size of the last attempt, in points.
        size: f64,
    },
    /// The checklist band is too short to keep the items legible.
    #[error("checklist band of {height:.1}mm cannot hold {items} items (minimum {minimum:.1}mm)")]
    ChecklistBand {
        /// Height of the band that was offered.
        height: f64,
        /// Smallest band height that keeps the minimum item pitch.
        minimum: f64,
        /// Number of checklist items.
        items: usize,
    },
    /// Resolved column widths do not add up to the enclosing width.
    #[error("column widths sum to {actual:.2}mm, expected {expected:.2}mm")]
    ColumnWidths {
        /// Width of the enclosing content box.
        expected: f64,
        /// Sum of the resolved column widths.
        actual: f64,
    },
    /// A block tried to move the cursor past the bottom margin.
    #[error("advancing {requested:.1}mm would cross the bottom margin ({remaining:.1}mm left)")]
    CursorOverflow {
        /// Height the block asked for.
        requested: f64,
        /// Height left above the bottom margin.
        remaining: f64,
    },
    /// The page geometry leaves no usable content box.
    #[error("invalid page setup: {0}")]
    InvalidPage(String),
    /// A table definition is structurally invalid.
    #[error("invalid table: {0}")]
    InvalidTable(String),
}

/// Errors surfaced by [`crate::compose::DocumentComposer::render`] and friends.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The record cannot be laid out on one page.
    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),
    /// The PDF backend rejected the document.
    #[error("failed to build PDF: {0}")]
    Pdf(#[from] printpdf::Error),
    /// The serialised document could not be re-read or rewritten.
    #[error("failed to finalise PDF: {0}")]
    Document(#[from] lopdf::Error),
    /// The output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
