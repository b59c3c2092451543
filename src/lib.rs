//! Single-page incident and near-miss report sheets rendered to PDF.

pub mod budget;
pub mod builder;
pub mod checklist;
pub mod compose;
pub mod cursor;
pub mod error;
pub mod fonts;
pub mod record;
pub mod resolved;
pub mod surface;
pub mod table;
pub mod text;
pub mod units;
pub mod vertical;

pub use builder::{Margins, PageSetup, PaperSize};
pub use compose::{
    render, render_to_file, ComposeOptions, ComposeState, ComposeSummary, DocumentComposer,
};
pub use error::{LayoutError, RenderError};
pub use fonts::{FontCandidates, FontResolver, FontRole, FontSet};
pub use record::{ReportKind, ReportRecord};
pub use resolved::Resolved;
pub use units::{Length, Rect, Unit};
