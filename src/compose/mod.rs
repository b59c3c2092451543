//! The page composer: turns a [`ReportRecord`] into one finished page.
//!
//! Composition runs in two phases. Planning builds every section table, asks the
//! [`HeightBudgetSolver`] for row heights, lays out the tables and positions the overlays.
//! Only when the whole page has been planned without error does drawing start, so a record
//! that cannot be laid out never produces partial output.

mod sections;

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::budget::{Allocation, BudgetItem, HeightBudgetSolver};
use crate::builder::PageSetup;
use crate::checklist::{ChecklistLayout, ChecklistRenderer, ChecklistStyle};
use crate::error::{LayoutError, RenderError};
use crate::fonts::{FontResolver, FontRole, FontSet};
use crate::record::ReportRecord;
use crate::surface::{DocumentMetadata, PdfSurface, Position, Surface};
use crate::table::TableLayout;
use crate::units::{pt_to_mm, Rect};
use crate::vertical::VerticalTextRenderer;

use sections::{Overlay, SectionBuilder, SectionPlan};

/// Progress of a composition.
///
/// States only ever move forward, one section at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComposeState {
    /// Nothing drawn yet.
    Initializing,
    /// Title and identification table drawn.
    HeaderDrawn,
    /// Occurrence summary drawn.
    SummaryDrawn,
    /// Checklist, categories and cause text drawn.
    CauseSectionDrawn,
    /// Countermeasure, other notes and sign-off drawn.
    CountermeasureSectionDrawn,
    /// Page complete.
    Finalized,
}

impl ComposeState {
    /// The state that follows this one, or `None` for [`ComposeState::Finalized`].
    pub fn next(self) -> Option<ComposeState> {
        match self {
            ComposeState::Initializing => Some(ComposeState::HeaderDrawn),
            ComposeState::HeaderDrawn => Some(ComposeState::SummaryDrawn),
            ComposeState::SummaryDrawn => Some(ComposeState::CauseSectionDrawn),
            ComposeState::CauseSectionDrawn => Some(ComposeState::CountermeasureSectionDrawn),
            ComposeState::CountermeasureSectionDrawn => Some(ComposeState::Finalized),
            ComposeState::Finalized => None,
        }
    }
}

/// Sizes and strokes used by the composer.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposeOptions {
    /// Document title size in points.
    pub title_size_pt: f64,
    /// Height reserved for the title line, in millimetres.
    pub title_height: f64,
    /// Field label size in points.
    pub label_size_pt: f64,
    /// Short value size in points.
    pub value_size_pt: f64,
    /// Nominal narrative size in points.
    pub narrative_size_pt: f64,
    /// Smallest size a narrative may shrink to, in points.
    pub narrative_min_size_pt: f64,
    /// Smallest narrative row, in millimetres, so empty fields still leave room to write.
    pub narrative_min_height: f64,
    /// Size of the guardian confirmation note in points.
    pub note_size_pt: f64,
    /// Height of the stamp and signature boxes, in millimetres.
    pub signature_height: f64,
    /// Size of the vertical section labels in points.
    pub vertical_label_size_pt: f64,
    /// Space between section tables, in millimetres.
    pub section_gap: f64,
    /// Preferred distance between checklist rows, in millimetres.
    pub checklist_pitch: f64,
    /// Checklist geometry.
    pub checklist: ChecklistStyle,
    /// Inner grid stroke in points.
    pub grid_pt: f64,
    /// Table outline stroke in points.
    pub outline_pt: f64,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            title_size_pt: 18.0,
            title_height: 12.0,
            label_size_pt: 9.0,
            value_size_pt: 10.0,
            narrative_size_pt: 10.0,
            narrative_min_size_pt: 6.0,
            narrative_min_height: 10.0,
            note_size_pt: 8.5,
            signature_height: 16.0,
            vertical_label_size_pt: 11.0,
            section_gap: 4.0,
            checklist_pitch: 5.0,
            checklist: ChecklistStyle::default(),
            grid_pt: 0.5,
            outline_pt: 1.2,
        }
    }
}

/// Where a section ended up on the page.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionSummary {
    /// The state reached once the section was drawn.
    pub state: ComposeState,
    /// Area covered by the section, title included.
    pub rect: Rect,
}

/// Outcome of [`DocumentComposer::compose`].
#[derive(Clone, Debug, PartialEq)]
pub struct ComposeSummary {
    /// Final state; always [`ComposeState::Finalized`] for a successful composition.
    pub state: ComposeState,
    /// Sections in drawing order.
    pub sections: Vec<SectionSummary>,
    /// Cursor position after the last section.
    pub cursor_y: f64,
    /// Row heights handed out by the solver.
    pub allocation: Allocation,
    /// Checklist geometry, for inspection.
    pub checklist: Option<ChecklistLayout>,
}

impl ComposeSummary {
    /// Returns the rectangle of the section that led to `state`.
    pub fn section(&self, state: ComposeState) -> Option<Rect> {
        self.sections
            .iter()
            .find(|section| section.state == state)
            .map(|section| section.rect)
    }
}

enum PlacedOverlay {
    Vertical { text: &'static str, cell: Rect },
    Checklist(ChecklistLayout),
}

struct PlacedTable {
    layout: TableLayout,
    overlays: Vec<PlacedOverlay>,
}

struct PlacedSection {
    state: ComposeState,
    title: Option<(&'static str, f64, f64)>,
    tables: Vec<PlacedTable>,
    rect: Rect,
}

struct PagePlan {
    sections: Vec<PlacedSection>,
    cursor_y: f64,
    allocation: Allocation,
}

/// Lays out and draws report records.
#[derive(Clone, Debug)]
pub struct DocumentComposer {
    fonts: FontSet,
    page: PageSetup,
    options: ComposeOptions,
}

impl DocumentComposer {
    /// Creates a composer for an A4 page using `fonts`.
    pub fn new(fonts: FontSet) -> Self {
        Self {
            fonts,
            page: PageSetup::a4(),
            options: ComposeOptions::default(),
        }
    }

    /// Creates a composer with the platform fonts.
    pub fn system() -> Self {
        Self::new(FontResolver::system().resolve())
    }

    /// Replaces the page geometry.
    pub fn with_page_setup(mut self, page: PageSetup) -> Self {
        self.page = page;
        self
    }

    /// Replaces the sizes and strokes.
    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// The resolved fonts.
    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// The page geometry.
    pub fn page_setup(&self) -> &PageSetup {
        &self.page
    }

    /// The sizes and strokes.
    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    fn plan(&self, record: &ReportRecord) -> Result<PagePlan, LayoutError> {
        let options = &self.options;
        let width = self.page.content_width();
        let left = self.page.margins().left;
        let sections = SectionBuilder::new(&self.fonts, options, record, width).sections()?;

        let mut items = Vec::new();
        let table_count: usize = sections.iter().map(|section| section.tables.len()).sum();
        let mut tables_seen = 0;
        for section in &sections {
            if section.title.is_some() {
                items.push(BudgetItem::fixed("title", options.title_height));
            }
            for table in &section.tables {
                items.extend(table.rows.iter().cloned());
                tables_seen += 1;
                if tables_seen < table_count {
                    items.push(BudgetItem::fixed("gap", options.section_gap));
                }
            }
        }

        let mut cursor = self.page.cursor();
        let allocation = HeightBudgetSolver::new().allocate(&items, cursor.usable_height())?;
        let mut heights = allocation.heights.iter().copied();
        let mut take = |count: usize| -> Vec<f64> { heights.by_ref().take(count).collect() };

        let checklist = ChecklistRenderer::new(&self.fonts, options.checklist);
        let mut placed = Vec::with_capacity(sections.len());
        let mut tables_seen = 0;
        for SectionPlan {
            state,
            title,
            tables,
        } in sections
        {
            let top = cursor.y();
            let title = match title {
                Some(text) => {
                    let height: f64 = take(1).iter().sum();
                    let size_mm = pt_to_mm(options.title_size_pt);
                    let text_width = self.fonts.text_width_mm(FontRole::Label, text, options.title_size_pt);
                    let x = left + (width - text_width) / 2.0;
                    let baseline = top - height / 2.0 - 0.35 * size_mm;
                    cursor.advance(height)?;
                    Some((text, x, baseline))
                }
                None => None,
            };

            let mut placed_tables = Vec::with_capacity(tables.len());
            let mut bottom = cursor.y();
            for plan in tables {
                let row_heights = take(plan.rows.len());
                let layout = plan
                    .table
                    .layout(&self.fonts, left, cursor.y(), width, Some(&row_heights))?;
                let overlays = plan
                    .overlays
                    .into_iter()
                    .map(|overlay| place_overlay(&layout, &checklist, overlay))
                    .collect::<Result<Vec<_>, _>>()?;
                cursor.advance(layout.rect().height)?;
                bottom = cursor.y();
                placed_tables.push(PlacedTable { layout, overlays });

                tables_seen += 1;
                if tables_seen < table_count {
                    let gap: f64 = take(1).iter().sum();
                    cursor.advance(gap)?;
                }
            }

            debug!("Planned {:?} from {:.1}mm down to {:.1}mm", state, top, bottom);
            placed.push(PlacedSection {
                state,
                title,
                tables: placed_tables,
                rect: Rect::new(left, bottom, width, top - bottom),
            });
        }

        Ok(PagePlan {
            sections: placed,
            cursor_y: cursor.y(),
            allocation,
        })
    }

    /// Lays out `record` and draws it onto `surface`.
    ///
    /// The page is planned completely before the first drawing call; any [`LayoutError`]
    /// leaves the surface untouched.
    pub fn compose(
        &self,
        record: &ReportRecord,
        surface: &mut dyn Surface,
    ) -> Result<ComposeSummary, LayoutError> {
        let plan = self.plan(record)?;
        Ok(self.draw_plan(plan, surface))
    }

    fn draw_plan(&self, plan: PagePlan, surface: &mut dyn Surface) -> ComposeSummary {
        let vertical = VerticalTextRenderer::new(&self.fonts);
        let mut state = ComposeState::Initializing;
        let mut summaries = Vec::with_capacity(plan.sections.len());
        let mut checklist = None;

        for section in plan.sections {
            if let Some((text, x, baseline)) = section.title {
                surface.draw_text(
                    text,
                    FontRole::Label,
                    self.options.title_size_pt,
                    Position::mm(x, baseline),
                );
            }
            for table in section.tables {
                table.layout.draw(surface);
                for overlay in table.overlays {
                    match overlay {
                        PlacedOverlay::Vertical { text, cell } => {
                            vertical.draw(surface, text, cell, self.options.vertical_label_size_pt);
                        }
                        PlacedOverlay::Checklist(layout) => {
                            layout.draw(&self.fonts, surface);
                            checklist = Some(layout);
                        }
                    }
                }
            }
            state = state.next().unwrap_or(ComposeState::Finalized);
            debug_assert_eq!(state, section.state);
            summaries.push(SectionSummary {
                state,
                rect: section.rect,
            });
        }
        state = state.next().unwrap_or(ComposeState::Finalized);

        ComposeSummary {
            state,
            sections: summaries,
            cursor_y: plan.cursor_y,
            allocation: plan.allocation,
            checklist,
        }
    }

    /// Renders `record` into PDF bytes.
    pub fn render(&self, record: &ReportRecord) -> Result<Vec<u8>, RenderError> {
        let paper = self.page.paper();
        let metadata = DocumentMetadata {
            title: record.kind.title().to_owned(),
            timestamp: record.record_date.and_hms_opt(0, 0, 0).unwrap_or_default(),
        };
        // Plan before creating the document so layout failures cost nothing.
        let plan = self.plan(record)?;
        let mut surface = PdfSurface::new(&metadata, paper.width, paper.height, &self.fonts)?;
        self.draw_plan(plan, &mut surface);
        let bytes = surface.finish()?;
        info!("Rendered {} ({} bytes)", metadata.title, bytes.len());
        Ok(bytes)
    }

    /// Renders `record` and writes it to `path`, creating missing parent directories.
    pub fn render_to_file(
        &self,
        record: &ReportRecord,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, RenderError> {
        let path = path.as_ref();
        let bytes = self.render(record)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RenderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, &bytes).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote {}", path.display());
        Ok(path.to_path_buf())
    }
}

fn place_overlay(
    layout: &TableLayout,
    checklist: &ChecklistRenderer<'_>,
    overlay: Overlay,
) -> Result<PlacedOverlay, LayoutError> {
    let cell_rect = |row: usize, col: usize| {
        layout.cell_rect(row, col).ok_or_else(|| {
            LayoutError::InvalidTable(format!("no placeholder cell at row {row}, column {col}"))
        })
    };
    match overlay {
        Overlay::VerticalLabel { text, row, col } => Ok(PlacedOverlay::Vertical {
            text,
            cell: cell_rect(row, col)?,
        }),
        Overlay::Checklist { row, col, items } => Ok(PlacedOverlay::Checklist(
            checklist.layout(&items, cell_rect(row, col)?)?,
        )),
    }
}

/// Renders `record` with the platform fonts.
pub fn render(record: &ReportRecord) -> Result<Vec<u8>, RenderError> {
    DocumentComposer::system().render(record)
}

/// Renders `record` with the platform fonts and writes it to `path`.
pub fn render_to_file(record: &ReportRecord, path: impl AsRef<Path>) -> Result<PathBuf, RenderError> {
    DocumentComposer::system().render_to_file(record, path)
}
