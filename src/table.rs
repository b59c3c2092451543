//! Grid tables with spans, nested tables and per-range border rules.
//!
//! A [`TableBuilder`] collects rows of [`Cell`]s and validates the grid. The resulting [`Table`]
//! is measured ([`Table::natural_row_heights`]), laid out at concrete heights
//! ([`Table::layout`]) and finally drawn ([`TableLayout::draw`]). Layout resolves every text
//! block and nested table up front, so a table that cannot be drawn fails before anything
//! reaches the surface.

use crate::error::LayoutError;
use crate::fonts::{FontRole, FontSet};
use crate::surface::{Position, Surface};
use crate::text::{FittedText, TextBlock, BASELINE_RATIO};
use crate::units::Rect;

/// Tolerance for width and height comparisons, in millimetres.
const EPS: f64 = 0.01;

/// Width of a column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnWidth {
    /// Fixed width in millimetres.
    Fixed(f64),
    /// Share of the width left over after the fixed columns.
    Proportional(f64),
}

/// Height policy of a row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RowHeight {
    /// Tall enough for the content at its nominal size.
    Auto,
    /// Fixed height in millimetres.
    Fixed(f64),
    /// Absorbs the height left in the host cell of a nested table.
    ///
    /// Behaves like [`RowHeight::Auto`] in a top-level table.
    Fill,
}

/// Horizontal alignment of cell content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centred.
    Center,
    /// Flush right.
    Right,
}

/// Vertical alignment of cell content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VAlign {
    /// Flush with the top padding.
    Top,
    /// Centred.
    #[default]
    Middle,
}

/// Inner spacing of a cell, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Padding {
    /// Space above the content.
    pub top: f64,
    /// Space right of the content.
    pub right: f64,
    /// Space below the content.
    pub bottom: f64,
    /// Space left of the content.
    pub left: f64,
}

impl Padding {
    /// Same padding on every side.
    pub const fn uniform(value: f64) -> Self {
        Self::symmetric(value, value)
    }

    /// `vertical` above and below, `horizontal` left and right.
    pub const fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    /// No padding.
    pub const fn none() -> Self {
        Self::uniform(0.0)
    }

    fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    fn shrink(&self, rect: Rect) -> Rect {
        Rect::new(
            rect.x + self.left,
            rect.y + self.bottom,
            (rect.width - self.horizontal()).max(0.0),
            (rect.height - self.vertical()).max(0.0),
        )
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::symmetric(1.0, 1.5)
    }
}

/// What a cell holds.
#[derive(Clone, Debug, PartialEq)]
pub enum CellContent {
    /// Nothing; the cell is a placeholder for a later overlay.
    Empty,
    /// Wrapped text.
    Text(TextBlock),
    /// A nested table filling the cell.
    Table(Box<Table>),
}

/// A cell of a table row.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    content: CellContent,
    h_align: HAlign,
    v_align: VAlign,
    padding: Padding,
    colspan: usize,
    rowspan: usize,
}

impl Cell {
    fn with_content(content: CellContent) -> Self {
        Self {
            content,
            h_align: HAlign::default(),
            v_align: VAlign::default(),
            padding: Padding::default(),
            colspan: 1,
            rowspan: 1,
        }
    }

    /// An empty placeholder cell.
    pub fn empty() -> Self {
        Self::with_content(CellContent::Empty)
    }

    /// A cell holding a text block.
    pub fn text(block: TextBlock) -> Self {
        Self::with_content(CellContent::Text(block))
    }

    /// A cell holding a nested table; nested tables have no padding by default.
    pub fn table(table: Table) -> Self {
        Self::with_content(CellContent::Table(Box::new(table))).with_padding(Padding::none())
    }

    /// Sets the horizontal alignment.
    pub fn align(mut self, h_align: HAlign) -> Self {
        self.h_align = h_align;
        self
    }

    /// Sets the vertical alignment.
    pub fn valign(mut self, v_align: VAlign) -> Self {
        self.v_align = v_align;
        self
    }

    /// Sets the padding.
    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Makes the cell span `colspan` columns.
    pub fn colspan(mut self, colspan: usize) -> Self {
        self.colspan = colspan;
        self
    }

    /// Makes the cell span `rowspan` rows.
    pub fn rowspan(mut self, rowspan: usize) -> Self {
        self.rowspan = rowspan;
        self
    }

    /// Returns the cell content.
    pub fn content(&self) -> &CellContent {
        &self.content
    }

    fn natural_height(&self, fonts: &FontSet, width: f64) -> Result<f64, LayoutError> {
        let inner_width = (width - self.padding.horizontal()).max(0.0);
        let content = match &self.content {
            CellContent::Empty => return Ok(0.0),
            CellContent::Text(block) => block.natural(fonts, inner_width).height(),
            CellContent::Table(table) => table.natural_row_heights(fonts, inner_width)?.iter().sum(),
        };
        Ok(content + self.padding.vertical())
    }
}

/// Inclusive range of grid slots addressed by a border rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    /// First row.
    pub first_row: usize,
    /// First column.
    pub first_col: usize,
    /// Last row (inclusive).
    pub last_row: usize,
    /// Last column (inclusive).
    pub last_col: usize,
}

impl CellRange {
    /// Creates a range from its corners.
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        Self {
            first_row,
            first_col,
            last_row,
            last_col,
        }
    }

    fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }
}

/// A stroke rule applied to a range of cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BorderRule {
    /// Outline every cell anchored in the range.
    Grid {
        /// Addressed cells; `None` means the whole table.
        range: Option<CellRange>,
        /// Stroke width in points.
        width_pt: f64,
    },
    /// Outline the range as a whole.
    Box {
        /// Addressed cells; `None` means the whole table.
        range: Option<CellRange>,
        /// Stroke width in points.
        width_pt: f64,
    },
}

#[derive(Clone, Debug, PartialEq)]
struct Placement {
    row: usize,
    col: usize,
    cell: Cell,
}

impl Placement {
    fn last_row(&self) -> usize {
        self.row + self.cell.rowspan - 1
    }
}

/// Collects rows of cells and validates the resulting grid.
#[derive(Clone, Debug, Default)]
pub struct TableBuilder {
    columns: Vec<ColumnWidth>,
    rows: Vec<(RowHeight, Vec<Cell>)>,
    borders: Vec<BorderRule>,
}

impl TableBuilder {
    /// Starts a table with the given columns.
    pub fn new(columns: Vec<ColumnWidth>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Appends a row.
    ///
    /// Slots covered by a row span from an earlier row are skipped, so `cells` only lists the
    /// cells that start in this row.
    pub fn row(mut self, height: RowHeight, cells: Vec<Cell>) -> Self {
        self.rows.push((height, cells));
        self
    }

    /// Adds a border rule.
    pub fn border(mut self, rule: BorderRule) -> Self {
        self.borders.push(rule);
        self
    }

    /// Outlines every cell of the table.
    pub fn grid(self, width_pt: f64) -> Self {
        self.border(BorderRule::Grid {
            range: None,
            width_pt,
        })
    }

    /// Outlines the table as a whole.
    pub fn outline(self, width_pt: f64) -> Self {
        self.border(BorderRule::Box {
            range: None,
            width_pt,
        })
    }

    /// Validates spans and coverage and returns the table.
    pub fn build(self) -> Result<Table, LayoutError> {
        let cols = self.columns.len();
        let row_count = self.rows.len();
        if cols == 0 || row_count == 0 {
            return Err(LayoutError::InvalidTable("table has no columns or no rows".into()));
        }

        let mut occupied = vec![vec![false; cols]; row_count];
        let mut placements = Vec::new();
        let mut heights = Vec::with_capacity(row_count);

        for (row, (height, cells)) in self.rows.into_iter().enumerate() {
            heights.push(height);
            let mut col = 0;
            for cell in cells {
                while col < cols && occupied[row][col] {
                    col += 1;
                }
                if col >= cols {
                    return Err(LayoutError::InvalidTable(format!(
                        "row {row} has more cells than columns"
                    )));
                }
                if cell.colspan == 0 || cell.rowspan == 0 {
                    return Err(LayoutError::InvalidTable(format!(
                        "cell at row {row}, column {col} has an empty span"
                    )));
                }
                if col + cell.colspan > cols || row + cell.rowspan > row_count {
                    return Err(LayoutError::InvalidTable(format!(
                        "cell at row {row}, column {col} spans past the table edge"
                    )));
                }
                for slot_row in occupied.iter_mut().skip(row).take(cell.rowspan) {
                    for slot in slot_row.iter_mut().skip(col).take(cell.colspan) {
                        if *slot {
                            return Err(LayoutError::InvalidTable(format!(
                                "cell at row {row}, column {col} overlaps another cell"
                            )));
                        }
                        *slot = true;
                    }
                }
                let next = col + cell.colspan;
                placements.push(Placement { row, col, cell });
                col = next;
            }
            if let Some(free) = occupied[row].iter().position(|slot| !*slot) {
                return Err(LayoutError::InvalidTable(format!(
                    "row {row} leaves column {free} uncovered"
                )));
            }
        }

        Ok(Table {
            columns: self.columns,
            heights,
            placements,
            borders: self.borders,
        })
    }
}

/// A validated table, ready to be measured and laid out.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    columns: Vec<ColumnWidth>,
    heights: Vec<RowHeight>,
    placements: Vec<Placement>,
    borders: Vec<BorderRule>,
}

impl Table {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.heights.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Resolves the column widths against the enclosing `width`.
    ///
    /// Fixed columns keep their width and proportional columns share the rest. The result
    /// always sums to `width` within 0.01mm, otherwise [`LayoutError::ColumnWidths`].
    pub fn resolve_columns(&self, width: f64) -> Result<Vec<f64>, LayoutError> {
        let fixed: f64 = self
            .columns
            .iter()
            .map(|column| match column {
                ColumnWidth::Fixed(value) => *value,
                ColumnWidth::Proportional(_) => 0.0,
            })
            .sum();
        let weights: f64 = self
            .columns
            .iter()
            .map(|column| match column {
                ColumnWidth::Proportional(weight) => weight.max(0.0),
                ColumnWidth::Fixed(_) => 0.0,
            })
            .sum();
        let rest = (width - fixed).max(0.0);

        let widths: Vec<f64> = self
            .columns
            .iter()
            .map(|column| match column {
                ColumnWidth::Fixed(value) => *value,
                ColumnWidth::Proportional(weight) if weights > 0.0 => rest * weight.max(0.0) / weights,
                ColumnWidth::Proportional(_) => 0.0,
            })
            .collect();

        let actual: f64 = widths.iter().sum();
        if (actual - width).abs() > EPS {
            return Err(LayoutError::ColumnWidths {
                expected: width,
                actual,
            });
        }
        Ok(widths)
    }

    /// Heights each row needs at the nominal text sizes.
    ///
    /// Fixed rows report their fixed height. A cell spanning several rows that needs more than
    /// those rows provide grows the last spanned row.
    pub fn natural_row_heights(&self, fonts: &FontSet, width: f64) -> Result<Vec<f64>, LayoutError> {
        let widths = self.resolve_columns(width)?;
        let mut heights: Vec<f64> = self
            .heights
            .iter()
            .map(|height| match height {
                RowHeight::Fixed(value) => *value,
                RowHeight::Auto | RowHeight::Fill => 0.0,
            })
            .collect();

        for placement in self.placements.iter().filter(|p| p.cell.rowspan == 1) {
            if matches!(self.heights[placement.row], RowHeight::Fixed(_)) {
                continue;
            }
            let cell_width = span_width(&widths, placement.col, placement.cell.colspan);
            let needed = placement.cell.natural_height(fonts, cell_width)?;
            heights[placement.row] = heights[placement.row].max(needed);
        }

        for placement in self.placements.iter().filter(|p| p.cell.rowspan > 1) {
            let cell_width = span_width(&widths, placement.col, placement.cell.colspan);
            let needed = placement.cell.natural_height(fonts, cell_width)?;
            let have: f64 = heights[placement.row..=placement.last_row()].iter().sum();
            let last = placement.last_row();
            if needed > have + EPS && !matches!(self.heights[last], RowHeight::Fixed(_)) {
                heights[last] += needed - have;
            }
        }

        Ok(heights)
    }

    /// Row heights for a nested table that must fill exactly `height`.
    ///
    /// Fill rows share whatever the other rows leave; without fill rows the last row stretches.
    pub fn heights_within(&self, fonts: &FontSet, width: f64, height: f64) -> Result<Vec<f64>, LayoutError> {
        let mut heights = self.natural_row_heights(fonts, width)?;
        let fill_rows: Vec<usize> = self
            .heights
            .iter()
            .enumerate()
            .filter(|(_, policy)| matches!(policy, RowHeight::Fill))
            .map(|(index, _)| index)
            .collect();

        let fixed: f64 = heights
            .iter()
            .enumerate()
            .filter(|(index, _)| !fill_rows.contains(index))
            .map(|(_, value)| value)
            .sum();
        if fixed > height + EPS {
            return Err(LayoutError::Infeasible {
                required: fixed,
                available: height,
            });
        }

        let rest = height - fixed;
        if fill_rows.is_empty() {
            if let Some(last) = heights.last_mut() {
                *last += rest;
            }
        } else {
            let share = rest / fill_rows.len() as f64;
            for index in fill_rows {
                heights[index] = share;
            }
        }
        Ok(heights)
    }

    /// Lays the table out with its top-left corner at (`x`, `top`).
    ///
    /// `row_heights` defaults to [`Table::natural_row_heights`]. Every text block is fitted into
    /// its cell here; text that does not fit is an error.
    pub fn layout(
        &self,
        fonts: &FontSet,
        x: f64,
        top: f64,
        width: f64,
        row_heights: Option<&[f64]>,
    ) -> Result<TableLayout, LayoutError> {
        let widths = self.resolve_columns(width)?;
        let heights = match row_heights {
            Some(heights) if heights.len() == self.row_count() => heights.to_vec(),
            Some(heights) => {
                return Err(LayoutError::InvalidTable(format!(
                    "{} row heights given for {} rows",
                    heights.len(),
                    self.row_count()
                )))
            }
            None => self.natural_row_heights(fonts, width)?,
        };

        let col_x = offsets(x, &widths, 1.0);
        let row_y = offsets(top, &heights, -1.0);
        let total_height: f64 = heights.iter().sum();
        let rect = Rect::from_top(x, top, width, total_height);

        let mut cells = Vec::with_capacity(self.placements.len());
        for placement in &self.placements {
            let cell = &placement.cell;
            let left = col_x[placement.col];
            let right = col_x[placement.col + cell.colspan];
            let cell_top = row_y[placement.row];
            let bottom = row_y[placement.last_row() + 1];
            let cell_rect = Rect::new(left, bottom, right - left, cell_top - bottom);
            let inner = cell.padding.shrink(cell_rect);

            let body = match &cell.content {
                CellContent::Empty => CellBody::Empty,
                CellContent::Text(block) => CellBody::Text(place_text(fonts, block, cell, inner)?),
                CellContent::Table(table) => {
                    let heights = table.heights_within(fonts, inner.width, inner.height)?;
                    CellBody::Table(Box::new(table.layout(
                        fonts,
                        inner.x,
                        inner.top(),
                        inner.width,
                        Some(&heights),
                    )?))
                }
            };

            cells.push(LaidOutCell {
                row: placement.row,
                col: placement.col,
                rowspan: cell.rowspan,
                colspan: cell.colspan,
                rect: cell_rect,
                body,
            });
        }

        let mut strokes = Vec::new();
        for rule in &self.borders {
            match *rule {
                BorderRule::Grid { range, width_pt } => {
                    for cell in &cells {
                        if range.map_or(true, |range| range.contains(cell.row, cell.col)) {
                            strokes.push((cell.rect, width_pt));
                        }
                    }
                }
                BorderRule::Box { range, width_pt } => {
                    let range = range.unwrap_or_else(|| {
                        CellRange::new(0, 0, self.row_count() - 1, self.column_count() - 1)
                    });
                    if range.last_row >= self.row_count() || range.last_col >= self.column_count() {
                        return Err(LayoutError::InvalidTable(
                            "border range lies outside the table".into(),
                        ));
                    }
                    let left = col_x[range.first_col];
                    let right = col_x[range.last_col + 1];
                    let range_top = row_y[range.first_row];
                    let bottom = row_y[range.last_row + 1];
                    strokes.push((Rect::new(left, bottom, right - left, range_top - bottom), width_pt));
                }
            }
        }

        Ok(TableLayout {
            rect,
            cells,
            strokes,
        })
    }
}

fn span_width(widths: &[f64], col: usize, colspan: usize) -> f64 {
    widths[col..col + colspan].iter().sum()
}

/// Running edges starting at `start`, stepping by `sizes` in `direction`.
fn offsets(start: f64, sizes: &[f64], direction: f64) -> Vec<f64> {
    let mut edges = Vec::with_capacity(sizes.len() + 1);
    let mut position = start;
    edges.push(position);
    for size in sizes {
        position += direction * size;
        edges.push(position);
    }
    edges
}

fn place_text(
    fonts: &FontSet,
    block: &TextBlock,
    cell: &Cell,
    inner: Rect,
) -> Result<Vec<PlacedLine>, LayoutError> {
    let fitted = block.fit(fonts, inner.width, inner.height)?;
    if fitted.height() > inner.height + EPS {
        return Err(LayoutError::TextOverflow {
            field: block.field(),
            needed: fitted.height(),
            available: inner.height,
            size: fitted.size_pt,
        });
    }
    Ok(position_lines(fonts, &fitted, cell.h_align, cell.v_align, inner))
}

fn position_lines(
    fonts: &FontSet,
    fitted: &FittedText,
    h_align: HAlign,
    v_align: VAlign,
    inner: Rect,
) -> Vec<PlacedLine> {
    let block_top = match v_align {
        VAlign::Top => inner.top(),
        VAlign::Middle => inner.center_y() + fitted.height() / 2.0,
    };
    fitted
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(index, line)| {
            let width = fonts.text_width_mm(fitted.role, line, fitted.size_pt);
            let x = match h_align {
                HAlign::Left => inner.x,
                HAlign::Center => inner.center_x() - width / 2.0,
                HAlign::Right => inner.right() - width,
            };
            let y = block_top - fitted.line_height_mm * (index as f64 + BASELINE_RATIO);
            PlacedLine {
                text: line.clone(),
                role: fitted.role,
                size_pt: fitted.size_pt,
                x,
                y,
            }
        })
        .collect()
}

/// A line of text at its final baseline position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    /// The text.
    pub text: String,
    /// Font role.
    pub role: FontRole,
    /// Font size in points.
    pub size_pt: f64,
    /// Baseline start, x.
    pub x: f64,
    /// Baseline, y.
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq)]
enum CellBody {
    Empty,
    Text(Vec<PlacedLine>),
    Table(Box<TableLayout>),
}

#[derive(Clone, Debug, PartialEq)]
struct LaidOutCell {
    row: usize,
    col: usize,
    rowspan: usize,
    colspan: usize,
    rect: Rect,
    body: CellBody,
}

/// A table with every cell and stroke at its final position.
#[derive(Clone, Debug, PartialEq)]
pub struct TableLayout {
    rect: Rect,
    cells: Vec<LaidOutCell>,
    strokes: Vec<(Rect, f64)>,
}

impl TableLayout {
    /// Outer rectangle of the table.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Rectangle of the cell anchored at (`row`, `col`), before anything is drawn.
    pub fn cell_rect(&self, row: usize, col: usize) -> Option<Rect> {
        self.cells
            .iter()
            .find(|cell| cell.row == row && cell.col == col)
            .map(|cell| cell.rect)
    }

    /// Text lines of the cell anchored at (`row`, `col`).
    pub fn lines(&self, row: usize, col: usize) -> Option<&[PlacedLine]> {
        self.cells
            .iter()
            .find(|cell| cell.row == row && cell.col == col)
            .and_then(|cell| match &cell.body {
                CellBody::Text(lines) => Some(lines.as_slice()),
                _ => None,
            })
    }

    /// Draws text, nested tables and borders, and returns the drawn geometry.
    pub fn draw(&self, surface: &mut dyn Surface) -> RenderedTable {
        let mut rendered = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            let nested = match &cell.body {
                CellBody::Empty => None,
                CellBody::Text(lines) => {
                    for line in lines {
                        surface.draw_text(&line.text, line.role, line.size_pt, Position::mm(line.x, line.y));
                    }
                    None
                }
                CellBody::Table(table) => Some(Box::new(table.draw(surface))),
            };
            rendered.push(RenderedCell {
                row: cell.row,
                col: cell.col,
                rowspan: cell.rowspan,
                colspan: cell.colspan,
                rect: cell.rect,
                nested,
            });
        }
        for (rect, width_pt) in &self.strokes {
            surface.stroke_rect(*rect, *width_pt);
        }
        RenderedTable {
            rect: self.rect,
            cells: rendered,
        }
    }
}

/// Geometry of a drawn cell.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedCell {
    /// Anchor row.
    pub row: usize,
    /// Anchor column.
    pub col: usize,
    /// Rows spanned.
    pub rowspan: usize,
    /// Columns spanned.
    pub colspan: usize,
    /// Cell rectangle in millimetres.
    pub rect: Rect,
    /// Geometry of a nested table, if the cell held one.
    pub nested: Option<Box<RenderedTable>>,
}

/// Geometry of a drawn table; overlays use it to find placeholder cells.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedTable {
    /// Outer rectangle.
    pub rect: Rect,
    /// Every cell in definition order.
    pub cells: Vec<RenderedCell>,
}

impl RenderedTable {
    /// Table width in millimetres.
    pub fn width(&self) -> f64 {
        self.rect.width
    }

    /// Table height in millimetres.
    pub fn height(&self) -> f64 {
        self.rect.height
    }

    /// Returns the cell anchored at (`row`, `col`).
    pub fn cell(&self, row: usize, col: usize) -> Option<&RenderedCell> {
        self.cells.iter().find(|cell| cell.row == row && cell.col == col)
    }

    /// Returns the rectangle of the cell anchored at (`row`, `col`).
    pub fn cell_rect(&self, row: usize, col: usize) -> Option<Rect> {
        self.cell(row, col).map(|cell| cell.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawOp, RecordingSurface};

    fn fonts() -> FontSet {
        FontSet::builtin()
    }

    fn label(text: &str) -> Cell {
        Cell::text(TextBlock::label(text, 10.0))
    }

    #[test]
    fn proportional_columns_share_the_rest() {
        let table = TableBuilder::new(vec![
            ColumnWidth::Fixed(10.0),
            ColumnWidth::Proportional(1.0),
            ColumnWidth::Proportional(3.0),
        ])
        .row(RowHeight::Auto, vec![Cell::empty(), Cell::empty(), Cell::empty()])
        .build()
        .unwrap();
        let widths = table.resolve_columns(170.0).unwrap();
        assert_eq!(widths, vec![10.0, 40.0, 120.0]);
    }

    #[test]
    fn fixed_columns_must_match_the_enclosing_width() {
        let table = TableBuilder::new(vec![ColumnWidth::Fixed(50.0), ColumnWidth::Fixed(50.0)])
            .row(RowHeight::Auto, vec![Cell::empty(), Cell::empty()])
            .build()
            .unwrap();
        let err = table.resolve_columns(170.0).unwrap_err();
        assert_eq!(
            err,
            LayoutError::ColumnWidths {
                expected: 170.0,
                actual: 100.0
            }
        );
    }

    #[test]
    fn rowspan_slots_are_skipped_in_later_rows() {
        let table = TableBuilder::new(vec![ColumnWidth::Fixed(20.0), ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Fixed(10.0), vec![label("A").rowspan(2), label("B")])
            .row(RowHeight::Fixed(12.0), vec![label("C")])
            .build()
            .unwrap();
        let mut surface = RecordingSurface::new();
        let rendered = table
            .layout(&fonts(), 20.0, 200.0, 100.0, None)
            .unwrap()
            .draw(&mut surface);
        assert_eq!(rendered.height(), 22.0);
        assert_eq!(rendered.cell_rect(0, 0), Some(Rect::new(20.0, 178.0, 20.0, 22.0)));
        assert_eq!(rendered.cell_rect(1, 1), Some(Rect::new(40.0, 178.0, 80.0, 12.0)));
    }

    #[test]
    fn uncovered_or_overfull_rows_are_rejected() {
        let missing = TableBuilder::new(vec![ColumnWidth::Fixed(20.0), ColumnWidth::Fixed(20.0)])
            .row(RowHeight::Auto, vec![Cell::empty()])
            .build();
        assert!(matches!(missing, Err(LayoutError::InvalidTable(_))));

        let overfull = TableBuilder::new(vec![ColumnWidth::Fixed(20.0)])
            .row(RowHeight::Auto, vec![Cell::empty(), Cell::empty()])
            .build();
        assert!(matches!(overfull, Err(LayoutError::InvalidTable(_))));

        let too_tall = TableBuilder::new(vec![ColumnWidth::Fixed(20.0)])
            .row(RowHeight::Auto, vec![Cell::empty().rowspan(2)])
            .build();
        assert!(matches!(too_tall, Err(LayoutError::InvalidTable(_))));
    }

    #[test]
    fn auto_rows_grow_with_wrapped_text() {
        let short = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Auto, vec![Cell::text(TextBlock::new("あ", 10.0))])
            .build()
            .unwrap();
        let long = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Auto, vec![Cell::text(TextBlock::new("あ".repeat(60), 10.0))])
            .build()
            .unwrap();
        let short_height = short.natural_row_heights(&fonts(), 50.0).unwrap()[0];
        let long_height = long.natural_row_heights(&fonts(), 50.0).unwrap()[0];
        assert!(long_height > short_height * 3.0);
    }

    #[test]
    fn nested_fill_row_absorbs_host_height() {
        let nested = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Fixed(8.0), vec![label("分類")])
            .row(RowHeight::Fill, vec![Cell::text(TextBlock::new("詳細", 10.0))])
            .grid(0.5)
            .build()
            .unwrap();
        let host = TableBuilder::new(vec![ColumnWidth::Fixed(30.0), ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Fixed(40.0), vec![Cell::empty(), Cell::table(nested)])
            .build()
            .unwrap();
        let mut surface = RecordingSurface::new();
        let rendered = host
            .layout(&fonts(), 0.0, 100.0, 100.0, None)
            .unwrap()
            .draw(&mut surface);
        let inner = rendered.cell(0, 1).and_then(|cell| cell.nested.as_deref()).unwrap();
        assert_eq!(inner.height(), 40.0);
        assert_eq!(inner.cell_rect(1, 0).map(|rect| rect.height), Some(32.0));
    }

    #[test]
    fn fixed_row_too_small_for_text_is_an_error() {
        let table = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Fixed(5.0), vec![Cell::text(TextBlock::new("あ".repeat(60), 10.0))])
            .build()
            .unwrap();
        let err = table.layout(&fonts(), 0.0, 100.0, 30.0, None).unwrap_err();
        assert!(matches!(err, LayoutError::TextOverflow { .. }));
    }

    #[test]
    fn box_rule_strokes_the_range_once() {
        let table = TableBuilder::new(vec![ColumnWidth::Fixed(10.0), ColumnWidth::Fixed(10.0)])
            .row(RowHeight::Fixed(5.0), vec![Cell::empty(), Cell::empty()])
            .row(RowHeight::Fixed(5.0), vec![Cell::empty(), Cell::empty()])
            .grid(0.3)
            .outline(1.2)
            .build()
            .unwrap();
        let mut surface = RecordingSurface::new();
        table
            .layout(&fonts(), 0.0, 10.0, 20.0, None)
            .unwrap()
            .draw(&mut surface);
        let strokes: Vec<f64> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { width_pt, .. } => Some(*width_pt),
                _ => None,
            })
            .collect();
        assert_eq!(strokes, vec![0.3, 0.3, 0.3, 0.3, 1.2]);
    }

    #[test]
    fn centred_text_is_centred() {
        let table = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)])
            .row(RowHeight::Fixed(10.0), vec![label("ab").align(HAlign::Center)])
            .build()
            .unwrap();
        let layout = table.layout(&fonts(), 0.0, 10.0, 40.0, None).unwrap();
        let line = &layout.lines(0, 0).unwrap()[0];
        let width = fonts().text_width_mm(FontRole::Label, "ab", 10.0);
        assert!((line.x + width / 2.0 - 20.0).abs() < 1e-9);
    }
}
