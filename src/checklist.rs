//! The hand-drawn cause checklist: `numeral, circle, label` rows spread evenly over a band.

use std::collections::BTreeSet;

use crate::error::LayoutError;
use crate::fonts::{FontRole, FontSet};
use crate::surface::{Position, Surface};
use crate::units::{pt_to_mm, Length, Rect};

/// The fixed cause items, numbered from 1.
pub const CAUSE_LABELS: [&str; 12] = [
    "よく見え(聞こえ)なかった",
    "気が付かなかった",
    "忘れていた",
    "知らなかった",
    "深く考えなかった",
    "大丈夫だと思った",
    "あわてていた",
    "不愉快なことがあった",
    "疲れていた",
    "無意識に手が動いた",
    "やりにくかった",
    "体のバランスを崩した",
];

/// The fixed cause categories, numbered from 0.
pub const CATEGORY_LABELS: [&str; 4] = [
    "環境に問題があった",
    "設備・機器等に問題があった",
    "指導方法に問題があった",
    "自分自身に問題があった",
];

/// Share of the font size between the visual centre of a line and its baseline.
const CENTER_TO_BASELINE: f64 = 0.35;

/// One row of the checklist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Number shown in front of the mark, starting at 1.
    pub index: usize,
    /// Item text.
    pub label: String,
    /// Whether the mark is filled.
    pub selected: bool,
}

impl ChecklistItem {
    /// Builds the items for `labels`, marking those whose number is in `selected`.
    pub fn from_labels(labels: &[&str], selected: &BTreeSet<usize>) -> Vec<ChecklistItem> {
        labels
            .iter()
            .enumerate()
            .map(|(offset, label)| ChecklistItem {
                index: offset + 1,
                label: (*label).to_owned(),
                selected: selected.contains(&(offset + 1)),
            })
            .collect()
    }
}

/// Geometry of the checklist rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChecklistStyle {
    /// Width of the numeral column; numerals are right-aligned in it.
    pub numeral_width: f64,
    /// Radius of the mark.
    pub radius: f64,
    /// Gap between numeral, mark and label.
    pub gap: f64,
    /// Nominal label size in points.
    pub label_size_pt: f64,
    /// Space kept free above the first and below the last row.
    pub padding: f64,
    /// Smallest distance between two rows that keeps them legible.
    pub min_pitch: f64,
    /// Stroke width of the marks in points.
    pub stroke_pt: f64,
}

impl Default for ChecklistStyle {
    fn default() -> Self {
        Self {
            numeral_width: 6.0,
            radius: 1.4,
            gap: 1.2,
            label_size_pt: 8.5,
            padding: 2.0,
            min_pitch: 3.0,
            stroke_pt: 0.6,
        }
    }
}

impl ChecklistStyle {
    /// Smallest band that holds `items` rows at the minimum pitch.
    pub fn minimum_band_height(&self, items: usize) -> f64 {
        2.0 * self.padding + items.saturating_sub(1) as f64 * self.min_pitch
    }
}

/// A checklist row at its final position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    /// Row number.
    pub index: usize,
    /// Item text.
    pub label: String,
    /// Whether the mark is filled.
    pub selected: bool,
    /// Vertical centre of the row.
    pub center_y: f64,
    /// Right edge of the numeral.
    pub numeral_right: f64,
    /// Centre of the mark.
    pub mark_x: f64,
    /// Start of the label.
    pub label_x: f64,
}

/// A fully positioned checklist.
#[derive(Clone, Debug, PartialEq)]
pub struct ChecklistLayout {
    /// Distance between consecutive rows.
    pub pitch: f64,
    /// Label size in points, reduced if the longest label is wider than the band.
    pub label_size_pt: f64,
    /// Rows from top to bottom.
    pub items: Vec<PlacedItem>,
    style: ChecklistStyle,
}

/// Spreads checklist rows evenly across a band.
///
/// The mark size and font size stay fixed; only the distance between the rows follows the
/// band height. A band too short for [`ChecklistStyle::min_pitch`] is rejected.
#[derive(Clone, Debug)]
pub struct ChecklistRenderer<'a> {
    fonts: &'a FontSet,
    style: ChecklistStyle,
}

impl<'a> ChecklistRenderer<'a> {
    /// Creates a renderer with the given geometry.
    pub fn new(fonts: &'a FontSet, style: ChecklistStyle) -> Self {
        Self { fonts, style }
    }

    /// Positions `items` inside `band`.
    pub fn layout(
        &self,
        items: &[ChecklistItem],
        band: Rect,
    ) -> Result<ChecklistLayout, LayoutError> {
        let style = self.style;
        let count = items.len();
        let first_y = band.top() - style.padding;
        let last_y = band.y + style.padding;

        let pitch = if count > 1 {
            (first_y - last_y) / (count - 1) as f64
        } else {
            0.0
        };
        if (count > 1 && pitch + 1e-9 < style.min_pitch) || first_y < last_y {
            return Err(LayoutError::ChecklistBand {
                height: band.height,
                minimum: style.minimum_band_height(count),
                items: count,
            });
        }

        let numeral_right = band.x + style.numeral_width;
        let mark_x = numeral_right + style.gap + style.radius;
        let label_x = mark_x + style.radius + style.gap;
        let label_width = (band.right() - label_x - style.gap).max(0.0);
        let label_size_pt = self.label_size(items, label_width);

        let placed = items
            .iter()
            .enumerate()
            .map(|(offset, item)| PlacedItem {
                index: item.index,
                label: item.label.clone(),
                selected: item.selected,
                center_y: first_y - offset as f64 * pitch,
                numeral_right,
                mark_x,
                label_x,
            })
            .collect();

        Ok(ChecklistLayout {
            pitch,
            label_size_pt,
            items: placed,
            style,
        })
    }

    fn label_size(&self, items: &[ChecklistItem], width: f64) -> f64 {
        let nominal = self.style.label_size_pt;
        let widest = items
            .iter()
            .map(|item| self.fonts.text_width_mm(FontRole::Body, &item.label, nominal))
            .fold(0.0, f64::max);
        if widest <= width || widest <= 0.0 {
            nominal
        } else {
            nominal * width / widest
        }
    }

    /// Lays out and draws `items` into `band`.
    pub fn draw(
        &self,
        surface: &mut dyn Surface,
        items: &[ChecklistItem],
        band: Rect,
    ) -> Result<ChecklistLayout, LayoutError> {
        let layout = self.layout(items, band)?;
        layout.draw(self.fonts, surface);
        Ok(layout)
    }
}

impl ChecklistLayout {
    /// Draws the positioned rows.
    pub fn draw(&self, fonts: &FontSet, surface: &mut dyn Surface) {
        let size = self.label_size_pt;
        let baseline_shift = pt_to_mm(size) * CENTER_TO_BASELINE;
        for item in &self.items {
            let baseline = item.center_y - baseline_shift;
            let numeral = item.index.to_string();
            let numeral_width = fonts.text_width_mm(FontRole::Body, &numeral, size);
            surface.draw_text(
                &numeral,
                FontRole::Body,
                size,
                Position::mm(item.numeral_right - numeral_width, baseline),
            );
            surface.draw_circle(
                Position::mm(item.mark_x, item.center_y),
                Length::mm(self.style.radius),
                item.selected,
                self.style.stroke_pt,
            );
            surface.draw_text(
                &item.label,
                FontRole::Body,
                size,
                Position::mm(item.label_x, baseline),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn selection(indices: &[usize]) -> BTreeSet<usize> {
        indices.iter().copied().collect()
    }

    #[test]
    fn items_are_numbered_from_one() {
        let items = ChecklistItem::from_labels(&CAUSE_LABELS, &selection(&[1, 12]));
        assert_eq!(items.len(), 12);
        assert_eq!(items[0].index, 1);
        assert!(items[0].selected);
        assert!(!items[1].selected);
        assert!(items[11].selected);
    }

    #[test]
    fn rows_are_evenly_spaced() {
        let fonts = FontSet::builtin();
        let renderer = ChecklistRenderer::new(&fonts, ChecklistStyle::default());
        let items = ChecklistItem::from_labels(&CAUSE_LABELS, &BTreeSet::new());
        let layout = renderer.layout(&items, Rect::new(20.0, 50.0, 84.0, 70.0)).unwrap();
        // (70 - 2 * 2) / 11
        assert!((layout.pitch - 6.0).abs() < 1e-9);
        assert!((layout.items[0].center_y - 118.0).abs() < 1e-9);
        assert!((layout.items[11].center_y - 52.0).abs() < 1e-9);
    }

    #[test]
    fn short_band_is_rejected() {
        let fonts = FontSet::builtin();
        let renderer = ChecklistRenderer::new(&fonts, ChecklistStyle::default());
        let items = ChecklistItem::from_labels(&CAUSE_LABELS, &BTreeSet::new());
        let err = renderer.layout(&items, Rect::new(0.0, 0.0, 84.0, 30.0)).unwrap_err();
        match err {
            LayoutError::ChecklistBand { minimum, items, .. } => {
                assert_eq!(items, 12);
                assert!((minimum - (4.0 + 11.0 * 3.0)).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn selected_items_are_filled() {
        let fonts = FontSet::builtin();
        let renderer = ChecklistRenderer::new(&fonts, ChecklistStyle::default());
        let items = ChecklistItem::from_labels(&CAUSE_LABELS, &selection(&[2, 3]));
        let mut surface = RecordingSurface::new();
        renderer
            .draw(&mut surface, &items, Rect::new(0.0, 0.0, 84.0, 80.0))
            .unwrap();
        let filled: Vec<bool> = surface.circles().iter().map(|circle| circle.3).collect();
        let mut expected = vec![false; 12];
        expected[1] = true;
        expected[2] = true;
        assert_eq!(filled, expected);
    }
}
