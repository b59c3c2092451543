//! Top-to-bottom labels built from individually rotated characters.
//!
//! This is not vertical typesetting: every character is a horizontally set glyph turned 90°
//! clockwise around its own centre line. That is good enough for the short section labels of
//! the forms (two to six characters).

use crate::fonts::{FontRole, FontSet};
use crate::surface::{Position, Surface};
use crate::units::{mm_to_pt, pt_to_mm, Length, Rect};

/// Rotation applied to every character, counterclockwise in degrees.
const ROTATION_DEG: f64 = -90.0;

/// Share of the font size the baseline is shifted by to centre a glyph on the axis.
const AXIS_SHIFT: f64 = 0.35;

/// Total height of `len` characters at `size_pt` separated by `spacing_pt`, in points.
pub fn total_height_pt(len: usize, size_pt: f64, spacing_pt: f64) -> f64 {
    if len == 0 {
        return 0.0;
    }
    len as f64 * (size_pt + spacing_pt) - spacing_pt
}

/// A placed character of a vertical label.
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalGlyph {
    /// The character.
    pub ch: char,
    /// Centre of the character cell, x in millimetres.
    pub center_x: f64,
    /// Centre of the character cell, y in millimetres.
    pub center_y: f64,
    /// Advance width of the character, in millimetres.
    pub width: f64,
}

/// Result of laying out a vertical label.
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalLayout {
    /// Font size actually used, in points.
    pub size_pt: f64,
    /// Gap between characters actually used, in points.
    pub spacing_pt: f64,
    /// Height of the whole block, in millimetres.
    pub height: f64,
    /// Characters from top to bottom.
    pub glyphs: Vec<VerticalGlyph>,
}

/// Draws short labels one character per line.
#[derive(Clone, Debug)]
pub struct VerticalTextRenderer<'a> {
    fonts: &'a FontSet,
    role: FontRole,
    spacing_pt: f64,
}

impl<'a> VerticalTextRenderer<'a> {
    /// Creates a renderer using the label font and 2pt spacing.
    pub fn new(fonts: &'a FontSet) -> Self {
        Self {
            fonts,
            role: FontRole::Label,
            spacing_pt: 2.0,
        }
    }

    /// Sets the font role.
    pub fn with_role(mut self, role: FontRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the gap between characters, in points.
    pub fn with_spacing(mut self, spacing_pt: f64) -> Self {
        self.spacing_pt = spacing_pt;
        self
    }

    /// Places `text` vertically centred in `cell`.
    ///
    /// If the block at `size_pt` is taller than the cell, size and spacing are scaled down
    /// together so the block never leaves the cell.
    pub fn layout(&self, text: &str, cell: Rect, size_pt: f64) -> VerticalLayout {
        let chars: Vec<char> = text.chars().filter(|ch| !ch.is_whitespace()).collect();
        let len = chars.len();
        if len == 0 {
            return VerticalLayout {
                size_pt,
                spacing_pt: self.spacing_pt,
                height: 0.0,
                glyphs: Vec::new(),
            };
        }

        let available_pt = mm_to_pt(cell.height).max(0.0);
        let natural_pt = total_height_pt(len, size_pt, self.spacing_pt);
        let (size, spacing) = if natural_pt > available_pt {
            let scale = available_pt / natural_pt;
            (size_pt * scale, self.spacing_pt * scale)
        } else {
            (size_pt, self.spacing_pt)
        };

        let height = pt_to_mm(total_height_pt(len, size, spacing));
        let pitch = pt_to_mm(size + spacing);
        let top = cell.center_y() + height / 2.0;
        let center_x = cell.center_x();
        let face = self.fonts.face(self.role);

        let glyphs = chars
            .into_iter()
            .enumerate()
            .map(|(index, ch)| VerticalGlyph {
                ch,
                center_x,
                center_y: top - pitch * index as f64 - pt_to_mm(size) / 2.0,
                width: pt_to_mm(face.char_width(ch, size)),
            })
            .collect();

        VerticalLayout {
            size_pt: size,
            spacing_pt: spacing,
            height,
            glyphs,
        }
    }

    /// Lays out and draws `text` into `cell`.
    pub fn draw(
        &self,
        surface: &mut dyn Surface,
        text: &str,
        cell: Rect,
        size_pt: f64,
    ) -> VerticalLayout {
        let layout = self.layout(text, cell, size_pt);
        let mut buffer = [0u8; 4];
        for glyph in &layout.glyphs {
            surface.draw_rotated_text(
                glyph.ch.encode_utf8(&mut buffer),
                self.role,
                layout.size_pt,
                Position::mm(glyph.center_x, glyph.center_y),
                ROTATION_DEG,
                Position::new(
                    Length::mm(-glyph.width / 2.0),
                    Length::pt(-AXIS_SHIFT * layout.size_pt),
                ),
            );
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    #[test]
    fn total_height_formula() {
        assert_eq!(total_height_pt(4, 12.0, 2.0), 4.0 * 14.0 - 2.0);
        assert_eq!(total_height_pt(1, 12.0, 2.0), 12.0);
        assert_eq!(total_height_pt(0, 12.0, 2.0), 0.0);
    }

    #[test]
    fn label_is_centred_in_the_cell() {
        let fonts = FontSet::builtin();
        let cell = Rect::new(20.0, 100.0, 10.0, 60.0);
        let layout = VerticalTextRenderer::new(&fonts).layout("概要", cell, 12.0);
        assert_eq!(layout.size_pt, 12.0);
        assert_eq!(layout.glyphs.len(), 2);
        let first = &layout.glyphs[0];
        let last = &layout.glyphs[1];
        assert_eq!(first.center_x, 25.0);
        let half = pt_to_mm(12.0) / 2.0;
        let top = first.center_y + half;
        let bottom = last.center_y - half;
        assert!((top - bottom - layout.height).abs() < 1e-9);
        assert!(((top + bottom) / 2.0 - 130.0).abs() < 1e-9);
    }

    #[test]
    fn long_label_shrinks_to_fit() {
        let fonts = FontSet::builtin();
        let cell = Rect::new(0.0, 0.0, 10.0, 20.0);
        let layout = VerticalTextRenderer::new(&fonts).layout("事故原因の分析", cell, 14.0);
        assert!(layout.size_pt < 14.0);
        assert!(layout.height <= 20.0 + 1e-9);
    }

    #[test]
    fn very_long_label_never_leaves_its_cell() {
        let fonts = FontSet::builtin();
        let cell = Rect::new(0.0, 50.0, 10.0, 8.0);
        let layout = VerticalTextRenderer::new(&fonts)
            .with_spacing(4.0)
            .layout("事故発生時の状況と経過の確認", cell, 14.0);
        assert!(layout.spacing_pt < 4.0);
        assert!(layout.height <= cell.height + 1e-9);
        let half = pt_to_mm(layout.size_pt) / 2.0;
        for glyph in &layout.glyphs {
            assert!(glyph.center_y + half <= cell.top() + 1e-9);
            assert!(glyph.center_y - half >= cell.y - 1e-9);
        }
    }

    #[test]
    fn every_character_is_rotated() {
        let fonts = FontSet::builtin();
        let mut surface = RecordingSurface::new();
        let cell = Rect::new(0.0, 0.0, 10.0, 40.0);
        VerticalTextRenderer::new(&fonts).draw(&mut surface, "対策", cell, 12.0);
        assert_eq!(surface.rotated_texts(), vec!["対", "策"]);
    }
}
