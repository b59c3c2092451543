//! Line breaking and shrink-to-fit sizing for cell text.
//!
//! Japanese text has no spaces, so lines may break between any two characters; Latin runs
//! break at the last space when possible.  Closing punctuation is never left at the start of a
//! line (a small subset of the kinsoku rules): the character before it moves down with it, so
//! no line grows past its width.

use log::debug;

use crate::error::LayoutError;
use crate::fonts::{FontRole, FontSet};
use crate::units::pt_to_mm;

/// Default spacing between baselines, as a multiple of the font size.
pub const DEFAULT_LINE_SPACING: f64 = 1.25;

/// Step used when shrinking text to fit, in points.
const SHRINK_STEP_PT: f64 = 0.5;

/// Share of a line box that lies above the baseline.
pub const BASELINE_RATIO: f64 = 0.8;

/// Characters that must not start a line.
const NO_LINE_START: &[char] = &[
    '、', '。', '，', '．', '・', '：', '；', '？', '！', 'ー', '）', '」', '』', '】', '〕', '》',
    '〉', '｝', 'ぁ', 'ぃ', 'ぅ', 'ぇ', 'ぉ', 'っ', 'ゃ', 'ゅ', 'ょ', 'ァ', 'ィ', 'ゥ', 'ェ', 'ォ',
    'ッ', 'ャ', 'ュ', 'ョ', ')', ']', '}', ',', '.', ':', ';', '!', '?',
];

fn is_break_opportunity(ch: char) -> bool {
    ch == ' ' || !ch.is_ascii()
}

/// Wraps `text` into lines no wider than `max_width_mm`.
///
/// Explicit newlines always start a new line.  A single character wider than the line is
/// placed on its own line rather than dropped.
pub fn wrap(fonts: &FontSet, role: FontRole, size_pt: f64, text: &str, max_width_mm: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }
        wrap_paragraph(fonts, role, size_pt, paragraph, max_width_mm, &mut lines);
    }
    lines
}

fn wrap_paragraph(
    fonts: &FontSet,
    role: FontRole,
    size_pt: f64,
    paragraph: &str,
    max_width_mm: f64,
    lines: &mut Vec<String>,
) {
    let face = fonts.face(role);
    let mut current: Vec<char> = Vec::new();
    let mut width = 0.0;

    for ch in paragraph.chars() {
        let advance = pt_to_mm(face.char_width(ch, size_pt));
        if current.is_empty() || width + advance <= max_width_mm {
            current.push(ch);
            width += advance;
            continue;
        }

        let mut carry = if ch.is_ascii() && ch != ' ' {
            split_latin_word(&mut current)
        } else {
            Vec::new()
        };
        if carry.is_empty() && NO_LINE_START.contains(&ch) {
            carry = push_out(&mut current);
        }
        flush(&mut current, lines);

        current = carry;
        if current.is_empty() && ch == ' ' {
            width = 0.0;
            continue;
        }
        current.push(ch);
        width = current
            .iter()
            .map(|c| pt_to_mm(face.char_width(*c, size_pt)))
            .sum();
    }

    flush(&mut current, lines);
}

/// Moves the tail of `current` to the next line so it does not start with closing punctuation.
///
/// The tail begins at the last character that may start a line; at least one character stays
/// behind. Returns an empty buffer when no such character exists.
fn push_out(current: &mut Vec<char>) -> Vec<char> {
    let mut index = current.len();
    while index > 1 {
        index -= 1;
        if !NO_LINE_START.contains(&current[index]) {
            return current.split_off(index);
        }
    }
    Vec::new()
}

/// Moves the trailing unbroken Latin word of `current` into a new buffer, if the line has an
/// earlier break opportunity.
fn split_latin_word(current: &mut Vec<char>) -> Vec<char> {
    match current.iter().rposition(|c| is_break_opportunity(*c)) {
        Some(index) if index + 1 < current.len() => {
            let carry = current.split_off(index + 1);
            while current.last() == Some(&' ') {
                current.pop();
            }
            carry
        }
        _ => Vec::new(),
    }
}

fn flush(current: &mut Vec<char>, lines: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let line: String = current.drain(..).collect();
    lines.push(line.trim_end().to_owned());
}

/// Height of `line_count` lines at `size_pt`, in millimetres.
pub fn block_height(line_count: usize, size_pt: f64, line_spacing: f64) -> f64 {
    if line_count == 0 {
        return 0.0;
    }
    pt_to_mm(size_pt * line_spacing) * line_count as f64
}

/// How a text block reacts when it does not fit its box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fit {
    /// Keep the nominal size; the row grows to the natural height.
    Natural,
    /// Shrink in half-point steps down to `min_size_pt` before giving up.
    Shrink {
        /// Smallest acceptable font size.
        min_size_pt: f64,
    },
}

/// A run of text drawn in one font role and size.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    text: String,
    role: FontRole,
    size_pt: f64,
    line_spacing: f64,
    fit: Fit,
    field: String,
}

impl TextBlock {
    /// Creates a block in the body font.
    pub fn new(text: impl Into<String>, size_pt: f64) -> Self {
        Self {
            text: text.into(),
            role: FontRole::Body,
            size_pt,
            line_spacing: DEFAULT_LINE_SPACING,
            fit: Fit::Natural,
            field: String::new(),
        }
    }

    /// Creates a block in the label font.
    pub fn label(text: impl Into<String>, size_pt: f64) -> Self {
        Self::new(text, size_pt).with_role(FontRole::Label)
    }

    /// Sets the font role and returns the updated block.
    pub fn with_role(mut self, role: FontRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the line spacing factor and returns the updated block.
    pub fn with_line_spacing(mut self, line_spacing: f64) -> Self {
        self.line_spacing = line_spacing;
        self
    }

    /// Allows the block to shrink down to `min_size_pt`; `field` names it in errors.
    pub fn shrinkable(mut self, field: impl Into<String>, min_size_pt: f64) -> Self {
        self.fit = Fit::Shrink { min_size_pt };
        self.field = field.into();
        self
    }

    /// Returns the text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the font role.
    pub fn role(&self) -> FontRole {
        self.role
    }

    /// Returns the nominal font size in points.
    pub fn size_pt(&self) -> f64 {
        self.size_pt
    }

    /// Returns the fit policy.
    pub fn fit_policy(&self) -> Fit {
        self.fit
    }

    /// Returns the name used for this block in overflow errors.
    ///
    /// Falls back to the first characters of the text for unnamed blocks.
    pub fn field(&self) -> String {
        if self.field.is_empty() {
            self.text.chars().take(12).collect()
        } else {
            self.field.clone()
        }
    }

    /// Wraps the block at its nominal size.
    pub fn natural(&self, fonts: &FontSet, width_mm: f64) -> FittedText {
        self.at_size(fonts, width_mm, self.size_pt)
    }

    fn at_size(&self, fonts: &FontSet, width_mm: f64, size_pt: f64) -> FittedText {
        let lines = if self.text.is_empty() {
            Vec::new()
        } else {
            wrap(fonts, self.role, size_pt, &self.text, width_mm)
        };
        FittedText {
            role: self.role,
            size_pt,
            line_height_mm: pt_to_mm(size_pt * self.line_spacing),
            lines,
        }
    }

    /// Wraps the block so it fits into `width_mm` x `height_mm`.
    ///
    /// `Natural` blocks are returned at their nominal size even if they overflow; the caller
    /// sizes the row from them.  `Shrink` blocks fail with [`LayoutError::TextOverflow`] if the
    /// minimum size still does not fit.
    pub fn fit(&self, fonts: &FontSet, width_mm: f64, height_mm: f64) -> Result<FittedText, LayoutError> {
        let min_size_pt = match self.fit {
            Fit::Natural => return Ok(self.natural(fonts, width_mm)),
            Fit::Shrink { min_size_pt } => min_size_pt.min(self.size_pt),
        };

        let mut size = self.size_pt;
        loop {
            let fitted = self.at_size(fonts, width_mm, size);
            if fitted.height() <= height_mm + 1e-6 {
                if size < self.size_pt {
                    debug!(
                        "Shrunk '{}' from {}pt to {}pt to fit {:.1}mm",
                        self.field, self.size_pt, size, height_mm
                    );
                }
                return Ok(fitted);
            }
            if size <= min_size_pt {
                return Err(LayoutError::TextOverflow {
                    field: self.field(),
                    needed: fitted.height(),
                    available: height_mm,
                    size,
                });
            }
            size = (size - SHRINK_STEP_PT).max(min_size_pt);
        }
    }
}

/// A text block broken into lines at a concrete size.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedText {
    /// Font role used for every line.
    pub role: FontRole,
    /// Font size in points.
    pub size_pt: f64,
    /// Distance between baselines in millimetres.
    pub line_height_mm: f64,
    /// The wrapped lines.
    pub lines: Vec<String>,
}

impl FittedText {
    /// Total height of the lines in millimetres.
    pub fn height(&self) -> f64 {
        self.line_height_mm * self.lines.len() as f64
    }
}
