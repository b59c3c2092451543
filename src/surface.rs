//! Drawing surfaces.
//!
//! Layout code only talks to the [`Surface`] trait with [`Length`] coordinates. The PDF backend
//! converts to points at this boundary; the recording backend keeps millimetres so tests can
//! inspect exactly what would have been drawn.

use std::io::BufWriter;

use chrono::NaiveDateTime;
use log::warn;
use lopdf::{Document, Object, StringFormat};
use printpdf::{
    BuiltinFont, Color, CurTransMat, CustomPdfConformance, IndirectFontRef, Line, Mm,
    OffsetDateTime, PdfConformance, PdfDocument, PdfDocumentReference, PdfLayerReference, Point,
    Pt, Rgb,
};

use sha2::{Digest, Sha256};

use crate::error::RenderError;
use crate::fonts::{FontFace, FontRole, FontSet, FontSource};
use crate::units::{mm_to_pt, Length, Rect};

/// A point on the page, y-up from the bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: Length,
    /// Vertical coordinate.
    pub y: Length,
}

impl Position {
    /// Creates a position from two lengths.
    pub fn new(x: Length, y: Length) -> Self {
        Self { x, y }
    }

    /// Creates a position from millimetre values.
    pub fn mm(x: f64, y: f64) -> Self {
        Self::new(Length::mm(x), Length::mm(y))
    }
}

/// The primitive operations the layout engine needs from a page.
pub trait Surface {
    /// Draws `text` with its baseline starting at `at`.
    fn draw_text(&mut self, text: &str, role: FontRole, size_pt: f64, at: Position);

    /// Draws `text` in a coordinate system rotated counterclockwise by `angle_deg` around
    /// `origin`.
    ///
    /// `offset` is the baseline start in the rotated system.
    fn draw_rotated_text(
        &mut self,
        text: &str,
        role: FontRole,
        size_pt: f64,
        origin: Position,
        angle_deg: f64,
        offset: Position,
    );

    /// Strokes a straight line.
    fn draw_line(&mut self, from: Position, to: Position, width_pt: f64);

    /// Strokes the outline of a rectangle.
    fn stroke_rect(&mut self, rect: Rect, width_pt: f64);

    /// Draws a circle, filled or outlined.
    fn draw_circle(&mut self, center: Position, radius: Length, filled: bool, width_pt: f64);
}

/// A drawing operation captured by [`RecordingSurface`], in millimetres.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// Horizontal text.
    Text {
        text: String,
        role: FontRole,
        size_pt: f64,
        x: f64,
        y: f64,
    },
    /// Text in a rotated coordinate system.
    RotatedText {
        text: String,
        role: FontRole,
        size_pt: f64,
        origin_x: f64,
        origin_y: f64,
        angle_deg: f64,
        offset_x: f64,
        offset_y: f64,
    },
    /// Straight line.
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width_pt: f64,
    },
    /// Rectangle outline.
    Rect { rect: Rect, width_pt: f64 },
    /// Circle.
    Circle {
        cx: f64,
        cy: f64,
        radius: f64,
        filled: bool,
    },
}

/// A surface that only records what is drawn.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    /// Creates an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded operation in drawing order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Returns the recorded horizontal texts.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded rotated texts.
    pub fn rotated_texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::RotatedText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded circles as `(cx, cy, radius, filled)`.
    pub fn circles(&self) -> Vec<(f64, f64, f64, bool)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Circle {
                    cx,
                    cy,
                    radius,
                    filled,
                } => Some((*cx, *cy, *radius, *filled)),
                _ => None,
            })
            .collect()
    }

    /// Returns the lowest y coordinate touched by any operation.
    ///
    /// Text extends below its baseline by roughly a fifth of its size; that descent is included.
    pub fn lowest_y(&self) -> Option<f64> {
        self.ops
            .iter()
            .map(|op| match op {
                DrawOp::Text { y, size_pt, .. } => y - crate::units::pt_to_mm(size_pt * 0.2),
                DrawOp::RotatedText {
                    origin_y, offset_x, ..
                } => origin_y - offset_x.abs(),
                DrawOp::Line { y1, y2, .. } => y1.min(*y2),
                DrawOp::Rect { rect, .. } => rect.y,
                DrawOp::Circle { cy, radius, .. } => cy - radius,
            })
            .reduce(f64::min)
    }
}

impl Surface for RecordingSurface {
    fn draw_text(&mut self, text: &str, role: FontRole, size_pt: f64, at: Position) {
        self.ops.push(DrawOp::Text {
            text: text.to_owned(),
            role,
            size_pt,
            x: at.x.to_mm(),
            y: at.y.to_mm(),
        });
    }

    fn draw_rotated_text(
        &mut self,
        text: &str,
        role: FontRole,
        size_pt: f64,
        origin: Position,
        angle_deg: f64,
        offset: Position,
    ) {
        self.ops.push(DrawOp::RotatedText {
            text: text.to_owned(),
            role,
            size_pt,
            origin_x: origin.x.to_mm(),
            origin_y: origin.y.to_mm(),
            angle_deg,
            offset_x: offset.x.to_mm(),
            offset_y: offset.y.to_mm(),
        });
    }

    fn draw_line(&mut self, from: Position, to: Position, width_pt: f64) {
        self.ops.push(DrawOp::Line {
            x1: from.x.to_mm(),
            y1: from.y.to_mm(),
            x2: to.x.to_mm(),
            y2: to.y.to_mm(),
            width_pt,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, width_pt: f64) {
        self.ops.push(DrawOp::Rect { rect, width_pt });
    }

    fn draw_circle(&mut self, center: Position, radius: Length, filled: bool, _width_pt: f64) {
        self.ops.push(DrawOp::Circle {
            cx: center.x.to_mm(),
            cy: center.y.to_mm(),
            radius: radius.to_mm(),
            filled,
        });
    }
}

/// Document metadata written into the PDF info dictionary.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentMetadata {
    /// Document title.
    pub title: String,
    /// Creation and modification timestamp.
    pub timestamp: NaiveDateTime,
}

/// A single-page, single-layer PDF backed by `printpdf`.
pub struct PdfSurface {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    body: IndirectFontRef,
    label: IndirectFontRef,
    faces: [FontFace; 2],
    uncovered: usize,
    document_id: String,
}

impl PdfSurface {
    /// Creates a document with one page of `width_mm` x `height_mm` and registers the fonts.
    pub fn new(
        metadata: &DocumentMetadata,
        width_mm: f64,
        height_mm: f64,
        fonts: &FontSet,
    ) -> Result<Self, RenderError> {
        let (doc, page, layer) =
            PdfDocument::new(metadata.title.as_str(), Mm(width_mm), Mm(height_mm), "Layer 1");

        let stamp = OffsetDateTime::from_unix_timestamp(metadata.timestamp.and_utc().timestamp());
        let document_id = document_id(&metadata.title, metadata.timestamp);
        let doc = doc
            .with_conformance(PdfConformance::Custom(CustomPdfConformance {
                identifier: "report_sheet".into(),
                requires_xmp_metadata: false,
                requires_icc_profile: false,
                allows_default_fonts: true,
                ..Default::default()
            }))
            .with_document_id(document_id.clone())
            .with_creation_date(stamp.clone())
            .with_mod_date(stamp);

        let (body, body_face) = register_font(&doc, fonts, FontRole::Body)?;
        let (label, label_face) = if same_file(fonts) {
            (body.clone(), body_face.clone())
        } else {
            register_font(&doc, fonts, FontRole::Label)?
        };

        let layer = doc.get_page(page).get_layer(layer);
        layer.set_fill_color(black());
        layer.set_outline_color(black());

        Ok(Self {
            doc,
            layer,
            body,
            label,
            faces: [body_face, label_face],
            uncovered: 0,
            document_id,
        })
    }

    fn font(&self, role: FontRole) -> &IndirectFontRef {
        match role {
            FontRole::Body => &self.body,
            FontRole::Label => &self.label,
        }
    }

    /// Number of text runs drawn with a built-in font that cannot encode all of their characters.
    pub fn uncovered_texts(&self) -> usize {
        self.uncovered
    }

    fn check_coverage(&mut self, text: &str, role: FontRole) {
        let face = match role {
            FontRole::Body => &self.faces[0],
            FontRole::Label => &self.faces[1],
        };
        if !face.is_builtin() || face.covers(text) {
            return;
        }
        if self.uncovered == 0 {
            warn!(
                "Built-in font '{}' cannot encode '{}'; characters outside Latin-1 are left out of the PDF.",
                face.name(),
                text
            );
        }
        self.uncovered += 1;
    }

    /// Serialises the document.
    ///
    /// The trailer identifiers are pinned to a value derived from the metadata, so the same
    /// input always produces the same bytes.
    pub fn finish(self) -> Result<Vec<u8>, RenderError> {
        let mut writer = BufWriter::new(Vec::new());
        self.doc.save(&mut writer)?;
        let bytes = writer
            .into_inner()
            .map_err(|err| RenderError::Pdf(printpdf::Error::Io(err.into_error())))?;
        pin_trailer_id(&bytes, &self.document_id)
    }
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn same_file(fonts: &FontSet) -> bool {
    match (
        fonts.face(FontRole::Body).source(),
        fonts.face(FontRole::Label).source(),
    ) {
        (FontSource::File(body), FontSource::File(label)) => body.path() == label.path(),
        _ => false,
    }
}

/// Registers the face of `role` and returns it with the face actually used for drawing.
fn register_font(
    doc: &PdfDocumentReference,
    fonts: &FontSet,
    role: FontRole,
) -> Result<(IndirectFontRef, FontFace), RenderError> {
    let face = fonts.face(role);
    match face.source() {
        FontSource::File(data) => match doc.add_external_font(data.bytes()) {
            Ok(font) => Ok((font, face.clone())),
            Err(err) => {
                let fallback = match role {
                    FontRole::Body => BuiltinFont::Helvetica,
                    FontRole::Label => BuiltinFont::HelveticaBold,
                };
                warn!(
                    "Failed to embed font '{}' ({}); using built-in {:?} instead.",
                    face.name(),
                    err,
                    fallback
                );
                Ok((doc.add_builtin_font(fallback)?, FontFace::builtin(fallback)))
            }
        },
        FontSource::Builtin(font) => Ok((doc.add_builtin_font(*font)?, face.clone())),
    }
}

/// Derives a stable 32 character identifier from the title and timestamp.
fn document_id(title: &str, timestamp: NaiveDateTime) -> String {
    let digest = Sha256::digest(format!("{}|{}", title, timestamp).as_bytes());
    digest
        .iter()
        .take(16)
        .map(|byte| format!("{:02X}", byte))
        .collect()
}

/// Rewrites the trailer `/ID` of a serialised document so both entries equal `id`.
fn pin_trailer_id(pdf_bytes: &[u8], id: &str) -> Result<Vec<u8>, RenderError> {
    let mut document = Document::load_mem(pdf_bytes)?;
    let id = Object::String(id.as_bytes().to_vec(), StringFormat::Literal);
    document.trailer.set("ID", Object::Array(vec![id.clone(), id]));

    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(lopdf::Error::from)?;
    Ok(buffer)
}

impl Surface for PdfSurface {
    fn draw_text(&mut self, text: &str, role: FontRole, size_pt: f64, at: Position) {
        self.check_coverage(text, role);
        let font = self.font(role).clone();
        self.layer
            .use_text(text, size_pt, Mm(at.x.to_mm()), Mm(at.y.to_mm()), &font);
    }

    fn draw_rotated_text(
        &mut self,
        text: &str,
        role: FontRole,
        size_pt: f64,
        origin: Position,
        angle_deg: f64,
        offset: Position,
    ) {
        self.check_coverage(text, role);
        let font = self.font(role).clone();
        self.layer.save_graphics_state();
        self.layer
            .set_ctm(CurTransMat::Translate(Mm(origin.x.to_mm()), Mm(origin.y.to_mm())));
        self.layer.set_ctm(CurTransMat::Rotate(angle_deg));
        self.layer.use_text(
            text,
            size_pt,
            Mm(offset.x.to_mm()),
            Mm(offset.y.to_mm()),
            &font,
        );
        self.layer.restore_graphics_state();
    }

    fn draw_line(&mut self, from: Position, to: Position, width_pt: f64) {
        self.layer.set_outline_thickness(width_pt);
        self.layer.add_shape(Line {
            points: vec![(pt_point(from), false), (pt_point(to), false)],
            is_closed: false,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, width_pt: f64) {
        self.layer.set_outline_thickness(width_pt);
        let corners = [
            Position::mm(rect.x, rect.y),
            Position::mm(rect.right(), rect.y),
            Position::mm(rect.right(), rect.top()),
            Position::mm(rect.x, rect.top()),
        ];
        self.layer.add_shape(Line {
            points: corners.iter().map(|p| (pt_point(*p), false)).collect(),
            is_closed: true,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        });
    }

    fn draw_circle(&mut self, center: Position, radius: Length, filled: bool, width_pt: f64) {
        self.layer.set_outline_thickness(width_pt);
        let points = printpdf::utils::calculate_points_for_circle(
            Pt(radius.to_pt()),
            Pt(center.x.to_pt()),
            Pt(center.y.to_pt()),
        );
        self.layer.add_shape(Line {
            points,
            is_closed: true,
            has_fill: filled,
            has_stroke: true,
            is_clipping_path: false,
        });
    }
}

fn pt_point(position: Position) -> Point {
    Point {
        x: Pt(mm_to_pt(position.x.to_mm())),
        y: Pt(mm_to_pt(position.y.to_mm())),
    }
}
