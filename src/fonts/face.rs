//! Loaded font faces, the process-wide font registry and text measurement.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use printpdf::BuiltinFont;
use unicode_width::UnicodeWidthChar;

/// Estimated advance of a wide (CJK) character for faces without metrics, in em.
const WIDE_ADVANCE_EM: f64 = 1.0;
/// Estimated advance of a narrow character for faces without metrics, in em.
const NARROW_ADVANCE_EM: f64 = 0.55;
/// Estimated advance of a space for faces without metrics, in em.
const SPACE_ADVANCE_EM: f64 = 0.28;

/// Raw bytes of a font file that parsed successfully.
///
/// Glyph advances are looked up on first use and cached per character.
pub struct FontData {
    path: PathBuf,
    bytes: Vec<u8>,
    units_per_em: f64,
    advances: Mutex<HashMap<char, f64>>,
}

impl FontData {
    fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse font face: {}", err),
            )
        })?;
        let units_per_em = f64::from(face.units_per_em());
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            units_per_em,
            advances: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the path the font was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw font file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sum of the advances of `text`, in em.
    ///
    /// The face is parsed at most once per call, and only when a character is not cached yet.
    fn advance_em(&self, text: &str) -> f64 {
        let mut cache = self
            .advances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut face = None;
        let mut total = 0.0;
        for ch in text.chars() {
            let advance = match cache.get(&ch).copied() {
                Some(advance) => advance,
                None => {
                    let parsed =
                        face.get_or_insert_with(|| ttf_parser::Face::parse(&self.bytes, 0).ok());
                    let advance = match parsed {
                        Some(face) => face_advance(face, self.units_per_em, ch),
                        None => estimated_advance(ch),
                    };
                    cache.insert(ch, advance);
                    advance
                }
            };
            total += advance;
        }
        total
    }

    fn cached_advances(&self) -> usize {
        self.advances
            .lock()
            .map(|cache| cache.len())
            .unwrap_or_default()
    }
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontData")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

type Registry = Mutex<HashMap<PathBuf, Option<Arc<FontData>>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Loads the font at `path` through the process-wide registry.
///
/// Each path is read and parsed at most once per process; failures are cached as well so a
/// missing file is not probed again on the next resolution.
pub(crate) fn load_registered(path: &Path) -> Result<Arc<FontData>, String> {
    let mut registry = registry()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(entry) = registry.get(path) {
        return entry
            .clone()
            .ok_or_else(|| format!("{} was rejected earlier", path.display()));
    }

    if !path.is_file() {
        registry.insert(path.to_path_buf(), None);
        return Err(format!("{} does not exist", path.display()));
    }

    match FontData::load(path) {
        Ok(data) => {
            let data = Arc::new(data);
            registry.insert(path.to_path_buf(), Some(Arc::clone(&data)));
            Ok(data)
        }
        Err(err) => {
            registry.insert(path.to_path_buf(), None);
            Err(format!("{}: {}", path.display(), err))
        }
    }
}

/// Where the glyphs of a [`FontFace`] come from.
#[derive(Clone, Debug)]
pub enum FontSource {
    /// A font file that is embedded into the PDF.
    File(Arc<FontData>),
    /// One of the 14 standard PDF fonts.
    Builtin(BuiltinFont),
}

/// A concrete font bound to a logical role.
#[derive(Clone, Debug)]
pub struct FontFace {
    name: String,
    source: FontSource,
}

impl FontFace {
    /// Creates a face backed by a loaded font file.
    pub fn from_data(name: impl Into<String>, data: Arc<FontData>) -> Self {
        Self {
            name: name.into(),
            source: FontSource::File(data),
        }
    }

    /// Creates a face backed by a built-in PDF font.
    pub fn builtin(font: BuiltinFont) -> Self {
        let name: &'static str = font.into();
        Self {
            name: name.to_owned(),
            source: FontSource::Builtin(font),
        }
    }

    /// Returns the display name of the face.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the glyph source of the face.
    pub fn source(&self) -> &FontSource {
        &self.source
    }

    /// Returns `true` for the built-in base fonts.
    pub fn is_builtin(&self) -> bool {
        matches!(self.source, FontSource::Builtin(_))
    }

    /// Returns the advance width of `text` at `size_pt`, in points.
    pub fn text_width(&self, text: &str, size_pt: f64) -> f64 {
        match &self.source {
            FontSource::File(data) => data.advance_em(text) * size_pt,
            FontSource::Builtin(_) => estimated_width(text) * size_pt,
        }
    }

    /// Returns `true` when every character of `text` can be drawn with this face.
    ///
    /// The built-in fonts only encode Latin-1; embedded faces need a glyph in their cmap.
    pub fn covers(&self, text: &str) -> bool {
        match &self.source {
            FontSource::Builtin(_) => text.chars().all(|ch| u32::from(ch) <= 0xFF),
            FontSource::File(data) => match ttf_parser::Face::parse(&data.bytes, 0) {
                Ok(face) => text
                    .chars()
                    .all(|ch| ch.is_whitespace() || face.glyph_index(ch).is_some()),
                Err(_) => false,
            },
        }
    }

    /// Returns the advance width of a single character at `size_pt`, in points.
    pub fn char_width(&self, ch: char, size_pt: f64) -> f64 {
        let mut buffer = [0u8; 4];
        self.text_width(ch.encode_utf8(&mut buffer), size_pt)
    }
}

fn face_advance(face: &ttf_parser::Face<'_>, units_per_em: f64, ch: char) -> f64 {
    face.glyph_index(ch)
        .and_then(|glyph| face.glyph_hor_advance(glyph))
        .map(|advance| f64::from(advance) / units_per_em)
        .unwrap_or_else(|| estimated_advance(ch))
}

fn estimated_advance(ch: char) -> f64 {
    if ch == ' ' {
        SPACE_ADVANCE_EM
    } else {
        match ch.width() {
            Some(2) => WIDE_ADVANCE_EM,
            Some(0) | None => 0.0,
            _ => NARROW_ADVANCE_EM,
        }
    }
}

fn estimated_width(text: &str) -> f64 {
    text.chars().map(estimated_advance).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_estimate_treats_cjk_as_full_width() {
        let face = FontFace::builtin(BuiltinFont::Helvetica);
        assert!((face.text_width("報告", 10.0) - 20.0).abs() < 1e-9);
        assert!((face.text_width("ab", 10.0) - 11.0).abs() < 1e-9);
        assert!((face.char_width(' ', 10.0) - 2.8).abs() < 1e-9);
    }

    #[test]
    fn builtin_faces_only_cover_latin1() {
        let face = FontFace::builtin(BuiltinFont::Helvetica);
        assert!(face.covers("Report 2024 café"));
        assert!(!face.covers("事故報告書"));
    }

    #[test]
    fn file_advances_are_cached_per_character() {
        let Some(data) = crate::fonts::FontCandidates::system()
            .for_role(crate::fonts::FontRole::Body)
            .iter()
            .find_map(|candidate| load_registered(&candidate.path).ok())
        else {
            return;
        };
        let face = FontFace::from_data("system", Arc::clone(&data));
        let first = face.text_width("報告書報告書", 10.0);
        assert!(data.cached_advances() >= 3);
        assert_eq!(first, face.text_width("報告書報告書", 10.0));
        assert!((face.text_width("報", 10.0) * 2.0 - face.text_width("報報", 10.0)).abs() < 1e-9);
        assert!(first > 0.0);
    }

    #[test]
    fn missing_font_is_cached_as_rejected() {
        let path = Path::new("/__report_sheet_missing__/font.ttf");
        assert!(load_registered(path).is_err());
        let second = load_registered(path).unwrap_err();
        assert!(second.contains("rejected earlier"));
    }
}
