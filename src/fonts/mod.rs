//! Font resolution for the `report_sheet` crate.
//!
//! Each logical [`FontRole`] is bound to the first candidate file that exists and parses. When no
//! candidate works, the role falls back to a built-in PDF font so rendering never fails because
//! of a missing font; only the visual fidelity of Japanese text suffers.

mod face;

use std::env;
use std::path::PathBuf;

use log::{debug, warn};
use printpdf::BuiltinFont;

pub use face::{FontData, FontFace, FontSource};

pub use crate::resolved::Resolved;

/// Environment variable naming an extra body font file that is tried first.
pub const BODY_FONT_ENV: &str = "REPORT_SHEET_BODY_FONT";

/// Environment variable naming an extra label font file that is tried first.
pub const LABEL_FONT_ENV: &str = "REPORT_SHEET_LABEL_FONT";

/// Logical font roles used by the report forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontRole {
    /// Running text and field values (mincho style).
    Body,
    /// Titles, headings and field labels (gothic/bold style).
    Label,
}

impl FontRole {
    /// Both roles in resolution order.
    pub const ALL: [FontRole; 2] = [FontRole::Body, FontRole::Label];

    fn builtin(self) -> BuiltinFont {
        match self {
            FontRole::Body => BuiltinFont::Helvetica,
            FontRole::Label => BuiltinFont::HelveticaBold,
        }
    }

    fn other(self) -> FontRole {
        match self {
            FontRole::Body => FontRole::Label,
            FontRole::Label => FontRole::Body,
        }
    }
}

/// A named font file to try for a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontCandidate {
    /// Display name used in logs and diagnostics.
    pub name: String,
    /// Location of the TTF/OTF/TTC file.
    pub path: PathBuf,
}

impl FontCandidate {
    /// Creates a new candidate.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

const BODY_CANDIDATES: &[(&str, &str)] = &[
    (
        "IPAexMincho",
        "/usr/share/fonts/opentype/ipaexfont-mincho/ipaexm.ttf",
    ),
    ("IPAexMincho", "/usr/share/fonts/truetype/ipaexfont/ipaexm.ttf"),
    ("IPAMincho", "/usr/share/fonts/opentype/ipafont-mincho/ipam.ttf"),
    (
        "NotoSerifCJK",
        "/usr/share/fonts/opentype/noto/NotoSerifCJK-Regular.ttc",
    ),
    ("MS Mincho", "C:/Windows/Fonts/msmincho.ttc"),
    ("Hiragino Mincho", "/System/Library/Fonts/ヒラギノ明朝 ProN.ttc"),
];

const LABEL_CANDIDATES: &[(&str, &str)] = &[
    (
        "IPAexGothic",
        "/usr/share/fonts/opentype/ipaexfont-gothic/ipaexg.ttf",
    ),
    ("IPAexGothic", "/usr/share/fonts/truetype/ipaexfont/ipaexg.ttf"),
    ("IPAGothic", "/usr/share/fonts/opentype/ipafont-gothic/ipag.ttf"),
    (
        "NotoSansCJK",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc",
    ),
    ("MS Gothic", "C:/Windows/Fonts/msgothic.ttc"),
    (
        "Hiragino Sans",
        "/System/Library/Fonts/ヒラギノ角ゴシック W6.ttc",
    ),
];

fn env_candidate(var: &str) -> Option<FontCandidate> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(FontCandidate::new(var, path))
        }
    })
}

/// Ordered candidate lists for every role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontCandidates {
    body: Vec<FontCandidate>,
    label: Vec<FontCandidate>,
}

impl FontCandidates {
    /// Creates an empty candidate set; every role resolves to the built-in fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the platform candidate lists, prefixed by the environment overrides.
    pub fn system() -> Self {
        let mut candidates = Self::empty();
        if let Some(candidate) = env_candidate(BODY_FONT_ENV) {
            candidates.body.push(candidate);
        }
        if let Some(candidate) = env_candidate(LABEL_FONT_ENV) {
            candidates.label.push(candidate);
        }
        candidates.body.extend(
            BODY_CANDIDATES
                .iter()
                .map(|(name, path)| FontCandidate::new(*name, *path)),
        );
        candidates.label.extend(
            LABEL_CANDIDATES
                .iter()
                .map(|(name, path)| FontCandidate::new(*name, *path)),
        );
        candidates
    }

    /// Appends a candidate for `role` and returns the updated set.
    pub fn with_candidate(mut self, role: FontRole, candidate: FontCandidate) -> Self {
        self.list_mut(role).push(candidate);
        self
    }

    /// Returns the candidates for `role` in the order they are tried.
    pub fn for_role(&self, role: FontRole) -> &[FontCandidate] {
        match role {
            FontRole::Body => &self.body,
            FontRole::Label => &self.label,
        }
    }

    fn list_mut(&mut self, role: FontRole) -> &mut Vec<FontCandidate> {
        match role {
            FontRole::Body => &mut self.body,
            FontRole::Label => &mut self.label,
        }
    }
}

/// The immutable result of resolving every role.
#[derive(Clone, Debug)]
pub struct FontSet {
    body: Resolved<FontFace>,
    label: Resolved<FontFace>,
}

impl FontSet {
    /// Returns a font set that only uses the built-in base fonts.
    pub fn builtin() -> Self {
        FontResolver::new(FontCandidates::empty()).resolve()
    }

    /// Returns the face bound to `role`.
    pub fn face(&self, role: FontRole) -> &FontFace {
        self.resolution(role).value()
    }

    /// Returns the tagged resolution for `role`.
    pub fn resolution(&self, role: FontRole) -> &Resolved<FontFace> {
        match role {
            FontRole::Body => &self.body,
            FontRole::Label => &self.label,
        }
    }

    /// Measures `text` with the face bound to `role`, in millimetres.
    pub fn text_width_mm(&self, role: FontRole, text: &str, size_pt: f64) -> f64 {
        crate::units::pt_to_mm(self.face(role).text_width(text, size_pt))
    }
}

/// Resolves font roles against ordered candidate lists.
#[derive(Clone, Debug)]
pub struct FontResolver {
    candidates: FontCandidates,
}

impl FontResolver {
    /// Creates a resolver over the given candidates.
    pub fn new(candidates: FontCandidates) -> Self {
        Self { candidates }
    }

    /// Creates a resolver over the platform candidates.
    pub fn system() -> Self {
        Self::new(FontCandidates::system())
    }

    /// Returns the candidates this resolver tries.
    pub fn candidates(&self) -> &FontCandidates {
        &self.candidates
    }

    /// Tries the candidates of `role` in order and returns the first face that loads.
    ///
    /// Returns `None` when every candidate is missing or unreadable.
    pub fn try_role(&self, role: FontRole) -> Option<FontFace> {
        self.candidates.for_role(role).iter().find_map(|candidate| {
            match face::load_registered(&candidate.path) {
                Ok(data) => {
                    debug!(
                        "Using font '{}' from {} for {:?} text",
                        candidate.name,
                        candidate.path.display(),
                        role
                    );
                    Some(FontFace::from_data(candidate.name.clone(), data))
                }
                Err(reason) => {
                    debug!("Skipping font candidate '{}': {}", candidate.name, reason);
                    None
                }
            }
        })
    }

    /// Resolves a single role, falling back to the other role's face or the base font.
    pub fn resolve_role(&self, role: FontRole) -> Resolved<FontFace> {
        if let Some(face) = self.try_role(role) {
            return Resolved::Preferred(face);
        }

        if let Some(face) = self.try_role(role.other()) {
            warn!(
                "No {:?} font candidate available; reusing '{}' from the {:?} role.",
                role,
                face.name(),
                role.other()
            );
            return Resolved::Fallback(face);
        }

        let face = FontFace::builtin(role.builtin());
        warn!(
            "No Japanese font found for {:?} text; falling back to built-in '{}'.",
            role,
            face.name()
        );
        Resolved::Fallback(face)
    }

    /// Resolves every role into an immutable [`FontSet`].
    ///
    /// Font files are registered once per process, so calling this repeatedly is cheap and
    /// returns equivalent sets.
    pub fn resolve(&self) -> FontSet {
        FontSet {
            body: self.resolve_role(FontRole::Body),
            label: self.resolve_role(FontRole::Label),
        }
    }
}

/// Indicates whether a preferred font is available for every role.
pub fn system_fonts_available() -> bool {
    let resolver = FontResolver::system();
    FontRole::ALL
        .iter()
        .all(|role| resolver.try_role(*role).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidates_fall_back_to_builtin_fonts() {
        let fonts = FontResolver::new(FontCandidates::empty()).resolve();
        assert!(fonts.resolution(FontRole::Body).is_fallback());
        assert!(fonts.resolution(FontRole::Label).is_fallback());
        assert_eq!(fonts.face(FontRole::Body).name(), "Helvetica");
        assert_eq!(fonts.face(FontRole::Label).name(), "Helvetica-Bold");
    }

    #[test]
    fn missing_candidates_are_skipped() {
        let candidates = FontCandidates::empty()
            .with_candidate(
                FontRole::Body,
                FontCandidate::new("Nowhere", "/__report_sheet_missing__/a.ttf"),
            )
            .with_candidate(
                FontRole::Body,
                FontCandidate::new("Nowhere Else", "/__report_sheet_missing__/b.ttf"),
            );
        let resolver = FontResolver::new(candidates);
        assert!(resolver.try_role(FontRole::Body).is_none());
        assert!(resolver.resolve_role(FontRole::Body).is_fallback());
    }

    #[test]
    fn resolution_is_idempotent() {
        let resolver = FontResolver::new(FontCandidates::empty());
        let first = resolver.resolve();
        let second = resolver.resolve();
        for role in FontRole::ALL {
            assert_eq!(first.face(role).name(), second.face(role).name());
        }
    }
}
