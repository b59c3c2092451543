use std::collections::BTreeMap;

use lopdf::{Document, Object};
use report_sheet::fonts::{system_fonts_available, FontSource};
use report_sheet::surface::RecordingSurface;
use report_sheet::{
    ComposeState, DocumentComposer, FontCandidates, FontResolver, LayoutError, RenderError,
    ReportKind, ReportRecord,
};
use sha2::{Digest, Sha256};

/// A composer that never touches system fonts, so the built-in fallback is exercised.
fn composer() -> DocumentComposer {
    let fonts = FontResolver::new(FontCandidates::empty()).resolve();
    assert!(
        fonts.resolution(report_sheet::FontRole::Body).is_fallback(),
        "empty candidate list unexpectedly resolved a font"
    );
    DocumentComposer::new(fonts)
}

fn render(record: &ReportRecord) -> Vec<u8> {
    composer().render(record).expect("render report")
}

fn number(object: &Object) -> f64 {
    match object {
        Object::Integer(value) => *value as f64,
        Object::Real(value) => f64::from(*value),
        other => panic!("expected a number, got {other:?}"),
    }
}

fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[test]
fn renders_one_a4_page() {
    let bytes = render(&ReportRecord::sample(ReportKind::Accident));
    let doc = Document::load_mem(&bytes).expect("parse rendered PDF");

    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1, "report must fit on a single page");

    let page_id = *pages.values().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let media_box: Vec<f64> = page
        .get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(number)
        .collect();
    let points_per_mm = 72.0 / 25.4;
    assert!((media_box[2] - 210.0 * points_per_mm).abs() < 0.5, "{media_box:?}");
    assert!((media_box[3] - 297.0 * points_per_mm).abs() < 0.5, "{media_box:?}");
}

#[test]
fn title_metadata_follows_the_form() {
    for kind in [ReportKind::Accident, ReportKind::NearMiss] {
        let bytes = render(&ReportRecord::sample(kind));
        let doc = Document::load_mem(&bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        let title = info.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(title, kind.title().as_bytes());
    }
}

#[test]
fn metadata_dates_come_from_the_record() {
    let bytes = render(&ReportRecord::sample(ReportKind::Accident));
    let needle = b"D:20240116000000+00'00'";
    assert!(
        bytes.windows(needle.len()).any(|window| window == needle),
        "creation date should be the record date, not the wall clock"
    );
}

#[test]
fn rendering_is_deterministic() {
    let record = ReportRecord::sample(ReportKind::NearMiss);
    let bytes_a = render(&record);
    let bytes_b = render(&record);

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        Sha256::digest(&bytes_a),
        Sha256::digest(&bytes_b),
        "the same record must produce byte-identical PDFs"
    );
}

#[test]
fn different_records_produce_different_documents() {
    let first = render(&ReportRecord::sample(ReportKind::Accident));
    let mut record = ReportRecord::sample(ReportKind::Accident);
    record.reporter_name = "Hanako Yamada".into();
    let second = render(&record);
    assert_ne!(Sha256::digest(&first), Sha256::digest(&second));
}

#[test]
fn writes_to_nested_output_path() {
    let dir = std::env::temp_dir().join(format!("report_sheet_test_{}", std::process::id()));
    let path = dir.join("nested").join("report.pdf");
    let written = composer()
        .render_to_file(&ReportRecord::sample(ReportKind::Accident), &path)
        .expect("write report");
    assert_eq!(written, path);
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unwritable_destination_is_an_io_error() {
    let dir = std::env::temp_dir().join(format!("report_sheet_dir_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    // A directory cannot be overwritten by a file.
    let err = composer()
        .render_to_file(&ReportRecord::sample(ReportKind::Accident), &dir)
        .unwrap_err();
    assert!(matches!(err, RenderError::Io { .. }), "{err}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn monday_and_sunday_labels() {
    let today = chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let monday = ReportRecord::from_fields_on(
        &fields(&[("kind", "near-miss"), ("datetime", "2024-01-15 10:00:00")]),
        today,
    );
    let sunday = ReportRecord::from_fields_on(
        &fields(&[("kind", "accident"), ("datetime", "2024-01-21 10:00:00")]),
        today,
    );

    let mut surface = RecordingSurface::new();
    composer().compose(&monday, &mut surface).unwrap();
    assert!(surface.texts().iter().any(|text| text.contains("(月曜日)")));

    let mut surface = RecordingSurface::new();
    composer().compose(&sunday, &mut surface).unwrap();
    assert!(surface.texts().iter().any(|text| text.contains("21 日 (日)")));
}

#[test]
fn checklist_marks_follow_the_selection() {
    let record = ReportRecord::from_fields_on(
        &fields(&[("cause_indices", "1, 6, 12")]),
        chrono::NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
    );
    let mut surface = RecordingSurface::new();
    let summary = composer().compose(&record, &mut surface).unwrap();

    let circles = surface.circles();
    assert_eq!(circles.len(), 12);
    let filled: Vec<usize> = circles
        .iter()
        .enumerate()
        .filter(|(_, circle)| circle.3)
        .map(|(index, _)| index + 1)
        .collect();
    assert_eq!(filled, vec![1, 6, 12]);

    let gaps: Vec<f64> = circles.windows(2).map(|pair| pair[0].1 - pair[1].1).collect();
    assert!(gaps.iter().all(|gap| (gap - gaps[0]).abs() < 1e-9));
    assert!(summary.checklist.is_some());
}

#[test]
fn long_narrative_stays_inside_the_margins() {
    let mut record = ReportRecord::sample(ReportKind::Accident);
    record.situation = "利用者が転倒した。".repeat(222);
    assert!(record.situation.chars().count() >= 1998);

    let mut surface = RecordingSurface::new();
    let summary = composer()
        .compose(&record, &mut surface)
        .expect("a 2,000 character situation fits on the page");
    assert_eq!(summary.state, ComposeState::Finalized);
    assert!(summary.allocation.is_compressed());
    let lowest = surface.lowest_y().unwrap();
    assert!(lowest >= 15.0 - 1e-6, "drawn below the bottom margin: {lowest}");
    assert!(
        surface.ops().iter().any(|op| matches!(
            op,
            report_sheet::surface::DrawOp::Text { text, size_pt, .. }
                if text.contains("転倒") && *size_pt < 10.0
        )),
        "the narrative should have been shrunk"
    );
}

#[test]
fn oversized_narrative_is_reported_not_clipped() {
    let mut record = ReportRecord::sample(ReportKind::NearMiss);
    record.cause = "原因".repeat(3000);
    let err = composer().render(&record).unwrap_err();
    assert!(
        matches!(
            err,
            RenderError::Layout(LayoutError::Infeasible { .. } | LayoutError::TextOverflow { .. })
        ),
        "{err}"
    );
}

/// Renders with the installed Japanese fonts, or `None` when the machine has none.
fn render_with_system_fonts(record: &ReportRecord) -> Option<Vec<u8>> {
    if !system_fonts_available() {
        return None;
    }
    let bytes = DocumentComposer::system()
        .render(record)
        .expect("render with system fonts");
    Some(bytes)
}

#[test]
fn embedded_fonts_render_one_deterministic_page() {
    let record = ReportRecord::sample(ReportKind::Accident);
    let Some(first) = render_with_system_fonts(&record) else {
        eprintln!("skipping: no Japanese system fonts installed");
        return;
    };
    let second = render_with_system_fonts(&record).unwrap();
    assert_eq!(Sha256::digest(&first), Sha256::digest(&second));

    let doc = Document::load_mem(&first).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    // Collections (.ttc) may be rejected by the embedder and replaced by a base font.
    let fonts = FontResolver::system().resolve();
    let single_face = match fonts.face(report_sheet::FontRole::Body).source() {
        FontSource::File(data) => data
            .path()
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf")),
        FontSource::Builtin(_) => false,
    };
    if single_face {
        assert!(
            first.windows(b"/FontFile".len()).any(|window| window == b"/FontFile"),
            "the resolved font should be embedded"
        );
    }
}

#[test]
fn embedded_fonts_measure_with_glyph_advances() {
    if !system_fonts_available() {
        return;
    }
    let fonts = FontResolver::system().resolve();
    assert!(!fonts.resolution(report_sheet::FontRole::Body).is_fallback());
    let face = fonts.face(report_sheet::FontRole::Body);
    assert!(!face.is_builtin());
    assert!(face.covers("事故報告書"));
    assert!(face.text_width("報告", 10.0) > 0.0);
}
