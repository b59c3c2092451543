use std::collections::BTreeSet;

use proptest::prelude::*;
use report_sheet::budget::{BudgetItem, HeightBudgetSolver};
use report_sheet::checklist::{ChecklistItem, ChecklistRenderer, ChecklistStyle, CAUSE_LABELS};
use report_sheet::surface::RecordingSurface;
use report_sheet::units::{mm_to_pt, pt_to_mm};
use report_sheet::vertical::total_height_pt;
use report_sheet::{
    DocumentComposer, FontSet, LayoutError, PageSetup, Rect, ReportKind, ReportRecord,
};

const SENTENCE: &str = "利用者が転倒した。すぐに職員が駆け寄り、「大丈夫？」と声をかけた。";

fn narrative(len: usize) -> String {
    SENTENCE.chars().cycle().take(len).collect()
}

fn kinds() -> impl Strategy<Value = ReportKind> {
    prop_oneof![Just(ReportKind::Accident), Just(ReportKind::NearMiss)]
}

fn with_narratives(kind: ReportKind, lengths: [usize; 5]) -> ReportRecord {
    let mut record = ReportRecord::sample(kind);
    let [situation, process, cause, countermeasure, others] = lengths;
    record.situation = narrative(situation);
    record.process = narrative(process);
    record.cause = narrative(cause);
    record.countermeasure = narrative(countermeasure);
    record.others = narrative(others);
    record
}

fn budget_items() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0f64..40.0, 0.0f64..60.0), 1..8)
}

proptest! {
    #[test]
    fn unit_round_trip(value in -1000.0f64..1000.0) {
        prop_assert!((mm_to_pt(pt_to_mm(value)) - value).abs() < 1e-9);
        prop_assert!((pt_to_mm(mm_to_pt(value)) - value).abs() < 1e-9);
    }

    #[test]
    fn checklist_fills_exactly_the_selection(
        selection in prop::collection::btree_set(1usize..=12, 0..=12),
        height in 40.0f64..120.0,
    ) {
        let fonts = FontSet::builtin();
        let renderer = ChecklistRenderer::new(&fonts, ChecklistStyle::default());
        let items = ChecklistItem::from_labels(&CAUSE_LABELS, &selection);
        let mut surface = RecordingSurface::new();
        renderer
            .draw(&mut surface, &items, Rect::new(30.0, 40.0, 84.0, height))
            .unwrap();

        let circles = surface.circles();
        prop_assert_eq!(circles.len(), 12);
        let filled: BTreeSet<usize> = circles
            .iter()
            .enumerate()
            .filter(|(_, circle)| circle.3)
            .map(|(index, _)| index + 1)
            .collect();
        prop_assert_eq!(filled, selection);

        let gaps: Vec<f64> = circles.windows(2).map(|pair| pair[0].1 - pair[1].1).collect();
        for gap in &gaps {
            prop_assert!((gap - gaps[0]).abs() < 1e-9);
        }
        for circle in &circles {
            prop_assert!(circle.1 - circle.2 >= 40.0 && circle.1 + circle.2 <= 40.0 + height);
        }
    }

    #[test]
    fn solver_respects_minimums_and_budget(items in budget_items(), extra in 0.0f64..200.0) {
        let items: Vec<BudgetItem> = items
            .into_iter()
            .enumerate()
            .map(|(index, (min, target))| BudgetItem::new(format!("item {index}"), min, target))
            .collect();
        let required: f64 = items.iter().map(|item| item.min).sum();
        let wanted: f64 = items.iter().map(|item| item.target).sum();
        let available = required + extra;

        let allocation = HeightBudgetSolver::new().allocate(&items, available).unwrap();
        for (item, height) in items.iter().zip(&allocation.heights) {
            prop_assert!(*height >= item.min - 1e-9);
            prop_assert!(*height <= item.target + 1e-9);
        }
        let expected = if wanted <= available { wanted } else { available };
        prop_assert!((allocation.total() - expected).abs() < 1e-5);
    }

    #[test]
    fn solver_rejects_infeasible_budgets(items in budget_items(), short in 0.1f64..10.0) {
        let items: Vec<BudgetItem> = items
            .into_iter()
            .map(|(min, target)| BudgetItem::new("item", min + 1.0, target))
            .collect();
        let required: f64 = items.iter().map(|item| item.min).sum();
        prop_assert!(HeightBudgetSolver::new().allocate(&items, required - short).is_err());
    }

    #[test]
    fn vertical_text_height(len in 0usize..20, size in 4.0f64..30.0, spacing in 0.0f64..6.0) {
        let height = total_height_pt(len, size, spacing);
        if len == 0 {
            prop_assert_eq!(height, 0.0);
        } else {
            prop_assert!((height - (len as f64 * (size + spacing) - spacing)).abs() < 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn narratives_within_the_cap_always_fit(
        kind in kinds(),
        lengths in prop::array::uniform5(0usize..=200),
    ) {
        let record = with_narratives(kind, lengths);
        let mut surface = RecordingSurface::new();
        let composer = DocumentComposer::new(FontSet::builtin());
        let summary = composer.compose(&record, &mut surface);
        prop_assert!(summary.is_ok(), "{:?}", summary.err());
        let bottom = PageSetup::a4().margins().bottom;
        prop_assert!(surface.lowest_y().unwrap() >= bottom - 1e-6);
    }

    #[test]
    fn any_narrative_either_fits_or_draws_nothing(
        kind in kinds(),
        field in 0usize..5,
        len in 0usize..6000,
    ) {
        let mut lengths = [40; 5];
        lengths[field] = len;
        let record = with_narratives(kind, lengths);
        let mut surface = RecordingSurface::new();
        let composer = DocumentComposer::new(FontSet::builtin());
        match composer.compose(&record, &mut surface) {
            Ok(_) => {
                let bottom = PageSetup::a4().margins().bottom;
                prop_assert!(surface.lowest_y().unwrap() >= bottom - 1e-6);
            }
            Err(LayoutError::Infeasible { .. }) | Err(LayoutError::TextOverflow { .. }) => {
                prop_assert!(surface.ops().is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
