//! The section tables of both report forms.
//!
//! Each builder returns the table skeleton, one budget item per top-level row and the overlays
//! that are drawn into placeholder cells afterwards.

use crate::budget::BudgetItem;
use crate::checklist::{ChecklistItem, CATEGORY_LABELS, CAUSE_LABELS};
use crate::error::LayoutError;
use crate::fonts::FontSet;
use crate::record::{
    clock_text, era_date_text, hour_minute_text, western_date_text, ReportKind, ReportRecord,
};
use crate::table::{Cell, ColumnWidth, HAlign, Padding, RowHeight, Table, TableBuilder, VAlign};
use crate::text::TextBlock;

use super::{ComposeOptions, ComposeState};

const DATE_PLACEHOLDER: &str = "　　 年 　 月 　 日 (　)";
const TIME_PLACEHOLDER: &str = "　 時 　 分頃";
const GUARDIAN_NOTE: &str = "上記について、説明を受けました。\n(説明が必要な場合に署名・捺印を頂きます)\n\n　　　　年　　　月　　　日　　　氏名";

/// Something drawn into a placeholder cell after its table.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Overlay {
    VerticalLabel {
        text: &'static str,
        row: usize,
        col: usize,
    },
    Checklist {
        row: usize,
        col: usize,
        items: Vec<ChecklistItem>,
    },
}

#[derive(Clone, Debug)]
pub(crate) struct TablePlan {
    pub table: Table,
    pub rows: Vec<BudgetItem>,
    pub overlays: Vec<Overlay>,
}

#[derive(Clone, Debug)]
pub(crate) struct SectionPlan {
    pub state: ComposeState,
    pub title: Option<&'static str>,
    pub tables: Vec<TablePlan>,
}

/// Free text that may shrink, with the height it would like to have.
struct Narrative<'r> {
    field: &'static str,
    text: &'r str,
    preferred: f64,
}

pub(crate) struct SectionBuilder<'a> {
    fonts: &'a FontSet,
    options: &'a ComposeOptions,
    record: &'a ReportRecord,
    width: f64,
}

impl<'a> SectionBuilder<'a> {
    pub fn new(
        fonts: &'a FontSet,
        options: &'a ComposeOptions,
        record: &'a ReportRecord,
        width: f64,
    ) -> Self {
        Self {
            fonts,
            options,
            record,
            width,
        }
    }

    pub fn sections(&self) -> Result<Vec<SectionPlan>, LayoutError> {
        Ok(vec![
            self.header()?,
            self.summary()?,
            self.cause()?,
            self.countermeasure()?,
        ])
    }

    fn header(&self) -> Result<SectionPlan, LayoutError> {
        let record = self.record;
        let reporter_label = match record.kind {
            ReportKind::Accident => "報告者",
            ReportKind::NearMiss => "記入者",
        };
        let mut record_date = western_date_text(record.record_date);
        if let Some(time) = record.record_time {
            record_date.push_str("  ");
            record_date.push_str(&hour_minute_text(time));
        }

        let table = TableBuilder::new(vec![
            ColumnWidth::Fixed(24.0),
            ColumnWidth::Proportional(66.0),
            ColumnWidth::Fixed(24.0),
            ColumnWidth::Proportional(56.0),
        ])
        .row(
            RowHeight::Auto,
            vec![
                self.label("事業所名"),
                self.value(&record.facility_name),
                self.label("記録日"),
                self.value(&record_date),
            ],
        )
        .row(
            RowHeight::Auto,
            vec![
                self.label(reporter_label),
                self.value(&record.reporter_name).colspan(3),
            ],
        );

        Ok(SectionPlan {
            state: ComposeState::HeaderDrawn,
            title: Some(record.kind.title()),
            tables: vec![self.fixed_plan("header", self.finish(table)?, Vec::new())?],
        })
    }

    fn summary(&self) -> Result<SectionPlan, LayoutError> {
        let record = self.record;
        let (when_label, when, where_label, narratives) = match record.kind {
            ReportKind::Accident => {
                let date = record
                    .occurred_on
                    .map(western_date_text)
                    .unwrap_or_else(|| DATE_PLACEHOLDER.to_owned());
                let time = record
                    .occurred_at
                    .map(hour_minute_text)
                    .unwrap_or_else(|| TIME_PLACEHOLDER.to_owned());
                (
                    "発生日時",
                    format!("{}  {}", date, time),
                    "発生場所",
                    [
                        ("事故発生の状況", self.narrative("situation", &record.situation, 40.0)),
                        ("経過", self.narrative("process", &record.process, 25.0)),
                    ],
                )
            }
            ReportKind::NearMiss => {
                let date = era_date_text(record.effective_occurrence_date());
                let time = record
                    .occurred_at
                    .map(clock_text)
                    .unwrap_or_else(|| TIME_PLACEHOLDER.to_owned());
                (
                    "いつ",
                    format!("{}  {}", date, time),
                    "どこで",
                    [
                        ("どうしていた時", self.narrative("process", &record.process, 25.0)),
                        (
                            "ヒヤリとした時のあらまし",
                            self.narrative("situation", &record.situation, 40.0),
                        ),
                    ],
                )
            }
        };

        let mut builder = TableBuilder::new(vec![
            ColumnWidth::Fixed(10.0),
            ColumnWidth::Fixed(28.0),
            ColumnWidth::Proportional(52.0),
            ColumnWidth::Fixed(24.0),
            ColumnWidth::Proportional(56.0),
        ])
        .row(
            RowHeight::Auto,
            vec![
                Cell::empty().rowspan(4),
                self.label(when_label),
                self.value(&when).colspan(3),
            ],
        )
        .row(
            RowHeight::Auto,
            vec![
                self.label(where_label),
                self.value(&record.location),
                self.label("対象者"),
                self.value(&record.subjects_text()),
            ],
        );
        for (label, narrative) in &narratives {
            builder = builder.row(
                RowHeight::Auto,
                vec![self.label(label), self.narrative_cell(narrative).colspan(3)],
            );
        }
        let table = self.finish(builder)?;

        let widths = table.resolve_columns(self.width)?;
        let natural = table.natural_row_heights(self.fonts, self.width)?;
        let mut rows = vec![
            BudgetItem::fixed("summary: date", natural[0]),
            BudgetItem::fixed("summary: place", natural[1]),
        ];
        for (label, narrative) in &narratives {
            let label_height = self.cell_height(&self.label_block(label), widths[1]);
            rows.push(self.narrative_item(narrative, widths[2] + widths[3] + widths[4], label_height));
        }

        Ok(SectionPlan {
            state: ComposeState::SummaryDrawn,
            title: None,
            tables: vec![TablePlan {
                table,
                rows,
                overlays: vec![Overlay::VerticalLabel {
                    text: "概要",
                    row: 0,
                    col: 0,
                }],
            }],
        })
    }

    fn cause(&self) -> Result<SectionPlan, LayoutError> {
        let record = self.record;
        let detail_label = match record.kind {
            ReportKind::Accident => "事故原因",
            ReportKind::NearMiss => "原因の詳細",
        };
        let cause = self.narrative("cause", &record.cause, 25.0);

        let mut nested = TableBuilder::new(vec![ColumnWidth::Proportional(1.0)]);
        for (index, category) in CATEGORY_LABELS.iter().enumerate() {
            let mark = if record.category == Some(index) {
                "【○】"
            } else {
                "【　】"
            };
            nested = nested.row(RowHeight::Auto, vec![self.value(&format!("{}{}", mark, category))]);
        }
        let nested = self.finish(
            nested
                .row(RowHeight::Auto, vec![self.label(detail_label)])
                .row(RowHeight::Fill, vec![self.narrative_cell(&cause)]),
        )?;

        let table = self.finish(
            TableBuilder::new(vec![
                ColumnWidth::Fixed(10.0),
                ColumnWidth::Proportional(84.0),
                ColumnWidth::Proportional(76.0),
            ])
                .row(
                    RowHeight::Auto,
                    vec![
                        Cell::empty().rowspan(2),
                        self.label("該当する事項に○をつける"),
                        self.label("分類"),
                    ],
                )
                .row(RowHeight::Auto, vec![Cell::empty(), Cell::table(nested.clone())]),
        )?;
        let widths = table.resolve_columns(self.width)?;
        let natural = table.natural_row_heights(self.fonts, self.width)?;

        // The fill row of the nested table takes whatever the other rows leave.
        let nested_natural = nested.natural_row_heights(self.fonts, widths[2])?;
        let nested_fixed: f64 = nested_natural[..nested_natural.len() - 1].iter().sum();
        let (cause_min, cause_target) = self.narrative_extent(&cause, widths[2]);

        let style = &self.options.checklist;
        let band_min = style.minimum_band_height(CAUSE_LABELS.len());
        let band_target = 2.0 * style.padding
            + (CAUSE_LABELS.len() - 1) as f64 * self.options.checklist_pitch.max(style.min_pitch);

        let rows = vec![
            BudgetItem::fixed("cause: heading", natural[0]),
            BudgetItem::new(
                "cause: checklist",
                band_min.max(nested_fixed + cause_min),
                band_target.max(nested_fixed + cause_target),
            ),
        ];

        Ok(SectionPlan {
            state: ComposeState::CauseSectionDrawn,
            title: None,
            tables: vec![TablePlan {
                table,
                rows,
                overlays: vec![
                    Overlay::VerticalLabel {
                        text: "原因",
                        row: 0,
                        col: 0,
                    },
                    Overlay::Checklist {
                        row: 1,
                        col: 1,
                        items: ChecklistItem::from_labels(&CAUSE_LABELS, &record.cause_indices),
                    },
                ],
            }],
        })
    }

    fn countermeasure(&self) -> Result<SectionPlan, LayoutError> {
        let record = self.record;
        let label = match record.kind {
            ReportKind::Accident => "対策",
            ReportKind::NearMiss => "教訓・対策",
        };
        let narratives = [
            (label, self.narrative("countermeasure", &record.countermeasure, 35.0)),
            ("その他", self.narrative("others", &record.others, 15.0)),
        ];

        let mut builder = TableBuilder::new(vec![
            ColumnWidth::Fixed(10.0),
            ColumnWidth::Fixed(28.0),
            ColumnWidth::Proportional(1.0),
        ]);
        for (index, (label, narrative)) in narratives.iter().enumerate() {
            let mut cells = Vec::with_capacity(3);
            if index == 0 {
                cells.push(Cell::empty().rowspan(narratives.len()));
            }
            cells.push(self.label(label));
            cells.push(self.narrative_cell(narrative));
            builder = builder.row(RowHeight::Auto, cells);
        }
        let table = self.finish(builder)?;
        let widths = table.resolve_columns(self.width)?;
        let rows = narratives
            .iter()
            .map(|(label, narrative)| {
                let label_height = self.cell_height(&self.label_block(label), widths[1]);
                self.narrative_item(narrative, widths[2], label_height)
            })
            .collect();

        let mut tables = vec![TablePlan {
            table,
            rows,
            overlays: vec![Overlay::VerticalLabel {
                text: "対策",
                row: 0,
                col: 0,
            }],
        }];
        if record.kind == ReportKind::Accident {
            tables.push(self.confirmation()?);
        }

        Ok(SectionPlan {
            state: ComposeState::CountermeasureSectionDrawn,
            title: None,
            tables,
        })
    }

    /// Guardian confirmation and the sign-off boxes of the accident form.
    fn confirmation(&self) -> Result<TablePlan, LayoutError> {
        let note = Cell::text(TextBlock::new(GUARDIAN_NOTE, self.options.note_size_pt))
            .valign(VAlign::Top)
            .rowspan(2);
        let table = self.finish(
            TableBuilder::new(vec![
                ColumnWidth::Fixed(10.0),
                ColumnWidth::Proportional(1.0),
                ColumnWidth::Fixed(35.0),
                ColumnWidth::Fixed(35.0),
            ])
            .row(
                RowHeight::Auto,
                vec![
                    Cell::empty().rowspan(2),
                    note,
                    self.label("管理者"),
                    self.label("報告者氏名"),
                ],
            )
            .row(
                RowHeight::Fixed(self.options.signature_height),
                vec![
                    Cell::empty(),
                    self.value(&self.record.reporter_name).align(HAlign::Center),
                ],
            ),
        )?;
        self.fixed_plan(
            "confirmation",
            table,
            vec![Overlay::VerticalLabel {
                text: "確認",
                row: 0,
                col: 0,
            }],
        )
    }

    fn finish(&self, builder: TableBuilder) -> Result<Table, LayoutError> {
        builder
            .grid(self.options.grid_pt)
            .outline(self.options.outline_pt)
            .build()
    }

    fn fixed_plan(
        &self,
        name: &str,
        table: Table,
        overlays: Vec<Overlay>,
    ) -> Result<TablePlan, LayoutError> {
        let rows = table
            .natural_row_heights(self.fonts, self.width)?
            .into_iter()
            .enumerate()
            .map(|(index, height)| BudgetItem::fixed(format!("{} row {}", name, index), height))
            .collect();
        Ok(TablePlan {
            table,
            rows,
            overlays,
        })
    }

    fn label_block(&self, text: &str) -> TextBlock {
        TextBlock::label(text, self.options.label_size_pt)
    }

    fn label(&self, text: &str) -> Cell {
        Cell::text(self.label_block(text)).align(HAlign::Center)
    }

    fn value(&self, text: &str) -> Cell {
        Cell::text(TextBlock::new(text, self.options.value_size_pt))
    }

    fn narrative<'r>(&self, field: &'static str, text: &'r str, preferred: f64) -> Narrative<'r> {
        Narrative {
            field,
            text,
            preferred,
        }
    }

    fn narrative_block(&self, narrative: &Narrative<'_>, size_pt: f64) -> TextBlock {
        TextBlock::new(narrative.text, size_pt)
    }

    fn narrative_cell(&self, narrative: &Narrative<'_>) -> Cell {
        let block = self
            .narrative_block(narrative, self.options.narrative_size_pt)
            .shrinkable(narrative.field, self.options.narrative_min_size_pt);
        Cell::text(block).valign(VAlign::Top)
    }

    /// Height of `block` in a cell of `width` with the default padding.
    fn cell_height(&self, block: &TextBlock, width: f64) -> f64 {
        let padding = Padding::default();
        let inner = (width - padding.left - padding.right).max(0.0);
        block.natural(self.fonts, inner).height() + padding.top + padding.bottom
    }

    /// Minimum and target height of a narrative cell of `width`.
    ///
    /// The minimum is what the text needs at the smallest allowed size, so a row that gets at
    /// least its minimum always fits.
    fn narrative_extent(&self, narrative: &Narrative<'_>, width: f64) -> (f64, f64) {
        let options = self.options;
        let min = self
            .cell_height(
                &self.narrative_block(narrative, options.narrative_min_size_pt),
                width,
            )
            .max(options.narrative_min_height);
        let target = self
            .cell_height(&self.narrative_block(narrative, options.narrative_size_pt), width)
            .max(narrative.preferred)
            .max(min);
        (min, target)
    }

    fn narrative_item(&self, narrative: &Narrative<'_>, width: f64, label_height: f64) -> BudgetItem {
        let (min, target) = self.narrative_extent(narrative, width);
        BudgetItem::new(
            narrative.field,
            min.max(label_height),
            target.max(label_height),
        )
    }
}
