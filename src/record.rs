//! The report record and its conversion from a flat field mapping.
//!
//! Every field is optional. Missing values become empty strings, empty selections or the
//! supplied "today"; malformed values are replaced the same way and logged, never rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use log::{debug, warn};

use crate::checklist::{CATEGORY_LABELS, CAUSE_LABELS};
use crate::resolved::Resolved;

/// Weekday labels, Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// Separator used when several subject names are shown together.
pub const SUBJECT_SEPARATOR: &str = "、";

/// Which form a record is rendered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Accident situation and countermeasure report.
    #[default]
    Accident,
    /// Near-miss ("hiyari-hatto") report.
    NearMiss,
}

impl ReportKind {
    /// Document title printed at the top of the page and stored in the PDF metadata.
    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Accident => "事故状況・対策報告書",
            ReportKind::NearMiss => "ヒヤリハット報告書",
        }
    }

    /// Short identifier used on the command line and in field mappings.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Accident => "accident",
            ReportKind::NearMiss => "near-miss",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a report kind name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown report kind '{0}' (expected 'accident' or 'near-miss')")]
pub struct UnknownKind(pub String);

impl FromStr for ReportKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accident" | "事故" | "事故報告" => Ok(ReportKind::Accident),
            "near-miss" | "near_miss" | "nearmiss" | "hiyari" | "hiyari-hatto"
            | "ヒヤリハット" => Ok(ReportKind::NearMiss),
            _ => Err(UnknownKind(value.to_owned())),
        }
    }
}

/// All fields of one report, as consumed by the composer.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRecord {
    /// Form template.
    pub kind: ReportKind,
    /// Name of the facility.
    pub facility_name: String,
    /// Name of the person filing the report.
    pub reporter_name: String,
    /// Day the report was written.
    pub record_date: NaiveDate,
    /// Time the report was written, if known.
    pub record_time: Option<NaiveTime>,
    /// Day of the incident, if known.
    pub occurred_on: Option<NaiveDate>,
    /// Time of the incident, if known.
    pub occurred_at: Option<NaiveTime>,
    /// Where it happened.
    pub location: String,
    /// People involved.
    pub subject_names: Vec<String>,
    /// What happened.
    pub situation: String,
    /// How it developed, or what was being done at the time.
    pub process: String,
    /// Why it happened.
    pub cause: String,
    /// What will be done about it.
    pub countermeasure: String,
    /// Anything else.
    pub others: String,
    /// Checked cause items, numbered 1 to 12.
    pub cause_indices: BTreeSet<usize>,
    /// Selected cause category, numbered 0 to 3.
    pub category: Option<usize>,
}

impl ReportRecord {
    /// Creates an empty record of `kind` written on `record_date`.
    pub fn new(kind: ReportKind, record_date: NaiveDate) -> Self {
        Self {
            kind,
            facility_name: String::new(),
            reporter_name: String::new(),
            record_date,
            record_time: None,
            occurred_on: None,
            occurred_at: None,
            location: String::new(),
            subject_names: Vec::new(),
            situation: String::new(),
            process: String::new(),
            cause: String::new(),
            countermeasure: String::new(),
            others: String::new(),
            cause_indices: BTreeSet::new(),
            category: None,
        }
    }

    /// Builds a record from a flat mapping, using the local date as "today".
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Self {
        Self::from_fields_on(fields, chrono::Local::now().date_naive())
    }

    /// Builds a record from a flat mapping.
    ///
    /// `today` replaces missing or malformed dates, which keeps the conversion deterministic.
    pub fn from_fields_on(fields: &BTreeMap<String, String>, today: NaiveDate) -> Self {
        let get = |key: &str| fields.get(key).map(|value| value.trim()).unwrap_or("");
        let first = |keys: &[&str]| {
            keys.iter()
                .map(|key| get(key))
                .find(|value| !value.is_empty())
                .unwrap_or("")
                .to_owned()
        };

        let kind = match get("kind") {
            "" => ReportKind::default(),
            value => value.parse().unwrap_or_else(|err: UnknownKind| {
                warn!("{}; using the accident form", err);
                ReportKind::Accident
            }),
        };

        let (record_date, record_time) = match get("record_date") {
            "" => (today, None),
            value => parse_date_time(value, today, "record_date").into_inner(),
        };
        let record_time = record_time.or_else(|| parse_time_field(get("record_time")));

        let (occurred_on, occurred_at) = occurrence(get, today);

        let mut record = Self::new(kind, record_date);
        record.facility_name = get("facility_name").to_owned();
        record.reporter_name = get("reporter_name").to_owned();
        record.record_time = record_time;
        record.occurred_on = occurred_on;
        record.occurred_at = occurred_at;
        record.location = get("location").to_owned();
        record.subject_names = split_names(&first(&["subject_names", "subject_name"]));
        record.situation = first(&["situation", "details"]);
        record.process = first(&["process", "context"]);
        record.cause = get("cause").to_owned();
        record.countermeasure = get("countermeasure").to_owned();
        record.others = get("others").to_owned();
        record.cause_indices = parse_cause_indices(get("cause_indices"));
        record.category = parse_category(get("category_index"));
        record
    }

    /// Subject names joined with the full-width comma.
    pub fn subjects_text(&self) -> String {
        self.subject_names.join(SUBJECT_SEPARATOR)
    }

    /// Day used on the near-miss date line: the occurrence date, else the record date.
    pub fn effective_occurrence_date(&self) -> NaiveDate {
        self.occurred_on.unwrap_or(self.record_date)
    }

    /// A filled-in example record for `kind`.
    pub fn sample(kind: ReportKind) -> Self {
        let on = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        let mut record = Self::new(kind, on(2024, 1, 16));
        record.facility_name = "ひまわり放課後等デイサービス".into();
        record.reporter_name = "山田 花子".into();
        record.occurred_on = Some(on(2024, 1, 15));
        record.occurred_at = NaiveTime::from_hms_opt(15, 40, 0);
        record.location = "送迎車の乗降場所".into();
        record.subject_names = vec!["佐藤 太郎".into(), "鈴木 次郎".into()];
        record.situation = "送迎車から降りる際、児童がステップで足を滑らせ、職員が腕を支えたため転倒は免れた。".into();
        record.process = "降車の順番を待っている間に、後ろの児童に押される形となった。".into();
        record.cause = "雨でステップが濡れており、職員が降車する児童一人ひとりに付き添えていなかった。".into();
        record.countermeasure = "雨天時はステップの水気を拭き取り、降車は一人ずつ職員が手を添えて行う。".into();
        record.others = "保護者へはお迎え時に口頭で説明済み。".into();
        record.cause_indices = [2, 6, 12].into_iter().collect();
        record.category = Some(0);
        record
    }
}

fn occurrence<'f>(
    get: impl Fn(&str) -> &'f str,
    today: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveTime>) {
    let split_date = (
        get("date_year").parse::<i32>(),
        get("date_month").parse::<u32>(),
        get("date_day").parse::<u32>(),
    );
    let split_time = (get("time_hour").parse::<u32>(), get("time_min").parse::<u32>());

    let mut date = None;
    let mut time = None;
    if let (Ok(year), Ok(month), Ok(day)) = split_date {
        date = NaiveDate::from_ymd_opt(year, month, day);
        if date.is_none() {
            warn!("Ignoring invalid occurrence date {}-{}-{}", year, month, day);
        }
    }
    if let (Ok(hour), minute) = split_time {
        time = NaiveTime::from_hms_opt(hour, minute.unwrap_or(0), 0);
    }

    match get("datetime") {
        "" => {}
        value => {
            let (parsed_date, parsed_time) = parse_date_time(value, today, "datetime").into_inner();
            date = date.or(Some(parsed_date));
            time = time.or(parsed_time);
        }
    }
    (date, time)
}

/// Parses `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY年MM月DD日`, optionally followed by a time.
pub fn parse_date_time(value: &str, today: NaiveDate, field: &str) -> Resolved<(NaiveDate, Option<NaiveTime>)> {
    let value = value.trim();
    let (date_part, time_part) = match value.find(|ch: char| ch == ' ' || ch == 'T') {
        Some(split) => (&value[..split], Some(value[split + 1..].trim())),
        None => (value, None),
    };

    let date = ["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok());

    match date {
        Some(date) => Resolved::Preferred((date, time_part.and_then(parse_time))),
        None => {
            warn!("Unparseable date '{}' in {}; using {}", value, field, today);
            Resolved::Fallback((today, None))
        }
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    ["%H:%M:%S", "%H:%M", "%H時%M分"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

fn parse_time_field(value: &str) -> Option<NaiveTime> {
    if value.is_empty() {
        return None;
    }
    let parsed = parse_time(value);
    if parsed.is_none() {
        warn!("Ignoring unparseable time '{}'", value);
    }
    parsed
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(|ch: char| matches!(ch, ',' | '、' | '，' | '\n'))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses a list such as `1,6,12` or `[1, 6, 12]`; invalid or out-of-range entries are dropped.
pub fn parse_cause_indices(value: &str) -> BTreeSet<usize> {
    value
        .split(|ch: char| matches!(ch, ',' | '、' | ' ' | '[' | ']'))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<usize>() {
            Ok(index) if (1..=CAUSE_LABELS.len()).contains(&index) => Some(index),
            Ok(index) => {
                warn!("Dropping cause index {} outside 1..={}", index, CAUSE_LABELS.len());
                None
            }
            Err(_) => {
                warn!("Dropping non-numeric cause index '{}'", token);
                None
            }
        })
        .collect()
}

fn parse_category(value: &str) -> Option<usize> {
    match value {
        "" | "-1" => None,
        value => match value.parse::<usize>() {
            Ok(index) if index < CATEGORY_LABELS.len() => Some(index),
            _ => {
                warn!("Ignoring category index '{}'", value);
                None
            }
        },
    }
}

/// Single-character weekday label for `date`.
pub fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}

/// Japanese eras with their first day, newest first.
const ERAS: [(&str, i32, u32, u32); 5] = [
    ("令和", 2019, 5, 1),
    ("平成", 1989, 1, 8),
    ("昭和", 1926, 12, 25),
    ("大正", 1912, 7, 30),
    ("明治", 1868, 1, 25),
];

/// Japanese era name and year for `date`.
///
/// Dates before the Meiji era are given as Western years under `西暦`.
pub fn era_year(date: NaiveDate) -> (&'static str, i32) {
    for (name, year, month, day) in ERAS {
        if NaiveDate::from_ymd_opt(year, month, day).map_or(false, |start| date >= start) {
            return (name, date.year() - year + 1);
        }
    }
    debug!("Date {} predates the Meiji era; using the Western year", date);
    ("西暦", date.year())
}

/// `2024 年 1 月 15 日 (月)` style date text.
pub fn western_date_text(date: NaiveDate) -> String {
    format!(
        "{} 年 {} 月 {} 日 ({})",
        date.year(),
        date.month(),
        date.day(),
        weekday_label(date)
    )
}

/// `令和 6 年 1 月 15 日 (月曜日)` style date text.
pub fn era_date_text(date: NaiveDate) -> String {
    let (era, year) = era_year(date);
    format!(
        "{} {} 年 {} 月 {} 日 ({}曜日)",
        era,
        year,
        date.month(),
        date.day(),
        weekday_label(date)
    )
}

/// `午後 3時 40分頃` style time text.
pub fn clock_text(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!(
        "{} {}時 {}分頃",
        if pm { "午後" } else { "午前" },
        hour,
        time.minute()
    )
}

/// `15 時 40 分頃` style time text.
pub fn hour_minute_text(time: NaiveTime) -> String {
    format!("{} 時 {} 分頃", time.hour(), time.minute())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn weekday_labels_start_on_monday() {
        assert_eq!(weekday_label(date(2024, 1, 15)), "月");
        assert_eq!(weekday_label(date(2024, 1, 21)), "日");
        assert_eq!(weekday_label(date(2024, 1, 20)), "土");
    }

    #[test]
    fn era_boundaries() {
        assert_eq!(era_year(date(2019, 5, 1)), ("令和", 1));
        assert_eq!(era_year(date(2019, 4, 30)), ("平成", 31));
        assert_eq!(era_year(date(2024, 1, 15)), ("令和", 6));
        assert_eq!(era_year(date(1989, 1, 8)), ("平成", 1));
        assert_eq!(era_year(date(1989, 1, 7)), ("昭和", 64));
        assert_eq!(era_year(date(1926, 12, 25)), ("昭和", 1));
        assert_eq!(era_year(date(1926, 12, 24)), ("大正", 15));
        assert_eq!(era_year(date(1912, 7, 29)), ("明治", 45));
        assert_eq!(era_year(date(1850, 3, 1)), ("西暦", 1850));
    }

    #[test]
    fn clock_text_uses_twelve_hour_clock() {
        assert_eq!(clock_text(NaiveTime::from_hms_opt(0, 5, 0).unwrap()), "午前 12時 5分頃");
        assert_eq!(clock_text(NaiveTime::from_hms_opt(15, 40, 0).unwrap()), "午後 3時 40分頃");
        assert_eq!(clock_text(NaiveTime::from_hms_opt(12, 0, 0).unwrap()), "午後 12時 0分頃");
    }

    #[test]
    fn date_formats() {
        let today = date(2000, 1, 1);
        for value in ["2024-01-15", "2024/01/15", "2024年1月15日"] {
            let parsed = parse_date_time(value, today, "test");
            assert_eq!(parsed, Resolved::Preferred((date(2024, 1, 15), None)));
        }
        let with_time = parse_date_time("2024-01-15 09:30:00", today, "test").into_inner();
        assert_eq!(with_time.1, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn malformed_date_falls_back_to_today() {
        let today = date(2025, 3, 1);
        let parsed = parse_date_time("yesterday-ish", today, "test");
        assert_eq!(parsed, Resolved::Fallback((today, None)));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let today = date(2025, 3, 1);
        let record = ReportRecord::from_fields_on(&BTreeMap::new(), today);
        assert_eq!(record, ReportRecord::new(ReportKind::Accident, today));
    }

    #[test]
    fn field_mapping_is_read() {
        let today = date(2025, 3, 1);
        let record = ReportRecord::from_fields_on(
            &fields(&[
                ("kind", "near-miss"),
                ("datetime", "2024-01-15 15:40:00"),
                ("subject_name", "佐藤, 鈴木"),
                ("context", "送迎中"),
                ("details", "転びそうになった"),
                ("cause_indices", "[1, 6, 12, 13, x]"),
                ("category_index", "2"),
            ]),
            today,
        );
        assert_eq!(record.kind, ReportKind::NearMiss);
        assert_eq!(record.occurred_on, Some(date(2024, 1, 15)));
        assert_eq!(record.occurred_at, NaiveTime::from_hms_opt(15, 40, 0));
        assert_eq!(record.subjects_text(), "佐藤、鈴木");
        assert_eq!(record.process, "送迎中");
        assert_eq!(record.situation, "転びそうになった");
        assert_eq!(record.cause_indices, [1, 6, 12].into_iter().collect());
        assert_eq!(record.category, Some(2));
        assert_eq!(record.record_date, today);
    }

    #[test]
    fn split_date_fields_take_precedence() {
        let record = ReportRecord::from_fields_on(
            &fields(&[
                ("date_year", "2024"),
                ("date_month", "1"),
                ("date_day", "21"),
                ("time_hour", "9"),
                ("time_min", "5"),
            ]),
            date(2025, 3, 1),
        );
        assert_eq!(record.occurred_on, Some(date(2024, 1, 21)));
        assert_eq!(record.occurred_at, NaiveTime::from_hms_opt(9, 5, 0));
    }

    #[test]
    fn kind_names() {
        assert_eq!("accident".parse::<ReportKind>(), Ok(ReportKind::Accident));
        assert_eq!("Near_Miss".parse::<ReportKind>(), Ok(ReportKind::NearMiss));
        assert!("memo".parse::<ReportKind>().is_err());
    }
}
