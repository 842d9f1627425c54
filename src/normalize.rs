use chrono::{Datelike, Days, NaiveDate};

use crate::decode::parse_strict_decimal;
use crate::record::{CellValue, NormalizedRecord, RawRecord};

const GERMAN_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Resolver context for the three semantic fields. Month names, key
/// synonyms and the sentinel category are injected here instead of
/// being baked into the resolver logic, so the normalizer works for
/// other locales without code changes.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Twelve month names, index 0 = January.
    pub month_names: Vec<String>,
    /// Year to assume when a month field carries a bare month name.
    /// `None` drops such records instead of guessing.
    pub fallback_year: Option<i32>,
    /// Columns holding full dates (or Excel serial dates).
    pub date_keys: Vec<String>,
    /// Columns holding free-text month labels.
    pub month_keys: Vec<String>,
    pub category_keys: Vec<String>,
    pub measure_keys: Vec<String>,
    /// Substring fallbacks scanned against all headers when no
    /// designated measure column is present.
    pub measure_synonyms: Vec<String>,
    /// Category used when no region/category column resolves.
    pub default_category: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            month_names: GERMAN_MONTHS.iter().map(|m| m.to_string()).collect(),
            fallback_year: None,
            date_keys: vec!["datum".into(), "date".into()],
            month_keys: vec!["monat".into(), "month".into()],
            category_keys: vec!["region".into(), "kategorie".into(), "category".into()],
            measure_keys: vec!["umsatz".into(), "revenue".into(), "amount".into()],
            measure_synonyms: vec![
                "umsatz".into(),
                "revenue".into(),
                "amount".into(),
                "sales".into(),
                "betrag".into(),
                "summe".into(),
            ],
            default_category: "Gesamt".into(),
        }
    }
}

impl NormalizerConfig {
    pub fn with_fallback_year(mut self, year: i32) -> Self {
        self.fallback_year = Some(year);
        self
    }

    fn month_number(&self, token: &str) -> Option<u32> {
        let lower = token.to_lowercase();
        self.month_names
            .iter()
            .position(|name| name.to_lowercase() == lower)
            .map(|idx| idx as u32 + 1)
    }
}

/// One attempt at resolving a record's period. Attempts are pure and
/// tried in a fixed priority order; the first `Some` wins.
pub type PeriodResolver = fn(&RawRecord, &NormalizerConfig) -> Option<String>;

pub const PERIOD_RESOLVERS: &[PeriodResolver] =
    &[resolve_period_from_date, resolve_period_from_month_name];

/// Resolve one raw record into its (period, category, measure) triple.
/// Records whose period cannot be resolved are dropped: they contribute
/// nothing to the aggregation, not zero.
pub fn normalize(record: &RawRecord, config: &NormalizerConfig) -> Option<NormalizedRecord> {
    let period = resolve_period(record, config)?;
    Some(NormalizedRecord {
        period,
        category: resolve_category(record, config),
        measure: resolve_measure(record, config),
    })
}

pub fn resolve_period(record: &RawRecord, config: &NormalizerConfig) -> Option<String> {
    PERIOD_RESOLVERS
        .iter()
        .find_map(|resolver| resolver(record, config))
}

/// Priority 1: a full date value in a date-designated column, truncated
/// to its year-month. Accepts native dates, ISO-like strings and Excel
/// serial numbers.
pub fn resolve_period_from_date(record: &RawRecord, config: &NormalizerConfig) -> Option<String> {
    let cell = find_cell(record, &config.date_keys)?;
    let date = match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_flexible_date(s),
        CellValue::Number(n) => date_from_excel_serial(*n),
        _ => None,
    }?;
    Some(format!("{:04}-{:02}", date.year(), date.month()))
}

/// Priority 2: a free-text month label ("März 2025"). A bare month name
/// only resolves when a fallback year is configured.
pub fn resolve_period_from_month_name(
    record: &RawRecord,
    config: &NormalizerConfig,
) -> Option<String> {
    let cell = find_cell(record, &config.month_keys)?;
    let text = cell.as_text()?;

    let mut tokens = text.split_whitespace();
    let month = tokens.find_map(|token| config.month_number(token))?;
    let year = tokens
        .find_map(parse_year_token)
        .or(config.fallback_year)?;

    Some(format!("{:04}-{:02}", year, month))
}

pub fn resolve_category(record: &RawRecord, config: &NormalizerConfig) -> String {
    find_cell(record, &config.category_keys)
        .and_then(|cell| cell.as_text())
        .map(|s| s.to_string())
        .unwrap_or_else(|| config.default_category.clone())
}

/// Measure resolution never drops a record: anything unparseable
/// contributes a neutral 0.0 to the sums.
pub fn resolve_measure(record: &RawRecord, config: &NormalizerConfig) -> f64 {
    if let Some(cell) = find_cell(record, &config.measure_keys) {
        return coerce_measure(cell).unwrap_or(0.0);
    }

    for (header, cell) in record {
        let lower = header.to_lowercase();
        if config
            .measure_synonyms
            .iter()
            .any(|syn| lower.contains(&syn.to_lowercase()))
        {
            return coerce_measure(cell).unwrap_or(0.0);
        }
    }

    0.0
}

fn coerce_measure(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => parse_strict_decimal(s),
        _ => None,
    }
}

fn find_cell<'a>(record: &'a RawRecord, keys: &[String]) -> Option<&'a CellValue> {
    keys.iter().find_map(|key| {
        record
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(key))
            .map(|(_, cell)| cell)
    })
}

fn parse_year_token(token: &str) -> Option<i32> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return Some(date);
    }
    // "YYYY-MM" month strings resolve to the first of the month
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok()
}

/// Excel serial dates count days from 1899-12-30.
fn date_from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(serial as u64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CellValue;

    fn record(cells: &[(&str, CellValue)]) -> RawRecord {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_period_from_iso_date_string() {
        let row = record(&[("Datum", CellValue::Text("2025-02-10".into()))]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-02".into()));
    }

    #[test]
    fn test_period_from_german_date_string() {
        let row = record(&[("Datum", CellValue::Text("10.02.2025".into()))]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-02".into()));
    }

    #[test]
    fn test_period_from_native_date() {
        let row = record(&[(
            "Date",
            CellValue::Date(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()),
        )]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-03".into()));
    }

    #[test]
    fn test_period_from_excel_serial() {
        // 45658 = 2025-01-01
        let row = record(&[("Datum", CellValue::Number(45658.0))]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-01".into()));
    }

    #[test]
    fn test_serial_outside_date_column_is_not_a_date() {
        let row = record(&[("Umsatz", CellValue::Number(45658.0))]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), None);
    }

    #[test]
    fn test_period_from_month_name_with_year() {
        let config = NormalizerConfig::default();
        let row = record(&[("Monat", CellValue::Text("März 2025".into()))]);
        assert_eq!(resolve_period(&row, &config), Some("2025-03".into()));

        let lower = record(&[("Monat", CellValue::Text("märz 2025".into()))]);
        assert_eq!(resolve_period(&lower, &config), Some("2025-03".into()));
    }

    #[test]
    fn test_bare_month_name_requires_fallback_year() {
        let row = record(&[("Monat", CellValue::Text("März".into()))]);

        // Without a configured year the record is unresolvable
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), None);
        assert_eq!(normalize(&row, &config), None);

        let with_year = NormalizerConfig::default().with_fallback_year(2024);
        assert_eq!(resolve_period(&row, &with_year), Some("2024-03".into()));
    }

    #[test]
    fn test_month_string_in_date_column() {
        let row = record(&[("Datum", CellValue::Text("2025-03".into()))]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-03".into()));
    }

    #[test]
    fn test_date_takes_priority_over_month_label() {
        let row = record(&[
            ("Datum", CellValue::Text("2025-02-10".into())),
            ("Monat", CellValue::Text("März 2024".into())),
        ]);
        let config = NormalizerConfig::default();
        assert_eq!(resolve_period(&row, &config), Some("2025-02".into()));
    }

    #[test]
    fn test_category_defaults_to_sentinel() {
        let config = NormalizerConfig::default();

        let with_region = record(&[("Region", CellValue::Text(" Nord ".into()))]);
        assert_eq!(resolve_category(&with_region, &config), "Nord");

        let blank = record(&[("Region", CellValue::Text("   ".into()))]);
        assert_eq!(resolve_category(&blank, &config), "Gesamt");

        let missing = record(&[("Umsatz", CellValue::Number(10.0))]);
        assert_eq!(resolve_category(&missing, &config), "Gesamt");
    }

    #[test]
    fn test_measure_designated_column() {
        let config = NormalizerConfig::default();
        let row = record(&[("Umsatz", CellValue::Number(1500.0))]);
        assert_eq!(resolve_measure(&row, &config), 1500.0);
    }

    #[test]
    fn test_measure_synonym_fallback() {
        let config = NormalizerConfig::default();
        let row = record(&[("Gesamtumsatz 2025", CellValue::Number(950.0))]);
        assert_eq!(resolve_measure(&row, &config), 950.0);

        let english = record(&[("Total Sales", CellValue::Text("120.5".into()))]);
        assert_eq!(resolve_measure(&english, &config), 120.5);
    }

    #[test]
    fn test_unparseable_measure_is_zero() {
        let config = NormalizerConfig::default();

        let currency = record(&[("Umsatz", CellValue::Text("1.500 €".into()))]);
        assert_eq!(resolve_measure(&currency, &config), 0.0);

        let missing = record(&[("Region", CellValue::Text("Nord".into()))]);
        assert_eq!(resolve_measure(&missing, &config), 0.0);
    }

    #[test]
    fn test_normalize_full_record() {
        let config = NormalizerConfig::default();
        let row = record(&[
            ("Datum", CellValue::Text("2025-02-10".into())),
            ("Region", CellValue::Text("Nord".into())),
            ("Umsatz", CellValue::Number(1500.0)),
        ]);

        let normalized = normalize(&row, &config).unwrap();
        assert_eq!(normalized.period, "2025-02");
        assert_eq!(normalized.category, "Nord");
        assert_eq!(normalized.measure, 1500.0);
    }
}
