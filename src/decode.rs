use std::io::Cursor;
use std::path::Path;

use calamine::{Data, DataType, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use log::debug;

use crate::error::{DataStoryError, Result};
use crate::record::{CellValue, Dataset, RawRecord};

pub const CSV_MIME: &str = "text/csv";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// The two accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
}

impl FileKind {
    /// Determine the format from the file name and/or declared MIME
    /// type. Either signal is sufficient; anything else is rejected
    /// here, before any decoding attempt.
    pub fn detect(file_name: &str, mime: Option<&str>) -> Result<Self> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") || mime == Some(CSV_MIME) {
            return Ok(FileKind::Csv);
        }
        if lower.ends_with(".xlsx") || mime == Some(XLSX_MIME) {
            return Ok(FileKind::Xlsx);
        }
        Err(DataStoryError::UnsupportedFileType(file_name.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Self::detect(name, mime_guess::from_path(path).first_raw())
    }
}

/// Decode a file's bytes into header-keyed records. Zero data rows is a
/// valid result, not an error.
pub fn decode(bytes: &[u8], kind: FileKind) -> Result<Dataset> {
    match kind {
        FileKind::Csv => decode_csv(&String::from_utf8_lossy(bytes)),
        FileKind::Xlsx => decode_xlsx(bytes),
    }
}

pub fn decode_path(path: &Path) -> Result<Dataset> {
    let kind = FileKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    decode(&bytes, kind)
}

pub fn decode_csv(text: &str) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRecord::new();
        for (idx, header) in headers.iter().enumerate() {
            // Short rows map missing trailing cells to Null
            let cell = match record.get(idx) {
                Some(field) => coerce_text_cell(field),
                None => CellValue::Null,
            };
            row.insert(header.clone(), cell);
        }
        rows.push(row);
    }

    debug!("Decoded {} CSV rows ({} columns)", rows.len(), headers.len());
    Ok(Dataset { headers, rows })
}

pub fn decode_xlsx(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    // First worksheet only
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Dataset::default()),
    };

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => return Ok(Dataset::default()),
    };

    let mut rows = Vec::new();
    for sheet_row in row_iter {
        let mut row = RawRecord::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = sheet_row
                .get(idx)
                .map(cell_from_excel)
                .unwrap_or(CellValue::Null);
            row.insert(header.clone(), cell);
        }
        rows.push(row);
    }

    debug!(
        "Decoded {} spreadsheet rows ({} columns)",
        rows.len(),
        headers.len()
    );
    Ok(Dataset { headers, rows })
}

/// Typed cell from a text field. Strings matching the strict decimal
/// pattern become numbers; currency-tainted or separator-laden strings
/// stay text.
fn coerce_text_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    if let Some(number) = parse_strict_decimal(trimmed) {
        return CellValue::Number(number);
    }
    match trimmed {
        "true" | "TRUE" | "True" => CellValue::Bool(true),
        "false" | "FALSE" | "False" => CellValue::Bool(false),
        _ => CellValue::Text(trimmed.to_string()),
    }
}

fn cell_from_excel(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_datetime()
            .map(|dt| CellValue::Date(dt.date()))
            .unwrap_or(CellValue::Null),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::String(s) => coerce_text_cell(s),
    }
}

/// Parse a string as a number only if it matches a strict decimal
/// pattern: optional sign, digits with at most one decimal point,
/// optional exponent. Thousands separators and currency symbols fail
/// the pattern and are left alone.
pub fn parse_strict_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.is_empty() {
        return None;
    }

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(idx) => (&unsigned[..idx], Some(&unsigned[idx + 1..])),
        None => (unsigned, None),
    };

    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => {}
            '.' => dots += 1,
            _ => return None,
        }
    }
    // The pattern requires a digit after any decimal point
    if dots > 1 || mantissa.is_empty() || mantissa.ends_with('.') || mantissa == "." {
        return None;
    }

    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension_or_mime() {
        assert_eq!(FileKind::detect("umsatz.csv", None).unwrap(), FileKind::Csv);
        assert_eq!(
            FileKind::detect("bericht", Some(CSV_MIME)).unwrap(),
            FileKind::Csv
        );
        assert_eq!(
            FileKind::detect("umsatz.XLSX", None).unwrap(),
            FileKind::Xlsx
        );
        assert_eq!(
            FileKind::detect("bericht", Some(XLSX_MIME)).unwrap(),
            FileKind::Xlsx
        );
        assert!(matches!(
            FileKind::detect("bericht.pdf", Some("application/pdf")),
            Err(DataStoryError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_decode_csv_types_cells() {
        let dataset = decode_csv("Datum,Region,Umsatz,Aktiv\n2025-02-10,Nord,1500,true\n").unwrap();
        assert_eq!(dataset.headers, vec!["Datum", "Region", "Umsatz", "Aktiv"]);
        assert_eq!(dataset.rows.len(), 1);

        let row = &dataset.rows[0];
        assert_eq!(row["Datum"], CellValue::Text("2025-02-10".into()));
        assert_eq!(row["Region"], CellValue::Text("Nord".into()));
        assert_eq!(row["Umsatz"], CellValue::Number(1500.0));
        assert_eq!(row["Aktiv"], CellValue::Bool(true));
    }

    #[test]
    fn test_decode_csv_quoted_fields_and_short_rows() {
        let dataset = decode_csv("Region,Notiz,Umsatz\n\"Nord, West\",\"sagte \"\"ok\"\"\",10\nSüd\n").unwrap();
        assert_eq!(dataset.rows[0]["Region"], CellValue::Text("Nord, West".into()));
        assert_eq!(
            dataset.rows[0]["Notiz"],
            CellValue::Text("sagte \"ok\"".into())
        );
        // Missing trailing cells decode to Null
        assert_eq!(dataset.rows[1]["Notiz"], CellValue::Null);
        assert_eq!(dataset.rows[1]["Umsatz"], CellValue::Null);
    }

    #[test]
    fn test_decode_csv_empty_input() {
        let dataset = decode_csv("").unwrap();
        assert!(dataset.is_empty());

        let header_only = decode_csv("Datum,Region,Umsatz\n").unwrap();
        assert!(header_only.is_empty());
        assert_eq!(header_only.headers.len(), 3);
    }

    #[test]
    fn test_strict_decimal_pattern() {
        assert_eq!(parse_strict_decimal("1500"), Some(1500.0));
        assert_eq!(parse_strict_decimal("-12.5"), Some(-12.5));
        assert_eq!(parse_strict_decimal("+.5"), Some(0.5));
        assert_eq!(parse_strict_decimal("1.5e3"), Some(1500.0));

        // Currency symbols and separators are not auto-coerced
        assert_eq!(parse_strict_decimal("1.500 €"), None);
        assert_eq!(parse_strict_decimal("1,500"), None);
        assert_eq!(parse_strict_decimal("EUR 12"), None);
        assert_eq!(parse_strict_decimal("12."), None);
        assert_eq!(parse_strict_decimal("1.2.3"), None);
        assert_eq!(parse_strict_decimal("inf"), None);
        assert_eq!(parse_strict_decimal(""), None);
    }

    #[test]
    fn test_excel_cell_mapping() {
        assert_eq!(cell_from_excel(&Data::Int(30)), CellValue::Number(30.0));
        assert_eq!(
            cell_from_excel(&Data::Float(1500.5)),
            CellValue::Number(1500.5)
        );
        assert_eq!(cell_from_excel(&Data::Bool(false)), CellValue::Bool(false));
        assert_eq!(cell_from_excel(&Data::Empty), CellValue::Null);
        assert_eq!(
            cell_from_excel(&Data::String("Nord".into())),
            CellValue::Text("Nord".into())
        );
        // Numeric-looking strings get the same strict coercion as CSV
        assert_eq!(
            cell_from_excel(&Data::String("123.45".into())),
            CellValue::Number(123.45)
        );
        assert_eq!(
            cell_from_excel(&Data::String("1.500 €".into())),
            CellValue::Text("1.500 €".into())
        );
    }
}
