//! Spreadsheet parsing into headers + string rows
//!
//! Accepts `.xlsx`/`.xls` workbooks (first worksheet) and `.csv` files.
//! Cell values are rendered as display strings up front: date cells become
//! `dd/mm/yyyy`, whole floats lose their trailing `.0`. Rows whose cells are
//! all empty are dropped. Everything downstream works on strings.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xls, Xlsx};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

/// Upload size cap for one sheet.
pub const MAX_SHEET_BYTES: usize = 10 * 1024 * 1024;

/// One data row: header string to cell string, headers untrusted.
pub type RawRow = HashMap<String, String>;

/// Parse result: header row plus data rows, in sheet order.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedSheet {
    pub fn total_rows(&self) -> u32 {
        self.rows.len() as u32
    }
}

/// Failure to turn sheet bytes into rows. Always fatal to the batch.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("sheet is {0} bytes, exceeding the 10 MB limit")]
    TooLarge(usize),
    #[error("unsupported sheet format '{0}', expected .xlsx, .xls or .csv")]
    UnsupportedFormat(String),
    #[error("failed to read workbook: {0}")]
    Workbook(String),
    #[error("workbook contains no worksheet")]
    NoWorksheet,
    #[error("sheet has no header row")]
    NoHeaders,
    #[error("sheet has no data rows")]
    NoDataRows,
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Parse sheet bytes, dispatching on the filename extension.
pub fn parse_sheet(filename: &str, bytes: &[u8]) -> Result<ParsedSheet, ParseError> {
    if bytes.len() > MAX_SHEET_BYTES {
        return Err(ParseError::TooLarge(bytes.len()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" => {
            let mut workbook: Xlsx<_> =
                Xlsx::new(Cursor::new(bytes)).map_err(|e| ParseError::Workbook(e.to_string()))?;
            let range = first_worksheet_range(&mut workbook)?;
            sheet_from_range(&range)
        }
        "xls" => {
            let mut workbook: Xls<_> =
                Xls::new(Cursor::new(bytes)).map_err(|e| ParseError::Workbook(e.to_string()))?;
            let range = first_worksheet_range(&mut workbook)?;
            sheet_from_range(&range)
        }
        "csv" => parse_csv(bytes),
        other => Err(ParseError::UnsupportedFormat(other.to_string())),
    }
}

/// Pull the first worksheet's cell range out of a workbook.
fn first_worksheet_range<RS, R>(workbook: &mut R) -> Result<calamine::Range<Data>, ParseError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoWorksheet)?;
    workbook
        .worksheet_range(&first)
        .map_err(|e| ParseError::Workbook(e.to_string()))
}

fn sheet_from_range(range: &calamine::Range<Data>) -> Result<ParsedSheet, ParseError> {
    let mut cell_rows = range.rows();
    let headers: Vec<String> = cell_rows
        .next()
        .ok_or(ParseError::NoHeaders)?
        .iter()
        .map(cell_to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    for cells in cell_rows {
        let mut row = RawRow::new();
        let mut any_value = false;
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = cells.get(i).map(cell_to_string).unwrap_or_default();
            if !value.is_empty() {
                any_value = true;
            }
            row.insert(header.clone(), value);
        }
        if any_value {
            rows.push(row);
        }
    }

    if rows.is_empty() {
        return Err(ParseError::NoDataRows);
    }

    debug!("Parsed workbook sheet: {} columns, {} rows", headers.len(), rows.len());
    Ok(ParsedSheet { headers, rows })
}

fn parse_csv(bytes: &[u8]) -> Result<ParsedSheet, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::new();
        let mut any_value = false;
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(i).unwrap_or("").trim().to_string();
            if !value.is_empty() {
                any_value = true;
            }
            row.insert(header.clone(), value);
        }
        if any_value {
            rows.push(row);
        }
    }

    if rows.is_empty() {
        return Err(ParseError::NoDataRows);
    }

    debug!("Parsed CSV sheet: {} columns, {} rows", headers.len(), rows.len());
    Ok(ParsedSheet { headers, rows })
}

/// Convert an Excel date serial to a `dd/mm/yyyy` display string.
///
/// Excel serials count days since 1899-12-30 (the 1900 system with its
/// Lotus leap-year quirk baked in, which this offset absorbs).
pub fn excel_serial_to_display(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let datetime = epoch.checked_add_signed(chrono::Duration::seconds(seconds))?;
    Some(datetime.format("%d/%m/%Y").to_string())
}

/// Render one workbook cell as a display string.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_display(dt.as_f64()).unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
