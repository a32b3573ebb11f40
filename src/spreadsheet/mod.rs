//! Spreadsheet reading and writing
//!
//! Tables are read from CSV (`csv`) or from Excel/OpenDocument workbooks
//! (`calamine`, first worksheet only) and written back as CSV or XLSX
//! (`rust_xlsxwriter`). The first row is always the header row.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Extensions accepted for upload, lower-case
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls", "ods"];

/// Errors from spreadsheet I/O
#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("Unsupported spreadsheet format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to read spreadsheet: {0}")]
    Read(String),

    #[error("Failed to write spreadsheet: {0}")]
    Write(String),
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadsheetFormat {
    Csv,
    Xlsx,
    Xlsm,
    Xls,
    Ods,
}

impl SpreadsheetFormat {
    /// Format for a bare extension (case-insensitive, no dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            "xlsm" => Some(Self::Xlsm),
            "xls" => Some(Self::Xls),
            "ods" => Some(Self::Ods),
            _ => None,
        }
    }

    /// Format for a file path, from its extension
    pub fn from_path(path: &Path) -> Result<Self, SpreadsheetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| SpreadsheetError::UnsupportedFormat(ext.to_string()))
    }

    /// Format used when writing a processed copy of this format.
    /// Only CSV and XLSX are written.
    pub fn output_format(self) -> Self {
        match self {
            Self::Csv => Self::Csv,
            _ => Self::Xlsx,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Xlsm => "xlsm",
            Self::Xls => "xls",
            Self::Ods => "ods",
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Date or date-time as an Excel serial (days since 1899-12-30)
    DateTime(f64),
    /// Elapsed time in days
    Duration(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Cell::DateTime(serial) => match serial_to_datetime(*serial) {
                Some(dt) if dt.time() == NaiveTime::MIN => write!(f, "{}", dt.format("%Y-%m-%d")),
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{}", serial),
            },
            Cell::Duration(days) => {
                let total_secs = (days * SECONDS_PER_DAY).round() as i64;
                let sign = if total_secs < 0 { "-" } else { "" };
                let secs = total_secs.abs();
                write!(f, "{}{}:{:02}:{:02}", sign, secs / 3600, (secs / 60) % 60, secs % 60)
            }
        }
    }
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Day zero of the Excel serial date system (1900 based, after the leap-year bug)
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * SECONDS_PER_DAY * 1000.0).round() as i64;
    excel_epoch().checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    (dt - excel_epoch()).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}

/// Serial for an ISO 8601 date or date-time as stored in OpenDocument files
fn parse_iso_datetime(text: &str) -> Option<f64> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(datetime_to_serial)
}

/// Days for an ISO 8601 duration such as `PT12H30M15S` or `P1DT2H`
fn parse_iso_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let body = text.strip_prefix('P')?;

    let mut seconds = 0.0;
    let mut in_time = false;
    let mut number = String::new();
    for c in body.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            unit => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                seconds += value
                    * match (unit, in_time) {
                        ('W', false) => 7.0 * SECONDS_PER_DAY,
                        ('D', false) => SECONDS_PER_DAY,
                        ('H', true) => 3600.0,
                        ('M', true) => 60.0,
                        ('S', true) => 1.0,
                        _ => return None,
                    };
            }
        }
    }
    if !number.is_empty() {
        return None;
    }

    let days = seconds / SECONDS_PER_DAY;
    Some(if negative { -days } else { days })
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

/// A header row plus data rows.
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, padding headers and rows to a common width
    pub fn new(mut headers: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        headers.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Self { headers, rows }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of the given column, in row order
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| row.get(index).unwrap_or(&Cell::Empty))
    }

    /// Append a column at the right edge. `values` must have one entry per row.
    pub fn append_column(&mut self, header: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.headers.push(header.to_string());
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.push(values.next().unwrap_or(Cell::Empty));
        }
    }
}

/// Read the first sheet of a spreadsheet file
pub fn read_table(path: &Path) -> Result<Table, SpreadsheetError> {
    match SpreadsheetFormat::from_path(path)? {
        SpreadsheetFormat::Csv => read_csv(path),
        _ => read_workbook(path),
    }
}

/// Write a table; the extension of `path` picks CSV or XLSX
pub fn write_table(table: &Table, path: &Path) -> Result<(), SpreadsheetError> {
    match SpreadsheetFormat::from_path(path)? {
        SpreadsheetFormat::Csv => write_csv(table, path),
        SpreadsheetFormat::Xlsx => write_xlsx(table, path),
        other => Err(SpreadsheetError::UnsupportedFormat(format!(
            "{} (output must be csv or xlsx)",
            other.extension()
        ))),
    }
}

fn read_csv(path: &Path) -> Result<Table, SpreadsheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| SpreadsheetError::Read(format!("{}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SpreadsheetError::Read(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SpreadsheetError::Read(e.to_string()))?;
        rows.push(record.iter().map(Cell::from).collect());
    }

    Ok(Table::new(headers, rows))
}

fn read_workbook(path: &Path) -> Result<Table, SpreadsheetError> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| SpreadsheetError::Read(format!("{}: {}", path.display(), e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| SpreadsheetError::Read(e.to_string()))?,
        None => return Ok(Table::default()),
    };

    // The used range starts at the first non-empty cell; pad back to column A
    // so the leftmost sheet column stays the first column.
    let leading_cols = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let pad = || std::iter::repeat(Cell::Empty).take(leading_cols);

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => pad()
            .map(|_| String::new())
            .chain(header_row.iter().map(|c| convert_data(c).to_string()))
            .collect(),
        None => return Ok(Table::default()),
    };

    let rows = rows
        .map(|row| pad().chain(row.iter().map(convert_data)).collect())
        .collect();

    Ok(Table::new(headers, rows))
}

fn convert_data(data: &calamine::Data) -> Cell {
    use calamine::Data;

    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Duration(dt.as_f64()),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::DateTimeIso(text) => parse_iso_datetime(text)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::from(text.as_str())),
        Data::DurationIso(text) => parse_iso_duration(text)
            .map(Cell::Duration)
            .unwrap_or_else(|| Cell::from(text.as_str())),
        other => Cell::Text(other.to_string()),
    }
}

fn write_csv(table: &Table, path: &Path) -> Result<(), SpreadsheetError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| SpreadsheetError::Write(format!("{}: {}", path.display(), e)))?;

    writer
        .write_record(&table.headers)
        .map_err(|e| SpreadsheetError::Write(e.to_string()))?;

    for row in &table.rows {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| SpreadsheetError::Write(e.to_string()))?;
    }

    writer
        .flush()
        .map_err(|e| SpreadsheetError::Write(e.to_string()))
}

fn write_xlsx(table: &Table, path: &Path) -> Result<(), SpreadsheetError> {
    use rust_xlsxwriter::{Format, Workbook};

    let to_write_err = |e: rust_xlsxwriter::XlsxError| SpreadsheetError::Write(e.to_string());

    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let duration_format = Format::new().set_num_format("[h]:mm:ss");

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string(0, xlsx_col(col)?, header.as_str())
            .map_err(to_write_err)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(r + 1)
            .map_err(|_| SpreadsheetError::Write("too many rows for xlsx".to_string()))?;
        for (c, cell) in row.iter().enumerate() {
            let col = xlsx_col(c)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet
                        .write_string(row_num, col, s.as_str())
                        .map_err(to_write_err)?;
                }
                Cell::Number(n) => {
                    worksheet
                        .write_number(row_num, col, *n)
                        .map_err(to_write_err)?;
                }
                Cell::Bool(b) => {
                    worksheet
                        .write_boolean(row_num, col, *b)
                        .map_err(to_write_err)?;
                }
                Cell::DateTime(serial) => {
                    let format = if serial.fract() == 0.0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet
                        .write_number_with_format(row_num, col, *serial, format)
                        .map_err(to_write_err)?;
                }
                Cell::Duration(days) => {
                    worksheet
                        .write_number_with_format(row_num, col, *days, &duration_format)
                        .map_err(to_write_err)?;
                }
            }
        }
    }

    workbook.save(path).map_err(to_write_err)
}

fn xlsx_col(index: usize) -> Result<u16, SpreadsheetError> {
    u16::try_from(index).map_err(|_| SpreadsheetError::Write("too many columns for xlsx".to_string()))
}
