//! Spreadsheet decoding and CSV export.
//!
//! The first row is the header row. Every later row becomes a [`RawRow`]
//! keyed by those headers; rows with no content are dropped.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};

use crewcal_core::{format_date, ExportRow, RawRow, EXPORT_HEADERS};

use super::ImportError;

/// File formats the importer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Comma separated values.
    Csv,
    /// Excel workbook (`.xlsx` or legacy `.xls`).
    Workbook,
}

impl SheetFormat {
    /// Pick the format from a file name's extension.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::UnsupportedFormat` for anything but csv, xls and xlsx.
    pub fn from_filename(filename: &str) -> Result<Self, ImportError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx" | "xls") => Ok(Self::Workbook),
            _ => Err(ImportError::UnsupportedFormat),
        }
    }
}

/// Decode an uploaded file into raw rows.
///
/// # Errors
///
/// Fails on an unsupported extension, an unreadable file, or a workbook
/// without sheets.
pub fn read_sheet(filename: &str, bytes: &[u8]) -> Result<Vec<RawRow>, ImportError> {
    let rows = match SheetFormat::from_filename(filename)? {
        SheetFormat::Csv => read_csv(bytes)?,
        SheetFormat::Workbook => read_workbook(bytes)?,
    };
    Ok(rows.into_iter().filter(|row| !row.is_blank()).collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<RawRow>, ImportError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Unreadable(e.to_string()))?
        .clone();

    let mut rows: Vec<RawRow> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Unreadable(e.to_string()))?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ImportError::NoSheets)?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();

    Ok(sheet_rows
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .map(|(h, cell)| (h.clone(), cell_text(cell)))
                .collect()
        })
        .collect())
}

/// Encode export rows as CSV, header row first.
///
/// # Errors
///
/// Propagates CSV writer failures.
pub fn write_csv(rows: &[ExportRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Render a cell as the text the date parser and alias tables expect.
/// Date cells become ISO `YYYY-MM-DD`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map_or_else(|| cell.to_string(), format_date),
        other => other.to_string(),
    }
}
