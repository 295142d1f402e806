//! Append-only `.xlsx` store for extracted contacts.
//!
//! Each append reads the existing rows with calamine, adds one row and
//! rewrites the workbook with rust_xlsxwriter. A missing file is created with
//! the header row on first write. Appends and downloads from this process are
//! serialized through one lock; the file work itself runs on the blocking
//! pool.
//!
//! Empty cells are not stored, so a record with every field missing leaves
//! no trace in the data sheet. The real row count is kept on a hidden
//! second sheet and used to restore trailing blank rows on read.

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use rust_xlsxwriter::Workbook;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::schema::{ContactRecord, SPREADSHEET_HEADER};

/// Hidden sheet holding the number of rows on the data sheet.
const ROW_COUNT_SHEET: &str = "row_count";
/// Longest string Excel accepts in one cell.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("failed to read spreadsheet: {0}")]
    Read(#[from] XlsxError),
    #[error("failed to write spreadsheet: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("spreadsheet has no worksheet")]
    NoWorksheet,
    #[error("spreadsheet task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to the spreadsheet file. Cheap to clone; clones share the lock.
#[derive(Debug, Clone)]
pub struct SpreadsheetStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SpreadsheetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name offered to downloads.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.xlsx".to_string())
    }

    /// Append one record, creating the file with a header row if needed.
    pub async fn append(&self, record: &ContactRecord) -> Result<(), SpreadsheetError> {
        let _guard = self.lock.lock().await;

        let path = self.path.clone();
        let row = record.to_row().to_vec();
        let total = tokio::task::spawn_blocking(move || append_row(&path, row)).await??;

        debug!("Appended row {} to {:?}", total - 1, self.path);
        Ok(())
    }

    /// All rows including the header. Empty when the file does not exist.
    #[cfg(test)]
    pub async fn read_rows(&self) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if path.exists() {
                read_rows_from(&path)
            } else {
                Ok(Vec::new())
            }
        })
        .await?
    }

    /// Raw file bytes for download, `None` when nothing has been written yet.
    pub async fn read_bytes(&self) -> Result<Option<Vec<u8>>, SpreadsheetError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read, extend and rewrite the workbook. Returns the new row count.
fn append_row(path: &Path, row: Vec<String>) -> Result<usize, SpreadsheetError> {
    let mut rows = if path.exists() {
        read_rows_from(path)?
    } else {
        Vec::new()
    };
    if rows.is_empty() {
        rows.push(SPREADSHEET_HEADER.iter().map(|h| h.to_string()).collect());
    }
    rows.push(row);

    write_rows_to(path, &rows)?;
    Ok(rows.len())
}

fn read_rows_from(path: &Path) -> Result<Vec<Vec<String>>, SpreadsheetError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)??;

    let width = SPREADSHEET_HEADER.len();
    let mut rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| {
            let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
            cells.resize(width.max(cells.len()), String::new());
            cells
        })
        .collect();

    if let Some(count) = stored_row_count(&mut workbook) {
        if count > rows.len() {
            rows.resize(count, vec![String::new(); width]);
        }
    }
    Ok(rows)
}

/// Row count from the bookkeeping sheet; `None` for files written without it.
fn stored_row_count<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> Option<usize> {
    let range = workbook.worksheet_range(ROW_COUNT_SHEET).ok()?;
    match range.get_value((0, 0))? {
        Data::Float(f) if *f >= 0.0 => Some(*f as usize),
        Data::Int(i) if *i >= 0 => Some(*i as usize),
        _ => None,
    }
}

fn write_rows_to(path: &Path, rows: &[Vec<String>]) -> Result<(), SpreadsheetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32, c as u16, truncate_cell(value))?;
            }
        }
    }

    workbook
        .add_worksheet()
        .set_name(ROW_COUNT_SHEET)?
        .set_hidden(true)
        .write_number(0, 0, rows.len() as f64)?;

    workbook.save(path)?;
    Ok(())
}

/// Clip a value to [`MAX_CELL_CHARS`] characters.
fn truncate_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Convert a calamine cell to its string form.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
