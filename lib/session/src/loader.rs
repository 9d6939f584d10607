//! Spreadsheet loading
//!
//! Reads the first worksheet of an Excel/ODS workbook (calamine) or a CSV
//! file (csv) into a [`RawTable`], optionally samples it, and cleans it into
//! a [`Catalog`].

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, DataType, Reader, Sheets};
use retailrec_core::{Catalog, CleaningReport, Error, RawTable, Result};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::info;

/// Seed used when sampling an upload
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetFormat {
    /// xlsx, xlsm, xlsb, xls, ods
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Detect from a file name or path by extension
    pub fn from_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SheetFormat::Workbook),
            "csv" => Ok(SheetFormat::Csv),
            "" => Err(Error::UnsupportedFormat(format!("'{}' has no file extension", name))),
            other => Err(Error::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// How an upload is read before cleaning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Keep a seeded random share of the rows, in (0, 1]. `None` keeps all.
    pub sample_fraction: Option<f64>,
    pub seed: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sample_fraction: None,
            seed: DEFAULT_SAMPLE_SEED,
        }
    }
}

impl LoadOptions {
    pub fn sampled(fraction: f64) -> Self {
        Self {
            sample_fraction: Some(fraction),
            ..Self::default()
        }
    }
}

/// Read a spreadsheet file into a raw table
pub fn read_path<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    match SheetFormat::from_name(&name)? {
        SheetFormat::Workbook => {
            let workbook = open_workbook_auto(path)
                .map_err(|e| Error::Load(format!("Unable to open the spreadsheet: {}", e)))?;
            read_workbook(workbook)
        }
        SheetFormat::Csv => {
            let file = std::fs::File::open(path)?;
            read_csv(file)
        }
    }
}

/// Read uploaded bytes; `name` is the original file name and picks the format
pub fn read_bytes(name: &str, bytes: Vec<u8>) -> Result<RawTable> {
    match SheetFormat::from_name(name)? {
        SheetFormat::Workbook => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
                .map_err(|e| Error::Load(format!("Unable to open the spreadsheet: {}", e)))?;
            read_workbook(workbook)
        }
        SheetFormat::Csv => read_csv(bytes.as_slice()),
    }
}

/// Read, sample and clean a spreadsheet file
pub fn load_path<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<(Catalog, CleaningReport)> {
    let path = path.as_ref();
    let table = read_path(path)?;
    info!(path = %path.display(), rows = table.len(), "Spreadsheet read");
    prepare(table, options)
}

/// Read, sample and clean uploaded bytes
pub fn load_bytes(name: &str, bytes: Vec<u8>, options: &LoadOptions) -> Result<(Catalog, CleaningReport)> {
    let table = read_bytes(name, bytes)?;
    info!(name, rows = table.len(), "Upload read");
    prepare(table, options)
}

fn prepare(table: RawTable, options: &LoadOptions) -> Result<(Catalog, CleaningReport)> {
    let table = match options.sample_fraction {
        Some(fraction) => {
            let sampled = table.sample(fraction, options.seed)?;
            info!(fraction, seed = options.seed, rows = sampled.len(), "Rows sampled");
            sampled
        }
        None => table,
    };
    Catalog::from_table(&table)
}

fn read_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<RawTable> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Load("The workbook does not contain any worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::Load(format!("Unable to read worksheet '{}': {}", sheet_name, e)))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or(Error::EmptyDataset)?
        .iter()
        .map(cell_to_string)
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|values| !is_blank(values))
        .collect();

    Ok(RawTable::new(headers, rows))
}

fn read_csv<R: Read>(source: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Load(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Load(format!("CSV row {}: {}", line + 2, e)))?;
        let values: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();
        if !is_blank(&values) {
            rows.push(values);
        }
    }

    Ok(RawTable::new(headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| cell.to_string()),
        _ => cell.to_string().trim().to_string(),
    }
}

fn is_blank(values: &[String]) -> bool {
    values.iter().all(|value| value.is_empty())
}
