use slipscan_core::{Amount, SlipDate};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Column names, in file order.
pub const LEDGER_HEADER: [&str; 4] = ["Filename", "Amount", "Date", "Extracted_Text"];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error on ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One processed slip as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub filename: String,
    pub amount: Option<Amount>,
    pub date: Option<SlipDate>,
    pub raw_text: String,
}

impl LedgerRow {
    pub fn new(
        filename: impl Into<String>,
        amount: Option<Amount>,
        date: Option<SlipDate>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self { filename: filename.into(), amount, date, raw_text: raw_text.into() }
    }

    fn to_record(&self) -> [String; 4] {
        [
            self.filename.clone(),
            self.amount.map(|a| a.to_string()).unwrap_or_default(),
            self.date.as_ref().map(|d| d.to_string()).unwrap_or_default(),
            self.raw_text.clone(),
        ]
    }

    fn from_record(record: &csv::StringRecord) -> Self {
        Self {
            filename: record.get(0).unwrap_or_default().to_string(),
            amount: record.get(1).and_then(Amount::parse),
            date: record.get(2).and_then(SlipDate::from_rendered),
            raw_text: record.get(3).unwrap_or_default().to_string(),
        }
    }
}

/// A row together with its position in the ledger (1-based, append order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub index: usize,
    pub row: LedgerRow,
}

/// Append-only CSV ledger.
///
/// Appending needs `&mut self`, so rows are only ever written through a
/// single owner and cannot interleave.
pub struct Ledger {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl Ledger {
    /// Open the ledger at `path`, creating it with a header row if it does
    /// not exist yet or is empty.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let io_err = |source| LedgerError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(LEDGER_HEADER)?;
            writer.flush().map_err(io_err)?;
            debug!(path = %path.display(), "ledger created");
        }

        Ok(Self { path: path.to_path_buf(), writer })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &LedgerRow) -> Result<(), LedgerError> {
        self.writer.write_record(row.to_record())?;
        self.writer
            .flush()
            .map_err(|source| LedgerError::Io { path: self.path.clone(), source })?;
        debug!(path = %self.path.display(), file = %row.filename, "ledger row appended");
        Ok(())
    }
}

/// Read every row in append order. A missing ledger reads as empty.
pub fn read_ledger(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        // Numbered by rows kept, so skipped blank rows leave no gap.
        let index = entries.len() + 1;
        entries.push(LedgerEntry { index, row: LedgerRow::from_record(&record) });
    }
    Ok(entries)
}
