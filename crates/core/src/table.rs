use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::schema::Header;

/// Raw sheet contents: header row first, then data rows. Rows may be ragged.
pub type SheetValues = Vec<Vec<String>>;

/// One data row. Always exactly as wide as the table header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record(Vec<String>);

impl Record {
    pub fn blank(width: usize) -> Self {
        Self(vec![String::new(); width])
    }

    /// Pads or truncates `cells` to `width`.
    pub fn with_width(mut cells: Vec<String>, width: usize) -> Self {
        cells.resize(width, String::new());
        Self(cells)
    }

    pub fn get(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }

    /// Returns the previous value, or `None` if `index` is outside the record.
    pub fn set(&mut self, index: usize, value: impl Into<String>) -> Option<String> {
        self.0
            .get_mut(index)
            .map(|cell| std::mem::replace(cell, value.into()))
    }

    /// A reusable slot: every cell empty or whitespace.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|cell| cell.trim().is_empty())
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }

    pub fn into_cells(self) -> Vec<String> {
        self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }
}

/// In-memory snapshot of one sheet for the duration of a single command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    header: Header,
    records: Vec<Record>,
}

impl Table {
    pub fn new(header: Header) -> Self {
        Self { header, records: Vec::new() }
    }

    /// Parses sheet values. An empty sheet yields an empty header.
    pub fn from_values(values: SheetValues) -> Result<Self, CoreError> {
        let mut rows = values.into_iter();
        let header = Header::new(rows.next().unwrap_or_default())?;
        let width = header.len();
        let records = rows.map(|row| Record::with_width(row, width)).collect();
        Ok(Self { header, records })
    }

    pub fn to_values(&self) -> SheetValues {
        std::iter::once(self.header.columns().to_vec())
            .chain(self.records.iter().map(|r| r.cells().to_vec()))
            .collect()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Identity lookup policy: the first record, in table order, that
    /// satisfies `predicate`. Later duplicates are never consulted.
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&Record) -> bool,
    {
        self.records.iter().position(predicate)
    }

    /// Mutable access under the same first-match policy as [`Table::position`].
    pub fn find_mut<P>(&mut self, predicate: P) -> Option<&mut Record>
    where
        P: Fn(&Record) -> bool,
    {
        self.records.iter_mut().find(|r| predicate(r))
    }

    /// Stores `record` in the first fully-empty slot, or appends it.
    /// Returns the slot index used.
    pub fn place(&mut self, record: Record) -> usize {
        let record = Record::with_width(record.into_cells(), self.width());
        match self.position(Record::is_empty) {
            Some(index) => {
                self.records[index] = record;
                index
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        }
    }

    pub fn fingerprint(&self) -> blake3::Hash {
        fingerprint_values(&self.to_values())
    }
}

/// Content hash of raw sheet values, used to detect concurrent writers.
pub fn fingerprint_values(values: &[Vec<String>]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(values.len() as u64).to_le_bytes());
    for row in values {
        hasher.update(&(row.len() as u64).to_le_bytes());
        for cell in row {
            hasher.update(&(cell.len() as u64).to_le_bytes());
            hasher.update(cell.as_bytes());
        }
    }
    hasher.finalize()
}
