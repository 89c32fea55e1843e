use std::fmt;

use artisan_core::text::{capitalize_words, eq_ignore_case};
use artisan_core::{Record, SlotColumns, Table};

use crate::error::EngineError;

/// Which columns a search inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    /// Every `profession_N` column the sheet has.
    Any,
    /// Explicit names, lower-cased and trimmed, in the order given.
    Named(Vec<String>),
}

impl ColumnSelector {
    pub fn parse(input: &str) -> Self {
        let input = input.trim().to_lowercase();
        if input == "any" {
            return Self::Any;
        }
        Self::Named(input.split(',').map(|c| c.trim().to_string()).collect())
    }

    fn resolve(&self, table: &Table, slots: &SlotColumns) -> Result<Vec<usize>, EngineError> {
        let names = match self {
            Self::Any => return Ok(slots.profession_columns()),
            Self::Named(names) => names,
        };
        let mut indexes = Vec::with_capacity(names.len());
        let mut invalid = Vec::new();
        for name in names {
            match table.header().index_of(name) {
                Some(index) => indexes.push(index),
                None => invalid.push(name.clone()),
            }
        }
        if invalid.is_empty() {
            Ok(indexes)
        } else {
            Err(EngineError::InvalidColumns { columns: invalid })
        }
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Named(names) => f.write_str(&names.join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub value: String,
    pub columns: ColumnSelector,
    pub level: Option<String>,
}

impl SearchQuery {
    /// Normalizes the value and level the same way stored cells are.
    pub fn new(value: &str, columns: &str, level: Option<&str>) -> Self {
        Self {
            value: capitalize_words(value),
            columns: ColumnSelector::parse(columns),
            level: level
                .filter(|l| !l.trim().is_empty())
                .map(capitalize_words),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub header: Vec<String>,
    pub rows: Vec<Record>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first `limit` columns of the header and of every row.
    pub fn preview(&self, limit: usize) -> (Vec<String>, Vec<Vec<String>>) {
        let header = self.header.iter().take(limit).cloned().collect();
        let rows = self
            .rows
            .iter()
            .map(|r| r.cells().iter().take(limit).cloned().collect())
            .collect();
        (header, rows)
    }
}

/// Rows where some selected column equals the value and, if a level was
/// given, that column's companion `level_N` equals the level. Blank slots
/// never match. Table order is kept. An unresolvable column fails the whole search.
pub fn search(table: &Table, query: &SearchQuery) -> Result<SearchResult, EngineError> {
    let slots = SlotColumns::resolve(table.header());
    let selected = query.columns.resolve(table, &slots)?;

    let matches = |record: &Record| {
        selected.iter().any(|&column| {
            if !eq_ignore_case(record.get(column), &query.value) {
                return false;
            }
            match &query.level {
                None => true,
                Some(level) => slots
                    .companion_level(column)
                    .is_some_and(|companion| eq_ignore_case(record.get(companion), level)),
            }
        })
    };

    Ok(SearchResult {
        header: table.header().columns().to_vec(),
        rows: table.records().iter().filter(|r| !r.is_empty() && matches(r)).cloned().collect(),
    })
}
