use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::config::ImportConfig;
use crate::error::{EngineError, Result};

/// A single row of raw string cells. Types live in the schema, not here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    cells: Vec<String>,
}

impl Row {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn remove(&mut self, index: usize) -> String {
        self.cells.remove(index)
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Identifies a column either by header name or by position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(name: &'a str) -> Self {
        ColumnRef::Name(name)
    }
}

impl From<usize> for ColumnRef<'_> {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

/// Check that every row has exactly one cell per header column
pub(crate) fn check_row_lengths(header: &[String], rows: &[Row]) -> Result<()> {
    let expected = header.len();
    match rows.iter().position(|row| row.len() != expected) {
        Some(row) => Err(EngineError::DataIntegrity {
            row,
            expected,
            found: rows[row].len(),
        }),
        None => Ok(()),
    }
}

/// Remove one column from a header and every row in a single step
pub(crate) fn remove_column_at(header: &mut Vec<String>, rows: &mut [Row], index: usize) -> String {
    for row in rows.iter_mut() {
        row.remove(index);
    }
    header.remove(index)
}

/// Immutable in-memory table of raw string cells, built once on import.
///
/// The only mutation after construction is `remove_column`, which drops the
/// header entry and the matching cell of every row together.
#[derive(Debug, Clone)]
pub struct TabularDataSource {
    name: String,
    header: Vec<String>,
    rows: Vec<Row>,
}

impl TabularDataSource {
    /// Build a table, rejecting the whole import if any row length is off
    pub fn new(name: impl Into<String>, header: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        check_row_lengths(&header, &rows)?;
        Ok(Self {
            name: name.into(),
            header,
            rows,
        })
    }

    /// Parse delimited text. The first record is the header.
    pub fn from_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        config: &ImportConfig,
    ) -> Result<Self> {
        let name = name.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(config.delimiter_byte()?)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| clean_cell(h, config.trim_cells))
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != header.len() {
                return Err(EngineError::DataIntegrity {
                    row: index,
                    expected: header.len(),
                    found: record.len(),
                });
            }
            rows.push(
                record
                    .iter()
                    .map(|cell| clean_cell(cell, config.trim_cells))
                    .collect(),
            );
        }

        info!(
            target: "import",
            "Imported '{}' with {} columns and {} rows",
            name,
            header.len(),
            rows.len()
        );

        Self::new(name, header, rows)
    }

    /// Load a delimited file; the table is named after the file stem
    pub fn from_path<P: AsRef<Path>>(path: P, config: &ImportConfig) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        let file = File::open(path)?;
        Self::from_reader(name, file, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the header; callers may mutate it freely
    pub fn header(&self) -> Vec<String> {
        self.header.clone()
    }

    /// Copy of every row; callers may mutate it freely
    pub fn rows(&self) -> Vec<Row> {
        self.rows.clone()
    }

    pub fn column_names(&self) -> &[String] {
        &self.header
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Raw values of one column in row order
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove a column from the header and every row
    pub fn remove_column<'a>(&mut self, column: impl Into<ColumnRef<'a>>) -> Result<String> {
        let index = match column.into() {
            ColumnRef::Name(name) => self
                .column_index(name)
                .ok_or_else(|| EngineError::UnknownField(name.to_string()))?,
            ColumnRef::Index(index) if index < self.header.len() => index,
            ColumnRef::Index(index) => {
                return Err(EngineError::UnknownField(format!("#{}", index)));
            }
        };

        let removed = remove_column_at(&mut self.header, &mut self.rows, index);
        debug!(target: "import", "Removed column '{}' from '{}'", removed, self.name);
        Ok(removed)
    }
}

fn clean_cell(cell: &str, trim: bool) -> String {
    if trim {
        cell.trim().to_string()
    } else {
        cell.to_string()
    }
}
