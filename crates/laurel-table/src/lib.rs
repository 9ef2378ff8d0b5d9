//! RFC 4180 CSV codec for Laurel's staging and report tables.
//!
//! Converts between CSV text and an in-memory [`Table`] of string cells. Pure
//! synchronous; no I/O, database or numeric dependencies. Typing of cells is
//! left to callers through [`Record::get`] and [`Record::number`].
//!
//! # Quick start
//!
//! ```no_run
//! use laurel_table::{Table, parse};
//!
//! let csv = "external_id,h_index\nA1,42\n";
//! let table: Table = parse(csv).unwrap();
//! for record in table.records() {
//!   println!("{} -> {}", record.get("external_id").unwrap(), record.number("h_index").unwrap());
//! }
//! ```

pub mod error;
mod parse;
mod serialize;

pub use error::{Error, Result};

// ─── Table ───────────────────────────────────────────────────────────────────

/// A header row plus zero or more data rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
  header: Vec<String>,
  rows:   Vec<Vec<String>>,
}

impl Table {
  /// An empty table with the given column names. Names must be unique.
  pub fn new<I, S>(header: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let header: Vec<String> = header.into_iter().map(Into::into).collect();
    if header.is_empty() {
      return Err(Error::MissingHeader);
    }
    for (i, name) in header.iter().enumerate() {
      if header[..i].contains(name) {
        return Err(Error::DuplicateColumn(name.clone()));
      }
    }
    Ok(Self { header, rows: Vec::new() })
  }

  pub fn header(&self) -> &[String] { &self.header }

  pub fn rows(&self) -> &[Vec<String>] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.header.iter().position(|h| h == name)
  }

  pub fn has_column(&self, name: &str) -> bool { self.column_index(name).is_some() }

  /// Append a row. Its width must match the header.
  pub fn push_row<I, S>(&mut self, row: I) -> Result<()>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let row: Vec<String> = row.into_iter().map(Into::into).collect();
    if row.len() != self.header.len() {
      return Err(Error::RaggedRow {
        // Line numbers are 1-based and the header occupies line 1.
        line:     self.rows.len() + 2,
        expected: self.header.len(),
        found:    row.len(),
      });
    }
    self.rows.push(row);
    Ok(())
  }

  /// Every cell of one column, top to bottom.
  pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &str> + '_> {
    let idx = self
      .column_index(name)
      .ok_or_else(|| Error::UnknownColumn(name.to_owned()))?;
    Ok(self.rows.iter().map(move |r| r[idx].as_str()))
  }

  pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
    self
      .rows
      .iter()
      .enumerate()
      .map(move |(index, cells)| Record { table: self, index, cells })
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A borrowed view of one data row that resolves cells by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
  table: &'a Table,
  index: usize,
  cells: &'a [String],
}

impl<'a> Record<'a> {
  /// Zero-based position of this row among the data rows.
  pub fn index(&self) -> usize { self.index }

  pub fn get(&self, column: &str) -> Result<&'a str> {
    let idx = self
      .table
      .column_index(column)
      .ok_or_else(|| Error::UnknownColumn(column.to_owned()))?;
    Ok(self.cells[idx].as_str())
  }

  /// The cell parsed as a number. Surrounding whitespace is ignored.
  pub fn number(&self, column: &str) -> Result<f64> {
    let raw = self.get(column)?;
    raw.trim().parse::<f64>().map_err(|_| Error::NotNumeric {
      row:    self.index,
      column: column.to_owned(),
      value:  raw.to_owned(),
    })
  }

  /// The cell parsed as a boolean flag: `true`/`false`, `1`/`0`, or
  /// `True`/`False`.
  pub fn flag(&self, column: &str) -> Result<bool> {
    let raw = self.get(column)?;
    match raw.trim() {
      "1" | "true" | "True" | "TRUE" => Ok(true),
      "0" | "false" | "False" | "FALSE" => Ok(false),
      _ => Err(Error::NotNumeric {
        row:    self.index,
        column: column.to_owned(),
        value:  raw.to_owned(),
      }),
    }
  }
}

/// A cell counts as null when it is empty after trimming.
pub fn is_null(cell: &str) -> bool { cell.trim().is_empty() }

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse CSV text into a [`Table`].
///
/// The first non-blank line is the header. Blank lines are skipped, both
/// `\n` and `\r\n` line endings are accepted, and a leading UTF-8 BOM is
/// ignored. Every data row must have as many cells as the header.
pub fn parse(input: &str) -> Result<Table> {
  let mut lines = parse::parse_records(input)?.into_iter();
  let (_, header) = lines.next().ok_or(Error::MissingHeader)?;
  let mut table = Table::new(header)?;

  for (line, cells) in lines {
    if cells.len() != table.header.len() {
      return Err(Error::RaggedRow {
        line,
        expected: table.header.len(),
        found: cells.len(),
      });
    }
    table.rows.push(cells);
  }

  Ok(table)
}

/// Serialize `table` as CSV with `\n` line endings, quoting only cells that
/// need it.
pub fn serialize(table: &Table) -> String { serialize::serialize(table) }

// ─── Round-trip test ─────────────────────────────────────────────────────────
