//! Fixed-width text tables for sampled result rows.
//!
//! A [`TabularReport`] is given its header once, accepts rows one at a time,
//! and widens each column to the longest cell seen so far. Rendering is
//! deterministic: the same header and rows always produce the same bytes.

use crate::error::{DbTestError, Result};
use std::fmt;

/// Gap between adjacent columns.
const COLUMN_SPACING: usize = 2;

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Pad with trailing spaces.
    #[default]
    Left,
    /// Pad with leading spaces.
    Right,
}

impl Alignment {
    /// Parses an alignment code (`L` or `R`, any case).
    pub fn parse(code: &str) -> Result<Self> {
        match code.to_uppercase().as_str() {
            "L" => Ok(Self::Left),
            "R" => Ok(Self::Right),
            other => Err(DbTestError::format(format!(
                "Invalid alignment '{other}'. Expected L or R."
            ))),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("L"),
            Self::Right => f.write_str("R"),
        }
    }
}

/// A header cell: column name plus alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub name: String,
    pub alignment: Alignment,
}

impl HeaderCell {
    /// Creates a header cell.
    pub fn new(name: impl Into<String>, alignment: Alignment) -> Self {
        Self {
            name: name.into(),
            alignment,
        }
    }
}

/// A header plus rows of display strings, rendered as an aligned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularReport {
    header: Vec<HeaderCell>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
}

impl TabularReport {
    /// Creates an empty report with the given header.
    pub fn new(header: Vec<HeaderCell>) -> Self {
        let widths = header.iter().map(|cell| display_width(&cell.name)).collect();
        Self {
            header,
            widths,
            rows: Vec::new(),
        }
    }

    /// Creates a report from `name:alignment` specs such as `"ID:R"`.
    ///
    /// Only the last `:` separates the alignment, so names may contain `:`.
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let header = specs
            .iter()
            .map(|spec| {
                let spec = spec.as_ref();
                match spec.rsplit_once(':') {
                    Some((name, code)) => Ok(HeaderCell::new(name, Alignment::parse(code)?)),
                    None => Err(DbTestError::format(format!("Invalid format: {spec}"))),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(header))
    }

    /// Appends a row, widening columns as needed.
    ///
    /// The cell count must match the header's column count.
    pub fn add_row(&mut self, cells: Vec<String>) -> Result<()> {
        if cells.len() != self.header.len() {
            return Err(DbTestError::format(format!(
                "{} values specified. {} required.",
                cells.len(),
                self.header.len()
            )));
        }
        for (width, cell) in self.widths.iter_mut().zip(&cells) {
            *width = (*width).max(display_width(cell));
        }
        self.rows.push(cells);
        Ok(())
    }

    /// Returns the current width of every column.
    pub fn column_widths(&self) -> &[usize] {
        &self.widths
    }

    /// Returns the number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the header line.
    pub fn header_text(&self) -> String {
        self.format_line(self.header.iter().map(|cell| cell.name.as_str()))
    }

    /// Renders the separator: one `-` per character of the header line.
    pub fn separator_text(&self) -> String {
        "-".repeat(display_width(&self.header_text()))
    }

    /// Renders data row `index`, or `None` when out of range.
    pub fn row_text(&self, index: usize) -> Option<String> {
        self.rows
            .get(index)
            .map(|row| self.format_line(row.iter().map(String::as_str)))
    }

    /// Renders the header, separator, and every row, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(self.header_text());
        lines.push(self.separator_text());
        lines.extend(
            self.rows
                .iter()
                .map(|row| self.format_line(row.iter().map(String::as_str))),
        );
        lines
    }

    fn format_line<'a>(&self, cells: impl Iterator<Item = &'a str>) -> String {
        let gap = " ".repeat(COLUMN_SPACING);
        let mut line = String::new();
        for (i, ((cell, width), spec)) in cells.zip(&self.widths).zip(&self.header).enumerate() {
            if i > 0 {
                line.push_str(&gap);
            }
            match spec.alignment {
                Alignment::Left => line.push_str(&format!("{cell:<width$}")),
                Alignment::Right => line.push_str(&format!("{cell:>width$}")),
            }
        }
        line
    }
}

impl fmt::Display for TabularReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}
