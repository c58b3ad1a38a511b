//! Buffered result types for dbtest.
//!
//! Defines the structures a provider returns when a whole result is
//! materialized in memory (Dataset mode).

use std::fmt;
use std::mem::size_of;

/// One result set: ordered column names and ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,

    /// Rows of data, each with one value per column.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Creates an empty result set with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a result set with the given columns and rows.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rough number of bytes held by this result set.
    pub fn approximate_size(&self) -> usize {
        let names: usize = self
            .columns
            .iter()
            .map(|c| size_of::<String>() + c.len())
            .sum();
        let cells: usize = self
            .rows
            .iter()
            .map(|row| size_of::<Row>() + row.iter().map(Value::approximate_size).sum::<usize>())
            .sum();
        size_of::<Self>() + names + cells
    }
}

/// Every result set a command produced, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedResult {
    pub result_sets: Vec<ResultSet>,
}

impl BufferedResult {
    /// Creates a buffered result from its result sets.
    pub fn new(result_sets: Vec<ResultSet>) -> Self {
        Self { result_sets }
    }

    /// Returns the first result set, if the command produced any.
    pub fn first(&self) -> Option<&ResultSet> {
        self.result_sets.first()
    }

    /// Rough number of bytes held across all result sets.
    pub fn approximate_size(&self) -> usize {
        self.result_sets
            .iter()
            .map(ResultSet::approximate_size)
            .sum()
    }
}

/// A row of data from a result set.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text, including decimals, GUIDs, and temporal values already rendered.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to the text shown in a report. NULL is empty.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => {
                let mut hex = String::with_capacity(2 + b.len() * 2);
                hex.push_str("0x");
                for byte in b {
                    hex.push_str(&format!("{byte:02X}"));
                }
                hex
            }
        }
    }

    /// Rough number of bytes held by this value.
    pub fn approximate_size(&self) -> usize {
        let heap = match self {
            Value::String(s) => s.capacity(),
            Value::Bytes(b) => b.capacity(),
            _ => 0,
        };
        size_of::<Self>() + heap
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
