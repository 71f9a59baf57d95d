use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw or normalized cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(serde_json::Number),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(_) => false,
        }
    }

    /// String form used by the normalizers. Null has none.
    pub fn as_raw_str(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

pub type Row = HashMap<String, Value>;

/// Rows plus the column order they were read in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Dataset {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row given in column order. Extra values are ignored, missing ones become Null.
    pub fn push_values<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut values = values.into_iter();
        let row = self
            .columns
            .iter()
            .map(|c| (c.clone(), values.next().unwrap_or(Value::Null)))
            .collect();
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Non-null cell count per column, in column order.
    pub fn filled_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| {
                let filled = self
                    .rows
                    .iter()
                    .filter(|r| !Dataset::cell(r, c).is_null())
                    .count();
                (c.clone(), filled)
            })
            .collect()
    }

    /// Cell lookup treating a missing column as Null.
    pub fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
        static NULL: Value = Value::Null;
        row.get(column).unwrap_or(&NULL)
    }
}

/// Semantic type a caller declares for a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Phone,
    Email,
    Website,
    Text,
    Unrecognized(String),
}

impl FieldType {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "phone" | "tel" | "mobile" => FieldType::Phone,
            "email" | "e-mail" | "mail" => FieldType::Email,
            "website" | "url" | "web" | "link" => FieldType::Website,
            "text" | "string" | "name" => FieldType::Text,
            _ => FieldType::Unrecognized(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldType::Phone => "phone",
            FieldType::Email => "email",
            FieldType::Website => "website",
            FieldType::Text => "text",
            FieldType::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared column types plus the columns marked required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTypeMap {
    types: BTreeMap<String, FieldType>,
    required: BTreeSet<String>,
}

impl ColumnTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, field_type: FieldType) -> Self {
        self.insert(column, field_type);
        self
    }

    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.required.insert(column.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, field_type: FieldType) {
        self.types.insert(column.into(), field_type);
    }

    pub fn mark_required(&mut self, column: impl Into<String>) {
        self.required.insert(column.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldType> {
        self.types.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.types.contains_key(column)
    }

    pub fn is_required(&self, column: &str) -> bool {
        self.required.contains(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldType)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
