use serde::Serialize;

use super::normalize::{normalize, IssueKind};
use crate::model::{ColumnTypeMap, Row, Value};

/// A normalization problem for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub row: usize,
    pub column: String,
    pub raw_value: Value,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// Position of the source row in the input dataset.
    pub index: usize,
    pub values: Row,
    pub issues: Vec<Issue>,
}

impl NormalizedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn filled_count(&self) -> usize {
        self.values.values().filter(|v| !v.is_null()).count()
    }
}

/// Normalize every typed column present in `row`; everything else is copied as is.
pub fn classify(index: usize, row: &Row, types: &ColumnTypeMap) -> NormalizedRow {
    let mut values = row.clone();
    let mut issues = Vec::new();

    for (column, field_type) in types.iter() {
        let Some(raw) = row.get(column) else {
            continue;
        };
        let out = normalize(raw, field_type, types.is_required(column));
        if let Some(kind) = out.issue {
            issues.push(Issue {
                row: index,
                column: column.clone(),
                raw_value: raw.clone(),
                kind,
            });
        }
        values.insert(column.clone(), out.value);
    }

    NormalizedRow {
        index,
        values,
        issues,
    }
}
