use std::collections::HashSet;

use tracing::{debug, info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::classify::{classify, NormalizedRow};
use super::dedupe::resolve;
use super::report::{ChangeReport, ChangeTracker};
use crate::error::{CleanError, Result};
use crate::model::{ColumnTypeMap, Dataset};

/// Clean `dataset`: normalize typed columns, drop duplicates under
/// `key_columns`, and report what happened. The input is never modified.
pub fn run(
    dataset: &Dataset,
    types: &ColumnTypeMap,
    key_columns: &[String],
) -> Result<(Dataset, ChangeReport)> {
    check_keys(types, key_columns)?;
    if key_columns.is_empty() {
        warn!("no key columns given, duplicate removal is disabled");
    }

    info!(
        rows = dataset.len(),
        typed_columns = types.len(),
        keys = ?key_columns,
        "Starting cleaning run"
    );

    let normalized = classify_rows(dataset, types);
    debug!(
        issues = normalized.iter().map(|r| r.issues.len()).sum::<usize>(),
        "Classified rows"
    );

    let groups = resolve(&normalized, key_columns);
    debug!(groups = groups.len(), "Resolved duplicate groups");

    let mut keep = vec![false; normalized.len()];
    for group in &groups {
        keep[group.survivor] = true;
    }

    let mut tracker = ChangeTracker::new(dataset.columns.len(), types);
    let mut cleaned = Dataset::new(dataset.columns.clone());
    for (raw, row) in dataset.rows.iter().zip(normalized) {
        tracker.record_row(raw, &row);
        if keep[row.index] {
            cleaned.rows.push(row.values);
        }
    }
    tracker.record_groups(&groups);

    let report = tracker.finish(cleaned.len());
    info!(
        retained = report.rows_retained,
        removed = report.duplicates_removed,
        issues = report.issues().len(),
        "Cleaning run finished"
    );
    Ok((cleaned, report))
}

/// Every key column must be typed, and listed once.
fn check_keys(types: &ColumnTypeMap, key_columns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for column in key_columns {
        if !types.contains(column) {
            return Err(CleanError::UntypedKeyColumn {
                column: column.clone(),
            });
        }
        if !seen.insert(column.as_str()) {
            return Err(CleanError::DuplicateKeyColumn {
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Rows are classified independently; output order always follows input order.
fn classify_rows(dataset: &Dataset, types: &ColumnTypeMap) -> Vec<NormalizedRow> {
    #[cfg(feature = "rayon")]
    let rows = dataset.rows.par_iter();
    #[cfg(not(feature = "rayon"))]
    let rows = dataset.rows.iter();

    rows.enumerate()
        .map(|(i, row)| classify(i, row, types))
        .collect()
}
