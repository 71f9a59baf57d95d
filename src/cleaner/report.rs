use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use super::classify::{Issue, NormalizedRow};
use super::dedupe::DuplicateGroup;
use super::normalize::IssueKind;
use crate::model::{ColumnTypeMap, FieldType, Row};

/// Per-column counts for one typed column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnTally {
    pub field_type: String,
    /// Cells that ended up with a non-null value.
    pub normalized: usize,
    /// Cells whose value differs from the raw input.
    pub changed: usize,
    pub invalid: usize,
    pub empty: usize,
    pub passthrough: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemovedRow {
    pub index: usize,
    pub survivor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnHealth {
    pub column: String,
    pub flagged: usize,
    pub percent_of_rows: f64,
}

/// What a cleaning run changed or flagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReport {
    pub rows_processed: usize,
    pub rows_retained: usize,
    pub column_count: usize,
    pub columns: BTreeMap<String, ColumnTally>,
    pub issues_by_kind: BTreeMap<IssueKind, usize>,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub removed_rows: Vec<RemovedRow>,
    issues: Vec<Issue>,
}

impl ChangeReport {
    /// Every issue recorded during the run, in row order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn issue_count(&self, kind: IssueKind) -> usize {
        self.issues_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn passthrough_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, t)| t.passthrough)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_processed.saturating_sub(self.rows_retained)
    }

    pub fn percent_rows_dropped(&self) -> f64 {
        round2(percent(self.rows_dropped(), self.rows_processed))
    }

    /// Columns with at least one invalid or empty cell.
    pub fn column_health(&self) -> Vec<ColumnHealth> {
        self.columns
            .iter()
            .filter(|(_, t)| t.invalid + t.empty > 0)
            .map(|(column, t)| ColumnHealth {
                column: column.clone(),
                flagged: t.invalid + t.empty,
                percent_of_rows: round2(percent(t.invalid + t.empty, self.rows_processed)),
            })
            .collect()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Cleaning Report\n");
        out.push_str(&format!(
            "- Rows processed: {}\n- Rows retained: {}\n- Rows dropped: {} ({:.2}%)\n- Columns: {}\n",
            self.rows_processed,
            self.rows_retained,
            self.rows_dropped(),
            self.percent_rows_dropped(),
            self.column_count
        ));
        out.push_str(&format!(
            "- Duplicate groups: {}\n- Duplicates removed: {}\n",
            self.duplicate_groups, self.duplicates_removed
        ));

        if !self.columns.is_empty() {
            out.push_str("\n### Columns\n");
            out.push_str("| Column | Type | Normalized | Changed | Invalid | Empty |\n");
            out.push_str("|---|---|---|---|---|---|\n");
            for (column, t) in &self.columns {
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} |\n",
                    column, t.field_type, t.normalized, t.changed, t.invalid, t.empty
                ));
            }
        }

        let passthrough = self.passthrough_columns();
        if !passthrough.is_empty() {
            out.push_str(&format!(
                "\nPassed through unchanged: {}\n",
                passthrough.iter().join(", ")
            ));
        }

        out.push_str("\n### Issues by kind\n");
        for kind in IssueKind::ALL {
            out.push_str(&format!("- {}: {}\n", kind.label(), self.issue_count(kind)));
        }

        let health = self.column_health();
        if !health.is_empty() {
            out.push_str("\n### Column health\n");
            for h in health {
                out.push_str(&format!(
                    "- {}: {} flagged ({:.2}% of rows)\n",
                    h.column, h.flagged, h.percent_of_rows
                ));
            }
        }

        if !self.removed_rows.is_empty() {
            out.push_str("\n### Removed duplicates\n");
            let by_survivor = self
                .removed_rows
                .iter()
                .into_group_map_by(|r| r.survivor)
                .into_iter()
                .sorted_by_key(|(survivor, _)| *survivor);
            for (survivor, removed) in by_survivor {
                out.push_str(&format!(
                    "- row {} kept, removed {}\n",
                    survivor,
                    removed.iter().map(|r| r.index).join(", ")
                ));
            }
        }

        out
    }
}

/// Accumulates report counts over one run. Owned by the orchestrator.
pub struct ChangeTracker {
    rows_processed: usize,
    column_count: usize,
    columns: BTreeMap<String, ColumnTally>,
    issues: Vec<Issue>,
    duplicate_groups: usize,
    removed_rows: Vec<RemovedRow>,
}

impl ChangeTracker {
    pub fn new(column_count: usize, types: &ColumnTypeMap) -> Self {
        let columns = types
            .iter()
            .map(|(column, field_type)| {
                let tally = ColumnTally {
                    field_type: field_type.to_string(),
                    passthrough: matches!(field_type, FieldType::Unrecognized(_)),
                    ..ColumnTally::default()
                };
                (column.clone(), tally)
            })
            .collect();
        ChangeTracker {
            rows_processed: 0,
            column_count,
            columns,
            issues: Vec::new(),
            duplicate_groups: 0,
            removed_rows: Vec::new(),
        }
    }

    pub fn record_row(&mut self, raw: &Row, normalized: &NormalizedRow) {
        self.rows_processed += 1;
        for (column, tally) in self.columns.iter_mut() {
            let (Some(before), Some(after)) = (raw.get(column), normalized.get(column)) else {
                continue;
            };
            if !after.is_null() {
                tally.normalized += 1;
            }
            if before != after {
                tally.changed += 1;
            }
        }
        for issue in &normalized.issues {
            if let Some(tally) = self.columns.get_mut(&issue.column) {
                match issue.kind {
                    IssueKind::InvalidFormat => tally.invalid += 1,
                    IssueKind::Empty => tally.empty += 1,
                    IssueKind::UnrecognizedType => {}
                }
            }
        }
        self.issues.extend(normalized.issues.iter().cloned());
    }

    pub fn record_groups(&mut self, groups: &[DuplicateGroup]) {
        for group in groups.iter().filter(|g| g.is_duplicate()) {
            self.duplicate_groups += 1;
            self.removed_rows.extend(group.removed().map(|index| RemovedRow {
                index,
                survivor: group.survivor,
            }));
        }
        self.removed_rows.sort_by_key(|r| r.index);
    }

    pub fn finish(self, rows_retained: usize) -> ChangeReport {
        let mut issues_by_kind: BTreeMap<IssueKind, usize> =
            IssueKind::ALL.into_iter().map(|k| (k, 0)).collect();
        for issue in &self.issues {
            *issues_by_kind.entry(issue.kind).or_default() += 1;
        }
        ChangeReport {
            rows_processed: self.rows_processed,
            rows_retained,
            column_count: self.column_count,
            columns: self.columns,
            issues_by_kind,
            duplicate_groups: self.duplicate_groups,
            duplicates_removed: self.removed_rows.len(),
            removed_rows: self.removed_rows,
            issues: self.issues,
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::classify::classify;
    use crate::model::Value;

    fn types() -> ColumnTypeMap {
        ColumnTypeMap::new()
            .with("email", FieldType::Email)
            .with("zip", FieldType::parse("zip"))
    }

    fn raw(email: Value, zip: &str) -> Row {
        [
            ("email".to_string(), email),
            ("zip".to_string(), Value::text(zip)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn tallies_per_column_and_kind() {
        let types = types();
        let mut tracker = ChangeTracker::new(2, &types);
        let rows = [
            raw(Value::text("A@B.com"), "02139"),
            raw(Value::text("a@b.com"), "02139"),
            raw(Value::text("broken"), "x"),
            raw(Value::Null, "y"),
        ];
        for (i, r) in rows.iter().enumerate() {
            tracker.record_row(r, &classify(i, r, &types));
        }
        let report = tracker.finish(4);

        let email = &report.columns["email"];
        assert_eq!(email.normalized, 2);
        assert_eq!(email.changed, 2);
        assert_eq!(email.invalid, 1);
        assert_eq!(email.empty, 1);
        assert_eq!(report.columns["zip"].changed, 0);
        assert_eq!(report.passthrough_columns(), vec!["zip"]);

        assert_eq!(report.issue_count(IssueKind::InvalidFormat), 1);
        assert_eq!(report.issue_count(IssueKind::Empty), 1);
        assert_eq!(report.issue_count(IssueKind::UnrecognizedType), 0);
        assert_eq!(report.issues().len(), 2);
        assert_eq!(report.issues()[0].row, 2);

        let health = report.column_health();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].flagged, 2);
        assert_eq!(health[0].percent_of_rows, 50.0);
    }

    #[test]
    fn removed_rows_point_at_survivors() {
        let mut tracker = ChangeTracker::new(1, &ColumnTypeMap::new());
        tracker.record_groups(&[
            DuplicateGroup {
                members: vec![0, 3, 5],
                survivor: 3,
            },
            DuplicateGroup {
                members: vec![1],
                survivor: 1,
            },
        ]);
        let report = tracker.finish(4);
        assert_eq!(report.duplicate_groups, 1);
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(
            report.removed_rows,
            vec![
                RemovedRow { index: 0, survivor: 3 },
                RemovedRow { index: 5, survivor: 3 },
            ]
        );
        assert!(report.to_markdown().contains("- row 3 kept, removed 0, 5"));
    }

    #[test]
    fn percentages_round_to_two_places() {
        let mut tracker = ChangeTracker::new(0, &ColumnTypeMap::new());
        let empty = NormalizedRow {
            index: 0,
            values: Row::new(),
            issues: Vec::new(),
        };
        for _ in 0..3 {
            tracker.record_row(&Row::new(), &empty);
        }
        let report = tracker.finish(2);
        assert_eq!(report.rows_dropped(), 1);
        assert_eq!(report.percent_rows_dropped(), 33.33);

        let none = ChangeTracker::new(0, &ColumnTypeMap::new()).finish(0);
        assert_eq!(none.percent_rows_dropped(), 0.0);
    }
}
