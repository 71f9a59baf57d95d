use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{params, types::Value as SqlValue, types::ValueRef, Connection};

use crate::cleaner::{ChangeReport, IssueKind};
use crate::model::{Dataset, Value};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    Ok(conn)
}

pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// The single table of a database, or an error naming the candidates.
pub fn only_table(conn: &Connection) -> Result<String> {
    let mut tables = list_tables(conn)?;
    match tables.len() {
        1 => Ok(tables.remove(0)),
        0 => bail!("database has no tables"),
        _ => bail!("database has several tables, pick one of: {}", tables.join(", ")),
    }
}

pub fn load_table(conn: &Connection, table: &str) -> Result<Dataset> {
    let sql = format!("SELECT * FROM {}", quote_ident(table));
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to read table {}", table))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut dataset = Dataset::new(columns.clone());

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::from(n),
                ValueRef::Real(f) => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                ValueRef::Text(t) => Value::text(String::from_utf8_lossy(t)),
                ValueRef::Blob(_) => bail!("column `{}` holds binary data", column),
            };
            values.push(value);
        }
        dataset.push_values(values);
    }
    Ok(dataset)
}

/// Write `dataset` into a new table. Fails if the table already exists.
/// Table creation and inserts commit together, so a failed write leaves nothing behind.
pub fn save_table(conn: &Connection, table: &str, dataset: &Dataset) -> Result<()> {
    if dataset.columns.is_empty() {
        bail!("cannot write a dataset without columns");
    }
    let cols: Vec<String> = dataset.columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; cols.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        cols.join(", "),
        placeholders
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", quote_ident(table), cols.join(", ")),
        [],
    )
    .with_context(|| format!("Failed to create table {}", table))?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for row in &dataset.rows {
            let values: Vec<SqlValue> = dataset
                .columns
                .iter()
                .map(|c| to_sql(Dataset::cell(row, c)))
                .collect();
            stmt.execute(rusqlite::params_from_iter(values))
                .with_context(|| format!("Failed to write table {}", table))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Store report totals as metric/value pairs keyed by the output table.
pub fn save_report(conn: &Connection, table: &str, report: &ChangeReport) -> Result<()> {
    let mut metrics: Vec<(String, String)> = vec![
        ("rows_processed".into(), report.rows_processed.to_string()),
        ("rows_retained".into(), report.rows_retained.to_string()),
        ("duplicate_groups".into(), report.duplicate_groups.to_string()),
        ("duplicates_removed".into(), report.duplicates_removed.to_string()),
        (
            "percent_rows_dropped".into(),
            format!("{:.2}", report.percent_rows_dropped()),
        ),
    ];
    for kind in IssueKind::ALL {
        metrics.push((
            format!("issues:{}", kind.label()),
            report.issue_count(kind).to_string(),
        ));
    }
    for (column, tally) in &report.columns {
        metrics.push((format!("column:{}:invalid", column), tally.invalid.to_string()));
        metrics.push((format!("column:{}:empty", column), tally.empty.to_string()));
        metrics.push((format!("column:{}:changed", column), tally.changed.to_string()));
    }
    metrics.push(("markdown".into(), report.to_markdown()));

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cleaning_report (
            output_table TEXT NOT NULL,
            metric       TEXT NOT NULL,
            value        TEXT NOT NULL,
            PRIMARY KEY (output_table, metric)
        );
        ",
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO cleaning_report (output_table, metric, value) VALUES (?, ?, ?)",
        )?;
        for (metric, value) in metrics {
            stmt.execute(params![table, metric, value])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::run;
    use crate::model::{ColumnTypeMap, FieldType};

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "
            CREATE TABLE contacts (name TEXT, email TEXT, visits INTEGER, score REAL);
            INSERT INTO contacts VALUES ('Ann', ' ANN@X.COM ', 3, 1.5);
            INSERT INTO contacts VALUES ('Ann B', 'ann@x.com', NULL, NULL);
            ",
        )
        .unwrap();
    }

    #[test]
    fn loads_typed_sqlite_cells() {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        assert_eq!(only_table(&conn).unwrap(), "contacts");

        let ds = load_table(&conn, "contacts").unwrap();
        assert_eq!(ds.columns, vec!["name", "email", "visits", "score"]);
        assert_eq!(ds.rows[0]["visits"], Value::from(3));
        assert_eq!(ds.rows[0]["score"].to_string(), "1.5");
        assert_eq!(ds.rows[1]["visits"], Value::Null);
    }

    #[test]
    fn cleaned_table_and_report_are_written() {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        let ds = load_table(&conn, "contacts").unwrap();
        let types = ColumnTypeMap::new().with("email", FieldType::Email);
        let (cleaned, report) = run(&ds, &types, &["email".to_string()]).unwrap();

        save_table(&conn, "contacts_clean", &cleaned).unwrap();
        save_report(&conn, "contacts_clean", &report).unwrap();

        let back = load_table(&conn, "contacts_clean").unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.rows[0]["email"], Value::text("ann@x.com"));
        assert_eq!(back.rows[0]["visits"], Value::from(3));

        let removed: String = conn
            .query_row(
                "SELECT value FROM cleaning_report WHERE output_table = ? AND metric = ?",
                params!["contacts_clean", "duplicates_removed"],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(removed, "1");

        assert!(save_table(&conn, "contacts_clean", &cleaned).is_err());
    }

    #[test]
    fn failed_write_leaves_no_table() {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        let pages: i64 = conn.pragma_query_value(None, "page_count", |r| r.get(0)).unwrap();
        conn.pragma_update(None, "max_page_count", pages + 1).unwrap();

        let mut ds = Dataset::new(vec!["notes".into()]);
        for _ in 0..8 {
            ds.push_values([Value::text("x".repeat(64 * 1024))]);
        }
        assert!(save_table(&conn, "big", &ds).is_err());

        assert_eq!(list_tables(&conn).unwrap(), vec!["contacts"]);
        save_table(&conn, "small", &Dataset::new(vec!["a".into()])).unwrap();
        assert_eq!(list_tables(&conn).unwrap(), vec!["contacts", "small"]);
    }

    #[test]
    fn several_tables_need_a_choice() {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        conn.execute_batch("CREATE TABLE other (a TEXT);").unwrap();
        let err = only_table(&conn).unwrap_err();
        assert!(err.to_string().contains("contacts, other"));
    }
}
