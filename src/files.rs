//! Reading and writing datasets from CSV, JSON, Excel and SQLite files.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};

use crate::db;
use crate::model::{Dataset, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Excel,
    Sqlite,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Format::Excel),
            "db" | "sqlite" | "sqlite3" => Ok(Format::Sqlite),
            _ => bail!("unsupported file type {:?} (expected .csv, .json, .xlsx, .db or .sqlite)", path),
        }
    }
}

/// Load a dataset. `table` names the SQLite table or the worksheet to read.
pub fn load(path: &Path, table: Option<&str>) -> Result<Dataset> {
    match Format::from_path(path)? {
        Format::Csv => read_csv(path),
        Format::Json => {
            let text =
                fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
            parse_json(&text).with_context(|| format!("Failed to parse {:?}", path))
        }
        Format::Excel => read_excel(path, table),
        Format::Sqlite => {
            let conn = db::connect(path)?;
            let table = match table {
                Some(t) => t.to_string(),
                None => db::only_table(&conn)?,
            };
            db::load_table(&conn, &table)
        }
    }
}

/// Write a dataset. SQLite output goes to `table` (default `cleaned`).
pub fn save(dataset: &Dataset, path: &Path, table: Option<&str>) -> Result<()> {
    match Format::from_path(path)? {
        Format::Csv => write_csv(dataset, path),
        Format::Json => {
            let text = serde_json::to_string_pretty(&to_json(dataset))?;
            fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))
        }
        Format::Excel => bail!("Excel output is not supported, write .csv or .json instead"),
        Format::Sqlite => {
            let conn = db::connect(path)?;
            db::save_table(&conn, table.unwrap_or("cleaned"), dataset)
        }
    }
}

pub fn read_csv(path: &Path) -> Result<Dataset> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut dataset = Dataset::new(columns);
    for record in reader.records() {
        let record = record?;
        dataset.push_values(record.iter().map(|cell| {
            if cell.is_empty() {
                Value::Null
            } else {
                Value::text(cell)
            }
        }));
    }
    Ok(dataset)
}

pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(
            dataset
                .columns
                .iter()
                .map(|c| Dataset::cell(row, c).to_string()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Read one worksheet (the first unless `sheet` is given). The first row holds
/// the column names.
pub fn read_excel(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Failed to open Excel file {:?}", path))?;
    let index = match sheet {
        None => 0,
        Some(name) => {
            let names = workbook.sheet_names();
            names.iter().position(|n| n == name).ok_or_else(|| {
                anyhow!("no worksheet `{}`, pick one of: {}", name, names.join(", "))
            })?
        }
    };
    let range = workbook
        .worksheet_range_at(index)
        .ok_or_else(|| anyhow!("no worksheet found in {:?}", path))?
        .with_context(|| format!("Failed to read worksheet from {:?}", path))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Dataset::default());
    };
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("column_{}", i + 1),
            name => name.to_string(),
        })
        .collect();

    let mut dataset = Dataset::new(columns);
    for row in rows {
        dataset.push_values(row.iter().map(cell_value));
    }
    Ok(dataset)
}

/// Whole numbers keep their float form here; the phone rule reads them as digits.
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::text(s.as_str()),
        Data::Int(n) => Value::from(*n),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::text(other.to_string()),
    }
}

/// Parse an array of flat objects. Columns are taken in first-seen order.
pub fn parse_json(text: &str) -> Result<Dataset> {
    let parsed: serde_json::Value = serde_json::from_str(text)?;
    let Some(items) = parsed.as_array() else {
        bail!("expected a JSON array of records");
    };

    let mut columns: Vec<String> = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else {
            bail!("expected every record to be a JSON object");
        };
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut dataset = Dataset::new(columns);
    for obj in items.iter().filter_map(|i| i.as_object()) {
        let mut row = Vec::with_capacity(dataset.columns.len());
        for column in &dataset.columns {
            let cell = match obj.get(column) {
                None | Some(serde_json::Value::Null) => Value::Null,
                Some(serde_json::Value::Bool(b)) => Value::text(b.to_string()),
                Some(serde_json::Value::Number(n)) => Value::Number(n.clone()),
                Some(serde_json::Value::String(s)) => Value::text(s.as_str()),
                Some(_) => bail!("column `{}` holds nested data; flatten it first", column),
            };
            row.push(cell);
        }
        dataset.push_values(row);
    }
    Ok(dataset)
}

pub fn to_json(dataset: &Dataset) -> serde_json::Value {
    let records = dataset
        .rows
        .iter()
        .map(|row| {
            let obj: serde_json::Map<String, serde_json::Value> = dataset
                .columns
                .iter()
                .map(|c| {
                    let v = match Dataset::cell(row, c) {
                        Value::Null => serde_json::Value::Null,
                        Value::Number(n) => serde_json::Value::Number(n.clone()),
                        Value::Text(s) => serde_json::Value::String(s.clone()),
                    };
                    (c.clone(), v)
                })
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::Value::Array(records)
}
