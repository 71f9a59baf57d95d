use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::model::{ColumnTypeMap, FieldType};

/// Defaults for a cleaning run. Command-line flags override these.
///
/// Sources, lowest precedence first: `record-scrub.toml` in the working
/// directory (or an explicit file), then `SCRUB_*` environment variables.
/// `SCRUB_KEY_COLUMNS=email,phone` sets the key list and
/// `SCRUB_COLUMN_TYPES__EMAIL=email` declares a column.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub key_columns: Vec<String>,
    pub required_columns: Vec<String>,
    pub column_types: BTreeMap<String, String>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p),
            None => File::with_name("record-scrub").required(false),
        };
        let cfg = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SCRUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("key_columns")
                    .with_list_parse_key("required_columns"),
            )
            .build()
            .context("failed to read settings")?;
        cfg.try_deserialize().context("invalid settings")
    }

    /// Declared types, with column names matched to `columns` ignoring case
    /// (configuration keys arrive lowercased).
    pub fn column_type_map(&self, columns: &[String]) -> ColumnTypeMap {
        let mut types = ColumnTypeMap::new();
        for (column, name) in &self.column_types {
            types.insert(match_column(columns, column), FieldType::parse(name));
        }
        for column in &self.required_columns {
            types.mark_required(match_column(columns, column));
        }
        types
    }

    pub fn key_columns(&self, columns: &[String]) -> Vec<String> {
        self.key_columns
            .iter()
            .map(|c| match_column(columns, c))
            .collect()
    }
}

fn match_column(columns: &[String], name: &str) -> String {
    columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_types_and_keys_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
key_columns = ["email", "phone"]
required_columns = ["name"]

[column_types]
email = "email"
phone = "tel"
name = "text"
zip = "zip"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.key_columns, vec!["email", "phone"]);

        let columns = vec!["Name".to_string(), "email".to_string(), "phone".to_string()];
        let types = settings.column_type_map(&columns);
        assert_eq!(types.get("phone"), Some(&FieldType::Phone));
        assert_eq!(types.get("Name"), Some(&FieldType::Text));
        assert_eq!(types.get("zip"), Some(&FieldType::Unrecognized("zip".into())));
        assert!(types.is_required("Name"));
        assert!(!types.is_required("email"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/record-scrub.toml"))).is_err());
    }
}
