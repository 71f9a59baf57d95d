//! Field normalization and duplicate removal for tabular contact records.

pub mod cleaner;
pub mod db;
pub mod error;
pub mod files;
pub mod model;
pub mod settings;

pub use cleaner::{run, ChangeReport};
pub use error::CleanError;
pub use model::{ColumnTypeMap, Dataset, FieldType, Row, Value};
