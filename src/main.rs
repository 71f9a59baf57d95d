use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use record_scrub::files::{self, Format};
use record_scrub::model::FieldType;
use record_scrub::settings::Settings;
use record_scrub::{db, ChangeReport, Dataset};

#[derive(Parser)]
#[command(name = "record-scrub", about = "Normalize contact fields and drop duplicate records")]
struct Cli {
    /// Settings file (default: ./record-scrub.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a dataset and write the result plus a change report
    Clean {
        /// Input file (.csv, .json, .xlsx, .db/.sqlite)
        #[arg(short, long)]
        input: PathBuf,
        /// Table to read from a SQLite input, or worksheet from an Excel input
        #[arg(long)]
        table: Option<String>,
        /// Column type declaration, e.g. `email=email` (repeatable)
        #[arg(short = 't', long = "type", value_parser = parse_type_decl)]
        types: Vec<(String, FieldType)>,
        /// Duplicate key column (repeatable, order matters)
        #[arg(short, long = "key")]
        keys: Vec<String>,
        /// Text column that must not be blank (repeatable)
        #[arg(long = "require")]
        required: Vec<String>,
        /// Where to write the cleaned dataset
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Table name for SQLite output
        #[arg(long, default_value = "cleaned")]
        output_table: String,
        /// Where to write the report (default: stdout)
        #[arg(short, long)]
        report: Option<PathBuf>,
        /// Emit the report as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// List the columns of a dataset with their filled-cell counts
    Columns {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        table: Option<String>,
    },
}

fn parse_type_decl(s: &str) -> Result<(String, FieldType), String> {
    let (column, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=TYPE, got `{}`", s))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in `{}`", s));
    }
    Ok((column.to_string(), FieldType::parse(name)))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    info!(settings_loaded = ?settings, "Starting record-scrub");

    match cli.command {
        Commands::Clean {
            input,
            table,
            types,
            keys,
            required,
            output,
            output_table,
            report,
            json,
        } => {
            let t0 = Instant::now();
            let dataset = files::load(&input, table.as_deref())?;
            info!(rows = dataset.len(), input = ?input, "Loaded dataset");

            let mut type_map = settings.column_type_map(&dataset.columns);
            for (column, field_type) in types {
                type_map.insert(column, field_type);
            }
            for column in required {
                type_map.mark_required(column);
            }
            for (column, field_type) in type_map.iter() {
                if !dataset.has_column(column) {
                    warn!(column = %column, field_type = %field_type, "Declared column not found in input");
                }
            }
            let keys = if keys.is_empty() {
                settings.key_columns(&dataset.columns)
            } else {
                keys
            };

            let (cleaned, change_report) = record_scrub::run(&dataset, &type_map, &keys)?;

            if let Some(ref path) = output {
                write_output(&cleaned, &change_report, path, &output_table)?;
                info!(rows = cleaned.len(), output = ?path, "Wrote cleaned dataset");
            }
            emit_report(&change_report, report.as_deref(), json)?;
            info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Done");
            Ok(())
        }
        Commands::Columns { input, table } => {
            let dataset = files::load(&input, table.as_deref())?;
            println!("{} rows\n", dataset.len());
            for (column, filled) in dataset.filled_counts() {
                println!("  {:<32} {:>8} filled", column, filled);
            }
            Ok(())
        }
    }
}

fn write_output(cleaned: &Dataset, report: &ChangeReport, path: &Path, table: &str) -> Result<()> {
    files::save(cleaned, path, Some(table))?;
    if Format::from_path(path)? == Format::Sqlite {
        let conn = db::connect(path)?;
        db::save_report(&conn, table, report)?;
    }
    Ok(())
}

fn emit_report(report: &ChangeReport, path: Option<&Path>, json: bool) -> Result<()> {
    let text = if json {
        serde_json::to_string_pretty(report)?
    } else {
        report.to_markdown()
    };
    match path {
        Some(p) => {
            std::fs::write(p, text).with_context(|| format!("Failed to write {:?}", p))?;
            info!(report = ?p, "Wrote report");
        }
        None => println!("{}", text),
    }
    Ok(())
}
