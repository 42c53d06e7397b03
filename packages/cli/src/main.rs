#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for emergency call urgency prediction.
//!
//! Runs a single manual prediction, predicts a whole CSV file, classifies
//! call-type tokens, or shows the feature schema the loaded model expects.
//! Without a subcommand it opens an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`urgency_cli_utils::init_logger`]) so
//! log lines and the batch progress bar never fight for the terminal.

mod interactive;
mod output;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use urgency_call_models::{FieldValue, RawCallRecord};
use urgency_cli_utils::{IndicatifProgress, MultiProgress};
use urgency_features::{CategoryTables, FeatureError, Table};
use urgency_predict::config::{AppConfig, config_path};
use urgency_predict::{PredictError, Predictor, check_manual_fields};

/// File written next to the input when `batch` gets no `--output`.
const DEFAULT_OUTPUT_FILE: &str = "predictions.csv";

#[derive(Parser)]
#[command(name = "urgency_cli", about = "Emergency call urgency prediction")]
struct Cli {
    /// Config file (defaults to `URGENCY_CONFIG`, then `./urgency.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the urgency of one call from manually entered values
    Predict {
        /// Raw call-type token (e.g., "MVA")
        #[arg(long)]
        call_type: Option<String>,
        /// Incident start, `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        incident_datetime: Option<String>,
        /// Incident close, `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        close_datetime: Option<String>,
        /// First unit assignment, `YYYY-MM-DD HH:MM:SS`
        #[arg(long)]
        first_assignment_datetime: Option<String>,
        /// Feature value as `NAME=VALUE`; may be repeated
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Predict every row of a CSV file and write it back with a prediction column
    Batch {
        /// Input CSV file
        input: PathBuf,
        /// Output file (defaults to `predictions.csv` next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the category and code of call-type tokens
    Classify {
        /// Tokens to classify (e.g., "MVA" "EDP")
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Show the feature schema the loaded model expects
    Schema,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = urgency_cli_utils::init_logger();
    let cli = Cli::parse();
    let config_path = config_path(cli.config);

    let Some(command) = cli.command else {
        let predictor = load_predictor(&config_path)?;
        return interactive::run(&predictor, &multi);
    };

    let result = match command {
        Commands::Classify { tokens } => {
            output::print_classifications(&load_category_tables(&config_path)?, &tokens);
            Ok(())
        }
        Commands::Schema => {
            let predictor = load_predictor(&config_path)?;
            output::print_schema(
                predictor.schema(),
                predictor.schema_source(),
                &predictor.batch_config().prediction_column,
            );
            Ok(())
        }
        Commands::Predict {
            call_type,
            incident_datetime,
            close_datetime,
            first_assignment_datetime,
            fields,
        } => {
            let predictor = load_predictor(&config_path)?;
            let raw = manual_record(
                call_type,
                incident_datetime,
                close_datetime,
                first_assignment_datetime,
                fields,
            );
            predict_manual(&predictor, &raw)
        }
        Commands::Batch {
            input,
            output: output_path,
        } => {
            let predictor = load_predictor(&config_path)?;
            run_batch(&predictor, &input, output_path, &multi)
        }
    };

    match result {
        Err(e) if e.is_user_error() => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        other => other.map_err(Into::into),
    }
}

/// Loads the config and every artifact. Failure here is fatal.
fn load_predictor(config_path: &Path) -> Result<Predictor, PredictError> {
    let config = AppConfig::load(config_path)?;
    Predictor::from_config(&config)
}

/// Category tables for `classify`, which needs no artifacts: the config's
/// override when a config exists, otherwise the built-in tables.
fn load_category_tables(config_path: &Path) -> Result<CategoryTables, PredictError> {
    if config_path.exists() {
        AppConfig::load(config_path)?.category_tables()
    } else {
        log::debug!(
            "No config at {}; using built-in category tables",
            config_path.display()
        );
        Ok(CategoryTables::builtin())
    }
}

/// Parses a `NAME=VALUE` argument.
fn parse_field(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {arg:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in {arg:?}"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

/// Numeric text becomes a number; anything else stays text so the builder
/// can report it as a type mismatch.
fn field_value(value: String) -> FieldValue {
    value
        .parse::<f64>()
        .map_or(FieldValue::Text(value), FieldValue::Number)
}

fn manual_record(
    call_type: Option<String>,
    incident_datetime: Option<String>,
    close_datetime: Option<String>,
    first_assignment_datetime: Option<String>,
    fields: Vec<(String, String)>,
) -> RawCallRecord {
    let mut raw = RawCallRecord::new();
    if let Some(token) = call_type {
        raw = raw.with_call_type(token);
    }
    if let Some(value) = incident_datetime {
        raw = raw.with_incident_datetime(value);
    }
    if let Some(value) = close_datetime {
        raw = raw.with_close_datetime(value);
    }
    if let Some(value) = first_assignment_datetime {
        raw = raw.with_first_assignment_datetime(value);
    }
    for (name, value) in fields {
        raw = raw.with_field(name, field_value(value));
    }
    raw
}

fn predict_manual(predictor: &Predictor, raw: &RawCallRecord) -> Result<(), PredictError> {
    check_manual_fields(raw)?;
    let prediction = predictor.predict_one(raw)?;
    output::print_prediction(&prediction, predictor.builder().default_value());
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_file_name(DEFAULT_OUTPUT_FILE)
}

/// Reads `input`, predicts every row and writes the result.
fn run_batch(
    predictor: &Predictor,
    input: &Path,
    output_path: Option<PathBuf>,
    multi: &MultiProgress,
) -> Result<(), PredictError> {
    let delimiter = predictor.batch_config().delimiter_byte()?;
    let table = Table::from_path(input, delimiter).map_err(|e| match e {
        FeatureError::Io(source) => PredictError::Io {
            path: input.to_path_buf(),
            source,
        },
        other => other.into(),
    })?;

    let progress = IndicatifProgress::rows_bar(multi, "Checking columns");
    let result = match predictor.predict_table(&table, Some(progress.clone())) {
        Ok(result) => result,
        Err(e) => {
            progress.finish_and_clear();
            return Err(e);
        }
    };

    let output_path = output_path.unwrap_or_else(|| default_output_path(input));
    result.table.write_to_path(&output_path)?;
    output::print_batch_summary(&result, &output_path);

    Ok(())
}
