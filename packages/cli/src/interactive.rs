//! Interactive menu for predictions without memorizing CLI flags.
//!
//! Recoverable errors (bad input, missing columns) are shown and the menu
//! comes back; anything else ends the session.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use urgency_call_models::RawCallRecord;
use urgency_call_models::features::CALL_CATEGORY_ENCODED;
use urgency_cli_utils::MultiProgress;
use urgency_predict::{PredictError, Predictor};

/// Top-level actions available in the menu.
enum Action {
    PredictManual,
    PredictFile,
    ClassifyToken,
    ShowSchema,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::PredictManual,
        Self::PredictFile,
        Self::ClassifyToken,
        Self::ShowSchema,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::PredictManual => "Predict a single call",
            Self::PredictFile => "Predict a CSV file",
            Self::ClassifyToken => "Classify a call type",
            Self::ShowSchema => "Show feature schema",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the menu loop until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails or an action hits a
/// non-recoverable error.
pub fn run(predictor: &Predictor, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Call Urgency Prediction");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        let result = match Action::ALL[idx] {
            Action::PredictManual => predict_manual(predictor),
            Action::PredictFile => predict_file(predictor, multi),
            Action::ClassifyToken => classify_token(predictor),
            Action::ShowSchema => {
                crate::output::print_schema(
                    predictor.schema(),
                    predictor.schema_source(),
                    &predictor.batch_config().prediction_column,
                );
                Ok(())
            }
            Action::Quit => return Ok(()),
        };

        if let Err(e) = result {
            match e.downcast_ref::<PredictError>() {
                Some(err) if err.is_user_error() => println!("Error: {err}"),
                _ => return Err(e),
            }
        }
        println!();
    }
}

/// Prompts for an optional value; blank input means "not supplied".
fn prompt_optional(prompt: &str) -> Result<Option<String>, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
}

/// Collects the call type, datetimes and a value for every schema column
/// (blank to derive or default), then predicts.
fn predict_manual(predictor: &Predictor) -> Result<(), Box<dyn std::error::Error>> {
    let mut raw = RawCallRecord::new();

    if let Some(token) = prompt_optional("Call type (e.g. MVA)")? {
        raw = raw.with_call_type(token);
    }
    if let Some(value) = prompt_optional("Incident datetime (YYYY-MM-DD HH:MM:SS, blank to skip)")? {
        raw = raw.with_incident_datetime(value);
    }
    if let Some(value) = prompt_optional("Close datetime (blank to skip)")? {
        raw = raw.with_close_datetime(value);
    }
    if let Some(value) = prompt_optional("First assignment datetime (blank to skip)")? {
        raw = raw.with_first_assignment_datetime(value);
    }

    for name in predictor.schema().names() {
        if name == CALL_CATEGORY_ENCODED {
            continue;
        }
        if let Some(value) = prompt_optional(&format!("{name} (blank to derive or default)"))? {
            raw = raw.with_field(name.as_str(), crate::field_value(value));
        }
    }

    crate::predict_manual(predictor, &raw)?;
    Ok(())
}

fn predict_file(
    predictor: &Predictor,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(input) = prompt_optional("CSV file to predict")? else {
        println!("No file given.");
        return Ok(());
    };
    let output = prompt_optional("Output file (blank for predictions.csv next to the input)")?;

    crate::run_batch(
        predictor,
        &PathBuf::from(input),
        output.map(PathBuf::from),
        multi,
    )?;
    Ok(())
}

fn classify_token(predictor: &Predictor) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(token) = prompt_optional("Call type token")? {
        crate::output::print_classifications(predictor.builder().tables(), &[token]);
    }
    Ok(())
}
