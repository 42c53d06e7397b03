//! Plain-text rendering of predictions, schemas and classifications.

use std::path::Path;

use urgency_features::{CategoryTables, FeatureSchema};
use urgency_predict::{BatchPredictions, Prediction, SchemaSource};

/// Echoes the aligned feature row, any defaulting, and the predicted label.
pub fn print_prediction(prediction: &Prediction, default_value: f64) {
    let record = prediction.record();

    if let Some(category) = record.category() {
        println!("Call category: {category} (code {})", category.code());
    }

    println!();
    println!("{:<36} VALUE", "FEATURE");
    println!("{}", "-".repeat(50));
    for (name, value) in record.iter() {
        let marker = if record.defaulted().iter().any(|d| d == name) {
            " (default)"
        } else {
            ""
        };
        println!("{name:<36} {value}{marker}");
    }
    println!();

    if !prediction.defaulted().is_empty() {
        println!(
            "Warning: {} feature(s) not supplied, using {default_value}: {}",
            prediction.defaulted().len(),
            prediction.defaulted().join(", ")
        );
    }
    if !record.dropped().is_empty() {
        println!(
            "Note: ignored fields the model does not use: {}",
            record.dropped().join(", ")
        );
    }

    println!(
        "Predicted urgency: {} (class {})",
        prediction.label(),
        prediction.class()
    );
}

/// Summarizes a finished batch.
pub fn print_batch_summary(result: &BatchPredictions, output: &Path) {
    println!("Wrote {} rows to {}", result.table.len(), output.display());

    for (label, count) in &result.label_counts {
        println!("  {label:<24} {count}");
    }

    for (name, count) in &result.defaulted_counts {
        println!("Warning: {name} defaulted in {count} row(s)");
    }
}

/// Prints the resolved schema in column order.
pub fn print_schema(schema: &FeatureSchema, source: SchemaSource, prediction_column: &str) {
    println!("Feature schema ({} columns, from {source}):", schema.len());
    for (i, name) in schema.names().iter().enumerate() {
        println!("  {i:>2}  {name}");
    }
    println!();
    println!("Batch output column: {prediction_column}");
}

/// Prints the category and code of each token.
pub fn print_classifications(tables: &CategoryTables, tokens: &[String]) {
    println!("{:<16} {:<14} CODE", "TOKEN", "CATEGORY");
    println!("{}", "-".repeat(40));
    for token in tokens {
        let category = tables.classify(token);
        println!("{token:<16} {:<14} {}", category.to_string(), category.code());
    }
}
