//! Shared helper functions for CLI commands.

use std::path::Path;

use console::{style, StyledObject};

use crate::config::ClientConfig;
use crate::error::AnalysisError;
use crate::models::{AnalysisResult, ConnectivityState, HealthStatus, PatientMetadata, Urgency};

/// Build patient metadata from optional flags. `None` when no flag was given.
pub fn patient_from_args(
    name: Option<String>,
    age: Option<u32>,
    gender: Option<String>,
    symptoms: Option<String>,
) -> Option<PatientMetadata> {
    if name.is_none() && age.is_none() && gender.is_none() && symptoms.is_none() {
        return None;
    }
    Some(PatientMetadata {
        name: name.unwrap_or_default(),
        age,
        gender: gender.unwrap_or_default(),
        symptoms: symptoms.unwrap_or_default(),
    })
}

fn styled_urgency(urgency: Urgency) -> StyledObject<&'static str> {
    match urgency {
        Urgency::High => style(urgency.as_str()).red().bold(),
        Urgency::Medium => style(urgency.as_str()).yellow(),
        Urgency::Low => style(urgency.as_str()).green(),
    }
}

/// Print the outcome of a health probe.
pub fn print_health(
    config: &ClientConfig,
    state: ConnectivityState,
    outcome: &Result<HealthStatus, AnalysisError>,
) {
    match outcome {
        Ok(health) => {
            println!(
                "{} {} ({}, {})",
                style("✓").green(),
                style(state).green(),
                config.base_url,
                config.backend
            );
            if let Some(message) = &health.message {
                println!("  {}", message);
            }
            if let Some(version) = &health.version {
                println!("  version {}", version);
            }
        }
        Err(e) => {
            println!(
                "{} {} ({}, {})",
                style("✗").red(),
                style(state).red(),
                config.base_url,
                config.backend
            );
            println!("  {}", e);
            println!("  Start the inference service and run `hemoscan health` again.");
        }
    }
}

/// Print a canonical result as a short report.
pub fn print_result(file: &Path, result: &AnalysisResult) {
    println!("\n{}", style(format!("Analysis: {}", file.display())).bold());

    let finding = if result.hemorrhage_detected {
        style("Hemorrhage detected").red().bold().to_string()
    } else {
        style("No hemorrhage detected").green().to_string()
    };
    println!("  {}", finding);
    println!("  {:<12} {}", "Type:", result.hemorrhage_type);
    println!("  {:<12} {}", "Urgency:", styled_urgency(result.urgency));
    println!("  {:<12} {}", "Location:", result.location);
    println!("  {:<12} {} mL", "Volume:", result.volume);
    println!("  {:<12} {:.1}%", "Confidence:", result.confidence * 100.0);
    if let Some(boxes) = &result.bounding_boxes {
        println!("  {:<12} {}", "Regions:", boxes.len());
    }
    if let Some(label) = &result.raw_label {
        println!("  {:<12} {}", "Raw label:", label);
    }
    println!("  {:<12} {} ms", "Time:", result.processing_time_ms);

    if result.measurements_estimated {
        println!(
            "  {} confidence and volume are placeholder estimates, not measurements",
            style("!").yellow()
        );
    }
}
