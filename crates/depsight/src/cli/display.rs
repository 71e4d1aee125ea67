//! Common display utilities for CLI commands.

use anyhow::Context;
use colored::{ColoredString, Colorize};
use depsight::health::RiskTier;
use depsight::impact::PathSuggestion;
use depsight::{ErrorReport, RiskLevel};
use serde::Serialize;

const MAX_DISPLAY_ITEMS: usize = 10;

/// Display a list of file ids with optional truncation.
///
/// Shows up to `MAX_DISPLAY_ITEMS` entries with bullet points, then
/// "... and N more". If empty, shows the provided `empty_message`.
pub fn print_files(ids: &[String], empty_message: &str) {
    if ids.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for id in ids.iter().take(MAX_DISPLAY_ITEMS) {
        println!("    {} {id}", "•".dimmed());
    }

    if ids.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            ids.len() - MAX_DISPLAY_ITEMS
        );
    }
}

/// Print ranked path suggestions.
pub fn print_suggestions(suggestions: &[PathSuggestion]) {
    for suggestion in suggestions {
        println!(
            "    {} {} ({}%, {})",
            "•".dimmed(),
            suggestion.path,
            suggestion.confidence,
            suggestion.reason.to_string().dimmed()
        );
    }
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// A risk tier colored by severity.
pub fn tier_label(tier: RiskTier) -> ColoredString {
    match tier {
        RiskTier::Healthy => tier.as_str().green(),
        RiskTier::Moderate => tier.as_str().yellow(),
        RiskTier::Risky => tier.as_str().bright_red(),
        RiskTier::Critical => tier.as_str().red().bold(),
    }
}

/// An impact risk level colored by severity.
pub fn risk_label(level: RiskLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Low => text.green(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::High => text.red().bold(),
    }
}

/// Print a structured error report on stderr.
pub fn print_error_report(report: &ErrorReport) {
    eprintln!(
        "{}[{}]: {}",
        "error".red().bold(),
        report.code,
        report.message
    );

    if !report.suggestions.is_empty() {
        eprintln!("  {}:", "did you mean".yellow());
        for suggestion in &report.suggestions {
            eprintln!(
                "    {} {} ({}%)",
                "•".dimmed(),
                suggestion.path,
                suggestion.confidence
            );
        }
    }

    for action in &report.recovery_actions {
        eprintln!("  {}: {action}", "hint".cyan());
    }
}
