//! `depsight impact` command implementation.

use colored::Colorize;
use depsight::{ChangeType, ImpactResult};

use super::Session;
use super::display::{print_files, print_json, print_suggestions, risk_label};

/// Run the impact command.
pub async fn run(
    session: &Session,
    target: &str,
    change_type: Option<ChangeType>,
) -> anyhow::Result<()> {
    let impact = session
        .engine
        .analyze_impact(&session.workspace, target, change_type, session.options)
        .await?;

    if session.json {
        return print_json(&impact);
    }

    print_impact(&impact);
    Ok(())
}

fn print_impact(impact: &ImpactResult) {
    let resolution = &impact.path_resolution;
    println!(
        "Impact analysis for {}:",
        resolution.resolved_path.cyan().bold()
    );

    if resolution.fuzzy_matched {
        println!(
            "  {} '{}' matched with {}% confidence; other candidates:",
            "note:".yellow(),
            resolution.original_path,
            resolution.confidence
        );
        print_suggestions(resolution.suggestions.get(1..).unwrap_or(&[]));
    }
    println!();

    println!(
        "  {} ({} files):",
        "Dependents".white().bold(),
        impact.dependents.len().to_string().yellow()
    );
    print_files(&impact.dependents, "(none)");
    println!();

    println!(
        "  {} ({} files):",
        "Dependencies".white().bold(),
        impact.dependencies.len().to_string().green()
    );
    print_files(&impact.dependencies, "(none)");
    println!();

    println!("  {}: {}", "Risk".white().bold(), risk_label(impact.risk_level));
    println!("  {}", impact.summary);
    println!(
        "  {}",
        format!(
            "analyzed {} files in {} ms{}",
            impact.metadata.graph_node_count,
            impact.metadata.duration_ms,
            if impact.metadata.cache_used {
                " (cached graph)"
            } else {
                ""
            }
        )
        .dimmed()
    );
}
