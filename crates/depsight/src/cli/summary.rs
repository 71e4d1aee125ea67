//! `depsight summary` command implementation.

use colored::Colorize;

use super::Session;
use super::display::{print_files, print_json};

/// Run the summary command.
pub async fn run(session: &Session) -> anyhow::Result<()> {
    let summary = session
        .engine
        .get_summary(&session.workspace, session.options)
        .await?;

    if session.json {
        return print_json(&summary);
    }

    println!("{}", "Dependency Graph Summary".cyan().bold());
    println!();
    println!(
        "  {}: {}",
        "Workspace".white().bold(),
        summary.metadata.workspace_root.display()
    );
    println!(
        "  {}: {}{}",
        "Scanned".white().bold(),
        summary.metadata.timestamp.to_rfc3339(),
        if summary.from_cache {
            " (cached)".dimmed().to_string()
        } else {
            String::new()
        }
    );
    println!();

    let stats = &summary.stats;
    println!(
        "  {}: {}   {}: {}",
        "Files".white().bold(),
        stats.node_count.to_string().green(),
        "Dependencies".white().bold(),
        stats.edge_count.to_string().green()
    );
    println!(
        "  {}: {:.2} avg, {} max   {}: {:.4}",
        "Degree".white().bold(),
        stats.average_degree,
        stats.max_degree,
        "Density".white().bold(),
        stats.density
    );
    if summary.warning_count > 0 {
        println!(
            "  {}: {} malformed scanner entries dropped",
            "Warnings".yellow().bold(),
            summary.warning_count
        );
    }

    if !summary.packages.is_empty() {
        println!();
        println!("  {}:", "Packages".white().bold());
        for (package, count) in &summary.packages {
            println!("    {} {package} ({count} files)", "•".dimmed());
        }
    }

    println!();
    println!("  {}:", "Top hubs".white().bold());
    if summary.insights.top_hubs.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for hub in &summary.insights.top_hubs {
        println!(
            "    {} {} ({} connections)",
            "•".dimmed(),
            hub.id,
            hub.connection_count.to_string().yellow()
        );
    }

    println!();
    println!(
        "  {} ({}):",
        "Circular dependencies".white().bold(),
        summary.insights.circular_dependencies.len()
    );
    let cycles: Vec<String> = summary
        .insights
        .circular_dependencies
        .iter()
        .map(|cycle| cycle.join(" → "))
        .collect();
    print_files(&cycles, "(none)");

    println!();
    println!(
        "  {} ({}):",
        "Orphan files".white().bold(),
        summary.insights.orphan_files.len()
    );
    print_files(&summary.insights.orphan_files, "(none)");

    Ok(())
}
