//! `depsight cycles` command implementation.

use colored::Colorize;

use super::Session;
use super::display::print_json;

/// Run the cycles command.
pub async fn run(session: &Session) -> anyhow::Result<()> {
    let summary = session
        .engine
        .get_summary(&session.workspace, session.options)
        .await?;
    let cycles = &summary.insights.circular_dependencies;

    if session.json {
        return print_json(cycles);
    }

    if cycles.is_empty() {
        println!("{}", "No circular dependencies detected.".green());
        return Ok(());
    }

    println!(
        "Found {} circular dependencies:",
        cycles.len().to_string().red().bold()
    );
    println!();

    for (i, cycle) in cycles.iter().enumerate() {
        println!("  {} {}:", "Cycle".yellow().bold(), i + 1);

        // a → b → c → a
        let mut path_str = cycle.join(" → ");
        if let Some(first) = cycle.first() {
            path_str.push_str(" → ");
            path_str.push_str(first);
        }

        println!("    {}", path_str.dimmed());
    }

    Ok(())
}
