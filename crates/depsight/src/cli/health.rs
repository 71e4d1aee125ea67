//! `depsight health` command implementation.

use colored::Colorize;
use depsight::health::{HealthReport, Recommendations, RiskTier};

use super::Session;
use super::display::{print_files, print_json, tier_label};

/// Run the health command.
pub async fn run(session: &Session) -> anyhow::Result<()> {
    let report = session
        .engine
        .get_health_report(&session.workspace, session.options)
        .await?;

    if session.json {
        return print_json(&report);
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &HealthReport) {
    let score = report.health_score.to_string();
    let score = match report.health_score {
        80..=100 => score.green().bold(),
        50..=79 => score.yellow().bold(),
        _ => score.red().bold(),
    };

    println!("{} {score}/100", "Workspace Health:".cyan().bold());
    println!();

    let distribution = &report.distribution;
    println!(
        "  {} ({} files):",
        "Distribution".white().bold(),
        distribution.total_files
    );
    for tier in [
        RiskTier::Healthy,
        RiskTier::Moderate,
        RiskTier::Risky,
        RiskTier::Critical,
    ] {
        println!(
            "    {} {:<9} {}",
            "•".dimmed(),
            tier_label(tier),
            distribution.count(tier)
        );
    }

    println!();
    println!("  {}:", "Riskiest files".white().bold());
    if report.riskiest_files.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for file in &report.riskiest_files {
        println!(
            "    {:>5.1} {:<9} {} {}",
            file.risk_score,
            tier_label(file.tier),
            file.id,
            format!("(in {}, out {})", file.fan_in, file.fan_out).dimmed()
        );
    }

    println!();
    println!("  {}:", "Recommendations".white().bold());
    match &report.recommendations {
        Recommendations::NoneNeeded => {
            println!("    {}", "No action needed.".green());
        }
        Recommendations::Actions(actions) => {
            for action in actions {
                println!("    {} {}", "→".yellow(), action.message);
                print_files(&action.files, "(no files)");
            }
        }
    }
}
