//! Shared CLI helpers — job input and result formatting.

use std::io::Read;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use pleasance_core::types::{ReviewVerdict, SectionResult, Severity};
use pleasance_core::utils::preview;
use pleasance_engine::BatchReport;

/// Read a whole job envelope from stdin.
pub fn read_stdin() -> Result<String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read job from stdin")?;
    Ok(raw)
}

/// Parse a job envelope. Only the JSON syntax is checked here; the
/// dispatcher reports everything else as `{"error": ...}`.
pub fn parse_job(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        anyhow::bail!("empty job: expected a JSON envelope like {{\"input\": {{\"action\": \"health\"}}}}");
    }
    serde_json::from_str(raw).context("job is not valid JSON")
}

pub fn health_line(healthy: bool) -> String {
    if healthy {
        format!("{} LLM proxy is healthy", "✓".green())
    } else {
        format!("{} LLM proxy is unreachable", "✗".red())
    }
}

pub fn model_family_line(family: &str, models: &[&str]) -> String {
    format!("    {:<10} {}", family, models.join(", ").dimmed())
}

/// One line per generated (or failed) section.
pub fn section_line(section: &SectionResult) -> String {
    let target = format!("{}/{}", section.subject_id, section.section_key);
    match (&section.content, &section.model) {
        (Some(content), Some(model)) => format!(
            "  {} {:<28} {} {}",
            "✓".green(),
            target,
            model.dimmed(),
            preview(content, 60)
        ),
        _ => format!(
            "  {} {:<28} {}",
            "✗".red(),
            target,
            section.error.as_deref().unwrap_or("failed").red()
        ),
    }
}

/// One line per review verdict, plus its issues.
pub fn verdict_line(verdict: &ReviewVerdict) -> String {
    let target = format!("{}/{}", verdict.subject_id, verdict.section_key);
    let mark = match (verdict.approved, verdict.severity) {
        (true, _) if verdict.is_degraded() => "?".yellow(),
        (true, _) => "✓".green(),
        (false, Severity::High) => "✗".red().bold(),
        (false, _) => "✗".red(),
    };

    let mut line = format!("  {} {:<28} {}", mark, target, verdict.severity);
    if let Some(model) = &verdict.model {
        line.push_str(&format!(" {}", model.dimmed()));
    }
    if let Some(error) = &verdict.error {
        line.push_str(&format!("\n      {}", error.yellow()));
    }
    for issue in &verdict.issues {
        line.push_str(&format!("\n      - {issue}"));
    }
    line
}

pub fn print_report(report: &BatchReport) {
    println!();
    println!("{}", "Batch report".cyan().bold());
    println!("  {:<12} {}", "Fetched:".bold(), report.fetched);
    println!("  {:<12} {}", "Generated:".bold(), report.generated);
    println!(
        "  {:<12} {}",
        "Failed:".bold(),
        if report.failed > 0 {
            report.failed.to_string().red().to_string()
        } else {
            report.failed.to_string()
        }
    );
    println!("  {:<12} {}", "Pushed:".bold(), report.pushed);
    println!("  {:<12} {}", "Marked:".bold(), report.marked);
    println!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
