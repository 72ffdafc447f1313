//! Command handlers for `health`, `generate`, `review`, `worker` and `job`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::info;

use crate::helpers;
use crate::Engine;

pub async fn health(engine: &Engine) -> Result<()> {
    let healthy = engine.orchestrator.generator().health_check().await;
    println!("{}", helpers::health_line(healthy));
    if !healthy {
        bail!("LLM proxy is not healthy");
    }
    Ok(())
}

pub async fn generate(engine: &Engine, count: usize) -> Result<()> {
    if engine.has_credentials {
        let report = engine.worker.process_batch(count).await?;
        helpers::print_report(&report);
        return Ok(());
    }

    eprintln!(
        "{}",
        "No agent secret configured: printing sections instead of pushing them.".yellow()
    );
    let sections = engine.worker.generate_unpushed(count).await?;
    for section in &sections {
        eprintln!("{}", helpers::section_line(section));
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&sections).context("failed to serialize sections")?
    );
    Ok(())
}

pub async fn review(engine: &Engine, count: usize) -> Result<()> {
    let verdicts = engine.worker.review_processed(count).await?;
    if verdicts.is_empty() {
        println!("{}", "Nothing to review.".dimmed());
        return Ok(());
    }

    println!();
    for verdict in &verdicts {
        println!("{}", helpers::verdict_line(verdict));
    }
    let approved = verdicts.iter().filter(|v| v.approved).count();
    println!();
    println!("  {} / {} approved", approved, verdicts.len());
    Ok(())
}

pub async fn worker(engine: &Engine, batch_size: usize) -> Result<()> {
    if !engine.has_credentials {
        bail!("the worker pushes to the content API: set AGENT_SECRET first");
    }
    info!(batch_size, "Worker starting");
    let report = engine.worker.run_until_empty(batch_size).await?;
    helpers::print_report(&report);
    Ok(())
}

pub async fn job(engine: &Engine, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job file: {}", path.display()))?,
        None => helpers::read_stdin()?,
    };
    let envelope = helpers::parse_job(&raw)?;

    let output = engine.dispatcher.handle(envelope).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to serialize job output")?
    );
    Ok(())
}
