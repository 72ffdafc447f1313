//! `pleasance status` — show configuration, fallback chains and known models.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use pleasance_core::config::{get_config_path, Config};
use pleasance_core::utils::short_id;
use pleasance_providers::{ChainRegistry, KNOWN_MODELS};

use crate::helpers;

/// Run the status command.
pub fn run(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "Pleasance Status".cyan().bold());
    println!();

    // Config
    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );

    // Endpoints
    println!("  {:<18} {}", "LLM proxy:".bold(), config.proxy.base_url);
    println!("  {:<18} {}", "Content API:".bold(), config.catalog.base_url);

    let agent = if config.catalog.has_credentials() {
        format!(
            "{} {} (key set)",
            "✓".green(),
            short_id(&config.catalog.agent_id, 32)
        )
    } else {
        format!("{}", "· no AGENT_SECRET, read-only".dimmed())
    };
    println!("  {:<18} {}", "Agent:".bold(), agent);

    // Generation & review
    println!(
        "  {:<18} chain {} | {}",
        "Generation:".bold(),
        config.generation.chain,
        format!(
            "temp: {} max_tokens: {}",
            config.generation.temperature, config.generation.max_tokens
        )
        .dimmed(),
    );
    println!(
        "  {:<18} chain {} | {}",
        "Review:".bold(),
        config.review.chain,
        format!(
            "temp: {} max_tokens: {}",
            config.review.temperature, config.review.max_tokens
        )
        .dimmed(),
    );

    let sections: Vec<&str> = config
        .generation
        .sections
        .iter()
        .map(|s| s.key.as_str())
        .collect();
    println!("  {:<18} {}", "Sections:".bold(), sections.join(", "));

    // Batch
    let concurrency = match config.batch.concurrency {
        0 => "unbounded".to_string(),
        n => n.to_string(),
    };
    let deadline = config
        .batch
        .deadline_secs
        .map(|s| format!("{s}s"))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "  {:<18} size {} | concurrency {} | deadline {}",
        "Batch:".bold(),
        config.batch.size,
        concurrency,
        deadline
    );

    // Chains
    println!();
    println!("  {}", "Chains:".bold());
    let chains = ChainRegistry::from_config(&config.chains);
    for (name, chain) in chains.iter() {
        let marker = if config.chains.contains_key(name) {
            " (configured)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("    {:<10} {}{}", name, chain.models().join(" → "), marker);
    }

    // Models
    println!();
    println!("  {}", "Models:".bold());
    for (family, models) in KNOWN_MODELS {
        println!("{}", helpers::model_family_line(family, models));
    }

    println!();

    Ok(())
}
