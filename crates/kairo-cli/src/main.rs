//! Kairo CLI - Steer the control loop and query its memory
//!
//! Thin client of the Kairo server's HTTP interface.

mod api;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Password;

use api::{KairoClient, StatusResponse};
use config::Config;

#[derive(Parser)]
#[command(name = "kairo")]
#[command(about = "Kairo CLI - Steer the control loop and query its memory", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store API key after checking the server is reachable
    Login {
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Show control loop status
    Status,

    /// Pause the control loop before its next iteration
    Pause,

    /// Resume a paused control loop
    Resume,

    /// Queue a directive for the control loop
    Directive {
        /// Directive text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Search memories
    Search {
        /// Search query
        query: String,
        /// Max results
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Minimum similarity score
        #[arg(short = 's', long, default_value = "0.3")]
        min_score: f32,
    },

    /// Show memory tier statistics
    Stats,

    /// Show or update configuration
    Config {
        /// Server base URL
        #[arg(long)]
        base_url: Option<String>,
        /// API key
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { key } => cmd_login(key).await,
        Commands::Status => cmd_status().await,
        Commands::Pause => cmd_pause().await,
        Commands::Resume => cmd_resume().await,
        Commands::Directive { text } => cmd_directive(text.join(" ")).await,
        Commands::Search {
            query,
            limit,
            min_score,
        } => cmd_search(query, limit, min_score).await,
        Commands::Stats => cmd_stats().await,
        Commands::Config { base_url, api_key } => cmd_config(base_url, api_key),
    }
}

fn client() -> Result<KairoClient> {
    let config = Config::load()?;
    Ok(KairoClient::new(&config.base_url, config.api_key.as_deref()))
}

fn print_status(status: &StatusResponse) {
    let state = if !status.is_running {
        "stopped".red()
    } else if status.is_paused {
        "paused".yellow()
    } else {
        "running".green()
    };

    println!("{} {}", "Loop:".bold(), state);
    println!("  Iterations: {}", status.iteration_count);
    println!(
        "  Directive: {}",
        status.current_directive.as_deref().unwrap_or("None").cyan()
    );
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    let api_key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("API Key")
            .interact()
            .context("Failed to read API key")?,
    };

    let client = KairoClient::new(&config.base_url, Some(&api_key));
    print!("Testing connection... ");

    match client.status().await {
        Ok(_) => println!("{}", "OK".green()),
        Err(e) => {
            println!("{}", "Failed".red());
            bail!("Could not reach Kairo API with this key: {}", e);
        }
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("{} API key saved to {:?}", "✓".green(), Config::config_path()?);
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let status = client()?.status().await?;
    print_status(&status);
    Ok(())
}

async fn cmd_pause() -> Result<()> {
    let status = client()?.pause().await?;
    println!("{} Pause requested", "✓".green());
    print_status(&status);
    Ok(())
}

async fn cmd_resume() -> Result<()> {
    let status = client()?.resume().await?;
    println!("{} Resume requested", "✓".green());
    print_status(&status);
    Ok(())
}

async fn cmd_directive(text: String) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Directive text is empty");
    }

    let response = client()?.submit_directive(&text).await?;
    println!(
        "{} Directive queued: {} ({} waiting)",
        "✓".green(),
        response.id.dimmed(),
        response.queued
    );
    Ok(())
}

async fn cmd_search(query: String, limit: usize, min_score: f32) -> Result<()> {
    let response = client()?.search_memories(&query, limit, min_score).await?;

    if let Some(error) = response.error {
        bail!("Search failed: {}", error);
    }

    if response.results.is_empty() {
        println!("{}", "No memories found".yellow());
        return Ok(());
    }

    println!("{} {} result(s)\n", "Found".bold(), response.results.len());
    for hit in response.results {
        println!(
            "{} [{}] importance {:.2}  {}",
            format!("{:.3}", hit.score).cyan(),
            hit.kind.magenta(),
            hit.importance,
            hit.id.dimmed()
        );
        println!("  {}", hit.summary);
        if !hit.tags.is_empty() {
            println!("  tags: {}", hit.tags.join(", "));
        }
    }
    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let stats = client()?.stats().await?;

    println!("{}", "Memory:".bold());
    println!("  Recent: {}", stats.recent_count);
    println!("  Durable: {}", stats.durable_count);
    if stats.semantic_enabled {
        println!("  Semantic: {}", stats.semantic_count);
    } else {
        println!("  Semantic: {}", "disabled".yellow());
    }
    Ok(())
}

fn cmd_config(base_url: Option<String>, api_key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    if base_url.is_some() || api_key.is_some() {
        if let Some(url) = base_url {
            config.set_base_url(&url);
        }
        if let Some(key) = api_key {
            config.set_api_key(key);
        }
        config.save()?;
        println!("{} Configuration saved", "✓".green());
    }

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() { "Set".green() } else { "Not set".red() }
    );

    Ok(())
}
