use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use symposium::config::Config;
use symposium::domain::Author;
use symposium::storage::{JsonlStore, MessageStore};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("symposium")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("symposium.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_chat_command(None, None, config),
        Some(Commands::Participants) => handle_participants_command(config),
        Some(Commands::Conversations) => handle_conversations_command(config),
        Some(Commands::Simulate { messages, temperature }) => handle_simulate_command(messages, *temperature, config),
        Some(Commands::Chat { conversation, title }) => {
            handle_chat_command(conversation.as_deref(), title.as_deref(), config)
        }
    }
}

fn handle_participants_command(config: &Config) -> Result<()> {
    info!("Listing {} participants", config.participants.len());
    for p in &config.participants {
        println!("{} {}", p.name.green().bold(), format!("({})", p.id).dimmed());
        if !p.description.is_empty() {
            println!("  {}", p.description);
        }
        println!(
            "  model={} eagerness={} penalty={} half-life={} boost={}",
            p.model, p.eagerness, p.politeness_penalty, p.politeness_half_life, p.mention_boost
        );
    }
    Ok(())
}

fn handle_conversations_command(config: &Config) -> Result<()> {
    let store = JsonlStore::open(&config.storage.data_dir).context("Failed to open conversation store")?;
    let conversations = store.conversations()?;
    if conversations.is_empty() {
        println!("{}", "No conversations yet".dimmed());
    }
    for c in conversations {
        println!(
            "{} {} {}",
            c.id.cyan(),
            c.title,
            format!("({} messages)", c.message_ids.len()).dimmed()
        );
    }
    Ok(())
}

fn handle_simulate_command(messages: &[String], temperature: Option<f64>, config: &Config) -> Result<()> {
    let mut settings = config.scheduler.clone();
    if let Some(t) = temperature {
        settings.selection_temperature = t;
    }
    settings.validate()?;

    let ids: Vec<&str> = config.participants.iter().map(|p| p.id.as_str()).collect();
    println!("{}", format!("{:<40} {}", "message", ids.join(" / ")).bold());

    for step in cli::simulate::simulate(settings, config.participants.clone(), messages) {
        let label = match &step.author {
            Author::System => "(start)".to_string(),
            Author::User => format!("user: {}", step.content),
            Author::Participant(id) => format!("{}: {}", id, step.content),
        };
        let scores: Vec<String> = step
            .logits
            .iter()
            .zip(&step.probabilities)
            .map(|(l, p)| format!("{:+.3} ({:.1}%)", l, p * 100.0))
            .collect();
        println!("{:<40} {}", truncate(&label, 40), scores.join("  "));
    }
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn handle_chat_command(conversation: Option<&str>, title: Option<&str>, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(cli::chat::run_chat(config, conversation, title))
}

fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
