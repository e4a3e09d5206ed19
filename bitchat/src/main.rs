use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use bitchat_core::config::{BitchatConfig, LoggingConfig};
use bitchat_core::error::{ErrorCategory, ErrorCode};
use bitchat_core::logging;
use bitchat_core::recovery::backoff_hint;

#[derive(Parser)]
#[command(name = "bitchat-errors")]
#[command(about = "Inspect BitChat error codes and recovery configuration", long_about = None)]
struct Cli {
    /// Log level directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List error codes
    Codes {
        /// Only list codes of this category (e.g. network)
        #[arg(long)]
        category: Option<String>,
    },
    /// Describe a single code, given by number or name
    Explain { code: String },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Load and validate a TOML configuration file
    Check { path: PathBuf },
    /// Print the default configuration as TOML
    Default,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LoggingConfig {
        level: cli.log_level.clone(),
        ..Default::default()
    })?;

    match cli.command {
        Commands::Codes { category } => {
            let category = match category {
                Some(name) => match ErrorCategory::parse(&name) {
                    Some(category) => Some(category),
                    None => bail!("Unknown category '{}'", name),
                },
                None => None,
            };
            print_codes(category);
        }
        Commands::Explain { code } => {
            let code = parse_code(&code)?;
            print_explanation(code);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Check { path } => {
                debug!("Checking configuration at {}", path.display());
                let config = BitchatConfig::from_file(&path)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?;
                println!("Configuration OK: {}", path.display());
                println!();
                print!("{}", config.to_toml_string()?);
            }
            ConfigCommands::Default => {
                print!("{}", BitchatConfig::default().to_toml_string()?);
            }
        },
    }

    Ok(())
}

fn parse_code(input: &str) -> Result<ErrorCode> {
    let input = input.trim();
    if let Ok(value) = input.parse::<u16>() {
        return ErrorCode::from_u16(value).with_context(|| format!("Unknown error code {}", value));
    }

    ErrorCode::ALL
        .iter()
        .copied()
        .find(|code| code.name().eq_ignore_ascii_case(input))
        .with_context(|| format!("Unknown error code '{}'", input))
}

fn print_codes(category: Option<ErrorCategory>) {
    println!("{:<6} {:<28} {:<10} {:<10}", "CODE", "NAME", "CATEGORY", "TRANSIENT");
    for code in ErrorCode::ALL
        .iter()
        .copied()
        .filter(|code| category.map_or(true, |c| code.category() == c))
    {
        println!(
            "{:<6} {:<28} {:<10} {:<10}",
            code.as_u16(),
            code.name(),
            code.category(),
            if code.is_transient() { "yes" } else { "no" }
        );
    }
}

fn print_explanation(code: ErrorCode) {
    println!("{} ({})", code.name(), code.as_u16());
    println!("  Category:     {}", code.category());
    println!("  Transient:    {}", if code.is_transient() { "yes" } else { "no" });
    println!("  Backoff hint: {} ms", backoff_hint(code).as_millis());
    println!("  User message: {}", code.default_user_message());
}
