//! Relight CLI - Layered Relighting Compositor
//!
//! Command-line interface for compositing and generating lighting layers.

use std::process::ExitCode;

use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use relight::cli::commands::{self, GenerateOptions};
use relight::cli::{Cli, Commands};
use relight::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Relight v{}", env!("CARGO_PKG_VERSION"));

    match handle_command(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[{}] {}", err.error_code(), err.friendly_message());
            for suggestion in err.recovery_suggestions() {
                eprintln!("  - {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

async fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Composite {
            base,
            layers,
            hide_base,
            out,
        } => commands::composite(&base, &layers, hide_base, &out),
        Commands::Generate {
            base,
            prompts,
            api_key,
            backend_url,
            config,
            align,
            opacity,
            static_root,
            out,
        } => {
            commands::generate(GenerateOptions {
                base,
                prompts,
                api_key,
                backend_url,
                config,
                align,
                opacity,
                static_root,
                out,
            })
            .await
        }
        Commands::SystemPrompt {
            set,
            backend_url,
            config,
        } => commands::system_prompt(set, backend_url, config.as_deref()).await,
    }
}
