//! CLI Module
//!
//! Command-line interface for the Relight compositor.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relight - layered relighting compositor
#[derive(Parser, Debug)]
#[command(name = "relight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Composite local layer images over a base image
    #[command(name = "composite")]
    Composite {
        /// Base image (png, jpg, jpeg, gif, webp)
        #[arg(short, long)]
        base: PathBuf,

        /// Layer image, optionally with opacity: `path[:opacity]`
        #[arg(short, long = "layer")]
        layers: Vec<String>,

        /// Leave the base image out of the composite
        #[arg(long)]
        hide_base: bool,

        /// Output image path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Generate lighting layers through the backend and composite them
    #[command(name = "generate")]
    Generate {
        /// Base image; uploaded to the backend before generating
        #[arg(short, long)]
        base: PathBuf,

        /// Prompts separated by commas or new lines
        #[arg(short, long)]
        prompts: String,

        /// API key (overrides RELIGHT_API_KEY / GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Backend URL (overrides RELIGHT_BACKEND_URL)
        #[arg(long)]
        backend_url: Option<String>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Align every generated layer onto the base image
        #[arg(long)]
        align: bool,

        /// Opacity applied to every generated layer
        #[arg(long, default_value_t = 100)]
        opacity: i32,

        /// Read generated images from the backend's directory instead of over HTTP
        #[arg(long)]
        static_root: Option<PathBuf>,

        /// Output image path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show or replace the backend's generation system prompt
    #[command(name = "system-prompt")]
    SystemPrompt {
        /// New system prompt; prints the current one when omitted
        #[arg(long)]
        set: Option<String>,

        /// Backend URL (overrides RELIGHT_BACKEND_URL)
        #[arg(long)]
        backend_url: Option<String>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
