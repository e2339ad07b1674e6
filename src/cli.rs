//! Command-line interface for revoice
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Real-time voice replacement
#[derive(Parser, Debug)]
#[command(
    name = "revoice",
    version,
    about = "Listen to the microphone and speak each phrase back in a synthesized voice"
)]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print phrases and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device name
    #[arg(long, global = true, value_name = "DEVICE")]
    pub input_device: Option<String>,

    /// Audio output device name
    #[arg(long, global = true, value_name = "DEVICE")]
    pub output_device: Option<String>,

    /// Path to the speech recognition model
    #[arg(long, global = true, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Synthesizer voice name
    #[arg(long, global = true, value_name = "VOICE")]
    pub voice: Option<String>,
}

/// Parse a duration string such as `30s`, `5m` or `1h30m`. Bare numbers are seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the live pipeline until Ctrl+C
    Run {
        /// Stop automatically after this long (e.g. 30s, 5m)
        #[arg(long = "for", value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,
    },

    /// Synthesize and play a single text
    Say {
        /// Text to speak
        text: String,

        /// Do not export the rendered clip
        #[arg(long)]
        no_save: bool,
    },

    /// List audio input and output devices
    Devices,

    /// Check compiled-in backends and configuration
    Check,

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
