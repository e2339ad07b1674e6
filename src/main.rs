use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use revoice::app::{Overrides, list_devices, load_config, run_live, say};
use revoice::cli::{Cli, Commands, ConfigAction};
use revoice::config::Config;
use revoice::diagnostics::{check_dependencies, print_report};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        input_device: cli.input_device,
        output_device: cli.output_device,
        model: cli.model,
        voice: cli.voice,
    };

    match cli.command {
        None => {
            let config = overrides.apply(load_config(cli.config.as_deref())?);
            run_live(config, None, cli.quiet).await?;
        }
        Some(Commands::Run { duration }) => {
            let config = overrides.apply(load_config(cli.config.as_deref())?);
            run_live(config, duration, cli.quiet).await?;
        }
        Some(Commands::Say { text, no_save }) => {
            let config = overrides.apply(load_config(cli.config.as_deref())?);
            if let Some(path) = say(config, text, !no_save, cli.quiet).await?
                && !cli.quiet
            {
                println!("{}", path.display());
            }
        }
        Some(Commands::Devices) => {
            list_devices()?;
        }
        Some(Commands::Check) => {
            let config = overrides.apply(load_config(cli.config.as_deref())?);
            if !print_report(&check_dependencies(&config)) {
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref(), overrides)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "revoice", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr. `REVOICE_LOG` (EnvFilter syntax) wins over `-v`.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "revoice=warn",
        1 => "revoice=debug",
        _ => "revoice=trace",
    };
    let filter =
        EnvFilter::try_from_env("REVOICE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    overrides: Overrides,
) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = overrides.apply(load_config(custom_path)?);
            if let Err(e) = config.validate() {
                eprintln!("{}", format!("Warning: {}", e).yellow());
            }
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                eprintln!(
                    "{}",
                    format!(
                        "Error: {} already exists (use --force to overwrite)",
                        config_path.display()
                    )
                    .red()
                );
                std::process::exit(1);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, Config::default().to_toml()?)?;
            println!("{} {}", "Wrote".green(), config_path.display());
        }
    }
    Ok(())
}
