use clap::Parser;
use tradegym::cli::{self, Cli, Commands};
use tradegym::config::AppConfig;
use tradegym::logging::{init_logging, init_logging_simple};
use tracing::warn;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config).unwrap_or_else(|e| {
        eprintln!("Failed to load config from {}: {}, using defaults", cli.config, e);
        AppConfig::default()
    });

    match &cli.command {
        Commands::Train {
            episodes,
            data,
            seed,
            checkpoint_dir,
            resume,
            json,
        } => {
            init_logging(&config.logging);
            validate_or_warn(&config)?;
            cli::run_train(
                &config,
                *episodes,
                data.as_deref(),
                *seed,
                checkpoint_dir.as_deref(),
                resume.as_deref(),
                *json,
            )?;
        }
        Commands::Evaluate {
            model,
            episodes,
            data,
            seed,
            checkpoint_dir,
            json,
        } => {
            init_logging(&config.logging);
            validate_or_warn(&config)?;
            cli::run_evaluate(
                &config,
                model,
                *episodes,
                data.as_deref(),
                *seed,
                checkpoint_dir.as_deref(),
                *json,
            )?;
        }
        Commands::Arena {
            steps,
            agents,
            data,
            seed,
            json,
        } => {
            init_logging(&config.logging);
            validate_or_warn(&config)?;
            cli::run_arena_command(&config, *steps, *agents, data.as_deref(), *seed, *json)?;
        }
        Commands::Generate {
            bars,
            volatility,
            drift,
            seed,
            out,
        } => {
            init_logging_simple();
            cli::run_generate(*bars, *volatility, *drift, *seed, out)?;
        }
    }

    Ok(())
}

fn validate_or_warn(config: &AppConfig) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        warn!("Invalid configuration: {}", e);
        return Err(e.into());
    }
    Ok(())
}
