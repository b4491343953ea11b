//! Command-line interface for the `tradegym` binary.
//!
//! Output is a human-readable table by default and JSON with `--json`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::info;

use crate::config::AppConfig;
use crate::rl::training::timestamped_name;
use crate::rl::{
    evaluate, generate_sample_data, run_arena, summarize_results, train, AgentKind, AgentSpec,
    Checkpointer, EpisodeResult, LeaderboardEntry, MultiAgentConfig, MultiAgentEnvironment,
    PriceSeries, SampleDataConfig, TradingAgent, TradingEnvironment, TrainingSummary,
};

#[derive(Parser)]
#[command(name = "tradegym")]
#[command(version)]
#[command(about = "Reinforcement-learning trading simulator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus $TRADEGYM_ENV overrides)
    #[arg(short, long, default_value = "config", env = "TRADEGYM_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a PPO agent on historical or synthetic data
    Train {
        /// Number of training episodes (defaults to training.episodes)
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Price history file (JSON array of bars); synthetic data when omitted
        #[arg(short, long)]
        data: Option<String>,
        /// RNG seed for agent, environment and synthetic data
        #[arg(long)]
        seed: Option<u64>,
        /// Checkpoint directory (defaults to training.checkpoint_dir)
        #[arg(long)]
        checkpoint_dir: Option<String>,
        /// Resume from a named checkpoint
        #[arg(long)]
        resume: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a saved model greedily
    Evaluate {
        /// Checkpoint name to evaluate
        #[arg(short, long)]
        model: String,
        /// Number of evaluation episodes
        #[arg(short, long, default_value = "10")]
        episodes: usize,
        /// Price history file (JSON array of bars); synthetic data when omitted
        #[arg(short, long)]
        data: Option<String>,
        /// RNG seed for start offsets and synthetic data
        #[arg(long)]
        seed: Option<u64>,
        /// Checkpoint directory (defaults to training.checkpoint_dir)
        #[arg(long)]
        checkpoint_dir: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run several agents against one shared market
    Arena {
        /// Steps to simulate
        #[arg(short, long, default_value = "500")]
        steps: usize,
        /// Number of agents (kinds rotate ppo, aggressive, conservative)
        #[arg(short, long, default_value = "3")]
        agents: usize,
        /// Price history file (JSON array of bars); synthetic data when omitted
        #[arg(short, long)]
        data: Option<String>,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a synthetic price history
    Generate {
        /// Number of bars
        #[arg(short, long, default_value = "1500")]
        bars: usize,
        /// Std dev of per-bar log returns
        #[arg(short, long, default_value = "0.02")]
        volatility: f64,
        /// Mean per-bar log return
        #[arg(long, default_value = "0.0002")]
        drift: f64,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Output file
        #[arg(short, long)]
        out: String,
    },
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct LeaderboardRow {
    #[tabled(rename = "Rank")]
    pub rank: String,
    #[tabled(rename = "Agent")]
    pub agent_id: String,
    #[tabled(rename = "Type")]
    pub agent_type: String,
    #[tabled(rename = "Return")]
    pub total_return: String,
    #[tabled(rename = "Sharpe")]
    pub sharpe_ratio: String,
    #[tabled(rename = "Value")]
    pub portfolio_value: String,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank.to_string(),
            agent_id: entry.agent_id.clone(),
            agent_type: entry.agent_type.to_string(),
            total_return: format!("{:.2}%", entry.total_return * 100.0),
            sharpe_ratio: format!("{:.3}", entry.sharpe_ratio),
            portfolio_value: format!("{:.2}", entry.portfolio_value),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

fn summary_rows(summary: &TrainingSummary) -> Vec<SummaryRow> {
    let row = |metric: &str, value: String| SummaryRow {
        metric: metric.to_string(),
        value,
    };
    vec![
        row("Episodes", summary.num_episodes.to_string()),
        row("Avg reward", format!("{:.4}", summary.avg_reward)),
        row("Avg return", format!("{:.2}%", summary.avg_return * 100.0)),
        row("Best return", format!("{:.2}%", summary.best_return * 100.0)),
        row("Worst return", format!("{:.2}%", summary.worst_return * 100.0)),
        row("Avg sharpe", format!("{:.3}", summary.avg_sharpe)),
        row("Avg steps", format!("{:.1}", summary.avg_steps)),
        row("Avg trades", format!("{:.1}", summary.avg_trades)),
        row("Win rate", format!("{:.1}%", summary.episode_win_rate * 100.0)),
        row("Max drawdown", format!("{:.2}%", summary.max_drawdown * 100.0)),
        row("Updates", summary.updates.to_string()),
    ]
}

fn print_summary(results: &[EpisodeResult], mode: OutputMode) -> anyhow::Result<()> {
    let summary = summarize_results(results);
    match mode {
        OutputMode::Table => print_items(&summary_rows(&summary), mode),
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Load a price history file, or generate one when no path is given
pub fn load_price_data(path: Option<&str>, seed: Option<u64>) -> anyhow::Result<Arc<PriceSeries>> {
    let series = match path {
        Some(path) => PriceSeries::from_json_file(path)
            .with_context(|| format!("failed to load price data from {path}"))?,
        None => generate_sample_data(&SampleDataConfig {
            seed,
            ..Default::default()
        })?,
    };
    info!(bars = series.len(), "Loaded price data");
    Ok(Arc::new(series))
}

fn build_environment(
    config: &AppConfig,
    data: Arc<PriceSeries>,
    seed: Option<u64>,
) -> anyhow::Result<TradingEnvironment> {
    let env = TradingEnvironment::new(config.environment.clone(), data)?;
    Ok(match seed {
        Some(seed) => env.with_seed(seed),
        None => env,
    })
}

pub fn run_train(
    config: &AppConfig,
    episodes: Option<usize>,
    data: Option<&str>,
    seed: Option<u64>,
    checkpoint_dir: Option<&str>,
    resume: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let checkpointer = Checkpointer::new(
        checkpoint_dir.unwrap_or(&config.training.checkpoint_dir),
        config.training.max_checkpoints,
    )?;

    let mut rl_config = config.rl.clone();
    if seed.is_some() {
        rl_config.seed = seed;
    }

    let mut agent = match resume {
        Some(name) => {
            let snapshot = checkpointer.load(name)?;
            info!(checkpoint = name, "Resuming from checkpoint");
            TradingAgent::from_snapshot(&snapshot)?
        }
        None => TradingAgent::new(rl_config)?,
    };

    let data = load_price_data(data, seed)?;
    let mut env = build_environment(config, data, seed)?;
    let episodes = episodes.unwrap_or(config.training.episodes);

    info!(episodes, "Starting training");
    let results = train(
        &mut agent,
        &mut env,
        episodes,
        Some(&checkpointer),
        config.training.checkpoint_frequency,
    )?;

    let final_path = checkpointer.save(&agent.save_model(), &timestamped_name("ppo_final"))?;
    info!(path = %final_path.display(), "Training complete");

    print_summary(&results, OutputMode::from_json_flag(json))
}

pub fn run_evaluate(
    config: &AppConfig,
    model: &str,
    episodes: usize,
    data: Option<&str>,
    seed: Option<u64>,
    checkpoint_dir: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let checkpointer = Checkpointer::new(
        checkpoint_dir.unwrap_or(&config.training.checkpoint_dir),
        config.training.max_checkpoints,
    )?;
    let snapshot = checkpointer.load(model)?;
    let agent = TradingAgent::from_snapshot(&snapshot)?;

    let data = load_price_data(data, seed)?;
    let mut env = build_environment(config, data, seed)?;

    let results = evaluate(&agent, &mut env, episodes)?;
    print_summary(&results, OutputMode::from_json_flag(json))
}

/// Agent roster for an arena of `count` participants
pub fn arena_roster(count: usize) -> Vec<AgentSpec> {
    const KINDS: [AgentKind; 3] = [AgentKind::Ppo, AgentKind::Aggressive, AgentKind::Conservative];
    (0..count)
        .map(|i| AgentSpec::new(format!("agent-{}", i + 1), KINDS[i % KINDS.len()]))
        .collect()
}

pub fn run_arena_command(
    config: &AppConfig,
    steps: usize,
    agents: usize,
    data: Option<&str>,
    seed: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let multi_config = MultiAgentConfig {
        agents: arena_roster(agents),
        ..config.multi_agent.clone()
    };

    let mut participants = HashMap::with_capacity(multi_config.agents.len());
    for (i, spec) in multi_config.agents.iter().enumerate() {
        let mut rl_config = config.rl.clone();
        if let Some(seed) = seed {
            rl_config.seed = Some(seed.wrapping_add(i as u64));
        }
        participants.insert(spec.id.clone(), TradingAgent::new(rl_config)?);
    }

    let data = load_price_data(data, seed)?;
    let env = MultiAgentEnvironment::new(multi_config, config.environment.clone(), data)?;
    let mut env = match seed {
        Some(seed) => env.with_seed(seed),
        None => env,
    };

    let leaderboard = run_arena(&mut env, &mut participants, steps)?;
    let rows: Vec<LeaderboardRow> = leaderboard.iter().map(LeaderboardRow::from).collect();
    print_items(&rows, OutputMode::from_json_flag(json))
}

pub fn run_generate(
    bars: usize,
    volatility: f64,
    drift: f64,
    seed: Option<u64>,
    out: &str,
) -> anyhow::Result<()> {
    let series = generate_sample_data(&SampleDataConfig {
        bars,
        volatility,
        drift,
        seed,
        ..Default::default()
    })?;
    series
        .to_json_file(out)
        .with_context(|| format!("failed to write {out}"))?;
    println!("Wrote {} bars to {}", series.len(), out);
    Ok(())
}
