//! ExitGuard CLI — replay, synthetic data, history and config commands.
//!
//! Commands:
//! - `replay` — run recorded bars through the exit engine, one position per symbol
//! - `synthetic` — write deterministic random-walk bars as CSV
//! - `history summary` — summarize closed positions by strategy or regime
//! - `config check` — load and validate a config file
//!
//! Logs go to stderr (`RUST_LOG`, default `exitguard=info`); results go to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use exitguard_core::domain::{MarketRegime, Side, StrategyType};
use exitguard_core::{ExitConfig, JsonHistoryStore, PositionLifecycleManager};
use exitguard_runner::{
    generate, load_bars, load_config, replay_all, save_bars, summarize, GroupBy, ReplayConfig,
    SyntheticConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exitguard", about = "ExitGuard — position risk-exit engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay CSV bars through the exit engine.
    Replay {
        /// TOML or JSON config file.
        #[arg(long, conflicts_with = "builtin")]
        config: Option<PathBuf>,

        /// Use the built-in parameter preset instead of a config file.
        #[arg(long, default_value_t = false)]
        builtin: bool,

        /// Bars CSV (timestamp,symbol,open,high,low,close,atr,rsi,volatility).
        #[arg(long)]
        bars: PathBuf,

        /// percentage, step or atr_based.
        #[arg(long)]
        strategy: StrategyType,

        /// trending, ranging, volatile or neutral.
        #[arg(long)]
        regime: MarketRegime,

        /// LONG or SHORT.
        #[arg(long, default_value = "LONG")]
        side: Side,

        /// History file; overrides the config's history path.
        #[arg(long)]
        history: Option<PathBuf>,

        #[arg(long, default_value_t = 1.0)]
        quantity: f64,
    },
    /// Generate synthetic bars.
    Synthetic {
        /// Symbols to generate (repeatable).
        #[arg(long = "symbol", required = true)]
        symbols: Vec<String>,

        /// Bars per symbol.
        #[arg(long, default_value_t = 500)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Per-bar drift added to the random return.
        #[arg(long, default_value_t = 0.0)]
        drift: f64,

        #[arg(long)]
        out: PathBuf,
    },
    /// Closed-position history commands.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Config commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Group closed positions and print summary statistics.
    Summary {
        #[arg(long)]
        path: PathBuf,

        /// strategy or regime.
        #[arg(long, default_value = "strategy")]
        by: GroupBy,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate a config file.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            builtin,
            bars,
            strategy,
            regime,
            side,
            history,
            quantity,
        } => run_replay(
            config.as_deref(),
            builtin,
            &bars,
            ReplayConfig {
                quantity,
                ..ReplayConfig::new(strategy, regime, side)
            },
            history,
        ),
        Commands::Synthetic {
            symbols,
            bars,
            seed,
            drift,
            out,
        } => run_synthetic(&symbols, bars, seed, drift, &out),
        Commands::History { action } => match action {
            HistoryAction::Summary { path, by } => run_history_summary(&path, by),
        },
        Commands::Config { action } => match action {
            ConfigAction::Check { config } => run_config_check(&config),
        },
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exitguard=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<&Path>, builtin: bool) -> Result<ExitConfig> {
    match (path, builtin) {
        (Some(path), _) => Ok(load_config(path)?),
        (None, true) => Ok(ExitConfig::builtin()),
        (None, false) => bail!("one of --config or --builtin is required"),
    }
}

fn run_replay(
    config_path: Option<&Path>,
    builtin: bool,
    bars_path: &Path,
    replay: ReplayConfig,
    history: Option<PathBuf>,
) -> Result<()> {
    let mut config = resolve_config(config_path, builtin)?;
    if history.is_some() {
        config.history.path = history;
    }
    let manager = PositionLifecycleManager::new(config)?;

    let bars = load_bars(bars_path)?;
    if bars.is_empty() {
        bail!("no bars in {}", bars_path.display());
    }
    info!(symbols = bars.len(), path = %bars_path.display(), "bars loaded");

    let report = replay_all(&manager, &bars, &replay)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_synthetic(symbols: &[String], bars: usize, seed: u64, drift: f64, out: &Path) -> Result<()> {
    let rows: Vec<_> = symbols
        .iter()
        .flat_map(|s| generate(&SyntheticConfig::new(s.as_str(), bars, seed).with_drift(drift)))
        .collect();
    save_bars(out, &rows).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {} bars for {} symbol(s) to {}", rows.len(), symbols.len(), out.display());
    Ok(())
}

fn run_history_summary(path: &Path, by: GroupBy) -> Result<()> {
    let records = JsonHistoryStore::new(path).load()?;
    if records.is_empty() {
        println!("No closed positions in {}", path.display());
        return Ok(());
    }

    let summary = summarize(&records, by);
    println!(
        "{:<12} {:>6} {:>10} {:>10} {:>10} {:>8} {:>9}",
        by.to_string(), "count", "mean %", "median %", "eff %", "win", "partials"
    );
    for (key, s) in &summary {
        println!(
            "{:<12} {:>6} {:>10.3} {:>10.3} {:>10.1} {:>7.1}% {:>8.1}%",
            key,
            s.count,
            s.mean_profit_pct,
            s.median_profit_pct,
            s.mean_efficiency,
            s.win_rate * 100.0,
            s.partial_exit_rate * 100.0,
        );
    }
    Ok(())
}

fn run_config_check(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let keys: usize = config.strategies.values().map(|r| r.len()).sum();
    println!("{}: OK ({keys} strategy/regime entries)", path.display());
    println!("fingerprint: {}", config.fingerprint()?);
    Ok(())
}
