//! qqelab CLI: backtest, live forward-trading and report commands.
//!
//! Commands:
//! - `backtest`: run the strategy over a CSV price table or synthetic bars
//! - `live`: poll Binance klines and route orders through the relay
//! - `report`: re-render the markdown summary of a saved run

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qqelab_runner::{
    load_bars, load_run, render_markdown, run_backtest, run_live, ArtifactManager,
    BacktestResult, BinanceKlines, DryRunSubmitter, LiveLimits, LiveSummary, QqeConfig,
    RelaySubmitter,
};

#[derive(Parser)]
#[command(
    name = "qqelab",
    version,
    about = "qqelab: QQE / Hull MA / volume oscillator strategy runner"
)]
struct Cli {
    #[command(flatten)]
    logging: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LogArgs {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a TOML config file.
    Backtest {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV price table (overrides backtest.data).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Symbol recorded on the loaded bars.
        #[arg(long)]
        symbol: Option<String>,

        /// Use seeded synthetic bars instead of a CSV file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Inclusive start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Inclusive end date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Write manifest.json, equity.csv, trades.csv and report.md here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Forward-trade on live Binance klines.
    Live {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log orders instead of posting them to the relay.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Relay webhook URL (overrides live.relay_url).
        #[arg(long)]
        relay_url: Option<String>,

        /// Stop after this many polls.
        #[arg(long)]
        max_polls: Option<usize>,
    },
    /// Print the markdown report of a saved run.
    Report {
        /// Run directory containing manifest.json.
        run_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.logging) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "qqelab failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Backtest {
            config,
            data,
            symbol,
            synthetic,
            start,
            end,
            output_dir,
        } => {
            let mut config = load_config(config.as_deref())?;
            let b = &mut config.backtest;
            if data.is_some() {
                b.data = data;
            }
            if let Some(symbol) = symbol {
                b.symbol = symbol;
            }
            b.synthetic |= synthetic;
            b.start = start.or(b.start);
            b.end = end.or(b.end);
            config.validate()?;
            run_backtest_cmd(&config, output_dir.as_deref())
        }
        Commands::Live {
            config,
            dry_run,
            relay_url,
            max_polls,
        } => {
            let mut config = load_config(config.as_deref())?;
            if relay_url.is_some() {
                config.live.relay_url = relay_url;
            }
            config.validate()?;
            run_live_cmd(&config, dry_run, max_polls)
        }
        Commands::Report { run_dir } => run_report_cmd(&run_dir),
    }
}

fn init_logging(args: &LogArgs) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let writer = match &args.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(args.log_file.is_none())
                    .with_writer(writer),
            )
            .init();
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<QqeConfig> {
    match path {
        Some(path) => QqeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(QqeConfig::default()),
    }
}

fn run_backtest_cmd(config: &QqeConfig, output_dir: Option<&Path>) -> Result<()> {
    let data = load_bars(&config.backtest)?;
    info!(bars = data.bars.len(), synthetic = data.has_synthetic, "data loaded");

    let result = run_backtest(config, &data)?;
    print_summary(&result);

    if let Some(dir) = output_dir {
        let paths = ArtifactManager::new(dir)?.save_run(&result)?;
        println!("Artifacts saved to: {}", paths.run_dir.display());
    }
    Ok(())
}

fn run_live_cmd(config: &QqeConfig, dry_run: bool, max_polls: Option<usize>) -> Result<()> {
    let mut poller = BinanceKlines::from_config(config)?;
    let limits = LiveLimits::from_config(config, max_polls);

    let summary = match (&config.live.relay_url, dry_run) {
        (Some(url), false) => {
            let submitter = RelaySubmitter::new(url.clone())?;
            run_live(config, &mut poller, submitter, &limits)?
        }
        (None, false) => {
            warn!("no relay_url configured, orders will only be logged");
            run_live(config, &mut poller, DryRunSubmitter::new(), &limits)?
        }
        (_, true) => run_live(config, &mut poller, DryRunSubmitter::new(), &limits)?,
    };
    print_live_summary(&summary);
    Ok(())
}

fn run_report_cmd(run_dir: &Path) -> Result<()> {
    let (manifest, trades) = load_run(run_dir)?;
    print!("{}", render_markdown(&manifest, &trades));
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let s = &m.trades;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:          {}", result.symbol);
    println!(
        "Period:          {} to {}",
        result.start.format("%Y-%m-%d %H:%M"),
        result.end.format("%Y-%m-%d %H:%M")
    );
    println!(
        "Bars:            {} ({} warmup)",
        result.bar_count, result.warmup_bars
    );
    println!();
    println!("Starting Value:  {:.2}", m.initial_value);
    println!("Final Value:     {:.2}", m.final_value);
    println!("P/L:             {:+.2}", m.pnl);
    println!();
    println!("--- Performance ---");
    println!("Total Return:    {:.2}%", m.total_return * 100.0);
    println!(
        "Max Drawdown:    {:.2}% ({:.2})",
        m.max_drawdown * 100.0,
        m.max_drawdown_money
    );
    println!("Sharpe:          {:.3}", m.sharpe);
    println!("Sortino:         {:.3}", m.sortino);
    println!("SQN:             {:.2}", m.sqn);
    println!();
    println!("--- Trades ---");
    println!("Closed:          {} (won {}, lost {})", s.total, s.won, s.lost);
    println!("Win Rate:        {:.1}%", s.win_rate * 100.0);
    println!("Net PnL:         {:+.4}", s.net_pnl);
    println!("Profit Factor:   {:.2}", s.profit_factor);
    println!("Max Consec Win:  {}", s.max_consecutive_wins);
    println!("Max Consec Loss: {}", s.max_consecutive_losses);
    if result.open_position_size > 0.0 {
        println!("Open at end:     {:.6} units", result.open_position_size);
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_live_summary(summary: &LiveSummary) {
    println!();
    println!("=== Live Session ===");
    println!("Polls:           {}", summary.polls);
    println!("Bars processed:  {}", summary.bars_processed);
    println!("Entries:         {}", summary.entries);
    println!("Cycles:          {}", summary.cycles);
    println!("Orders sent:     {}", summary.submitted);
    println!("Total profit:    {:+.6}", summary.total_profit);
    if summary.open_position_size > 0.0 {
        println!("Open position:   {:.6}", summary.open_position_size);
    }
    if let Some(last) = summary.last_bar {
        println!("Last bar:        {last}");
    }
    println!();
}
