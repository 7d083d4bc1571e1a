//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_sink::CsvResultSink;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::config_validation::{
    parse_anchor, parse_seed, validate_backtest_config, validate_data_config,
    validate_monte_carlo_config, validate_strategy_config, validate_walk_forward_config,
};
use crate::domain::error::BacktestError;
use crate::domain::metrics::{rank_reports, PerformanceReport};
use crate::domain::monte_carlo::{self, MonteCarloConfig, MonteCarloResult};
use crate::domain::ohlcv::PriceSeries;
use crate::domain::strategy::{Strategy, StrategyKind};
use crate::domain::walk_forward::{self, WalkForwardConfig, WalkForwardSummary};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notification_port::notify_best_effort;
use crate::ports::result_sink_port::ResultSink;

/// Log filter used when `RUST_LOG` is unset: warnings everywhere plus run
/// notifications.
pub const DEFAULT_LOG_FILTER: &str = "warn,barlab::notify=info";

#[derive(Parser, Debug)]
#[command(
    name = "barlab",
    about = "Strategy backtester with walk-forward and Monte Carlo validation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest and store its report
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Run the SMA crossover and RSI strategies side by side
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Evaluate the strategy on rolling out-of-sample windows
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        periods: Option<usize>,
    },
    /// Replay the strategy over resampled price paths
    MonteCarlo {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short = 'n', long)]
        simulations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a configuration file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
        } => run_backtest(&config, output.as_deref(), symbol.as_deref()),
        Command::Compare { config, symbol } => run_compare(&config, symbol.as_deref()),
        Command::WalkForward {
            config,
            symbol,
            periods,
        } => run_walk_forward(&config, symbol.as_deref(), periods),
        Command::MonteCarlo {
            config,
            symbol,
            simulations,
            seed,
        } => run_monte_carlo(&config, symbol.as_deref(), simulations, seed),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Where and how much market data to read.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub dir: PathBuf,
    pub symbol: String,
    pub interval: String,
    pub limit: usize,
}

pub fn build_data_request(
    adapter: &dyn ConfigPort,
    symbol_override: Option<&str>,
) -> Result<DataRequest, BacktestError> {
    let symbol = match symbol_override {
        Some(s) => s.to_string(),
        None => adapter
            .get_string("data", "symbol")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: "data".into(),
                key: "symbol".into(),
            })?,
    };
    let limit = adapter.get_int("data", "limit", 1000);
    if limit < 1 {
        return Err(BacktestError::invalid(
            "data",
            "limit",
            "limit must be at least 1",
        ));
    }

    Ok(DataRequest {
        dir: PathBuf::from(
            adapter
                .get_string("data", "dir")
                .unwrap_or_else(|| "data".to_string()),
        ),
        symbol: symbol.trim().to_string(),
        interval: adapter
            .get_string("data", "interval")
            .unwrap_or_else(|| "1h".to_string()),
        limit: limit as usize,
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let defaults = BacktestConfig::default();
    let warmup = adapter.get_int("backtest", "warmup", defaults.warmup as i64);
    if warmup < 0 {
        return Err(BacktestError::invalid(
            "backtest",
            "warmup",
            "warmup must be non-negative",
        ));
    }

    let config = BacktestConfig {
        initial_balance: adapter.get_double(
            "backtest",
            "initial_balance",
            defaults.initial_balance,
        ),
        fee_rate: adapter.get_double("backtest", "fee_rate", defaults.fee_rate),
        slippage: adapter.get_double("backtest", "slippage", defaults.slippage),
        warmup: warmup as usize,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, BacktestError> {
    let kind_id = adapter
        .get_string("strategy", "kind")
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "strategy".into(),
            key: "kind".into(),
        })?;

    let kind = match kind_id.trim() {
        "sma_crossover" => sma_kind(adapter),
        "rsi" => rsi_kind(adapter),
        other => {
            return Err(BacktestError::invalid(
                "strategy",
                "kind",
                format!("unknown strategy kind '{other}'"),
            ))
        }
    };

    let name = adapter
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| kind.id().to_string());

    let strategy = Strategy::new(name, kind);
    strategy.validate()?;
    Ok(strategy)
}

fn period(adapter: &dyn ConfigPort, key: &str, default: usize) -> usize {
    // negative values map to 0 and are rejected by Strategy::validate
    adapter
        .get_int("strategy", key, default as i64)
        .max(0) as usize
}

fn sma_kind(adapter: &dyn ConfigPort) -> StrategyKind {
    StrategyKind::SmaCrossover {
        short_period: period(adapter, "short_period", 10),
        long_period: period(adapter, "long_period", 50),
    }
}

fn rsi_kind(adapter: &dyn ConfigPort) -> StrategyKind {
    StrategyKind::Rsi {
        period: period(adapter, "rsi_period", 14),
        oversold: adapter.get_double("strategy", "oversold", 30.0),
        overbought: adapter.get_double("strategy", "overbought", 70.0),
    }
}

pub fn build_walk_forward_config(
    adapter: &dyn ConfigPort,
    series: &PriceSeries,
    periods_override: Option<usize>,
) -> Result<WalkForwardConfig, BacktestError> {
    let anchor = match parse_anchor(adapter)? {
        Some(anchor) => anchor,
        None => {
            series
                .last()
                .ok_or_else(|| BacktestError::InsufficientData {
                    bars: 0,
                    minimum: 1,
                })?
                .timestamp
        }
    };

    let days = |key: &str, default: i64| {
        chrono::Duration::try_days(adapter.get_int("walk_forward", key, default)).ok_or_else(|| {
            BacktestError::invalid("walk_forward", key, "window length out of range")
        })
    };
    let periods = match periods_override {
        Some(p) => p,
        None => adapter.get_int("walk_forward", "periods", 4).max(0) as usize,
    };

    let config = WalkForwardConfig {
        anchor,
        train_len: days("train_days", 90)?,
        test_len: days("test_days", 30)?,
        periods,
    };
    config.validate()?;
    walk_forward::generate_windows(&config)?;
    Ok(config)
}

pub fn build_monte_carlo_config(
    adapter: &dyn ConfigPort,
    simulations_override: Option<usize>,
    seed_override: Option<u64>,
) -> Result<MonteCarloConfig, BacktestError> {
    let simulations = match simulations_override {
        Some(n) => n,
        None => adapter.get_int("monte_carlo", "simulations", 1000).max(0) as usize,
    };
    let seed = match seed_override {
        Some(seed) => Some(seed),
        None => parse_seed(adapter)?,
    };

    let config = MonteCarloConfig { simulations, seed };
    config.validate()?;
    Ok(config)
}

fn fetch_series(request: &DataRequest) -> Result<PriceSeries, BacktestError> {
    eprintln!(
        "Fetching {} {} bars (limit {}) from {}",
        request.symbol,
        request.interval,
        request.limit,
        request.dir.display()
    );
    CsvAdapter::new(request.dir.clone()).fetch_bars(
        &request.symbol,
        &request.interval,
        request.limit,
    )
}

fn output_dir(adapter: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        adapter
            .get_string("output", "dir")
            .unwrap_or_else(|| "results".to_string()),
    )
}

fn notify(adapter: &dyn ConfigPort, message: &str) {
    if adapter.get_bool("output", "notify", true) {
        notify_best_effort(&LogNotifier::new("barlab"), message);
    }
}

fn run_backtest(
    config_path: &Path,
    output: Option<&Path>,
    symbol: Option<&str>,
) -> Result<(), BacktestError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let request = build_data_request(&adapter, symbol)?;
    let series = fetch_series(&request)?;

    eprintln!(
        "Running backtest: {} on {} ({} bars, warm-up {})",
        strategy.name,
        series.symbol(),
        series.len(),
        bt_config.warmup
    );
    let result = backtest_engine::run_backtest(&series, &strategy, &bt_config)?;
    let report = PerformanceReport::compute(&result);
    print_report(&strategy.name, &report);

    let sink = CsvResultSink::new(
        output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| output_dir(&adapter)),
    );
    sink.store(&strategy.name, &report, &result.trades)?;
    eprintln!("\nReport appended to: {}", sink.reports_path().display());

    notify(
        &adapter,
        &format!(
            "backtest {} on {}: {:+.2}% over {} trades",
            strategy.name,
            series.symbol(),
            report.total_return_pct,
            report.total_trades
        ),
    );
    Ok(())
}

fn run_compare(config_path: &Path, symbol: Option<&str>) -> Result<(), BacktestError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let request = build_data_request(&adapter, symbol)?;
    let series = fetch_series(&request)?;

    let strategies = vec![
        Strategy::new("sma_crossover", sma_kind(&adapter)),
        Strategy::new("rsi", rsi_kind(&adapter)),
    ];
    eprintln!(
        "Running {} strategies on {} ({} bars)",
        strategies.len(),
        series.symbol(),
        series.len()
    );

    let results = backtest_engine::run_batch(&strategies, &series, &bt_config);
    let mut ranked = Vec::with_capacity(strategies.len());
    let mut first_error = None;
    for (strategy, result) in strategies.iter().zip(results) {
        match result {
            Ok(result) => {
                let report = PerformanceReport::compute(&result);
                print_report(&strategy.name, &report);
                ranked.push((strategy.name.as_str(), report));
            }
            Err(e) => {
                eprintln!("\n{}: error: {e}", strategy.name);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    rank_reports(&mut ranked);
    print_ranking(&ranked);

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run_walk_forward(
    config_path: &Path,
    symbol: Option<&str>,
    periods: Option<usize>,
) -> Result<(), BacktestError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    validate_walk_forward_config(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let request = build_data_request(&adapter, symbol)?;
    let series = fetch_series(&request)?;
    let wf_config = build_walk_forward_config(&adapter, &series, periods)?;

    eprintln!(
        "Running walk-forward: {} periods, train {}d / test {}d, anchor {}",
        wf_config.periods,
        wf_config.train_len.num_days(),
        wf_config.test_len.num_days(),
        wf_config.anchor.to_rfc3339()
    );
    let summary = walk_forward::evaluate(&strategy, &series, &bt_config, &wf_config)?;
    print_walk_forward(&summary);

    notify(
        &adapter,
        &format!(
            "walk-forward {} on {}: consistency {:.0}%, mean test return {:+.2}%",
            strategy.name,
            series.symbol(),
            summary.consistency_score * 100.0,
            summary.mean_test_return_pct
        ),
    );
    Ok(())
}

fn run_monte_carlo(
    config_path: &Path,
    symbol: Option<&str>,
    simulations: Option<usize>,
    seed: Option<u64>,
) -> Result<(), BacktestError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    validate_monte_carlo_config(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let mc_config = build_monte_carlo_config(&adapter, simulations, seed)?;
    let request = build_data_request(&adapter, symbol)?;
    let series = fetch_series(&request)?;

    eprintln!(
        "Running Monte Carlo: {} simulations of {} on {}",
        mc_config.simulations,
        strategy.name,
        series.symbol()
    );
    let result = monte_carlo::run_monte_carlo(&strategy, &series, &bt_config, &mc_config)?;
    print_monte_carlo(&result);

    notify(
        &adapter,
        &format!(
            "monte carlo {} on {}: VaR95 {:.2}%, actual {:+.2}%",
            strategy.name,
            series.symbol(),
            result.var_95,
            result.actual_return
        ),
    );
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), BacktestError> {
    let adapter = load_config(config_path)?;

    validate_data_config(&adapter)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;
    validate_walk_forward_config(&adapter)?;
    validate_monte_carlo_config(&adapter)?;

    let strategy = build_strategy(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    eprintln!("\nStrategy:  {} ({})", strategy.name, strategy.kind.id());
    eprintln!(
        "Backtest:  balance {:.2}, fee {}, slippage {}, warm-up {}",
        bt_config.initial_balance, bt_config.fee_rate, bt_config.slippage, bt_config.warmup
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn print_report(name: &str, report: &PerformanceReport) {
    eprintln!("\n=== {name} ===");
    eprintln!("Final Balance:    {:.2}", report.final_balance);
    eprintln!("Total Return:     {:.2}%", report.total_return_pct);
    eprintln!("Annualized:       {:.2}%", report.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", report.sharpe_ratio);
    eprintln!("Calmar Ratio:     {:.2}", report.calmar_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", report.max_drawdown_pct);
    eprintln!("Total Trades:     {}", report.total_trades);
    eprintln!("Win Rate:         {:.1}%", report.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", report.profit_factor);
    eprintln!("Avg Hold:         {:.1}h", report.avg_hold_time_hours);
    eprintln!("Total Fees:       {:.2}", report.total_fees);
}

fn print_ranking(ranked: &[(&str, PerformanceReport)]) {
    eprintln!("\n=== Ranking (Sharpe x Return) ===");
    for (i, (name, report)) in ranked.iter().take(10).enumerate() {
        eprintln!(
            "{:2}. {:<20} | Return: {:+7.2}% | Sharpe: {:5.2} | Win Rate: {:5.1}% | Max DD: {:5.2}%",
            i + 1,
            name,
            report.total_return_pct,
            report.sharpe_ratio,
            report.win_rate * 100.0,
            report.max_drawdown_pct
        );
    }
}

fn print_walk_forward(summary: &WalkForwardSummary) {
    eprintln!("\n=== Walk-Forward ===");
    for p in &summary.periods {
        eprintln!(
            "  Period {}: test {} .. {}  train {:+.2}%  test {:+.2}% (sharpe {:.2})",
            p.window.period,
            p.window.test_start.to_rfc3339(),
            p.window.test_end.to_rfc3339(),
            p.train_report.total_return_pct,
            p.test_report.total_return_pct,
            p.test_report.sharpe_ratio,
        );
    }
    eprintln!("Mean Train Return: {:+.2}%", summary.mean_train_return_pct);
    eprintln!("Mean Test Return:  {:+.2}%", summary.mean_test_return_pct);
    eprintln!("Mean Test Sharpe:  {:.2}", summary.mean_test_sharpe);
    eprintln!("Consistency:       {:.0}%", summary.consistency_score * 100.0);
}

fn print_monte_carlo(result: &MonteCarloResult) {
    eprintln!("\n=== Monte Carlo ({} runs, seed {}) ===", result.simulations, result.seed);
    eprintln!("Mean Return:      {:+.2}%", result.mean_return);
    eprintln!("Std Dev:          {:.2}%", result.std_return);
    eprintln!("VaR 95:           {:+.2}%", result.var_95);
    eprintln!("VaR 99:           {:+.2}%", result.var_99);
    eprintln!("Range:            {:+.2}% .. {:+.2}%", result.min_return, result.max_return);
    eprintln!("Positive:         {:.1}%", result.positive_fraction * 100.0);
    eprintln!("Actual Return:    {:+.2}%", result.actual_return);
}
