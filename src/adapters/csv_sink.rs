//! CSV result sink.
//!
//! Appends one summary row per run to `<dir>/reports.csv` and writes the
//! ledger of each run to `<dir>/<name>_trades.csv`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::error::BacktestError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::position::{Side, Trade};
use crate::ports::result_sink_port::ResultSink;

const REPORT_HEADER: [&str; 16] = [
    "name",
    "start_time",
    "end_time",
    "initial_balance",
    "final_balance",
    "total_return_pct",
    "total_trades",
    "win_rate",
    "profit_factor",
    "max_drawdown_pct",
    "sharpe_ratio",
    "volatility",
    "annualized_return",
    "calmar_ratio",
    "avg_hold_time_hours",
    "total_fees",
];

const TRADE_HEADER: [&str; 10] = [
    "side",
    "entry_time",
    "exit_time",
    "size",
    "entry_price",
    "exit_price",
    "entry_fee",
    "exit_fee",
    "pnl",
    "return_pct",
];

pub struct CsvResultSink {
    dir: PathBuf,
}

impl CsvResultSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn reports_path(&self) -> PathBuf {
        self.dir.join("reports.csv")
    }

    pub fn trades_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_trades.csv", file_stem(name)))
    }

    fn append_report(&self, name: &str, report: &PerformanceReport) -> Result<(), BacktestError> {
        let path = self.reports_path();
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(REPORT_HEADER).map_err(sink_error)?;
        }
        let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_default()
        };
        writer
            .write_record([
                name.to_string(),
                time(report.start_time),
                time(report.end_time),
                report.initial_balance.to_string(),
                report.final_balance.to_string(),
                report.total_return_pct.to_string(),
                report.total_trades.to_string(),
                report.win_rate.to_string(),
                report.profit_factor.to_string(),
                report.max_drawdown_pct.to_string(),
                report.sharpe_ratio.to_string(),
                report.volatility.to_string(),
                report.annualized_return.to_string(),
                report.calmar_ratio.to_string(),
                report.avg_hold_time_hours.to_string(),
                report.total_fees.to_string(),
            ])
            .map_err(sink_error)?;
        writer.flush()?;
        Ok(())
    }

    fn write_trades(&self, path: &Path, trades: &[Trade]) -> Result<(), BacktestError> {
        let mut writer = csv::Writer::from_path(path).map_err(sink_error)?;
        writer.write_record(TRADE_HEADER).map_err(sink_error)?;
        for trade in trades {
            let side = match trade.side {
                Side::Long => "long",
                Side::Short => "short",
            };
            writer
                .write_record([
                    side.to_string(),
                    trade.entry_time.to_rfc3339(),
                    trade.exit_time.to_rfc3339(),
                    trade.size.to_string(),
                    trade.entry_price.to_string(),
                    trade.exit_price.to_string(),
                    trade.entry_fee.to_string(),
                    trade.exit_fee.to_string(),
                    trade.pnl.to_string(),
                    trade.return_pct.to_string(),
                ])
                .map_err(sink_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn sink_error(e: csv::Error) -> BacktestError {
    BacktestError::Sink {
        reason: e.to_string(),
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl ResultSink for CsvResultSink {
    fn store(
        &self,
        name: &str,
        report: &PerformanceReport,
        trades: &[Trade],
    ) -> Result<(), BacktestError> {
        fs::create_dir_all(&self.dir).map_err(|e| BacktestError::Sink {
            reason: format!("failed to create {}: {}", self.dir.display(), e),
        })?;
        self.append_report(name, report)?;
        self.write_trades(&self.trades_path(name), trades)
    }
}
