//! Notifier that publishes through `tracing`.

use tracing::info;

use crate::domain::error::BacktestError;
use crate::ports::notification_port::Notifier;

/// Target every notification is logged under; the binary's default filter
/// enables it at `info`.
pub const NOTIFY_TARGET: &str = "barlab::notify";

#[derive(Debug, Default)]
pub struct LogNotifier {
    channel: String,
}

impl LogNotifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), BacktestError> {
        info!(target: NOTIFY_TARGET, channel = %self.channel, "{message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DEFAULT_LOG_FILTER;
    use crate::ports::notification_port::notify_best_effort;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn notify_always_succeeds() {
        let notifier = LogNotifier::new("runs");
        assert!(notifier.notify("backtest finished").is_ok());
        notify_best_effort(&notifier, "again");
    }

    #[test]
    fn default_filter_shows_notifications_but_not_engine_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(DEFAULT_LOG_FILTER))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            LogNotifier::new("runs").notify("walk-forward done").unwrap();
            info!("per-run detail");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("walk-forward done"));
        assert!(!output.contains("per-run detail"));
    }
}
