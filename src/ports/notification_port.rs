//! Notification port trait.

use tracing::warn;

use crate::domain::error::BacktestError;

pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), BacktestError>;
}

/// Send `message`, logging instead of returning any failure.
pub fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.notify(message) {
        warn!(error = %e, "notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recording {
        sent: RefCell<Vec<String>>,
    }

    impl Notifier for Recording {
        fn notify(&self, message: &str) -> Result<(), BacktestError> {
            self.sent.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _message: &str) -> Result<(), BacktestError> {
            Err(BacktestError::Sink {
                reason: "channel closed".into(),
            })
        }
    }

    #[test]
    fn delivers_message() {
        let notifier = Recording {
            sent: RefCell::new(Vec::new()),
        };
        notify_best_effort(&notifier, "done");
        assert_eq!(*notifier.sent.borrow(), vec!["done".to_string()]);
    }

    #[test]
    fn failure_is_swallowed() {
        notify_best_effort(&Broken, "done");
    }
}
