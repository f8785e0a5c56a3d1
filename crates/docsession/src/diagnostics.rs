//! Side channel for failures that cannot cross the host boundary.
//!
//! Host callbacks must return the neutral status no matter what went wrong.
//! Whatever they catch is classified and handed to an [`ErrorSink`], which
//! logs it and rebroadcasts it to the application.

use docsession_core::lifecycle::ReleaseFailure;
use docsession_core::{ErrorClass, EventBus, SessionError, SubscriptionId};
use std::sync::Arc;

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Operation that was running, e.g. `"notify_active_changed"`.
    pub context: &'static str,
    pub class: ErrorClass,
    pub message: String,
}

/// Shared error channel.
///
/// Cloning is cheap; all clones report to the same listeners.
///
/// # Examples
///
/// ```
/// use docsession::diagnostics::ErrorSink;
/// use docsession_core::{ErrorClass, HostError, SessionError};
/// use std::sync::{Arc, Mutex};
///
/// let sink = ErrorSink::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let store = Arc::clone(&seen);
/// sink.subscribe(move |report| store.lock().unwrap().push(report.class));
///
/// sink.report("reload", &SessionError::host("kind", HostError::Failed("busy".into())));
/// sink.report("reload", &SessionError::host("kind", HostError::InvalidHandle));
///
/// assert_eq!(*seen.lock().unwrap(), vec![ErrorClass::HostCallFailure]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    reports: Arc<EventBus<ErrorReport>>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        self.reports.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.reports.unsubscribe(id)
    }

    /// Logs and rebroadcasts `error`.
    ///
    /// Invalid-handle failures are teardown races: they are logged at debug
    /// level and not rebroadcast.
    pub fn report(&self, context: &'static str, error: &SessionError) {
        let class = error.class();
        if class == ErrorClass::InvalidHandleFailure {
            tracing::debug!("{}: absorbed teardown race: {}", context, error);
            return;
        }

        tracing::error!(class = class.as_str(), "{}: {}", context, error);
        self.publish(ErrorReport {
            context,
            class,
            message: error.to_string(),
        });
    }

    /// Reports release failures collected while disposing.
    pub fn report_release_failures(&self, context: &'static str, failures: Vec<ReleaseFailure>) {
        for failure in failures {
            tracing::warn!("{}: {}", context, failure);
            self.publish(ErrorReport {
                context,
                class: ErrorClass::HostCallFailure,
                message: failure.to_string(),
            });
        }
    }

    /// Reports panics caught while emitting `event`.
    pub fn report_listener_panics(&self, context: &'static str, event: &str, panics: Vec<String>) {
        for message in panics {
            self.report(
                context,
                &SessionError::Listener {
                    event: event.to_string(),
                    message,
                },
            );
        }
    }

    fn publish(&self, report: ErrorReport) {
        // Listener failures here have nowhere left to go.
        let outcome = self.reports.emit(&report);
        for message in outcome.panics {
            tracing::error!("error listener panicked: {}", message);
        }
    }
}
