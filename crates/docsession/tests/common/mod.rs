//! Common test utilities for integration tests.
//!
//! This module provides shared infrastructure for session tests: a session
//! wired to the scripted host, and recorders that capture outbound events in
//! the order they were raised.

use docsession::config::SessionConfig;
use docsession::diagnostics::ErrorReport;
use docsession::document::DocumentEvent;
use docsession::session::{ApplicationSession, SessionEvent};
use docsession_core::testing::FakeHost;
use std::sync::{Arc, RwLock};

/// Session over a fresh scripted host.
pub(crate) struct Harness {
    pub host: Arc<FakeHost>,
    pub session: ApplicationSession,
    pub events: EventRecorder<SessionEvent>,
    pub errors: EventRecorder<ErrorReport>,
}

impl Harness {
    /// Must be called from inside a tokio runtime.
    pub(crate) fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub(crate) fn with_config(config: SessionConfig) -> Self {
        let host = FakeHost::new();
        let session = ApplicationSession::new(
            host.clone(),
            config,
            tokio::runtime::Handle::current(),
        );

        let events = EventRecorder::new();
        let sink = events.clone();
        session.subscribe(move |event| sink.push(event.clone()));

        let errors = EventRecorder::new();
        let sink = errors.clone();
        session.errors().subscribe(move |report| sink.push(report.clone()));

        Self {
            host,
            session,
            events,
            errors,
        }
    }
}

/// Ordered capture of events of one type.
#[derive(Clone)]
pub(crate) struct EventRecorder<E> {
    captured: Arc<RwLock<Vec<E>>>,
}

impl<E: Clone + std::fmt::Debug> EventRecorder<E> {
    pub(crate) fn new() -> Self {
        Self {
            captured: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, event: E) {
        self.captured
            .write()
            .expect("Failed to acquire write lock")
            .push(event);
    }

    pub(crate) fn all(&self) -> Vec<E> {
        self.captured
            .read()
            .expect("Failed to acquire read lock")
            .clone()
    }

    /// Clear all captured events.
    pub(crate) fn clear(&self) {
        self.captured
            .write()
            .expect("Failed to acquire write lock")
            .clear();
    }

    pub(crate) fn count(&self, matches: impl Fn(&E) -> bool) -> usize {
        self.all().iter().filter(|event| matches(event)).count()
    }

    /// One `Debug` line per captured event, for snapshots.
    pub(crate) fn render(&self) -> String {
        self.all()
            .iter()
            .map(|event| format!("{event:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Records the events of one document proxy.
pub(crate) fn record_document(proxy: &docsession::DocumentProxy) -> EventRecorder<DocumentEvent> {
    let recorder = EventRecorder::new();
    let sink = recorder.clone();
    proxy.subscribe(move |event| sink.push(event.clone()));
    recorder
}
