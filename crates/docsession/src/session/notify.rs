//! Host-facing notifications.
//!
//! Every entry point here runs under [`SessionInner::guard`]: whatever fails
//! is reported to the error sink and the host gets the neutral status.

use super::{ApplicationSession, SessionEvent, SessionInner};
use crate::document::DocumentOwner;
use crate::scheduler::{TaskPurpose, TaskTicket};
use docsession_core::events::panic_message;
use docsession_core::{HandleId, HostError, HostStatus, SessionError};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// What a closing check found.
enum ClosingCheck {
    /// Superseded, shutting down, or a document is active again.
    Stale,
    AllClosed,
    /// Documents remain open but none was announced as active.
    Unannounced(usize),
    Failed(HostError),
}

impl ApplicationSession {
    /// The host's active document changed.
    pub fn notify_active_changed(&self) -> HostStatus {
        self.inner
            .guard("notify_active_changed", || self.inner.active_changed())
    }

    /// The host opened `path`. Not sent for view-only documents.
    pub fn notify_file_opened(&self, path: &str) -> HostStatus {
        self.inner
            .guard("notify_file_opened", || self.inner.file_opened(path))
    }

    /// The host created a new, unsaved document.
    pub fn notify_file_created(&self) -> HostStatus {
        self.inner
            .guard("notify_file_created", || self.inner.file_created())
    }

    /// The active document was saved.
    ///
    /// `was_unsaved_before` defers the resync to the next idle notification,
    /// when the host has replaced the document's handle. Otherwise the active
    /// document is reloaded right away.
    pub fn notify_saved(&self, was_unsaved_before: bool) -> HostStatus {
        self.inner.guard("notify_saved", || {
            self.inner.saved(was_unsaved_before, true);
        })
    }

    /// The document behind `handle` is about to be destroyed.
    ///
    /// Ignored unless `handle` is the active document.
    pub fn notify_document_about_to_be_destroyed(&self, handle: HandleId) -> HostStatus {
        self.inner.guard("notify_document_about_to_be_destroyed", || {
            self.inner.about_to_be_destroyed(handle);
        })
    }

    /// The host is idle. Runs deferred idle work, then raises
    /// [`SessionEvent::Idle`].
    pub fn notify_idle(&self) -> HostStatus {
        self.inner.guard("notify_idle", || self.inner.idle())
    }

    /// The host application is going away.
    pub fn notify_host_destroying(&self) -> HostStatus {
        self.inner.guard("notify_host_destroying", || {
            self.inner.emit(SessionEvent::SessionEnding);
            self.inner.shutdown();
        })
    }
}

impl DocumentOwner for SessionInner {
    fn document_saved(&self, handle: HandleId, was_unsaved: bool) {
        if !self.is_active(handle) {
            tracing::debug!("ignoring save of inactive document {}", handle);
            return;
        }
        // The proxy has reloaded itself unless the save was deferred.
        self.guard("notify_saved", || self.saved(was_unsaved, false));
    }

    fn document_about_to_be_destroyed(&self, handle: HandleId) {
        self.guard("notify_document_about_to_be_destroyed", || {
            self.about_to_be_destroyed(handle);
        });
    }
}

impl SessionInner {
    /// Runs `body`, turning a panic into an error report.
    pub(super) fn guard<F>(&self, context: &'static str, body: F) -> HostStatus
    where
        F: FnOnce(),
    {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(body)) {
            self.errors.report(
                context,
                &SessionError::Listener {
                    event: context.to_string(),
                    message: panic_message(payload.as_ref()),
                },
            );
        }
        HostStatus::OK
    }

    fn is_active(&self, handle: HandleId) -> bool {
        self.lock_state()
            .active
            .as_ref()
            .is_some_and(|proxy| proxy.handle() == handle)
    }

    fn rebuild(&self, context: &'static str, reload_existing: bool) {
        if let Err(error) = self.sync_active_document(reload_existing) {
            self.errors.report(context, &error);
        }
    }

    fn active_changed(&self) {
        if self.is_disposing() {
            return;
        }
        match self.sync_active_document(true) {
            Ok(()) => {
                if let Some(path) = self.claim_view_only_open() {
                    tracing::info!("view-only document activated: {}", path);
                    self.emit(SessionEvent::DocumentOpened { path });
                }
            }
            Err(error) => self.errors.report("notify_active_changed", &error),
        }
        self.emit(SessionEvent::InformationChanged);
    }

    /// Returns the path of the active proxy if it is view-only and has not
    /// been announced yet, marking it as announced.
    fn claim_view_only_open(&self) -> Option<String> {
        if !self.config.view_only.enabled {
            return None;
        }
        let proxy = self.active_document()?;
        match proxy.is_view_only() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(error) => {
                self.errors.report("notify_active_changed", &error);
                return None;
            }
        }
        let path = proxy.path()?;
        self.view_only.add(&path).then_some(path)
    }

    fn file_opened(&self, path: &str) {
        if self.is_disposing() {
            return;
        }
        self.rebuild("notify_file_opened", true);
        tracing::info!("document opened: {}", path);
        self.emit(SessionEvent::DocumentOpened {
            path: path.to_string(),
        });
    }

    fn file_created(&self) {
        if self.is_disposing() {
            return;
        }
        self.rebuild("notify_file_created", true);
        tracing::info!("document created");
        self.emit(SessionEvent::DocumentCreated);
        self.schedule_resync(false);
    }

    fn saved(&self, was_unsaved: bool, reload_existing: bool) {
        if self.is_disposing() {
            return;
        }
        if was_unsaved {
            self.schedule_resync(true);
            return;
        }
        self.rebuild("notify_saved", reload_existing);
        let path = self.active_path();
        tracing::info!("document saved: {:?}", path);
        self.emit(SessionEvent::DocumentSaved { path });
    }

    /// Schedules the resync that picks up a swapped handle on the next idle
    /// notification, superseding any pending one.
    fn schedule_resync(&self, announce_save: bool) {
        let session = self.me.clone();
        self.scheduler
            .schedule_on_idle(TaskPurpose::ResyncAfterFirstSave, move |ticket| {
                if let Some(inner) = session.upgrade() {
                    inner.guard("resync_after_first_save", || {
                        inner.run_resync(ticket, announce_save);
                    });
                }
            });
    }

    fn run_resync(&self, ticket: TaskTicket, announce_save: bool) {
        if self.is_disposing() || !self.scheduler.is_current(ticket) {
            tracing::debug!("resync {} is stale", ticket.generation);
            return;
        }
        self.rebuild("resync_after_first_save", true);
        if announce_save {
            let path = self.active_path();
            tracing::info!("first save completed: {:?}", path);
            self.emit(SessionEvent::DocumentSaved { path });
        }
        self.emit(SessionEvent::InformationChanged);
    }

    fn about_to_be_destroyed(&self, handle: HandleId) {
        let closing = {
            let state = self.lock_state();
            if state.disposing {
                return;
            }
            state
                .active
                .clone()
                .filter(|proxy| proxy.handle() == handle)
        };
        let Some(proxy) = closing else {
            tracing::debug!("ignoring destroy notification for inactive document {}", handle);
            return;
        };

        let path = proxy.path();
        tracing::info!("document closing: {:?}", path);
        self.emit(SessionEvent::DocumentClosing { path: path.clone() });
        if let Some(path) = &path {
            self.view_only.remove(path);
        }

        {
            let mut state = self.lock_state();
            if state
                .active
                .as_ref()
                .is_some_and(|active| active.ptr_eq(&proxy))
            {
                state.active = None;
            }
        }
        proxy.dispose();
        self.schedule_closing_check();
    }

    /// Schedules the delayed check that detects the last document closing.
    fn schedule_closing_check(&self) {
        let session = self.me.clone();
        self.scheduler.schedule_after(
            TaskPurpose::ClosingCheck,
            self.config.closing_check.delay(),
            move |ticket| {
                if let Some(inner) = session.upgrade() {
                    inner.guard("closing_check", || inner.run_closing_check(ticket));
                }
            },
        );
    }

    fn run_closing_check(&self, ticket: TaskTicket) {
        let outcome = {
            let state = self.lock_state();
            if state.disposing || !self.scheduler.is_current(ticket) || state.active.is_some() {
                ClosingCheck::Stale
            } else {
                match self.host.open_document_count() {
                    Ok(0) => ClosingCheck::AllClosed,
                    Ok(count) => ClosingCheck::Unannounced(count),
                    Err(error) => ClosingCheck::Failed(error),
                }
            }
        };

        match outcome {
            ClosingCheck::Stale => {
                tracing::debug!("closing check {} has nothing to do", ticket.generation);
            }
            ClosingCheck::AllClosed => {
                tracing::info!("last document closed");
                self.emit(SessionEvent::InformationChanged);
            }
            ClosingCheck::Unannounced(count) => {
                tracing::warn!(
                    "{} documents still open but none announced, resync on idle",
                    count
                );
                // Rehooking belongs on the host thread.
                self.schedule_resync(false);
            }
            ClosingCheck::Failed(error) => {
                self.errors.report(
                    "closing_check",
                    &SessionError::host("open_document_count", error),
                );
            }
        }
    }

    fn idle(&self) {
        let ran = self.scheduler.fire_idle();
        if ran > 0 {
            tracing::trace!("ran {} deferred idle tasks", ran);
        }
        self.emit(SessionEvent::Idle);
    }
}
