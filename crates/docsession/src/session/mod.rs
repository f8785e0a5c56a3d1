//! The application session.
//!
//! [`ApplicationSession`] is the single source of truth for which document
//! the host considers active. It turns the host's incomplete notification
//! stream into a consistent one:
//!
//! - handles swapped after a first save are picked up by a resync on the next
//!   idle notification;
//! - the missing "last document closed" notification is recovered by a
//!   delayed check of the host's open document count;
//! - view-only documents, which the host opens silently, get a synthetic
//!   open notification the first time they become active.
//!
//! Host-facing entry points live in `notify`; they never fail and always
//! return [`HostStatus::OK`](docsession_core::HostStatus::OK).

mod events;
mod notify;

pub use events::SessionEvent;

use crate::config::SessionConfig;
use crate::diagnostics::ErrorSink;
use crate::document::{DocumentOwner, DocumentProxy};
use crate::scheduler::{DeferredRefreshScheduler, TaskPurpose};
use crate::view_only::ViewOnlyDedupTracker;
use docsession_core::{
    DocumentKind, EventBus, HostApplication, NativeDocument, OpenOptions, Result, SessionError,
    SubscriptionId,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;

#[derive(Debug, Default)]
struct SessionState {
    active: Option<DocumentProxy>,
    /// Set once by shutdown; forbids any further reload or rehook.
    disposing: bool,
}

struct SessionInner {
    me: Weak<SessionInner>,
    host: Arc<dyn HostApplication>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    events: EventBus<SessionEvent>,
    scheduler: DeferredRefreshScheduler,
    view_only: ViewOnlyDedupTracker,
    errors: ErrorSink,
}

/// Session over one host application.
///
/// Cloning is cheap; clones share the session. The session shuts down when
/// [`shutdown`](Self::shutdown) is called or the last clone is dropped.
///
/// # Examples
///
/// ```
/// use docsession::config::SessionConfig;
/// use docsession::session::{ApplicationSession, SessionEvent};
/// use docsession_core::DocumentKind;
/// use docsession_core::testing::FakeHost;
/// use std::sync::{Arc, Mutex};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let host = FakeHost::new();
/// let session = ApplicationSession::new(
///     host.clone(),
///     SessionConfig::default(),
///     tokio::runtime::Handle::current(),
/// );
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let store = Arc::clone(&seen);
/// session.subscribe(move |event| store.lock().unwrap().push(event.clone()));
///
/// host.add_document(DocumentKind::Part, Some("C:/parts/bracket.sldprt"));
/// session.notify_file_opened("C:/parts/bracket.sldprt");
///
/// let active = session.active_document().unwrap();
/// assert_eq!(active.path().as_deref(), Some("C:/parts/bracket.sldprt"));
/// assert_eq!(
///     *seen.lock().unwrap(),
///     vec![SessionEvent::DocumentOpened { path: "C:/parts/bracket.sldprt".into() }]
/// );
/// # }
/// ```
#[derive(Clone)]
pub struct ApplicationSession {
    inner: Arc<SessionInner>,
}

impl ApplicationSession {
    /// Creates a session. Delayed checks run on `runtime`.
    pub fn new(host: Arc<dyn HostApplication>, config: SessionConfig, runtime: Handle) -> Self {
        let inner = Arc::new_cyclic(|me| SessionInner {
            me: me.clone(),
            host,
            config,
            state: Mutex::new(SessionState::default()),
            events: EventBus::new(),
            scheduler: DeferredRefreshScheduler::new(runtime),
            view_only: ViewOnlyDedupTracker::new(),
            errors: ErrorSink::new(),
        });
        tracing::debug!("application session created");
        Self { inner }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The proxy of the document the session considers active.
    pub fn active_document(&self) -> Option<DocumentProxy> {
        self.inner.active_document()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Channel for failures caught in host callbacks.
    pub fn errors(&self) -> &ErrorSink {
        &self.inner.errors
    }

    pub fn view_only_tracker(&self) -> &ViewOnlyDedupTracker {
        &self.inner.view_only
    }

    pub fn is_disposing(&self) -> bool {
        self.inner.is_disposing()
    }

    pub fn has_pending_task(&self, purpose: TaskPurpose) -> bool {
        self.inner.scheduler.has_pending(purpose)
    }

    /// Asks the host to open `path` and returns its proxy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Creation`] if the host produced no document or
    /// the session is shutting down.
    pub fn open_document(&self, path: &str, options: OpenOptions) -> Result<DocumentProxy> {
        self.inner.ensure_running()?;
        let native = self
            .inner
            .host
            .open_document(path, options)
            .map_err(|e| SessionError::host("open_document", e))?
            .ok_or_else(|| SessionError::Creation(format!("host did not open {}", path)))?;
        tracing::info!("opened {}", path);
        self.inner.adopt(native)
    }

    /// Asks the host for a new document of `kind` and returns its proxy.
    pub fn new_document(&self, kind: DocumentKind) -> Result<DocumentProxy> {
        self.inner.ensure_running()?;
        let native = self
            .inner
            .host
            .new_document(kind)
            .map_err(|e| SessionError::host("new_document", e))?
            .ok_or_else(|| {
                SessionError::Creation(format!("host did not create a {} document", kind))
            })?;
        tracing::info!("created {} document {}", kind, native.handle());
        self.inner.adopt(native)
    }

    /// Asks the host to close the document behind `document`.
    ///
    /// The host announces the destruction to the document itself; the session
    /// reacts to that announcement, not to this call.
    pub fn close_document(&self, document: &DocumentProxy) -> Result<()> {
        tracing::info!("closing document {}", document.handle());
        self.inner
            .host
            .close_document(document.handle())
            .map_err(|e| SessionError::host("close_document", e))
    }

    /// Disposes the active document, cancels deferred work and drops all
    /// listeners. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for ApplicationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("ApplicationSession")
            .field("active", &state.active)
            .field("disposing", &state.disposing)
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner(&self) -> Weak<dyn DocumentOwner> {
        self.me.clone()
    }

    fn active_document(&self) -> Option<DocumentProxy> {
        self.lock_state().active.clone()
    }

    fn active_path(&self) -> Option<String> {
        self.active_document().and_then(|proxy| proxy.path())
    }

    fn is_disposing(&self) -> bool {
        self.lock_state().disposing
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_disposing() {
            return Err(SessionError::Creation("session is shutting down".into()));
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let report = self.events.emit(&event);
        if !report.is_clean() {
            self.errors
                .report_listener_panics("session_event", event.name(), report.panics);
        }
    }

    /// Makes the session's active proxy match the host's active document.
    ///
    /// A different handle replaces the proxy, the same handle is reloaded in
    /// place when `reload_existing` is set, and no host document clears it.
    /// Proxies are attached under the session lock; the replaced proxy is
    /// disposed and the reload runs after the lock is released.
    fn sync_active_document(&self, reload_existing: bool) -> Result<()> {
        let native = self
            .host
            .active_document()
            .map_err(|e| SessionError::host("active_document", e))?;

        let mut retired = None;
        let mut reload = None;
        let attached = {
            let mut state = self.lock_state();
            if state.disposing {
                tracing::debug!("session disposing, skipping resync");
                return Ok(());
            }
            match native {
                None => {
                    retired = state.active.take();
                    Ok(())
                }
                Some(native) => {
                    let same_handle = state
                        .active
                        .as_ref()
                        .is_some_and(|proxy| proxy.handle() == native.handle());
                    if same_handle {
                        if reload_existing {
                            reload = state.active.clone();
                        }
                        Ok(())
                    } else {
                        retired = state.active.take();
                        DocumentProxy::attach(
                            native,
                            self.owner(),
                            self.errors.clone(),
                            self.config.save_deferral,
                        )
                        .map(|proxy| {
                            tracing::debug!(
                                "active document is now {} ({})",
                                proxy.handle(),
                                proxy.kind()
                            );
                            state.active = Some(proxy);
                        })
                    }
                }
            }
        };

        if let Some(old) = retired {
            old.dispose();
        }
        attached?;
        if let Some(proxy) = reload {
            proxy.reload_data()?;
        }
        Ok(())
    }

    /// Resynchronises and returns a proxy for `native`.
    fn adopt(&self, native: Arc<dyn NativeDocument>) -> Result<DocumentProxy> {
        let handle = native.handle();
        self.sync_active_document(true)?;
        if let Some(active) = self.active_document()
            && active.handle() == handle
        {
            return Ok(active);
        }
        tracing::debug!("document {} opened in the background", handle);
        DocumentProxy::attach(
            native,
            self.owner(),
            self.errors.clone(),
            self.config.save_deferral,
        )
    }

    fn shutdown(&self) {
        let active = {
            let mut state = self.lock_state();
            if state.disposing {
                return;
            }
            state.disposing = true;
            state.active.take()
        };
        self.scheduler.cancel_all();
        if let Some(proxy) = active {
            proxy.dispose();
        }
        self.events.clear();
        self.view_only.clear();
        tracing::info!("application session shut down");
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
