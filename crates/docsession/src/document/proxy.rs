//! Wrapper around one native document handle.

use super::events::DocumentEvent;
use super::resources::DocumentResources;
use super::save::SaveResult;
use super::subscriptions::EventSubscriptionSet;
use crate::config::{SaveDeferralConfig, SaveVariant};
use crate::diagnostics::ErrorSink;
use docsession_core::events::panic_message;
use docsession_core::lifecycle::{Dispose, ReleaseFailure};
use docsession_core::{
    DocumentKind, EventBus, HandleId, HostStatus, ItemType, LifecycleState, NativeDocument,
    NativeEvent, NativeEventKind, NativeEventSink, Result, SaveCodes, SaveOptions, SessionError,
    SubscriptionId,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

/// Receiver of the notifications a proxy forwards to whoever owns it.
///
/// Implemented by the application session; a proxy holds it weakly.
pub trait DocumentOwner: Send + Sync {
    /// The document was saved, through the proxy or from the host's own UI.
    ///
    /// `was_unsaved` is true when the proxy skipped its reload because the
    /// document had no path before the save and the host is about to replace
    /// the handle. Otherwise the proxy has already reloaded.
    fn document_saved(&self, handle: HandleId, was_unsaved: bool);

    /// The host announced it is about to destroy the document.
    fn document_about_to_be_destroyed(&self, handle: HandleId);
}

/// Owner of proxies created with [`DocumentProxy::detached`].
struct Detached;

impl DocumentOwner for Detached {
    fn document_saved(&self, _handle: HandleId, _was_unsaved: bool) {}

    fn document_about_to_be_destroyed(&self, _handle: HandleId) {}
}

/// Metadata cached by the last reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub kind: DocumentKind,
    /// `None` while the document was never saved.
    pub path: Option<String>,
    pub title: String,
    pub active_configuration: Option<String>,
}

impl DocumentInfo {
    fn read(native: &dyn NativeDocument) -> Result<Self> {
        let kind = native.kind().map_err(|e| SessionError::host("kind", e))?;
        let path = native
            .path()
            .map_err(|e| SessionError::host("path", e))?
            .filter(|path| !path.is_empty());
        let title = native.title().map_err(|e| SessionError::host("title", e))?;
        let active_configuration = native
            .active_configuration()
            .map_err(|e| SessionError::host("active_configuration", e))?;
        Ok(Self {
            kind,
            path,
            title,
            active_configuration,
        })
    }

    pub fn is_unsaved(&self) -> bool {
        self.path.is_none()
    }
}

#[derive(Debug, Default)]
struct ProxyState {
    lifecycle: LifecycleState,
    info: DocumentInfo,
    resources: DocumentResources,
    subscriptions: EventSubscriptionSet,
    /// A save started through the proxy is in progress; the proxy notifies
    /// its owner itself once the host call returns.
    saving: bool,
}

struct ProxyShared {
    me: Weak<ProxyShared>,
    handle: HandleId,
    /// Taken on dispose.
    native: Mutex<Option<Arc<dyn NativeDocument>>>,
    state: Mutex<ProxyState>,
    events: EventBus<DocumentEvent>,
    owner: Weak<dyn DocumentOwner>,
    errors: ErrorSink,
    save_deferral: SaveDeferralConfig,
}

/// Handle to a wrapped native document.
///
/// Cloning is cheap and every clone refers to the same document. Everything
/// acquired from the native handle, then the handle itself, is released when
/// the proxy is disposed, at the latest when the last clone is dropped.
///
/// # Examples
///
/// ```
/// use docsession::config::SaveDeferralConfig;
/// use docsession::diagnostics::ErrorSink;
/// use docsession::document::DocumentProxy;
/// use docsession_core::DocumentKind;
/// use docsession_core::testing::FakeHost;
///
/// let host = FakeHost::new();
/// let native = host.add_document(DocumentKind::Part, Some("C:/parts/bracket.sldprt"));
///
/// let proxy = DocumentProxy::detached(native, ErrorSink::new(), SaveDeferralConfig::default())
///     .unwrap();
/// assert_eq!(proxy.kind(), DocumentKind::Part);
/// assert_eq!(proxy.title(), "bracket.sldprt");
///
/// proxy.dispose();
/// assert!(proxy.is_disposed());
/// ```
#[derive(Clone)]
pub struct DocumentProxy {
    shared: Arc<ProxyShared>,
}

impl DocumentProxy {
    /// Wraps `native` and brings the proxy to the active state.
    ///
    /// Reads the metadata, acquires the kind's resources and binds its event
    /// table. On failure everything acquired is released again.
    pub fn attach(
        native: Arc<dyn NativeDocument>,
        owner: Weak<dyn DocumentOwner>,
        errors: ErrorSink,
        save_deferral: SaveDeferralConfig,
    ) -> Result<Self> {
        let handle = native.handle();
        let shared = Arc::new_cyclic(|me| ProxyShared {
            me: me.clone(),
            handle,
            native: Mutex::new(Some(native)),
            state: Mutex::new(ProxyState::default()),
            events: EventBus::new(),
            owner,
            errors,
            save_deferral,
        });
        let proxy = Self { shared };

        let mut failures = Vec::new();
        let loaded = {
            let mut state = proxy.shared.lock_state();
            let loaded = proxy.shared.reload_locked(&mut state, &mut failures);
            if loaded.is_ok() {
                state.lifecycle = LifecycleState::Active;
            }
            loaded
        };
        proxy
            .shared
            .errors
            .report_release_failures("attach", failures);

        match loaded {
            Ok(()) => {
                tracing::debug!("attached {} document {}", proxy.kind(), handle);
                Ok(proxy)
            }
            Err(error) => {
                proxy.dispose();
                if error.is_invalid_handle() {
                    Err(error)
                } else {
                    Err(SessionError::Creation(format!(
                        "cannot attach document {}: {}",
                        handle, error
                    )))
                }
            }
        }
    }

    /// Like [`attach`](Self::attach), with no owner to notify.
    pub fn detached(
        native: Arc<dyn NativeDocument>,
        errors: ErrorSink,
        save_deferral: SaveDeferralConfig,
    ) -> Result<Self> {
        let owner: Weak<dyn DocumentOwner> = Weak::<Detached>::new();
        Self::attach(native, owner, errors, save_deferral)
    }

    pub fn handle(&self) -> HandleId {
        self.shared.handle
    }

    /// The wrapped native document; `None` once disposed.
    pub fn native(&self) -> Option<Arc<dyn NativeDocument>> {
        self.shared.native()
    }

    pub fn info(&self) -> DocumentInfo {
        self.shared.lock_state().info.clone()
    }

    pub fn kind(&self) -> DocumentKind {
        self.shared.lock_state().info.kind
    }

    pub fn path(&self) -> Option<String> {
        self.shared.lock_state().info.path.clone()
    }

    pub fn title(&self) -> String {
        self.shared.lock_state().info.title.clone()
    }

    pub fn active_configuration(&self) -> Option<String> {
        self.shared.lock_state().info.active_configuration.clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.shared.lock_state().lifecycle
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == LifecycleState::Disposed
    }

    /// Native events currently bound, in binding order.
    pub fn hooked_events(&self) -> Vec<NativeEventKind> {
        self.shared.lock_state().subscriptions.bound().to_vec()
    }

    /// Held sub-resources, in acquisition order.
    pub fn resource_labels(&self) -> Vec<&'static str> {
        self.shared.lock_state().resources.labels()
    }

    /// Asks the host whether the document is open view-only.
    pub fn is_view_only(&self) -> Result<bool> {
        self.shared
            .live_native()?
            .is_view_only()
            .map_err(|e| SessionError::host("is_view_only", e))
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DocumentEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Returns true if both proxies wrap the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Rebuilds everything derived from the native handle.
    ///
    /// Runs in a fixed order: unbind the previous event table, release the
    /// previous resources, read kind and metadata, acquire resources, bind the
    /// table of the (possibly new) kind. Native events delivered meanwhile are
    /// dropped. Raises [`DocumentEvent::InformationChanged`] on success.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Disposed`] after [`dispose`](Self::dispose),
    /// or the host failure that interrupted the reload. An interrupted reload
    /// leaves the proxy with no bindings and no resources.
    pub fn reload_data(&self) -> Result<()> {
        self.shared.reload()
    }

    /// Saves the document to its current path.
    ///
    /// # Errors
    ///
    /// Fails only if the proxy is disposed or the host call itself failed;
    /// rejected saves are reported through [`SaveResult`].
    pub fn save(&self, options: SaveOptions) -> Result<SaveResult> {
        self.run_save(SaveVariant::Save, options, |native| native.save(options))
    }

    /// Saves the document under `path`.
    pub fn save_as(&self, path: &str, options: SaveOptions) -> Result<SaveResult> {
        self.run_save(SaveVariant::SaveAs, options, |native| {
            native.save_as(path, options)
        })
    }

    fn run_save<F>(&self, variant: SaveVariant, options: SaveOptions, call: F) -> Result<SaveResult>
    where
        F: FnOnce(&dyn NativeDocument) -> docsession_core::HostResult<SaveCodes>,
    {
        let shared = &self.shared;
        let was_unsaved = {
            let mut state = shared.lock_state();
            if state.lifecycle == LifecycleState::Disposed {
                return Err(SessionError::Disposed {
                    handle: shared.handle,
                });
            }
            state.saving = true;
            state.info.is_unsaved()
        };
        let in_progress = SaveInProgress(shared);
        let native = shared.live_native()?;

        // The host raises its pre/post save notifications from inside this call.
        let codes = call(native.as_ref());
        drop(in_progress);
        let codes = codes.map_err(|e| SessionError::host("save", e))?;
        let result = SaveResult::from(codes);
        if !result.succeeded {
            tracing::warn!(
                "save of document {} rejected (errors: {:#x}, warnings: {:#x})",
                shared.handle,
                result.errors,
                result.warnings
            );
            return Ok(result);
        }

        let defer = was_unsaved && !options.copy && shared.save_deferral.defers(variant);
        if defer {
            tracing::info!(
                "first save of document {}, resync deferred to idle",
                shared.handle
            );
        } else {
            shared.reload_after_save();
            tracing::info!("saved document {}", shared.handle);
        }

        if let Some(owner) = shared.owner.upgrade() {
            owner.document_saved(shared.handle, defer);
        }
        Ok(result)
    }

    /// Unbinds events, releases resources and drops all listeners.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }
}

impl std::fmt::Debug for DocumentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("DocumentProxy")
            .field("handle", &self.shared.handle)
            .field("kind", &state.info.kind)
            .field("path", &state.info.path)
            .field("lifecycle", &state.lifecycle)
            .finish()
    }
}

/// Clears [`ProxyState::saving`] when the host call returns or unwinds.
struct SaveInProgress<'a>(&'a ProxyShared);

impl Drop for SaveInProgress<'_> {
    fn drop(&mut self) {
        self.0.lock_state().saving = false;
    }
}

impl ProxyShared {
    fn lock_state(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn native(&self) -> Option<Arc<dyn NativeDocument>> {
        self.native
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn live_native(&self) -> Result<Arc<dyn NativeDocument>> {
        self.native()
            .ok_or(SessionError::Disposed { handle: self.handle })
    }

    fn reload(&self) -> Result<()> {
        let mut failures = Vec::new();
        let reloaded = {
            let mut state = self.lock_state();
            if state.lifecycle == LifecycleState::Disposed {
                return Err(SessionError::Disposed {
                    handle: self.handle,
                });
            }
            self.reload_locked(&mut state, &mut failures)
        };
        self.errors.report_release_failures("reload_data", failures);
        reloaded?;

        tracing::debug!("reloaded document {}", self.handle);
        self.emit(&DocumentEvent::InformationChanged);
        Ok(())
    }

    /// Reload after a save; a handle the host already swapped is not an error.
    fn reload_after_save(&self) {
        if let Err(error) = self.reload() {
            self.errors.report("save", &error);
        }
    }

    fn sink(&self) -> Arc<dyn NativeEventSink> {
        Arc::new(NativeEventAdapter {
            proxy: self.me.clone(),
        })
    }

    fn reload_locked(
        &self,
        state: &mut ProxyState,
        failures: &mut Vec<ReleaseFailure>,
    ) -> Result<()> {
        let native = self.live_native()?;
        let native = native.as_ref();

        failures.extend(state.subscriptions.unhook_all(native));
        failures.extend(state.resources.dispose());
        state.resources = DocumentResources::empty();

        let info = DocumentInfo::read(native)?;
        let kind = info.kind;
        state.info = info;
        state.resources = DocumentResources::acquire(native, kind)?;
        failures.extend(state.subscriptions.hook_all(native, kind, &self.sink())?);
        Ok(())
    }

    fn dispose(&self) {
        let (failures, native) = {
            let mut state = self.lock_state();
            if state.lifecycle == LifecycleState::Disposed {
                return;
            }
            let native = self
                .native
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let mut failures = native
                .as_deref()
                .map(|native| state.subscriptions.unhook_all(native))
                .unwrap_or_default();
            failures.extend(state.resources.dispose());
            state.lifecycle = LifecycleState::Disposed;
            (failures, native)
        };
        // Children first, then the document handle itself.
        drop(native);
        self.events.clear();
        self.errors.report_release_failures("dispose", failures);
        tracing::debug!("disposed document {}", self.handle);
    }

    fn emit(&self, event: &DocumentEvent) {
        let report = self.events.emit(event);
        if !report.is_clean() {
            self.errors
                .report_listener_panics("document_event", event.name(), report.panics);
        }
    }

    fn handle_native(&self, event: &NativeEvent) {
        let configuration = if matches!(event, NativeEvent::ActiveConfigurationChanged) {
            self.native().map(|native| native.active_configuration())
        } else {
            None
        };

        let mut host_save = None;
        let outbound = {
            let mut state = match self.state.try_lock() {
                Ok(state) => state,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    tracing::debug!(
                        "document {} busy, dropped {}",
                        self.handle,
                        event.kind()
                    );
                    return;
                }
            };
            if state.lifecycle != LifecycleState::Active {
                return;
            }
            if let Some(Ok(name)) = &configuration {
                state.info.active_configuration.clone_from(name);
            }
            if let NativeEvent::FileSavePost { path } = event {
                if !state.saving {
                    host_save = Some(state.info.is_unsaved());
                }
                if !path.is_empty() {
                    state.info.path = Some(path.clone());
                }
            }
            self.translate(&state, event)
        };

        if let Some(Err(error)) = configuration {
            self.errors.report(
                "active_configuration",
                &SessionError::host("active_configuration", error),
            );
        }
        self.emit(&outbound);

        if let Some(was_unsaved) = host_save {
            self.host_saved(was_unsaved);
        }
        if matches!(event, NativeEvent::DestroyPre)
            && let Some(owner) = self.owner.upgrade()
        {
            owner.document_about_to_be_destroyed(self.handle);
        }
    }

    /// A save the host ran on its own, from its UI or a macro.
    ///
    /// A first save always defers: the host replaces the handle once its
    /// save notifications are done.
    fn host_saved(&self, was_unsaved: bool) {
        if was_unsaved {
            tracing::info!(
                "host saved document {} for the first time, resync deferred to idle",
                self.handle
            );
        } else {
            self.reload_after_save();
            tracing::info!("host saved document {}", self.handle);
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.document_saved(self.handle, was_unsaved);
        }
    }

    fn translate(&self, state: &ProxyState, event: &NativeEvent) -> DocumentEvent {
        let is_drawing = state.info.kind == DocumentKind::Drawing;
        match event {
            NativeEvent::ItemAdded {
                item_type: ItemType::Sheet,
                name,
            } if is_drawing => DocumentEvent::SheetAdded { name: name.clone() },
            NativeEvent::ItemAdded { item_type, name } => DocumentEvent::ItemAdded {
                item_type: *item_type,
                name: name.clone(),
            },
            NativeEvent::ItemDeleted {
                item_type: ItemType::Sheet,
                name,
            } if is_drawing => DocumentEvent::SheetDeleted { name: name.clone() },
            NativeEvent::ItemDeleted { item_type, name } => DocumentEvent::ItemDeleted {
                item_type: *item_type,
                name: name.clone(),
            },
            NativeEvent::ItemDeleting { item_type, name } => DocumentEvent::ItemDeleting {
                item_type: *item_type,
                name: name.clone(),
            },
            NativeEvent::DeleteSelectionPre => DocumentEvent::DeletingSelection,
            NativeEvent::DestroyPre => {
                tracing::info!("document {} is closing", self.handle);
                DocumentEvent::Closing
            }
            NativeEvent::FileSavePre { path } => DocumentEvent::Saving { path: path.clone() },
            NativeEvent::FileSavePost { path } => DocumentEvent::Saved { path: path.clone() },
            NativeEvent::FileSavePostCancel => DocumentEvent::SaveCanceled,
            NativeEvent::FileSaveAsPre { path } => DocumentEvent::SavingAs { path: path.clone() },
            NativeEvent::FileDropPre { path } => DocumentEvent::FileDropping { path: path.clone() },
            NativeEvent::FileDropPost { path } => DocumentEvent::FileDropped { path: path.clone() },
            NativeEvent::Modified => DocumentEvent::Modified,
            NativeEvent::Rebuilt => DocumentEvent::Rebuilt,
            NativeEvent::ActiveConfigurationChanged => DocumentEvent::ActiveConfigurationChanged {
                name: state.info.active_configuration.clone(),
            },
            NativeEvent::SheetActivating { sheet } => DocumentEvent::ActiveSheetChanging {
                sheet: sheet.clone(),
            },
            NativeEvent::SheetActivated { sheet } => DocumentEvent::ActiveSheetChanged {
                sheet: sheet.clone(),
            },
            NativeEvent::SelectionChanged | NativeEvent::SelectionCleared => {
                DocumentEvent::SelectionChanged
            }
        }
    }
}

impl Drop for ProxyShared {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Sink bound on the native document; forwards to the proxy while it lives.
struct NativeEventAdapter {
    proxy: Weak<ProxyShared>,
}

impl NativeEventSink for NativeEventAdapter {
    fn on_native_event(&self, event: &NativeEvent) -> HostStatus {
        let Some(proxy) = self.proxy.upgrade() else {
            return HostStatus::OK;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| proxy.handle_native(event))) {
            proxy.errors.report(
                "native_event",
                &SessionError::Listener {
                    event: event.kind().to_string(),
                    message: panic_message(payload.as_ref()),
                },
            );
        }
        HostStatus::OK
    }
}
