//! Scripted in-memory host for tests and benchmarks.
//!
//! [`FakeHost`] keeps a list of open [`FakeDocument`]s and an active one.
//! Nothing happens on its own: tests move the host into a state and then call
//! the session notification that the real host would have sent. Every call
//! made into a document is appended to its journal so tests can assert on
//! ordering.
//!
//! Saving an unsaved document through the fake swaps it for a fresh handle
//! with the new path and invalidates the old one, the way the real host does.

use crate::error::{HostError, HostResult};
use crate::host::{
    DocumentKind, HandleId, HostApplication, HostStatus, NativeDocument, NativeObject,
    OpenOptions, ResourceKind, SaveCodes, SaveOptions,
};
use crate::native_event::{NativeEvent, NativeEventKind, NativeEventSink};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call made into a [`FakeDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Query(&'static str),
    Hook(NativeEventKind),
    Unhook(NativeEventKind),
    Acquire(ResourceKind),
    Release(ResourceKind),
    Save,
    SaveAs(String),
}

type Probe = Arc<dyn Fn(&FakeDocument) + Send + Sync>;

/// A scripted native document.
pub struct FakeDocument {
    handle: HandleId,
    host: Weak<FakeHost>,
    kind: Mutex<DocumentKind>,
    path: Mutex<Option<String>>,
    title: Mutex<String>,
    view_only: AtomicBool,
    valid: AtomicBool,
    announce_api_saves: AtomicBool,
    configuration: Mutex<Option<String>>,
    hooks: Mutex<BTreeMap<NativeEventKind, Arc<dyn NativeEventSink>>>,
    journal: Mutex<Vec<HostCall>>,
    save_codes: Mutex<SaveCodes>,
    pending_save_path: Mutex<Option<String>>,
    fail_hook: Mutex<Option<NativeEventKind>>,
    fail_acquire: Mutex<Option<ResourceKind>>,
    probe: Mutex<Option<Probe>>,
}

impl FakeDocument {
    fn new(handle: HandleId, host: Weak<FakeHost>, kind: DocumentKind, path: Option<&str>) -> Self {
        let title = path
            .and_then(|p| p.rsplit(['/', '\\']).next())
            .map_or_else(|| format!("Untitled{}", handle), str::to_string);
        Self {
            handle,
            host,
            kind: Mutex::new(kind),
            path: Mutex::new(path.map(str::to_string)),
            title: Mutex::new(title),
            view_only: AtomicBool::new(false),
            valid: AtomicBool::new(true),
            announce_api_saves: AtomicBool::new(false),
            configuration: Mutex::new(Some("Default".to_string())),
            hooks: Mutex::new(BTreeMap::new()),
            journal: Mutex::new(Vec::new()),
            save_codes: Mutex::new(SaveCodes::ok()),
            pending_save_path: Mutex::new(None),
            fail_hook: Mutex::new(None),
            fail_acquire: Mutex::new(None),
            probe: Mutex::new(None),
        }
    }

    pub fn set_kind(&self, kind: DocumentKind) {
        *lock(&self.kind) = kind;
    }

    pub fn set_path(&self, path: Option<&str>) {
        *lock(&self.path) = path.map(str::to_string);
    }

    pub fn set_view_only(&self, view_only: bool) {
        self.view_only.store(view_only, Ordering::SeqCst);
    }

    pub fn set_configuration(&self, name: Option<&str>) {
        *lock(&self.configuration) = name.map(str::to_string);
    }

    /// Codes returned by the next saves.
    pub fn set_save_codes(&self, codes: SaveCodes) {
        *lock(&self.save_codes) = codes;
    }

    /// Path the host "chooses" when a plain save hits an unsaved document.
    pub fn set_pending_save_path(&self, path: &str) {
        *lock(&self.pending_save_path) = Some(path.to_string());
    }

    /// Makes `save` and `save_as` raise `FileSavePost` from inside the call,
    /// the way the real host does.
    pub fn announce_api_saves(&self, announce: bool) {
        self.announce_api_saves.store(announce, Ordering::SeqCst);
    }

    /// Saves the way the user does from the host's own UI: no API call, only
    /// the native notifications. `save_as` picks a new path.
    pub fn save_from_ui(&self, save_as: Option<&str>) -> HostResult<()> {
        self.check_valid()?;
        let target = save_as
            .map(str::to_string)
            .or_else(|| lock(&self.path).clone())
            .or_else(|| lock(&self.pending_save_path).take())
            .ok_or_else(|| HostError::Failed("no save target".into()))?;
        match save_as {
            Some(path) => self.fire(NativeEvent::FileSaveAsPre {
                path: path.to_string(),
            }),
            None => self.fire(NativeEvent::FileSavePre {
                path: target.clone(),
            }),
        };
        self.commit_save(&target, true);
        Ok(())
    }

    /// Makes hooking `event` fail.
    pub fn fail_hook_on(&self, event: Option<NativeEventKind>) {
        *lock(&self.fail_hook) = event;
    }

    pub fn fail_acquire_on(&self, resource: Option<ResourceKind>) {
        *lock(&self.fail_acquire) = resource;
    }

    /// Installs a callback run on every state query, between the caller's
    /// unhook and hook phases during a reload.
    pub fn set_probe<F>(&self, probe: F)
    where
        F: Fn(&FakeDocument) + Send + Sync + 'static,
    {
        *lock(&self.probe) = Some(Arc::new(probe));
    }

    /// Every later call fails with [`HostError::InvalidHandle`].
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Bound events in a stable order.
    pub fn hooked(&self) -> Vec<NativeEventKind> {
        lock(&self.hooks).keys().copied().collect()
    }

    pub fn journal(&self) -> Vec<HostCall> {
        lock(&self.journal).clone()
    }

    pub fn clear_journal(&self) {
        lock(&self.journal).clear();
    }

    /// Number of journaled calls matching `matches`.
    pub fn count_calls(&self, matches: impl Fn(&HostCall) -> bool) -> usize {
        lock(&self.journal).iter().filter(|call| matches(call)).count()
    }

    /// Delivers `event` to its bound sink, if any.
    ///
    /// Returns `None` when nothing is bound for the event.
    pub fn fire(&self, event: NativeEvent) -> Option<HostStatus> {
        let sink = lock(&self.hooks).get(&event.kind()).cloned()?;
        Some(sink.on_native_event(&event))
    }

    fn record(&self, call: HostCall) {
        lock(&self.journal).push(call);
    }

    fn check_valid(&self) -> HostResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(HostError::InvalidHandle)
        }
    }

    fn query(&self, name: &'static str) -> HostResult<()> {
        self.check_valid()?;
        self.record(HostCall::Query(name));
        let probe = lock(&self.probe).clone();
        if let Some(probe) = probe {
            probe(self);
        }
        Ok(())
    }

    fn finish_save(&self, target: Option<String>, copy: bool) -> HostResult<SaveCodes> {
        let codes = *lock(&self.save_codes);
        if !codes.accepted || codes.errors != 0 || copy {
            return Ok(codes);
        }
        if let Some(target) = target {
            self.commit_save(&target, self.announce_api_saves.load(Ordering::SeqCst));
        }
        Ok(codes)
    }

    /// A first save announces on the old handle, then swaps it; later saves
    /// update the path first.
    fn commit_save(&self, target: &str, announce: bool) {
        let post = || {
            if announce {
                self.fire(NativeEvent::FileSavePost {
                    path: target.to_string(),
                });
            }
        };
        let was_unsaved = lock(&self.path).is_none();
        if was_unsaved {
            post();
            if let Some(host) = self.host.upgrade() {
                host.replace_after_first_save(self, target);
            }
        } else {
            self.set_path(Some(target));
            post();
        }
    }
}

impl NativeDocument for FakeDocument {
    fn handle(&self) -> HandleId {
        self.handle
    }

    fn kind(&self) -> HostResult<DocumentKind> {
        self.query("kind")?;
        Ok(*lock(&self.kind))
    }

    fn path(&self) -> HostResult<Option<String>> {
        self.query("path")?;
        Ok(lock(&self.path).clone())
    }

    fn title(&self) -> HostResult<String> {
        self.query("title")?;
        Ok(lock(&self.title).clone())
    }

    fn is_view_only(&self) -> HostResult<bool> {
        self.check_valid()?;
        Ok(self.view_only.load(Ordering::SeqCst))
    }

    fn active_configuration(&self) -> HostResult<Option<String>> {
        self.query("active_configuration")?;
        Ok(lock(&self.configuration).clone())
    }

    fn acquire(&self, resource: ResourceKind) -> HostResult<Arc<dyn NativeObject>> {
        self.check_valid()?;
        if *lock(&self.fail_acquire) == Some(resource) {
            return Err(HostError::Failed(format!("{} unavailable", resource.as_str())));
        }
        self.record(HostCall::Acquire(resource));
        let owner = self
            .host
            .upgrade()
            .and_then(|host| host.document(self.handle))
            .map(|doc| Arc::downgrade(&doc))
            .unwrap_or_default();
        Ok(Arc::new(FakeObject {
            kind: resource,
            owner,
        }))
    }

    fn hook(&self, event: NativeEventKind, sink: Arc<dyn NativeEventSink>) -> HostResult<()> {
        self.check_valid()?;
        if *lock(&self.fail_hook) == Some(event) {
            return Err(HostError::Failed(format!("cannot bind {}", event)));
        }
        self.record(HostCall::Hook(event));
        lock(&self.hooks).insert(event, sink);
        Ok(())
    }

    fn unhook(&self, event: NativeEventKind) -> HostResult<()> {
        self.check_valid()?;
        self.record(HostCall::Unhook(event));
        lock(&self.hooks).remove(&event);
        Ok(())
    }

    fn save(&self, options: SaveOptions) -> HostResult<SaveCodes> {
        self.check_valid()?;
        self.record(HostCall::Save);
        let target = lock(&self.path)
            .clone()
            .or_else(|| lock(&self.pending_save_path).take());
        self.finish_save(target, options.copy)
    }

    fn save_as(&self, path: &str, options: SaveOptions) -> HostResult<SaveCodes> {
        self.check_valid()?;
        self.record(HostCall::SaveAs(path.to_string()));
        self.finish_save(Some(path.to_string()), options.copy)
    }
}

/// Native sub-object handed out by [`FakeDocument::acquire`].
struct FakeObject {
    kind: ResourceKind,
    owner: Weak<FakeDocument>,
}

impl NativeObject for FakeObject {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn release(&self) -> HostResult<()> {
        let Some(owner) = self.owner.upgrade() else {
            return Err(HostError::InvalidHandle);
        };
        owner.check_valid()?;
        owner.record(HostCall::Release(self.kind));
        Ok(())
    }
}

#[derive(Default)]
struct FakeHostState {
    documents: Vec<Arc<FakeDocument>>,
    active: Option<HandleId>,
    fail_active_query: bool,
    refuse_open: bool,
}

/// A scripted host application.
///
/// # Examples
///
/// Requires the `test-util` feature.
///
/// ```
/// use docsession_core::host::{DocumentKind, HostApplication, NativeDocument};
/// use docsession_core::testing::FakeHost;
///
/// let host = FakeHost::new();
/// let doc = host.add_document(DocumentKind::Part, Some("C:/parts/bracket.sldprt"));
///
/// let active = host.active_document().unwrap().unwrap();
/// assert_eq!(active.handle(), doc.handle());
/// assert_eq!(host.open_document_count().unwrap(), 1);
/// ```
pub struct FakeHost {
    me: Weak<FakeHost>,
    next_handle: AtomicU64,
    state: Mutex<FakeHostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            next_handle: AtomicU64::new(1),
            state: Mutex::new(FakeHostState::default()),
        })
    }

    fn spawn_document(&self, kind: DocumentKind, path: Option<&str>) -> Arc<FakeDocument> {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeDocument::new(handle, self.me.clone(), kind, path))
    }

    /// Opens a document and makes it active.
    pub fn add_document(&self, kind: DocumentKind, path: Option<&str>) -> Arc<FakeDocument> {
        let doc = self.spawn_document(kind, path);
        let mut state = lock(&self.state);
        state.documents.push(Arc::clone(&doc));
        state.active = Some(doc.handle);
        doc
    }

    /// Opens a document without changing the active one.
    pub fn add_background_document(
        &self,
        kind: DocumentKind,
        path: Option<&str>,
    ) -> Arc<FakeDocument> {
        let doc = self.spawn_document(kind, path);
        lock(&self.state).documents.push(Arc::clone(&doc));
        doc
    }

    pub fn activate(&self, handle: HandleId) {
        let mut state = lock(&self.state);
        if state.documents.iter().any(|doc| doc.handle == handle) {
            state.active = Some(handle);
        }
    }

    /// Removes a document without any notification, the way the host does.
    pub fn remove_document(&self, handle: HandleId) -> Option<Arc<FakeDocument>> {
        let mut state = lock(&self.state);
        let index = state.documents.iter().position(|doc| doc.handle == handle)?;
        let doc = state.documents.remove(index);
        if state.active == Some(handle) {
            state.active = None;
        }
        doc.invalidate();
        Some(doc)
    }

    pub fn document(&self, handle: HandleId) -> Option<Arc<FakeDocument>> {
        lock(&self.state)
            .documents
            .iter()
            .find(|doc| doc.handle == handle)
            .cloned()
    }

    pub fn active(&self) -> Option<Arc<FakeDocument>> {
        let state = lock(&self.state);
        let handle = state.active?;
        state.documents.iter().find(|doc| doc.handle == handle).cloned()
    }

    pub fn fail_active_query(&self, fail: bool) {
        lock(&self.state).fail_active_query = fail;
    }

    /// Makes `open_document` and `new_document` report no document.
    pub fn refuse_open(&self, refuse: bool) {
        lock(&self.state).refuse_open = refuse;
    }

    fn replace_after_first_save(&self, old: &FakeDocument, path: &str) {
        let kind = *lock(&old.kind);
        let replacement = self.spawn_document(kind, Some(path));
        let mut state = lock(&self.state);
        if let Some(slot) = state.documents.iter_mut().find(|doc| doc.handle == old.handle) {
            *slot = Arc::clone(&replacement);
        }
        if state.active == Some(old.handle) {
            state.active = Some(replacement.handle);
        }
        old.invalidate();
    }
}

impl HostApplication for FakeHost {
    fn active_document(&self) -> HostResult<Option<Arc<dyn NativeDocument>>> {
        if lock(&self.state).fail_active_query {
            return Err(HostError::Failed("active document unavailable".into()));
        }
        Ok(self.active().map(|doc| doc as Arc<dyn NativeDocument>))
    }

    fn open_document_count(&self) -> HostResult<usize> {
        Ok(lock(&self.state).documents.len())
    }

    fn open_document(
        &self,
        path: &str,
        options: OpenOptions,
    ) -> HostResult<Option<Arc<dyn NativeDocument>>> {
        if lock(&self.state).refuse_open {
            return Ok(None);
        }
        let kind = kind_from_path(path);
        let doc = self.add_document(kind, Some(path));
        doc.set_view_only(options.view_only);
        Ok(Some(doc as Arc<dyn NativeDocument>))
    }

    fn new_document(&self, kind: DocumentKind) -> HostResult<Option<Arc<dyn NativeDocument>>> {
        if lock(&self.state).refuse_open {
            return Ok(None);
        }
        Ok(Some(self.add_document(kind, None) as Arc<dyn NativeDocument>))
    }

    fn close_document(&self, handle: HandleId) -> HostResult<()> {
        let doc = self.document(handle).ok_or(HostError::InvalidHandle)?;
        // The real host announces destruction to the document first.
        doc.fire(NativeEvent::DestroyPre);
        self.remove_document(handle);
        Ok(())
    }
}

fn kind_from_path(path: &str) -> DocumentKind {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".sldprt") {
        DocumentKind::Part
    } else if lower.ends_with(".sldasm") {
        DocumentKind::Assembly
    } else if lower.ends_with(".slddrw") {
        DocumentKind::Drawing
    } else {
        DocumentKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink(AtomicU64);

    impl NativeEventSink for CountingSink {
        fn on_native_event(&self, _event: &NativeEvent) -> HostStatus {
            self.0.fetch_add(1, Ordering::SeqCst);
            HostStatus::OK
        }
    }

    #[test]
    fn test_first_save_swaps_handle() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, None);
        doc.set_pending_save_path("C:/parts/new.sldprt");

        let codes = doc.save(SaveOptions::default()).unwrap();
        assert!(codes.accepted);
        assert!(!doc.is_valid());

        let active = host.active().unwrap();
        assert_ne!(active.handle(), doc.handle());
        assert_eq!(active.path().unwrap().as_deref(), Some("C:/parts/new.sldprt"));
        assert_eq!(host.open_document_count().unwrap(), 1);
    }

    #[test]
    fn test_save_as_persisted_keeps_handle() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Assembly, Some("C:/a.sldasm"));
        doc.save_as("C:/b.sldasm", SaveOptions::default()).unwrap();
        assert!(doc.is_valid());
        assert_eq!(doc.path().unwrap().as_deref(), Some("C:/b.sldasm"));
    }

    #[test]
    fn test_ui_save_announces_then_swaps_unsaved_document() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, None);
        doc.set_pending_save_path("C:/parts/ui.sldprt");
        let sink = Arc::new(CountingSink(AtomicU64::new(0)));
        doc.hook(NativeEventKind::FileSavePost, sink.clone()).unwrap();

        doc.save_from_ui(None).unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(!doc.is_valid());
        assert_eq!(
            host.active().unwrap().path().unwrap().as_deref(),
            Some("C:/parts/ui.sldprt")
        );
        assert!(!doc.journal().contains(&HostCall::Save));
    }

    #[test]
    fn test_api_saves_are_silent_unless_announced() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, Some("C:/p.sldprt"));
        let sink = Arc::new(CountingSink(AtomicU64::new(0)));
        doc.hook(NativeEventKind::FileSavePost, sink.clone()).unwrap();

        doc.save(SaveOptions::default()).unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);

        doc.announce_api_saves(true);
        doc.save_as("C:/q.sldprt", SaveOptions::default()).unwrap();
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(doc.is_valid());
    }

    #[test]
    fn test_fire_reaches_bound_sink_only() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, Some("C:/p.sldprt"));
        let sink = Arc::new(CountingSink(AtomicU64::new(0)));

        assert!(doc.fire(NativeEvent::Modified).is_none());
        doc.hook(NativeEventKind::Modified, sink.clone()).unwrap();
        assert_eq!(doc.fire(NativeEvent::Modified), Some(HostStatus::OK));
        doc.unhook(NativeEventKind::Modified).unwrap();
        assert!(doc.fire(NativeEvent::Modified).is_none());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidated_document_rejects_calls() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Drawing, Some("C:/d.slddrw"));
        host.remove_document(doc.handle());
        assert_eq!(doc.kind(), Err(HostError::InvalidHandle));
        assert_eq!(doc.unhook(NativeEventKind::Modified), Err(HostError::InvalidHandle));
        assert!(host.active_document().unwrap().is_none());
    }

    #[test]
    fn test_open_document_detects_kind() {
        let host = FakeHost::new();
        let doc = host
            .open_document("C:/x/Drawing1.SLDDRW", OpenOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(doc.kind().unwrap(), DocumentKind::Drawing);
        assert_eq!(doc.title().unwrap(), "Drawing1.SLDDRW");
    }

    #[test]
    fn test_released_resources_are_journaled() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, Some("C:/p.sldprt"));
        let object = doc.acquire(ResourceKind::Extension).unwrap();
        object.release().unwrap();
        assert_eq!(
            doc.journal(),
            vec![
                HostCall::Acquire(ResourceKind::Extension),
                HostCall::Release(ResourceKind::Extension)
            ]
        );
    }
}
