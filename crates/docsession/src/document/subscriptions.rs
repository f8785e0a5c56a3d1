//! Per-kind native event tables and their all-or-nothing binding.

use docsession_core::lifecycle::ReleaseFailure;
use docsession_core::{
    DocumentKind, NativeDocument, NativeEventKind, NativeEventSink, Result, SessionError,
};
use std::sync::Arc;

/// Events every concrete document kind binds.
const COMMON_EVENTS: &[NativeEventKind] = &[
    NativeEventKind::ItemAdded,
    NativeEventKind::ItemDeleted,
    NativeEventKind::ItemDeleting,
    NativeEventKind::DeleteSelectionPre,
    NativeEventKind::DestroyPre,
    NativeEventKind::FileSavePre,
    NativeEventKind::FileSavePost,
    NativeEventKind::FileSavePostCancel,
    NativeEventKind::FileSaveAsPre,
    NativeEventKind::Modified,
    NativeEventKind::Rebuilt,
    NativeEventKind::ActiveConfigurationChanged,
    NativeEventKind::SelectionChanged,
    NativeEventKind::SelectionCleared,
];

const FILE_DROP_EVENTS: &[NativeEventKind] =
    &[NativeEventKind::FileDropPre, NativeEventKind::FileDropPost];

const SHEET_EVENTS: &[NativeEventKind] = &[
    NativeEventKind::SheetActivating,
    NativeEventKind::SheetActivated,
];

/// Returns the full binding table for `kind`.
///
/// # Examples
///
/// ```
/// use docsession::document::event_table;
/// use docsession_core::{DocumentKind, NativeEventKind};
///
/// assert!(event_table(DocumentKind::Drawing).contains(&NativeEventKind::SheetActivated));
/// assert!(!event_table(DocumentKind::Part).contains(&NativeEventKind::SheetActivated));
/// assert!(event_table(DocumentKind::Unknown).is_empty());
/// ```
pub fn event_table(kind: DocumentKind) -> Vec<NativeEventKind> {
    let extra = match kind {
        DocumentKind::Part | DocumentKind::Assembly => FILE_DROP_EVENTS,
        DocumentKind::Drawing => SHEET_EVENTS,
        DocumentKind::Unknown => return Vec::new(),
    };
    COMMON_EVENTS.iter().chain(extra).copied().collect()
}

/// The native events currently bound for one document.
///
/// Either the whole table of a kind is bound or nothing is.
#[derive(Debug, Default)]
pub struct EventSubscriptionSet {
    kind: Option<DocumentKind>,
    bound: Vec<NativeEventKind>,
}

impl EventSubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the table of `kind` to `sink`.
    ///
    /// Any previous binding is removed first. If one hook fails, the events
    /// bound so far are unbound again and the set is left empty.
    pub fn hook_all(
        &mut self,
        native: &dyn NativeDocument,
        kind: DocumentKind,
        sink: &Arc<dyn NativeEventSink>,
    ) -> Result<Vec<ReleaseFailure>> {
        let mut failures = self.unhook_all(native);

        for event in event_table(kind) {
            if let Err(source) = native.hook(event, Arc::clone(sink)) {
                tracing::warn!(
                    "binding {} on {} document failed, rolling back {} bindings",
                    event,
                    kind,
                    self.bound.len()
                );
                failures.extend(self.unhook_all(native));
                for failure in failures {
                    tracing::warn!("{}", failure);
                }
                return Err(SessionError::host("hook", source));
            }
            self.bound.push(event);
        }

        self.kind = Some(kind);
        tracing::trace!("bound {} events for {} document", self.bound.len(), kind);
        Ok(failures)
    }

    /// Unbinds everything in reverse binding order.
    ///
    /// Invalid handles are absorbed; other failures are returned and do not
    /// stop the remaining unbinds.
    pub fn unhook_all(&mut self, native: &dyn NativeDocument) -> Vec<ReleaseFailure> {
        let mut failures = Vec::new();
        while let Some(event) = self.bound.pop() {
            match native.unhook(event) {
                Ok(()) => {}
                Err(error) if error.is_invalid_handle() => {}
                Err(error) => failures.push(ReleaseFailure {
                    resource: event.as_str(),
                    error,
                }),
            }
        }
        self.kind = None;
        failures
    }

    /// Kind whose table is bound, if any.
    pub fn kind(&self) -> Option<DocumentKind> {
        self.kind
    }

    pub fn bound(&self) -> &[NativeEventKind] {
        &self.bound
    }

    pub fn is_hooked(&self) -> bool {
        !self.bound.is_empty()
    }
}
