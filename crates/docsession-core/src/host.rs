//! Host application abstraction.
//!
//! The host owns the real document state. This module describes the narrow
//! surface the session layer needs from it: which document is active, how to
//! query a document, how to hold and release its native sub-objects, and how
//! to bind native event notifications.

use crate::error::HostResult;
use crate::native_event::{NativeEventKind, NativeEventSink};
use std::fmt;
use std::sync::Arc;

/// Opaque identity of a native document handle.
///
/// The host may silently swap the handle behind a document (for example after
/// the first save of a new document), so two handles with different ids are
/// two different documents as far as the session is concerned.
pub type HandleId = u64;

/// Concrete kind of a document.
///
/// Every rehook and reload site matches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentKind {
    Part,
    Assembly,
    Drawing,
    #[default]
    Unknown,
}

impl DocumentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::Assembly => "assembly",
            Self::Drawing => "drawing",
            Self::Unknown => "unknown",
        }
    }

    /// The kind-specific view object the host exposes, if any.
    pub const fn view_resource(self) -> Option<ResourceKind> {
        match self {
            Self::Part => Some(ResourceKind::PartView),
            Self::Assembly => Some(ResourceKind::AssemblyView),
            Self::Drawing => Some(ResourceKind::DrawingView),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status returned to the host from every callback.
///
/// The host treats anything but the neutral value as a reason to abort the
/// operation in progress, so callbacks always return [`HostStatus::OK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostStatus(i32);

impl HostStatus {
    pub const OK: Self = Self(0);

    pub const fn code(self) -> i32 {
        self.0
    }

    pub const fn is_neutral(self) -> bool {
        self.0 == 0
    }
}

/// Native sub-objects a document hands out and expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Extension,
    SelectionManager,
    PartView,
    AssemblyView,
    DrawingView,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::SelectionManager => "selection-manager",
            Self::PartView => "part-view",
            Self::AssemblyView => "assembly-view",
            Self::DrawingView => "drawing-view",
        }
    }
}

/// Options forwarded to the host's save calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Suppress host dialogs.
    pub silent: bool,
    /// Write a copy; the document keeps its current path.
    pub copy: bool,
}

/// Raw outcome of a host save call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveCodes {
    /// Whether the host reported the call itself as accepted.
    pub accepted: bool,
    pub errors: i32,
    pub warnings: i32,
}

impl SaveCodes {
    pub const fn ok() -> Self {
        Self {
            accepted: true,
            errors: 0,
            warnings: 0,
        }
    }
}

/// Options forwarded to the host's open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOptions {
    pub read_only: bool,
    pub view_only: bool,
    pub silent: bool,
}

/// A native object owned by a document wrapper (extension, selection manager,
/// per-kind view). Released exactly once through [`crate::lifecycle::NativeRef`].
pub trait NativeObject: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn release(&self) -> HostResult<()>;
}

impl fmt::Debug for dyn NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject").field("kind", &self.kind()).finish()
    }
}

/// One native document handle.
pub trait NativeDocument: Send + Sync {
    fn handle(&self) -> HandleId;

    fn kind(&self) -> HostResult<DocumentKind>;

    /// Path on disk; `None` or an empty string for unsaved documents.
    fn path(&self) -> HostResult<Option<String>>;

    fn title(&self) -> HostResult<String>;

    /// Whether the host opened the document in its restricted view-only mode.
    fn is_view_only(&self) -> HostResult<bool>;

    fn active_configuration(&self) -> HostResult<Option<String>>;

    fn acquire(&self, resource: ResourceKind) -> HostResult<Arc<dyn NativeObject>>;

    /// Binds one native event of this document to `sink`.
    fn hook(&self, event: NativeEventKind, sink: Arc<dyn NativeEventSink>) -> HostResult<()>;

    fn unhook(&self, event: NativeEventKind) -> HostResult<()>;

    fn save(&self, options: SaveOptions) -> HostResult<SaveCodes>;

    fn save_as(&self, path: &str, options: SaveOptions) -> HostResult<SaveCodes>;
}

/// The host application itself.
pub trait HostApplication: Send + Sync {
    /// The document the host currently considers focused.
    fn active_document(&self) -> HostResult<Option<Arc<dyn NativeDocument>>>;

    fn open_document_count(&self) -> HostResult<usize>;

    fn open_document(
        &self,
        path: &str,
        options: OpenOptions,
    ) -> HostResult<Option<Arc<dyn NativeDocument>>>;

    fn new_document(&self, kind: DocumentKind) -> HostResult<Option<Arc<dyn NativeDocument>>>;

    fn close_document(&self, handle: HandleId) -> HostResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_resource_per_kind() {
        assert_eq!(
            DocumentKind::Part.view_resource(),
            Some(ResourceKind::PartView)
        );
        assert_eq!(
            DocumentKind::Assembly.view_resource(),
            Some(ResourceKind::AssemblyView)
        );
        assert_eq!(
            DocumentKind::Drawing.view_resource(),
            Some(ResourceKind::DrawingView)
        );
        assert_eq!(DocumentKind::Unknown.view_resource(), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DocumentKind::Drawing.to_string(), "drawing");
        assert_eq!(DocumentKind::default(), DocumentKind::Unknown);
    }

    #[test]
    fn test_host_status_neutral() {
        assert!(HostStatus::OK.is_neutral());
        assert_eq!(HostStatus::OK.code(), 0);
    }

    #[test]
    fn test_save_codes_ok() {
        let codes = SaveCodes::ok();
        assert!(codes.accepted);
        assert_eq!(codes.errors, 0);
        assert_eq!(codes.warnings, 0);
    }
}
