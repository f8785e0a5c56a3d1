//! Native per-document notifications delivered by the host.

use crate::host::HostStatus;
use std::fmt;

/// Type of the item an add/delete notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Feature,
    Sheet,
    Configuration,
    Component,
    Other,
}

/// A native notification with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    ItemAdded { item_type: ItemType, name: String },
    ItemDeleted { item_type: ItemType, name: String },
    ItemDeleting { item_type: ItemType, name: String },
    DeleteSelectionPre,
    /// The host is about to destroy the document.
    DestroyPre,
    FileSavePre { path: String },
    FileSavePost { path: String },
    FileSavePostCancel,
    FileSaveAsPre { path: String },
    FileDropPre { path: String },
    FileDropPost { path: String },
    Modified,
    Rebuilt,
    ActiveConfigurationChanged,
    SheetActivating { sheet: String },
    SheetActivated { sheet: String },
    SelectionChanged,
    SelectionCleared,
}

impl NativeEvent {
    /// The binding this event is delivered through.
    pub const fn kind(&self) -> NativeEventKind {
        match self {
            Self::ItemAdded { .. } => NativeEventKind::ItemAdded,
            Self::ItemDeleted { .. } => NativeEventKind::ItemDeleted,
            Self::ItemDeleting { .. } => NativeEventKind::ItemDeleting,
            Self::DeleteSelectionPre => NativeEventKind::DeleteSelectionPre,
            Self::DestroyPre => NativeEventKind::DestroyPre,
            Self::FileSavePre { .. } => NativeEventKind::FileSavePre,
            Self::FileSavePost { .. } => NativeEventKind::FileSavePost,
            Self::FileSavePostCancel => NativeEventKind::FileSavePostCancel,
            Self::FileSaveAsPre { .. } => NativeEventKind::FileSaveAsPre,
            Self::FileDropPre { .. } => NativeEventKind::FileDropPre,
            Self::FileDropPost { .. } => NativeEventKind::FileDropPost,
            Self::Modified => NativeEventKind::Modified,
            Self::Rebuilt => NativeEventKind::Rebuilt,
            Self::ActiveConfigurationChanged => NativeEventKind::ActiveConfigurationChanged,
            Self::SheetActivating { .. } => NativeEventKind::SheetActivating,
            Self::SheetActivated { .. } => NativeEventKind::SheetActivated,
            Self::SelectionChanged => NativeEventKind::SelectionChanged,
            Self::SelectionCleared => NativeEventKind::SelectionCleared,
        }
    }
}

/// Payload-free identifier of a native event binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeEventKind {
    ItemAdded,
    ItemDeleted,
    ItemDeleting,
    DeleteSelectionPre,
    DestroyPre,
    FileSavePre,
    FileSavePost,
    FileSavePostCancel,
    FileSaveAsPre,
    FileDropPre,
    FileDropPost,
    Modified,
    Rebuilt,
    ActiveConfigurationChanged,
    SheetActivating,
    SheetActivated,
    SelectionChanged,
    SelectionCleared,
}

impl NativeEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ItemAdded => "item-added",
            Self::ItemDeleted => "item-deleted",
            Self::ItemDeleting => "item-deleting",
            Self::DeleteSelectionPre => "delete-selection-pre",
            Self::DestroyPre => "destroy-pre",
            Self::FileSavePre => "file-save-pre",
            Self::FileSavePost => "file-save-post",
            Self::FileSavePostCancel => "file-save-post-cancel",
            Self::FileSaveAsPre => "file-save-as-pre",
            Self::FileDropPre => "file-drop-pre",
            Self::FileDropPost => "file-drop-post",
            Self::Modified => "modified",
            Self::Rebuilt => "rebuilt",
            Self::ActiveConfigurationChanged => "active-configuration-changed",
            Self::SheetActivating => "sheet-activating",
            Self::SheetActivated => "sheet-activated",
            Self::SelectionChanged => "selection-changed",
            Self::SelectionCleared => "selection-cleared",
        }
    }
}

impl fmt::Display for NativeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver the host calls for every bound native event.
///
/// Implementations must return [`HostStatus::OK`] whatever happens while
/// handling the event.
pub trait NativeEventSink: Send + Sync {
    fn on_native_event(&self, event: &NativeEvent) -> HostStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_mapping() {
        let event = NativeEvent::ItemAdded {
            item_type: ItemType::Sheet,
            name: "Sheet2".into(),
        };
        assert_eq!(event.kind(), NativeEventKind::ItemAdded);
        assert_eq!(NativeEvent::DestroyPre.kind(), NativeEventKind::DestroyPre);
        assert_eq!(
            NativeEvent::SheetActivated {
                sheet: "Sheet1".into()
            }
            .kind(),
            NativeEventKind::SheetActivated
        );
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(NativeEventKind::FileSavePostCancel.to_string(), "file-save-post-cancel");
    }
}
