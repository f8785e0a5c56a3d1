use docsession_core::ItemType;

/// Notifications raised by a [`DocumentProxy`](super::DocumentProxy).
///
/// Each native notification maps to at most one of these. Listeners run on the
/// host thread after the proxy has released its state lock, so they may call
/// back into the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// Cached metadata was recomputed by a reload.
    InformationChanged,
    Saving { path: String },
    SavingAs { path: String },
    Saved { path: String },
    SaveCanceled,
    /// The host is about to destroy the document.
    Closing,
    Modified,
    Rebuilt,
    ActiveConfigurationChanged { name: Option<String> },
    ItemAdded { item_type: ItemType, name: String },
    ItemDeleted { item_type: ItemType, name: String },
    ItemDeleting { item_type: ItemType, name: String },
    SelectionChanged,
    DeletingSelection,
    ActiveSheetChanging { sheet: String },
    ActiveSheetChanged { sheet: String },
    SheetAdded { name: String },
    SheetDeleted { name: String },
    FileDropping { path: String },
    FileDropped { path: String },
}

impl DocumentEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InformationChanged => "InformationChanged",
            Self::Saving { .. } => "Saving",
            Self::SavingAs { .. } => "SavingAs",
            Self::Saved { .. } => "Saved",
            Self::SaveCanceled => "SaveCanceled",
            Self::Closing => "Closing",
            Self::Modified => "Modified",
            Self::Rebuilt => "Rebuilt",
            Self::ActiveConfigurationChanged { .. } => "ActiveConfigurationChanged",
            Self::ItemAdded { .. } => "ItemAdded",
            Self::ItemDeleted { .. } => "ItemDeleted",
            Self::ItemDeleting { .. } => "ItemDeleting",
            Self::SelectionChanged => "SelectionChanged",
            Self::DeletingSelection => "DeletingSelection",
            Self::ActiveSheetChanging { .. } => "ActiveSheetChanging",
            Self::ActiveSheetChanged { .. } => "ActiveSheetChanged",
            Self::SheetAdded { .. } => "SheetAdded",
            Self::SheetDeleted { .. } => "SheetDeleted",
            Self::FileDropping { .. } => "FileDropping",
            Self::FileDropped { .. } => "FileDropped",
        }
    }
}
