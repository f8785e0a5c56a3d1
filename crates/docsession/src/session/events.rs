/// Notifications raised by an [`ApplicationSession`](super::ApplicationSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Something about the active document, or its absence, changed.
    InformationChanged,
    DocumentOpened { path: String },
    DocumentCreated,
    DocumentSaved { path: Option<String> },
    DocumentClosing { path: Option<String> },
    /// The host application is shutting down.
    SessionEnding,
    Idle,
}

impl SessionEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InformationChanged => "InformationChanged",
            Self::DocumentOpened { .. } => "DocumentOpened",
            Self::DocumentCreated => "DocumentCreated",
            Self::DocumentSaved { .. } => "DocumentSaved",
            Self::DocumentClosing { .. } => "DocumentClosing",
            Self::SessionEnding => "SessionEnding",
            Self::Idle => "Idle",
        }
    }
}
