//! Document lifecycle and event bridging for host applications.
//!
//! The host owns the documents and reports on them through a notification
//! stream that is incomplete: handles change silently after a first save, the
//! last document closing is never announced, and view-only documents open
//! without notice. This crate keeps one consistent view of the active
//! document on top of that stream.
//!
//! - [`session::ApplicationSession`] tracks the active document and raises
//!   session events.
//! - [`document::DocumentProxy`] wraps one native document, rebinding its
//!   native events whenever its kind or handle changes.
//! - [`scheduler::DeferredRefreshScheduler`] runs the idle and delayed checks
//!   that cover what the host does not announce.

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod view_only;

// Re-export commonly used types
pub use config::SessionConfig;
pub use diagnostics::{ErrorReport, ErrorSink};
pub use document::{DocumentEvent, DocumentProxy, SaveResult};
pub use docsession_core::{Result, SessionError};
pub use scheduler::TaskPurpose;
pub use session::{ApplicationSession, SessionEvent};
