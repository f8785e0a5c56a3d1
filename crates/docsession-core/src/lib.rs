//! Core abstractions for docsession.
//!
//! This crate defines the boundary between the session layer and the host
//! application that owns the real documents.
//!
//! # Architecture
//!
//! docsession-core provides:
//! - **Host traits**: `HostApplication`, `NativeDocument`, `NativeObject`,
//!   `NativeEventSink`
//! - **Native events**: the per-document notification vocabulary
//! - **Disposal**: `NativeRef` and `ResourceScope` with reverse-order,
//!   idempotent release
//! - **Event buses**: typed multicast used for every outbound event
//! - **Error types**: `HostError`, `SessionError` and their classification
//!
//! With the `test-util` feature it also ships a scripted host, see
//! [`testing`].
//!
//! # Examples
//!
//! Adapting a host document:
//!
//! ```no_run
//! use docsession_core::error::{HostError, HostResult};
//! use docsession_core::host::{
//!     DocumentKind, HandleId, NativeDocument, NativeObject, ResourceKind, SaveCodes, SaveOptions,
//! };
//! use docsession_core::native_event::{NativeEventKind, NativeEventSink};
//! use std::sync::Arc;
//!
//! struct ComDocument {
//!     handle: HandleId,
//! }
//!
//! impl NativeDocument for ComDocument {
//!     fn handle(&self) -> HandleId {
//!         self.handle
//!     }
//!
//!     fn kind(&self) -> HostResult<DocumentKind> {
//!         Ok(DocumentKind::Part)
//!     }
//!
//!     fn path(&self) -> HostResult<Option<String>> {
//!         Ok(None)
//!     }
//!
//!     fn title(&self) -> HostResult<String> {
//!         Ok("Part1".into())
//!     }
//!
//!     fn is_view_only(&self) -> HostResult<bool> {
//!         Ok(false)
//!     }
//!
//!     fn active_configuration(&self) -> HostResult<Option<String>> {
//!         Ok(Some("Default".into()))
//!     }
//!
//!     fn acquire(&self, _resource: ResourceKind) -> HostResult<Arc<dyn NativeObject>> {
//!         Err(HostError::Failed("not wired".into()))
//!     }
//!
//!     fn hook(&self, _event: NativeEventKind, _sink: Arc<dyn NativeEventSink>) -> HostResult<()> {
//!         Ok(())
//!     }
//!
//!     fn unhook(&self, _event: NativeEventKind) -> HostResult<()> {
//!         Ok(())
//!     }
//!
//!     fn save(&self, _options: SaveOptions) -> HostResult<SaveCodes> {
//!         Ok(SaveCodes::ok())
//!     }
//!
//!     fn save_as(&self, _path: &str, _options: SaveOptions) -> HostResult<SaveCodes> {
//!         Ok(SaveCodes::ok())
//!     }
//! }
//! ```

pub mod error;
pub mod events;
pub mod host;
pub mod lifecycle;
pub mod native_event;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use error::{ErrorClass, HostError, HostResult, Result, SessionError};
pub use events::{EmitReport, EventBus, SubscriptionId};
pub use host::{
    DocumentKind, HandleId, HostApplication, HostStatus, NativeDocument, NativeObject,
    OpenOptions, ResourceKind, SaveCodes, SaveOptions,
};
pub use lifecycle::{Dispose, LifecycleState, NativeRef, ReleaseFailure, ResourceScope};
pub use native_event::{ItemType, NativeEvent, NativeEventKind, NativeEventSink};
