//! Document proxies.
//!
//! This module wraps native documents for the session:
//! - `proxy`: `DocumentProxy`, its reload, save and dispose paths and the
//!   native event handlers
//! - `subscriptions`: per-kind native event tables, bound all or nothing
//! - `resources`: kind-derived native sub-objects released in reverse order
//! - `events`: outbound document notifications
//! - `save`: save outcome reporting

mod events;
mod proxy;
mod resources;
mod save;
mod subscriptions;

pub use events::DocumentEvent;
pub use proxy::{DocumentInfo, DocumentOwner, DocumentProxy};
pub use resources::DocumentResources;
pub use save::SaveResult;
pub use subscriptions::{EventSubscriptionSet, event_table};
