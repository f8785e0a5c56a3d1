//! Disposal discipline for wrapped native handles.
//!
//! Every wrapper in the workspace follows the same contract:
//!
//! - owned children are released in reverse order of acquisition, before the
//!   wrapper's own handle;
//! - disposing twice is a no-op and never fails;
//! - a partially built wrapper releases exactly what it managed to acquire.
//!
//! [`NativeRef`] tracks a single native object, [`ResourceScope`] owns an
//! ordered set of them. Both also release on drop, so early returns and
//! panics cannot leak a native reference.

use crate::error::{HostError, HostResult};
use crate::host::NativeObject;
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a document wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Active,
    /// Terminal.
    Disposed,
}

/// A release that failed for a reason other than an already-invalid handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFailure {
    pub resource: &'static str,
    pub error: HostError,
}

impl fmt::Display for ReleaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to release {}: {}", self.resource, self.error)
    }
}

/// Uniform disposal contract.
pub trait Dispose {
    /// Releases everything owned by `self`.
    ///
    /// Returns the failures worth reporting. Calls after the first return an
    /// empty list and touch nothing.
    fn dispose(&mut self) -> Vec<ReleaseFailure>;

    fn is_disposed(&self) -> bool;
}

/// Owning reference to one native object.
///
/// # Examples
///
/// ```
/// use docsession_core::error::HostResult;
/// use docsession_core::host::{NativeObject, ResourceKind};
/// use docsession_core::lifecycle::{Dispose, NativeRef};
/// use std::sync::Arc;
///
/// struct Extension;
///
/// impl NativeObject for Extension {
///     fn kind(&self) -> ResourceKind {
///         ResourceKind::Extension
///     }
///
///     fn release(&self) -> HostResult<()> {
///         Ok(())
///     }
/// }
///
/// let mut reference = NativeRef::acquire("extension", || Ok(Arc::new(Extension) as _)).unwrap();
/// assert!(reference.is_acquired());
/// assert!(reference.dispose().is_empty());
/// assert!(reference.dispose().is_empty());
/// assert!(!reference.is_acquired());
/// ```
pub struct NativeRef {
    label: &'static str,
    object: Option<Arc<dyn NativeObject>>,
    disposed: bool,
}

impl NativeRef {
    /// Runs `acquire` and wraps the result. Nothing is held on failure.
    pub fn acquire<F>(label: &'static str, acquire: F) -> HostResult<Self>
    where
        F: FnOnce() -> HostResult<Arc<dyn NativeObject>>,
    {
        let object = acquire()?;
        Ok(Self {
            label,
            object: Some(object),
            disposed: false,
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_acquired(&self) -> bool {
        self.object.is_some()
    }

    pub fn get(&self) -> Option<&Arc<dyn NativeObject>> {
        self.object.as_ref()
    }

    fn release(&mut self) -> Option<ReleaseFailure> {
        let object = self.object.take()?;
        match object.release() {
            Ok(()) => {
                tracing::trace!("released {}", self.label);
                None
            }
            Err(HostError::InvalidHandle) => {
                tracing::debug!("{} already invalid on release", self.label);
                None
            }
            Err(error) => Some(ReleaseFailure {
                resource: self.label,
                error,
            }),
        }
    }
}

impl Dispose for NativeRef {
    fn dispose(&mut self) -> Vec<ReleaseFailure> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;
        self.release().into_iter().collect()
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for NativeRef {
    fn drop(&mut self) {
        for failure in self.dispose() {
            tracing::warn!("{}", failure);
        }
    }
}

impl fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRef")
            .field("label", &self.label)
            .field("acquired", &self.is_acquired())
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Ordered owner of native references.
///
/// References are released last-acquired first.
#[derive(Debug, Default)]
pub struct ResourceScope {
    refs: Vec<NativeRef>,
    disposed: bool,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a native object into the scope and returns it.
    ///
    /// A failed acquisition leaves the scope as it was; whatever was acquired
    /// before stays owned and is released on dispose.
    pub fn acquire<F>(&mut self, label: &'static str, acquire: F) -> HostResult<Arc<dyn NativeObject>>
    where
        F: FnOnce() -> HostResult<Arc<dyn NativeObject>>,
    {
        if self.disposed {
            return Err(HostError::Failed(format!(
                "cannot acquire {} into a disposed scope",
                label
            )));
        }
        let reference = NativeRef::acquire(label, acquire)?;
        let object = reference
            .get()
            .cloned()
            .ok_or_else(|| HostError::Failed(format!("{} was not acquired", label)))?;
        self.refs.push(reference);
        Ok(object)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Labels of the held references in acquisition order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.refs.iter().map(NativeRef::label).collect()
    }
}

impl Dispose for ResourceScope {
    fn dispose(&mut self) -> Vec<ReleaseFailure> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;

        let mut failures = Vec::new();
        while let Some(mut reference) = self.refs.pop() {
            failures.extend(reference.dispose());
        }
        failures
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        for failure in self.dispose() {
            tracing::warn!("{}", failure);
        }
    }
}
