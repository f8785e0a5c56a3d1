use docsession_core::lifecycle::{Dispose, ReleaseFailure, ResourceScope};
use docsession_core::{DocumentKind, NativeDocument, ResourceKind, Result, SessionError};

/// Native sub-objects a proxy holds for one document kind.
///
/// Acquired in a fixed order (extension, selection manager, then the view
/// of the kind) and released in reverse. A failed acquisition releases what
/// was already taken before the error is returned.
#[derive(Debug, Default)]
pub struct DocumentResources {
    kind: DocumentKind,
    scope: ResourceScope,
}

impl DocumentResources {
    /// Holds nothing. Used before the first reload and after disposal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn acquire(native: &dyn NativeDocument, kind: DocumentKind) -> Result<Self> {
        let mut scope = ResourceScope::new();
        let mut take = |resource: ResourceKind| {
            scope
                .acquire(resource.as_str(), || native.acquire(resource))
                .map_err(|source| SessionError::host("acquire", source))
        };

        take(ResourceKind::Extension)?;
        take(ResourceKind::SelectionManager)?;
        if let Some(view) = kind.view_resource() {
            take(view)?;
        }

        tracing::trace!("acquired {} resources for {} document", scope.len(), kind);
        Ok(Self { kind, scope })
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Held resources in acquisition order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.scope.labels()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }
}

impl Dispose for DocumentResources {
    fn dispose(&mut self) -> Vec<ReleaseFailure> {
        self.scope.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.scope.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsession_core::testing::{FakeHost, HostCall};

    #[test]
    fn test_acquire_per_kind() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Assembly, Some("C:/a.sldasm"));

        let resources = DocumentResources::acquire(&*doc, DocumentKind::Assembly).unwrap();
        assert_eq!(
            resources.labels(),
            vec!["extension", "selection-manager", "assembly-view"]
        );
        assert_eq!(resources.kind(), DocumentKind::Assembly);
    }

    #[test]
    fn test_unknown_kind_has_no_view() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Unknown, None);
        let resources = DocumentResources::acquire(&*doc, DocumentKind::Unknown).unwrap();
        assert_eq!(resources.labels(), vec!["extension", "selection-manager"]);
    }

    #[test]
    fn test_dispose_releases_in_reverse() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Drawing, Some("C:/d.slddrw"));
        let mut resources = DocumentResources::acquire(&*doc, DocumentKind::Drawing).unwrap();
        doc.clear_journal();

        assert!(resources.dispose().is_empty());
        assert!(resources.dispose().is_empty());
        assert!(resources.is_disposed());
        assert_eq!(
            doc.journal(),
            vec![
                HostCall::Release(ResourceKind::DrawingView),
                HostCall::Release(ResourceKind::SelectionManager),
                HostCall::Release(ResourceKind::Extension),
            ]
        );
    }

    #[test]
    fn test_partial_acquisition_is_released() {
        let host = FakeHost::new();
        let doc = host.add_document(DocumentKind::Part, Some("C:/p.sldprt"));
        doc.fail_acquire_on(Some(ResourceKind::PartView));

        let err = DocumentResources::acquire(&*doc, DocumentKind::Part).unwrap_err();
        assert_eq!(err.to_string(), "host call acquire failed: part-view unavailable");
        assert_eq!(
            doc.count_calls(|call| matches!(call, HostCall::Release(_))),
            2
        );
    }
}
