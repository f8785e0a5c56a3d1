use dashmap::DashSet;

/// Paths of documents open in the host's view-only mode.
///
/// The host skips its open notification for view-only documents, so the
/// session synthesises one the first time such a document becomes active.
/// This set remembers which paths already got their synthetic open, until
/// the document is destroyed.
///
/// Paths compare case-insensitively, with `\` and `/` treated alike.
///
/// # Examples
///
/// ```
/// use docsession::view_only::ViewOnlyDedupTracker;
///
/// let tracker = ViewOnlyDedupTracker::new();
/// assert!(tracker.add(r"C:\Parts\Bracket.SLDPRT"));
/// assert!(!tracker.add("c:/parts/bracket.sldprt"));
/// assert!(tracker.contains("C:/PARTS/BRACKET.sldprt"));
///
/// assert!(tracker.remove("c:/parts/bracket.sldprt"));
/// assert!(tracker.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ViewOnlyDedupTracker {
    paths: DashSet<String>,
}

impl ViewOnlyDedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the path was not tracked yet.
    pub fn add(&self, path: &str) -> bool {
        self.paths.insert(normalize(path))
    }

    pub fn remove(&self, path: &str) -> bool {
        self.paths.remove(&normalize(path)).is_some()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(&normalize(path))
    }

    pub fn clear(&self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}
