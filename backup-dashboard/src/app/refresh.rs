//! Refresh-trigger coalescing.

use std::collections::HashSet;

use crate::reconcile::ViewKind;

/// At most one fetch per view is outstanding. Requests that arrive while a
/// fetch runs collapse into a single follow-up fetch.
#[derive(Debug, Default)]
pub struct RefreshTracker {
    fetching: HashSet<ViewKind>,
    dirty: HashSet<ViewKind>,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the caller should start a fetch now.
    pub fn request(&mut self, view: ViewKind) -> bool {
        if self.fetching.insert(view) {
            true
        } else {
            self.dirty.insert(view);
            false
        }
    }

    /// A fetch finished. Returns true when a follow-up fetch should start;
    /// the view then stays marked as fetching.
    pub fn complete(&mut self, view: ViewKind) -> bool {
        if self.dirty.remove(&view) {
            true
        } else {
            self.fetching.remove(&view);
            false
        }
    }

    pub fn is_fetching(&self, view: ViewKind) -> bool {
        self.fetching.contains(&view)
    }
}
