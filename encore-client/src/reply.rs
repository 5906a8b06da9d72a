use std::{cell::RefCell, collections::HashMap};

use crate::api::CommentId;

#[derive(Clone, Copy, Debug, Default)]
struct ReplyProgress {
    fetched: usize,
    exhausted: bool,
}

/// Per-parent reply pagination bookkeeping. The replies themselves live in
/// the parent comment's `replies` projection and in the entity store; this
/// only tracks how far into the server-side list we have fetched.
#[derive(Debug)]
pub struct ReplyIndex {
    page_size: usize,
    parents: RefCell<HashMap<CommentId, ReplyProgress>>,
}

impl ReplyIndex {
    pub fn new(page_size: usize) -> ReplyIndex {
        assert!(page_size > 0, "page size must be positive");
        ReplyIndex {
            page_size,
            parents: RefCell::new(HashMap::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Record the replies the thread fetch inlined with the parent, so the
    /// first explicit reply fetch starts right after them
    pub fn seed(&self, parent: CommentId, inlined: usize) {
        self.parents.borrow_mut().insert(
            parent,
            ReplyProgress {
                fetched: inlined,
                exhausted: false,
            },
        );
    }

    pub fn next_offset(&self, parent: &CommentId) -> usize {
        self.parents
            .borrow()
            .get(parent)
            .map(|p| p.fetched)
            .unwrap_or(0)
    }

    pub fn advance(&self, parent: CommentId, fetched: usize) {
        let mut parents = self.parents.borrow_mut();
        let p = parents.entry(parent).or_default();
        p.fetched += fetched;
        p.exhausted = fetched < self.page_size;
    }

    pub fn is_exhausted(&self, parent: &CommentId) -> bool {
        self.parents
            .borrow()
            .get(parent)
            .map(|p| p.exhausted)
            .unwrap_or(false)
    }

    /// Drop all bookkeeping for a parent so its replies get refetched
    pub fn forget(&self, parent: &CommentId) {
        self.parents.borrow_mut().remove(parent);
    }
}
