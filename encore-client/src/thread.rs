use std::{cell::RefCell, collections::HashMap};

use crate::api::{CommentId, SortMethod, SubjectId};

/// Sort order is a property of the moment of viewing, so pages are cached per
/// sort method and dropped as soon as nothing observes them anymore.
pub type ThreadKey = (SubjectId, SortMethod);

#[derive(Debug, Default)]
struct ThreadPages {
    pages: Vec<Vec<CommentId>>,
    exhausted: bool,
    observers: usize,
}

/// Per (subject, sort) ordered, paginated list of root-comment identities
#[derive(Debug)]
pub struct ThreadIndex {
    page_size: usize,
    threads: RefCell<HashMap<ThreadKey, ThreadPages>>,
}

impl ThreadIndex {
    pub fn new(page_size: usize) -> ThreadIndex {
        assert!(page_size > 0, "page size must be positive");
        ThreadIndex {
            page_size,
            threads: RefCell::new(HashMap::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn observe(&self, key: ThreadKey) {
        self.threads.borrow_mut().entry(key).or_default().observers += 1;
    }

    /// Dropping the last observer reclaims the pages immediately: a re-visit
    /// must re-fetch rather than render a stale ordering.
    pub fn unobserve(&self, key: ThreadKey) {
        let mut threads = self.threads.borrow_mut();
        let drop_entry = match threads.get_mut(&key) {
            None => false,
            Some(t) => {
                t.observers = t.observers.saturating_sub(1);
                t.observers == 0
            }
        };
        if drop_entry {
            threads.remove(&key);
        }
    }

    pub fn is_observed(&self, subject: SubjectId) -> bool {
        self.threads
            .borrow()
            .iter()
            .any(|((s, _), t)| *s == subject && t.observers > 0)
    }

    /// Offset for the next page fetch
    pub fn next_offset(&self, key: &ThreadKey) -> usize {
        self.threads
            .borrow()
            .get(key)
            .map(|t| t.pages.len() * self.page_size)
            .unwrap_or(0)
    }

    pub fn is_exhausted(&self, key: &ThreadKey) -> bool {
        self.threads
            .borrow()
            .get(key)
            .map(|t| t.exhausted)
            .unwrap_or(false)
    }

    /// A page shorter than the page size is the last page
    pub fn append_page(&self, key: ThreadKey, ids: Vec<CommentId>) {
        let mut threads = self.threads.borrow_mut();
        let t = threads.entry(key).or_default();
        t.exhausted = ids.len() < self.page_size;
        t.pages.push(ids);
    }

    /// Optimistic insert at the head of page 0 (new root comment)
    pub fn prepend(&self, key: ThreadKey, id: CommentId) {
        let mut threads = self.threads.borrow_mut();
        let t = threads.entry(key).or_default();
        if t.pages.is_empty() {
            // an empty thread never got a first page appended
            t.pages.push(Vec::new());
            t.exhausted = true;
        }
        t.pages[0].insert(0, id);
    }

    pub fn remove(&self, key: &ThreadKey, id: CommentId) {
        if let Some(t) = self.threads.borrow_mut().get_mut(key) {
            for page in t.pages.iter_mut() {
                page.retain(|i| *i != id);
            }
        }
    }

    /// Relocate an identity to the front of page 0, removing it from its old
    /// position first so it never appears twice (pinning)
    pub fn move_to_front(&self, key: ThreadKey, id: CommentId) {
        self.remove(&key, id);
        self.prepend(key, id);
    }

    pub fn replace_id(&self, key: &ThreadKey, old: CommentId, new: CommentId) {
        if let Some(t) = self.threads.borrow_mut().get_mut(key) {
            for page in t.pages.iter_mut() {
                for i in page.iter_mut() {
                    if *i == old {
                        *i = new;
                    }
                }
            }
        }
    }

    pub fn contains(&self, key: &ThreadKey, id: CommentId) -> bool {
        self.threads
            .borrow()
            .get(key)
            .map(|t| t.pages.iter().any(|p| p.contains(&id)))
            .unwrap_or(false)
    }

    /// Flattened view of all fetched pages, in order
    pub fn ids(&self, key: &ThreadKey) -> Vec<CommentId> {
        self.threads
            .borrow()
            .get(key)
            .map(|t| t.pages.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Whole-key invalidation: drop every page but keep the observers, so the
    /// next fetch starts over from offset 0
    pub fn clear(&self, key: &ThreadKey) {
        let mut threads = self.threads.borrow_mut();
        let drop_entry = match threads.get_mut(key) {
            None => false,
            Some(t) => {
                t.pages.clear();
                t.exhausted = false;
                t.observers == 0
            }
        };
        if drop_entry {
            threads.remove(key);
        }
    }
}
