use std::{cell::RefCell, collections::HashMap, fmt};

use crate::api::{CommentId, CommentOrReply};

/// Single source of truth for any individual comment's fields. Indexes only
/// hold identities; everything renders by lookup into here.
pub struct EntityStore {
    entries: RefCell<HashMap<CommentId, CommentOrReply>>,
    watchers: RefCell<Vec<Box<dyn Fn(CommentId)>>>,
}

impl EntityStore {
    pub fn new() -> EntityStore {
        EntityStore {
            entries: RefCell::new(HashMap::new()),
            watchers: RefCell::new(Vec::new()),
        }
    }

    pub fn get(&self, id: &CommentId) -> Option<CommentOrReply> {
        self.entries.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn set(&self, value: impl Into<CommentOrReply>) {
        let value = value.into();
        let id = value.id();
        self.entries.borrow_mut().insert(id, value);
        self.notify(id);
    }

    /// Pure-functional update: previous value in, new value out, so that
    /// concurrent optimistic mutations compose predictably. Returns false
    /// (and warns) when the entity is not in the store.
    pub fn update(&self, id: &CommentId, f: impl FnOnce(CommentOrReply) -> CommentOrReply) -> bool {
        let updated = {
            let mut entries = self.entries.borrow_mut();
            match entries.remove(id) {
                None => false,
                Some(prev) => {
                    let next = f(prev);
                    entries.insert(*id, next);
                    true
                }
            }
        };
        if updated {
            self.notify(*id);
        } else {
            tracing::warn!(?id, "update for comment not in entity store");
        }
        updated
    }

    pub fn remove(&self, id: &CommentId) {
        if self.entries.borrow_mut().remove(id).is_some() {
            self.notify(*id);
        }
    }

    /// Subscribe to changes; called synchronously after every set/update/remove
    pub fn watch(&self, f: impl Fn(CommentId) + 'static) {
        self.watchers.borrow_mut().push(Box::new(f));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn notify(&self, id: CommentId) {
        // entries borrow is released first so watchers can read back
        for w in self.watchers.borrow().iter() {
            w(id);
        }
    }
}

impl Default for EntityStore {
    fn default() -> EntityStore {
        EntityStore::new()
    }
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("entries", &self.entries.borrow())
            .field("watchers", &self.watchers.borrow().len())
            .finish()
    }
}
