use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
};

use crate::{
    api::{Backend, Comment, CommentId, CommentOrReply, SortMethod, SubjectId, UserId},
    CommentCount, CounterStore, EntityStore, LoadError, LoadKind, Notice, ReplyIndex, SyncGate,
    ThreadIndex,
};

pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const DEFAULT_REPLY_PAGE_SIZE: usize = 3;

/// Outcome of a `load_more_*` call
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageLoad {
    /// A page of this many items was fetched and merged
    Fetched(usize),
    /// Mutations are in flight; the fetch is paused, not cancelled
    Deferred,
    /// The last page was already reached, no network call was made
    Exhausted,
}

/// The comment subsystem's shared state: one injectable value owning every
/// store, so tests can instantiate isolated instances. All consumers observe
/// the same optimistic state immediately.
pub struct CommentCache<B> {
    pub(crate) backend: B,
    owner: UserId,

    pub entities: EntityStore,
    pub threads: ThreadIndex,
    pub replies: ReplyIndex,
    pub counts: CounterStore,
    pub gate: SyncGate,

    pub(crate) pinned: RefCell<HashMap<SubjectId, Option<CommentId>>>,
    pub(crate) subject_notifications_muted: RefCell<HashMap<SubjectId, bool>>,
    notices: RefCell<VecDeque<Notice>>,
}

impl<B> CommentCache<B> {
    pub fn new(owner: UserId, backend: B) -> CommentCache<B> {
        CommentCache::with_page_sizes(owner, backend, DEFAULT_PAGE_SIZE, DEFAULT_REPLY_PAGE_SIZE)
    }

    pub fn with_page_sizes(
        owner: UserId,
        backend: B,
        page_size: usize,
        reply_page_size: usize,
    ) -> CommentCache<B> {
        CommentCache {
            backend,
            owner,
            entities: EntityStore::new(),
            threads: ThreadIndex::new(page_size),
            replies: ReplyIndex::new(reply_page_size),
            counts: CounterStore::new(),
            gate: SyncGate::new(),
            pinned: RefCell::new(HashMap::new()),
            subject_notifications_muted: RefCell::new(HashMap::new()),
            notices: RefCell::new(VecDeque::new()),
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Begin rendering a (subject, sort) thread; keeps its pages alive
    pub fn observe(&self, subject: SubjectId, sort: SortMethod) {
        self.threads.observe((subject, sort));
    }

    /// Stop rendering; the last unobserve drops the pages immediately
    pub fn unobserve(&self, subject: SubjectId, sort: SortMethod) {
        self.threads.unobserve((subject, sort));
    }

    pub fn is_observed(&self, subject: SubjectId) -> bool {
        self.threads.is_observed(subject)
    }

    /// Single-comment view, resolved from the entity store
    pub fn comment(&self, id: &CommentId) -> Option<CommentOrReply> {
        self.entities.get(id)
    }

    /// Flattened root-comment projection of every fetched page, in order
    pub fn comments(&self, subject: SubjectId, sort: SortMethod) -> Vec<Comment> {
        self.threads
            .ids(&(subject, sort))
            .iter()
            .filter_map(|id| match self.entities.get(id) {
                Some(CommentOrReply::Comment(c)) => Some(c),
                Some(CommentOrReply::Reply(_)) => {
                    tracing::warn!(?id, "reply id found in a root comment list");
                    None
                }
                None => {
                    tracing::warn!(?id, "listed comment missing from entity store");
                    None
                }
            })
            .collect()
    }

    pub fn comment_ids(&self, subject: SubjectId, sort: SortMethod) -> Vec<CommentId> {
        self.threads.ids(&(subject, sort))
    }

    pub fn count(&self, subject: &SubjectId) -> Option<CommentCount> {
        self.counts.get(subject)
    }

    /// Acknowledge the current count so no stale delta animates on revisit
    pub fn reset_count(&self, subject: &SubjectId) {
        self.counts.reset(subject);
    }

    pub fn pinned_comment(&self, subject: &SubjectId) -> Option<CommentId> {
        self.pinned.borrow().get(subject).copied().flatten()
    }

    /// User-visible failure notifications since the last drain, oldest first
    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.borrow_mut().drain(..).collect()
    }

    pub(crate) fn push_notice(&self, notice: Notice) {
        self.notices.borrow_mut().push_back(notice);
    }

    /// Seed the entity store (and reply bookkeeping) from a fetched comment
    fn absorb_comment(&self, subject: SubjectId, comment: Comment) {
        if comment.is_pinned {
            self.pinned.borrow_mut().insert(subject, Some(comment.id));
        }
        if let Some(replies) = &comment.replies {
            for r in replies {
                self.entities.set(r.clone());
            }
            self.replies.seed(comment.id, replies.len());
        }
        self.entities.set(comment);
    }

    /// Reset a parent's reply projection to unfetched so the next observation
    /// refetches instead of trusting a half-reverted list
    pub(crate) fn invalidate_replies_of(&self, parent: &CommentId) {
        self.replies.forget(parent);
        self.entities.update(parent, |mut e| {
            if let Some(c) = e.as_comment_mut() {
                c.replies = None;
            }
            e
        });
    }
}

impl<B: Backend> CommentCache<B> {
    /// Fetch the next page of root comments. Deferred while any mutation is
    /// in flight so a server refresh cannot overwrite optimistic state.
    pub async fn load_more_comments(
        &self,
        subject: SubjectId,
        sort: SortMethod,
    ) -> Result<PageLoad, LoadError> {
        let key = (subject, sort);
        if !self.gate.is_idle() {
            tracing::trace!(?subject, in_flight = self.gate.in_flight(), "list fetch deferred");
            return Ok(PageLoad::Deferred);
        }
        if self.threads.is_exhausted(&key) {
            return Ok(PageLoad::Exhausted);
        }
        let offset = self.threads.next_offset(&key);
        let limit = self.threads.page_size();
        match self.backend.fetch_thread_page(subject, sort, offset, limit).await {
            Err(source) => {
                tracing::warn!(?subject, error = %source, "failed fetching comment page");
                self.push_notice(Notice::LoadFailed(LoadKind::Comments));
                Err(LoadError {
                    kind: LoadKind::Comments,
                    source,
                })
            }
            Ok(comments) => {
                let fetched = comments.len();
                let mut ids = Vec::with_capacity(fetched);
                for c in comments {
                    ids.push(c.id);
                    self.absorb_comment(subject, c);
                }
                self.threads.append_page(key, ids);
                Ok(PageLoad::Fetched(fetched))
            }
        }
    }

    /// Fetch the next page of replies for a parent, appending them to the
    /// parent's `replies` projection. Not gated: replies never reorder roots.
    pub async fn load_more_replies(&self, parent: CommentId) -> Result<PageLoad, LoadError> {
        if self.replies.is_exhausted(&parent) {
            return Ok(PageLoad::Exhausted);
        }
        let offset = self.replies.next_offset(&parent);
        let limit = self.replies.page_size();
        match self.backend.fetch_replies(parent, offset, limit).await {
            Err(source) => {
                tracing::warn!(?parent, error = %source, "failed fetching replies");
                self.push_notice(Notice::LoadFailed(LoadKind::Replies));
                Err(LoadError {
                    kind: LoadKind::Replies,
                    source,
                })
            }
            Ok(fetched) => {
                let n = fetched.len();
                self.replies.advance(parent, n);
                for r in &fetched {
                    self.entities.set(r.clone());
                }
                self.entities.update(&parent, |mut e| {
                    if let Some(c) = e.as_comment_mut() {
                        let existing = c.replies.get_or_insert_with(Vec::new);
                        for r in fetched {
                            // an optimistically posted reply may come back in
                            // a later page
                            if !existing.iter().any(|x| x.id == r.id) {
                                existing.push(r);
                            }
                        }
                    }
                    e
                });
                Ok(PageLoad::Fetched(n))
            }
        }
    }

    /// Ask the server for the aggregate count and reconcile it into the
    /// counter store
    pub async fn refresh_count(&self, subject: SubjectId) -> Result<CommentCount, LoadError> {
        match self.backend.fetch_count(subject).await {
            Ok(value) => Ok(self.counts.record_server(subject, value)),
            Err(source) => {
                tracing::warn!(?subject, error = %source, "failed fetching comment count");
                Err(LoadError {
                    kind: LoadKind::Comments,
                    source,
                })
            }
        }
    }

    /// Subject-level comment notification setting, cached after first fetch
    pub async fn notification_setting(&self, subject: SubjectId) -> Result<bool, LoadError> {
        let cached = self
            .subject_notifications_muted
            .borrow()
            .get(&subject)
            .copied();
        if let Some(muted) = cached {
            return Ok(muted);
        }
        match self.backend.fetch_notification_setting(subject).await {
            Ok(muted) => {
                self.subject_notifications_muted
                    .borrow_mut()
                    .insert(subject, muted);
                Ok(muted)
            }
            Err(source) => {
                tracing::warn!(?subject, error = %source, "failed fetching notification setting");
                Err(LoadError {
                    kind: LoadKind::Comments,
                    source,
                })
            }
        }
    }
}
