use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet, VecDeque},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;

use encore_client::api::{
    Backend, Comment, CommentId, Error, NewComment, NotificationTarget, Reply, SortMethod,
    SubjectId, Time, UserId, Uuid,
};

/// How many replies ride along with each root comment in a thread page
pub const INLINE_REPLIES: usize = 3;

#[derive(Clone, Debug)]
struct StoredRoot {
    subject: SubjectId,
    author: UserId,
    message: String,
    mentions: Vec<UserId>,
    track_timestamp_s: Option<u32>,
    react_count: i64,
    is_edited: bool,
    is_pinned: bool,
    created_at: Time,
    seq: u64,
    replies: Vec<CommentId>,
}

#[derive(Clone, Debug)]
struct StoredReply {
    parent: CommentId,
    author: UserId,
    message: String,
    mentions: Vec<UserId>,
    react_count: i64,
    is_edited: bool,
    created_at: Time,
}

#[derive(Debug, Default)]
struct State {
    roots: HashMap<CommentId, StoredRoot>,
    replies: HashMap<CommentId, StoredReply>,
    threads: HashMap<SubjectId, Vec<CommentId>>,
    muted_users: HashSet<UserId>,
    reported: HashSet<CommentId>,
    notifications_muted: HashMap<SubjectId, bool>,
    seq: u64,
}

/// In-memory backend for tests: deterministic sorting, injectable failures,
/// and a staging barrier to script interleavings of concurrent mutations.
pub struct MockServer {
    state: RefCell<State>,
    fail_queue: RefCell<VecDeque<Error>>,
    staged: Cell<bool>,
    release: Notify,
    thread_fetches: Cell<usize>,
    reassign_posted_ids: Cell<bool>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            state: RefCell::new(State::default()),
            fail_queue: RefCell::new(VecDeque::new()),
            staged: Cell::new(false),
            release: Notify::new(),
            thread_fetches: Cell::new(0),
            reassign_posted_ids: Cell::new(false),
        }
    }

    /// Queue an error; each queued error fails exactly one upcoming call, in
    /// order
    pub fn fail_next(&self, e: Error) {
        self.fail_queue.borrow_mut().push_back(e);
    }

    /// From now on every call waits at the barrier until released
    pub fn hold(&self) {
        self.staged.set(true);
    }

    /// Let exactly one held call through (or pre-arm the next one)
    pub fn release_one(&self) {
        self.release.notify_one();
    }

    /// Drop the barrier and wake everyone still waiting at it
    pub fn resume(&self) {
        self.staged.set(false);
        self.release.notify_waiters();
    }

    /// When set, post_comment ignores the client-generated id and assigns a
    /// fresh one, exercising the reconciliation path
    pub fn test_reassign_posted_ids(&self, on: bool) {
        self.reassign_posted_ids.set(on);
    }

    /// Number of thread page fetches attempted so far
    pub fn test_thread_fetches(&self) -> usize {
        self.thread_fetches.get()
    }

    pub fn test_comment_exists(&self, id: CommentId) -> bool {
        let state = self.state.borrow();
        state.roots.contains_key(&id) || state.replies.contains_key(&id)
    }

    pub fn admin_post_root(&self, subject: SubjectId, author: UserId, message: &str) -> CommentId {
        let id = CommentId(Uuid::new_v4());
        let mut state = self.state.borrow_mut();
        state.seq += 1;
        let seq = state.seq;
        state.roots.insert(
            id,
            StoredRoot {
                subject,
                author,
                message: String::from(message),
                mentions: Vec::new(),
                track_timestamp_s: None,
                react_count: 0,
                is_edited: false,
                is_pinned: false,
                created_at: Utc::now() + Duration::seconds(seq as i64),
                seq,
                replies: Vec::new(),
            },
        );
        state.threads.entry(subject).or_default().push(id);
        id
    }

    pub fn admin_post_reply(&self, parent: CommentId, author: UserId, message: &str) -> CommentId {
        let id = CommentId(Uuid::new_v4());
        let mut state = self.state.borrow_mut();
        state.seq += 1;
        let seq = state.seq;
        state.replies.insert(
            id,
            StoredReply {
                parent,
                author,
                message: String::from(message),
                mentions: Vec::new(),
                react_count: 0,
                is_edited: false,
                created_at: Utc::now() + Duration::seconds(seq as i64),
            },
        );
        state
            .roots
            .get_mut(&parent)
            .unwrap_or_else(|| panic!("seeding reply for unknown parent {parent:?}"))
            .replies
            .push(id);
        id
    }

    pub fn admin_set_react_count(&self, id: CommentId, count: i64) {
        let mut state = self.state.borrow_mut();
        if let Some(r) = state.roots.get_mut(&id) {
            r.react_count = count;
        } else if let Some(r) = state.replies.get_mut(&id) {
            r.react_count = count;
        } else {
            panic!("setting react count for unknown comment {id:?}");
        }
    }

    async fn checkpoint(&self) -> Result<(), Error> {
        if self.staged.get() {
            self.release.notified().await;
        }
        match self.fail_queue.borrow_mut().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn visible(&self, state: &State, id: &CommentId) -> bool {
        if state.reported.contains(id) {
            return false;
        }
        let author = match (state.roots.get(id), state.replies.get(id)) {
            (Some(r), _) => r.author,
            (_, Some(r)) => r.author,
            (None, None) => return false,
        };
        !state.muted_users.contains(&author)
    }

    fn render_reply(state: &State, id: CommentId) -> Reply {
        let stored = &state.replies[&id];
        Reply {
            id,
            parent_id: stored.parent,
            user_id: stored.author,
            message: stored.message.clone(),
            mentions: stored.mentions.clone(),
            react_count: stored.react_count,
            is_edited: stored.is_edited,
            is_current_user_reacted: false,
            is_artist_reacted: false,
            is_muted: false,
            created_at: stored.created_at,
            updated_at: None,
        }
    }

    fn render_root(&self, state: &State, id: CommentId) -> Comment {
        let stored = &state.roots[&id];
        let visible_replies: Vec<CommentId> = stored
            .replies
            .iter()
            .filter(|r| self.visible(state, *r))
            .copied()
            .collect();
        let inlined = visible_replies
            .iter()
            .take(INLINE_REPLIES)
            .map(|r| Self::render_reply(state, *r))
            .collect();
        Comment {
            id,
            user_id: Some(stored.author),
            message: stored.message.clone(),
            mentions: stored.mentions.clone(),
            track_timestamp_s: stored.track_timestamp_s,
            react_count: stored.react_count,
            reply_count: visible_replies.len(),
            is_edited: stored.is_edited,
            is_pinned: stored.is_pinned,
            is_tombstoned: false,
            is_current_user_reacted: false,
            is_artist_reacted: false,
            is_muted: false,
            created_at: stored.created_at,
            updated_at: None,
            replies: Some(inlined),
        }
    }

    fn sorted_roots(&self, state: &State, subject: SubjectId, sort: SortMethod) -> Vec<CommentId> {
        let mut ids: Vec<CommentId> = state
            .threads
            .get(&subject)
            .map(|t| {
                t.iter()
                    .filter(|id| self.visible(state, *id))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        match sort {
            SortMethod::Newest => ids.sort_by_key(|id| std::cmp::Reverse(state.roots[id].seq)),
            SortMethod::Top => {
                ids.sort_by_key(|id| (std::cmp::Reverse(state.roots[id].react_count), state.roots[id].seq))
            }
            SortMethod::Timestamp => {
                ids.sort_by_key(|id| (state.roots[id].track_timestamp_s, state.roots[id].seq))
            }
        }
        // pinned comments float to the top whatever the sort
        ids.sort_by_key(|id| std::cmp::Reverse(state.roots[id].is_pinned));
        ids
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait(?Send)]
impl Backend for MockServer {
    async fn fetch_thread_page(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Comment>, Error> {
        self.thread_fetches.set(self.thread_fetches.get() + 1);
        self.checkpoint().await?;
        let state = self.state.borrow();
        Ok(self
            .sorted_roots(&state, subject, sort)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|id| self.render_root(&state, id))
            .collect())
    }

    async fn fetch_replies(
        &self,
        parent: CommentId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Reply>, Error> {
        self.checkpoint().await?;
        let state = self.state.borrow();
        let root = state
            .roots
            .get(&parent)
            .ok_or_else(|| Error::Validation(format!("no such comment {parent:?}")))?;
        Ok(root
            .replies
            .iter()
            .filter(|r| self.visible(&state, *r))
            .skip(offset)
            .take(limit)
            .map(|r| Self::render_reply(&state, *r))
            .collect())
    }

    async fn fetch_count(&self, subject: SubjectId) -> Result<usize, Error> {
        self.checkpoint().await?;
        let state = self.state.borrow();
        let mut count = 0;
        if let Some(roots) = state.threads.get(&subject) {
            for id in roots.iter().filter(|id| self.visible(&state, *id)) {
                count += 1;
                count += state.roots[id]
                    .replies
                    .iter()
                    .filter(|r| self.visible(&state, *r))
                    .count();
            }
        }
        Ok(count)
    }

    async fn fetch_notification_setting(&self, subject: SubjectId) -> Result<bool, Error> {
        self.checkpoint().await?;
        Ok(self
            .state
            .borrow()
            .notifications_muted
            .get(&subject)
            .copied()
            .unwrap_or(false))
    }

    async fn post_comment(&self, new: NewComment) -> Result<CommentId, Error> {
        self.checkpoint().await?;
        if new.body.is_empty() {
            return Err(Error::Validation(String::from("empty comment body")));
        }
        let id = if self.reassign_posted_ids.get() {
            CommentId(Uuid::new_v4())
        } else {
            new.id
        };
        let mut state = self.state.borrow_mut();
        state.seq += 1;
        let seq = state.seq;
        let created_at = Utc::now() + Duration::seconds(seq as i64);
        match new.parent_id {
            None => {
                state.roots.insert(
                    id,
                    StoredRoot {
                        subject: new.subject,
                        author: new.user_id,
                        message: new.body,
                        mentions: new.mentions,
                        track_timestamp_s: new.track_timestamp_s,
                        react_count: 0,
                        is_edited: false,
                        is_pinned: false,
                        created_at,
                        seq,
                        replies: Vec::new(),
                    },
                );
                state.threads.entry(new.subject).or_default().push(id);
            }
            Some(parent) => {
                if !state.roots.contains_key(&parent) {
                    return Err(Error::Validation(format!("no such parent {parent:?}")));
                }
                state.replies.insert(
                    id,
                    StoredReply {
                        parent,
                        author: new.user_id,
                        message: new.body,
                        mentions: new.mentions,
                        react_count: 0,
                        is_edited: false,
                        created_at,
                    },
                );
                state
                    .roots
                    .get_mut(&parent)
                    .unwrap_or_else(|| unreachable!("parent checked above"))
                    .replies
                    .push(id);
            }
        }
        Ok(id)
    }

    async fn edit_comment(
        &self,
        id: CommentId,
        body: String,
        mentions: Vec<UserId>,
    ) -> Result<(), Error> {
        self.checkpoint().await?;
        let mut state = self.state.borrow_mut();
        if let Some(r) = state.roots.get_mut(&id) {
            r.message = body;
            r.mentions = mentions;
            r.is_edited = true;
            Ok(())
        } else if let Some(r) = state.replies.get_mut(&id) {
            r.message = body;
            r.mentions = mentions;
            r.is_edited = true;
            Ok(())
        } else {
            Err(Error::Validation(format!("no such comment {id:?}")))
        }
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error> {
        self.checkpoint().await?;
        let mut state = self.state.borrow_mut();
        if let Some(root) = state.roots.remove(&id) {
            for r in &root.replies {
                state.replies.remove(r);
            }
            if let Some(thread) = state.threads.get_mut(&root.subject) {
                thread.retain(|t| *t != id);
            }
            Ok(())
        } else if let Some(reply) = state.replies.remove(&id) {
            if let Some(parent) = state.roots.get_mut(&reply.parent) {
                parent.replies.retain(|r| *r != id);
            }
            Ok(())
        } else {
            Err(Error::Validation(format!("no such comment {id:?}")))
        }
    }

    async fn react_comment(&self, id: CommentId, liked: bool) -> Result<(), Error> {
        self.checkpoint().await?;
        let delta = if liked { 1 } else { -1 };
        let mut state = self.state.borrow_mut();
        if let Some(r) = state.roots.get_mut(&id) {
            r.react_count += delta;
            Ok(())
        } else if let Some(r) = state.replies.get_mut(&id) {
            r.react_count += delta;
            Ok(())
        } else {
            Err(Error::Validation(format!("no such comment {id:?}")))
        }
    }

    async fn pin_comment(
        &self,
        _subject: SubjectId,
        id: CommentId,
        pin: bool,
    ) -> Result<(), Error> {
        self.checkpoint().await?;
        let mut state = self.state.borrow_mut();
        match state.roots.get_mut(&id) {
            Some(r) => {
                r.is_pinned = pin;
                Ok(())
            }
            None => Err(Error::Validation(format!("no such comment {id:?}"))),
        }
    }

    async fn report_comment(&self, id: CommentId) -> Result<(), Error> {
        self.checkpoint().await?;
        let mut state = self.state.borrow_mut();
        if !state.roots.contains_key(&id) && !state.replies.contains_key(&id) {
            return Err(Error::Validation(format!("no such comment {id:?}")));
        }
        state.reported.insert(id);
        Ok(())
    }

    async fn mute_user(&self, user: UserId, muted: bool) -> Result<(), Error> {
        self.checkpoint().await?;
        let mut state = self.state.borrow_mut();
        if muted {
            state.muted_users.insert(user);
        } else {
            state.muted_users.remove(&user);
        }
        Ok(())
    }

    async fn set_notification_setting(
        &self,
        target: NotificationTarget,
        muted: bool,
    ) -> Result<(), Error> {
        self.checkpoint().await?;
        match target {
            NotificationTarget::Subject(subject) => {
                self.state
                    .borrow_mut()
                    .notifications_muted
                    .insert(subject, muted);
                Ok(())
            }
            // per-comment settings are accepted but nothing reads them back
            NotificationTarget::Comment(_) => Ok(()),
        }
    }
}
