use std::future::Future;

use chrono::Utc;

use crate::{
    api::{
        self, Backend, Comment, CommentId, CommentOrReply, NewComment, NotificationTarget, Reply,
        SortMethod, SubjectId, UserId,
    },
    CommentCache, MutationError, MutationKind, Notice, ThreadKey,
};

#[derive(Clone, Debug)]
pub struct PostCommentArgs {
    pub subject: SubjectId,
    /// The sort the user is currently viewing; optimistic inserts land in it
    pub sort: SortMethod,
    pub parent_id: Option<CommentId>,
    pub body: String,
    pub mentions: Vec<UserId>,
    pub track_timestamp_s: Option<u32>,
}

impl<B: Backend> CommentCache<B> {
    /// One optimistic transaction: take the gate, apply local changes, run
    /// the network call, and on failure revert exactly what apply touched
    /// (never a blanket overwrite) and queue a user-visible notice.
    async fn transact<Snap, T>(
        &self,
        kind: MutationKind,
        snapshot: Snap,
        apply: impl FnOnce(&Self),
        call: impl Future<Output = Result<T, api::Error>>,
        revert: impl FnOnce(&Self, Snap),
    ) -> Result<T, MutationError> {
        let _guard = self.gate.enter();
        apply(self);
        tracing::debug!(?kind, "optimistic apply");
        match call.await {
            Ok(v) => {
                tracing::trace!(?kind, "mutation confirmed");
                Ok(v)
            }
            Err(source) => {
                revert(self, snapshot);
                self.push_notice(Notice::MutationFailed(kind));
                tracing::warn!(?kind, error = %source, "mutation failed, rolled back");
                Err(MutationError { kind, source })
            }
        }
    }

    /// Post a root comment or reply. The identity is generated client-side so
    /// the comment renders before the server confirms; the confirmed identity
    /// is returned (and reconciled into the cache if the server disagrees).
    pub async fn post_comment(&self, args: PostCommentArgs) -> Result<CommentId, MutationError> {
        let provisional = CommentId::generate();
        let key = (args.subject, args.sort);
        let now = Utc::now();
        let new = NewComment {
            id: provisional,
            subject: args.subject,
            user_id: self.owner(),
            parent_id: args.parent_id,
            body: args.body.clone(),
            mentions: args.mentions.clone(),
            track_timestamp_s: args.track_timestamp_s,
        };
        let confirmed = match args.parent_id {
            None => {
                let comment = Comment {
                    id: provisional,
                    user_id: Some(self.owner()),
                    message: args.body,
                    mentions: args.mentions,
                    track_timestamp_s: args.track_timestamp_s,
                    react_count: 0,
                    reply_count: 0,
                    is_edited: false,
                    is_pinned: false,
                    is_tombstoned: false,
                    is_current_user_reacted: false,
                    is_artist_reacted: false,
                    is_muted: false,
                    created_at: now,
                    updated_at: None,
                    replies: None,
                };
                self.transact(
                    MutationKind::Post,
                    (),
                    |cache| {
                        cache.entities.set(comment.clone());
                        cache.threads.prepend(key, provisional);
                        cache.counts.adjust(args.subject, 1);
                    },
                    self.backend.post_comment(new),
                    |cache, ()| {
                        cache.entities.remove(&provisional);
                        cache.counts.adjust(args.subject, -1);
                        // precise removal from a multi-page cursor list is
                        // not always reconstructible, reload instead
                        cache.threads.clear(&key);
                    },
                )
                .await?
            }
            Some(parent) => {
                let reply = Reply {
                    id: provisional,
                    parent_id: parent,
                    user_id: self.owner(),
                    message: args.body,
                    mentions: args.mentions,
                    react_count: 0,
                    is_edited: false,
                    is_current_user_reacted: false,
                    is_artist_reacted: false,
                    is_muted: false,
                    created_at: now,
                    updated_at: None,
                };
                self.transact(
                    MutationKind::Post,
                    (),
                    |cache| {
                        cache.entities.set(reply.clone());
                        cache.entities.update(&parent, |mut e| {
                            if let Some(c) = e.as_comment_mut() {
                                c.reply_count += 1;
                                c.replies.get_or_insert_with(Vec::new).push(reply.clone());
                            }
                            e
                        });
                        cache.counts.adjust(args.subject, 1);
                    },
                    self.backend.post_comment(new),
                    |cache, ()| {
                        cache.entities.remove(&provisional);
                        cache.entities.update(&parent, |mut e| {
                            if let Some(c) = e.as_comment_mut() {
                                c.reply_count = c.reply_count.saturating_sub(1);
                                if let Some(replies) = c.replies.as_mut() {
                                    replies.retain(|r| r.id != provisional);
                                }
                            }
                            e
                        });
                        cache.counts.adjust(args.subject, -1);
                    },
                )
                .await?
            }
        };
        if confirmed != provisional {
            self.reconcile_posted_id(key, args.parent_id, provisional, confirmed);
        }
        Ok(confirmed)
    }

    /// The server assigned a different identity than the provisional one:
    /// rename the entity and rewrite every index reference so the two
    /// identities unify transparently.
    fn reconcile_posted_id(
        &self,
        key: ThreadKey,
        parent: Option<CommentId>,
        provisional: CommentId,
        confirmed: CommentId,
    ) {
        tracing::debug!(?provisional, ?confirmed, "reconciling server-assigned comment id");
        if let Some(mut entity) = self.entities.get(&provisional) {
            match &mut entity {
                CommentOrReply::Comment(c) => c.id = confirmed,
                CommentOrReply::Reply(r) => r.id = confirmed,
            }
            self.entities.remove(&provisional);
            self.entities.set(entity);
        }
        match parent {
            None => self.threads.replace_id(&key, provisional, confirmed),
            Some(parent) => {
                self.entities.update(&parent, |mut e| {
                    if let Some(c) = e.as_comment_mut() {
                        if let Some(replies) = c.replies.as_mut() {
                            for r in replies.iter_mut() {
                                if r.id == provisional {
                                    r.id = confirmed;
                                }
                            }
                        }
                    }
                    e
                });
            }
        }
    }

    /// Patch message/mentions in place; rollback restores only those fields
    pub async fn edit_comment(
        &self,
        id: CommentId,
        message: String,
        mentions: Vec<UserId>,
    ) -> Result<(), MutationError> {
        let snapshot = self
            .entities
            .get(&id)
            .map(|e| (e.message().to_owned(), e.mentions().to_vec(), e.is_edited()));
        let applied_message = message.clone();
        let applied_mentions = mentions.clone();
        self.transact(
            MutationKind::Edit,
            snapshot,
            |cache| {
                cache.entities.update(&id, |mut e| {
                    e.set_message(applied_message, applied_mentions, true);
                    e
                });
            },
            self.backend.edit_comment(id, message, mentions),
            |cache, snapshot| {
                if let Some((message, mentions, edited)) = snapshot {
                    // only the edited fields: a concurrent reaction may have
                    // landed in between
                    cache.entities.update(&id, |mut e| {
                        e.set_message(message, mentions, edited);
                        e
                    });
                }
            },
        )
        .await
    }

    /// Like or unlike. Rollback restores only the reaction fields so a
    /// concurrent edit on the same comment survives the revert.
    pub async fn react_comment(
        &self,
        id: CommentId,
        liked: bool,
        is_subject_owner: bool,
    ) -> Result<(), MutationError> {
        let snapshot = self.entities.get(&id).map(|e| {
            (
                e.react_count(),
                e.is_current_user_reacted(),
                e.is_artist_reacted(),
            )
        });
        self.transact(
            MutationKind::React,
            snapshot,
            |cache| {
                cache.entities.update(&id, |mut e| {
                    let count = e.react_count() + if liked { 1 } else { -1 };
                    e.set_react(count, liked, is_subject_owner && liked);
                    e
                });
            },
            self.backend.react_comment(id, liked),
            |cache, snapshot| {
                if let Some((count, current_user, artist)) = snapshot {
                    cache.entities.update(&id, |mut e| {
                        e.set_react(count, current_user, artist);
                        e
                    });
                }
            },
        )
        .await
    }

    /// Pinning relocates the identity to the front of page 0 of the current
    /// sort. Moving ids across pages is hard to invert, so failure reloads
    /// the whole list.
    pub async fn pin_comment(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        id: CommentId,
        pin: bool,
    ) -> Result<(), MutationError> {
        let key = (subject, sort);
        let previous_pinned = self.pinned.borrow().get(&subject).copied().flatten();
        self.transact(
            if pin {
                MutationKind::Pin
            } else {
                MutationKind::Unpin
            },
            previous_pinned,
            |cache| {
                if pin {
                    cache.threads.move_to_front(key, id);
                    if let Some(previous) = previous_pinned {
                        if previous != id {
                            cache.entities.update(&previous, |mut e| {
                                if let Some(c) = e.as_comment_mut() {
                                    c.is_pinned = false;
                                }
                                e
                            });
                        }
                    }
                }
                cache.entities.update(&id, |mut e| {
                    if let Some(c) = e.as_comment_mut() {
                        c.is_pinned = pin;
                    }
                    e
                });
                cache
                    .pinned
                    .borrow_mut()
                    .insert(subject, if pin { Some(id) } else { None });
            },
            self.backend.pin_comment(subject, id, pin),
            |cache, previous| {
                cache.pinned.borrow_mut().insert(subject, previous);
                cache.threads.clear(&key);
            },
        )
        .await
    }

    /// Delete a comment. Replies are filtered out of their parent; root
    /// comments with replies are tombstoned in place to preserve thread
    /// structure; root comments without replies are removed outright.
    pub async fn delete_comment(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        id: CommentId,
    ) -> Result<(), MutationError> {
        let key = (subject, sort);
        let Some(entity) = self.entities.get(&id) else {
            tracing::warn!(?id, "delete for comment not in cache");
            return Ok(());
        };
        match entity {
            CommentOrReply::Reply(reply) => {
                let parent = reply.parent_id;
                self.transact(
                    MutationKind::Delete,
                    (),
                    |cache| {
                        cache.entities.update(&parent, |mut e| {
                            if let Some(c) = e.as_comment_mut() {
                                c.reply_count = c.reply_count.saturating_sub(1);
                                if let Some(replies) = c.replies.as_mut() {
                                    replies.retain(|r| r.id != id);
                                }
                            }
                            e
                        });
                        cache.counts.adjust(subject, -1);
                    },
                    self.backend.delete_comment(id),
                    |cache, ()| {
                        cache.counts.adjust(subject, 1);
                        cache.invalidate_replies_of(&parent);
                        cache.threads.clear(&key);
                    },
                )
                .await?;
                // safe to evict once it is out of the reply list
                self.entities.remove(&id);
                Ok(())
            }
            CommentOrReply::Comment(comment) if comment.reply_count > 0 => {
                self.transact(
                    MutationKind::Delete,
                    comment,
                    |cache| {
                        cache.entities.update(&id, |mut e| {
                            if let Some(c) = e.as_comment_mut() {
                                c.tombstone();
                            }
                            e
                        });
                        cache.counts.adjust(subject, -1);
                    },
                    self.backend.delete_comment(id),
                    |cache, snapshot| {
                        cache.counts.adjust(subject, 1);
                        cache.entities.set(snapshot);
                        cache.threads.clear(&key);
                    },
                )
                .await
                // the tombstone stays in both the index and the entity store
            }
            CommentOrReply::Comment(_) => {
                self.transact(
                    MutationKind::Delete,
                    (),
                    |cache| {
                        cache.threads.remove(&key, id);
                        cache.counts.adjust(subject, -1);
                    },
                    self.backend.delete_comment(id),
                    |cache, ()| {
                        cache.counts.adjust(subject, 1);
                        cache.threads.clear(&key);
                    },
                )
                .await?;
                self.entities.remove(&id);
                Ok(())
            }
        }
    }

    /// Report: same structural removal as delete (no tombstone), different
    /// backend action
    pub async fn report_comment(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        id: CommentId,
    ) -> Result<(), MutationError> {
        let key = (subject, sort);
        let Some(entity) = self.entities.get(&id) else {
            tracing::warn!(?id, "report for comment not in cache");
            return Ok(());
        };
        let parent = entity.as_reply().map(|r| r.parent_id);
        self.transact(
            MutationKind::Report,
            entity,
            |cache| {
                match parent {
                    Some(parent) => {
                        cache.entities.update(&parent, |mut e| {
                            if let Some(c) = e.as_comment_mut() {
                                c.reply_count = c.reply_count.saturating_sub(1);
                                if let Some(replies) = c.replies.as_mut() {
                                    replies.retain(|r| r.id != id);
                                }
                            }
                            e
                        });
                    }
                    None => cache.threads.remove(&key, id),
                }
                cache.entities.remove(&id);
                cache.counts.adjust(subject, -1);
            },
            self.backend.report_comment(id),
            |cache, snapshot| {
                cache.counts.adjust(subject, 1);
                cache.entities.set(snapshot);
                if let Some(parent) = parent {
                    cache.invalidate_replies_of(&parent);
                }
                cache.threads.clear(&key);
            },
        )
        .await
    }

    /// Mute a user: every loaded comment and reply they authored disappears
    /// from the rendered list. The aggregate count is refetched afterwards
    /// rather than guessed, because not all their replies may be loaded.
    pub async fn mute_user(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        user: UserId,
        mute: bool,
    ) -> Result<(), MutationError> {
        let key = (subject, sort);
        let res = self
            .transact(
                MutationKind::MuteUser,
                (),
                |cache| {
                    if mute {
                        cache.scrub_user_from_thread(&key, user);
                    }
                },
                self.backend.mute_user(user, mute),
                |cache, ()| {
                    cache.threads.clear(&key);
                },
            )
            .await;
        if !mute && res.is_ok() {
            // the unmuted user's comments resurface on the next fetch
            self.threads.clear(&key);
        }
        if let Err(e) = self.refresh_count(subject).await {
            tracing::warn!(?subject, error = %e, "count refresh after mute failed");
        }
        res
    }

    fn scrub_user_from_thread(&self, key: &ThreadKey, user: UserId) {
        for id in self.threads.ids(key) {
            let Some(CommentOrReply::Comment(root)) = self.entities.get(&id) else {
                continue;
            };
            let removed_replies: Vec<CommentId> = root
                .loaded_replies()
                .iter()
                .filter(|r| r.user_id == user)
                .map(|r| r.id)
                .collect();
            if !removed_replies.is_empty() {
                self.entities.update(&id, |mut e| {
                    if let Some(c) = e.as_comment_mut() {
                        if let Some(replies) = c.replies.as_mut() {
                            replies.retain(|r| r.user_id != user);
                        }
                        // only discount the replies actually loaded; the rest
                        // are the server's to subtract
                        c.reply_count = c.reply_count.saturating_sub(removed_replies.len());
                    }
                    e
                });
                for reply_id in &removed_replies {
                    self.entities.remove(reply_id);
                }
            }
            if root.user_id == Some(user) {
                self.threads.remove(key, id);
                self.entities.remove(&id);
            }
        }
    }

    /// Subject-level comment notification toggle
    pub async fn set_subject_notification_setting(
        &self,
        subject: SubjectId,
        muted: bool,
    ) -> Result<(), MutationError> {
        let previous = self
            .subject_notifications_muted
            .borrow()
            .get(&subject)
            .copied();
        self.transact(
            MutationKind::SubjectNotificationSetting,
            previous,
            |cache| {
                cache
                    .subject_notifications_muted
                    .borrow_mut()
                    .insert(subject, muted);
            },
            self.backend
                .set_notification_setting(NotificationTarget::Subject(subject), muted),
            |cache, previous| match previous {
                Some(p) => {
                    cache
                        .subject_notifications_muted
                        .borrow_mut()
                        .insert(subject, p);
                }
                None => {
                    // unknown before the toggle: drop it so the next read
                    // refetches from the server
                    cache
                        .subject_notifications_muted
                        .borrow_mut()
                        .remove(&subject);
                }
            },
        )
        .await
    }

    /// Comment-level notification toggle
    pub async fn set_comment_notification_setting(
        &self,
        id: CommentId,
        muted: bool,
    ) -> Result<(), MutationError> {
        let snapshot = self.entities.get(&id).map(|e| match &e {
            CommentOrReply::Comment(c) => c.is_muted,
            CommentOrReply::Reply(r) => r.is_muted,
        });
        self.transact(
            MutationKind::CommentNotificationSetting,
            snapshot,
            |cache| {
                cache.entities.update(&id, |mut e| {
                    e.set_notifications_muted(muted);
                    e
                });
            },
            self.backend
                .set_notification_setting(NotificationTarget::Comment(id), muted),
            |cache, snapshot| {
                if let Some(previous) = snapshot {
                    cache.entities.update(&id, |mut e| {
                        e.set_notifications_muted(previous);
                        e
                    });
                }
            },
        )
        .await
    }
}
