use crate::{CommentId, Time, UserId};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,

    /// None once the comment has been tombstoned
    pub user_id: Option<UserId>,
    pub message: String,
    pub mentions: Vec<UserId>,

    /// Seconds into the subject track this comment is anchored at, if any
    pub track_timestamp_s: Option<u32>,

    pub react_count: i64,
    pub reply_count: usize,

    pub is_edited: bool,
    pub is_pinned: bool,
    pub is_tombstoned: bool,
    pub is_current_user_reacted: bool,
    pub is_artist_reacted: bool,

    /// Comment-level notification setting for the current user
    pub is_muted: bool,

    pub created_at: Time,
    pub updated_at: Option<Time>,

    /// None = replies not fetched yet, Some(vec![]) = fetched and empty
    pub replies: Option<Vec<Reply>>,
}

impl Comment {
    /// Clear author and message but keep identity and thread structure
    pub fn tombstone(&mut self) {
        self.user_id = None;
        self.message = String::new();
        self.mentions = Vec::new();
        self.is_tombstoned = true;
    }

    pub fn loaded_replies(&self) -> &[Reply] {
        self.replies.as_deref().unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Reply {
    pub id: CommentId,
    pub parent_id: CommentId,

    pub user_id: UserId,
    pub message: String,
    pub mentions: Vec<UserId>,

    pub react_count: i64,

    pub is_edited: bool,
    pub is_current_user_reacted: bool,
    pub is_artist_reacted: bool,
    pub is_muted: bool,

    pub created_at: Time,
    pub updated_at: Option<Time>,
}

/// What the per-entity cache stores: either a root comment or a reply
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum CommentOrReply {
    Comment(Comment),
    Reply(Reply),
}

impl CommentOrReply {
    pub fn id(&self) -> CommentId {
        match self {
            CommentOrReply::Comment(c) => c.id,
            CommentOrReply::Reply(r) => r.id,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            CommentOrReply::Comment(c) => c.user_id,
            CommentOrReply::Reply(r) => Some(r.user_id),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CommentOrReply::Comment(c) => &c.message,
            CommentOrReply::Reply(r) => &r.message,
        }
    }

    pub fn react_count(&self) -> i64 {
        match self {
            CommentOrReply::Comment(c) => c.react_count,
            CommentOrReply::Reply(r) => r.react_count,
        }
    }

    pub fn is_edited(&self) -> bool {
        match self {
            CommentOrReply::Comment(c) => c.is_edited,
            CommentOrReply::Reply(r) => r.is_edited,
        }
    }

    pub fn is_current_user_reacted(&self) -> bool {
        match self {
            CommentOrReply::Comment(c) => c.is_current_user_reacted,
            CommentOrReply::Reply(r) => r.is_current_user_reacted,
        }
    }

    pub fn is_artist_reacted(&self) -> bool {
        match self {
            CommentOrReply::Comment(c) => c.is_artist_reacted,
            CommentOrReply::Reply(r) => r.is_artist_reacted,
        }
    }

    pub fn set_react(&mut self, count: i64, current_user: bool, artist: bool) {
        match self {
            CommentOrReply::Comment(c) => {
                c.react_count = count;
                c.is_current_user_reacted = current_user;
                c.is_artist_reacted = artist;
            }
            CommentOrReply::Reply(r) => {
                r.react_count = count;
                r.is_current_user_reacted = current_user;
                r.is_artist_reacted = artist;
            }
        }
    }

    pub fn mentions(&self) -> &[UserId] {
        match self {
            CommentOrReply::Comment(c) => &c.mentions,
            CommentOrReply::Reply(r) => &r.mentions,
        }
    }

    pub fn set_message(&mut self, message: String, mentions: Vec<UserId>, edited: bool) {
        match self {
            CommentOrReply::Comment(c) => {
                c.message = message;
                c.mentions = mentions;
                c.is_edited = edited;
            }
            CommentOrReply::Reply(r) => {
                r.message = message;
                r.mentions = mentions;
                r.is_edited = edited;
            }
        }
    }

    pub fn set_notifications_muted(&mut self, muted: bool) {
        match self {
            CommentOrReply::Comment(c) => c.is_muted = muted,
            CommentOrReply::Reply(r) => r.is_muted = muted,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            CommentOrReply::Comment(c) => Some(c),
            CommentOrReply::Reply(_) => None,
        }
    }

    pub fn as_comment_mut(&mut self) -> Option<&mut Comment> {
        match self {
            CommentOrReply::Comment(c) => Some(c),
            CommentOrReply::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<&Reply> {
        match self {
            CommentOrReply::Comment(_) => None,
            CommentOrReply::Reply(r) => Some(r),
        }
    }
}

impl From<Comment> for CommentOrReply {
    fn from(c: Comment) -> CommentOrReply {
        CommentOrReply::Comment(c)
    }
}

impl From<Reply> for CommentOrReply {
    fn from(r: Reply) -> CommentOrReply {
        CommentOrReply::Reply(r)
    }
}
