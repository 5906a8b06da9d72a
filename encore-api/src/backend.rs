use async_trait::async_trait;

use crate::{Comment, CommentId, Error, Reply, SortMethod, SubjectId, UserId};

/// A root comment or reply about to be posted. The id is client-generated so
/// the UI can render the comment before the server confirms it.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub id: CommentId,
    pub subject: SubjectId,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
    pub body: String,
    pub mentions: Vec<UserId>,
    pub track_timestamp_s: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum NotificationTarget {
    Subject(SubjectId),
    Comment(CommentId),
}

/// The network boundary. The engine only ever interprets success/failure;
/// transport and wire encoding belong to the implementation behind this.
#[async_trait(?Send)]
pub trait Backend {
    async fn fetch_thread_page(
        &self,
        subject: SubjectId,
        sort: SortMethod,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Comment>, Error>;

    async fn fetch_replies(
        &self,
        parent: CommentId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Reply>, Error>;

    async fn fetch_count(&self, subject: SubjectId) -> Result<usize, Error>;

    async fn fetch_notification_setting(&self, subject: SubjectId) -> Result<bool, Error>;

    /// Returns the confirmed identity, usually the one from the request
    async fn post_comment(&self, new: NewComment) -> Result<CommentId, Error>;

    async fn edit_comment(
        &self,
        id: CommentId,
        body: String,
        mentions: Vec<UserId>,
    ) -> Result<(), Error>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), Error>;

    async fn react_comment(&self, id: CommentId, liked: bool) -> Result<(), Error>;

    async fn pin_comment(&self, subject: SubjectId, id: CommentId, pin: bool)
        -> Result<(), Error>;

    async fn report_comment(&self, id: CommentId) -> Result<(), Error>;

    async fn mute_user(&self, user: UserId, muted: bool) -> Result<(), Error>;

    async fn set_notification_setting(
        &self,
        target: NotificationTarget,
        muted: bool,
    ) -> Result<(), Error>;
}
