use std::fmt;

use crate::api;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadKind {
    Comments,
    Replies,
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadKind::Comments => write!(f, "comments"),
            LoadKind::Replies => write!(f, "replies"),
        }
    }
}

/// A list/entity fetch failed; cached state is left untouched and the caller
/// may retry
#[derive(Debug, thiserror::Error)]
#[error("error loading {kind}: {source}")]
pub struct LoadError {
    pub kind: LoadKind,
    #[source]
    pub source: api::Error,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    Post,
    Edit,
    React,
    Pin,
    Unpin,
    Delete,
    Report,
    MuteUser,
    SubjectNotificationSetting,
    CommentNotificationSetting,
}

impl MutationKind {
    fn as_gerund(&self) -> &'static str {
        match self {
            MutationKind::Post => "posting",
            MutationKind::Edit => "editing",
            MutationKind::React => "reacting to",
            MutationKind::Pin => "pinning",
            MutationKind::Unpin => "unpinning",
            MutationKind::Delete => "deleting",
            MutationKind::Report => "reporting",
            MutationKind::MuteUser => "muting",
            MutationKind::SubjectNotificationSetting
            | MutationKind::CommentNotificationSetting => "updating",
        }
    }
}

/// A write failed after its optimistic apply; by the time this is visible the
/// cache has already been rolled back
#[derive(Debug, thiserror::Error)]
#[error("error {} comment: {source}", kind.as_gerund())]
pub struct MutationError {
    pub kind: MutationKind,
    #[source]
    pub source: api::Error,
}

/// A user-visible failure notification, drained by the UI as a toast queue
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Notice {
    LoadFailed(LoadKind),
    MutationFailed(MutationKind),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::LoadFailed(kind) => {
                format!("There was an error loading {kind}. Please try again.")
            }
            Notice::MutationFailed(MutationKind::MuteUser) => {
                String::from("There was an error muting that user. Please try again.")
            }
            Notice::MutationFailed(MutationKind::SubjectNotificationSetting) => String::from(
                "There was an error updating the track comment notification setting. Please try again.",
            ),
            Notice::MutationFailed(MutationKind::CommentNotificationSetting) => String::from(
                "There was an error updating the comment notification setting. Please try again.",
            ),
            Notice::MutationFailed(kind) => format!(
                "There was an error {} that comment. Please try again",
                kind.as_gerund()
            ),
        }
    }
}
