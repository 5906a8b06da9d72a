mod cache;
pub use cache::{CommentCache, PageLoad, DEFAULT_PAGE_SIZE, DEFAULT_REPLY_PAGE_SIZE};

mod counter;
pub use counter::{CommentCount, CounterStore};

mod entity;
pub use entity::EntityStore;

mod gate;
pub use gate::{GateGuard, SyncGate};

mod mutation;
pub use mutation::PostCommentArgs;

mod notice;
pub use notice::{LoadError, LoadKind, MutationError, MutationKind, Notice};

mod poll;
pub use poll::{CountPoller, COUNT_POLL_INTERVAL};

mod reply;
pub use reply::ReplyIndex;

mod thread;
pub use thread::{ThreadIndex, ThreadKey};

pub mod api {
    pub use encore_api::*;
}

pub mod prelude {
    pub use crate::api::Backend;
}
