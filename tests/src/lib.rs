use std::rc::Rc;

use encore_client::{
    api::{SubjectId, UserId, Uuid},
    CommentCache,
};
use encore_mock_server::MockServer;

/// Let every spawned local task run up to its next suspension point
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn user() -> UserId {
    UserId(Uuid::new_v4())
}

pub fn subject() -> SubjectId {
    SubjectId(Uuid::new_v4())
}

/// A fresh cache over a fresh mock server, wrapped in Rc so tests can drive
/// concurrent mutations through spawn_local
pub fn new_cache(owner: UserId) -> Rc<CommentCache<MockServer>> {
    init_logging();
    Rc::new(CommentCache::new(owner, MockServer::new()))
}

pub fn new_cache_with_page_sizes(
    owner: UserId,
    page_size: usize,
    reply_page_size: usize,
) -> Rc<CommentCache<MockServer>> {
    init_logging();
    Rc::new(CommentCache::with_page_sizes(
        owner,
        MockServer::new(),
        page_size,
        reply_page_size,
    ))
}
