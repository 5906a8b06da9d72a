use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::{
    api::{Backend, SubjectId},
    CommentCache,
};

pub const COUNT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Scheduled refresh of a subject's aggregate comment count. Driven
/// explicitly by whoever observes the comment surface; the loop ends on its
/// own once nothing observes the subject anymore, so there is no ambient
/// timer to forget about.
#[derive(Clone, Copy, Debug)]
pub struct CountPoller {
    period: Duration,
}

impl CountPoller {
    pub fn new() -> CountPoller {
        CountPoller {
            period: COUNT_POLL_INTERVAL,
        }
    }

    pub fn with_period(period: Duration) -> CountPoller {
        CountPoller { period }
    }

    /// Refresh the count every period while the subject is observed. Fetch
    /// failures are logged and retried on the next tick; cached state is left
    /// untouched.
    pub async fn run<B: Backend>(&self, cache: &CommentCache<B>, subject: SubjectId) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !cache.is_observed(subject) {
                tracing::trace!(?subject, "subject no longer observed, stopping count poll");
                break;
            }
            if let Err(e) = cache.refresh_count(subject).await {
                tracing::warn!(?subject, error = %e, "comment count poll failed");
            }
        }
    }
}

impl Default for CountPoller {
    fn default() -> CountPoller {
        CountPoller::new()
    }
}
