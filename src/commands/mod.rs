use std::{borrow::Cow, future::Future, sync::Arc};

use crate::ports::store;

pub mod cancel;
pub mod record_attendance;
pub mod reserve;

/// Default cap on commit attempts per operation.
const DEFAULT_COMMIT_ATTEMPTS: usize = 16;

/// Entry point for all booking operations.
///
/// The coordinator runs each operation as an optimistic transaction: read
/// versioned snapshots through the store port, apply the transition on the
/// copies, commit the whole write set, and start over from fresh reads
/// when another commit landed in between.
pub struct Coordinator<S> {
    store: Arc<S>,
    max_commit_attempts: usize,
}

impl<S> Coordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    /// Caps how often an operation retries a conflicting commit before it
    /// gives up with [`Error::Conflict`].
    #[must_use]
    pub fn max_commit_attempts(mut self, attempts: usize) -> Self {
        self.max_commit_attempts = attempts;
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("store port error: {0:?}")]
    Store(#[from] store::Error),

    /// The request is well formed but the booking rules refuse it.
    #[error("booking rejected: {0}")]
    Rejected(#[from] crate::domain::BookingError),

    /// Every commit attempt lost the race against concurrent writers.
    #[error("transaction conflicted through {attempts} attempt(s)")]
    Conflict { attempts: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),
}

/// Runs one operation as an optimistic transaction.
///
/// `operation` reads fresh snapshots, applies the transition, and commits.
/// A [`store::Error::VersionConflict`] means another commit landed between
/// the read and the write; the closure runs again against the state that
/// won. Every other error is final.
async fn run_transaction<F, Fut, T>(max_attempts: usize, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "transaction committed after retry");
                }
                return Ok(value);
            }
            Err(Error::Store(store::Error::VersionConflict { record_id })) => {
                tracing::warn!(attempt, %record_id, "commit lost the race, retrying");
            }
            Err(err) => return Err(err),
        }
    }

    tracing::error!(max_attempts, "transaction kept conflicting, giving up");
    Err(Error::Conflict {
        attempts: max_attempts,
    })
}
