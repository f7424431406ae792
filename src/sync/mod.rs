//! Repository sync engine
//!
//! A [`SyncSession`] fans a list of [`RepositoryDescriptor`]s out over
//! [`run_bounded`]; each worker runs [`RepoSyncer`] (clone-or-update wrapped in
//! [`retry`]) and reports into the session's [`SyncStats`].
//!
//! [`RepositoryDescriptor`]: crate::types::RepositoryDescriptor

mod concurrency;
mod operation;
mod retry;
mod session;
mod stats;

pub use concurrency::run_bounded;
pub use operation::{RepoSyncer, SyncCategory, SyncOutcome, SyncSettings};
pub use retry::{retry, RetryError, RetryPolicy};
pub use session::{IssueSync, SyncSession, SYNC_COMPLETED_EVENT};
pub use stats::{SyncStats, SyncSummary};
