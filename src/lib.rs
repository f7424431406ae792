//! Forgesync - git repository backup engine
//!
//! Forgesync discovers the repositories an account can see on a hosting
//! platform (GitHub, GitLab, Bitbucket, Forgejo, Azure DevOps, or a list of
//! raw URLs) and keeps a local clone of each one up to date, optionally with
//! wikis and issues. A [`SyncSession`] runs the whole batch with bounded
//! concurrency, rotating credentials and retrying git operations, then
//! reports a [`SyncSummary`].

pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod issues;
pub mod notification;
pub mod platform;
pub mod sync;
pub mod telemetry;
pub mod testing;
pub mod token;
pub mod types;

// Re-exports for convenience
pub use config::{Config, ForgesyncPaths};
pub use error::{ForgesyncError, Result};
pub use git::{GitCommand, GitExecutor, SystemGit};
pub use platform::{platform_client, PlatformClient};
pub use sync::{RepoSyncer, RetryPolicy, SyncSession, SyncStats, SyncSummary};
pub use token::TokenRotator;
pub use types::*;
