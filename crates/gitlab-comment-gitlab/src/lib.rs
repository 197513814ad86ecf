//! GitLab-backed [`CommentStore`](gitlab_comment_core::CommentStore)
//! implementations.

pub mod client;
pub mod dry_run;
pub mod error;

pub use client::{GitLabClient, GitLabClientConfig, GitLabMergeRequest, GitLabNote, DEFAULT_BASE_URL};
pub use dry_run::DryRunStore;
pub use error::{ClientError, Result};
