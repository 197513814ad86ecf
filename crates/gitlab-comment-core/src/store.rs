//! Remote comment store abstraction.
//!
//! The store is the only persistence layer: everything a later run needs to
//! recognise its own notes travels inside the note bodies.
//!
//! Implementations:
//! - `GitLabClient` (crate `gitlab-comment-gitlab`): GitLab REST API v4
//! - `DryRunStore` (crate `gitlab-comment-gitlab`): prints instead of posting
//! - [`MemoryCommentStore`](crate::fakes::MemoryCommentStore): in-memory, for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Note identifier assigned by the store.
pub type CommentId = i64;

/// A note as returned by the store. Never constructed by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComment {
    pub id: CommentId,
    pub body: String,
}

/// The merge request a note belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeRequestRef {
    pub org: String,
    pub repo: String,
    pub mr_number: u64,
}

impl MergeRequestRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, mr_number: u64) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            mr_number,
        }
    }

    /// `org/repo`, GitLab's project path.
    pub fn project_path(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }
}

impl std::fmt::Display for MergeRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}!{}", self.org, self.repo, self.mr_number)
    }
}

/// One page of notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPage {
    pub comments: Vec<RemoteComment>,
    pub has_next_page: bool,
}

/// Remote note store.
///
/// Pages are 1-based. No ordering is guaranteed beyond "the store's native
/// order", which callers must treat as opaque.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Fetch one page of notes on a merge request.
    async fn list_comments(
        &self,
        mr: &MergeRequestRef,
        page: u32,
        per_page: u32,
    ) -> StoreResult<CommentPage>;

    /// Create a note and return its id.
    async fn create_comment(&self, mr: &MergeRequestRef, body: &str) -> StoreResult<CommentId>;

    /// Replace the body of an existing note.
    async fn edit_comment(&self, mr: &MergeRequestRef, id: CommentId, body: &str)
        -> StoreResult<()>;

    /// Merge request associated with a commit, if any.
    async fn find_mr_for_commit(&self, org: &str, repo: &str, sha: &str)
        -> StoreResult<Option<u64>>;

    /// Collapse a note. Stores without such a notion return `NotSupported`.
    async fn hide_comment(&self, mr: &MergeRequestRef, id: CommentId) -> StoreResult<()>;
}
