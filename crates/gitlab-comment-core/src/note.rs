//! A rendered note on its way to the store.

use serde_json::{Map, Value};

use crate::store::{CommentId, MergeRequestRef};

/// Rendered comment plus everything needed to post it.
///
/// `note_id` is set at most once, by the update resolver, when an existing
/// note should be edited instead of a new one created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub org: String,
    pub repo: String,
    pub mr_number: u64,
    pub body: String,
    /// Sent instead of `body` when `body` exceeds the size ceiling
    pub body_for_too_long: String,
    pub sha1: String,
    pub vars: Map<String, Value>,
    pub template_key: String,
    pub note_id: Option<CommentId>,
}

impl Note {
    pub fn merge_request(&self) -> MergeRequestRef {
        MergeRequestRef::new(&self.org, &self.repo, self.mr_number)
    }
}
