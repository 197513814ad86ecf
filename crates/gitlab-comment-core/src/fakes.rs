//! In-memory fakes (testing only)
//!
//! `MemoryCommentStore` satisfies the [`CommentStore`] contract without any
//! network access and records every call so tests can assert on them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::store::{CommentId, CommentPage, CommentStore, MergeRequestRef, RemoteComment};

/// A write performed against the fake store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create {
        mr: MergeRequestRef,
        body: String,
    },
    Edit {
        mr: MergeRequestRef,
        id: CommentId,
        body: String,
    },
    Hide {
        mr: MergeRequestRef,
        id: CommentId,
    },
}

#[derive(Debug, Default)]
struct State {
    notes: HashMap<MergeRequestRef, Vec<RemoteComment>>,
    next_id: CommentId,
    calls: Vec<StoreCall>,
    pages_fetched: u32,
}

/// In-memory note store.
///
/// With `endless_pages` set, every listed page reports another page after it,
/// imitating a misbehaving server.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    state: Mutex<State>,
    commit_mrs: HashMap<String, u64>,
    endless_pages: bool,
    fail_writes: bool,
    fail_lookups: bool,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed notes on a merge request, keeping their order.
    pub fn with_notes(self, mr: &MergeRequestRef, notes: Vec<RemoteComment>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let max_id = notes.iter().map(|n| n.id).max().unwrap_or(0);
            state.next_id = state.next_id.max(max_id);
            state.notes.entry(mr.clone()).or_default().extend(notes);
        }
        self
    }

    /// Associate a commit SHA with a merge request number.
    pub fn with_commit_mr(mut self, sha: &str, mr_number: u64) -> Self {
        self.commit_mrs.insert(sha.to_string(), mr_number);
        self
    }

    pub fn with_endless_pages(mut self) -> Self {
        self.endless_pages = true;
        self
    }

    /// Make every create/edit/hide fail with a transport error.
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Make every commit lookup fail with a transport error.
    pub fn with_failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.state.lock().unwrap().pages_fetched
    }

    pub fn notes(&self, mr: &MergeRequestRef) -> Vec<RemoteComment> {
        self.state
            .lock()
            .unwrap()
            .notes
            .get(mr)
            .cloned()
            .unwrap_or_default()
    }

    /// Writes need a merge request, as on GitLab.
    fn check_writable(&self, mr: &MergeRequestRef) -> StoreResult<()> {
        if mr.mr_number == 0 {
            return Err(StoreError::NotSupported(
                "commenting without a merge request".to_string(),
            ));
        }
        if self.fail_writes {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn list_comments(
        &self,
        mr: &MergeRequestRef,
        page: u32,
        per_page: u32,
    ) -> StoreResult<CommentPage> {
        let mut state = self.state.lock().unwrap();
        state.pages_fetched += 1;
        let notes = state.notes.get(mr).cloned().unwrap_or_default();
        let per_page = per_page.max(1) as usize;
        let start = (page.saturating_sub(1) as usize) * per_page;
        let comments: Vec<RemoteComment> =
            notes.iter().skip(start).take(per_page).cloned().collect();
        let has_next_page = self.endless_pages || start + per_page < notes.len();
        Ok(CommentPage {
            comments,
            has_next_page,
        })
    }

    async fn create_comment(&self, mr: &MergeRequestRef, body: &str) -> StoreResult<CommentId> {
        self.check_writable(mr)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state
            .notes
            .entry(mr.clone())
            .or_default()
            .push(RemoteComment {
                id,
                body: body.to_string(),
            });
        state.calls.push(StoreCall::Create {
            mr: mr.clone(),
            body: body.to_string(),
        });
        Ok(id)
    }

    async fn edit_comment(
        &self,
        mr: &MergeRequestRef,
        id: CommentId,
        body: &str,
    ) -> StoreResult<()> {
        self.check_writable(mr)?;
        let mut state = self.state.lock().unwrap();
        let note = state
            .notes
            .get_mut(mr)
            .and_then(|notes| notes.iter_mut().find(|n| n.id == id))
            .ok_or_else(|| StoreError::Api {
                status: 404,
                endpoint: format!("{mr}#note_{id}"),
                message: "Resource not found".to_string(),
            })?;
        note.body = body.to_string();
        state.calls.push(StoreCall::Edit {
            mr: mr.clone(),
            id,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn find_mr_for_commit(
        &self,
        _org: &str,
        _repo: &str,
        sha: &str,
    ) -> StoreResult<Option<u64>> {
        if self.fail_lookups {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        Ok(self.commit_mrs.get(sha).copied())
    }

    async fn hide_comment(&self, mr: &MergeRequestRef, id: CommentId) -> StoreResult<()> {
        self.check_writable(mr)?;
        self.state.lock().unwrap().calls.push(StoreCall::Hide {
            mr: mr.clone(),
            id,
        });
        Ok(())
    }
}
