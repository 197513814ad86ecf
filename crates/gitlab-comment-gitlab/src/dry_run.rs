//! A store that prints notes instead of posting them.
//!
//! Used for `--dry-run` and when no token is available but
//! `--skip-no-token` is set.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use gitlab_comment_core::{
    CommentId, CommentPage, CommentStore, MergeRequestRef, StoreResult,
};

const PREFIX: &str = "[gitlab-comment][DRYRUN]";

pub struct DryRunStore {
    out: Mutex<Box<dyn Write + Send>>,
    silent: bool,
    sha1: String,
}

impl std::fmt::Debug for DryRunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DryRunStore")
            .field("silent", &self.silent)
            .field("sha1", &self.sha1)
            .finish_non_exhaustive()
    }
}

impl DryRunStore {
    /// Print to stderr.
    pub fn new(silent: bool, sha1: impl Into<String>) -> Self {
        Self::with_writer(Box::new(std::io::stderr()), silent, sha1)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, silent: bool, sha1: impl Into<String>) -> Self {
        Self {
            out: Mutex::new(out),
            silent,
            sha1: sha1.into(),
        }
    }

    fn print(&self, mr: &MergeRequestRef, body: &str) {
        if self.silent {
            return;
        }
        let mut msg = format!(
            "{PREFIX} Comment to {}/{} sha1:{}",
            mr.org, mr.repo, self.sha1
        );
        if mr.mr_number != 0 {
            msg.push_str(&format!(" MR:{}", mr.mr_number));
        }
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Output is best effort.
        writeln!(out, "{msg}\n{PREFIX} {body}").ok();
    }
}

#[async_trait]
impl CommentStore for DryRunStore {
    async fn list_comments(
        &self,
        _mr: &MergeRequestRef,
        _page: u32,
        _per_page: u32,
    ) -> StoreResult<CommentPage> {
        Ok(CommentPage::default())
    }

    /// Prints even without a merge request; ` MR:` is then left out.
    async fn create_comment(&self, mr: &MergeRequestRef, body: &str) -> StoreResult<CommentId> {
        self.print(mr, body);
        Ok(0)
    }

    async fn edit_comment(
        &self,
        mr: &MergeRequestRef,
        _id: CommentId,
        body: &str,
    ) -> StoreResult<()> {
        self.print(mr, body);
        Ok(())
    }

    async fn find_mr_for_commit(
        &self,
        _org: &str,
        _repo: &str,
        _sha: &str,
    ) -> StoreResult<Option<u64>> {
        Ok(None)
    }

    async fn hide_comment(&self, _mr: &MergeRequestRef, _id: CommentId) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitlab_comment_core::condition::ExprEngine;
    use gitlab_comment_core::{CommentEngine, Disposition, ExecCommentParams, PostAction};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_prints_note() {
        let buf = SharedBuf::default();
        let store = DryRunStore::with_writer(Box::new(buf.clone()), false, "abc123");
        let mr = MergeRequestRef::new("platform", "api", 9);
        store.create_comment(&mr, "hello").await.unwrap();
        assert_eq!(
            buf.text(),
            "[gitlab-comment][DRYRUN] Comment to platform/api sha1:abc123 MR:9\n\
             [gitlab-comment][DRYRUN] hello\n"
        );
    }

    #[tokio::test]
    async fn test_silent_prints_nothing() {
        let buf = SharedBuf::default();
        let store = DryRunStore::with_writer(Box::new(buf.clone()), true, "abc123");
        let mr = MergeRequestRef::new("platform", "api", 9);
        store.create_comment(&mr, "hello").await.unwrap();
        store.edit_comment(&mr, 1, "hello").await.unwrap();
        assert!(buf.text().is_empty());
    }

    #[tokio::test]
    async fn test_lists_nothing_and_finds_no_merge_request() {
        let store = DryRunStore::with_writer(Box::new(SharedBuf::default()), true, "abc");
        let page = store
            .list_comments(&MergeRequestRef::new("g", "p", 31), 1, 100)
            .await
            .unwrap();
        assert!(page.comments.is_empty());
        assert!(!page.has_next_page);
        assert_eq!(store.find_mr_for_commit("g", "p", "abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_engine_prints_note_without_merge_request() {
        let buf = SharedBuf::default();
        let store = DryRunStore::with_writer(Box::new(buf.clone()), false, "abc");
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions);
        let params = ExecCommentParams {
            exit_code: 1,
            org: "platform".to_string(),
            repo: "api".to_string(),
            sha1: "abc".to_string(),
            template: "failed".to_string(),
            ..Default::default()
        };

        let report = engine
            .post_exec(&[], &params, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(report.disposition, Disposition::Posted(PostAction::Created(0)));
        let text = buf.text();
        assert!(text.starts_with(
            "[gitlab-comment][DRYRUN] Comment to platform/api sha1:abc\n\
             [gitlab-comment][DRYRUN] failed"
        ));
        assert!(!text.contains(" MR:"));
    }
}
