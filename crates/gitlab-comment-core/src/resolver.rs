//! Update-target resolution: decide which existing note, if any, a new
//! rendering should overwrite.
//!
//! Every note on the merge request is fetched, its embedded metadata
//! extracted, and the update condition replayed against a
//! [`JudgmentParams`] record. The first note that matches (in the configured
//! [`ScanOrder`]) wins and scanning stops. The hide variant collects every
//! match instead.

use serde_json::{Map, Value};

use crate::condition::{params_tree, ConditionEngine, Program};
use crate::config::ScanOrder;
use crate::diagnostics::Diagnostic;
use crate::error::{Result, StoreResult};
use crate::metadata;
use crate::params::{CommentView, CommitView, JudgmentParams};
use crate::store::{CommentId, CommentStore, MergeRequestRef, RemoteComment};

/// Notes requested per page.
pub const LIST_PER_PAGE: u32 = 100;

/// Hard ceiling on pages fetched for one merge request.
pub const MAX_PAGES: u32 = 100;

/// Fetch every note on `mr`, page by page, stopping at [`MAX_PAGES`].
///
/// Hitting the ceiling is not an error: the notes gathered so far are
/// returned and a [`Diagnostic::PaginationTruncated`] is recorded.
pub async fn list_all_comments(
    store: &dyn CommentStore,
    mr: &MergeRequestRef,
    diagnostics: &mut Vec<Diagnostic>,
) -> StoreResult<Vec<RemoteComment>> {
    let mut all = Vec::new();
    for page in 1..=MAX_PAGES {
        let batch = store.list_comments(mr, page, LIST_PER_PAGE).await?;
        all.extend(batch.comments);
        if !batch.has_next_page {
            diagnostics.push(Diagnostic::CommentsListed {
                mr: mr.clone(),
                count: all.len(),
            });
            return Ok(all);
        }
    }
    diagnostics.push(Diagnostic::PaginationTruncated {
        mr: mr.clone(),
        max_pages: MAX_PAGES,
    });
    Ok(all)
}

/// Identity a condition is judged against, besides the note itself.
#[derive(Debug, Clone, Copy)]
pub struct JudgmentContext<'a> {
    pub mr: &'a MergeRequestRef,
    pub sha1: &'a str,
    pub vars: &'a Map<String, Value>,
    pub hide_key: Option<&'a str>,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub target: Option<CommentId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves update and hide targets against a comment store.
pub struct UpdateResolver<'a> {
    store: &'a dyn CommentStore,
    conditions: &'a dyn ConditionEngine,
    order: ScanOrder,
}

impl<'a> UpdateResolver<'a> {
    pub fn new(
        store: &'a dyn CommentStore,
        conditions: &'a dyn ConditionEngine,
        order: ScanOrder,
    ) -> Self {
        Self {
            store,
            conditions,
            order,
        }
    }

    /// Find the note to overwrite, if any.
    ///
    /// An empty condition or a missing merge request number skips resolution
    /// entirely: the caller creates a new note. A condition that does not
    /// compile aborts; a condition that fails on one note skips that note.
    pub async fn resolve_update_target(
        &self,
        condition: &str,
        ctx: JudgmentContext<'_>,
    ) -> Result<Resolution> {
        if condition.is_empty() || ctx.mr.mr_number == 0 {
            return Ok(Resolution::default());
        }

        let program = self.conditions.compile(condition)?;
        let mut diagnostics = Vec::new();
        let comments = list_all_comments(self.store, ctx.mr, &mut diagnostics).await?;

        let mut candidates: Box<dyn Iterator<Item = &RemoteComment>> = match self.order {
            ScanOrder::FirstMatch => Box::new(comments.iter()),
            ScanOrder::LastMatch => Box::new(comments.iter().rev()),
        };
        let target = candidates
            .find(|comment| judge(program.as_ref(), condition, comment, &ctx, &mut diagnostics))
            .map(|comment| comment.id);

        if let Some(comment_id) = target {
            diagnostics.push(Diagnostic::UpdateTargetSelected { comment_id });
        }
        Ok(Resolution {
            target,
            diagnostics,
        })
    }

    /// Every note matching `condition`, in store order.
    pub async fn matching_comments(
        &self,
        condition: &str,
        ctx: JudgmentContext<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<CommentId>> {
        if condition.is_empty() {
            return Ok(Vec::new());
        }
        let program = self.conditions.compile(condition)?;
        let comments = list_all_comments(self.store, ctx.mr, diagnostics).await?;
        Ok(comments
            .iter()
            .filter(|comment| judge(program.as_ref(), condition, comment, &ctx, diagnostics))
            .map(|comment| comment.id)
            .collect())
    }
}

/// Judge one note. Evaluation failures count as "no match".
fn judge(
    program: &dyn Program,
    condition: &str,
    comment: &RemoteComment,
    ctx: &JudgmentContext<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let meta = metadata::extract(&comment.body);
    let params = JudgmentParams {
        comment: CommentView {
            body: &comment.body,
            meta: &meta.data,
            has_meta: meta.has_meta,
        },
        commit: CommitView {
            org: &ctx.mr.org,
            repo: &ctx.mr.repo,
            mr_number: ctx.mr.mr_number,
            sha1: ctx.sha1,
        },
        vars: ctx.vars,
        hide_key: ctx.hide_key,
    };

    match params_tree(&params).and_then(|tree| program.run(&tree)) {
        Ok(matched) => {
            diagnostics.push(Diagnostic::CandidateJudged {
                comment_id: comment.id,
                condition: condition.to_string(),
                matched,
            });
            matched
        }
        Err(err) => {
            diagnostics.push(Diagnostic::CandidateSkipped {
                comment_id: comment.id,
                condition: condition.to_string(),
                error: err.to_string(),
            });
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ExprEngine;
    use crate::error::CommentError;
    use crate::fakes::MemoryCommentStore;

    fn mr() -> MergeRequestRef {
        MergeRequestRef::new("platform", "api", 12)
    }

    fn note(id: CommentId, body: &str) -> RemoteComment {
        RemoteComment {
            id,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_condition_skips_listing() {
        let store = MemoryCommentStore::new().with_notes(&mr(), vec![note(1, "x")]);
        let engine = ExprEngine::new();
        let resolver = UpdateResolver::new(&store, &engine, ScanOrder::FirstMatch);
        let vars = Map::new();
        let mr = mr();
        let ctx = JudgmentContext {
            mr: &mr,
            sha1: "abc",
            vars: &vars,
            hide_key: None,
        };
        let resolution = resolver.resolve_update_target("", ctx).await.unwrap();
        assert_eq!(resolution.target, None);
        assert_eq!(store.pages_fetched(), 0);
    }

    #[tokio::test]
    async fn test_no_merge_request_skips_listing() {
        let store = MemoryCommentStore::new();
        let engine = ExprEngine::new();
        let resolver = UpdateResolver::new(&store, &engine, ScanOrder::FirstMatch);
        let vars = Map::new();
        let mr = MergeRequestRef::new("platform", "api", 0);
        let ctx = JudgmentContext {
            mr: &mr,
            sha1: "abc",
            vars: &vars,
            hide_key: None,
        };
        let resolution = resolver.resolve_update_target("true", ctx).await.unwrap();
        assert_eq!(resolution.target, None);
        assert_eq!(store.pages_fetched(), 0);
    }

    #[tokio::test]
    async fn test_broken_condition_fails_before_listing() {
        let store = MemoryCommentStore::new()
            .with_notes(&mr(), vec![note(1, "x")])
            .with_endless_pages();
        let engine = ExprEngine::new();
        let resolver = UpdateResolver::new(&store, &engine, ScanOrder::FirstMatch);
        let vars = Map::new();
        let mr = mr();
        let ctx = JudgmentContext {
            mr: &mr,
            sha1: "abc",
            vars: &vars,
            hide_key: None,
        };

        let err = resolver
            .resolve_update_target("Comment.Body ==", ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::ConditionSyntax(_)));

        let mut diagnostics = Vec::new();
        let err = resolver
            .matching_comments("Comment.Body ==", ctx, &mut diagnostics)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::ConditionSyntax(_)));
        assert_eq!(store.pages_fetched(), 0);
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_last_match_order() {
        let store = MemoryCommentStore::new().with_notes(
            &mr(),
            vec![note(1, "bot"), note(2, "human"), note(3, "bot")],
        );
        let engine = ExprEngine::new();
        let vars = Map::new();
        let mr = mr();
        let ctx = JudgmentContext {
            mr: &mr,
            sha1: "abc",
            vars: &vars,
            hide_key: None,
        };
        let cond = r#"Comment.Body == "bot""#;

        let first = UpdateResolver::new(&store, &engine, ScanOrder::FirstMatch)
            .resolve_update_target(cond, ctx)
            .await
            .unwrap();
        assert_eq!(first.target, Some(1));

        let last = UpdateResolver::new(&store, &engine, ScanOrder::LastMatch)
            .resolve_update_target(cond, ctx)
            .await
            .unwrap();
        assert_eq!(last.target, Some(3));
    }

    #[tokio::test]
    async fn test_pages_are_concatenated() {
        let notes: Vec<RemoteComment> = (1..=250).map(|i| note(i, "n")).collect();
        let store = MemoryCommentStore::new().with_notes(&mr(), notes);
        let mut diagnostics = Vec::new();
        let all = list_all_comments(&store, &mr(), &mut diagnostics)
            .await
            .unwrap();
        assert_eq!(all.len(), 250);
        assert_eq!(store.pages_fetched(), 3);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::CommentsListed {
                mr: mr(),
                count: 250
            }]
        );
    }
}
