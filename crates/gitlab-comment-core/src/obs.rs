//! Structured log events for the comment lifecycle.
//!
//! The engine returns [`Diagnostic`] values instead of logging; the binary
//! hands them to [`emit_diagnostics`] along with the other emitters here.

use tracing::{debug, error, info, warn};

use crate::diagnostics::Diagnostic;
use crate::engine::{Disposition, PostReport};
use crate::hide::HideReport;
use crate::poster::PostAction;
use crate::store::MergeRequestRef;

/// RAII guard entering a span tagged with the merge request being commented on.
pub struct CommentSpan {
    _span: tracing::span::EnteredSpan,
}

impl CommentSpan {
    pub fn enter(command: &str, mr: &MergeRequestRef) -> Self {
        let span = tracing::info_span!(
            "gitlab_comment",
            command = %command,
            org = %mr.org,
            repo = %mr.repo,
            mr_number = mr.mr_number,
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::CommentsListed { mr, count } => {
                debug!(event = "notes.listed", mr = %mr, count = count);
            }
            Diagnostic::PaginationTruncated { mr, max_pages } => {
                debug!(event = "notes.truncated", mr = %mr, max_pages = max_pages);
            }
            Diagnostic::CandidateJudged {
                comment_id,
                condition,
                matched,
            } => {
                debug!(
                    event = "note.judged",
                    note_id = comment_id,
                    condition = %condition,
                    matched = matched,
                );
            }
            Diagnostic::CandidateSkipped {
                comment_id,
                condition,
                error,
            } => {
                error!(
                    event = "note.judge_failed",
                    note_id = comment_id,
                    condition = %condition,
                    error = %error,
                );
            }
            Diagnostic::UpdateTargetSelected { comment_id } => {
                debug!(event = "note.update_target", note_id = comment_id);
            }
        }
    }
}

/// Log the outcome of a post, including its diagnostics.
pub fn emit_post_report(mr: &MergeRequestRef, report: &PostReport) {
    emit_diagnostics(&report.diagnostics);
    match report.disposition {
        Disposition::NoRuleMatched => {
            debug!(event = "comment.skipped", mr = %mr, reason = "no rule matched");
        }
        Disposition::Suppressed => {
            debug!(event = "comment.skipped", mr = %mr, reason = "dont_comment");
        }
        Disposition::Posted(PostAction::Created(id)) => {
            info!(event = "comment.created", mr = %mr, note_id = id);
        }
        Disposition::Posted(PostAction::Updated(id)) => {
            info!(event = "comment.updated", mr = %mr, note_id = id);
        }
    }
}

/// Log the outcome of a hide pass.
pub fn emit_hide_report(mr: &MergeRequestRef, report: &HideReport) {
    emit_diagnostics(&report.diagnostics);
    debug!(
        event = "hide.matched",
        mr = %mr,
        count = report.matched.len(),
        note_ids = ?report.matched,
    );
    for (id, err) in &report.failures {
        error!(event = "hide.failed", mr = %mr, note_id = id, error = %err);
    }
    for id in &report.hidden {
        info!(event = "hide.done", mr = %mr, note_id = id);
    }
    if report.hidden.is_empty() {
        info!(event = "hide.none", mr = %mr, "no comment is hidden");
    }
}

/// MR lookup by commit failed; commenting continues without it.
pub fn emit_mr_lookup_failed(org: &str, repo: &str, sha: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "mr.lookup_failed",
        org = %org,
        repo = %repo,
        sha = %sha,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let mr = MergeRequestRef::new("platform", "api", 1);
        let _span = CommentSpan::enter("exec", &mr);
        emit_diagnostics(&[
            Diagnostic::CommentsListed {
                mr: mr.clone(),
                count: 2,
            },
            Diagnostic::CandidateSkipped {
                comment_id: 1,
                condition: "x".to_string(),
                error: "boom".to_string(),
            },
        ]);
        emit_hide_report(&mr, &HideReport::default());
        emit_mr_lookup_failed("platform", "api", "abc", &"timeout");
    }
}
