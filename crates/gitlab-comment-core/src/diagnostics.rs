//! Diagnostics returned by the engine instead of being logged in place.
//!
//! The engine has no ambient output; callers hand these to
//! [`obs::emit_diagnostics`](crate::obs::emit_diagnostics) or inspect them in
//! tests.

use crate::store::{CommentId, MergeRequestRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// All pages of notes were fetched
    CommentsListed { mr: MergeRequestRef, count: usize },

    /// The store kept reporting more pages; listing stopped at the ceiling
    PaginationTruncated { mr: MergeRequestRef, max_pages: u32 },

    /// A condition was evaluated against one note
    CandidateJudged {
        comment_id: CommentId,
        condition: String,
        matched: bool,
    },

    /// Evaluating a condition against one note failed; the note was skipped
    CandidateSkipped {
        comment_id: CommentId,
        condition: String,
        error: String,
    },

    /// A note was chosen to be edited in place
    UpdateTargetSelected { comment_id: CommentId },
}
