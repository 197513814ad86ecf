//! Final step of the lifecycle: send a [`Note`] to the store.

use crate::error::Result;
use crate::note::Note;
use crate::store::{CommentId, CommentStore};

/// Largest body, in bytes, the store accepts. Longer bodies are replaced by
/// the note's fallback rendering.
pub const MAX_BODY_BYTES: usize = 65536;

/// What the poster did with a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Created(CommentId),
    Updated(CommentId),
}

impl PostAction {
    pub fn comment_id(&self) -> CommentId {
        match self {
            PostAction::Created(id) | PostAction::Updated(id) => *id,
        }
    }
}

/// The body that will actually be sent.
pub fn effective_body(note: &Note) -> &str {
    if note.body.len() > MAX_BODY_BYTES {
        &note.body_for_too_long
    } else {
        &note.body
    }
}

/// Edit `note.note_id` in place when set, otherwise create a new note.
///
/// Whether a note without a merge request (`mr_number == 0`) can be posted
/// is up to the store.
pub async fn post_note(store: &dyn CommentStore, note: &Note) -> Result<PostAction> {
    let mr = note.merge_request();
    let body = effective_body(note);
    match note.note_id {
        Some(id) => {
            store.edit_comment(&mr, id, body).await?;
            Ok(PostAction::Updated(id))
        }
        None => {
            let id = store.create_comment(&mr, body).await?;
            Ok(PostAction::Created(id))
        }
    }
}
