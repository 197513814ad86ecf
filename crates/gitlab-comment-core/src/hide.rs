//! Collapsing stale notes.

use serde_json::{Map, Value};

use crate::diagnostics::Diagnostic;
use crate::engine::CommentEngine;
use crate::error::{Result, StoreError};
use crate::resolver::{JudgmentContext, UpdateResolver};
use crate::store::{CommentId, MergeRequestRef};

#[derive(Debug, Clone, PartialEq)]
pub struct HideRequest {
    pub mr: MergeRequestRef,
    pub sha1: String,
    pub condition: String,
    /// Exposed to the condition as `HideKey`
    pub hide_key: String,
    pub vars: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HideReport {
    /// Every note the condition selected
    pub matched: Vec<CommentId>,
    /// Notes the store actually hid
    pub hidden: Vec<CommentId>,
    pub failures: Vec<(CommentId, StoreError)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CommentEngine<'_> {
    /// Hide every note matching `request.condition`.
    ///
    /// A failure to hide one note does not stop the others; it is recorded in
    /// [`HideReport::failures`].
    pub async fn hide(&self, request: &HideRequest) -> Result<HideReport> {
        let mut report = HideReport::default();
        let resolver = UpdateResolver::new(self.store, self.conditions, self.scan_order);
        report.matched = resolver
            .matching_comments(
                &request.condition,
                JudgmentContext {
                    mr: &request.mr,
                    sha1: &request.sha1,
                    vars: &request.vars,
                    hide_key: Some(&request.hide_key),
                },
                &mut report.diagnostics,
            )
            .await?;

        for &id in &report.matched {
            match self.store.hide_comment(&request.mr, id).await {
                Ok(()) => report.hidden.push(id),
                Err(err) => report.failures.push((id, err)),
            }
        }
        Ok(report)
    }
}
