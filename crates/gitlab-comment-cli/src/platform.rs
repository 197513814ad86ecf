//! CI platform detection.
//!
//! Only GitLab CI is recognised. When detected it fills in whatever the
//! command line left unset from the job's predefined variables.

use anyhow::{Context, Result};
use gitlab_comment_core::GITLAB_CI;

use crate::session::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    id: &'static str,
}

impl Platform {
    /// GitLab CI sets `GITLAB_CI=true` in every job.
    pub fn detect(getenv: &dyn Fn(&str) -> String) -> Option<Self> {
        if getenv("GITLAB_CI").is_empty() {
            None
        } else {
            Some(Self { id: GITLAB_CI })
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Fill unset fields of `target` from CI variables.
    ///
    /// A missing `CI_MERGE_REQUEST_IID` (branch pipelines) leaves the number
    /// at 0; a malformed one is an error.
    pub fn complement(&self, target: &mut Target, getenv: &dyn Fn(&str) -> String) -> Result<()> {
        if target.org.is_empty() {
            target.org = getenv("CI_PROJECT_NAMESPACE");
        }
        if target.repo.is_empty() {
            target.repo = getenv("CI_PROJECT_NAME");
        }
        if target.sha1.is_empty() {
            target.sha1 = getenv("CI_COMMIT_SHA");
        }
        if target.mr_number > 0 {
            return Ok(());
        }
        let iid = getenv("CI_MERGE_REQUEST_IID");
        if !iid.is_empty() {
            target.mr_number = iid
                .trim()
                .parse()
                .with_context(|| format!("parse CI_MERGE_REQUEST_IID {iid:?}"))?;
        }
        Ok(())
    }
}
