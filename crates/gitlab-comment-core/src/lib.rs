//! gitlab-comment core library
//!
//! Turns the outcome of a CI command into a GitLab merge request note:
//! pick a rule, render its template, embed hidden metadata, find an earlier
//! note to overwrite, and post. The remote store is abstracted behind
//! [`CommentStore`]; conditions behind [`ConditionEngine`].

pub mod condition;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod hide;
pub mod metadata;
pub mod note;
pub mod obs;
pub mod params;
pub mod poster;
pub mod render;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod telemetry;

/// Platform id of GitLab CI, as reported by platform detection.
pub const GITLAB_CI: &str = "gitlab-ci";

pub use condition::{ConditionEngine, ExprEngine, Program};
pub use config::{BaseConfig, Config, ExecRule, PostConfig, PostTemplate, ScanOrder};
pub use diagnostics::Diagnostic;
pub use engine::{CommentEngine, Disposition, PostReport};
pub use error::{
    CommentError, ConditionEvalError, ConditionSyntaxError, ConfigError, RenderError, Result,
    StoreError, StoreResult,
};
pub use hide::{HideReport, HideRequest};
pub use metadata::ExtractedMetadata;
pub use note::Note;
pub use params::{ExecCommentParams, JudgmentParams, PostTemplateParams};
pub use poster::{PostAction, MAX_BODY_BYTES};
pub use render::{helper_templates, HelperInputs, Renderer};
pub use resolver::{UpdateResolver, LIST_PER_PAGE, MAX_PAGES};
pub use rules::{lookup_rules, select_rule, Selection, DEFAULT_TEMPLATE_KEY};
pub use store::{CommentId, CommentPage, CommentStore, MergeRequestRef, RemoteComment};
