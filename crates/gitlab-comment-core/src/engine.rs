//! The comment lifecycle: select, render, embed, resolve, post.
//!
//! [`CommentEngine`] ties together the rule selector, the renderer, the
//! metadata codec, the update resolver and the poster. It does no logging of
//! its own; everything worth reporting comes back in the [`PostReport`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::condition::ConditionEngine;
use crate::config::{ExecRule, PostTemplate, ScanOrder};
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::metadata;
use crate::note::Note;
use crate::params::{ExecCommentParams, PostTemplateParams};
use crate::poster::{self, PostAction};
use crate::render::Renderer;
use crate::resolver::{JudgmentContext, UpdateResolver};
use crate::rules::{self, Selection};
use crate::store::{CommentStore, MergeRequestRef};

/// What happened to one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No rule guard held; nothing was rendered or posted
    NoRuleMatched,
    /// The matching rule has `dont_comment` set
    Suppressed,
    Posted(PostAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReport {
    pub disposition: Disposition,
    pub diagnostics: Vec<Diagnostic>,
}

impl PostReport {
    fn skipped(disposition: Disposition) -> Self {
        Self {
            disposition,
            diagnostics: Vec::new(),
        }
    }
}

/// Everything needed to turn a template into a posted note.
struct Draft<'a> {
    template: &'a str,
    template_for_too_long: &'a str,
    embedded_var_names: &'a [String],
    update_condition: &'a str,
    mr: MergeRequestRef,
    sha1: &'a str,
    template_key: &'a str,
    vars: &'a Map<String, Value>,
}

pub struct CommentEngine<'a> {
    pub(crate) store: &'a dyn CommentStore,
    pub(crate) conditions: &'a dyn ConditionEngine,
    renderer: Renderer,
    pub(crate) scan_order: ScanOrder,
    ci_metadata: Map<String, Value>,
}

impl<'a> CommentEngine<'a> {
    pub fn new(store: &'a dyn CommentStore, conditions: &'a dyn ConditionEngine) -> Self {
        Self {
            store,
            conditions,
            renderer: Renderer::default(),
            scan_order: ScanOrder::default(),
            ci_metadata: Map::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_scan_order(mut self, order: ScanOrder) -> Self {
        self.scan_order = order;
        self
    }

    /// Extra keys embedded in every note's metadata (CI job and pipeline).
    pub fn with_ci_metadata(mut self, data: Map<String, Value>) -> Self {
        self.ci_metadata = data;
        self
    }

    /// Comment on the outcome of a wrapped command.
    ///
    /// A non-empty `params.template` bypasses `rules` and is posted as is,
    /// with no fallback, embedded vars or update condition.
    pub async fn post_exec(
        &self,
        rules: &[ExecRule],
        params: &ExecCommentParams,
        helpers: &HashMap<String, String>,
    ) -> Result<PostReport> {
        let explicit;
        let rule = if params.template.is_empty() {
            match rules::select_rule(self.conditions, rules, params)? {
                Selection::Comment(rule) => rule,
                Selection::Suppress => return Ok(PostReport::skipped(Disposition::Suppressed)),
                Selection::NoMatch => return Ok(PostReport::skipped(Disposition::NoRuleMatched)),
            }
        } else {
            explicit = ExecRule {
                template: params.template.clone(),
                ..ExecRule::default()
            };
            &explicit
        };

        let draft = Draft {
            template: &rule.template,
            template_for_too_long: &rule.template_for_too_long,
            embedded_var_names: &rule.embedded_var_names,
            update_condition: &rule.update_condition,
            mr: MergeRequestRef::new(&params.org, &params.repo, params.mr_number),
            sha1: &params.sha1,
            template_key: &params.template_key,
            vars: &params.vars,
        };
        self.deliver(draft, helpers, params).await
    }

    /// Post a standalone template.
    pub async fn post_template(
        &self,
        template: &PostTemplate,
        params: &PostTemplateParams,
        helpers: &HashMap<String, String>,
    ) -> Result<PostReport> {
        let draft = Draft {
            template: &template.template,
            template_for_too_long: &template.template_for_too_long,
            embedded_var_names: &template.embedded_var_names,
            update_condition: &template.update_condition,
            mr: MergeRequestRef::new(&params.org, &params.repo, params.mr_number),
            sha1: &params.sha1,
            template_key: &params.template_key,
            vars: &params.vars,
        };
        self.deliver(draft, helpers, params).await
    }

    /// Metadata embedded in a note: identity, selected vars and CI context.
    fn embedded_metadata(&self, draft: &Draft<'_>) -> Map<String, Value> {
        let selected: Map<String, Value> = draft
            .embedded_var_names
            .iter()
            .filter_map(|name| {
                draft
                    .vars
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        let mut data = Map::new();
        data.insert("SHA1".to_string(), Value::String(draft.sha1.to_string()));
        data.insert(
            "TemplateKey".to_string(),
            Value::String(draft.template_key.to_string()),
        );
        data.insert("Vars".to_string(), Value::Object(selected));
        for (key, value) in &self.ci_metadata {
            data.insert(key.clone(), value.clone());
        }
        data
    }

    async fn deliver<T: Serialize + Sync>(
        &self,
        draft: Draft<'_>,
        helpers: &HashMap<String, String>,
        params: &T,
    ) -> Result<PostReport> {
        let body = self.renderer.render(draft.template, helpers, params)?;
        let body_for_too_long = self
            .renderer
            .render(draft.template_for_too_long, helpers, params)?;
        let block = metadata::embed(&self.embedded_metadata(&draft))?;

        let mut note = Note {
            org: draft.mr.org.clone(),
            repo: draft.mr.repo.clone(),
            mr_number: draft.mr.mr_number,
            body: body + &block,
            body_for_too_long: body_for_too_long + &block,
            sha1: draft.sha1.to_string(),
            vars: draft.vars.clone(),
            template_key: draft.template_key.to_string(),
            note_id: None,
        };

        let resolution = UpdateResolver::new(self.store, self.conditions, self.scan_order)
            .resolve_update_target(
                draft.update_condition,
                JudgmentContext {
                    mr: &draft.mr,
                    sha1: draft.sha1,
                    vars: draft.vars,
                    hide_key: None,
                },
            )
            .await?;
        note.note_id = resolution.target;

        let action = poster::post_note(self.store, &note).await?;
        Ok(PostReport {
            disposition: Disposition::Posted(action),
            diagnostics: resolution.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ExprEngine;
    use crate::fakes::{MemoryCommentStore, StoreCall};
    use serde_json::json;

    fn exec_params() -> ExecCommentParams {
        ExecCommentParams {
            exit_code: 1,
            join_command: "make lint".to_string(),
            mr_number: 5,
            org: "platform".to_string(),
            repo: "api".to_string(),
            sha1: "c0ffee".to_string(),
            template_key: "default".to_string(),
            vars: json!({"a": 1, "b": 2}).as_object().cloned().unwrap(),
            ..Default::default()
        }
    }

    fn rule(template: &str) -> ExecRule {
        ExecRule {
            when: "true".to_string(),
            template: template.to_string(),
            ..ExecRule::default()
        }
    }

    fn created_body(store: &MemoryCommentStore) -> String {
        match store.calls().as_slice() {
            [StoreCall::Create { body, .. }] => body.clone(),
            other => panic!("unexpected calls {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_listed_vars_are_embedded() {
        let store = MemoryCommentStore::new();
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions);
        let rules = vec![ExecRule {
            embedded_var_names: vec!["a".to_string(), "missing".to_string()],
            ..rule("failed")
        }];

        engine
            .post_exec(&rules, &exec_params(), &HashMap::new())
            .await
            .unwrap();

        let meta = metadata::extract(&created_body(&store));
        assert!(meta.has_meta);
        assert_eq!(meta.data["Vars"], json!({"a": 1}));
        assert_eq!(meta.data["SHA1"], "c0ffee");
        assert_eq!(meta.data["TemplateKey"], "default");
    }

    #[tokio::test]
    async fn test_suppressed_outcome_touches_nothing() {
        let store = MemoryCommentStore::new();
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions);
        let rules = vec![ExecRule {
            dont_comment: true,
            update_condition: "true".to_string(),
            ..rule("never")
        }];

        let report = engine
            .post_exec(&rules, &exec_params(), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(report.disposition, Disposition::Suppressed);
        assert!(store.calls().is_empty());
        assert_eq!(store.pages_fetched(), 0);
    }

    #[tokio::test]
    async fn test_explicit_template_bypasses_rules() {
        let store = MemoryCommentStore::new();
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions);
        let params = ExecCommentParams {
            template: "exit={{ ExitCode }}".to_string(),
            ..exec_params()
        };

        let report = engine.post_exec(&[], &params, &HashMap::new()).await.unwrap();
        assert_eq!(report.disposition, Disposition::Posted(PostAction::Created(1)));
        assert!(created_body(&store).starts_with("exit=1\n<!-- gitlab-comment: "));
    }

    #[tokio::test]
    async fn test_ci_metadata_is_embedded() {
        let store = MemoryCommentStore::new();
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions)
            .with_ci_metadata(json!({"JobID": "99"}).as_object().cloned().unwrap());

        engine
            .post_exec(&[rule("x")], &exec_params(), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(metadata::extract(&created_body(&store)).data["JobID"], "99");
    }

    #[tokio::test]
    async fn test_post_template_renders_params() {
        let store = MemoryCommentStore::new();
        let conditions = ExprEngine::new();
        let engine = CommentEngine::new(&store, &conditions);
        let params = PostTemplateParams {
            mr_number: 3,
            org: "platform".to_string(),
            repo: "api".to_string(),
            sha1: "abc".to_string(),
            template_key: "hello".to_string(),
            vars: Map::new(),
        };
        let template = PostTemplate {
            template: "hello {{ Org }}/{{ Repo }}!{{ MRNumber }}".to_string(),
            ..PostTemplate::default()
        };

        engine
            .post_template(&template, &params, &HashMap::new())
            .await
            .unwrap();
        assert!(created_body(&store).starts_with("hello platform/api!3"));
    }
}
