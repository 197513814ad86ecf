//! Parameter records handed to conditions and templates.
//!
//! Field names are serialized in PascalCase; they are the names users write
//! in rule guards and templates (`ExitCode`, `Comment.Meta`, ...).

use serde::Serialize;
use serde_json::{Map, Value};

/// Captured outcome of one wrapped command execution.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCommentParams {
    pub exit_code: i32,
    /// Shell-quoted form of the executed command
    pub command: String,
    /// Arguments joined by single spaces
    pub join_command: String,
    pub stdout: String,
    pub stderr: String,
    pub combined_output: String,
    #[serde(rename = "MRNumber")]
    pub mr_number: u64,
    pub org: String,
    pub repo: String,
    #[serde(rename = "SHA1")]
    pub sha1: String,
    pub template_key: String,
    /// Pre-supplied template; when non-empty no rule is selected
    #[serde(skip)]
    pub template: String,
    pub vars: Map<String, Value>,
}

/// Parameters of a standalone `post`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PostTemplateParams {
    #[serde(rename = "MRNumber")]
    pub mr_number: u64,
    pub org: String,
    pub repo: String,
    #[serde(rename = "SHA1")]
    pub sha1: String,
    pub template_key: String,
    pub vars: Map<String, Value>,
}

/// The stored note as seen by an update or hide condition.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CommentView<'a> {
    pub body: &'a str,
    pub meta: &'a Map<String, Value>,
    pub has_meta: bool,
}

/// Identity of the merge request and commit being commented on.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CommitView<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    #[serde(rename = "MRNumber")]
    pub mr_number: u64,
    #[serde(rename = "SHA1")]
    pub sha1: &'a str,
}

/// Composite record an update or hide condition is judged against.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct JudgmentParams<'a> {
    pub comment: CommentView<'a>,
    pub commit: CommitView<'a>,
    pub vars: &'a Map<String, Value>,
    /// Present only when judging notes to hide
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_key: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exec_params_field_names() {
        let params = ExecCommentParams {
            exit_code: 2,
            join_command: "make test".to_string(),
            mr_number: 9,
            sha1: "abc".to_string(),
            template: "ignored".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["ExitCode"], 2);
        assert_eq!(value["JoinCommand"], "make test");
        assert_eq!(value["MRNumber"], 9);
        assert_eq!(value["SHA1"], "abc");
        assert!(value.get("Template").is_none());
    }

    #[test]
    fn test_judgment_params_shape() {
        let meta = json!({"TemplateKey": "default"}).as_object().cloned().unwrap();
        let vars = Map::new();
        let params = JudgmentParams {
            comment: CommentView {
                body: "body",
                meta: &meta,
                has_meta: true,
            },
            commit: CommitView {
                org: "g",
                repo: "p",
                mr_number: 3,
                sha1: "abc",
            },
            vars: &vars,
            hide_key: None,
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["Comment"]["Meta"]["TemplateKey"], "default");
        assert_eq!(value["Comment"]["HasMeta"], true);
        assert_eq!(value["Commit"]["MRNumber"], 3);
        assert!(value.get("HideKey").is_none());
    }
}
