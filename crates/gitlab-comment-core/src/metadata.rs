//! Hidden metadata blocks embedded in note bodies.
//!
//! A block is an HTML comment, invisible in rendered Markdown:
//!
//! ```text
//! <!-- gitlab-comment: {"SHA1":"0f3c...","TemplateKey":"default","Vars":{}} -->
//! ```
//!
//! Every `>` inside the JSON payload is written as `\u003e`, so the payload
//! can never close the surrounding comment early.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

const BLOCK_PREFIX: &str = "<!-- gitlab-comment: ";
const BLOCK_SUFFIX: &str = " -->";

/// Metadata recovered from a note body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub has_meta: bool,
    pub data: Map<String, Value>,
}

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<!-- gitlab-comment: (\{.*?\}) -->").expect("metadata pattern is valid")
    })
}

/// Encode `data` as a block ready to be appended to a note body.
pub fn embed(data: &Map<String, Value>) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(data)?.replace('>', "\\u003e");
    Ok(format!("\n{BLOCK_PREFIX}{payload}{BLOCK_SUFFIX}"))
}

/// Find and decode the last metadata block in `body`.
///
/// A body without a block, or with a block that does not decode to a JSON
/// object, yields `has_meta == false` and an empty map.
pub fn extract(body: &str) -> ExtractedMetadata {
    let Some(captures) = block_pattern().captures_iter(body).last() else {
        return ExtractedMetadata::default();
    };
    match serde_json::from_str::<Map<String, Value>>(&captures[1]) {
        Ok(data) => ExtractedMetadata {
            has_meta: true,
            data,
        },
        Err(_) => ExtractedMetadata::default(),
    }
}

/// CI context recorded next to the note's own metadata.
///
/// Only GitLab CI is recognised; other platforms contribute nothing.
pub fn ci_metadata(ci: Option<&str>, getenv: &dyn Fn(&str) -> String) -> Map<String, Value> {
    let mut data = Map::new();
    if ci != Some(crate::GITLAB_CI) {
        return data;
    }
    for (key, var) in [
        ("JobID", "CI_JOB_ID"),
        ("JobName", "CI_JOB_NAME"),
        ("PipelineID", "CI_PIPELINE_ID"),
    ] {
        let value = getenv(var);
        if !value.is_empty() {
            data.insert(key.to_string(), Value::String(value));
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let data = map(json!({
            "SHA1": "0f3c2a",
            "TemplateKey": "default",
            "Vars": {"target": "api", "attempt": 2},
        }));
        let body = format!("build failed{}", embed(&data).unwrap());
        assert_eq!(
            extract(&body),
            ExtractedMetadata {
                has_meta: true,
                data
            }
        );
    }

    #[test]
    fn test_round_trip_empty_map() {
        let data = Map::new();
        let extracted = extract(&embed(&data).unwrap());
        assert!(extracted.has_meta);
        assert!(extracted.data.is_empty());
    }

    #[test]
    fn test_payload_cannot_close_comment() {
        let data = map(json!({"Vars": {"note": "a --> b\n<!-- gitlab-comment: {} -->"}}));
        let block = embed(&data).unwrap();
        assert_eq!(block.matches("-->").count(), 1);
        assert_eq!(extract(&block).data, data);
    }

    #[test]
    fn test_body_without_block() {
        let extracted = extract("plain comment written by a human");
        assert!(!extracted.has_meta);
        assert!(extracted.data.is_empty());
    }

    #[test]
    fn test_last_block_wins() {
        let first = embed(&map(json!({"TemplateKey": "old"}))).unwrap();
        let second = embed(&map(json!({"TemplateKey": "new"}))).unwrap();
        let extracted = extract(&format!("quoted{first}\nreply{second}"));
        assert_eq!(extracted.data["TemplateKey"], "new");
    }

    #[test]
    fn test_undecodable_block() {
        let extracted = extract("<!-- gitlab-comment: {not json} -->");
        assert!(!extracted.has_meta);
    }

    #[test]
    fn test_ci_metadata_gitlab() {
        let getenv = |k: &str| match k {
            "CI_JOB_ID" => "42".to_string(),
            "CI_PIPELINE_ID" => "7".to_string(),
            _ => String::new(),
        };
        let data = ci_metadata(Some("gitlab-ci"), &getenv);
        assert_eq!(data["JobID"], "42");
        assert_eq!(data["PipelineID"], "7");
        assert!(!data.contains_key("JobName"));
        assert!(ci_metadata(None, &getenv).is_empty());
    }
}
