//! Rule lookup and first-match selection.

use std::borrow::Cow;

use crate::condition::{self, ConditionEngine};
use crate::config::{Config, ExecRule};
use crate::error::{CommentError, Result};
use crate::params::ExecCommentParams;

pub const DEFAULT_TEMPLATE_KEY: &str = "default";

/// Body of the built-in rule: status icon, build link, the command and its
/// collapsed output.
pub const DEFAULT_TEMPLATE: &str = r#"{% include "status" %} {% include "link" %}

{% include "join_command" %}

{% include "hidden_combined_output" %}"#;

/// The rule used when the `default` key has no configured rules: comment on
/// failure, never update.
pub fn default_rule() -> ExecRule {
    ExecRule {
        when: "ExitCode != 0".to_string(),
        template: DEFAULT_TEMPLATE.to_string(),
        ..ExecRule::default()
    }
}

/// Rules that apply to `params`.
///
/// A pre-supplied template needs no rules. A configured key yields its list.
/// An unconfigured `default` key yields the built-in rule; any other
/// unconfigured key is an error.
pub fn lookup_rules<'c>(
    config: &'c Config,
    params: &ExecCommentParams,
) -> Result<Cow<'c, [ExecRule]>> {
    if !params.template.is_empty() {
        return Ok(Cow::Borrowed(&[]));
    }
    if let Some(rules) = config.exec.get(&params.template_key) {
        return Ok(Cow::Borrowed(rules.as_slice()));
    }
    if params.template_key == DEFAULT_TEMPLATE_KEY {
        return Ok(Cow::Owned(vec![default_rule()]));
    }
    Err(CommentError::ConfigLookup(format!(
        "no exec rules for template key `{}`",
        params.template_key
    )))
}

/// Result of walking a rule list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'r> {
    Comment(&'r ExecRule),
    /// The first matching rule says not to comment
    Suppress,
    NoMatch,
}

/// Return the first rule whose `when` holds for `params`.
///
/// A guard that does not compile or fails to evaluate aborts selection.
pub fn select_rule<'r>(
    engine: &dyn ConditionEngine,
    rules: &'r [ExecRule],
    params: &ExecCommentParams,
) -> Result<Selection<'r>> {
    for rule in rules {
        if !condition::matches(engine, &rule.when, params)? {
            continue;
        }
        if rule.dont_comment {
            return Ok(Selection::Suppress);
        }
        return Ok(Selection::Comment(rule));
    }
    Ok(Selection::NoMatch)
}
