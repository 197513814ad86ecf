//! Comment template rendering.
//!
//! Templates are minijinja templates rendered against a parameter record
//! ([`ExecCommentParams`](crate::params::ExecCommentParams) or
//! [`PostTemplateParams`](crate::params::PostTemplateParams)). Reusable
//! helper snippets are registered as named templates and pulled in with
//! `{% include "status" %}`.

use std::collections::HashMap;
use std::sync::Arc;

use minijinja::Environment;
use serde::Serialize;

use crate::error::RenderError;

const CODE_FENCE: &str = "```";

/// Name under which the main template is registered.
const ROOT_TEMPLATE: &str = "comment";

/// Inputs that shape the built-in helper snippets.
#[derive(Debug, Clone)]
pub struct HelperInputs<'a> {
    /// Detected CI platform id (`gitlab-ci`), if any
    pub ci: Option<&'a str>,
    pub join_command: &'a str,
    pub combined_output: &'a str,
    /// User snippets from config; they replace built-ins of the same name
    pub overrides: &'a HashMap<String, String>,
}

/// Build the helper snippet table for one render.
pub fn helper_templates(inputs: &HelperInputs<'_>) -> HashMap<String, String> {
    let mut helpers = HashMap::new();
    helpers.insert(
        "status".to_string(),
        ":{% if ExitCode == 0 %}white_check_mark{% else %}x{% endif %}:".to_string(),
    );
    helpers.insert("link".to_string(), link_template(inputs.ci).to_string());

    let join_command = if inputs.join_command.contains(CODE_FENCE) {
        "<pre><code>$ {{ JoinCommand | escape }}</code></pre>".to_string()
    } else {
        format!("{CODE_FENCE}\n$ {{{{ JoinCommand }}}}\n{CODE_FENCE}")
    };
    helpers.insert("join_command".to_string(), join_command);

    let hidden_output = if inputs.combined_output.contains(CODE_FENCE) {
        "<details><pre><code>{{ CombinedOutput | escape }}</code></pre></details>".to_string()
    } else {
        format!("<details>\n\n{CODE_FENCE}\n{{{{ CombinedOutput }}}}\n{CODE_FENCE}\n\n</details>")
    };
    helpers.insert("hidden_combined_output".to_string(), hidden_output);

    for (name, body) in inputs.overrides {
        helpers.insert(name.clone(), body.clone());
    }
    helpers
}

fn link_template(ci: Option<&str>) -> &'static str {
    match ci {
        Some(crate::GITLAB_CI) => r#"[Build link]({{ Env("CI_JOB_URL") }})"#,
        _ => "",
    }
}

/// Renders templates with an `Env(name)` function bound to `getenv`.
#[derive(Clone)]
pub struct Renderer {
    getenv: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(|_| String::new())
    }
}

impl Renderer {
    pub fn new(getenv: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            getenv: Arc::new(getenv),
        }
    }

    /// Render `template` against `params`.
    ///
    /// An empty template renders to an empty string without touching the
    /// helpers, so a rule without a fallback template costs nothing.
    pub fn render<T: Serialize>(
        &self,
        template: &str,
        helpers: &HashMap<String, String>,
        params: &T,
    ) -> Result<String, RenderError> {
        if template.is_empty() {
            return Ok(String::new());
        }

        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        let getenv = Arc::clone(&self.getenv);
        env.add_function("Env", move |name: String| getenv(&name));

        for (name, body) in helpers {
            env.add_template_owned(name.clone(), body.clone())
                .map_err(|e| render_error(name, e))?;
        }
        env.add_template_owned(ROOT_TEMPLATE, template.to_string())
            .map_err(|e| render_error(ROOT_TEMPLATE, e))?;

        env.get_template(ROOT_TEMPLATE)
            .and_then(|tpl| tpl.render(params))
            .map_err(|e| render_error(ROOT_TEMPLATE, e))
    }
}

fn render_error(name: &str, err: minijinja::Error) -> RenderError {
    RenderError {
        name: name.to_string(),
        message: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ExecCommentParams;

    fn exec_params(exit_code: i32) -> ExecCommentParams {
        ExecCommentParams {
            exit_code,
            join_command: "cargo test --workspace".to_string(),
            combined_output: "test result: FAILED".to_string(),
            ..Default::default()
        }
    }

    fn helpers_for(params: &ExecCommentParams, ci: Option<&str>) -> HashMap<String, String> {
        let overrides = HashMap::new();
        helper_templates(&HelperInputs {
            ci,
            join_command: &params.join_command,
            combined_output: &params.combined_output,
            overrides: &overrides,
        })
    }

    #[test]
    fn test_render_fields() {
        let params = exec_params(3);
        let out = Renderer::default()
            .render("exit {{ ExitCode }}: {{ JoinCommand }}", &HashMap::new(), &params)
            .unwrap();
        assert_eq!(out, "exit 3: cargo test --workspace");
    }

    #[test]
    fn test_empty_template_renders_empty() {
        let out = Renderer::default()
            .render("", &HashMap::new(), &exec_params(1))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_status_helper() {
        let renderer = Renderer::default();
        let failed = exec_params(1);
        let passed = exec_params(0);
        let tpl = r#"{% include "status" %}"#;
        assert_eq!(
            renderer.render(tpl, &helpers_for(&failed, None), &failed).unwrap(),
            ":x:"
        );
        assert_eq!(
            renderer.render(tpl, &helpers_for(&passed, None), &passed).unwrap(),
            ":white_check_mark:"
        );
    }

    #[test]
    fn test_link_uses_env_on_gitlab_ci() {
        let renderer = Renderer::new(|k| {
            if k == "CI_JOB_URL" {
                "https://gitlab.example/job/1".to_string()
            } else {
                String::new()
            }
        });
        let params = exec_params(1);
        let out = renderer
            .render(
                r#"{% include "link" %}"#,
                &helpers_for(&params, Some("gitlab-ci")),
                &params,
            )
            .unwrap();
        assert_eq!(out, "[Build link](https://gitlab.example/job/1)");
    }

    #[test]
    fn test_code_fence_in_output_switches_to_html() {
        let params = ExecCommentParams {
            combined_output: "```\n<b>\n```".to_string(),
            ..exec_params(1)
        };
        let out = Renderer::default()
            .render(
                r#"{% include "hidden_combined_output" %}"#,
                &helpers_for(&params, None),
                &params,
            )
            .unwrap();
        assert!(out.starts_with("<details><pre><code>"));
        assert!(out.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_override_replaces_builtin() {
        let mut overrides = HashMap::new();
        overrides.insert("status".to_string(), "STATUS".to_string());
        let params = exec_params(1);
        let helpers = helper_templates(&HelperInputs {
            ci: None,
            join_command: &params.join_command,
            combined_output: &params.combined_output,
            overrides: &overrides,
        });
        let out = Renderer::default()
            .render(r#"{% include "status" %}"#, &helpers, &params)
            .unwrap();
        assert_eq!(out, "STATUS");
    }

    #[test]
    fn test_malformed_template_is_render_error() {
        let err = Renderer::default()
            .render("{% if %}", &HashMap::new(), &exec_params(1))
            .unwrap_err();
        assert_eq!(err.name, "comment");
    }
}
