//! `gitlab-comment init`: scaffold a configuration file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const CONFIG_FILE: &str = "gitlab-comment.toml";

pub const SAMPLE_CONFIG: &str = r#"# gitlab-comment configuration

# Post nothing instead of failing when no GitLab token is available.
# skip_no_token = true

# Which earlier note to overwrite when several match an update condition:
# "first_match" (store order) or "last_match" (reverse store order).
# update_order = "first_match"

# [base]
# org = "my-group"
# repo = "my-project"

[vars]
# team = "platform"

# Snippets usable in any template with {% include "name" %}.
# The built-in ones are status, link, join_command and hidden_combined_output.
[templates]
# link = "[job]({{ Env(\"CI_JOB_URL\") }})"

[post]
hello = "Hello from {{ Org }}/{{ Repo }} at {{ SHA1 }}"

[[exec.default]]
when = "ExitCode != 0"
template = """
{% include "status" %} {% include "link" %}

{% include "join_command" %}

{% include "hidden_combined_output" %}
"""
template_for_too_long = """
{% include "status" %} {% include "link" %}

{% include "join_command" %}

The output is too long to show here.
"""
update_condition = 'Comment.HasMeta and Comment.Meta.TemplateKey == "default"'

[[exec.default]]
when = "true"
dont_comment = true

[hide]
default = 'Comment.HasMeta and Comment.Meta.SHA1 != Commit.SHA1'
"#;

/// Write the sample configuration into `dir`, refusing to overwrite.
pub fn write_sample(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("create {}", path.display()))?;
    file.write_all(SAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
