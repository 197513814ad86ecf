//! Per-invocation setup shared by `exec`, `post` and `hide`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use gitlab_comment_core::{obs, CommentStore, Config};
use gitlab_comment_gitlab::{DryRunStore, GitLabClient, GitLabClientConfig, DEFAULT_BASE_URL};
use serde_json::{Map, Value};
use tracing::debug;

use crate::platform::Platform;
use crate::vars::{parse_var_files, parse_vars};
use crate::CommonArgs;

/// Where the note goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub org: String,
    pub repo: String,
    pub sha1: String,
    pub mr_number: u64,
}

pub struct Session {
    pub config: Config,
    pub target: Target,
    pub platform: Option<Platform>,
    pub store: Box<dyn CommentStore>,
    /// Config vars overlaid with `--var` and `--var-file`
    pub vars: Map<String, Value>,
}

/// Environment lookup with unset and non-UTF-8 variables read as empty.
pub fn env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Session {
    pub async fn open(args: &CommonArgs) -> Result<Self> {
        let wd = std::env::current_dir().context("get the current directory")?;
        Self::open_in(args, &wd, &env_var).await
    }

    /// Resolve config, target, store and vars.
    ///
    /// Precedence for the target: flags, then CI variables, then the config
    /// `base` table (org and repo only), then a lookup of the merge request by
    /// commit SHA.
    pub async fn open_in(
        args: &CommonArgs,
        wd: &Path,
        getenv: &dyn Fn(&str) -> String,
    ) -> Result<Self> {
        let config = Config::find_and_read(args.config.as_deref(), wd)
            .context("find and read a configuration file")?;

        let mut target = Target {
            org: args.org.clone().unwrap_or_default(),
            repo: args.repo.clone().unwrap_or_default(),
            sha1: args.sha1.clone().unwrap_or_default(),
            mr_number: args.mr.unwrap_or(0),
        };
        let platform = Platform::detect(getenv);
        if let Some(platform) = &platform {
            platform
                .complement(&mut target, getenv)
                .context("complement options with CI built-in environment variables")?;
        }
        if let Some(base) = &config.base {
            if target.org.is_empty() {
                target.org = base.org.clone();
            }
            if target.repo.is_empty() {
                target.repo = base.repo.clone();
            }
        }

        let store = build_store(args, &config, &target, getenv)?;
        lookup_mr_number(&mut target, store.as_ref()).await;

        let mut vars = config.vars.clone();
        vars.extend(parse_vars(&args.vars)?);
        vars.extend(parse_var_files(&args.var_files)?);

        Ok(Self {
            config,
            target,
            platform,
            store,
            vars,
        })
    }

    pub fn ci(&self) -> Option<&'static str> {
        self.platform.map(|p| p.id())
    }

    pub fn require_repository(&self) -> Result<()> {
        if self.target.org.is_empty() {
            bail!("org is required: set --org, CI_PROJECT_NAMESPACE or base.org");
        }
        if self.target.repo.is_empty() {
            bail!("repo is required: set --repo, CI_PROJECT_NAME or base.repo");
        }
        Ok(())
    }
}

/// Find the merge request of `target.sha1` when its number is still unknown.
///
/// A failed or empty lookup is only a warning; the target keeps MR 0.
pub async fn lookup_mr_number(target: &mut Target, store: &dyn CommentStore) {
    if target.mr_number != 0 || target.sha1.is_empty() {
        return;
    }
    match store
        .find_mr_for_commit(&target.org, &target.repo, &target.sha1)
        .await
    {
        Ok(Some(mr_number)) => target.mr_number = mr_number,
        Ok(None) => obs::emit_mr_lookup_failed(
            &target.org,
            &target.repo,
            &target.sha1,
            &"sha is not associated with a merge request",
        ),
        Err(err) => obs::emit_mr_lookup_failed(&target.org, &target.repo, &target.sha1, &err),
    }
}

fn build_store(
    args: &CommonArgs,
    config: &Config,
    target: &Target,
    getenv: &dyn Fn(&str) -> String,
) -> Result<Box<dyn CommentStore>> {
    let dry_run = || DryRunStore::new(args.silent, &target.sha1);
    if args.dry_run {
        return Ok(Box::new(dry_run()));
    }

    let token = non_empty(args.token.clone())
        .or_else(|| non_empty(Some(getenv("GITLAB_ACCESS_TOKEN"))));
    let Some(token) = token else {
        if args.skip_no_token || config.skip_no_token {
            debug!(event = "store.dry_run", reason = "no token");
            return Ok(Box::new(dry_run()));
        }
        bail!("gitlab token is missing: set --token, GITLAB_TOKEN or GITLAB_ACCESS_TOKEN");
    };

    let base_url = non_empty(args.gitlab_base_url.clone())
        .or_else(|| non_empty(Some(getenv("CI_SERVER_URL"))))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    debug!(event = "store.gitlab", base_url = %base_url);
    let client = GitLabClient::new(GitLabClientConfig {
        base_url,
        token,
        ..Default::default()
    })
    .context("initialize the GitLab client")?;
    Ok(Box::new(client))
}
