//! gitlab-comment - CI status notes on GitLab merge requests
//!
//! ## Commands
//!
//! - `exec`: run a command and comment on its outcome
//! - `post`: post a rendered template
//! - `hide`: hide notes matching a condition
//! - `init`: write a sample configuration file

mod init;
mod platform;
mod session;
mod vars;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gitlab_comment_core::condition::ExprEngine;
use gitlab_comment_core::obs::{self, CommentSpan};
use gitlab_comment_core::{
    helper_templates, lookup_rules, metadata, telemetry, CommentEngine, CommentError,
    ExecCommentParams, HelperInputs, HideRequest, MergeRequestRef, PostTemplate,
    PostTemplateParams, Renderer,
};
use gitlab_comment_exec::{CommandRunner, ExecParams, ExecResult};
use tracing::{error, info, Level};

use crate::session::{env_var, Session};

#[derive(Parser)]
#[command(name = "gitlab-comment")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Post, update and hide CI notes on GitLab merge requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand that talks to GitLab.
#[derive(Args, Debug, Clone, Default)]
struct CommonArgs {
    /// Group or user owning the project
    #[arg(long)]
    org: Option<String>,

    /// Project name
    #[arg(long)]
    repo: Option<String>,

    /// GitLab access token (falls back to GITLAB_ACCESS_TOKEN)
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitLab base URL (falls back to CI_SERVER_URL, then https://gitlab.com)
    #[arg(long, env = "GITLAB_COMMENT_BASE_URL")]
    gitlab_base_url: Option<String>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Merge request IID
    #[arg(long)]
    mr: Option<u64>,

    /// Commit SHA
    #[arg(long)]
    sha1: Option<String>,

    /// Template variable, as <name>:<value>
    #[arg(long = "var", value_name = "NAME:VALUE")]
    vars: Vec<String>,

    /// Template variable read from a file, as <name>:<path>
    #[arg(long = "var-file", value_name = "NAME:PATH")]
    var_files: Vec<String>,

    /// Print notes to stderr instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Fall back to dry-run when no token is set
    #[arg(long)]
    skip_no_token: bool,

    /// Suppress dry-run output and posting errors
    #[arg(short, long)]
    silent: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and comment on its outcome
    Exec {
        #[command(flatten)]
        common: CommonArgs,

        /// Key of the exec rules to use
        #[arg(short = 'k', long, default_value = "default")]
        template_key: String,

        /// Template used instead of the configured rules
        #[arg(long)]
        template: Option<String>,

        /// Run the command without commenting
        #[arg(long, env = "GITLAB_COMMENT_SKIP")]
        skip_comment: bool,

        /// Command to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Post a rendered template
    Post {
        #[command(flatten)]
        common: CommonArgs,

        /// Key of the post template to use
        #[arg(short = 'k', long, default_value = "default")]
        template_key: String,

        /// Template (otherwise read from stdin, then from the config)
        #[arg(long)]
        template: Option<String>,
    },

    /// Hide notes matching a condition
    Hide {
        #[command(flatten)]
        common: CommonArgs,

        /// Key of the hide condition to use
        #[arg(long, default_value = "default")]
        hide_key: String,

        /// Condition used instead of the configured one
        #[arg(long)]
        condition: Option<String>,
    },

    /// Write a sample gitlab-comment.toml into the current directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        telemetry::parse_level(&cli.log_level)
            .with_context(|| format!("invalid log level {:?}", cli.log_level))?
    };
    telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Exec {
            common,
            template_key,
            template,
            skip_comment,
            command,
        } => {
            let code = cmd_exec(&common, template_key, template, skip_comment, &command).await;
            std::process::exit(code)
        }
        Commands::Post {
            common,
            template_key,
            template,
        } => cmd_post(&common, &template_key, template).await,
        Commands::Hide {
            common,
            hide_key,
            condition,
        } => cmd_hide(&common, &hide_key, condition).await,
        Commands::Init => cmd_init(),
    }
}

fn renderer() -> Renderer {
    Renderer::new(env_var)
}

/// Run the command, comment on it, and return its exit code.
///
/// Commenting failures are reported on stderr but never change the code.
async fn cmd_exec(
    common: &CommonArgs,
    template_key: String,
    template: Option<String>,
    skip_comment: bool,
    command: &[String],
) -> i32 {
    let Some(params) = ExecParams::from_argv(command) else {
        eprintln!("gitlab-comment error: no command given");
        return 1;
    };
    let result = match CommandRunner::new().run(&params).await {
        Ok(result) => result,
        Err(err) => {
            error!(event = "exec.failed", error = %err);
            err.result
        }
    };
    if skip_comment {
        return result.exit_code;
    }

    if let Err(err) = comment_on_exec(common, template_key, template, &params, &result).await {
        if !common.silent {
            eprintln!("gitlab-comment error: {err:#}");
        }
    }
    result.exit_code
}

async fn comment_on_exec(
    common: &CommonArgs,
    template_key: String,
    template: Option<String>,
    exec: &ExecParams,
    result: &ExecResult,
) -> Result<()> {
    let session = Session::open(common).await?;
    session.require_repository()?;
    let target = &session.target;
    let mr = MergeRequestRef::new(&target.org, &target.repo, target.mr_number);
    let _span = CommentSpan::enter("exec", &mr);

    let params = ExecCommentParams {
        exit_code: result.exit_code,
        command: result.cmd.clone(),
        join_command: exec.joined(),
        stdout: result.stdout.clone(),
        stderr: result.stderr.clone(),
        combined_output: result.combined_output.clone(),
        mr_number: target.mr_number,
        org: target.org.clone(),
        repo: target.repo.clone(),
        sha1: target.sha1.clone(),
        template_key,
        template: template.unwrap_or_default(),
        vars: session.vars.clone(),
    };
    let rules = lookup_rules(&session.config, &params)?;
    let helpers = helper_templates(&HelperInputs {
        ci: session.ci(),
        join_command: &params.join_command,
        combined_output: &params.combined_output,
        overrides: &session.config.templates,
    });

    let conditions = ExprEngine::new();
    let engine = CommentEngine::new(session.store.as_ref(), &conditions)
        .with_renderer(renderer())
        .with_scan_order(session.config.update_order)
        .with_ci_metadata(metadata::ci_metadata(session.ci(), &env_var));
    let report = engine.post_exec(&rules, &params, &helpers).await?;
    obs::emit_post_report(&mr, &report);
    Ok(())
}

/// Template from the flag, else stdin when piped, else `None`.
fn template_from_input(template: Option<String>) -> Result<Option<String>> {
    if let Some(template) = template.filter(|t| !t.is_empty()) {
        return Ok(Some(template));
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .context("read the template from standard input")?;
    Ok(Some(buf).filter(|t| !t.is_empty()))
}

async fn cmd_post(common: &CommonArgs, template_key: &str, template: Option<String>) -> Result<()> {
    let input = template_from_input(template)?;
    let session = Session::open(common).await?;
    session.require_repository()?;
    let target = &session.target;
    let mr = MergeRequestRef::new(&target.org, &target.repo, target.mr_number);
    let _span = CommentSpan::enter("post", &mr);

    let template = match input {
        Some(template) => PostTemplate {
            template,
            ..PostTemplate::default()
        },
        None => session
            .config
            .post
            .get(template_key)
            .cloned()
            .map(|post| post.into_template())
            .ok_or_else(|| {
                CommentError::ConfigLookup(format!("the template {template_key} isn't found"))
            })?,
    };

    let params = PostTemplateParams {
        mr_number: target.mr_number,
        org: target.org.clone(),
        repo: target.repo.clone(),
        sha1: target.sha1.clone(),
        template_key: template_key.to_string(),
        vars: session.vars.clone(),
    };
    let helpers = helper_templates(&HelperInputs {
        ci: session.ci(),
        join_command: "",
        combined_output: "",
        overrides: &session.config.templates,
    });

    let conditions = ExprEngine::new();
    let engine = CommentEngine::new(session.store.as_ref(), &conditions)
        .with_renderer(renderer())
        .with_scan_order(session.config.update_order)
        .with_ci_metadata(metadata::ci_metadata(session.ci(), &env_var));
    let report = engine
        .post_template(&template, &params, &helpers)
        .await
        .context("post a comment")?;
    obs::emit_post_report(&mr, &report);
    Ok(())
}

async fn cmd_hide(common: &CommonArgs, hide_key: &str, condition: Option<String>) -> Result<()> {
    let session = Session::open(common).await?;
    session.require_repository()?;
    let target = &session.target;
    if target.mr_number == 0 {
        bail!("merge request number is required: set --mr, CI_MERGE_REQUEST_IID or --sha1");
    }
    let condition = match condition.filter(|c| !c.is_empty()) {
        Some(condition) => condition,
        None => session
            .config
            .hide
            .get(hide_key)
            .cloned()
            .ok_or_else(|| CommentError::ConfigLookup(format!("invalid hide-key: {hide_key}")))?,
    };

    let mr = MergeRequestRef::new(&target.org, &target.repo, target.mr_number);
    let _span = CommentSpan::enter("hide", &mr);
    let request = HideRequest {
        mr: mr.clone(),
        sha1: target.sha1.clone(),
        condition,
        hide_key: hide_key.to_string(),
        vars: session.vars.clone(),
    };

    let conditions = ExprEngine::new();
    let engine = CommentEngine::new(session.store.as_ref(), &conditions)
        .with_scan_order(session.config.update_order);
    let report = engine.hide(&request).await.context("hide comments")?;
    obs::emit_hide_report(&mr, &report);
    Ok(())
}

fn cmd_init() -> Result<()> {
    let wd = std::env::current_dir().context("get the current directory")?;
    let path = init::write_sample(&wd)?;
    info!(event = "init.written", path = %path.display());
    println!("Created {}", path.display());
    Ok(())
}
