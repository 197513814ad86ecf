//! Wrapped command execution.

use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Exit code reported when the command could not be started at all,
/// matching what shells report for "command not found".
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Exit code reported when the command ended without one (killed by signal).
pub const NO_EXIT_CODE: i32 = -1;

const READ_CHUNK: usize = 8192;

/// Command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecParams {
    pub cmd: String,
    pub args: Vec<String>,
}

impl ExecParams {
    /// Split a non-empty argv into program and arguments.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (cmd, args) = argv.split_first()?;
        Some(Self {
            cmd: cmd.clone(),
            args: args.to_vec(),
        })
    }

    /// Shell-quoted form, safe to paste into a terminal.
    pub fn quoted(&self) -> String {
        shell_words::join(std::iter::once(&self.cmd).chain(&self.args))
    }

    /// Program and arguments joined by single spaces.
    pub fn joined(&self) -> String {
        std::iter::once(self.cmd.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    /// Shell-quoted command line
    pub cmd: String,
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr interleaved in arrival order
    pub combined_output: String,
}

/// The command could not be run to completion.
///
/// `result` is still usable: it carries an exit code and the error text as
/// stderr so a comment can describe the failure.
#[derive(Error, Debug)]
#[error("run `{}`: {source}", .result.cmd)]
pub struct ExecError {
    pub result: ExecResult,
    #[source]
    pub source: std::io::Error,
}

impl ExecError {
    fn new(cmd: String, exit_code: i32, source: std::io::Error) -> Self {
        let message = source.to_string();
        Self {
            result: ExecResult {
                exit_code,
                cmd,
                stdout: String::new(),
                stderr: message.clone(),
                combined_output: message,
            },
            source,
        }
    }
}

/// Runs a command with inherited stdin, capturing stdout and stderr.
///
/// With `tee` enabled (the default) output is also forwarded to this
/// process's own stdout and stderr as it arrives.
#[derive(Debug, Clone, Copy)]
pub struct CommandRunner {
    tee: bool,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self { tee: true }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture only, without forwarding output.
    pub fn quiet() -> Self {
        Self { tee: false }
    }

    pub async fn run(&self, params: &ExecParams) -> Result<ExecResult, ExecError> {
        let cmd = params.quoted();
        debug!(event = "exec.start", cmd = %cmd);

        let mut child = Command::new(&params.cmd)
            .args(&params.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::new(cmd.clone(), SPAWN_FAILURE_EXIT_CODE, source))?;

        let combined = Mutex::new(Vec::new());
        let pumped = tokio::try_join!(
            pump(
                child.stdout.take(),
                self.tee.then(tokio::io::stdout),
                &combined
            ),
            pump(
                child.stderr.take(),
                self.tee.then(tokio::io::stderr),
                &combined
            ),
        );
        let (stdout, stderr) = match pumped {
            Ok(streams) => streams,
            Err(source) => {
                child.kill().await.ok();
                return Err(ExecError::new(cmd, NO_EXIT_CODE, source));
            }
        };

        let status = child
            .wait()
            .await
            .map_err(|source| ExecError::new(cmd.clone(), NO_EXIT_CODE, source))?;
        let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
        debug!(event = "exec.finished", cmd = %cmd, exit_code = exit_code);

        let combined = combined.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(ExecResult {
            exit_code,
            cmd,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            combined_output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

/// Copy `reader` to `sink` chunk by chunk, capturing everything read.
///
/// A failing sink is dropped; capture continues.
async fn pump<R, W>(
    reader: Option<R>,
    mut sink: Option<W>,
    combined: &Mutex<Vec<u8>>,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };
    let mut captured = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        if let Some(out) = sink.as_mut() {
            if out.write_all(chunk).await.is_err() || out.flush().await.is_err() {
                sink = None;
            }
        }
        captured.extend_from_slice(chunk);
        combined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }
    Ok(captured)
}
