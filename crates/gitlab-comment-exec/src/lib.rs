//! Command execution for `gitlab-comment exec`.
//!
//! Runs the wrapped command, forwarding its output live while capturing
//! stdout, stderr and their interleaving for the comment template.

pub mod runner;

pub use runner::{
    CommandRunner, ExecError, ExecParams, ExecResult, NO_EXIT_CODE, SPAWN_FAILURE_EXIT_CODE,
};
