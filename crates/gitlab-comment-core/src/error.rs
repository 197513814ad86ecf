//! Error taxonomy for the comment lifecycle engine.

use thiserror::Error;

/// A condition expression could not be compiled.
///
/// This is a configuration defect and aborts the whole selection or
/// resolution step that needed the expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid condition `{expression}`: {message}")]
pub struct ConditionSyntaxError {
    pub expression: String,
    pub message: String,
}

/// A compiled condition failed while evaluating one parameter tree.
///
/// Only the candidate being judged is affected; callers skip it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("evaluate condition: {0}")]
pub struct ConditionEvalError(pub String);

/// A template or helper snippet failed to parse or render.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("render template {name}: {message}")]
pub struct RenderError {
    pub name: String,
    pub message: String,
}

/// Errors from the remote comment store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("request failed: {0}")]
    Transport(String),

    /// The API answered with a non-success status
    #[error("GitLab API error ({status}) on {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// The response body could not be decoded
    #[error("decode response: {0}")]
    Decode(String),

    /// The store cannot perform this operation at all
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Errors while locating or parsing the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid update_order `{0}` (expected first_match or last_match)")]
    InvalidUpdateOrder(String),
}

/// Errors that abort posting a comment for one outcome.
#[derive(Error, Debug)]
pub enum CommentError {
    /// Unknown template, post or hide key
    #[error("config lookup failed: {0}")]
    ConfigLookup(String),

    #[error(transparent)]
    ConditionSyntax(#[from] ConditionSyntaxError),

    /// A rule guard failed at runtime; unlike update conditions this is fatal
    #[error("rule guard `{expression}`: {source}")]
    GuardEval {
        expression: String,
        #[source]
        source: ConditionEvalError,
    },

    #[error(transparent)]
    TemplateRender(#[from] RenderError),

    #[error("remote store: {0}")]
    RemoteStore(#[from] StoreError),

    #[error("encode metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CommentError>;

/// Result type for comment store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
