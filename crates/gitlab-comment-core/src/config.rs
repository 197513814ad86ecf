//! Configuration file model and discovery.
//!
//! The file is TOML; see `gitlab-comment init` for a commented sample.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// File names probed, in order, in every directory from the working
/// directory up to the filesystem root.
pub const CONFIG_FILE_NAMES: [&str; 2] = [".gitlab-comment.toml", "gitlab-comment.toml"];

/// Parsed configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base: Option<BaseConfig>,
    pub skip_no_token: bool,
    pub update_order: ScanOrder,
    pub vars: Map<String, Value>,
    /// Helper snippets overriding or extending the built-in ones
    pub templates: HashMap<String, String>,
    pub post: HashMap<String, PostConfig>,
    /// Ordered rule lists keyed by template key
    pub exec: HashMap<String, Vec<ExecRule>>,
    /// Hide conditions keyed by hide key
    pub hide: HashMap<String, String>,
}

/// Fallback repository identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BaseConfig {
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub repo: String,
}

/// One guarded entry of an `exec` rule list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecRule {
    pub when: String,
    pub template: String,
    pub template_for_too_long: String,
    pub dont_comment: bool,
    pub update_condition: String,
    pub embedded_var_names: Vec<String>,
}

/// A `post` entry: either a bare template string or a full table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PostConfig {
    Template(String),
    Detailed(PostTemplate),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostTemplate {
    pub template: String,
    pub template_for_too_long: String,
    pub embedded_var_names: Vec<String>,
    pub update_condition: String,
}

impl PostConfig {
    pub fn into_template(self) -> PostTemplate {
        match self {
            PostConfig::Template(template) => PostTemplate {
                template,
                ..PostTemplate::default()
            },
            PostConfig::Detailed(detailed) => detailed,
        }
    }
}

/// Order in which existing notes are judged against an update condition.
///
/// `FirstMatch` walks the store's native order; `LastMatch` walks it
/// backwards. Either way at most one note is selected.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    #[default]
    FirstMatch,
    LastMatch,
}

impl std::str::FromStr for ScanOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_match" => Ok(ScanOrder::FirstMatch),
            "last_match" => Ok(ScanOrder::LastMatch),
            other => Err(ConfigError::InvalidUpdateOrder(other.to_string())),
        }
    }
}

impl Config {
    /// Parse configuration text. `origin` only labels errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Read `explicit` if given, otherwise the first discovered file, otherwise
    /// an empty configuration.
    pub fn find_and_read(explicit: Option<&Path>, wd: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::read(path),
            None => match find(wd) {
                Some(path) => Self::read(&path),
                None => Ok(Self::default()),
            },
        }
    }
}

/// Find the nearest configuration file at or above `wd`.
pub fn find(wd: &Path) -> Option<PathBuf> {
    wd.ancestors()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
