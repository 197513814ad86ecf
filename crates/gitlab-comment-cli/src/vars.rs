//! `--var name:value` and `--var-file name:path` parsing.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

fn split_pair<'a>(flag: &str, raw: &'a str) -> Result<(&'a str, &'a str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("invalid {flag} value {raw:?}: expected <name>:<value>"),
    }
}

/// Parse `--var` values. Only the first `:` separates name from value.
pub fn parse_vars(values: &[String]) -> Result<Map<String, Value>> {
    let mut vars = Map::new();
    for raw in values {
        let (name, value) = split_pair("--var", raw)?;
        vars.insert(name.to_string(), Value::String(value.to_string()));
    }
    Ok(vars)
}

/// Parse `--var-file` values, reading each file's content as the value.
pub fn parse_var_files(values: &[String]) -> Result<Map<String, Value>> {
    let mut vars = Map::new();
    for raw in values {
        let (name, path) = split_pair("--var-file", raw)?;
        let content = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("read the value of the variable {name} from {path}"))?;
        vars.insert(name.to_string(), Value::String(content));
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["env:prod".to_string(), "url:https://x:8080".to_string()]).unwrap();
        assert_eq!(vars["env"], "prod");
        assert_eq!(vars["url"], "https://x:8080");
    }

    #[test]
    fn test_parse_vars_rejects_missing_separator() {
        assert!(parse_vars(&["env".to_string()]).is_err());
        assert!(parse_vars(&[":value".to_string()]).is_err());
    }

    #[test]
    fn test_parse_var_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.txt");
        std::fs::write(&path, "3 to add").unwrap();
        let vars = parse_var_files(&[format!("plan:{}", path.display())]).unwrap();
        assert_eq!(vars["plan"], "3 to add");
    }

    #[test]
    fn test_missing_var_file() {
        let err = parse_var_files(&["plan:/nonexistent/plan.txt".to_string()]).unwrap_err();
        assert!(err.to_string().contains("plan"));
    }
}
