//! Rule group sources: rule files on disk, the live server's rule listing,
//! and ad-hoc expressions passed on the command line.

use crate::error::{Error, Result};
use crate::models::api::{ApiResponse, RulesData};
use crate::models::rule_file::RuleFile;
use crate::models::{Rule, RuleGroup};
use crate::probe::BasicAuth;
use glob::glob;
use rayon::prelude::*;
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Group name used for expressions given on the command line.
pub const INLINE_GROUP: &str = "[inline]";
/// File name used for expressions given on the command line.
pub const INLINE_FILE: &str = "[manual]";

/// Load every rule file matching `pattern` (relative to `root`).
///
/// Files are parsed in parallel; groups come back ordered by file path and
/// then by their position in the file.
pub fn load_rule_files(root: &Path, pattern: &str) -> Result<Vec<RuleGroup>> {
    let abs_glob = root.join(pattern);
    let abs_pattern = abs_glob.to_string_lossy().to_string();
    let entries = glob(&abs_pattern)
        .map_err(|e| Error::Configuration(format!("invalid rule file pattern '{}': {}", pattern, e)))?;

    let mut targets: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::RuleFile {
            path: e.path().to_path_buf(),
            message: e.error().to_string(),
        })?;
        if path.is_file() {
            targets.push(path);
        }
    }
    targets.sort();
    debug!(pattern = %pattern, files = targets.len(), "discovered rule files");

    let per_file: Vec<Vec<RuleGroup>> = targets
        .par_iter()
        .map(|path| parse_rule_file(root, path))
        .collect::<Result<Vec<_>>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

fn parse_rule_file(root: &Path, path: &Path) -> Result<Vec<RuleGroup>> {
    let data = fs::read_to_string(path).map_err(|e| Error::RuleFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: RuleFile = serde_yaml::from_str(&data).map_err(|e| Error::RuleFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let file = display_path(root, path);
    Ok(parsed
        .groups
        .into_iter()
        .map(|g| g.into_rule_group(&file))
        .collect())
}

fn display_path(root: &Path, path: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// List the alerting and recording rules currently loaded by the server.
pub async fn fetch_rule_groups(
    client: &Client,
    url: &str,
    auth: Option<&BasicAuth>,
) -> Result<Vec<RuleGroup>> {
    let endpoint = format!("{}/api/v1/rules", url.trim_end_matches('/'));
    let resp = BasicAuth::apply(auth, client.get(&endpoint))
        .send()
        .await
        .map_err(|e| Error::RuleSource(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::RuleSource(e.to_string()))?;
    let parsed: ApiResponse<RulesData> = serde_json::from_str(&body)
        .map_err(|e| Error::RuleSource(format!("HTTP {}: invalid response: {}", status, e)))?;
    let data = parsed
        .into_data()
        .map_err(|e| Error::RuleSource(format!("HTTP {}: {}", status, e)))?;
    Ok(data.groups.into_iter().map(RuleGroup::from).collect())
}

/// Wrap command-line expressions into a single synthetic group.
pub fn inline_rule_group(expressions: &[String]) -> RuleGroup {
    RuleGroup {
        name: INLINE_GROUP.to_string(),
        file: INLINE_FILE.to_string(),
        rules: expressions
            .iter()
            .enumerate()
            .map(|(i, e)| Rule::new(format!("query-{}", i), e.as_str()))
            .collect(),
    }
}
