//! Line-oriented text search over a project tree.
//!
//! Two interchangeable backends produce the same `(file, line, content)`
//! hits: an external `rg` process bounded by a timeout, and an in-process
//! walk using `ignore` + `regex`. A timeout, a missing binary or an `rg` exit
//! code other than 0/1 is an error; the engine logs it and reports no hits.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration
};

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use tokio::process::Command;

use super::CodeHit;
use crate::{
    config::{BackendKind, SearchConfig},
    error::{AppResult, search_backend_error}
};

/// Path fragments that mark test code
const TEST_PATH_MARKERS: &[&str] = &["/test/", "/tests/", "/spec/", "/specs/"];
/// File name suffixes that mark test code
const TEST_FILE_SUFFIXES: &[&str] = &["_test.rb", "_spec.rb", "test_helper.rb", "spec_helper.rb"];

/// Whether a root-relative path belongs to the test suite
pub fn is_test_path(relative: &str) -> bool {
    let rooted = format!("/{}", relative.trim_start_matches("./"));
    TEST_PATH_MARKERS.iter().any(|m| rooted.contains(m))
        || TEST_FILE_SUFFIXES.iter().any(|s| rooted.ends_with(s))
}

/// Search implementation
#[derive(Debug, Clone)]
pub enum SearchBackend {
    Ripgrep {
        program: String,
        timeout: Duration
    },
    Walk
}

impl SearchBackend {
    pub fn from_config(config: &SearchConfig) -> Self {
        match config.backend {
            BackendKind::Ripgrep => Self::Ripgrep {
                program: config.ripgrep_path.clone(),
                timeout: Duration::from_secs(config.timeout_secs.max(1))
            },
            BackendKind::Walk => Self::Walk
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ripgrep {
                ..
            } => "ripgrep",
            Self::Walk => "walk"
        }
    }

    /// Case-insensitive regex search in files with extension `file_ext`.
    ///
    /// Test paths are dropped and hits come back sorted by `(file, line)`.
    pub async fn search(
        &self,
        root: &Path,
        pattern: &str,
        file_ext: &str
    ) -> AppResult<Vec<CodeHit>> {
        let mut hits = match self {
            Self::Ripgrep {
                program,
                timeout
            } => ripgrep(program, *timeout, root, pattern, file_ext).await?,
            Self::Walk => walk(root, pattern, file_ext).await?
        };
        hits.retain(|h| !is_test_path(&h.file));
        hits.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        hits.dedup();
        Ok(hits)
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

async fn ripgrep(
    program: &str,
    timeout: Duration,
    root: &Path,
    pattern: &str,
    file_ext: &str
) -> AppResult<Vec<CodeHit>> {
    let mut cmd = Command::new(program);
    cmd.arg("--line-number")
        .arg("--with-filename")
        .arg("--no-heading")
        .arg("--color")
        .arg("never")
        .arg("--no-messages")
        .arg("-i")
        .arg("--type-add")
        .arg(format!("target:*.{}", file_ext))
        .arg("--type")
        .arg("target")
        .arg("--")
        .arg(pattern)
        .arg(root)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            search_backend_error(format!("ripgrep timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| search_backend_error(format!("failed to run {}: {}", program, e)))?;
    match output.status.code() {
        Some(0) => {}
        // 1 = no matches
        Some(1) => return Ok(Vec::new()),
        code => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(search_backend_error(format!(
                "ripgrep exited with {:?}: {}",
                code,
                stderr.trim()
            )));
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|line| parse_rg_line(root, line))
        .collect())
}

/// `path:line:content`
fn parse_rg_line(root: &Path, line: &str) -> Option<CodeHit> {
    let mut parts = line.splitn(3, ':');
    let path = parts.next()?;
    let line_no = parts.next()?.parse().ok()?;
    let content = parts.next().unwrap_or_default();
    Some(CodeHit {
        file:    relative(root, Path::new(path)),
        line:    line_no,
        content: content.trim().to_string()
    })
}

async fn walk(root: &Path, pattern: &str, file_ext: &str) -> AppResult<Vec<CodeHit>> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| search_backend_error(format!("invalid search pattern: {}", e)))?;
    let root = root.to_path_buf();
    let ext = file_ext.to_string();
    tokio::task::spawn_blocking(move || walk_blocking(&root, &re, &ext))
        .await
        .map_err(|e| search_backend_error(format!("walk search task failed: {}", e)))
}

fn walk_blocking(root: &Path, re: &Regex, file_ext: &str) -> Vec<CodeHit> {
    let files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|e| e == file_ext))
        .collect();

    files
        .par_iter()
        .flat_map_iter(|path| {
            let file = relative(root, path);
            let content = std::fs::read_to_string(path).unwrap_or_default();
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| re.is_match(line))
                .map(|(idx, line)| CodeHit {
                    file:    file.clone(),
                    line:    idx + 1,
                    content: line.trim().to_string()
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_path() {
        assert!(is_test_path("spec/models/user_spec.rb"));
        assert!(is_test_path("test/test_helper.rb"));
        assert!(is_test_path("app/models/user_test.rb"));
        assert!(is_test_path("engines/billing/spec/support/x.rb"));
        assert!(!is_test_path("app/models/user.rb"));
        assert!(!is_test_path("app/models/contest.rb"));
    }

    #[test]
    fn test_parse_rg_line_keeps_colons_in_content() {
        let root = Path::new("/srv/app");
        let hit = parse_rg_line(root, "/srv/app/app/models/user.rb:12:  scope :active, -> { where(a: 1) }")
            .expect("parsed");
        assert_eq!(hit.file, "app/models/user.rb");
        assert_eq!(hit.line, 12);
        assert_eq!(hit.content, "scope :active, -> { where(a: 1) }");
    }

    #[test]
    fn test_parse_rg_line_rejects_noise() {
        assert!(parse_rg_line(Path::new("/"), "binary file matches").is_none());
    }
}
