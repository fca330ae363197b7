//! Version-control change source.
//!
//! [`ChangeSource`] reports `(path, status)` pairs since a reference point.
//! The git implementation shells out to `git diff --name-status` (against a
//! ref) or `git status --porcelain` (working tree). These reports are only
//! advisory: the ledger cross-checks them against content hashes, which win
//! on disagreement.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{CoreError, CoreResult};
use crate::models::{ChangeType, VcsChange};

pub trait ChangeSource: Send + Sync {
    /// Changes since `since_ref`, or against the working tree when `None`.
    fn diff(&self, since_ref: Option<&str>) -> CoreResult<Vec<VcsChange>>;
}

pub struct GitChangeSource {
    root: PathBuf,
}

impl GitChangeSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn is_git_repo(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn run_git(&self, args: &[&str]) -> CoreResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| CoreError::Provider(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::Provider(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CoreError::Provider(format!("git output is not utf-8: {}", e)))
    }
}

impl ChangeSource for GitChangeSource {
    fn diff(&self, since_ref: Option<&str>) -> CoreResult<Vec<VcsChange>> {
        match since_ref {
            Some(git_ref) => {
                let output = self.run_git(&["diff", "--name-status", git_ref])?;
                Ok(parse_name_status(&output))
            }
            None => {
                let output = self.run_git(&["status", "--porcelain"])?;
                Ok(parse_porcelain(&output))
            }
        }
    }
}

/// Parse `git diff --name-status` output: one `X\tpath` line per change.
fn parse_name_status(output: &str) -> Vec<VcsChange> {
    let mut changes = Vec::new();
    for line in output.lines() {
        let mut parts = line.split('\t');
        let code = match parts.next() {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        let status = match parse_status_code(code) {
            Some(s) => s,
            None => continue,
        };
        // Renames carry old and new path; the new path is what we track.
        let path = match parts.last() {
            Some(p) if !p.is_empty() => p,
            _ => continue,
        };
        changes.push(VcsChange {
            path: path.to_string(),
            status,
        });
    }
    changes
}

/// Parse `git status --porcelain` output: `XY path` lines.
fn parse_porcelain(output: &str) -> Vec<VcsChange> {
    let mut changes = Vec::new();
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let code = line[..2].trim();
        let path = line[3..].trim();
        if path.is_empty() {
            continue;
        }
        let status = match parse_status_code(code) {
            Some(s) => s,
            None => continue,
        };
        // Rename entries look like "old -> new".
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        changes.push(VcsChange {
            path: path.to_string(),
            status,
        });
    }
    changes
}

/// Map a git status code to a change type.
///
/// Renames count as modifications of the new path; copies likewise.
pub(crate) fn parse_status_code(code: &str) -> Option<ChangeType> {
    match code.chars().next()? {
        'A' | '?' => Some(ChangeType::Added),
        'M' | 'R' | 'C' | 'U' | 'T' => Some(ChangeType::Modified),
        'D' => Some(ChangeType::Deleted),
        _ => None,
    }
}
