//! Core data models used throughout docledger.
//!
//! These types represent the files, dependency edges, code chunks, change
//! records, and documentation artifacts that flow through the ledger,
//! index, and invalidation pipeline.

use std::collections::HashSet;
use std::fmt;

/// Per-file ledger entry tracking content identity.
///
/// Created on first scan, hash-updated on content change, marked `deleted`
/// when absent from a scan. Never physically removed — deleted records are
/// kept as tombstones for audit and impact history. A path that reappears
/// after deletion re-enters tracking as a fresh add with a fresh hash, not
/// a resurrection of the old identity.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: String,
    pub language: String,
    pub size: i64,
    pub last_seen_at: i64,
    pub deleted: bool,
    /// Optimistic-concurrency version; bumped on every mutation.
    pub version: i64,
}

/// Kind of a directed dependency edge between two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Import,
    Inherit,
    Reference,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Import => "import",
            EdgeKind::Inherit => "inherit",
            EdgeKind::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> Option<EdgeKind> {
        match s {
            "import" => Some(EdgeKind::Import),
            "inherit" => Some(EdgeKind::Inherit),
            "reference" => Some(EdgeKind::Reference),
            _ => None,
        }
    }
}

/// Directed dependency edge: `from` depends on `to`.
///
/// Edges between the same pair with different kinds are distinct. The graph
/// may contain cycles (mutual imports); traversal is always cycle-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// A code chunk extracted from a source file.
///
/// Owned exclusively by the file that produced it; tombstoned when the
/// owning file changes or is deleted.
#[derive(Debug, Clone)]
pub struct CodeChunk {
    /// Derived from `(path, name, start_line)`; stable across re-scans of
    /// unchanged content.
    pub id: String,
    pub path: String,
    pub name: String,
    pub start_line: i64,
    pub end_line: i64,
    pub language: String,
    pub text: String,
    /// SHA-256 of `text`, used for idempotent re-embedding.
    pub hash: String,
    pub embedded: bool,
}

impl CodeChunk {
    /// Chunk identifier format shared with the persisted `chunks` table.
    pub fn derive_id(path: &str, name: &str, start_line: i64) -> String {
        format!("{}:{}:{}", path, name, start_line)
    }
}

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<ChangeType> {
        match s {
            "added" => Some(ChangeType::Added),
            "modified" => Some(ChangeType::Modified),
            "deleted" => Some(ChangeType::Deleted),
            _ => None,
        }
    }
}

/// Which detector observed a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Content-hash comparison — ground truth.
    Hash,
    /// Version-control diff — cross-checked against the hash observation.
    Vcs,
}

impl ChangeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOrigin::Hash => "hash",
            ChangeOrigin::Vcs => "vcs",
        }
    }
}

/// Append-only audit record of a single observed file change.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub path: String,
    pub change_type: ChangeType,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
    pub detected_at: i64,
    pub origin: ChangeOrigin,
}

/// A `(path, status)` pair reported by a version-control change source.
#[derive(Debug, Clone)]
pub struct VcsChange {
    pub path: String,
    pub status: ChangeType,
}

/// Result of a reverse-dependency closure computation.
#[derive(Debug, Clone, Default)]
pub struct ImpactSet {
    /// Every file whose generated content could be affected, including the
    /// changed files themselves.
    pub files: HashSet<String>,
    /// True when a configured depth cap stopped the traversal early; the
    /// set is then a partial result, flagged rather than silently wrong.
    pub truncated: bool,
}

/// Lifecycle status of a documentation artifact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Fresh,
    Stale,
    Superseded,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Fresh => "fresh",
            ArtifactStatus::Stale => "stale",
            ArtifactStatus::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<ArtifactStatus> {
        match s {
            "fresh" => Some(ArtifactStatus::Fresh),
            "stale" => Some(ArtifactStatus::Stale),
            "superseded" => Some(ArtifactStatus::Superseded),
            _ => None,
        }
    }
}

/// A generated documentation version.
///
/// `fingerprint` is an order-independent digest over the `(path, hash)`
/// pairs of the artifact's contributing set at generation time. A `fresh`
/// artifact whose fingerprint matches the current contributing set needs no
/// regeneration. Superseded versions are kept for rollback and feedback
/// correlation; `id` is the stable identifier feedback references.
#[derive(Debug, Clone)]
pub struct DocumentationArtifact {
    pub id: i64,
    pub doc_type: DocType,
    pub version: i64,
    pub content: String,
    pub generated_at: i64,
    pub fingerprint: String,
    pub status: ArtifactStatus,
}

/// Closed set of documentation types.
///
/// New doc types are new variants with an associated contributing-set
/// selector in the config, not subclasses of anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocType {
    Readme,
    Api,
    Architecture,
    Onboarding,
    Changelog,
    /// Per-module documentation for the named module.
    Module(String),
}

impl DocType {
    /// Parse a doc-type name as it appears in config and on the CLI.
    ///
    /// Accepts case-insensitive names (`readme`, `API`, ...) and
    /// `module:<name>` for per-module docs.
    pub fn parse(s: &str) -> Option<DocType> {
        if let Some(module) = s.strip_prefix("module:") {
            if module.is_empty() {
                return None;
            }
            return Some(DocType::Module(module.to_string()));
        }
        match s.to_ascii_lowercase().as_str() {
            "readme" => Some(DocType::Readme),
            "api" => Some(DocType::Api),
            "architecture" => Some(DocType::Architecture),
            "onboarding" => Some(DocType::Onboarding),
            "changelog" => Some(DocType::Changelog),
            _ => None,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocType::Readme => write!(f, "README"),
            DocType::Api => write!(f, "API"),
            DocType::Architecture => write!(f, "ARCHITECTURE"),
            DocType::Onboarding => write!(f, "ONBOARDING"),
            DocType::Changelog => write!(f, "CHANGELOG"),
            DocType::Module(name) => write!(f, "module:{}", name),
        }
    }
}

/// A chunk returned from similarity search, with its score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub path: String,
    pub name: String,
    pub start_line: i64,
    pub end_line: i64,
    pub language: String,
    pub text: String,
    pub score: f32,
}
