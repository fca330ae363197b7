//! Import extraction and dependency-edge resolution.
//!
//! A lightweight line scanner pulls import targets out of source text, and
//! a resolver matches those targets against the set of tracked paths to
//! produce [`DependencyEdge`]s. Imports that do not resolve to a tracked
//! file (stdlib, third-party packages) are dropped silently.

use std::collections::HashSet;

use crate::models::{DependencyEdge, EdgeKind};

/// Extract raw import targets from source text.
///
/// Targets are returned as written (dotted module paths for Python, relative
/// specifiers for JS), to be resolved against tracked paths separately.
pub fn extract_imports(content: &str, language: &str) -> Vec<String> {
    let mut imports = Vec::new();
    for line in content.lines() {
        let line = line.trim_start();
        match language {
            "python" => {
                if let Some(rest) = line.strip_prefix("from ") {
                    if let Some(module) = rest.split_whitespace().next() {
                        imports.push(module.trim_start_matches('.').to_string());
                    }
                } else if let Some(rest) = line.strip_prefix("import ") {
                    for part in rest.split(',') {
                        if let Some(module) = part.split_whitespace().next() {
                            imports.push(module.to_string());
                        }
                    }
                }
            }
            "javascript" | "typescript" => {
                if line.starts_with("import ") || line.contains("require(") {
                    if let Some(target) = quoted_target(line) {
                        imports.push(target);
                    }
                }
            }
            "rust" => {
                if let Some(rest) = line.strip_prefix("use crate::") {
                    let module: String = rest
                        .chars()
                        .take_while(|c| c.is_alphanumeric() || *c == '_')
                        .collect();
                    if !module.is_empty() {
                        imports.push(module);
                    }
                } else if let Some(rest) = line.strip_prefix("mod ") {
                    let module = rest.trim_end_matches(';').trim();
                    if module.chars().all(|c| c.is_alphanumeric() || c == '_') && !module.is_empty()
                    {
                        imports.push(module.to_string());
                    }
                }
            }
            "java" | "csharp" => {
                let keyword = if language == "java" { "import " } else { "using " };
                if let Some(rest) = line.strip_prefix(keyword) {
                    let target = rest.trim_end_matches(';').trim();
                    if !target.is_empty() {
                        imports.push(target.to_string());
                    }
                }
            }
            "c" | "cpp" => {
                if let Some(rest) = line.strip_prefix("#include \"") {
                    if let Some(end) = rest.find('"') {
                        imports.push(rest[..end].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    imports
}

/// Pull the first single- or double-quoted string out of a line.
fn quoted_target(line: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if let Some(start) = line.find(quote) {
            let rest = &line[start + 1..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

/// Resolve raw import targets to dependency edges against tracked paths.
///
/// A target matches a tracked file when its last segment equals the file
/// stem, or when the target interpreted as a path is a suffix of the tracked
/// path. Self-edges and duplicate matches are dropped.
pub fn resolve_dependencies(
    from_path: &str,
    imports: &[String],
    tracked: &[String],
) -> Vec<DependencyEdge> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut edges = Vec::new();

    for import in imports {
        let last_segment = import
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(import.as_str())
            .trim();
        if last_segment.is_empty() {
            continue;
        }
        let as_path = import.replace('.', "/");

        for candidate in tracked {
            if candidate == from_path {
                continue;
            }
            let stem_path = strip_extension(candidate);
            let matches = file_stem(candidate) == last_segment || stem_path.ends_with(&as_path);
            if matches && seen.insert(candidate.clone()) {
                edges.push(DependencyEdge {
                    from: from_path.to_string(),
                    to: candidate.clone(),
                    kind: EdgeKind::Import,
                });
            }
        }
    }

    edges
}

/// Strip at most one extension, and only off the final path segment.
/// Dots inside directory names are left alone.
fn strip_extension(path: &str) -> &str {
    let seg_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[seg_start..].rfind('.') {
        Some(dot) => &path[..seg_start + dot],
        None => path,
    }
}

fn file_stem(path: &str) -> &str {
    let stripped = strip_extension(path);
    stripped.rsplit('/').next().unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_imports() {
        let source = "import os\nimport utils, helpers\nfrom models import Widget\n";
        let imports = extract_imports(source, "python");
        assert_eq!(imports, vec!["os", "utils", "helpers", "models"]);
    }

    #[test]
    fn test_js_imports() {
        let source = "import { a } from './utils';\nconst b = require(\"../models\");\n";
        let imports = extract_imports(source, "javascript");
        assert_eq!(imports, vec!["./utils", "../models"]);
    }

    #[test]
    fn test_rust_imports() {
        let source = "use crate::ledger::FileLedger;\nmod chunker;\nuse std::fmt;\n";
        let imports = extract_imports(source, "rust");
        assert_eq!(imports, vec!["ledger", "chunker"]);
    }

    #[test]
    fn test_resolve_by_stem() {
        let tracked = vec!["src/utils.py".to_string(), "src/models.py".to_string()];
        let edges = resolve_dependencies(
            "src/app.py",
            &["utils".to_string(), "os".to_string()],
            &tracked,
        );
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "src/app.py");
        assert_eq!(edges[0].to, "src/utils.py");
        assert_eq!(edges[0].kind, EdgeKind::Import);
    }

    #[test]
    fn test_resolve_dotted_path() {
        let tracked = vec!["pkg/sub/models.py".to_string()];
        let edges = resolve_dependencies("pkg/app.py", &["sub.models".to_string()], &tracked);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "pkg/sub/models.py");
    }

    #[test]
    fn test_double_extension_strips_once() {
        // "a.py.py" has stem "a.py", so a bare "a" import must not match it.
        let tracked = vec!["src/a.py.py".to_string(), "src/a.py".to_string()];
        let edges = resolve_dependencies("src/app.py", &["a".to_string()], &tracked);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "src/a.py");
    }

    #[test]
    fn test_dotted_directory_not_treated_as_extension() {
        let tracked = vec!["src/v1.2/models.py".to_string()];
        let edges = resolve_dependencies("src/app.py", &["models".to_string()], &tracked);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "src/v1.2/models.py");
    }

    #[test]
    fn test_no_self_edge_no_duplicates() {
        let tracked = vec!["src/utils.py".to_string()];
        let edges = resolve_dependencies(
            "src/utils.py",
            &["utils".to_string(), "utils".to_string()],
            &tracked,
        );
        assert!(edges.is_empty());
    }
}
