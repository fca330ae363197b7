//! Definition-boundary code chunker.
//!
//! Splits source files into [`CodeChunk`]s at top-level definition
//! boundaries (functions, classes, structs) using lightweight line
//! scanning. Files in unrecognized languages, or files with no detectable
//! definitions, fall back to a single whole-file chunk.
//!
//! Each chunk id is derived from `(path, name, start_line)` and a SHA-256
//! hash of the chunk text is kept for staleness detection, so unchanged
//! chunks are never re-embedded.

use sha2::{Digest, Sha256};

use crate::models::CodeChunk;

/// Compute the SHA-256 hex digest of a text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Map a file extension to a language label.
pub fn detect_language(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "py" => "python",
        "rs" => "rust",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        _ => "unknown",
    }
}

/// Split source text into chunks at top-level definition boundaries.
///
/// Lines are 1-based. Deterministic: the same input always yields the same
/// chunks with the same ids and hashes.
pub fn chunk_source(path: &str, content: &str, language: &str) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();

    // Find top-level definition start lines with their names.
    let mut boundaries: Vec<(usize, String)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(name) = definition_name(line, language) {
            boundaries.push((i, name));
        }
    }

    if boundaries.is_empty() {
        return vec![whole_file_chunk(path, content, language, lines.len())];
    }

    let mut chunks = Vec::new();

    // Preamble before the first definition (imports, module docstring).
    if boundaries[0].0 > 0 {
        let text = lines[..boundaries[0].0].join("\n");
        if !text.trim().is_empty() {
            chunks.push(make_chunk(path, "header", 1, boundaries[0].0 as i64, language, &text));
        }
    }

    for (idx, (start, name)) in boundaries.iter().enumerate() {
        let end = if idx + 1 < boundaries.len() {
            boundaries[idx + 1].0
        } else {
            lines.len()
        };
        let text = lines[*start..end].join("\n");
        chunks.push(make_chunk(
            path,
            name,
            (*start + 1) as i64,
            end as i64,
            language,
            &text,
        ));
    }

    chunks
}

fn whole_file_chunk(path: &str, content: &str, language: &str, line_count: usize) -> CodeChunk {
    let name = path
        .rsplit('/')
        .next()
        .and_then(|f| f.split('.').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("file");
    make_chunk(path, name, 1, line_count.max(1) as i64, language, content)
}

fn make_chunk(
    path: &str,
    name: &str,
    start_line: i64,
    end_line: i64,
    language: &str,
    text: &str,
) -> CodeChunk {
    CodeChunk {
        id: CodeChunk::derive_id(path, name, start_line),
        path: path.to_string(),
        name: name.to_string(),
        start_line,
        end_line,
        language: language.to_string(),
        text: text.to_string(),
        hash: hash_text(text),
        embedded: false,
    }
}

/// Return the definition name if this line opens a top-level definition.
///
/// Only unindented lines count as top-level (Python nesting, Rust impl
/// bodies, and JS class methods stay inside their parent chunk).
fn definition_name(line: &str, language: &str) -> Option<String> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }

    let keywords: &[&str] = match language {
        "python" => &["def ", "async def ", "class "],
        "rust" => &[
            "fn ",
            "pub fn ",
            "pub(crate) fn ",
            "async fn ",
            "pub async fn ",
            "struct ",
            "pub struct ",
            "enum ",
            "pub enum ",
            "trait ",
            "pub trait ",
            "impl ",
        ],
        "javascript" | "typescript" => &[
            "function ",
            "async function ",
            "export function ",
            "export async function ",
            "class ",
            "export class ",
            "export default function ",
            "export default class ",
        ],
        "java" | "csharp" => &["public class ", "class ", "public interface ", "interface "],
        "go" => &["func ", "type "],
        _ => return None,
    };

    for keyword in keywords {
        if let Some(rest) = line.strip_prefix(keyword) {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}
