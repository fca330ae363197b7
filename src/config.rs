use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::DocType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub impact: ImpactConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.py".to_string(),
        "**/*.rs".to_string(),
        "**/*.js".to_string(),
        "**/*.ts".to_string(),
        "**/*.java".to_string(),
        "**/*.go".to_string(),
        "**/*.c".to_string(),
        "**/*.cpp".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImpactConfig {
    /// Optional hard cap on reverse-closure traversal depth. `None` means
    /// full transitive closure; when set, capped results are flagged
    /// truncated rather than silently incomplete.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Compact the vector index once tombstoned/total exceeds this ratio.
    #[serde(default = "default_compact_ratio")]
    pub tombstone_compact_ratio: f64,
    /// How many chunks to retrieve as generation context.
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tombstone_compact_ratio: default_compact_ratio(),
            retrieval_top_k: default_retrieval_top_k(),
        }
    }
}

fn default_compact_ratio() -> f64 {
    0.3
}

fn default_retrieval_top_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generator_timeout_secs() -> u64 {
    120
}

/// Doc-type catalog configuration.
///
/// Each entry maps a doc type to its contributing-set selector globs. An
/// entry with no globs contributes the whole repository — that is the
/// explicit default policy, not a catch-all exception path.
#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_doc_types")]
    pub types: Vec<DocTypeConfig>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            types: default_doc_types(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocTypeConfig {
    /// Doc-type name: `readme`, `api`, `architecture`, `onboarding`,
    /// `changelog`, or `module:<name>`.
    pub name: String,
    /// Contributing-set selector; empty means all tracked files.
    #[serde(default)]
    pub include_globs: Vec<String>,
}

fn default_doc_types() -> Vec<DocTypeConfig> {
    ["readme", "api", "architecture"]
        .iter()
        .map(|name| DocTypeConfig {
            name: name.to_string(),
            include_globs: Vec::new(),
        })
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.index.tombstone_compact_ratio) {
        anyhow::bail!("index.tombstone_compact_ratio must be in [0.0, 1.0]");
    }

    if config.index.retrieval_top_k == 0 {
        anyhow::bail!("index.retrieval_top_k must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    match config.generator.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generator provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.generator.is_enabled() && config.generator.model.is_none() {
        anyhow::bail!(
            "generator.model must be specified when provider is '{}'",
            config.generator.provider
        );
    }

    for doc_type in &config.docs.types {
        if DocType::parse(&doc_type.name).is_none() {
            anyhow::bail!(
                "Unknown doc type '{}'. Must be readme, api, architecture, onboarding, changelog, or module:<name>.",
                doc_type.name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(r#"[db]
path = "/tmp/dlg.sqlite"
"#)
        .unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.generator.provider, "disabled");
        assert!((config.index.tombstone_compact_ratio - 0.3).abs() < 1e-9);
        assert_eq!(config.docs.types.len(), 3);
    }

    #[test]
    fn test_embedding_requires_dims_and_model() {
        let result = parse(
            r#"[db]
path = "/tmp/dlg.sqlite"

[embedding]
provider = "ollama"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_doc_type_rejected() {
        let result = parse(
            r#"[db]
path = "/tmp/dlg.sqlite"

[docs]
types = [{ name = "wiki" }]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_module_doc_type_with_selector() {
        let config = parse(
            r#"[db]
path = "/tmp/dlg.sqlite"

[docs]
types = [{ name = "module:ledger", include_globs = ["src/ledger/**"] }]
"#,
        )
        .unwrap();
        assert_eq!(config.docs.types[0].include_globs.len(), 1);
    }
}
