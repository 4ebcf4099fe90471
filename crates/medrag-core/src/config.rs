//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `medrag.toml` + `medrag.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_CORPUS__ROOT`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::{DEFAULT_CASE_CANDIDATES, DEFAULT_KNOWLEDGE_CANDIDATES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Extracted archive root.
    pub root: String,
    pub knowledge_candidates: Vec<String>,
    pub case_candidates: Vec<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            root: "./data_extracted".to_string(),
            knowledge_candidates: DEFAULT_KNOWLEDGE_CANDIDATES.iter().map(ToString::to_string).collect(),
            case_candidates: DEFAULT_CASE_CANDIDATES.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local BGE-M3 weights run with candle.
    Model,
    /// Deterministic hashing embedder for tests and development.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub fake_dim: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Model, model_dir: None, max_len: 256, fake_dim: 1024, batch_size: 64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Lance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Snapshot directory (memory) or database directory (lance).
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { backend: StoreBackend::Memory, path: "./medrag_index".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 1000,
            api_key_env: "GEMINI_API_KEY".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub answer: AnswerSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be at least 1".into()));
        }
        if self.corpus.knowledge_candidates.is_empty() || self.corpus.case_candidates.is_empty() {
            return Err(Error::InvalidConfig("corpus candidate path lists must not be empty".into()));
        }
        Ok(())
    }

    pub fn corpus_root(&self) -> PathBuf {
        expand_path(&self.corpus.root)
    }

    pub fn store_path(&self) -> PathBuf {
        expand_path(&self.store.path)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Loads the layered configuration. `explicit` replaces `medrag.toml` as the
    /// base file when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        figment = match explicit {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file("medrag.toml")),
        };
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("medrag.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("medrag.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("medrag.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self::from_figment(figment))
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Extracts and validates the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.answer.model, "gemini-2.0-flash");
        assert_eq!(settings.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "medrag.toml",
                r#"
                [corpus]
                root = "/srv/corpus"

                [retrieval]
                top_k = 3
                "#,
            )?;
            jail.set_env("RUST_ENV", "test");
            jail.set_env("APP_EMBEDDING__PROVIDER", "fake");
            jail.set_env("APP_RETRIEVAL__TOP_K", "7");

            let settings = Config::load(None).unwrap().settings().unwrap();
            assert_eq!(settings.corpus.root, "/srv/corpus");
            assert_eq!(settings.retrieval.top_k, 7);
            assert_eq!(settings.embedding.provider, EmbeddingProvider::Fake);
            assert_eq!(settings.embedding.batch_size, 64);
            Ok(())
        });
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 0;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_keeps_absolute_and_joins_relative() {
        let base = Path::new("/base");
        assert_eq!(resolve_with_base(base, "/abs/dir"), PathBuf::from("/abs/dir"));
        assert_eq!(resolve_with_base(base, "rel/dir"), PathBuf::from("/base/rel/dir"));
    }
}
