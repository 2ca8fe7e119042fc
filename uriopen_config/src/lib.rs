use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};

mod fs;

pub use self::fs::FsConfigStore;

/// A named alias for a URI.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Names are used as file names, so they must be plain identifiers.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.name.is_empty() {
            bail!("source name must not be empty");
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || self.name.starts_with('.')
        {
            bail!(
                "invalid source name '{}': only ASCII letters, digits, '-', '_' and '.' are allowed",
                self.name
            );
        }
        url::Url::parse(&self.uri)
            .with_context(|| format!("invalid uri for source '{}'", self.name))?;
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoadedSource {
    pub source: Option<ConfigSource>,
    pub config: SourceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedSources {
    pub sources: Vec<LoadedSource>,
    pub failed: Vec<SourceLoadError>,
}

impl LoadedSources {
    pub fn get(&self, name: &str) -> Option<&LoadedSource> {
        self.sources.iter().find(|s| s.config.name == name)
    }

    /// The URI configured under `name_or_uri`, or the argument itself if no
    /// source has that name.
    pub fn expand<'a>(&'a self, name_or_uri: &'a str) -> &'a str {
        self.get(name_or_uri)
            .map(|s| s.config.uri.as_str())
            .unwrap_or(name_or_uri)
    }

    pub fn new_one_loaded(source: impl Into<ConfigSource>, config: SourceConfig) -> Self {
        Self {
            sources: vec![LoadedSource {
                source: Some(source.into()),
                config,
            }],
            failed: Vec::new(),
        }
    }

    pub fn new_one_failed(
        source: impl Into<ConfigSource>,
        error: String,
        index: Option<usize>,
    ) -> Self {
        Self {
            sources: Vec::new(),
            failed: vec![SourceLoadError {
                source: source.into(),
                error,
                index,
            }],
        }
    }

    fn extend(&mut self, other: Self) {
        self.sources.extend(other.sources);
        self.failed.extend(other.failed);
    }
}

/// A source entry that could not be loaded.
///
/// `index` is the position inside a list file, if any.
#[derive(Debug, Clone)]
pub struct SourceLoadError {
    pub source: ConfigSource,
    pub error: String,
    pub index: Option<usize>,
}

impl std::fmt::Display for SourceLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ConfigSource::File(path) = &self.source;
        match self.index {
            Some(index) => write!(f, "{} (entry {}): {}", path.display(), index, self.error),
            None => write!(f, "{}: {}", path.display(), self.error),
        }
    }
}

#[async_trait::async_trait]
pub trait ConfigStore {
    async fn load_sources(&self) -> Result<LoadedSources, anyhow::Error>;

    /// Persist a source.
    ///
    /// With `is_new`, an existing source of the same name is an error.
    /// `source` overrides where the config is written.
    async fn save_source(
        &self,
        config: SourceConfig,
        is_new: bool,
        source: Option<ConfigSource>,
    ) -> Result<LoadedSource, anyhow::Error>;
}

pub type DynConfigStore = Arc<dyn ConfigStore + Send + Sync>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_validate_source_config() {
        SourceConfig::new("data-2024.v1", "s3://bucket/key")
            .validate()
            .unwrap();

        for name in ["", "../escape", "a/b", ".hidden", "white space"] {
            assert!(
                SourceConfig::new(name, "memory://x").validate().is_err(),
                "{name:?} should be rejected"
            );
        }
        assert!(SourceConfig::new("ok", "not a uri").validate().is_err());
    }

    #[test]
    fn test_expand_source_name() {
        let sources = LoadedSources::new_one_loaded(
            PathBuf::from("/tmp/x.yaml"),
            SourceConfig::new("greeting", "memory://hello"),
        );
        assert_eq!(sources.expand("greeting"), "memory://hello");
        assert_eq!(sources.expand("file:///etc/hosts"), "file:///etc/hosts");
    }
}
