use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};

use crate::{ConfigSource, LoadedSource, LoadedSources, SourceConfig, SourceLoadError};

const CONFIG_DIR_NAME: &str = "uriopen";
const SOURCES_DIR_NAME: &str = "sources";

/// Stores sources as YAML / JSON files in `<dir>/sources/`.
///
/// A file holds either a single source or a list of sources.
/// The default directory is `~/.config/uriopen`.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        let ext = path
            .extension()
            .context("config file does not have an extension")?
            .to_str()
            .context("config file extension is not valid UTF-8")?;
        match ext {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => bail!("Unsupported file extension: '{}'", ext),
        }
    }

    fn parse(self, contents: &str) -> Result<serde_json::Value, anyhow::Error> {
        match self {
            Self::Json => serde_json::from_str(contents).context("Failed to parse JSON"),
            Self::Yaml => {
                serde_yaml::from_str(contents).context("Failed to parse YAML source config")
            }
        }
    }

    fn render(self, value: &serde_json::Value) -> Result<String, anyhow::Error> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .context("Failed to serialize source config to JSON"),
            Self::Yaml => {
                serde_yaml::to_string(value).context("Failed to serialize source config to YAML")
            }
        }
    }
}

impl FsConfigStore {
    fn default_config_dir() -> Result<PathBuf, anyhow::Error> {
        let home = std::env::home_dir().context("Could not determine home directory")?;

        let dir = home.join(".config").join(CONFIG_DIR_NAME);

        Ok(dir)
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> Result<Self, anyhow::Error> {
        let path = Self::default_config_dir()?;
        Ok(Self { path })
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.path.join(SOURCES_DIR_NAME)
    }

    /// Load all sources, sorted by name.
    ///
    /// Unreadable entries end up in [`LoadedSources::failed`] instead of
    /// failing the whole load.
    pub fn sources(&self) -> Result<LoadedSources, anyhow::Error> {
        let sources_dir = self.sources_dir();

        let reader = match std::fs::read_dir(&sources_dir) {
            Ok(reader) => reader,
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    return Ok(LoadedSources::default());
                }
                bail!("Failed to read sources directory: {}", err);
            }
        };

        let mut paths = Vec::new();
        for res in reader {
            let entry = res?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut loaded = LoadedSources::default();
        for path in paths {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read source file: '{}'", path.display()))?;
            match Self::parse_source_config(&path, &contents) {
                Ok(new_sources) => {
                    loaded.extend(new_sources);
                }
                Err(err) => {
                    loaded.failed.push(SourceLoadError {
                        source: path.into(),
                        error: format!("{err:#}"),
                        index: None,
                    });
                }
            }
        }
        loaded.sources.sort_by(|a, b| a.config.name.cmp(&b.config.name));

        Ok(loaded)
    }

    fn parse_source_config(path: &Path, contents: &str) -> Result<LoadedSources, anyhow::Error> {
        let value = Format::from_path(path)?.parse(contents)?;

        let loaded = match value {
            obj @ serde_json::Value::Object(_) => match serde_json::from_value::<SourceConfig>(obj)
            {
                Ok(config) => LoadedSources::new_one_loaded(path.to_owned(), config),
                Err(err) => LoadedSources::new_one_failed(
                    path.to_owned(),
                    format!("Failed to parse source config: {err}"),
                    Some(0),
                ),
            },
            serde_json::Value::Array(arr) => {
                let mut loaded = LoadedSources::default();

                for (index, item) in arr.into_iter().enumerate() {
                    match serde_json::from_value::<SourceConfig>(item) {
                        Ok(config) => {
                            loaded.sources.push(LoadedSource {
                                source: Some(path.to_owned().into()),
                                config,
                            });
                        }
                        Err(err) => {
                            loaded.failed.push(SourceLoadError {
                                source: path.to_owned().into(),
                                error: format!("Failed to parse source config: {err}"),
                                index: Some(index),
                            });
                        }
                    }
                }

                loaded
            }
            other => {
                bail!(
                    "A config file must contain either a list of source configs or a single source - got {:?}",
                    other
                );
            }
        };
        Ok(loaded)
    }

    /// Merge `config` into the existing contents of a file.
    ///
    /// An entry with the same name is replaced, otherwise the config is
    /// appended.
    fn merge_into(
        existing: Option<serde_json::Value>,
        config: &SourceConfig,
    ) -> Result<serde_json::Value, anyhow::Error> {
        let new = serde_json::to_value(config).context("Failed to serialize source config")?;
        let same_name = |value: &serde_json::Value| {
            value.get("name").and_then(|name| name.as_str()) == Some(config.name.as_str())
        };

        let merged = match existing {
            None => new,
            Some(old @ serde_json::Value::Object(_)) => {
                if same_name(&old) {
                    new
                } else {
                    serde_json::Value::Array(vec![old, new])
                }
            }
            Some(serde_json::Value::Array(mut items)) => {
                match items.iter_mut().find(|item| same_name(item)) {
                    Some(item) => *item = new,
                    None => items.push(new),
                }
                serde_json::Value::Array(items)
            }
            Some(other) => {
                bail!("Refusing to overwrite unexpected config file content: {:?}", other);
            }
        };
        Ok(merged)
    }

    fn save_source_blocking(
        &self,
        config: &SourceConfig,
        is_new: bool,
        source: Option<ConfigSource>,
    ) -> Result<LoadedSource, anyhow::Error> {
        config.validate()?;

        if is_new {
            if let Some(existing) = self.sources()?.get(&config.name) {
                let location = match &existing.source {
                    Some(ConfigSource::File(path)) => path.display().to_string(),
                    None => "<unknown>".to_string(),
                };
                bail!("source '{}' already exists in {}", config.name, location);
            }
        }

        let file_path = match source {
            Some(ConfigSource::File(path)) => path,
            None => self.sources_dir().join(format!("{}.yaml", config.name)),
        };
        let format = Format::from_path(&file_path)?;

        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create sources directory '{}'", dir.display())
            })?;
        }

        let existing = match std::fs::read_to_string(&file_path) {
            Ok(contents) => Some(format.parse(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read '{}'", file_path.display()));
            }
        };
        let value = Self::merge_into(existing, config)?;
        let contents = format.render(&value)?;

        std::fs::write(&file_path, contents).with_context(|| {
            format!(
                "Failed to write source config to '{}'",
                file_path.display()
            )
        })?;

        Ok(LoadedSource {
            source: Some(file_path.into()),
            config: config.clone(),
        })
    }
}

#[async_trait::async_trait]
impl crate::ConfigStore for FsConfigStore {
    async fn load_sources(&self) -> Result<LoadedSources, anyhow::Error> {
        #[cfg(feature = "tokio")]
        {
            let s = self.clone();
            tokio::task::spawn_blocking(move || s.sources())
                .await
                .context("Failed to load sources")?
        }

        #[cfg(not(feature = "tokio"))]
        {
            self.sources()
        }
    }

    async fn save_source(
        &self,
        config: SourceConfig,
        is_new: bool,
        source: Option<ConfigSource>,
    ) -> Result<LoadedSource, anyhow::Error> {
        #[cfg(feature = "tokio")]
        {
            let s = self.clone();
            tokio::task::spawn_blocking(move || s.save_source_blocking(&config, is_new, source))
                .await
                .context("Failed to save source")?
        }

        #[cfg(not(feature = "tokio"))]
        {
            self.save_source_blocking(&config, is_new, source)
        }
    }
}
