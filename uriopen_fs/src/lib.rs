use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, bail};
use futures::{StreamExt as _, TryStreamExt as _};
use uriopen::{Opener, OpenerRegistry, ValueStream};
use url::Url;

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FsOpenerConfig {
    /// Restrict access to this directory.
    ///
    /// When set, URI paths are resolved relative to the root and may not
    /// escape it. When unset, URI paths are used as absolute paths.
    pub root: Option<PathBuf>,
}

impl FsOpenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// [`Opener`] for `file://` URIs.
#[derive(Clone, Debug)]
pub struct FsOpener {
    state: Arc<State>,
}

#[derive(Debug)]
struct State {
    root: Option<PathBuf>,
}

impl FsOpener {
    /// The URI scheme served by this opener.
    pub const SCHEME: &'static str = "file";

    pub fn new(config: FsOpenerConfig) -> Result<Self, anyhow::Error> {
        if let Some(root) = &config.root {
            let meta = std::fs::metadata(root)
                .with_context(|| format!("Could not access fs root '{}'", root.display()))?;
            if !meta.is_dir() {
                bail!("fs root '{}' is not a directory", root.display());
            }
        }

        Ok(Self {
            state: Arc::new(State { root: config.root }),
        })
    }

    /// An opener with access to the whole filesystem.
    pub fn unrestricted() -> Self {
        Self {
            state: Arc::new(State { root: None }),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.state.root.as_deref()
    }

    /// Build a `file://` URI for an absolute path.
    pub fn uri_for_path(path: &Path) -> Result<String, anyhow::Error> {
        let url = Url::from_file_path(path)
            .map_err(|()| anyhow::anyhow!("'{}' is not an absolute path", path.display()))?;
        Ok(url.into())
    }

    /// Map a `file://` URI to the local path it refers to.
    pub fn path_for(&self, uri: &str) -> Result<PathBuf, anyhow::Error> {
        let url = Url::parse(uri).with_context(|| format!("invalid file uri '{uri}'"))?;
        if url.scheme() != Self::SCHEME {
            bail!(
                "Invalid scheme: expected '{}', got '{}'",
                Self::SCHEME,
                url.scheme()
            );
        }
        let path = url
            .to_file_path()
            .map_err(|()| anyhow::anyhow!("invalid file uri '{uri}': not a local path"))?;

        let Some(root) = &self.state.root else {
            return Ok(path);
        };

        let mut full = root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => full.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    bail!("invalid file uri '{uri}': path escapes the root directory")
                }
            }
        }
        Ok(full)
    }
}

#[async_trait::async_trait]
impl Opener for FsOpener {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        let path = self.path_for(uri)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                bail!("file not found: '{}'", path.display())
            }
            Err(err) => {
                return Err(err).with_context(|| format!("could not open '{}'", path.display()));
            }
        };
        let meta = file
            .metadata()
            .await
            .with_context(|| format!("could not read metadata of '{}'", path.display()))?;
        if meta.is_dir() {
            bail!("'{}' is a directory", path.display());
        }

        let stream = tokio_util::io::ReaderStream::new(file)
            .map_err(anyhow::Error::from)
            .boxed();
        Ok(stream)
    }
}

/// Register an opener built from `config` under [`FsOpener::SCHEME`].
pub fn register(
    registry: OpenerRegistry,
    config: FsOpenerConfig,
) -> Result<OpenerRegistry, anyhow::Error> {
    let opener = FsOpener::new(config)?;
    Ok(registry.register(FsOpener::SCHEME, opener))
}
