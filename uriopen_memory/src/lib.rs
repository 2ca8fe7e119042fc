use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context as _, bail};
use bytes::Bytes;
use tokio::sync::RwLock;
use uriopen::{Opener, OpenerRegistry, ValueStream, stream_from_bytes};
use url::Url;

/// In-memory [`Opener`] serving `memory://<key>` URIs.
///
/// Clones share the same content, so a handle kept by the caller can keep
/// adding entries after the opener was registered.
#[derive(Clone, Default)]
pub struct MemoryOpener {
    state: State,
}

impl std::fmt::Debug for MemoryOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOpener").finish()
    }
}

#[derive(Clone, Default)]
struct State {
    data: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryOpener {
    /// The URI scheme served by this opener.
    pub const SCHEME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build the URI under which `key` is served.
    pub fn uri_for(key: &str) -> String {
        format!("{}://{}", Self::SCHEME, key.trim_start_matches('/'))
    }

    /// Extract the key from a `memory://<key>` URI.
    ///
    /// Query and fragment are ignored.
    pub fn key_from_uri(uri: &str) -> Result<String, anyhow::Error> {
        let url = Url::parse(uri).with_context(|| format!("invalid memory uri '{uri}'"))?;
        if url.scheme() != Self::SCHEME {
            bail!(
                "Invalid scheme: expected '{}', got '{}'",
                Self::SCHEME,
                url.scheme()
            );
        }

        let key = url[url::Position::BeforeHost..url::Position::AfterPath].trim_start_matches('/');
        if key.is_empty() {
            bail!("invalid memory uri '{uri}': missing key");
        }
        Ok(key.to_string())
    }

    /// Store `data` under `key`, returning the previous value.
    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) -> Option<Bytes> {
        self.state.data.write().await.insert(key.into(), data.into())
    }

    pub async fn remove(&self, key: &str) -> Option<Bytes> {
        self.state.data.write().await.remove(key)
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.state.data.read().await.get(key).cloned()
    }

    /// All keys starting with `prefix`, sorted.
    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.state
            .data
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _value)| key.starts_with(prefix))
            .map(|(key, _value)| key.clone())
            .collect()
    }

    /// Register this opener under [`Self::SCHEME`].
    pub fn register(self, registry: OpenerRegistry) -> OpenerRegistry {
        registry.register(Self::SCHEME, self)
    }
}

#[async_trait::async_trait]
impl Opener for MemoryOpener {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        let key = Self::key_from_uri(uri)?;
        match self.get(&key).await {
            Some(data) => Ok(stream_from_bytes(data)),
            None => bail!("not found: {uri}"),
        }
    }
}
