use std::time::Duration;

use anyhow::{Context as _, bail};
use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::{Client, StatusCode};
use uriopen::{Opener, OpenerRegistry, ValueStream};

/// [`Opener`] for `http://` and `https://` URIs.
///
/// Issues a `GET` for the full URI and streams the response body.
#[derive(Clone, Debug)]
pub struct HttpOpener {
    client: Client,
}

impl HttpOpener {
    /// The URI schemes served by this opener.
    pub const SCHEMES: [&'static str; 2] = ["http", "https"];

    fn default_client() -> Result<Client, anyhow::Error> {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")
    }

    pub fn new() -> Result<Self, anyhow::Error> {
        Ok(Self::new_with_client(Self::default_client()?))
    }

    pub fn new_with_client(client: Client) -> Self {
        Self { client }
    }

    /// Register this opener under both [`Self::SCHEMES`].
    pub fn register(self, registry: OpenerRegistry) -> OpenerRegistry {
        let [http, https] = Self::SCHEMES;
        registry.register(http, self.clone()).register(https, self)
    }
}

#[async_trait::async_trait]
impl Opener for HttpOpener {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        tracing::trace!(uri, "sending GET request");
        let res = self
            .client
            .get(uri)
            .send()
            .await
            .with_context(|| format!("GET request to '{uri}' failed"))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            bail!("not found: {uri}");
        }
        if !status.is_success() {
            bail!("GET request to '{uri}' failed with status {status}");
        }

        let stream = res.bytes_stream().map_err(anyhow::Error::from).boxed();
        Ok(stream)
    }
}
