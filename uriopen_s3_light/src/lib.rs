//! Lightweight S3 opener for `s3://<bucket>/<key>` URIs.
//!
//! Requests are presigned with [`rusty_s3`] and sent with [`reqwest`].

mod config;

use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, bail};
use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::{Client, StatusCode};
use rusty_s3::S3Action as _;
use uriopen::{Opener, OpenerRegistry, ValueStream};
use url::Url;

pub use self::config::{ObjectLocation, S3OpenerConfig, UrlStyle};

/// Parse an `s3://<bucket>/<key>` URI.
pub fn parse_object_uri(uri: &str) -> Result<ObjectLocation, anyhow::Error> {
    ObjectLocation::parse(uri)
}

/// [`Opener`] for `s3://<bucket>/<key>` URIs.
///
/// One opener serves any bucket reachable with its credentials.
#[derive(Clone)]
pub struct S3Opener {
    state: Arc<State>,
}

impl std::fmt::Debug for S3Opener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Opener")
            .field("endpoint", &self.state.config.endpoint.as_str())
            .field("region", &self.state.config.region)
            .finish()
    }
}

struct State {
    config: S3OpenerConfig,
    creds: rusty_s3::Credentials,
    client: Client,
}

impl S3Opener {
    /// The URI scheme served by this opener.
    pub const SCHEME: &'static str = ObjectLocation::URI_SCHEME;

    const DURATION: Duration = Duration::from_secs(180);

    fn default_client() -> Result<Client, anyhow::Error> {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")
    }

    pub fn new(config: S3OpenerConfig) -> Result<Self, anyhow::Error> {
        let client = Self::default_client()?;
        Self::new_with_client(config, client)
    }

    pub fn new_with_client(config: S3OpenerConfig, client: Client) -> Result<Self, anyhow::Error> {
        config.validate().context("invalid s3 opener config")?;
        let creds = config.build_credentials();

        Ok(Self {
            state: Arc::new(State {
                config,
                creds,
                client,
            }),
        })
    }

    pub fn config(&self) -> &S3OpenerConfig {
        &self.state.config
    }

    /// Presigned `GET` url for an object.
    pub fn presigned_get_url(&self, location: &ObjectLocation) -> Result<Url, anyhow::Error> {
        let bucket = self.state.config.build_bucket(&location.bucket)?;
        let url = bucket
            .get_object(Some(&self.state.creds), &location.key)
            .sign(Self::DURATION);
        Ok(url)
    }

    /// Register this opener under [`Self::SCHEME`].
    pub fn register(self, registry: OpenerRegistry) -> OpenerRegistry {
        registry.register(Self::SCHEME, self)
    }

    async fn error_for_status(res: reqwest::Response) -> Result<reqwest::Response, anyhow::Error> {
        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.context("failed to read response body")?;
            Err(anyhow::anyhow!("S3 request failed: {}: {}", status, body))
        }
    }
}

#[async_trait::async_trait]
impl Opener for S3Opener {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        let location = ObjectLocation::parse(uri)?;
        let url = self.presigned_get_url(&location)?;
        tracing::trace!(bucket = %location.bucket, key = %location.key, "loading object from s3");

        let res = self
            .state
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("get_object request for '{uri}' failed"))?;
        tracing::trace!(?res, "response for get_object request");
        if res.status() == StatusCode::NOT_FOUND {
            bail!("not found: {uri}");
        }
        let res = Self::error_for_status(res)
            .await
            .with_context(|| format!("could not open '{uri}'"))?;

        let stream = res.bytes_stream().map_err(anyhow::Error::from).boxed();
        Ok(stream)
    }
}

/// Register an opener built from `config` under [`S3Opener::SCHEME`].
pub fn register(
    registry: OpenerRegistry,
    config: S3OpenerConfig,
) -> Result<OpenerRegistry, anyhow::Error> {
    Ok(S3Opener::new(config)?.register(registry))
}
