use anyhow::{Context as _, bail};
use rusty_s3::Bucket;
use url::Url;

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UrlStyle {
    /// Requests will use "path-style" url: i.e:
    /// `https://s3.<region>.amazonaws.com/<bucket>/<key>`.
    ///
    /// This style should be considered deprecated and is **NOT RECOMMENDED**.
    /// Check [Amazon S3 Path Deprecation Plan](https://aws.amazon.com/blogs/aws/amazon-s3-path-deprecation-plan-the-rest-of-the-story/)
    /// for more informations.
    Path,
    /// Requests will use "virtual-hosted-style" urls, i.e:
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`.
    VirtualHost,
}

impl From<UrlStyle> for rusty_s3::UrlStyle {
    fn from(style: UrlStyle) -> Self {
        match style {
            UrlStyle::Path => rusty_s3::UrlStyle::Path,
            UrlStyle::VirtualHost => rusty_s3::UrlStyle::VirtualHost,
        }
    }
}

fn default_region() -> String {
    "auto".to_string()
}

/// Connection settings for an S3-compatible endpoint.
///
/// Credentials are taken as given, nothing is discovered from the
/// environment.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct S3OpenerConfig {
    /// eg: `https://s3.eu-central-1.amazonaws.com` or `http://localhost:9000`
    pub endpoint: Url,
    #[serde(default = "default_region")]
    pub region: String,
    pub url_style: UrlStyle,

    pub key: String,
    pub secret: String,
    /// Session token for temporary credentials.
    #[serde(default)]
    pub token: Option<String>,
}

impl S3OpenerConfig {
    pub fn new(
        endpoint: Url,
        url_style: UrlStyle,
        key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            region: default_region(),
            url_style,
            key: key.into(),
            secret: secret.into(),
            token: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => bail!("endpoint must be an http or https url, got scheme '{other}'"),
        }
        if self.key.trim().is_empty() {
            bail!("access key must not be empty");
        }
        if self.secret.trim().is_empty() {
            bail!("secret key must not be empty");
        }
        Ok(())
    }

    pub(crate) fn build_bucket(&self, name: &str) -> Result<Bucket, anyhow::Error> {
        Bucket::new(
            self.endpoint.clone(),
            self.url_style.into(),
            name.to_string(),
            self.region.clone(),
        )
        .with_context(|| format!("could not build rusty_s3 bucket '{name}'"))
    }

    pub(crate) fn build_credentials(&self) -> rusty_s3::Credentials {
        if let Some(token) = &self.token {
            rusty_s3::Credentials::new_with_token(&self.key, &self.secret, token)
        } else {
            rusty_s3::Credentials::new(&self.key, &self.secret)
        }
    }
}

/// Bucket and key addressed by an `s3://<bucket>/<key>` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub(crate) const URI_SCHEME: &'static str = "s3";

    /// Parse an object URI.
    ///
    /// The host is the bucket name, the percent-decoded path without leading
    /// slashes is the object key.
    pub fn parse(uri: &str) -> Result<Self, anyhow::Error> {
        let url = uri
            .parse::<Url>()
            .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", uri, e))?;
        if url.scheme() != Self::URI_SCHEME {
            bail!(
                "Invalid scheme: expected '{}', got '{}'",
                Self::URI_SCHEME,
                url.scheme()
            );
        }

        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .with_context(|| format!("Invalid URL '{uri}': missing bucket name"))?
            .to_string();

        let key = percent_encoding::percent_decode_str(url.path())
            .decode_utf8()
            .with_context(|| format!("Invalid URL '{uri}': object key is not valid UTF-8"))?
            .trim_start_matches('/')
            .to_string();
        if key.is_empty() {
            bail!("Invalid URL '{uri}': missing object key");
        }

        Ok(Self { bucket, key })
    }
}
