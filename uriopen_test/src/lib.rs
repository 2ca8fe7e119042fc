//! Test helpers for testing openers.
//!
//! Allows for unified testing to make sure all backends conform to the
//! same behavior.

mod recording;
pub mod server;

pub use self::recording::RecordingOpener;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use sha2::Digest as _;
use uriopen::{
    DynOpener, Opener, OpenerRegistry, UnknownSchemeError, UriParseError, read_to_bytes,
};
use uuid::Uuid;

/// A backend under test, together with a way to put content behind a URI.
#[async_trait::async_trait]
pub trait OpenerFixture: Send + Sync {
    /// The opener to test.
    fn opener(&self) -> DynOpener;

    /// Scheme the opener is registered under.
    fn scheme(&self) -> &str;

    /// The URI under which `key` is served.
    fn uri_for(&self, key: &str) -> String;

    /// Make `value` available under [`Self::uri_for`] of `key`.
    async fn seed(&self, key: &str, value: Bytes);
}

/// A random, URI-safe key.
pub fn unique_key(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Deterministic payload of `len` bytes.
pub fn sample_payload(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

fn digest(data: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(data).into()
}

/// Ensures that `uri` can be opened and yields exactly `value`.
///
/// Opens the URI twice to make sure every call returns a fresh stream.
pub async fn expect_content(opener: &dyn Opener, uri: &str, value: &Bytes) {
    eprintln!("Expecting {} bytes at {uri}", value.len());

    for attempt in 0..2 {
        let stream = match opener.open(uri).await {
            Ok(stream) => stream,
            Err(err) => panic!("open #{attempt} of {uri} failed: {err:#}"),
        };
        let data = read_to_bytes(stream)
            .await
            .expect("stream should collect successfully");

        assert_eq!(data.len(), value.len(), "length should match for {uri}");
        if value.len() <= 1024 {
            assert_eq!(data, *value, "value should match for {uri}");
        } else {
            assert!(
                digest(&data) == digest(value),
                "content hash should match for {uri}"
            );
        }
    }
}

/// Ensures that opening `uri` fails with a backend error.
///
/// Returns the error for further inspection.
pub async fn expect_missing(opener: &dyn Opener, uri: &str) -> anyhow::Error {
    let err = match opener.open(uri).await {
        Ok(_) => panic!("expected opening {uri} to fail"),
        Err(err) => err,
    };
    assert!(
        !err.is::<UnknownSchemeError>() && !err.is::<UriParseError>(),
        "backend errors must not look like registry errors: {err}"
    );
    err
}

/// Test an opener implementation.
///
/// Exercises the opener directly and through an [`OpenerRegistry`].
pub async fn test_opener(fixture: &impl OpenerFixture) {
    let opener = fixture.opener();
    let registry = OpenerRegistry::new().register_dyn(fixture.scheme(), opener.clone());

    // Small value.
    {
        let key = unique_key("small");
        let value: Bytes = Uuid::new_v4().to_string().into();
        fixture.seed(&key, value.clone()).await;

        let uri = fixture.uri_for(&key);
        expect_content(opener.as_ref(), &uri, &value).await;

        let stream = registry
            .resolve(&uri)
            .await
            .unwrap_or_else(|err| panic!("registry should resolve {uri}: {err:#}"));
        let data = read_to_bytes(stream).await.unwrap();
        assert_eq!(data, value, "registry should yield the opener's stream");
    }

    // Empty value.
    {
        let key = unique_key("empty");
        fixture.seed(&key, Bytes::new()).await;
        expect_content(opener.as_ref(), &fixture.uri_for(&key), &Bytes::new()).await;
    }

    // Large value, spans multiple chunks for streaming backends.
    {
        let key = unique_key("large");
        let value = sample_payload(3 * 1024 * 1024 + 17);
        fixture.seed(&key, value.clone()).await;
        expect_content(opener.as_ref(), &fixture.uri_for(&key), &value).await;
    }

    // Missing resource.
    {
        let uri = fixture.uri_for(&unique_key("missing"));
        expect_missing(opener.as_ref(), &uri).await;

        let err = match registry.resolve(&uri).await {
            Ok(_) => panic!("expected resolving {uri} to fail"),
            Err(err) => err,
        };
        assert!(!err.is::<UnknownSchemeError>(), "unexpected error: {err}");
    }
}
