use std::{collections::HashMap, fmt, sync::Arc};

use crate::{DynOpener, Opener, UnknownSchemeError, UriParseError, UriParseErrorKind, ValueStream};

/// Maps URI schemes to [`Opener`]s and resolves URIs into byte streams.
///
/// A registry is a cheap-to-clone value. The binding table is shared between
/// clones and copied on write, so registering on one handle never affects
/// another: concurrent resolvers need no locking.
///
/// Registration is chained:
///
/// ```
/// use uriopen::{OpenerRegistry, open_fn, stream_from_bytes};
///
/// let registry = OpenerRegistry::new()
///     .register("http", open_fn(|_| async { Ok(stream_from_bytes("http")) }))
///     .register("s3", open_fn(|_| async { Ok(stream_from_bytes("s3")) }));
///
/// assert_eq!(registry.schemes(), vec!["http", "s3"]);
/// ```
///
/// The empty registry (`OpenerRegistry::default()`) is valid and fails every
/// resolution with an [`UnknownSchemeError`].
#[derive(Clone, Default)]
pub struct OpenerRegistry {
    bindings: Arc<HashMap<String, DynOpener>>,
}

impl fmt::Debug for OpenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenerRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

impl OpenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `scheme` to `opener`, replacing any previous binding.
    ///
    /// The scheme is matched exactly against the scheme parsed from a URI,
    /// which is always lowercase.
    pub fn register<O: Opener + 'static>(self, scheme: impl Into<String>, opener: O) -> Self {
        self.register_dyn(scheme, Arc::new(opener))
    }

    pub fn register_dyn(mut self, scheme: impl Into<String>, opener: DynOpener) -> Self {
        self.insert_dyn(scheme, opener);
        self
    }

    /// In-place variant of [`Self::register`].
    ///
    /// Returns the replaced opener, if the scheme was already bound.
    pub fn insert<O: Opener + 'static>(
        &mut self,
        scheme: impl Into<String>,
        opener: O,
    ) -> Option<DynOpener> {
        self.insert_dyn(scheme, Arc::new(opener))
    }

    pub fn insert_dyn(&mut self, scheme: impl Into<String>, opener: DynOpener) -> Option<DynOpener> {
        Arc::make_mut(&mut self.bindings).insert(scheme.into(), opener)
    }

    pub fn get(&self, scheme: &str) -> Option<&DynOpener> {
        self.bindings.get(scheme)
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.bindings.contains_key(scheme)
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Select the opener responsible for `uri` without invoking it.
    ///
    /// Fails with [`UriParseError`] or [`UnknownSchemeError`].
    pub fn lookup(&self, uri: &str) -> Result<&DynOpener, anyhow::Error> {
        let scheme = parse_scheme(uri)?;
        match self.bindings.get(&scheme) {
            Some(opener) => Ok(opener),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(uri, %scheme, "resolve::unknown_scheme");
                Err(UnknownSchemeError::new(uri, scheme).into())
            }
        }
    }

    /// Open `uri` with the opener registered for its scheme.
    ///
    /// The opener receives the original `uri` string. Its result is returned
    /// as-is: opener errors are not wrapped or annotated.
    pub async fn resolve(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        let opener = self.lookup(uri)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(uri, ?opener, "resolve::dispatch");
        opener.open(uri).await
    }
}

/// Extract the scheme of `uri`.
///
/// The scheme is the text before the first `:` if it matches
/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`, lowercased. Anything else
/// has no scheme and yields `""`. The rest of the URI is not validated.
pub fn parse_scheme(uri: &str) -> Result<String, UriParseError> {
    if uri.bytes().any(|b| b.is_ascii_control()) {
        return Err(UriParseError::new(uri, UriParseErrorKind::ControlCharacter));
    }

    for (i, b) in uri.bytes().enumerate() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' => {}
            b'0'..=b'9' | b'+' | b'-' | b'.' if i > 0 => {}
            b':' if i == 0 => {
                return Err(UriParseError::new(uri, UriParseErrorKind::MissingScheme));
            }
            b':' => return Ok(uri[..i].to_ascii_lowercase()),
            _ => break,
        }
    }

    // A relative reference must not look like it has a scheme.
    let first_segment = uri.split('/').next().unwrap_or_default();
    if first_segment.contains(':') {
        return Err(UriParseError::new(
            uri,
            UriParseErrorKind::ColonInFirstSegment,
        ));
    }
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error as StdError,
        sync::{Arc, Mutex},
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{open_fn, read_to_bytes, stream_from_bytes};

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Call {
        id: &'static str,
        uri: String,
    }

    #[derive(Clone, Debug, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        fn opener(&self, id: &'static str) -> impl Opener + 'static {
            let calls = self.calls.clone();
            open_fn(move |uri: String| {
                calls.lock().unwrap().push(Call {
                    id,
                    uri: uri.clone(),
                });
                async move { Ok(stream_from_bytes(id)) }
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn call(id: &'static str, uri: &str) -> Call {
        Call {
            id,
            uri: uri.to_string(),
        }
    }

    #[derive(Debug, PartialEq, Eq, thiserror::Error)]
    #[error("something went wrong")]
    struct PreparedError(u32);

    #[tokio::test]
    async fn test_register_and_resolve_chain() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new()
            .register("http", rec.opener("1"))
            .register("ftp", rec.opener("2"));
        let registry = registry
            .register("s3", rec.opener("3"))
            .register("ftp", rec.opener("4"));

        for uri in [
            "http://something-nice",
            "ftp://hello-its-me",
            "s3://some-bucket/object.txt",
        ] {
            registry.resolve(uri).await.unwrap();
        }

        assert_eq!(
            rec.calls(),
            vec![
                call("1", "http://something-nice"),
                call("4", "ftp://hello-its-me"),
                call("3", "s3://some-bucket/object.txt"),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_returns_opener_stream() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new().register("mem", rec.opener("payload"));

        let stream = registry.resolve("mem://x").await.unwrap();
        let data = read_to_bytes(stream).await.unwrap();
        assert_eq!(data.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_override_wins_regardless_of_interleaving() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new()
            .register("s", rec.opener("f1"))
            .register("a", rec.opener("a"))
            .register("b", rec.opener("b"))
            .register("s", rec.opener("f2"));

        registry.resolve("s://thing").await.unwrap();
        assert_eq!(rec.calls(), vec![call("f2", "s://thing")]);
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_scheme_message() {
        let registry = OpenerRegistry::default();
        let err = registry.resolve("http://something-funny").await.err().unwrap();
        assert_eq!(
            err.to_string(),
            r#"can't open "http://something-funny": unknown scheme "http""#
        );

        let unknown = err.downcast_ref::<UnknownSchemeError>().unwrap();
        assert_eq!(unknown.uri(), "http://something-funny");
        assert_eq!(unknown.scheme(), "http");
    }

    #[tokio::test]
    async fn test_unregistered_scheme_unaffected_by_others() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new()
            .register("a", rec.opener("a"))
            .register("b", rec.opener("b"));

        let err = registry.resolve("c://whatever").await.err().unwrap();
        let unknown = err.downcast_ref::<UnknownSchemeError>().unwrap();
        assert_eq!(unknown.scheme(), "c");
        assert!(rec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_registries_are_equivalent() {
        for registry in [OpenerRegistry::default(), OpenerRegistry::new()] {
            assert!(registry.is_empty());
            for uri in ["http://a", "s3://b/c", "file:///tmp/x"] {
                let err = registry.resolve(uri).await.err().unwrap();
                assert!(err.is::<UnknownSchemeError>(), "unexpected error: {err}");
            }
        }
    }

    #[tokio::test]
    async fn test_handler_error_is_passed_through() {
        let prepared = anyhow::Error::new(PreparedError(7));
        let addr = (&*prepared as *const (dyn StdError + Send + Sync)).cast::<()>();
        let slot = Arc::new(Mutex::new(Some(prepared)));

        let registry = OpenerRegistry::new().register(
            "http",
            open_fn(move |_uri: String| {
                let err = slot.lock().unwrap().take().expect("opener called twice");
                async move { Err(err) }
            }),
        );

        let err = match registry.resolve("http://whatever").await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };

        let got = (&*err as *const (dyn StdError + Send + Sync)).cast::<()>();
        assert_eq!(got, addr, "error must be the opener's own error value");
        assert_eq!(err.downcast_ref::<PreparedError>(), Some(&PreparedError(7)));
        assert_eq!(err.chain().count(), 1);
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[tokio::test]
    async fn test_unparseable_uri() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new().register("http", rec.opener("1"));

        for (uri, kind) in [
            ("://missing-scheme", UriParseErrorKind::MissingScheme),
            ("1http://x", UriParseErrorKind::ColonInFirstSegment),
            ("no scheme:here", UriParseErrorKind::ColonInFirstSegment),
            ("http://a\nb", UriParseErrorKind::ControlCharacter),
        ] {
            let err = registry.resolve(uri).await.err().unwrap();
            let parse = err
                .downcast_ref::<UriParseError>()
                .unwrap_or_else(|| panic!("expected parse error for {uri:?}, got {err}"));
            assert_eq!(parse.uri(), uri);
            assert_eq!(parse.kind(), kind, "{uri:?}");
        }
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_parse_error_message() {
        let err = parse_scheme("://x").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"can't parse uri "://x": missing protocol scheme"#
        );
    }

    #[test]
    fn test_parse_scheme() {
        for (uri, scheme) in [
            ("http://example.com", "http"),
            ("S3+Custom.v-2://bucket/key", "s3+custom.v-2"),
            ("mailto:someone@example.com", "mailto"),
            ("http:", "http"),
            ("", ""),
            ("nope", ""),
            ("no scheme here", ""),
            ("/abs/path:with-colon", ""),
            ("dir/file:name", ""),
        ] {
            assert_eq!(parse_scheme(uri).unwrap(), scheme, "{uri:?}");
        }
    }

    #[tokio::test]
    async fn test_scheme_only_uris_are_dispatched() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new()
            .register("http", rec.opener("http"))
            .register("s3", rec.opener("s3"));

        let uris = [
            "http://",
            "http://256.0.0.1/x",
            "http://a:99999/",
            "http://[broken",
            "s3://bucket/key%",
        ];
        for uri in uris {
            registry
                .resolve(uri)
                .await
                .unwrap_or_else(|err| panic!("{uri:?} should be dispatched: {err}"));
        }
        assert_eq!(
            rec.calls(),
            vec![
                call("http", "http://"),
                call("http", "http://256.0.0.1/x"),
                call("http", "http://a:99999/"),
                call("http", "http://[broken"),
                call("s3", "s3://bucket/key%"),
            ]
        );
    }

    #[tokio::test]
    async fn test_uri_without_scheme_is_unknown_empty_scheme() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new().register("http", rec.opener("1"));

        for uri in ["nope", ""] {
            let err = registry.resolve(uri).await.err().unwrap();
            assert_eq!(
                err.to_string(),
                format!(r#"can't open "{uri}": unknown scheme """#)
            );
            let unknown = err.downcast_ref::<UnknownSchemeError>().unwrap();
            assert_eq!(unknown.scheme(), "");
        }
        assert!(rec.calls().is_empty());

        let registry = registry.register("", rec.opener("relative"));
        registry.resolve("dir/file.txt").await.unwrap();
        assert_eq!(rec.calls(), vec![call("relative", "dir/file.txt")]);
    }

    #[tokio::test]
    async fn test_scheme_is_matched_exactly() {
        let rec = Recorder::default();
        let registry = OpenerRegistry::new().register("HTTP", rec.opener("upper"));

        // The parser lowercases the scheme, the registration is kept as-is.
        let err = registry.resolve("HTTP://example.com").await.err().unwrap();
        let unknown = err.downcast_ref::<UnknownSchemeError>().unwrap();
        assert_eq!(unknown.scheme(), "http");
        assert_eq!(unknown.uri(), "HTTP://example.com");

        let registry = registry.register("http", rec.opener("lower"));
        registry.resolve("HTTP://example.com").await.unwrap();
        assert_eq!(rec.calls(), vec![call("lower", "HTTP://example.com")]);
    }

    #[tokio::test]
    async fn test_clones_do_not_observe_later_registrations() {
        let rec = Recorder::default();
        let base = OpenerRegistry::new().register("a", rec.opener("a"));
        let extended = base.clone().register("b", rec.opener("b"));
        let overridden = base.clone().register("a", rec.opener("a2"));

        assert_eq!(base.schemes(), vec!["a"]);
        assert_eq!(extended.schemes(), vec!["a", "b"]);

        base.resolve("a://1").await.unwrap();
        overridden.resolve("a://2").await.unwrap();
        assert_eq!(rec.calls(), vec![call("a", "a://1"), call("a2", "a://2")]);
    }

    #[test]
    fn test_insert_returns_replaced_opener() {
        let rec = Recorder::default();
        let mut registry = OpenerRegistry::new();
        assert!(registry.insert("x", rec.opener("1")).is_none());
        assert!(registry.insert("x", rec.opener("2")).is_some());
        assert!(registry.contains("x"));
        assert!(registry.get("y").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<OpenerRegistry>();
    }
}
