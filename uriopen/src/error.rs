/// Why a URI was rejected before any opener was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UriParseErrorKind {
    /// The URI starts with `:`.
    #[error("missing protocol scheme")]
    MissingScheme,
    /// The URI contains an ASCII control character.
    #[error("invalid control character in uri")]
    ControlCharacter,
    /// A scheme-less URI whose first path segment contains `:`.
    #[error("first path segment in uri cannot contain colon")]
    ColonInFirstSegment,
}

/// The input could not be parsed as a URI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("can't parse uri {uri:?}: {source}")]
pub struct UriParseError {
    uri: String,
    source: UriParseErrorKind,
}

impl UriParseError {
    pub(crate) fn new(uri: impl Into<String>, source: UriParseErrorKind) -> Self {
        Self {
            uri: uri.into(),
            source,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> UriParseErrorKind {
        self.source
    }
}

/// No opener is registered for the scheme of a URI.
///
/// Renders as `can't open "<uri>": unknown scheme "<scheme>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("can't open {uri:?}: unknown scheme {scheme:?}")]
pub struct UnknownSchemeError {
    uri: String,
    scheme: String,
}

impl UnknownSchemeError {
    pub(crate) fn new(uri: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            scheme: scheme.into(),
        }
    }

    /// The full URI passed to the registry.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The scheme that had no registered opener.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}
