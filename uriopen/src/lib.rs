//! Resolve URIs into byte streams.
//!
//! Backends implement the [`Opener`] trait and are bound to a URI scheme in
//! an [`OpenerRegistry`]. [`OpenerRegistry::resolve`] parses the scheme of a
//! URI and hands the full URI to the matching opener.
//!
//! See [`OpenerRegistry`] and [`SharedRegistry`].

mod error;
mod opener;
mod registry;
mod shared;
mod types;
#[cfg(feature = "tracing")]
pub mod wrapper;

pub use self::{
    error::{UnknownSchemeError, UriParseError, UriParseErrorKind},
    opener::{DynOpener, OpenFn, Opener, open_fn},
    registry::{OpenerRegistry, parse_scheme},
    shared::SharedRegistry,
    types::*,
};
