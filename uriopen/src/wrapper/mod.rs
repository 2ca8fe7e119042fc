//! Wrappers that add behaviour around any [`crate::Opener`].

mod trace;

pub use self::trace::TracedOpener;
