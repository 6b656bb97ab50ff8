//! Sandboxed access to the document root.

pub mod resolver;

pub use resolver::{ResolveError, ResolvedResource, StaticFiles, normalize};
