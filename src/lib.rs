//! Package resolution for single-file C# scripts.
//!
//! Scripts declare their third-party references inline:
//!
//! ```csharp
//! // #nuget: Newtonsoft.Json@13.0.3
//! // #package: Humanizer
//! ```
//!
//! [`directives::parse_directives`] extracts those references,
//! [`resolver::Resolver`] walks their transitive closure against the
//! package registry, caches and extracts the archives on disk, and returns
//! the assembly paths a compiler invocation should reference.

pub mod artifacts;
pub mod cache;
pub mod directives;
pub mod error;
pub mod framework;
pub mod manifest;
pub mod registry;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testutil;

pub use directives::{PackageRef, parse_directives};
pub use error::ResolveError;
pub use resolver::{PackageCoord, ResolveOptions, Resolver};
