//! UnitSleuth Core: concurrent discovery of named units in directory trees
//! and archives.
//!
//! The crate never loads anything itself. Callers inject a [`Resolver`] that
//! turns a qualified name into a unit handle; the engine finds the names,
//! walks every container at most once and collects what resolves.
//!
//! # Modules
//!
//! - [`model`]: Qualified names, container locations and the search path.
//! - [`config`]: Scan options (serde-loadable) plus error and accept callbacks.
//! - [`resolver`]: The injected resolution contract.
//! - [`scanner`]: The discovery engine and its container processors.
//! - [`error`]: Errors delivered to the error handler.
pub mod config;
pub mod error;
pub mod model;
pub mod resolver;
pub mod scanner;

pub use config::{ScanConfiguration, ScanOptions};
pub use error::{DiscoveryError, ResolveError};
pub use model::{ContainerKind, Location, QualifiedName, SearchPath, Tag};
pub use resolver::{DiscoveredUnit, LoaderContext, Resolver};
pub use scanner::{DiscoveryEngine, DiscoveryHandle, Root, ScanProgress, ScanReport, ScanStats};
