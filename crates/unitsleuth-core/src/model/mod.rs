//! Data model for unit discovery.
//!
//! Re-exports container locations, qualified names and the search path.
pub mod location;
pub mod name;
pub mod search_path;

pub use location::{ContainerKind, Location};
pub use name::{QualifiedName, Tag};
pub use search_path::SearchPath;
