//! Contract between the engine and the injected resolution mechanism.
//!
//! The engine never loads anything itself. It hands each candidate name,
//! together with the container it came from, to a [`Resolver`] and receives
//! either a unit handle or a [`ResolveError`].
use crate::error::ResolveError;
use crate::model::{Location, QualifiedName, Tag};
use std::fmt::Debug;
use std::hash::Hash;

/// A resolved unit handle. Opaque beyond identity and tag presence.
pub trait DiscoveredUnit: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    fn has_tag(&self, tag: &Tag) -> bool;
}

/// Where a candidate was found.
#[derive(Clone, Copy, Debug)]
pub struct LoaderContext<'a> {
    /// The container that holds the candidate entry.
    pub container: &'a Location,
    /// The top-level container whose traversal reached the candidate.
    pub origin: &'a Location,
}

/// Turns qualified names into units. Called concurrently from worker tasks.
pub trait Resolver: Send + Sync {
    type Unit: DiscoveredUnit;

    fn resolve(
        &self,
        name: &QualifiedName,
        context: &LoaderContext<'_>,
    ) -> Result<Self::Unit, ResolveError>;

    /// Release any handles retained across scans. Called once per
    /// [`crate::scanner::DiscoveryEngine::close`].
    fn release(&self) {}
}

impl<R: Resolver + ?Sized> Resolver for std::sync::Arc<R> {
    type Unit = R::Unit;

    fn resolve(
        &self,
        name: &QualifiedName,
        context: &LoaderContext<'_>,
    ) -> Result<Self::Unit, ResolveError> {
        (**self).resolve(name, context)
    }

    fn release(&self) {
        (**self).release()
    }
}
