//! Hot reload: lock-free access to a router that can be replaced while
//! lookups are in flight.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::logging::events;
use crate::trie::Router;

/// A router shared between request handlers and a reloader.
///
/// Readers take a snapshot with [`SharedRouter::load`] and keep using it for
/// the whole request. A reload builds a fresh router off to the side and
/// publishes it with [`SharedRouter::store`]; snapshots taken earlier keep
/// the old tree alive until they are dropped.
pub struct SharedRouter<V> {
    current: ArcSwap<Router<V>>,
}

impl<V> SharedRouter<V> {
    pub fn new(router: Router<V>) -> Self {
        Self {
            current: ArcSwap::from_pointee(router),
        }
    }

    /// Snapshot of the current router.
    pub fn load(&self) -> Arc<Router<V>> {
        self.current.load_full()
    }

    /// Atomically replace the router, returning the previous one.
    pub fn store(&self, router: Router<V>) -> Arc<Router<V>> {
        let previous = self.current.swap(Arc::new(router));
        tracing::info!(event = events::TREE_SWAPPED, "router tree swapped");
        previous
    }
}

impl<V> Default for SharedRouter<V> {
    fn default() -> Self {
        Self::new(Router::new())
    }
}

impl<V> From<Router<V>> for SharedRouter<V> {
    fn from(router: Router<V>) -> Self {
        Self::new(router)
    }
}
