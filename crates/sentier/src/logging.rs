//! Structured log event names.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application.

/// Standard event names, carried in the `event` field.
pub mod events {
    /// A pattern was inserted into a tree.
    pub const ROUTE_INSERTED: &str = "route_inserted";

    /// A spec tree was mounted under a prefix.
    pub const SPEC_MOUNTED: &str = "spec_mounted";

    /// A spec document was loaded.
    pub const SPEC_LOADED: &str = "spec_loaded";

    /// A shared router received a new tree.
    pub const TREE_SWAPPED: &str = "tree_swapped";

    /// Pattern segments following a catch-all were dropped.
    pub const CATCH_ALL_TAIL_IGNORED: &str = "catch_all_tail_ignored";

    /// A lookup found no route.
    pub const LOOKUP_MISS: &str = "lookup_miss";
}
