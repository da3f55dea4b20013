//! URI-template request router.
//!
//! Compiles path patterns (`/page/{title}`, `{/optional}`, `{+rest}`,
//! `{domain:en.wikipedia.org}`) into a prefix tree whose subtrees can be shared
//! between mount points. Lookup binds path parameters, lists directories on a
//! trailing slash, and collects the `security` and `filters` metadata of every
//! route passed on the way down.

pub mod error;
pub mod logging;
pub mod node;
pub mod params;
pub mod pattern;
pub mod reload;
pub mod spec;
pub mod trie;
pub mod uri;

pub use error::RouterError;
pub use node::{Node, RouteValue};
pub use params::{ParamValue, Params};
pub use pattern::{parse_pattern, Modifier, Param, Segment};
pub use reload::SharedRouter;
pub use spec::{parse_spec, parse_spec_file, ApiSpec};
pub use trie::{RouteMatch, Router};
pub use uri::{Format, RenderOptions, Uri};
