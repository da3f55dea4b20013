use std::sync::Arc;

use serde_json::Value;

use crate::error::RouterError;
use crate::logging::events;
use crate::node::{Node, RouteValue};
use crate::params::{ParamValue, Params, LISTING_KEY};
use crate::pattern::{encode_component, parse_pattern, split_path, Segment};
use crate::uri::Uri;

/// The routing trie. Maps URI patterns to values.
#[derive(Debug)]
pub struct Router<V> {
    root: Node<V>,
}

/// The result of a successful lookup.
#[derive(Debug, PartialEq)]
pub struct RouteMatch<'a, V> {
    /// Bound path parameters, plus `_ls` for directory listings.
    pub params: Params,
    /// Value of the matched node. `None` for a listing of a node without one.
    pub value: Option<&'a V>,
    /// Security entries inherited from the matched path, root first.
    pub permissions: Vec<&'a Value>,
    /// Filters inherited from the matched path, root first.
    pub filters: Vec<&'a Value>,
}

impl<V> Router<V> {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Create a router over an existing tree.
    pub fn with_tree(root: Node<V>) -> Self {
        Self { root }
    }

    pub fn tree(&self) -> &Node<V> {
        &self.root
    }

    /// Replace the whole tree.
    pub fn set_tree(&mut self, root: Node<V>) {
        self.root = root;
    }

    /// Insert a pattern string.
    pub fn insert_pattern(&mut self, pattern: &str, value: V) -> Result<(), RouterError> {
        let segments = parse_pattern(pattern)?;
        self.insert(&segments, value)
    }

    /// Insert a parsed pattern, reusing existing structure where the path
    /// already exists.
    pub fn insert(&mut self, segments: &[Segment], value: V) -> Result<(), RouterError> {
        insert_into(&mut self.root, segments, &Arc::new(value))
    }

    /// Route deletion is unsupported: removing nodes would break subtrees
    /// shared with other tree positions. Rebuild the router instead.
    pub fn remove(&mut self, _pattern: &str) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented(
            "route removal; rebuild the router instead",
        ))
    }
}

impl<V: RouteValue> Router<V> {
    /// Look up a request path given as raw components.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<RouteMatch<'_, V>> {
        let mut params = Params::new();
        let mut permissions = Vec::new();
        let mut filters = Vec::new();
        let mut node = Some(&self.root);
        let mut parent = None;

        for (i, segment) in path.iter().enumerate() {
            let current = node?;
            parent = Some(current);
            inherit(current, &mut permissions, &mut filters);

            let segment = segment.as_ref();
            if let Some(child) = current.exact_child(segment) {
                bind(child, segment, &mut params);
                node = Some(child);
            } else if segment.is_empty() {
                // An empty component only matches an explicit `//` child.
                node = None;
            } else if let Some(child) = current.wildcard_child() {
                bind(child, segment, &mut params);
                node = Some(child);
            } else if let Some(child) = current.catch_all_child() {
                // Consume everything that is left; re-encode each component
                // so the joined value stays reversible.
                if let Some(name) = child.param_name() {
                    let rest: Vec<_> = path[i..]
                        .iter()
                        .map(|s| encode_component(s.as_ref()))
                        .collect();
                    params.insert(name.to_string(), ParamValue::Single(rest.join("/")));
                }
                node = Some(child);
                break;
            } else {
                node = None;
            }
        }

        let value = node.and_then(Node::value);
        if let Some(node) = node.filter(|n| n.value().is_some()) {
            inherit(node, &mut permissions, &mut filters);
        }

        let listing = path.last().is_some_and(|s| s.as_ref().is_empty());
        if value.is_none() && !(listing && parent.is_some()) {
            tracing::trace!(event = events::LOOKUP_MISS, depth = path.len(), "no route");
            return None;
        }

        if listing {
            if let Some(parent) = parent {
                params.insert(LISTING_KEY.to_string(), ParamValue::List(parent.keys()));
            }
        }

        Some(RouteMatch {
            params,
            value,
            permissions,
            filters,
        })
    }

    /// Look up a request path string. Components are percent-decoded.
    pub fn lookup_path(&self, path: &str) -> Option<RouteMatch<'_, V>> {
        self.lookup(&split_path(path))
    }

    /// Look up a URI. Template segments must be pinned by a fixed value.
    pub fn lookup_uri(&self, uri: &Uri) -> Result<Option<RouteMatch<'_, V>>, RouterError> {
        let path = uri
            .segments()
            .iter()
            .map(|segment| match segment {
                Segment::Literal(s) | Segment::Reserved(s) => Ok(s.as_str()),
                Segment::Param(param) => param.fixed.as_deref().ok_or_else(|| {
                    RouterError::InvalidPath(format!(
                        "unresolved template '{}' in {}",
                        param.name, uri
                    ))
                }),
                Segment::Meta(name) => Err(RouterError::InvalidPath(format!(
                    "meta segment '{name}' in lookup path"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.lookup(&path))
    }
}

impl<V> Default for Router<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shallow: the copy shares the tree.
impl<V> Clone for Router<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

/// Insert `segments` below `node`.
pub(crate) fn insert_into<V>(
    node: &mut Node<V>,
    segments: &[Segment],
    value: &Arc<V>,
) -> Result<(), RouterError> {
    let segments = trim_after_catch_all(segments);
    check_names(node, segments)?;
    tracing::debug!(
        event = events::ROUTE_INSERTED,
        pattern = %segments.iter().map(ToString::to_string).collect::<String>(),
        "route inserted"
    );
    extend(node, segments, value)
}

/// Attach `subtree` at the end of `path`, creating intermediate nodes.
///
/// Returns `false`, leaving the tree untouched, when the endpoint already
/// carries routes.
pub(crate) fn graft<V>(
    node: &mut Node<V>,
    path: &[Segment],
    subtree: Node<V>,
) -> Result<bool, RouterError> {
    match path {
        [] => {
            if node.has_value() || node.has_children() {
                return Ok(false);
            }
            *node = subtree;
            Ok(true)
        }
        [last] => {
            if let Some(existing) = node.child_mut(last)? {
                if existing.has_value() || existing.has_children() {
                    return Ok(false);
                }
            }
            node.set_child(last, subtree);
            Ok(true)
        }
        [first, rest @ ..] => {
            if let Some(child) = node.child_mut(first)? {
                return graft(child, rest, subtree);
            }
            let mut child = Node::new();
            graft(&mut child, rest, subtree)?;
            node.set_child(first, child);
            Ok(true)
        }
    }
}

/// Walk the existing structure `path` would reuse and fail on the first
/// parameter name conflict, before anything is modified.
fn check_names<V>(mut node: &Node<V>, path: &[Segment]) -> Result<(), RouterError> {
    for segment in path {
        let Some(child) = node.slot(segment) else {
            break;
        };
        child.check_name(segment)?;
        node = child;
    }
    Ok(())
}

/// A catch-all consumes the rest of the path, so nothing may follow it.
fn trim_after_catch_all(segments: &[Segment]) -> &[Segment] {
    let catch_all = segments
        .iter()
        .position(|s| s.as_param().is_some_and(|p| p.is_catch_all()));
    match catch_all {
        Some(i) if i + 1 < segments.len() => {
            tracing::warn!(
                event = events::CATCH_ALL_TAIL_IGNORED,
                catch_all = %segments[i],
                ignored = segments.len() - i - 1,
                "segments after a catch-all are ignored"
            );
            &segments[..=i]
        }
        _ => segments,
    }
}

/// Walk existing structure as far as it matches, then attach a fresh subtree
/// for the remainder.
fn extend<V>(node: &mut Node<V>, path: &[Segment], value: &Arc<V>) -> Result<(), RouterError> {
    let Some((segment, rest)) = path.split_first() else {
        node.set_shared_value(value);
        return Ok(());
    };

    if let Some(child) = node.child_mut(segment)? {
        extend(child, rest, value)?;
        if segment.is_optional() && !child.has_value() {
            child.set_shared_value(value);
        }
    } else {
        attach(node, segment, rest, value);
    }

    // The path is complete without its optional suffix.
    if segment.is_optional() && !node.has_value() {
        node.set_shared_value(value);
    }
    Ok(())
}

/// Build a detached subtree for `path`.
fn build_tree<V>(path: &[Segment], value: &Arc<V>) -> Node<V> {
    let mut node = Node::new();
    match path.split_first() {
        None => node.set_shared_value(value),
        Some((segment, rest)) => {
            attach(&mut node, segment, rest, value);
            if segment.is_optional() {
                node.set_shared_value(value);
            }
        }
    }
    node
}

fn attach<V>(node: &mut Node<V>, segment: &Segment, rest: &[Segment], value: &Arc<V>) {
    let is_catch_all = segment.as_param().is_some_and(|p| p.is_catch_all());
    let mut child = if is_catch_all {
        Node::recursive_catch_all(value)
    } else {
        build_tree(rest, value)
    };
    if segment.is_optional() {
        child.set_shared_value(value);
    }
    node.set_child(segment, child);
}

fn inherit<'a, V: RouteValue>(
    node: &'a Node<V>,
    permissions: &mut Vec<&'a Value>,
    filters: &mut Vec<&'a Value>,
) {
    if let Some(value) = node.value() {
        permissions.extend(value.security());
        filters.extend(value.filters());
    }
}

fn bind<V>(child: &Node<V>, segment: &str, params: &mut Params) {
    if let Some(name) = child.param_name() {
        params.insert(name.to_string(), ParamValue::Single(segment.to_string()));
    }
}
