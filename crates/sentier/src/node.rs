//! Trie node shared by all routers.
//!
//! Children live behind an `Arc`, so [`Node::clone`] is shallow and subtrees
//! can be shared between tree positions and router instances. Insertion into
//! a shared subtree copies the nodes on the insertion path first, leaving
//! other referents untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RouterError;
use crate::pattern::Segment;

/// Metadata a route value contributes to every lookup passing through it.
pub trait RouteValue {
    /// Permissions inherited by all paths below this node.
    fn security(&self) -> &[Value] {
        &[]
    }

    /// Filters inherited by all paths below this node.
    fn filters(&self) -> &[Value] {
        &[]
    }
}

/// JSON values expose their `security` and `filters` arrays.
impl RouteValue for Value {
    fn security(&self) -> &[Value] {
        self.get("security")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn filters(&self) -> &[Value] {
        self.get("filters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl RouteValue for String {}

impl RouteValue for &'static str {}

/// A node in the lookup graph.
#[derive(Debug)]
pub struct Node<V> {
    value: Option<Arc<V>>,
    children: Arc<Children<V>>,
    /// Parameter bound when the parent descends into this node.
    param_name: Option<String>,
}

#[derive(Debug)]
struct Children<V> {
    /// Literal children, including the empty key for `//`.
    exact: HashMap<String, Arc<Node<V>>>,
    /// Annotation children, invisible to routing and listings.
    meta: HashMap<String, Arc<Node<V>>>,
    wildcard: Option<Arc<Node<V>>>,
    catch_all: Option<CatchAll<V>>,
}

#[derive(Debug)]
enum CatchAll<V> {
    Child(Arc<Node<V>>),
    /// The catch-all edge loops back to the node itself.
    Recursive,
}

impl<V> Node<V> {
    pub fn new() -> Self {
        Self {
            value: None,
            children: Arc::new(Children::default()),
            param_name: None,
        }
    }

    pub fn with_value(value: V) -> Self {
        let mut node = Self::new();
        node.value = Some(Arc::new(value));
        node
    }

    /// Value for a path ending on this node.
    pub fn value(&self) -> Option<&V> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: V) {
        self.value = Some(Arc::new(value));
    }

    pub(crate) fn set_shared_value(&mut self, value: &Arc<V>) {
        self.value = Some(Arc::clone(value));
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn param_name(&self) -> Option<&str> {
        self.param_name.as_deref()
    }

    /// A terminal node for `{+name}` that keeps consuming segments through
    /// its own catch-all edge.
    pub(crate) fn recursive_catch_all(value: &Arc<V>) -> Self {
        let mut node = Self::new();
        node.set_shared_value(value);
        node.children_mut().catch_all = Some(CatchAll::Recursive);
        node
    }

    fn children_mut(&mut self) -> &mut Children<V> {
        Arc::make_mut(&mut self.children)
    }

    /// Register `child` under `key`, replacing any previous child there.
    ///
    /// Templated keys record their parameter name on the child: a fixed
    /// value (`{name:value}`) registers as a literal, `{+name}` as the
    /// catch-all, any other template as the wildcard.
    pub fn set_child(&mut self, key: &Segment, mut child: Node<V>) {
        if let Segment::Param(param) = key {
            child.param_name = Some(param.name.clone());
        }
        let children = self.children_mut();
        match key {
            Segment::Literal(s) | Segment::Reserved(s) => {
                children.exact.insert(s.clone(), Arc::new(child));
            }
            Segment::Meta(name) => {
                children.meta.insert(name.clone(), Arc::new(child));
            }
            Segment::Param(param) if param.is_catch_all() => {
                children.catch_all = Some(CatchAll::Child(Arc::new(child)));
            }
            Segment::Param(param) => match &param.fixed {
                Some(fixed) => {
                    children.exact.insert(fixed.clone(), Arc::new(child));
                }
                None => children.wildcard = Some(Arc::new(child)),
            },
        }
    }

    /// Exact child lookup for tree construction and inspection. Templates
    /// only match a wildcard or catch-all child bound to the same name.
    pub fn child(&self, key: &Segment) -> Option<&Node<V>> {
        let node = self.slot(key)?;
        match key {
            Segment::Param(param) if param.fixed.is_none() => {
                (node.param_name() == Some(param.name.as_str())).then_some(node)
            }
            _ => Some(node),
        }
    }

    /// The child stored under `key`'s edge, whatever name it binds.
    pub(crate) fn slot(&self, key: &Segment) -> Option<&Node<V>> {
        let children = &self.children;
        let node = match key {
            Segment::Literal(s) | Segment::Reserved(s) => children.exact.get(s.as_str()),
            Segment::Meta(name) => children.meta.get(name.as_str()),
            Segment::Param(param) if param.is_catch_all() => match &children.catch_all {
                Some(CatchAll::Child(node)) => Some(node),
                Some(CatchAll::Recursive) | None => None,
            },
            Segment::Param(param) => match &param.fixed {
                Some(fixed) => children.exact.get(fixed.as_str()),
                None => children.wildcard.as_ref(),
            },
        }?;
        Some(&**node)
    }

    /// Fails with `NameConflict` when this node, reached by `key`, already
    /// binds a parameter name other than the one `key` requests.
    pub(crate) fn check_name(&self, key: &Segment) -> Result<(), RouterError> {
        match (key, self.param_name.as_deref()) {
            (Segment::Param(param), Some(existing)) if existing != param.name => {
                Err(RouterError::NameConflict {
                    existing: existing.to_string(),
                    requested: param.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Mutable exact child lookup used during insertion.
    ///
    /// Fails with `NameConflict` when the child found for a templated key
    /// already binds a different parameter name. A literal child reached by
    /// `{name:value}` adopts the name.
    pub(crate) fn child_mut(&mut self, key: &Segment) -> Result<Option<&mut Node<V>>, RouterError> {
        match self.slot(key) {
            Some(child) => child.check_name(key)?,
            None => return Ok(None),
        }

        let children = self.children_mut();
        let slot = match key {
            Segment::Literal(s) | Segment::Reserved(s) => children.exact.get_mut(s.as_str()),
            Segment::Meta(name) => children.meta.get_mut(name.as_str()),
            Segment::Param(param) if param.is_catch_all() => match &mut children.catch_all {
                Some(CatchAll::Child(node)) => Some(node),
                Some(CatchAll::Recursive) | None => None,
            },
            Segment::Param(param) => match &param.fixed {
                Some(fixed) => children.exact.get_mut(fixed.as_str()),
                None => children.wildcard.as_mut(),
            },
        };
        let Some(slot) = slot else {
            return Ok(None);
        };

        let child = Arc::make_mut(slot);
        if let Segment::Param(param) = key {
            child.param_name.get_or_insert_with(|| param.name.clone());
        }
        Ok(Some(child))
    }

    pub(crate) fn exact_child(&self, segment: &str) -> Option<&Node<V>> {
        self.children.exact.get(segment).map(Arc::as_ref)
    }

    pub(crate) fn wildcard_child(&self) -> Option<&Node<V>> {
        self.children.wildcard.as_deref()
    }

    pub(crate) fn catch_all_child(&self) -> Option<&Node<V>> {
        match &self.children.catch_all {
            Some(CatchAll::Child(node)) => Some(&**node),
            Some(CatchAll::Recursive) => Some(self),
            None => None,
        }
    }

    pub fn has_children(&self) -> bool {
        let children = &self.children;
        !children.exact.is_empty()
            || !children.meta.is_empty()
            || children.wildcard.is_some()
            || children.catch_all.is_some()
    }

    /// Sorted literal child keys, as returned in directory listings.
    ///
    /// Empty when a wildcard or catch-all child exists. The empty key is only
    /// listed when its child has children of its own (`/double//slash`).
    pub fn keys(&self) -> Vec<String> {
        let children = &self.children;
        if children.wildcard.is_some() || children.catch_all.is_some() {
            return Vec::new();
        }
        let mut keys: Vec<String> = children
            .exact
            .iter()
            .filter(|(key, child)| !key.is_empty() || child.has_children())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Call `f` with the path and value of every valued node, depth first,
    /// a node before its children. Templated edges appear as `{name}` and
    /// `{+name}`; meta children and the catch-all self loop are skipped.
    ///
    /// Nodes keep the bound name but not the template operator, so an
    /// optional `{/name}` edge is reported as `{name}`. The reported path
    /// names a route; it does not reproduce the inserted pattern.
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&[String], &V),
    {
        let mut path = Vec::new();
        self.visit_inner(&mut path, &mut f);
    }

    fn visit_inner<F>(&self, path: &mut Vec<String>, f: &mut F)
    where
        F: FnMut(&[String], &V),
    {
        if let Some(value) = &self.value {
            f(path.as_slice(), &**value);
        }

        let mut exact: Vec<_> = self.children.exact.iter().collect();
        exact.sort_by(|a, b| a.0.cmp(b.0));
        let templated = self
            .children
            .wildcard
            .iter()
            .map(|node| (node, "{"))
            .chain(match &self.children.catch_all {
                Some(CatchAll::Child(node)) => Some((node, "{+")),
                _ => None,
            });

        let edges = exact
            .into_iter()
            .map(|(key, node)| (key.clone(), node))
            .chain(templated.map(|(node, open)| {
                (format!("{open}{}}}", node.param_name().unwrap_or_default()), node)
            }));

        for (segment, child) in edges {
            path.push(segment);
            child.visit_inner(path, f);
            path.pop();
        }
    }
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shallow clone: the copy shares children with the original.
impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            children: Arc::clone(&self.children),
            param_name: self.param_name.clone(),
        }
    }
}

impl<V> Default for Children<V> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            meta: HashMap::new(),
            wildcard: None,
            catch_all: None,
        }
    }
}

impl<V> Clone for Children<V> {
    fn clone(&self) -> Self {
        Self {
            exact: self.exact.clone(),
            meta: self.meta.clone(),
            wildcard: self.wildcard.clone(),
            catch_all: self.catch_all.clone(),
        }
    }
}

impl<V> Clone for CatchAll<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Child(node) => Self::Child(Arc::clone(node)),
            Self::Recursive => Self::Recursive,
        }
    }
}
