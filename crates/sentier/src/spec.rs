//! Declarative route maps and prefix mounting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RouterError;
use crate::logging::events;
use crate::node::Node;
use crate::pattern::{parse_pattern, Segment};
use crate::trie::{graft, insert_into, Router};

/// A set of routes, optionally mounted under one or more prefixes.
///
/// ```yaml
/// prefixes:
///   - /{domain:en.wikipedia.org}/v1
/// paths:
///   /page/{title}: { operationId: getPage }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec<V> {
    /// Patterns the paths are mounted under. Empty mounts at the root.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Route patterns and their values, iterated in key order.
    pub paths: BTreeMap<String, V>,
}

impl<V> ApiSpec<V> {
    pub fn new() -> Self {
        Self {
            prefixes: Vec::new(),
            paths: BTreeMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn with_path(mut self, pattern: impl Into<String>, value: V) -> Self {
        self.paths.insert(pattern.into(), value);
        self
    }
}

impl<V> Default for ApiSpec<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a route map from a YAML/JSON string.
pub fn parse_spec(input: &str) -> Result<ApiSpec<Value>, RouterError> {
    // JSON is valid YAML
    let spec: ApiSpec<Value> =
        serde_yaml::from_str(input).map_err(|e| RouterError::SpecParse(e.to_string()))?;

    tracing::debug!(
        event = events::SPEC_LOADED,
        paths = spec.paths.len(),
        prefixes = spec.prefixes.len(),
        "spec loaded"
    );
    Ok(spec)
}

/// Parse a route map from a file path.
pub fn parse_spec_file(path: &Path) -> Result<ApiSpec<Value>, RouterError> {
    let content = std::fs::read_to_string(path)?;
    parse_spec(&content)
}

type Routes<V> = Vec<(Vec<Segment>, Arc<V>)>;

fn parse_routes<V: Clone>(spec: &ApiSpec<V>) -> Result<Routes<V>, RouterError> {
    spec.paths
        .iter()
        .map(|(pattern, value)| Ok((parse_pattern(pattern)?, Arc::new(value.clone()))))
        .collect()
}

fn build<V>(routes: &Routes<V>) -> Result<Node<V>, RouterError> {
    let mut root = Node::new();
    for (segments, value) in routes {
        insert_into(&mut root, segments, value)?;
    }
    Ok(root)
}

impl<V: Clone> Router<V> {
    /// Build a detached tree from the spec's paths. Prefixes are ignored.
    pub fn spec_to_tree(spec: &ApiSpec<V>) -> Result<Node<V>, RouterError> {
        build(&parse_routes(spec)?)
    }

    /// Mount the spec's paths under each of its prefixes.
    ///
    /// The spec tree is built once. A prefix that does not lead to existing
    /// routes receives a shallow clone of it, so all such prefixes share one
    /// subtree. Under a prefix that already carries routes, the paths are
    /// inserted one by one instead. On error the router is left unchanged.
    pub fn add_spec(&mut self, spec: &ApiSpec<V>) -> Result<(), RouterError> {
        let routes = parse_routes(spec)?;
        let tree = build(&routes)?;

        let prefixes = if spec.prefixes.is_empty() {
            vec![Vec::new()]
        } else {
            spec.prefixes
                .iter()
                .map(|p| parse_pattern(p))
                .collect::<Result<Vec<_>, _>>()?
        };

        // Mount on a shallow copy; earlier prefixes must not stay mounted
        // when a later one fails.
        let mut root = self.tree().clone();
        for prefix in &prefixes {
            let shared = graft(&mut root, prefix, tree.clone())?;
            if !shared {
                for (segments, value) in &routes {
                    let full: Vec<Segment> = prefix.iter().chain(segments).cloned().collect();
                    insert_into(&mut root, &full, value)?;
                }
            }
            tracing::debug!(
                event = events::SPEC_MOUNTED,
                prefix = %prefix.iter().map(ToString::to_string).collect::<String>(),
                paths = routes.len(),
                shared,
                "spec mounted"
            );
        }
        self.set_tree(root);
        Ok(())
    }

    /// Removing a mounted spec is unsupported, as its subtree may be shared
    /// by other prefixes. Rebuild the router instead.
    pub fn remove_spec(&mut self, _spec: &ApiSpec<V>) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented(
            "spec removal; rebuild the router instead",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const SPEC: &str = r#"
prefixes:
  - /{domain:en.wikipedia.org}/v1
  - /{domain:de.wikipedia.org}/v1
paths:
  /page/{title}:
    operationId: getPage
    security: [read]
  /page/{title}/html:
    operationId: getHtml
"#;

    #[test]
    fn parse_yaml_spec() {
        let spec = parse_spec(SPEC).unwrap();
        assert_eq!(spec.prefixes.len(), 2);
        assert_eq!(
            spec.paths.keys().collect::<Vec<_>>(),
            vec!["/page/{title}", "/page/{title}/html"]
        );
        assert_eq!(spec.paths["/page/{title}"]["operationId"], "getPage");
    }

    #[test]
    fn parse_json_spec_without_prefixes() {
        let spec = parse_spec(r#"{ "paths": { "/health": { "ok": true } } }"#).unwrap();
        assert!(spec.prefixes.is_empty());
        assert_eq!(spec.paths["/health"], json!({ "ok": true }));
    }

    #[test]
    fn parse_invalid_spec() {
        let err = parse_spec("prefixes: [unclosed").unwrap_err();
        assert!(matches!(err, RouterError::SpecParse(_)));

        let err = parse_spec("prefixes: []").unwrap_err();
        assert!(matches!(err, RouterError::SpecParse(_)));
    }

    #[test]
    fn parse_spec_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SPEC.as_bytes()).unwrap();

        let spec = parse_spec_file(file.path()).unwrap();
        assert_eq!(spec.paths.len(), 2);
    }

    #[test]
    fn parse_spec_file_missing() {
        let err = parse_spec_file(Path::new("/nonexistent/spec.yaml")).unwrap_err();
        assert!(matches!(err, RouterError::Io(_)));
    }

    #[test]
    fn spec_to_tree_ignores_prefixes() {
        let spec = parse_spec(SPEC).unwrap();
        let tree = Router::spec_to_tree(&spec).unwrap();
        let router = Router::with_tree(tree);

        let m = router.lookup_path("/page/Foo/html").unwrap();
        assert_eq!(m.value.unwrap()["operationId"], "getHtml");
        assert!(router.lookup_path("/en.wikipedia.org/v1/page/Foo").is_none());
    }

    #[test]
    fn add_spec_mounts_under_each_prefix() {
        let spec = parse_spec(SPEC).unwrap();
        let mut router = Router::new();
        router.add_spec(&spec).unwrap();

        for domain in ["en.wikipedia.org", "de.wikipedia.org"] {
            let m = router.lookup_path(&format!("/{domain}/v1/page/Foo")).unwrap();
            assert_eq!(m.params["domain"], domain);
            assert_eq!(m.params["title"], "Foo");
            assert_eq!(m.permissions, vec![&json!("read")]);
        }
        assert!(router.lookup_path("/fr.wikipedia.org/v1/page/Foo").is_none());
    }

    #[test]
    fn add_spec_shares_the_spec_subtree() {
        let spec = parse_spec(SPEC).unwrap();
        let mut router = Router::new();
        router.add_spec(&spec).unwrap();

        let en = router.lookup_path("/en.wikipedia.org/v1/page/Foo").unwrap();
        let de = router.lookup_path("/de.wikipedia.org/v1/page/Foo").unwrap();
        assert!(std::ptr::eq(en.value.unwrap(), de.value.unwrap()));
    }

    #[test]
    fn add_spec_under_existing_prefix_keeps_routes() {
        let mut router = Router::new();
        router
            .insert_pattern("/{domain:en.wikipedia.org}/v1/stats", json!({ "id": "stats" }))
            .unwrap();

        let spec = ApiSpec::new()
            .with_prefix("/{domain:en.wikipedia.org}/v1")
            .with_path("/page/{title}", json!({ "id": "page" }));
        router.add_spec(&spec).unwrap();

        let stats = router.lookup_path("/en.wikipedia.org/v1/stats").unwrap();
        assert_eq!(stats.value, Some(&json!({ "id": "stats" })));
        let page = router.lookup_path("/en.wikipedia.org/v1/page/Foo").unwrap();
        assert_eq!(page.value, Some(&json!({ "id": "page" })));
    }

    #[test]
    fn add_spec_later_does_not_leak_into_shared_prefixes() {
        let spec = ApiSpec::new()
            .with_prefix("/{domain:a.org}/v1")
            .with_prefix("/{domain:b.org}/v1")
            .with_path("/page", json!({}));
        let mut router = Router::new();
        router.add_spec(&spec).unwrap();

        let extra = ApiSpec::new()
            .with_prefix("/{domain:a.org}/v1")
            .with_path("/extra", json!({}));
        router.add_spec(&extra).unwrap();

        assert!(router.lookup_path("/a.org/v1/extra").is_some());
        assert!(router.lookup_path("/b.org/v1/extra").is_none());
        assert!(router.lookup_path("/b.org/v1/page").is_some());
    }

    #[test]
    fn add_spec_failure_mounts_no_prefix() {
        let mut router = Router::new();
        router
            .insert_pattern("/{lang:b.org}/v1/x", json!({ "id": "x" }))
            .unwrap();

        let spec = ApiSpec::new()
            .with_prefix("/{domain:a.org}/v1")
            .with_prefix("/{domain:b.org}/v1")
            .with_path("/page", json!({ "id": "page" }));
        assert!(matches!(
            router.add_spec(&spec),
            Err(RouterError::NameConflict { .. })
        ));

        assert!(router.lookup_path("/a.org/v1/page").is_none());
        let x = router.lookup_path("/b.org/v1/x").unwrap();
        assert_eq!(x.params["lang"], "b.org");
    }

    #[test]
    fn add_spec_at_root() {
        let spec = ApiSpec::new().with_path("/health", json!({ "ok": true }));
        let mut router = Router::new();
        router.add_spec(&spec).unwrap();
        router.add_spec(&ApiSpec::new().with_path("/ready", json!({}))).unwrap();

        assert!(router.lookup_path("/health").is_some());
        assert!(router.lookup_path("/ready").is_some());
    }

    #[test]
    fn add_spec_rejects_bad_patterns() {
        let spec = ApiSpec::new().with_path("/page/{title", json!({}));
        let mut router = Router::new();
        assert!(matches!(router.add_spec(&spec), Err(RouterError::Syntax { .. })));
    }

    #[test]
    fn remove_spec_is_not_implemented() {
        let spec = ApiSpec::new().with_path("/a", json!({}));
        let mut router = Router::new();
        router.add_spec(&spec).unwrap();
        assert!(matches!(
            router.remove_spec(&spec),
            Err(RouterError::NotImplemented(_))
        ));
    }
}
