//! Routing benchmarks for the URI-template router.
//!
//! Run with: cargo bench -p sentier

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use sentier::params::params;
use sentier::{ApiSpec, Router, Uri};

/// Generate a set of realistic API route patterns.
fn generate_routes(count: usize) -> Vec<String> {
    let resources = [
        "users",
        "orders",
        "products",
        "customers",
        "invoices",
        "payments",
    ];

    let mut routes = Vec::new();

    for resource in &resources {
        routes.push(format!("/{}", resource));
        routes.push(format!("/{}/{{id}}", resource));
        routes.push(format!("/{}/{{id}}/history{{/revision}}", resource));
    }

    routes.push("/users/{id}/orders/{orderId}".to_string());
    routes.push("/products/{id}/reviews/{reviewId}".to_string());
    routes.push("/files/{+path}".to_string());

    // Fill to desired count with variations
    while routes.len() < count {
        let i = routes.len();
        let resource = resources[i % resources.len()];
        routes.push(format!("/api/v{}/{}/{{id}}", i / 10, resource));
    }

    routes.truncate(count);
    routes
}

fn build_spec(routes: &[String]) -> ApiSpec<Value> {
    routes
        .iter()
        .enumerate()
        .fold(ApiSpec::new(), |spec, (i, pattern)| {
            spec.with_path(pattern.as_str(), json!({ "operation": i }))
        })
}

fn build_router(routes: &[String]) -> Router<Value> {
    let mut router = Router::new();
    for (i, pattern) in routes.iter().enumerate() {
        router
            .insert_pattern(pattern, json!({ "operation": i }))
            .expect("valid route");
    }
    router
}

fn bench_router_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_lookup");

    for route_count in [10, 50, 100, 500, 1000] {
        let routes = generate_routes(route_count);
        let router = build_router(&routes);

        group.bench_with_input(
            BenchmarkId::new("static_path", route_count),
            &router,
            |b, router| {
                b.iter(|| {
                    black_box(router.lookup_path("/users"));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("param_path", route_count),
            &router,
            |b, router| {
                b.iter(|| {
                    black_box(router.lookup_path("/users/12345"));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("catch_all_path", route_count),
            &router,
            |b, router| {
                b.iter(|| {
                    black_box(router.lookup_path("/files/a/b/c%20d.txt"));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("listing", route_count),
            &router,
            |b, router| {
                b.iter(|| {
                    black_box(router.lookup_path("/"));
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("not_found", route_count),
            &router,
            |b, router| {
                b.iter(|| {
                    black_box(router.lookup_path("/nonexistent/path/here"));
                });
            },
        );
    }

    group.finish();
}

fn bench_router_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_build");

    for route_count in [10, 50, 100, 500] {
        let routes = generate_routes(route_count);

        group.bench_with_input(
            BenchmarkId::new("insert", route_count),
            &routes,
            |b, routes| {
                b.iter(|| {
                    black_box(build_router(routes));
                });
            },
        );

        // One spec mounted under many domains shares a single subtree.
        let spec = (0..50).fold(build_spec(&routes), |spec, i| {
            spec.with_prefix(format!("/{{domain:wiki{i}.org}}/v1"))
        });
        group.bench_with_input(
            BenchmarkId::new("add_spec_50_domains", route_count),
            &spec,
            |b, spec| {
                b.iter(|| {
                    let mut router = Router::new();
                    router.add_spec(spec).expect("valid route");
                    black_box(router);
                });
            },
        );
    }

    group.finish();
}

fn bench_uri_expand(c: &mut Criterion) {
    let uri = Uri::parse_pattern("/{domain:test.com}/v1/page/{title}{/revision}{+rest}")
        .expect("valid pattern");
    let values = params([("title", "Foo"), ("revision", "42"), ("rest", "a/b")]);

    c.bench_function("uri_expand", |b| {
        b.iter(|| {
            black_box(uri.expand(Some(&values)).map(|u| u.to_string()))
        });
    });
}

criterion_group!(benches, bench_router_lookup, bench_router_build, bench_uri_expand);
criterion_main!(benches);
