use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use halcyon::{
    Accept, ContractDeclaration, MediaType, Negotiator, OperationSignature, Registry, ResourceDeclaration,
};
use std::hint::black_box;

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

fn producible() -> Vec<MediaType> {
    vec![
        MediaType::hal_json_with_profile("https://example.com/collection/v1").with_server_quality(0.2),
        MediaType::hal_json_with_profile("https://example.com/collection/v2").with_server_quality(0.7),
        MediaType::new("application", "x.orders-v2+json").with_server_quality(0.9),
        MediaType::json().with_server_quality(0.5),
    ]
}

fn bench_media_type_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("media_type_parse");

    group.bench_function("plain", |b| b.iter(|| MediaType::parse(black_box("application/json"))));

    group.bench_function("profile_and_qs", |b| {
        b.iter(|| {
            MediaType::parse(black_box(
                "application/hal+json; profile=\"https://example.com/collection/v2\"; qs=0.7",
            ))
        })
    });

    group.finish();
}

fn bench_accept_parse(c: &mut Criterion) {
    c.bench_function("accept_parse_browser", |b| {
        b.iter(|| Accept::parse(black_box(BROWSER_ACCEPT)))
    });
}

fn bench_select(c: &mut Criterion) {
    let producible = producible();
    let mut group = c.benchmark_group("select");

    let cases = [
        ("any", "*/*"),
        ("browser", BROWSER_ACCEPT),
        ("pinned_profile", "application/hal+json; profile=\"https://example.com/collection/v1\""),
        ("json_family", "application/json, application/*+json;q=0.5"),
    ];

    for (name, header) in cases {
        let accept = Accept::parse(header).unwrap();
        group.bench_with_input(BenchmarkId::new("media_types", name), &accept, |b, accept| {
            b.iter(|| halcyon::select(black_box(&producible), black_box(accept.media_types())))
        });
    }

    group.finish();
}

fn bench_negotiate(c: &mut Criterion) {
    let producible = producible();
    let negotiator = Negotiator::new();
    let accept = Accept::parse("application/json").unwrap();

    c.bench_function("negotiate_json_suffix_expansion", |b| {
        b.iter(|| negotiator.negotiate(black_box(&producible), black_box(&accept)))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let mut registry = Registry::new();
    registry
        .register_contract(ContractDeclaration::new("Collection").operation(OperationSignature::new("list"), producible()))
        .register_resource(ResourceDeclaration::new("Base").implements("Collection"))
        .register_resource(ResourceDeclaration::new("OrderResource").extends("Base"));

    let list = OperationSignature::new("list");
    let mut group = c.benchmark_group("resolve");

    group.bench_function("cached", |b| {
        b.iter(|| registry.resolve(black_box("OrderResource"), black_box(&list)))
    });

    group.bench_function("cold", |b| {
        b.iter(|| {
            registry.cache().clear();
            registry.resolve(black_box("OrderResource"), black_box(&list))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_media_type_parse,
    bench_accept_parse,
    bench_select,
    bench_negotiate,
    bench_resolve,
);
criterion_main!(benches);
