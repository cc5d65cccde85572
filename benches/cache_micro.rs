use catalog_search::config::SearchServiceConfig;
use catalog_search::model::SearchFlags;
use catalog_search::search::memory::MemoryBackend;
use catalog_search::search::{Criterion as FilterCriterion, Filter, SearchBackend, SearchRequest, SearchService, StaticEntityRegistry};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

const ENTITY_TYPES: &[&str] = &["dataset", "chart", "dashboard", "corpuser"];

fn seeded_service(docs_per_type: usize) -> SearchService {
    let backend = Arc::new(MemoryBackend::new());
    let platforms = ["hive", "snowflake", "bigquery"];
    for entity_type in ENTITY_TYPES {
        for i in 0..docs_per_type {
            let doc = serde_json::json!({
                "urn": format!("urn:li:{entity_type}:{i}"),
                "name": format!("orders table {i}"),
                "platform": platforms[i % platforms.len()],
                "rows": i,
            });
            backend
                .upsert_document(entity_type, &doc.to_string(), &format!("{entity_type}-{i}"))
                .expect("seed");
        }
    }
    SearchService::from_config(
        &SearchServiceConfig::default(),
        Arc::new(StaticEntityRegistry::new(ENTITY_TYPES.iter().copied())),
        backend,
    )
}

fn request() -> SearchRequest {
    SearchRequest::new("orders")
        .filter(Filter::and([FilterCriterion::equal("platform", ["hive", "snowflake"])]))
        .flags(SearchFlags::fulltext())
}

fn bench_cached_vs_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_across_entities");
    for docs in [100usize, 1_000] {
        let service = seeded_service(docs);
        service.search(&request()).expect("warm");

        group.bench_with_input(BenchmarkId::new("cache_hit", docs), &docs, |b, _| {
            b.iter(|| black_box(service.search(&request()).expect("search")));
        });

        let bypass = request().flags(SearchFlags::fulltext().with_skip_cache(true));
        group.bench_with_input(BenchmarkId::new("skip_cache", docs), &docs, |b, _| {
            b.iter(|| black_box(service.search(&bypass).expect("search")));
        });
    }
    group.finish();
}

fn bench_cache_churn(c: &mut Criterion) {
    let service = seeded_service(50);
    let mut i = 0usize;
    c.bench_function("result_cache_churn", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            let request = SearchRequest::new(format!("orders {}", i % 4096));
            black_box(service.search(&request).expect("search"))
        });
    });
}

criterion_group!(cache_benches, bench_cached_vs_uncached, bench_cache_churn);
criterion_main!(cache_benches);
