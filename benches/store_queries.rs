//! Tag store lookups against an indexed project of generated classes

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use phptags::config::TagConfig;
use phptags::index::{SearchScope, TagStore};
use phptags::indexer::TagExtractor;

const CLASSES: usize = 500;

fn indexed_store(dir: &std::path::Path) -> TagStore {
    let src = dir.join("src");
    std::fs::create_dir_all(&src).expect("create src");
    for i in 0..CLASSES {
        let source = format!(
            "<?php\nnamespace App\\Module{m};\n\nclass Action{i} {{\n    const NAME = 'a{i}';\n    public function handle($request) {{}}\n    public function authorize() {{ return true; }}\n}}\n\nfunction action_helper_{i}($x) {{ return $x; }}\n",
            m = i % 10,
            i = i
        );
        std::fs::write(src.join(format!("Action{}.php", i)), source).expect("write fixture");
    }

    let store = TagStore::open(dir.join("tags.db")).expect("open store");
    let mut extractor = TagExtractor::new(&store, TagConfig::default()).expect("extractor");
    extractor.begin_search(&src).expect("begin search");
    for i in 0..CLASSES {
        extractor.walk(&src.join(format!("Action{}.php", i))).expect("walk");
    }
    extractor.end_search();
    store
}

fn bench_queries(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = indexed_store(dir.path());
    let scope = SearchScope::with_limit(100);

    c.bench_function("near_match_prefix", |b| {
        b.iter(|| black_box(store.near_match(black_box("Action1"), &scope)))
    });
    c.bench_function("exact_member", |b| {
        b.iter(|| black_box(store.exact(black_box("Action250::handle"), &scope)))
    });
    c.bench_function("class_by_fqn", |b| {
        b.iter(|| black_box(store.class_by_fqn(black_box("\\App\\Module3\\Action123"), &scope)))
    });
    c.bench_function("members_named_duck_typing", |b| {
        b.iter(|| black_box(store.members_named(black_box("auth"), false, &scope)))
    });
    c.bench_function("near_match_files", |b| {
        b.iter(|| black_box(store.near_match_files(black_box("action4"), &scope)))
    });
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
