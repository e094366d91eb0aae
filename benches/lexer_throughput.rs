//! Lexer and scanner throughput over generated PHP sources of growing size

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use phptags::config::TagConfig;
use phptags::indexer::build_tags;
use phptags::lexer::token::TokenKind;
use phptags::lexer::Lexer;
use phptags::parser::scan_string;

fn generate_source(classes: usize) -> String {
    let mut source = String::from("<?php\nnamespace Bench\\Models;\n\nuse Bench\\Support\\Collection;\n\n");
    for i in 0..classes {
        source.push_str(&format!(
            r#"/**
 * Generated model {i}
 */
class Model{i} extends Base implements \JsonSerializable
{{
    const TABLE = 'model_{i}';
    protected static $instances = [];
    private ?Collection $items = null;

    public function __construct(array $attributes = [])
    {{
        $this->items = new Collection($attributes);
    }}

    public function find(int $id, string ...$columns): ?self
    {{
        $query = $this->items->where('id', $id);
        foreach ($columns as $key => $column) {{
            $query = $query->select($column);
        }}
        return $query->first() ?? null;
    }}

    public function jsonSerialize(): mixed
    {{
        return array_map(fn($item) => $item->toArray(), $this->items->all());
    }}
}}

"#
        ));
    }
    source
}

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    for classes in [10, 100, 1000] {
        let source = generate_source(classes);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokens", classes), &source, |b, source| {
            b.iter(|| {
                let mut lexer = Lexer::new(source.as_str());
                let mut count = 0usize;
                while lexer.next_token() != TokenKind::End {
                    count += 1;
                }
                black_box(count)
            });
        });
    }
    group.finish();
}

fn bench_scan_and_tags(c: &mut Criterion) {
    let config = TagConfig::default();
    let mut group = c.benchmark_group("scanner");
    for classes in [10, 100, 1000] {
        let source = generate_source(classes);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tags", classes), &source, |b, source| {
            b.iter(|| {
                let events = scan_string(black_box(source), &config);
                black_box(build_tags(&events, "/bench/Models.php"))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lexer, bench_scan_and_tags);
criterion_main!(benches);
