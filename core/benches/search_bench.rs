use criterion::{criterion_group, criterion_main, Criterion};
use folio::SearchEngine;

fn corpus() -> Vec<String> {
    let words = [
        "array", "tree", "graph", "recursion", "heap", "queue", "stack", "hash", "sorting", "search",
        "balanced", "traversal", "dynamic", "greedy", "matroid", "suffix", "prefix", "automaton",
    ];
    (0..400)
        .map(|page| {
            let body: Vec<&str> = (0..250).map(|i| words[(page * 7 + i * 13) % words.len()]).collect();
            format!("{} See page {}.", body.join(" "), (page * 31) % 400 + 1)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let pages = corpus();
    c.bench_function("build_index_400_pages", |b| {
        b.iter(|| {
            let mut engine = SearchEngine::default();
            engine.build_index(pages.iter().cloned())
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let mut engine = SearchEngine::default();
    engine.build_index(corpus());
    c.bench_function("free_text_substring", |b| b.iter(|| engine.search("rec", 1, 10)));
    c.bench_function("boolean_expression", |b| {
        b.iter(|| engine.search("(tree OR graph) AND NOT heap", 1, 10))
    });
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
