//! Criterion benchmarks for tame-core.
//!
//! ## Benchmark groups
//!
//! 1. **index_build** — Merging loaded documents into the index.
//! 2. **resolve** — Parent-link resolution over a finished index.
//! 3. **cycles** — White/gray/black cycle detection on synthetic graphs.
//! 4. **load** — Parsing and loading one document from text.
//! 5. **corpus** — Full discovery + load + index on a temp repository.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/tame-core/Cargo.toml
//! # Run only the resolution group:
//! cargo bench --manifest-path crates/tame-core/Cargo.toml -- resolve
//! ```

use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;

use tame_core::config::RepoConfig;
use tame_core::graph::resolver::resolve_links;
use tame_core::graph::validator::find_cycles;
use tame_core::graph::Graph;
use tame_core::indexer::index::Index;
use tame_core::indexer::loader::{load_document, LoadOptions};
use tame_core::indexer::parser::parse_source;
use tame_core::indexer::pipeline::build_corpus;
use tame_core::{CancelToken, DocumentId, LinkSpec, MetadataDocument};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A layered corpus: every document links to one parent by uid and one by
/// name in the previous layer of `width` documents.
fn synthetic_corpus(n: usize, width: usize) -> Vec<MetadataDocument> {
    (0..n)
        .map(|i| {
            let mut parent_links = Vec::new();
            if i >= width {
                let up = i - width;
                parent_links.push(LinkSpec::ByTypeUid {
                    doc_type: "sample".to_string(),
                    uid: format!("u{up}"),
                });
                parent_links.push(LinkSpec::ByTypeName {
                    doc_type: "sample".to_string(),
                    name: format!("n{}", up.saturating_sub(1)),
                });
            }
            MetadataDocument {
                path: PathBuf::from(format!("/bench/d{i:06}.yaml")),
                doc_type: "sample".to_string(),
                name: Some(format!("n{i}")),
                uid: Some(format!("u{i}")),
                files: vec![],
                parent_links,
                extra: IndexMap::new(),
                metadata_only: true,
            }
        })
        .collect()
}

fn index_of(docs: &[MetadataDocument]) -> Index {
    let mut index = Index::new();
    for doc in docs {
        let _ = index.insert(doc);
    }
    index
}

/// Chain graph `0 -> 1 -> ... -> n-1`, optionally closed into a ring.
fn chain_graph(n: usize, closed: bool) -> Graph {
    let parents = (0..n)
        .map(|i| {
            if i + 1 < n {
                vec![DocumentId(i + 1)]
            } else if closed {
                vec![DocumentId(0)]
            } else {
                vec![]
            }
        })
        .collect();
    Graph::from_parents(parents)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    for &n in &[100, 1_000, 10_000] {
        let docs = synthetic_corpus(n, 10);
        group.bench_with_input(BenchmarkId::new("insert", n), &docs, |b, docs| {
            b.iter(|| black_box(index_of(docs)));
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for &n in &[100, 1_000, 10_000] {
        let docs = synthetic_corpus(n, 10);
        let index = index_of(&docs);
        group.bench_with_input(BenchmarkId::new("all_links", n), &docs, |b, docs| {
            b.iter(|| {
                for doc in docs {
                    black_box(resolve_links(&index, doc));
                }
            });
        });
    }
    group.finish();
}

fn bench_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycles");
    for &n in &[100, 1_000, 10_000] {
        let acyclic = chain_graph(n, false);
        let ring = chain_graph(n, true);
        group.bench_with_input(BenchmarkId::new("chain", n), &acyclic, |b, g| {
            b.iter(|| black_box(find_cycles(g)));
        });
        group.bench_with_input(BenchmarkId::new("ring", n), &ring, |b, g| {
            b.iter(|| black_box(find_cycles(g)));
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let source = "type: sample\nname: s1\nuid: u1\nfiles:\n  - reads/*.fastq\n  - seq.gb\n\
                  parent:\n  - ../project.yaml\n  - {type: plasmid, uid: p001}\n\
                  temperature: 30\nnotes: [a, b, c]\n";
    let path = Path::new("/bench/samples/s1.yaml");
    let options = LoadOptions::default();
    c.bench_function("load_document", |b| {
        b.iter(|| {
            let value = parse_source(black_box(source), path).unwrap();
            black_box(load_document(path, value, &options).unwrap())
        });
    });
}

fn bench_corpus(c: &mut Criterion) {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = std::fs::canonicalize(tmp.path()).unwrap();
    std::fs::write(root.join("tame.yaml"), "\n").unwrap();
    for i in 0..500 {
        let dir = root.join(format!("batch{}", i / 50));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("d{i}.yaml")),
            format!("type: sample\nuid: u{i}\nfiles: []\n"),
        )
        .unwrap();
    }

    let mut group = c.benchmark_group("corpus");
    group.sample_size(20);
    for &workers in &[1, 4] {
        group.bench_with_input(
            BenchmarkId::new("build_500", workers),
            &workers,
            |b, &w| {
                b.iter(|| {
                    black_box(
                        build_corpus(
                            &root,
                            &RepoConfig::default(),
                            &LoadOptions::default(),
                            w,
                            &CancelToken::new(),
                        )
                        .unwrap(),
                    )
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_index_build,
    bench_resolve,
    bench_cycles,
    bench_load,
    bench_corpus
);
criterion_main!(benches);
