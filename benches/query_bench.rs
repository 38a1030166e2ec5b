//! Count/locate micro-benchmarks over both rank backends.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use csidx::config::BuildConfig;
use csidx::fm::{BlockFmIndex, FmIndex, LearnedFmIndex};

fn sample_text(len: usize) -> Vec<u8> {
    let mut rng = ChaChaRng::seed_from_u64(1234);
    let mut text: Vec<u8> = (0..len).map(|_| b'a' + rng.gen_range(0..8)).collect();
    text.push(b'$');
    text
}

fn bench_queries(c: &mut Criterion) {
    let text = sample_text(1 << 18);
    let config = BuildConfig::default();
    let block: BlockFmIndex = FmIndex::build(&text, &config).unwrap();
    let learned_config = BuildConfig {
        use_learned_occ: true,
        use_veb_layout: false,
        ..config
    };
    let learned: LearnedFmIndex = FmIndex::build(&text, &learned_config).unwrap();
    let pattern = &text[5000..5008];

    c.bench_function("count/block", |b| {
        b.iter(|| black_box(&block).count(black_box(pattern)))
    });
    c.bench_function("count/learned", |b| {
        b.iter(|| black_box(&learned).count(black_box(pattern)))
    });
    c.bench_function("locate100/block", |b| {
        b.iter(|| black_box(&block).locate(black_box(&pattern[..3]), 100).unwrap())
    });
    c.bench_function("extract1k/block", |b| {
        b.iter(|| black_box(&block).extract(black_box(4096), 1024))
    });
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
