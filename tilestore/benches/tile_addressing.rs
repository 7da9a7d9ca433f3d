use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tilestore::{
    decode_block_key, encode_block_key, locate, tile_boundaries, BigMatrix, BlockKey,
    DenseMatrix, MatrixConfig, MemoryStore, TiledMatrix,
};

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    group.bench_function("tile_boundaries-1m-by-4096", |b| {
        b.iter(|| tile_boundaries(black_box(1_000_000), black_box(4096)))
    });
    group.bench_function("locate-last-element", |b| {
        b.iter(|| locate((1_000_000, 50_000), (4096, 4096), black_box(999_999), black_box(49_999)))
    });

    group.finish();
}

fn bench_key_codec(c: &mut Criterion) {
    let key = BlockKey::for_block((1_000_000, 50_000), (4096, 4096), 200, 11, 2)
        .expect("block index inside the grid");
    let encoded = encode_block_key("tilestore.objects/", "gram", &key);

    let mut group = c.benchmark_group("key_codec");
    group.bench_function("encode", |b| {
        b.iter(|| encode_block_key("tilestore.objects/", "gram", black_box(&key)))
    });
    group.bench_function("decode", |b| b.iter(|| decode_block_key(black_box(&encoded))));
    group.finish();
}

fn bench_block_io(c: &mut Criterion) {
    let config = MatrixConfig::new("bench")
        .with_shape(512, 512)
        .with_tile_shape(128, 128);
    let matrix = BigMatrix::open(MemoryStore::new(), config).unwrap();
    let full = DenseMatrix::from_fn(512, 512, |i, j| (i ^ j) as f64);
    matrix.shard_matrix(&full, None).unwrap();

    let mut group = c.benchmark_group("block_io");
    group.throughput(Throughput::Bytes((128 * 128 * 8) as u64));
    group.bench_function("get_block-128x128-f64", |b| {
        b.iter(|| matrix.get_block::<f64>(black_box(2), black_box(3)))
    });
    group.bench_function("existing_block_idxs-16", |b| {
        b.iter(|| matrix.existing_block_idxs())
    });
    group.finish();
}

criterion_group!(benches, bench_partition, bench_key_codec, bench_block_io);
criterion_main!(benches);
