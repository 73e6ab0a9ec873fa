use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ssbf::{decode_to_vec, encode_to_vec, DataKey, EncodeOptions, MainKey, KEY_SIZE, NONCE_SIZE};

fn keys() -> (MainKey, [u8; NONCE_SIZE]) {
    (MainKey::from_bytes([7u8; KEY_SIZE]), [9u8; NONCE_SIZE])
}

fn bench_encode(c: &mut Criterion) {
    let (main_key, nonce) = keys();
    let compressible = vec![0u8; 1024 * 1024];
    let opts = EncodeOptions {
        max_block_size: 4096,
        ..Default::default()
    };

    c.bench_function("encode_1mb_zeros", |b| {
        b.iter(|| {
            encode_to_vec(
                &main_key,
                &nonce,
                DataKey::from_bytes([3u8; KEY_SIZE]),
                &opts,
                black_box(&compressible),
            )
            .unwrap()
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let (main_key, nonce) = keys();
    let compressible = vec![0u8; 1024 * 1024];
    let opts = EncodeOptions {
        max_block_size: 4096,
        ..Default::default()
    };
    let encoded = encode_to_vec(
        &main_key,
        &nonce,
        DataKey::from_bytes([3u8; KEY_SIZE]),
        &opts,
        &compressible,
    )
    .unwrap();

    c.bench_function("decode_1mb_zeros", |b| {
        b.iter(|| decode_to_vec(&main_key, black_box(&encoded)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
