use chatseal_core::{Identity, TextEncoding};
use chatseal_crypto::{derive_session_key, open_text, seal_text, KdfParams, SessionKey};
use secrecy::SecretString;

fn make_text(size: usize) -> String {
    (0..size)
        .map(|i| char::from(b'a' + (i.wrapping_mul(7) % 26) as u8))
        .collect()
}

fn bench_key() -> SessionKey {
    SessionKey::from_bytes([0xABu8; 32])
}

#[divan::bench(args = [64, 4096, 65536])]
fn bench_seal(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let text = make_text(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            seal_text(
                divan::black_box(&key),
                divan::black_box(&text),
                TextEncoding::Hex,
            )
            .unwrap()
        });
}

#[divan::bench(args = [64, 4096, 65536])]
fn bench_open(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let sealed = seal_text(&key, &make_text(size), TextEncoding::Hex).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open_text(
                divan::black_box(&key),
                divan::black_box(&sealed.ciphertext),
                divan::black_box(&sealed.iv),
                TextEncoding::Hex,
            )
            .unwrap()
        });
}

#[divan::bench(sample_count = 10)]
fn bench_derive_default_params() -> SessionKey {
    derive_session_key(
        &SecretString::from("bench-secret"),
        &Identity::new("u1", "a@x.com"),
        &KdfParams::default(),
    )
    .unwrap()
}

fn main() {
    divan::main();
}
