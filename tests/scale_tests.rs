use std::time::Instant;

use rand::Rng;
use ugsort::prelude::*;

#[test]
fn test_sort_1m() {
    let count = 1_000_000;
    println!("Generating {} random 8-byte keys...", count);

    let mut rng = rand::rng();
    let mut input: Vec<[u8; 8]> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut k = [0u8; 8];
        rng.fill(&mut k[..]);
        input.push(k);
    }

    println!("Sorting {} keys...", count);
    let start = Instant::now();
    let mut sp = Splitter::new(input[0].as_slice(), 0usize, 8, SortStats::new());
    for (i, k) in input.iter().enumerate().skip(1) {
        sp.add(k, i, true);
    }
    let sorted = sp.end_of_input();
    let duration = start.elapsed();
    println!(
        "Sorted 1M keys in {:?} ({} preemptive merges, {} stores created)",
        duration,
        sp.stats().counters().pms,
        sp.stats().counters().new_stores
    );

    assert_eq!(sorted, count);
    assert!(sp.is_output_valid());

    let mut cur = sp.lowest();
    let mut checked = 1usize;
    let mut prev = cur.key().to_vec();
    while cur < sp.highest() {
        cur.advance();
        assert!(prev.as_slice() <= cur.key(), "order broken at {}", checked);
        prev = cur.key().to_vec();
        checked += 1;
    }
    assert_eq!(checked, count);
}

#[test]
#[ignore]
fn test_sort_10m_external_keys() {
    // Heavier run exercising the keystore path end to end; run with
    // `cargo test --release -- --ignored`.
    let count = 10_000_000;
    println!("Generating {} random keys...", count);

    let mut rng = rand::rng();
    let mut originals: Vec<[u8; 8]> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut k = [0u8; 8];
        rng.fill(&mut k[..]);
        originals.push(k);
    }

    println!("Sorting {} keys through the keystore...", count);
    let start = Instant::now();
    let mut scratch = [0u8; 8];
    scratch.copy_from_slice(&originals[0]);
    let mut sp = Splitter::with_keystore(&scratch, 0usize, 8, 64, NopStats);
    for (i, k) in originals.iter().enumerate().skip(1) {
        scratch.copy_from_slice(k);
        sp.add_external(&scratch, i, true);
    }
    let sorted = sp.end_of_input();
    println!("Sorted {} keys in {:?}", count, start.elapsed());

    assert_eq!(sorted, count);
    assert!(sp.is_output_valid());

    // Sampled verification to keep the pass quick.
    let mut cur = sp.lowest();
    let mut prev = cur.key().to_vec();
    for _ in 0..count - 1 {
        cur.advance();
        if cur.payload() % 1000 == 0 {
            assert_eq!(cur.key(), &originals[cur.payload()]);
        }
        assert!(prev.as_slice() <= cur.key());
        prev = cur.key().to_vec();
    }
}
