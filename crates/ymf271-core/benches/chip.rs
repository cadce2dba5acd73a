//! Benchmarks for the YMF271 update hot path
//!
//! Run with: cargo bench --bench chip -p ymf271

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use ymf271::{Ymf271, STD_CLOCK};

fn fm_write(chip: &mut Ymf271, bank: u8, address: u8, data: u8) {
    chip.write(bank * 2, address);
    chip.write(bank * 2 + 1, data);
}

fn timer_write(chip: &mut Ymf271, address: u8, data: u8) {
    chip.write(0x0c, address);
    chip.write(0x0d, data);
}

/// One 4-op FM voice on group 0.
fn setup_fm_chip() -> Ymf271 {
    let mut chip = Ymf271::new(STD_CLOCK).unwrap();
    for (reg, data) in [
        (0xbu8, 0x00u8),
        (0xc, 0x00),
        (0xa, 0x44),
        (0x9, 0x00),
        (0x3, 0x01),
        (0x4, 0x00),
        (0x5, 0x1f),
        (0xd, 0x00),
        (0xe, 0x00),
        (0x0, 0x01),
    ] {
        fm_write(&mut chip, 0, reg << 4, data);
    }
    chip
}

/// All twelve PCM-addressable slot leaders streaming a ramp: groups 0, 4
/// and 8 in 4x PCM mode, one voice per bank.
fn setup_pcm_chip() -> Ymf271 {
    let mut chip = Ymf271::new(STD_CLOCK).unwrap();
    chip.alloc_rom(0x10000);
    let ramp: Vec<u8> = (0..0x10000u32).map(|v| v as u8).collect();
    chip.write_rom(0, &ramp);

    const GROUP_NIBBLE: [u8; 12] = [0, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14];

    timer_write(&mut chip, GROUP_NIBBLE[0], 0x03);
    timer_write(&mut chip, GROUP_NIBBLE[4], 0x03);
    timer_write(&mut chip, GROUP_NIBBLE[8], 0x03);

    for pcm_nibble in [0u8, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14] {
        let slot = pcm_nibble * 4;
        let group = slot % 12;
        let bank = slot / 12;

        for (reg, data) in [(0x0u8, 0x00u8), (0x3, 0xff), (0x6, 0x00), (0x9, 0x00)] {
            chip.write(0x08, (reg << 4) | pcm_nibble);
            chip.write(0x09, data);
        }
        for (reg, data) in [
            (0xbu8, 0x07u8),
            (0xa, 0x00),
            (0x9, group),
            (0x3, 0x01),
            (0x4, 0x00),
            (0x5, 0x1f),
            (0xd, 0x00),
            (0xe, 0x00),
            (0x0, 0x01),
        ] {
            fm_write(&mut chip, bank, (reg << 4) | GROUP_NIBBLE[group as usize], data);
        }
    }
    chip
}

fn bench_update_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_fm");
    let mut chip = setup_fm_chip();

    for block in [128usize, 882, 4410].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(block), block, |b, &block| {
            let mut left = vec![0i32; block];
            let mut right = vec![0i32; block];
            b.iter(|| {
                chip.update(black_box(&mut left), black_box(&mut right));
            });
        });
    }

    group.finish();
}

fn bench_update_full_pcm(c: &mut Criterion) {
    let mut chip = setup_pcm_chip();
    let mut left = vec![0i32; 882];
    let mut right = vec![0i32; 882];

    c.bench_function("update_12_pcm_voices_882", |b| {
        b.iter(|| {
            chip.update(black_box(&mut left), black_box(&mut right));
        });
    });
}

fn bench_register_writes(c: &mut Criterion) {
    let mut chip = Ymf271::new(STD_CLOCK).unwrap();

    c.bench_function("write_register_pair", |b| {
        b.iter(|| {
            chip.write(black_box(0x00), black_box(0x90));
            chip.write(black_box(0x01), black_box(0x42));
        });
    });
}

fn bench_key_on_cascade(c: &mut Criterion) {
    let mut chip = setup_fm_chip();

    c.bench_function("key_on_4op_group", |b| {
        b.iter(|| {
            fm_write(&mut chip, 0, 0x00, black_box(0x01));
            fm_write(&mut chip, 0, 0x00, black_box(0x00));
        });
    });
}

criterion_group!(
    benches,
    bench_update_block_sizes,
    bench_update_full_pcm,
    bench_register_writes,
    bench_key_on_cascade
);
criterion_main!(benches);
