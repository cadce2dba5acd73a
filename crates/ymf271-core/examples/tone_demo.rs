//! YMF271 tone demo
//!
//! Programs a four-operator FM voice and a looping PCM voice, renders a
//! second of audio and prints basic signal statistics. No audio output
//! device needed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example tone_demo -p ymf271
//! ```

use ymf271::{Ymf271, STD_CLOCK};

fn fm_write(chip: &mut Ymf271, bank: u8, address: u8, data: u8) {
    chip.write(bank * 2, address);
    chip.write(bank * 2 + 1, data);
}

fn timer_write(chip: &mut Ymf271, address: u8, data: u8) {
    chip.write(0x0c, address);
    chip.write(0x0d, data);
}

fn stats(name: &str, samples: &[i32]) {
    let peak = samples.iter().map(|s| s.abs()).max().unwrap_or(0);
    let rms = (samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
        / samples.len() as f64)
        .sqrt();
    println!("  {}: peak {:6}, rms {:8.1}", name, peak, rms);
}

fn main() {
    let mut chip = Ymf271::new(STD_CLOCK).expect("standard clock");
    println!("YMF271 tone demo at {} Hz output", chip.sample_rate());

    // A dull PCM ramp as "sampled" material for group 1
    chip.alloc_rom(0x100);
    let ramp: Vec<u8> = (0..0x100u32).map(|v| (v as u8).wrapping_mul(3)).collect();
    chip.write_rom(0, &ramp);

    // Group 0: 4-op FM bell-ish voice (algorithm 4, slot 4 carrier)
    println!("\nProgramming 4-op FM voice on group 0");
    for (reg, data) in [
        (0xbu8, 0x10u8), // sine, feedback 1
        (0xc, 0x04),     // algorithm 4
        (0xa, 0x44),     // block 4
        (0x9, 0x00),     // fns 0x400
        (0x3, 0x02),     // multiple x2
        (0x4, 0x08),     // a few dB off the top
        (0x5, 0x1f),     // fast attack
        (0x6, 0x08),     // gentle decay
        (0x8, 0x46),     // release 6, d1l 4
        (0xd, 0x00),     // front channels full
        (0xe, 0xff),     // rear channels off
        (0x0, 0x01),     // key on
    ] {
        fm_write(&mut chip, 0, reg << 4, data);
    }

    // Group 4: one PCM voice looping the ramp. The PCM address map only
    // reaches the slot-leader positions, which live in groups 0, 4 and 8;
    // PCM sub-address nibble 1 is slot 4, bank 0 of group 4.
    println!("Programming PCM voice on group 4");
    timer_write(&mut chip, 0x05, 0x03); // group 4 to sync 3: 4x PCM
    for (reg, data) in [
        (0x0u8, 0x00u8), // start 0
        (0x3, 0xff),     // end 255
        (0x6, 0x00),     // loop 0
        (0x9, 0x00),     // 8-bit, fs 0
    ] {
        chip.write(0x08, (reg << 4) | 0x01);
        chip.write(0x09, data);
    }
    for (reg, data) in [
        (0xbu8, 0x07u8), // waveform 7: external PCM
        (0xa, 0x00),
        (0x9, 0x00), // 1:1 stepping
        (0x3, 0x01),
        (0x4, 0x00),
        (0x5, 0x1f),
        (0xd, 0x44), // a little quieter than the FM voice
        (0xe, 0xff),
        (0x0, 0x01), // key on
    ] {
        fm_write(&mut chip, 0, (reg << 4) | 0x05, data);
    }

    // Render one second in player-sized blocks
    let rate = chip.sample_rate() as usize;
    let mut left = vec![0i32; rate];
    let mut right = vec![0i32; rate];
    for (l, r) in left.chunks_mut(882).zip(right.chunks_mut(882)) {
        chip.update(l, r);
    }

    println!("\nRendered {} frames:", rate);
    stats("left ", &left);
    stats("right", &right);

    // Key both voices off and let the release tails fade
    fm_write(&mut chip, 0, 0x00, 0x00);
    fm_write(&mut chip, 0, 0x05, 0x00);
    for (l, r) in left.chunks_mut(882).zip(right.chunks_mut(882)) {
        chip.update(l, r);
    }
    println!("\nAfter key-off and one second of release:");
    stats("left ", &left);
    stats("right", &right);

    println!("\n{:?}", chip);
}
