//! Lookup tables built once per chip instance
//!
//! Everything pitch- or time-related is specified at the standard
//! 16.9344 MHz crystal; a chip running on a different XTAL scales the rate
//! tables by `STD_CLOCK / clock` so music tempo stays correct.

use crate::constants::{
    ALFO_MAX, AR_TIME_MS, CHANNEL_ATTENUATION_DB, DC_TIME_MS, DETUNE_CENTS, DETUNE_FNS,
    LFO_FREQUENCY, LFO_LENGTH, MAXOUT, MINOUT, SIN_LEN, STD_CLOCK,
};

/// Pitch-LFO depth in cents per PMS setting (depth 0 is off)
const PLFO_CENTS: [f64; 8] = [0.0, 3.378, 5.0646, 6.7495, 10.1143, 20.1699, 40.1076, 79.307];

/// Immutable lookup tables derived from the chip clock.
///
/// Shared by all 48 slots of one chip instance. Audio-path tables are
/// 16.16 fixed point; the pitch-LFO multipliers stay floating point
/// because they feed the floating-point step derivation.
pub(crate) struct Tables {
    /// Eight waveform tables (waveform 7 is external PCM, kept silent here)
    pub waves: [[i16; SIN_LEN]; 8],
    /// Pitch LFO multiplier, `[wave][pms][phase]`
    pub plfo: [[[f64; LFO_LENGTH]; 8]; 4],
    /// Amplitude LFO attenuation, `[wave][phase]`, 0..=65536
    pub alfo: [[i32; LFO_LENGTH]; 4],
    /// Envelope volume index (0-255) to linear 16.16 gain
    pub env_volume: [i64; 256],
    /// Total-level register (0-127, 0.75 dB/step) to linear 16.16 gain
    pub total_level: [i64; 128],
    /// Channel level (0-15) to linear 16.16 gain
    pub attenuation: [i64; 16],
    /// Attack time per effective rate, in output samples
    pub attack_samples: [f64; 64],
    /// Decay/release time per effective rate, in output samples
    pub decay_samples: [f64; 64],
    /// LFO frequency in Hz per register value, clock-corrected
    pub lfo_freq: [f64; 256],
    /// F-number offset per `[detune][keycode]`
    pub detune: [[i32; 32]; 8],
}

impl Tables {
    /// Build all lookup tables for the given chip clock.
    pub fn new(clock: u32) -> Self {
        let mut tables = Tables {
            waves: [[0; SIN_LEN]; 8],
            plfo: [[[0.0; LFO_LENGTH]; 8]; 4],
            alfo: [[0; LFO_LENGTH]; 4],
            env_volume: [0; 256],
            total_level: [0; 128],
            attenuation: [0; 16],
            attack_samples: [0.0; 64],
            decay_samples: [0.0; 64],
            lfo_freq: [0.0; 256],
            detune: [[0; 32]; 8],
        };
        tables.init_waves();
        tables.init_lfo_tables();
        tables.init_volume_tables();
        tables.init_rate_tables(clock);
        tables.init_detune_table();
        tables
    }

    fn init_waves(&mut self) {
        for i in 0..SIN_LEN {
            let m = (((i * 2) + 1) as f64 * std::f64::consts::PI / SIN_LEN as f64).sin();
            let m2 = (((i * 4) + 1) as f64 * std::f64::consts::PI / SIN_LEN as f64).sin();
            let first_half = i < SIN_LEN / 2;

            // Waveform 0: sin(wt)
            self.waves[0][i] = (m * MAXOUT) as i16;
            // Waveform 1: sin^2(wt) over the first half, -sin^2(wt) over the second
            self.waves[1][i] = if first_half {
                (m * m * MAXOUT) as i16
            } else {
                (m * m * MINOUT) as i16
            };
            // Waveform 2: full-wave rectified sine
            self.waves[2][i] = if first_half {
                (m * MAXOUT) as i16
            } else {
                (-m * MAXOUT) as i16
            };
            // Waveform 3: half sine
            self.waves[3][i] = if first_half { (m * MAXOUT) as i16 } else { 0 };
            // Waveform 4: sin(2wt) over the first half
            self.waves[4][i] = if first_half { (m2 * MAXOUT) as i16 } else { 0 };
            // Waveform 5: |sin(2wt)| over the first half
            self.waves[5][i] = if first_half {
                (m2.abs() * MAXOUT) as i16
            } else {
                0
            };
            // Waveform 6: DC
            self.waves[6][i] = MAXOUT as i16;
            // Waveform 7: external PCM, silent in the wave table
            self.waves[7][i] = 0;
        }
    }

    fn init_lfo_tables(&mut self) {
        let half = LFO_LENGTH / 2;
        let quarter = LFO_LENGTH / 4;

        for i in 0..LFO_LENGTH {
            let mut plfo = [0.0f64; 4];

            // off
            plfo[0] = 0.0;

            // sawtooth
            let saw = ((i % half) as f64) / (half as f64 - 1.0);
            plfo[1] = if i < half { saw } else { saw - 1.0 };

            // square
            plfo[2] = if i < half { 1.0 } else { -1.0 };

            // triangle
            let tri = ((i % quarter) as f64) / quarter as f64;
            plfo[3] = match i / quarter {
                0 => tri,
                1 => 1.0 - tri,
                2 => -tri,
                _ => -(1.0 - tri),
            };

            for (wave, &value) in plfo.iter().enumerate() {
                for (pms, &cents) in PLFO_CENTS.iter().enumerate() {
                    self.plfo[wave][pms][i] = 2.0f64.powf(cents * value / 1200.0);
                }
            }

            // amplitude LFO: off, sawtooth, square, triangle
            self.alfo[0][i] = 0;
            self.alfo[1][i] = ALFO_MAX - ((i as i32 * ALFO_MAX) / LFO_LENGTH as i32);
            self.alfo[2][i] = if i < half { ALFO_MAX } else { 0 };
            let atri = ((i % half) as i32 * ALFO_MAX) / half as i32;
            self.alfo[3][i] = if i < half { ALFO_MAX - atri } else { atri };
        }
    }

    fn init_volume_tables(&mut self) {
        for i in 0..256 {
            let db = i as f64 / (256.0 / 96.0);
            self.env_volume[i] = (65536.0 / 10.0f64.powf(db / 20.0)) as i64;
        }
        for i in 0..16 {
            self.attenuation[i] =
                (65536.0 / 10.0f64.powf(CHANNEL_ATTENUATION_DB[i] / 20.0)) as i64;
        }
        for i in 0..128 {
            let db = 0.75 * i as f64;
            self.total_level[i] = (65536.0 / 10.0f64.powf(db / 20.0)) as i64;
        }
    }

    fn init_rate_tables(&mut self, clock: u32) {
        // timing may use a non-standard XTAL
        let clock_correction = STD_CLOCK as f64 / clock as f64;
        for i in 0..256 {
            self.lfo_freq[i] = LFO_FREQUENCY[i] * clock_correction;
        }
        for i in 0..64 {
            self.attack_samples[i] = AR_TIME_MS[i] * clock_correction * 44100.0 / 1000.0;
            self.decay_samples[i] = DC_TIME_MS[i] * clock_correction * 44100.0 / 1000.0;
        }
    }

    /// Pre-bake the datasheet cent table into f-number offsets, using a
    /// representative f-number for each n43 band. Register values 4-7
    /// mirror 0-3 with negative sign; 0 and 4 are zero.
    fn init_detune_table(&mut self) {
        for d in 0..8 {
            let dt = if d < 4 { d } else { d - 4 };
            let sign = if d < 4 { 1 } else { -1 };

            for k in 0..32 {
                let cents = DETUNE_CENTS[dt][k];
                let fns = DETUNE_FNS[k & 3];
                let ratio = 2.0f64.powf(cents / 1200.0) - 1.0;
                let offset = (fns as f64 * ratio + 0.5) as i32;
                self.detune[d][k] = offset * sign;
            }
        }
    }
}
