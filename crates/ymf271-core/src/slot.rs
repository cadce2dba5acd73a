//! Per-slot state: registers, envelope generator, LFO and pitch step
//!
//! Each of the 48 slots owns an ADSR-style four-state envelope in 24.16
//! fixed point, an LFO phase accumulator, and a 64-bit step pointer that
//! doubles as the FM phase accumulator (16.16 into the sine tables) or the
//! PCM read cursor (integer sample index above the fractional 16 bits).

use crate::constants::{
    ENV_VOLUME_SHIFT, FS_FREQUENCY, LFO_LENGTH, LFO_SHIFT, MULTIPLE_TABLE, POW_TABLE, RKS_TABLE,
    SIN_LEN,
};
use crate::tables::Tables;

/// Envelope generator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvelopeState {
    /// Volume rises toward maximum
    Attack,
    /// Volume falls toward the decay-1 level threshold
    Decay1,
    /// Volume falls toward zero (sustain decay)
    Decay2,
    /// Volume falls toward zero after key-off
    Release,
}

/// One of the 48 tone generators
#[derive(Clone)]
pub(crate) struct Slot {
    // register-backed fields
    pub ext_en: bool,
    pub ext_out: u8,
    pub lfo_freq: u8,
    pub lfo_wave: u8,
    pub pms: u8,
    pub ams: u8,
    pub detune: u8,
    pub multiple: u8,
    pub tl: u8,
    pub keyscale: u8,
    pub ar: u8,
    pub decay1_rate: u8,
    pub decay2_rate: u8,
    pub decay1_level: u8,
    pub release_rate: u8,
    pub block: u8,
    pub fns_hi: u8,
    pub fns: u32,
    pub feedback: u8,
    pub waveform: u8,
    pub accon: bool,
    pub algorithm: u8,
    pub ch_level: [u8; 4],

    pub startaddr: u32,
    pub loopaddr: u32,
    pub endaddr: u32,
    pub altloop: bool,
    pub fs: u8,
    pub srcnote: u8,
    pub srcb: u8,
    pub bits: u8,

    // dynamic state
    pub step: u32,
    pub stepptr: u64,
    pub active: bool,
    pub volume: i32,
    pub env_state: EnvelopeState,
    pub(crate) env_attack_step: i32,
    pub(crate) env_decay1_step: i32,
    pub(crate) env_decay2_step: i32,
    pub(crate) env_release_step: i32,
    pub feedback_modulation0: i64,
    pub feedback_modulation1: i64,
    pub(crate) lfo_phase: i32,
    pub(crate) lfo_step: i32,
    pub lfo_amplitude: i32,
    pub lfo_phasemod: f64,
    pub loop_direction: i8,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            ext_en: false,
            ext_out: 0,
            lfo_freq: 0,
            lfo_wave: 0,
            pms: 0,
            ams: 0,
            detune: 0,
            multiple: 0,
            tl: 0,
            keyscale: 0,
            ar: 0,
            decay1_rate: 0,
            decay2_rate: 0,
            decay1_level: 0,
            release_rate: 0,
            block: 0,
            fns_hi: 0,
            fns: 0,
            feedback: 0,
            waveform: 0,
            accon: false,
            algorithm: 0,
            ch_level: [0; 4],
            startaddr: 0,
            loopaddr: 0,
            endaddr: 0,
            altloop: false,
            fs: 0,
            srcnote: 0,
            srcb: 0,
            bits: 0,
            step: 0,
            stepptr: 0,
            active: false,
            volume: 0,
            env_state: EnvelopeState::Attack,
            env_attack_step: 0,
            env_decay1_step: 0,
            env_decay2_step: 0,
            env_release_step: 0,
            feedback_modulation0: 0,
            feedback_modulation1: 0,
            lfo_phase: 0,
            lfo_step: 0,
            lfo_amplitude: 0,
            lfo_phasemod: 1.0,
            loop_direction: 1,
        }
    }
}

/// Keycode for internal waveforms: `(block & 7) * 4 + n43`, where n43
/// partitions the f-number into four bands.
pub(crate) fn internal_keycode(block: u8, fns: u32) -> usize {
    let n43 = if fns < 0x780 {
        0
    } else if fns < 0x900 {
        1
    } else if fns < 0xa80 {
        2
    } else {
        3
    };
    ((block as usize & 7) * 4) + n43
}

/// Keycode for external (PCM) waveforms.
///
/// `KC = (4*SrcB + SrcNOTE) + (4*Block + n43)`, with the external
/// f-number band boundaries, clamped into the RKS table range.
pub(crate) fn external_keycode(block: u8, fns: u32, srcb: u8, srcnote: u8) -> usize {
    let n43 = if fns < 0x100 {
        0
    } else if fns < 0x300 {
        1
    } else if fns < 0x500 {
        2
    } else {
        3
    };
    let src_keycode = (srcb as usize * 4) + srcnote as usize;
    let block_keycode = ((block as usize & 7) * 4) + n43;
    (src_keycode + block_keycode).min(31)
}

/// Apply rate key scaling: higher keycodes with higher KS settings get
/// faster envelopes. Result clamped to the rate table range.
pub(crate) fn keyscaled_rate(rate: i32, keycode: usize, keyscale: u8) -> usize {
    (rate + RKS_TABLE[keycode][keyscale as usize]).clamp(0, 63) as usize
}

impl Slot {
    /// Re-initialise the dynamic state at key-on. The caller flips
    /// `active` separately: sibling slots of a synchronized group get the
    /// same initialisation without being marked active themselves.
    pub fn trigger(&mut self, tables: &Tables) {
        self.step = 0;
        self.stepptr = 0;
        self.loop_direction = 1;
        self.init_envelope(tables);
        // LFO state feeds the step derivation, so it comes first
        self.init_lfo(tables);
        self.calculate_step(tables);
        self.feedback_modulation0 = 0;
        self.feedback_modulation1 = 0;
    }

    /// Key-off: an active envelope moves to its release phase.
    pub fn key_off(&mut self) {
        if self.active {
            self.env_state = EnvelopeState::Release;
        }
    }

    /// Precompute the per-state envelope steps from the rate tables.
    ///
    /// Register rates map to the 0-63 effective range with the documented
    /// multipliers (AR/D1R/D2R x2, RR x4) plus the RKS offset. Effective
    /// rates below 4 make no progress at all.
    pub fn init_envelope(&mut self, tables: &Tables) {
        let decay_level = 255 - ((self.decay1_level as i32) << 4);

        let keycode = if self.waveform != 7 {
            internal_keycode(self.block, self.fns)
        } else {
            external_keycode(self.block, self.fns & 0x7ff, self.srcb, self.srcnote)
        };

        let rate = keyscaled_rate(self.ar as i32 * 2, keycode, self.keyscale);
        self.env_attack_step = if rate < 4 {
            0
        } else {
            ((255.0 / tables.attack_samples[rate]) * 65536.0) as i32
        };

        let rate = keyscaled_rate(self.decay1_rate as i32 * 2, keycode, self.keyscale);
        self.env_decay1_step = if rate < 4 {
            0
        } else {
            (((255 - decay_level) as f64 / tables.decay_samples[rate]) * 65536.0) as i32
        };

        let rate = keyscaled_rate(self.decay2_rate as i32 * 2, keycode, self.keyscale);
        self.env_decay2_step = if rate < 4 {
            0
        } else {
            ((255.0 / tables.decay_samples[rate]) * 65536.0) as i32
        };

        let rate = keyscaled_rate(self.release_rate as i32 * 4, keycode, self.keyscale);
        self.env_release_step = if rate < 4 {
            0
        } else {
            ((255.0 / tables.decay_samples[rate]) * 65536.0) as i32
        };

        // initial attack level is -60 dB, not silence, to avoid clicks
        self.volume = (255 - 160) << ENV_VOLUME_SHIFT;
        self.env_state = EnvelopeState::Attack;
    }

    /// An envelope that has fallen to zero deactivates the slot.
    fn check_envelope_end(&mut self) -> bool {
        if self.volume <= 0 {
            self.active = false;
            self.volume = 0;
            return true;
        }
        false
    }

    /// Advance the envelope one output sample.
    pub fn update_envelope(&mut self) {
        match self.env_state {
            EnvelopeState::Attack => {
                self.volume += self.env_attack_step;
                if self.volume >= (255 << ENV_VOLUME_SHIFT) {
                    self.volume = 255 << ENV_VOLUME_SHIFT;
                    self.env_state = EnvelopeState::Decay1;
                }
            }
            EnvelopeState::Decay1 => {
                // decay1_level = 0 means an immediate hand-off to decay2
                let decay_level = 255 - ((self.decay1_level as i32) << 4);
                self.volume -= self.env_decay1_step;
                if !self.check_envelope_end() && (self.volume >> ENV_VOLUME_SHIFT) <= decay_level {
                    self.env_state = EnvelopeState::Decay2;
                }
            }
            EnvelopeState::Decay2 => {
                self.volume -= self.env_decay2_step;
                self.check_envelope_end();
            }
            EnvelopeState::Release => {
                self.volume -= self.env_release_step;
                self.check_envelope_end();
            }
        }
    }

    /// Reset the LFO at key-on.
    ///
    /// The phase-modulation multiplier is primed from table index 0 rather
    /// than left at a stale value so the first step derivation at key-on
    /// already sees a valid multiplier.
    pub fn init_lfo(&mut self, tables: &Tables) {
        self.lfo_phase = 0;
        self.lfo_amplitude = tables.alfo[self.lfo_wave as usize][0];
        self.lfo_phasemod = tables.plfo[self.lfo_wave as usize][self.pms as usize][0];

        self.lfo_step =
            (((LFO_LENGTH as f64 * tables.lfo_freq[self.lfo_freq as usize]) / 44100.0) * 256.0)
                as i32;
    }

    /// Advance the LFO one sample and re-derive the pitch step.
    pub fn update_lfo(&mut self, tables: &Tables) {
        self.lfo_phase = self.lfo_phase.wrapping_add(self.lfo_step);

        let index = ((self.lfo_phase >> LFO_SHIFT) & (LFO_LENGTH as i32 - 1)) as usize;
        self.lfo_amplitude = tables.alfo[self.lfo_wave as usize][index];
        self.lfo_phasemod = tables.plfo[self.lfo_wave as usize][self.pms as usize][index];

        self.calculate_step(tables);
    }

    /// Derive the 16.16 step per output sample from pitch registers, LFO
    /// phase modulation and (for internal waves) the detune table.
    pub fn calculate_step(&mut self, tables: &Tables) {
        if self.waveform == 7 {
            // external waveform (PCM)
            let mut st = (2 * (self.fns | 2048)) as f64
                * POW_TABLE[self.block as usize]
                * FS_FREQUENCY[self.fs as usize];
            st *= MULTIPLE_TABLE[self.multiple as usize];
            st *= self.lfo_phasemod;
            // 524288 / 65536 = 8, keeping the 65536 pre-multiply
            st /= 524288.0 / 65536.0;
            self.step = st as u32;
        } else {
            // internal waveform (FM)
            let keycode = internal_keycode(self.block, self.fns);
            let detune_offset = tables.detune[self.detune as usize][keycode];
            let fns_detuned = (self.fns as i32 + detune_offset).max(0);

            let mut st = (2 * fns_detuned) as f64 * POW_TABLE[self.block as usize];
            st *= MULTIPLE_TABLE[self.multiple as usize] * SIN_LEN as f64;
            st *= self.lfo_phasemod;
            // 536870912 / 65536 = 8192, keeping the 65536 pre-multiply
            st /= 536870912.0 / 65536.0;
            self.step = st as u32;
        }
    }

    /// Combined envelope, amplitude-LFO and total-level gain, 16.16.
    pub fn envelope_volume(&self, tables: &Tables) -> i64 {
        let lfo_volume: i64 = match self.ams {
            0 => 65536,                                                  // 0 dB
            1 => 65536 - ((self.lfo_amplitude as i64 * 33124) >> 16),    // 5.90625 dB
            2 => 65536 - ((self.lfo_amplitude as i64 * 16742) >> 16),    // 11.8125 dB
            _ => 65536 - ((self.lfo_amplitude as i64 * 4277) >> 16),     // 23.625 dB
        };

        let env_index = (255 - (self.volume >> ENV_VOLUME_SHIFT)) as usize;
        let env_volume = (tables.env_volume[env_index] * lfo_volume) >> 16;

        (env_volume * tables.total_level[self.tl as usize]) >> 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::STD_CLOCK;

    fn tables() -> Tables {
        Tables::new(STD_CLOCK)
    }

    fn keyed_on_slot(tables: &Tables) -> Slot {
        let mut slot = Slot {
            ar: 31,
            decay1_rate: 10,
            decay2_rate: 10,
            release_rate: 8,
            decay1_level: 4,
            fns: 0x400,
            block: 4,
            multiple: 1,
            ..Slot::default()
        };
        slot.trigger(tables);
        slot.active = true;
        slot
    }

    #[test]
    fn keycode_bands() {
        assert_eq!(internal_keycode(0, 0x000), 0);
        assert_eq!(internal_keycode(0, 0x77f), 0);
        assert_eq!(internal_keycode(0, 0x780), 1);
        assert_eq!(internal_keycode(0, 0x8ff), 1);
        assert_eq!(internal_keycode(0, 0x900), 2);
        assert_eq!(internal_keycode(0, 0xa80), 3);
        assert_eq!(internal_keycode(7, 0xfff), 31);
        // block wraps at 3 bits
        assert_eq!(internal_keycode(9, 0x000), 4);
    }

    #[test]
    fn external_keycode_bands_and_clamp() {
        assert_eq!(external_keycode(0, 0x0ff, 0, 0), 0);
        assert_eq!(external_keycode(0, 0x100, 0, 0), 1);
        assert_eq!(external_keycode(0, 0x300, 0, 0), 2);
        assert_eq!(external_keycode(0, 0x500, 0, 0), 3);
        // source contribution adds on top
        assert_eq!(external_keycode(0, 0x000, 1, 2), 6);
        // clamped into the RKS table
        assert_eq!(external_keycode(7, 0x7ff, 7, 3), 31);
    }

    #[test]
    fn keyscaled_rate_clamps() {
        assert_eq!(keyscaled_rate(62, 31, 3), 63);
        assert_eq!(keyscaled_rate(0, 0, 0), 0);
        assert_eq!(keyscaled_rate(10, 31, 0), 10);
        assert_eq!(keyscaled_rate(10, 31, 3), 25);
    }

    #[test]
    fn envelope_attack_is_monotonic_and_saturates() {
        let tables = tables();
        let mut slot = keyed_on_slot(&tables);

        assert_eq!(slot.env_state, EnvelopeState::Attack);
        assert_eq!(slot.volume, (255 - 160) << ENV_VOLUME_SHIFT);

        let mut prev = slot.volume;
        let mut saturated_at = None;
        for i in 0..10_000 {
            slot.update_envelope();
            if slot.env_state != EnvelopeState::Attack {
                saturated_at = Some(i);
                break;
            }
            assert!(slot.volume > prev, "attack not rising at tick {}", i);
            prev = slot.volume;
        }

        let at = saturated_at.expect("attack never saturated");
        // effective rate 62: the full 0-255 sweep takes the table time,
        // and the keyed-on sweep starts at 95 so it must finish inside it
        let limit = tables.attack_samples[62].ceil() as usize + 1;
        assert!(at <= limit, "saturated after {} ticks, limit {}", at, limit);
        assert_eq!(slot.volume, 255 << ENV_VOLUME_SHIFT);
        assert_eq!(slot.env_state, EnvelopeState::Decay1);
    }

    #[test]
    fn envelope_decay_passes_through_d1l_threshold() {
        let tables = tables();
        let mut slot = keyed_on_slot(&tables);

        // run into decay1
        while slot.env_state == EnvelopeState::Attack {
            slot.update_envelope();
        }

        let decay_level = 255 - ((slot.decay1_level as i32) << 4);
        let mut prev = slot.volume;
        while slot.env_state == EnvelopeState::Decay1 {
            slot.update_envelope();
            assert!(slot.volume < prev);
            prev = slot.volume;
        }
        assert_eq!(slot.env_state, EnvelopeState::Decay2);
        assert!((slot.volume >> ENV_VOLUME_SHIFT) <= decay_level);
    }

    #[test]
    fn release_reaches_zero_and_deactivates() {
        let tables = tables();
        let mut slot = keyed_on_slot(&tables);
        for _ in 0..100 {
            slot.update_envelope();
        }
        slot.key_off();
        assert_eq!(slot.env_state, EnvelopeState::Release);

        let mut guard = 0u32;
        while slot.active {
            slot.update_envelope();
            guard += 1;
            assert!(guard < 3_000_000, "release never ended");
        }
        assert_eq!(slot.volume, 0);
    }

    #[test]
    fn zero_attack_rate_makes_no_progress() {
        let tables = tables();
        let mut slot = Slot {
            ar: 0,
            ..Slot::default()
        };
        slot.trigger(&tables);
        slot.active = true;

        let start = slot.volume;
        for _ in 0..1000 {
            slot.update_envelope();
        }
        assert_eq!(slot.volume, start);
        assert_eq!(slot.env_state, EnvelopeState::Attack);
    }

    #[test]
    fn step_scales_with_block_and_multiple() {
        let tables = tables();
        let mut slot = Slot {
            fns: 0x400,
            block: 4,
            multiple: 1,
            ..Slot::default()
        };
        slot.trigger(&tables);
        let base = slot.step;
        assert!(base > 0);

        slot.block = 5;
        slot.calculate_step(&tables);
        assert_eq!(slot.step, base * 2);

        slot.block = 4;
        slot.multiple = 2;
        slot.calculate_step(&tables);
        assert_eq!(slot.step, base * 2);
    }

    #[test]
    fn external_step_uses_fs_divider() {
        let tables = tables();
        let mut slot = Slot {
            waveform: 7,
            fns: 0,
            block: 0, // x128 scale: exactly one source sample per output sample
            multiple: 1,
            fs: 0,
            ..Slot::default()
        };
        slot.trigger(&tables);
        // 2 * 2048 * 128 / 8 = 65536
        assert_eq!(slot.step, 1 << 16);

        slot.fs = 1;
        slot.calculate_step(&tables);
        assert_eq!(slot.step, 1 << 15);
    }

    #[test]
    fn lfo_phasemod_is_primed_at_key_on() {
        let tables = tables();
        let mut slot = Slot {
            lfo_wave: 3,
            pms: 7,
            lfo_freq: 200,
            fns: 0x400,
            block: 4,
            multiple: 1,
            ..Slot::default()
        };
        slot.trigger(&tables);
        // table index 0 of the triangle wave is exactly unity
        assert_eq!(slot.lfo_phasemod, tables.plfo[3][7][0]);
        assert!(slot.step > 0);
    }

    #[test]
    fn pitch_lfo_moves_the_step() {
        let tables = tables();
        let mut slot = Slot {
            lfo_wave: 3,
            pms: 7,
            lfo_freq: 255, // fastest LFO
            fns: 0x400,
            block: 4,
            multiple: 1,
            ..Slot::default()
        };
        slot.trigger(&tables);
        let base = slot.step;

        let mut seen_above = false;
        let mut seen_below = false;
        for _ in 0..2000 {
            slot.update_lfo(&tables);
            if slot.step > base {
                seen_above = true;
            }
            if slot.step < base {
                seen_below = true;
            }
        }
        assert!(seen_above && seen_below, "pitch LFO never deviated");
    }

    #[test]
    fn amplitude_lfo_attenuates_volume() {
        let tables = tables();
        let mut slot = keyed_on_slot(&tables);
        slot.volume = 255 << ENV_VOLUME_SHIFT;

        slot.ams = 0;
        slot.lfo_amplitude = crate::constants::ALFO_MAX;
        let unmodulated = slot.envelope_volume(&tables);

        slot.ams = 3;
        let modulated = slot.envelope_volume(&tables);
        assert!(modulated < unmodulated);

        slot.lfo_amplitude = 0;
        assert_eq!(slot.envelope_volume(&tables), unmodulated);
    }
}
