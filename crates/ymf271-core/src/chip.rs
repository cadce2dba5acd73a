//! YMF271 chip object and update engine
//!
//! The chip owns 48 slots, 12 groups, the register file, both timers and
//! the external-memory cursor. Rendering walks the groups, dispatches on
//! each group's sync mode, mixes into an interleaved 4-channel buffer and
//! folds the 18-bit ACC buffer in before the stereo down-mix.
//!
//! Timers never fire by themselves: the host reads the computed periods,
//! schedules them with its own notion of time, and calls the tick entry
//! points when a period elapses.

use crate::algorithms;
use crate::constants::STD_CLOCK;
use crate::pcm::{self, Rom};
use crate::slot::Slot;
use crate::tables::Tables;
use crate::{Result, Ymf271Error};

/// How the four slots of a group cooperate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// One four-operator FM voice
    #[default]
    FourOpFm,
    /// Two independent two-operator FM pairs
    TwoByTwoFm,
    /// Three-operator FM plus one PCM voice
    ThreeOpFmPcm,
    /// Four independent PCM voices
    Pcm,
}

impl SyncMode {
    /// Decode the two sync bits of the group register.
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => SyncMode::FourOpFm,
            1 => SyncMode::TwoByTwoFm,
            2 => SyncMode::ThreeOpFmPcm,
            _ => SyncMode::Pcm,
        }
    }
}

/// Per-group configuration
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Group {
    pub sync: SyncMode,
    /// PCM-carrier FM; only honoured on groups 0, 4 and 8
    pub pfm: bool,
    pub muted: bool,
}

/// Yamaha YMF271-F tone generator
///
/// The chip renders at `clock / 384` Hz. Register writes use the paired
/// port scheme of the real device: even ports latch a sub-address, odd
/// ports deliver the data byte.
///
/// # Example
///
/// ```
/// use ymf271::Ymf271;
///
/// let mut chip = Ymf271::new(ymf271::STD_CLOCK).unwrap();
/// // group 0 to 4-op FM mode
/// chip.write(0x0c, 0x00);
/// chip.write(0x0d, 0x00);
///
/// let mut left = [0i32; 256];
/// let mut right = [0i32; 256];
/// chip.update(&mut left, &mut right);
/// ```
pub struct Ymf271 {
    pub(crate) tables: Tables,
    pub(crate) slots: [Slot; 48],
    pub(crate) groups: [Group; 12],

    pub(crate) regs_main: [u8; 16],

    pub(crate) timer_a: u32,
    pub(crate) timer_b: u32,
    pub(crate) irqstate: u8,
    pub(crate) status: u8,
    pub(crate) end_status: u16,
    pub(crate) enable: u8,

    pub(crate) ext_address: u32,
    pub(crate) ext_rw: bool,
    pub(crate) ext_readlatch: u8,
    pub(crate) busy_flag: bool,

    pub(crate) rom: Rom,

    clock: u32,
    sample_rate: u32,
    mixbuf_len: usize,
    mix_buffer: Vec<i32>,
    acc_buffer: Vec<i32>,

    pub(crate) irq_handler: Option<Box<dyn FnMut(bool) + Send>>,
}

impl Ymf271 {
    /// Create a chip for the given master clock in Hz.
    ///
    /// The output sample rate is `clock / 384` (44100 Hz at the standard
    /// 16.9344 MHz crystal); all rate tables are corrected for
    /// non-standard clocks.
    pub fn new(clock: u32) -> Result<Self> {
        if clock < 384 {
            return Err(Ymf271Error::ConfigError(format!(
                "clock {} Hz is below the 1/384 sample divider",
                clock
            )));
        }
        let sample_rate = clock / 384;
        let mixbuf_len = (sample_rate / 10).max(1) as usize;

        Ok(Ymf271 {
            tables: Tables::new(clock),
            slots: std::array::from_fn(|_| Slot::default()),
            groups: [Group::default(); 12],
            regs_main: [0; 16],
            timer_a: 0,
            timer_b: 0,
            irqstate: 0,
            status: 0,
            end_status: 0,
            enable: 0,
            ext_address: 0,
            ext_rw: false,
            ext_readlatch: 0,
            busy_flag: false,
            rom: Rom::default(),
            clock,
            sample_rate,
            mixbuf_len,
            mix_buffer: vec![0; mixbuf_len * 4],
            acc_buffer: vec![0; mixbuf_len * 4],
            irq_handler: None,
        })
    }

    /// Output sample rate in Hz (`clock / 384`).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Master clock in Hz.
    pub fn clock(&self) -> u32 {
        self.clock
    }

    /// Current sync mode of a group.
    pub fn sync_mode(&self, group: usize) -> SyncMode {
        self.groups[group % 12].sync
    }

    /// Reset the chip: all slots silent, status, IRQ and end flags
    /// cleared, a registered IRQ handler deasserted. Register latches and
    /// timer values are left alone, as on the real device.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.active = false;
            slot.volume = 0;
        }

        self.irqstate = 0;
        self.status = 0;
        self.end_status = 0;
        self.enable = 0;
        self.busy_flag = false;

        self.call_irq_handler(false);
    }

    /// Register a level-sensitive IRQ callback. It is called with `true`
    /// whenever a timer raises an enabled IRQ and with `false` once both
    /// sources are clear.
    pub fn set_irq_handler(&mut self, handler: Option<Box<dyn FnMut(bool) + Send>>) {
        self.irq_handler = handler;
    }

    pub(crate) fn call_irq_handler(&mut self, asserted: bool) {
        if let Some(handler) = self.irq_handler.as_mut() {
            handler(asserted);
        }
    }

    /// Mute groups by mask: bit n mutes group n.
    pub fn set_mute_mask(&mut self, mask: u16) {
        for (n, group) in self.groups.iter_mut().enumerate() {
            group.muted = (mask >> n) & 1 != 0;
        }
    }

    /// (Re)allocate the external PCM memory. Fresh memory reads as 0xFF;
    /// anything beyond `size` reads as 0.
    pub fn alloc_rom(&mut self, size: usize) {
        self.rom.alloc(size);
    }

    /// Copy sample data into the external PCM memory, clamped to the
    /// allocated size.
    pub fn write_rom(&mut self, offset: usize, data: &[u8]) {
        self.rom.write(offset, data);
    }

    /// Timer A period in chip clock cycles: `384 * (1024 - value)`.
    pub fn timer_a_period(&self) -> u32 {
        384 * (1024 - self.timer_a)
    }

    /// Timer B period in chip clock cycles: `384 * 16 * (256 - value)`.
    /// The x16 is a gated period extension, not a running prescaler.
    pub fn timer_b_period(&self) -> u32 {
        384 * 16 * (256 - self.timer_b)
    }

    /// Timer A enable bit of the control register.
    pub fn timer_a_enabled(&self) -> bool {
        self.enable & 1 != 0
    }

    /// Timer B enable bit of the control register.
    pub fn timer_b_enabled(&self) -> bool {
        self.enable & 2 != 0
    }

    /// Host-driven Timer A expiry: sets the status flag and raises the
    /// IRQ when enabled.
    pub fn timer_a_tick(&mut self) {
        self.status |= 1;

        if self.enable & 4 != 0 {
            self.irqstate |= 1;
            self.call_irq_handler(true);
        }
    }

    /// Host-driven Timer B expiry: sets the status flag and raises the
    /// IRQ when enabled.
    pub fn timer_b_tick(&mut self) {
        self.status |= 2;

        if self.enable & 8 != 0 {
            self.irqstate |= 2;
            self.call_irq_handler(true);
        }
    }

    /// Write one byte to a register port.
    ///
    /// Even ports latch the sub-address; the following odd port carries
    /// the data: 0/1 FM bank 0, 2/3 bank 1, 4/5 bank 2, 6/7 bank 3,
    /// 8/9 PCM, C/D timer and group control.
    pub fn write(&mut self, offset: u8, data: u8) {
        self.regs_main[(offset & 0xf) as usize] = data;

        match offset & 0xf {
            // address latches
            0x0 | 0x2 | 0x4 | 0x6 | 0x8 | 0xc => {}

            0x1 => self.write_fm(0, self.regs_main[0x0], data),
            0x3 => self.write_fm(1, self.regs_main[0x2], data),
            0x5 => self.write_fm(2, self.regs_main[0x4], data),
            0x7 => self.write_fm(3, self.regs_main[0x6], data),

            0x9 => self.write_pcm(self.regs_main[0x8], data),

            0xd => self.write_timer(self.regs_main[0xc], data),

            _ => {}
        }
    }

    /// Read one byte from a register port.
    ///
    /// Port 0 and 1 are the status bytes; port 2 is the external-memory
    /// read latch with post-increment. Everything else reads 0xFF.
    pub fn read(&mut self, offset: u8) -> u8 {
        match offset & 0xf {
            0x0 => {
                // busy | end3..end0 | timer B | timer A
                ((self.busy_flag as u8) << 7)
                    | self.status
                    | (((self.end_status & 0xf) as u8) << 3)
            }

            0x1 => (self.end_status >> 4) as u8,

            0x2 => {
                if !self.ext_rw {
                    return 0xff;
                }
                let value = self.ext_readlatch;
                self.ext_address = (self.ext_address + 1) & 0x7fffff;
                self.ext_readlatch = self.rom.read(self.ext_address);
                value
            }

            _ => 0xff,
        }
    }

    /// Render a block of audio into the left and right output buffers.
    ///
    /// `min(left.len(), right.len())` frames are produced, reflecting
    /// every register write observed before the call. Values are in the
    /// signed 16-bit range after the final `>>2` down-mix.
    pub fn update(&mut self, left: &mut [i32], right: &mut [i32]) {
        let total = left.len().min(right.len());
        let mut offset = 0;

        while offset < total {
            let n = (total - offset).min(self.mixbuf_len);

            self.mix_buffer[..n * 4].fill(0);
            self.acc_buffer[..n * 4].fill(0);

            for groupnum in 0..12 {
                let group = self.groups[groupnum];
                if group.muted {
                    continue;
                }
                // PFM routing only exists on the three extended groups
                let pfm = group.pfm && matches!(groupnum, 0 | 4 | 8);

                match group.sync {
                    SyncMode::FourOpFm => {
                        algorithms::render_4op(
                            &mut self.slots,
                            &self.tables,
                            &self.rom,
                            groupnum,
                            pfm,
                            &mut self.mix_buffer,
                            n,
                        );
                    }

                    SyncMode::TwoByTwoFm => {
                        algorithms::render_2x2(
                            &mut self.slots,
                            &self.tables,
                            &self.rom,
                            groupnum,
                            pfm,
                            &mut self.mix_buffer,
                            n,
                        );
                    }

                    SyncMode::ThreeOpFmPcm => {
                        algorithms::render_3op(
                            &mut self.slots,
                            &self.tables,
                            &self.rom,
                            groupnum,
                            pfm,
                            &mut self.mix_buffer,
                            n,
                        );
                        self.update_pcm_slot(groupnum + 36, n);
                    }

                    SyncMode::Pcm => {
                        for bank in 0..4 {
                            self.update_pcm_slot(groupnum + bank * 12, n);
                        }
                    }
                }
            }

            // Fold the shared 18-bit ACC output into the mix, then fold
            // four channels down to the cabinet's stereo pair: rear
            // channels at 5/256 (about -34 dB), everything >>2 into the
            // DAC domain. For ACC samples that same >>2 maps the 18-bit
            // range back to 16 bits, which is what keeps the clipping
            // audible but bounded.
            for i in 0..n {
                for ch in 0..4 {
                    self.mix_buffer[i * 4 + ch] =
                        self.mix_buffer[i * 4 + ch].wrapping_add(self.acc_buffer[i * 4 + ch]);
                }

                let ch0 = self.mix_buffer[i * 4];
                let ch1 = self.mix_buffer[i * 4 + 1];
                let ch2 = self.mix_buffer[i * 4 + 2];
                let ch3 = self.mix_buffer[i * 4 + 3];

                left[offset + i] = (ch0 + ((ch2 * 5) >> 8)) >> 2;
                right[offset + i] = (ch1 + ((ch3 * 5) >> 8)) >> 2;
            }

            offset += n;
        }
    }

    fn update_pcm_slot(&mut self, slotnum: usize, samples: usize) {
        pcm::update_pcm(
            &mut self.slots[slotnum],
            slotnum,
            &self.tables,
            &self.rom,
            &mut self.mix_buffer,
            &mut self.acc_buffer,
            &mut self.end_status,
            samples,
        );
    }
}

impl Default for Ymf271 {
    /// A chip at the standard 16.9344 MHz crystal.
    fn default() -> Self {
        Ymf271::new(STD_CLOCK).expect("standard clock is valid")
    }
}

impl std::fmt::Debug for Ymf271 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ymf271")
            .field("clock", &self.clock)
            .field("sample_rate", &self.sample_rate)
            .field("timer_a", &self.timer_a)
            .field("timer_b", &self.timer_b)
            .field("status", &self.status)
            .field("irqstate", &self.irqstate)
            .field("enable", &self.enable)
            .field(
                "active_slots",
                &self.slots.iter().filter(|s| s.active).count(),
            )
            .finish()
    }
}
