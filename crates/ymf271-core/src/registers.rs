//! Register decode
//!
//! The two-port write scheme latches a sub-address on even ports and
//! delivers data on the following odd port. FM sub-addresses select a
//! group through `FM_TAB` (low nibble) and a parameter (high nibble); PCM
//! sub-addresses select a group-leader slot through `PCM_TAB`; the timer
//! port covers group sync/PFM, both timers, the enable/IRQ/reset mask and
//! the external-memory cursor.
//!
//! Writes to key-on slots of synchronized groups mirror a handful of
//! registers to every sibling slot, and a key-on cascades the envelope and
//! step initialisation across the group.

use crate::chip::{SyncMode, Ymf271};
use crate::constants::{FM_TAB, PCM_TAB};
use crate::pcm::set_end_status;

/// Registers mirrored to sibling slots when written through a key-on slot
/// of a synchronized group.
fn is_sync_register(reg: u8) -> bool {
    matches!(reg, 0 | 9 | 10 | 12 | 13 | 14)
}

impl Ymf271 {
    /// Write one parameter of one slot.
    pub(crate) fn write_slot_register(&mut self, slotnum: usize, reg: u8, data: u8) {
        let slot = &mut self.slots[slotnum];

        match reg {
            0x0 => {
                slot.ext_en = data & 0x80 != 0;
                slot.ext_out = (data >> 3) & 0xf;

                if data & 1 != 0 {
                    self.key_on(slotnum);
                } else {
                    slot.key_off();
                }
            }

            0x1 => slot.lfo_freq = data,

            0x2 => {
                slot.lfo_wave = data & 3;
                slot.pms = (data >> 3) & 0x7;
                slot.ams = (data >> 6) & 0x3;
            }

            0x3 => {
                slot.multiple = data & 0xf;
                slot.detune = (data >> 4) & 0x7;
            }

            0x4 => slot.tl = data & 0x7f,

            0x5 => {
                slot.ar = data & 0x1f;
                slot.keyscale = (data >> 5) & 0x3;
            }

            0x6 => slot.decay1_rate = data & 0x1f,

            0x7 => slot.decay2_rate = data & 0x1f,

            0x8 => {
                slot.release_rate = data & 0xf;
                slot.decay1_level = (data >> 4) & 0xf;
            }

            0x9 => {
                // frequency fraction and octave latch together here
                slot.fns = ((slot.fns_hi as u32) << 8 & 0x0f00) | data as u32;
                slot.block = (slot.fns_hi >> 4) & 0xf;
            }

            0xa => slot.fns_hi = data,

            0xb => {
                slot.waveform = data & 0x7;
                slot.feedback = (data >> 4) & 0x7;
                slot.accon = data & 0x80 != 0;
            }

            0xc => slot.algorithm = data & 0xf,

            0xd => {
                slot.ch_level[0] = data >> 4;
                slot.ch_level[1] = data & 0xf;
            }

            0xe => {
                slot.ch_level[2] = data >> 4;
                slot.ch_level[3] = data & 0xf;
            }

            _ => {}
        }
    }

    /// Key-on: re-initialise the slot and, in the synchronized sync
    /// modes, cascade the initialisation to the sibling slots that render
    /// together with it. Siblings are primed but not marked active.
    fn key_on(&mut self, slotnum: usize) {
        let groupnum = slotnum % 12;
        let bank = slotnum / 12;

        self.slots[slotnum].trigger(&self.tables);
        self.slots[slotnum].active = true;
        set_end_status(&mut self.end_status, slotnum, false);

        match (self.groups[groupnum].sync, bank) {
            (SyncMode::FourOpFm, 0) => {
                for sibling in 1..4 {
                    self.slots[groupnum + sibling * 12].trigger(&self.tables);
                }
            }
            (SyncMode::TwoByTwoFm, 0) => {
                self.slots[groupnum + 2 * 12].trigger(&self.tables);
            }
            (SyncMode::TwoByTwoFm, 1) => {
                self.slots[groupnum + 3 * 12].trigger(&self.tables);
            }
            (SyncMode::ThreeOpFmPcm, 0) => {
                for sibling in 1..3 {
                    self.slots[groupnum + sibling * 12].trigger(&self.tables);
                }
            }
            // sync 3 slots are fully independent
            _ => {}
        }
    }

    /// Decode a write to one of the four FM register banks.
    pub(crate) fn write_fm(&mut self, bank: usize, address: u8, data: u8) {
        let groupnum = FM_TAB[(address & 0xf) as usize];
        if groupnum < 0 {
            log::debug!("fm write to invalid group {:02X} {:02X}", address, data);
            return;
        }
        let groupnum = groupnum as usize;
        let reg = (address >> 4) & 0xf;

        // writes through a key-on slot mirror synchronized registers to
        // every slot that renders with it
        let key_on_bank = match self.groups[groupnum].sync {
            SyncMode::FourOpFm | SyncMode::ThreeOpFmPcm => bank == 0,
            SyncMode::TwoByTwoFm => bank == 0 || bank == 1,
            SyncMode::Pcm => false,
        };

        if key_on_bank && is_sync_register(reg) {
            match self.groups[groupnum].sync {
                SyncMode::FourOpFm => {
                    for b in 0..4 {
                        self.write_slot_register(12 * b + groupnum, reg, data);
                    }
                }
                SyncMode::TwoByTwoFm => {
                    if bank == 0 {
                        self.write_slot_register(groupnum, reg, data);
                        self.write_slot_register(12 * 2 + groupnum, reg, data);
                    } else {
                        self.write_slot_register(12 + groupnum, reg, data);
                        self.write_slot_register(12 * 3 + groupnum, reg, data);
                    }
                }
                SyncMode::ThreeOpFmPcm => {
                    for b in 0..3 {
                        self.write_slot_register(12 * b + groupnum, reg, data);
                    }
                }
                SyncMode::Pcm => unreachable!(),
            }
        } else {
            self.write_slot_register(12 * bank + groupnum, reg, data);
        }
    }

    /// Decode a write to the PCM address/loop/format registers.
    pub(crate) fn write_pcm(&mut self, address: u8, data: u8) {
        let slotnum = PCM_TAB[(address & 0xf) as usize];
        if slotnum < 0 {
            log::debug!("pcm write to invalid slot {:02X} {:02X}", address, data);
            return;
        }
        let slot = &mut self.slots[slotnum as usize];

        match (address >> 4) & 0xf {
            0x0 => slot.startaddr = (slot.startaddr & !0xff) | data as u32,
            0x1 => slot.startaddr = (slot.startaddr & !0xff00) | ((data as u32) << 8),
            0x2 => {
                slot.startaddr = (slot.startaddr & !0xff0000) | (((data & 0x7f) as u32) << 16);
                slot.altloop = data & 0x80 != 0;
            }
            0x3 => slot.endaddr = (slot.endaddr & !0xff) | data as u32,
            0x4 => slot.endaddr = (slot.endaddr & !0xff00) | ((data as u32) << 8),
            0x5 => slot.endaddr = (slot.endaddr & !0xff0000) | (((data & 0x7f) as u32) << 16),
            0x6 => slot.loopaddr = (slot.loopaddr & !0xff) | data as u32,
            0x7 => slot.loopaddr = (slot.loopaddr & !0xff00) | ((data as u32) << 8),
            0x8 => slot.loopaddr = (slot.loopaddr & !0xff0000) | (((data & 0x7f) as u32) << 16),
            0x9 => {
                slot.fs = data & 0x3;
                slot.bits = if data & 0x4 != 0 { 12 } else { 8 };
                slot.srcnote = (data >> 3) & 0x3;
                slot.srcb = (data >> 5) & 0x7;
            }
            _ => {}
        }
    }

    /// Decode a write to the timer/group port.
    pub(crate) fn write_timer(&mut self, address: u8, data: u8) {
        if address & 0xf0 == 0 {
            // group sync mode and PFM flag
            let groupnum = FM_TAB[(address & 0xf) as usize];
            if groupnum < 0 {
                log::debug!("timer write to invalid group {:02X} {:02X}", address, data);
                return;
            }
            let group = &mut self.groups[groupnum as usize];
            group.sync = SyncMode::from_bits(data & 0x3);
            group.pfm = data >> 7 != 0;
            return;
        }

        match address {
            0x10 => {
                // high 8 bits of the 10-bit Timer A value
                self.timer_a = (self.timer_a & 0x003) | ((data as u32) << 2);
            }

            0x11 => {
                // low 2 bits; the split is swapped relative to the
                // documentation, matching the other Yamaha FM chips
                self.timer_a = (self.timer_a & 0x3fc) | (data as u32 & 0x03);
            }

            0x12 => self.timer_b = data as u32,

            0x13 => {
                // bit 0/1 enable, bit 2/3 IRQ enable, bit 4/5 reset.
                // Enabling a timer only (re)arms the period on the host
                // side; reset clears status and IRQ but not the period.
                if data & 0x10 != 0 {
                    self.irqstate &= !1;
                    self.status &= !1;
                    if self.irqstate & 2 == 0 {
                        self.call_irq_handler(false);
                    }
                }
                if data & 0x20 != 0 {
                    self.irqstate &= !2;
                    self.status &= !2;
                    if self.irqstate & 1 == 0 {
                        self.call_irq_handler(false);
                    }
                }
                self.enable = data;
            }

            0x14 => self.ext_address = (self.ext_address & !0xff) | data as u32,
            0x15 => self.ext_address = (self.ext_address & !0xff00) | ((data as u32) << 8),
            0x16 => {
                self.ext_address =
                    (self.ext_address & !0xff0000) | (((data & 0x7f) as u32) << 16);
                self.ext_rw = data & 0x80 != 0;
            }
            0x17 => {
                self.ext_address = (self.ext_address + 1) & 0x7fffff;
                if !self.ext_rw {
                    self.rom.write_byte(self.ext_address, data);
                }
            }

            // test registers
            0x20..=0x22 => {}

            _ => {}
        }
    }
}
