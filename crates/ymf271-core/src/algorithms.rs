//! FM algorithm networks for the three FM-capable sync modes
//!
//! Each group renders one sample at a time: modulator stages feed their
//! phase-modulation words forward, the feedback hook stores the slot-1
//! word after the documented stage, and carrier outputs are attenuated per
//! channel and summed into the interleaved 4-channel mix buffer.
//!
//! When PFM is enabled (groups 0, 4 and 8 only), carrier slots read
//! external PCM memory instead of the internal waveform tables. The
//! routing diagrams in the comments read left to right; `<--|` marks the
//! feedback tap.

use crate::operator::OpInput;
use crate::pcm::Rom;
use crate::slot::Slot;
use crate::tables::Tables;

/// Attenuate each operator output by its slot's four channel levels and
/// sum into sample `i` of the mix buffer.
#[inline]
fn accumulate<const N: usize>(
    slots: &[Slot; 48],
    tables: &Tables,
    mix: &mut [i32],
    i: usize,
    outputs: [(usize, i64); N],
) {
    for ch in 0..4 {
        let mut sum = 0i64;
        for &(slotnum, out) in outputs.iter() {
            sum += (out * tables.attenuation[slots[slotnum].ch_level[ch] as usize]) >> 16;
        }
        mix[i * 4 + ch] = mix[i * 4 + ch].wrapping_add(sum as i32);
    }
}

/// Evaluate a carrier slot: PFM reads external memory, otherwise the
/// internal waveform table.
#[inline]
fn carrier(
    slots: &mut [Slot; 48],
    slotnum: usize,
    tables: &Tables,
    rom: &Rom,
    pfm: bool,
    input: OpInput,
) -> i64 {
    if pfm {
        slots[slotnum].calculate_op_pfm(tables, rom, input)
    } else {
        slots[slotnum].calculate_op(tables, input)
    }
}

/// Sync mode 0: one four-operator FM voice per group, algorithm 0-15.
pub(crate) fn render_4op(
    slots: &mut [Slot; 48],
    tables: &Tables,
    rom: &Rom,
    groupnum: usize,
    pfm: bool,
    mix: &mut [i32],
    samples: usize,
) {
    let s1 = groupnum;
    let s2 = groupnum + 12;
    let s3 = groupnum + 24;
    let s4 = groupnum + 36;

    if !slots[s1].active {
        return;
    }

    for i in 0..samples {
        let mut output1: i64 = 0;
        let mut output2: i64 = 0;
        let mut output3: i64 = 0;
        let mut output4: i64 = 0;

        match slots[s1].algorithm {
            // <--------|
            // +--[S1]--|--+--[S3]--+--[S2]--+--[S4]-->
            0 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                let pm2 = slots[s2].calculate_op(tables, OpInput::Phase(pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            // <-----------------|
            // +--[S1]--+--[S3]--|--+--[S2]--+--[S4]-->
            1 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                let pm2 = slots[s2].calculate_op(tables, OpInput::Phase(pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            // <--------|
            // +--[S1]--|
            //          |
            //  --[S3]--+--[S2]--+--[S4]-->
            2 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                let pm2 = slots[s2].calculate_op(tables, OpInput::Phase(pm1 + pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            //          <--------|
            //          +--[S1]--|
            //                   |
            //  --[S3]--+--[S2]--+--[S4]-->
            3 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                let pm2 = slots[s2].calculate_op(tables, OpInput::Phase(pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm1 + pm2));
            }

            //              --[S2]--|
            // <--------|           |
            // +--[S1]--|--+--[S3]--+--[S4]-->
            4 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm3 + pm2));
            }

            //           --[S2]-----|
            // <-----------------|  |
            // +--[S1]--+--[S3]--|--+--[S4]-->
            5 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm3 + pm2));
            }

            //  --[S2]-----+--[S4]--|
            //                      |
            // <--------|           |
            // +--[S1]--|--+--[S3]--+-->
            6 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            //  --[S2]--+--[S4]-----|
            //                      |
            // <-----------------|  |
            // +--[S1]--+--[S3]--|--+-->
            7 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                output3 = if pfm {
                    slots[s3].calculate_op_pfm(tables, rom, OpInput::Phase(pm1))
                } else {
                    pm3
                };
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            //  --[S3]--+--[S2]--+--[S4]--|
            //                            |
            // <--------|                 |
            // +--[S1]--|-----------------+-->
            8 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                let pm2 = slots[s2].calculate_op(tables, OpInput::Phase(pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            //          <--------|
            //          +--[S1]--|
            //                   |
            //  --[S3]--|        |
            //  --[S2]--+--[S4]--+-->
            9 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm3 + pm2));
            }

            //              --[S4]--|
            //              --[S2]--|
            // <--------|           |
            // +--[S1]--|--+--[S3]--+-->
            10 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::None);
            }

            //           --[S4]-----|
            //           --[S2]-----|
            // <-----------------|  |
            // +--[S1]--+--[S3]--|--+-->
            11 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                output3 = if pfm {
                    slots[s3].calculate_op_pfm(tables, rom, OpInput::Phase(pm1))
                } else {
                    pm3
                };
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::None);
            }

            //             |--+--[S4]--|
            // <--------|  |--+--[S3]--|
            // +--[S1]--|--|--+--[S2]--+-->
            12 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm1));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm1));
            }

            //  --[S3]--+--[S2]--|
            //                   |
            //  --[S4]-----------|
            // <--------|        |
            // +--[S1]--|--------+-->
            13 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm3));
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::None);
            }

            //  --[S2]-----+--[S4]--|
            //                      |
            // <--------|  +--[S3]--|
            // +--[S1]--|--|--------+-->
            14 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                let pm2 = slots[s2].calculate_op(tables, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::Phase(pm2));
            }

            //  --[S4]-----|
            //  --[S2]-----|
            //  --[S3]-----|
            // <--------|  |
            // +--[S1]--|--+-->
            _ => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::None);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
                output4 = carrier(slots, s4, tables, rom, pfm, OpInput::None);
            }
        }

        accumulate(
            slots,
            tables,
            mix,
            i,
            [(s1, output1), (s2, output2), (s3, output3), (s4, output4)],
        );
    }
}

/// Sync mode 1: two independent two-operator pairs (banks {0,2} and
/// {1,3}), each keyed by its bank-0/bank-1 slot, algorithm 0-3.
pub(crate) fn render_2x2(
    slots: &mut [Slot; 48],
    tables: &Tables,
    rom: &Rom,
    groupnum: usize,
    pfm: bool,
    mix: &mut [i32],
    samples: usize,
) {
    for pair in 0..2 {
        let s1 = groupnum + pair * 12;
        let s3 = groupnum + (pair + 2) * 12;

        if !slots[s1].active {
            continue;
        }

        for i in 0..samples {
            let mut output1: i64 = 0;
            let output3: i64;

            match slots[s1].algorithm & 3 {
                // <--------|
                // +--[S1]--|--+--[S3]-->
                0 => {
                    let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                    slots[s1].set_feedback(pm1);
                    output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                }

                // <-----------------|
                // +--[S1]--+--[S3]--|-->
                1 => {
                    let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                    let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                    slots[s1].set_feedback(pm3);
                    output3 = if pfm {
                        slots[s3].calculate_op_pfm(tables, rom, OpInput::Phase(pm1))
                    } else {
                        pm3
                    };
                }

                //  --[S3]-----|
                // <--------|  |
                // +--[S1]--|--+-->
                2 => {
                    let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                    slots[s1].set_feedback(pm1);
                    output1 = if pfm {
                        slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                    } else {
                        pm1
                    };
                    output3 = carrier(slots, s3, tables, rom, pfm, OpInput::None);
                }

                // <--------|  +--[S3]--|
                // +--[S1]--|--|--------+-->
                _ => {
                    let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                    slots[s1].set_feedback(pm1);
                    output1 = if pfm {
                        slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                    } else {
                        pm1
                    };
                    output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                }
            }

            accumulate(slots, tables, mix, i, [(s1, output1), (s3, output3)]);
        }
    }
}

/// Sync mode 2: three-operator FM over banks 0-2, algorithm 0-7. The
/// bank-3 slot runs through the PCM path separately.
pub(crate) fn render_3op(
    slots: &mut [Slot; 48],
    tables: &Tables,
    rom: &Rom,
    groupnum: usize,
    pfm: bool,
    mix: &mut [i32],
    samples: usize,
) {
    let s1 = groupnum;
    let s2 = groupnum + 12;
    let s3 = groupnum + 24;

    if !slots[s1].active {
        return;
    }

    for i in 0..samples {
        let mut output1: i64 = 0;
        let mut output2: i64 = 0;
        let mut output3: i64 = 0;

        match slots[s1].algorithm & 7 {
            // <--------|
            // +--[S1]--|--+--[S3]--+--[S2]-->
            0 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm3));
            }

            // <-----------------|
            // +--[S1]--+--[S3]--|--+--[S2]-->
            1 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm3));
            }

            //  --[S3]-----|
            // <--------|  |
            // +--[S1]--|--+--[S2]-->
            2 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm1 + pm3));
            }

            //  --[S3]--+--[S2]--|
            // <--------|        |
            // +--[S1]--|--------+-->
            3 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                let pm3 = slots[s3].calculate_op(tables, OpInput::None);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::Phase(pm3));
            }

            //              --[S2]--|
            // <--------|           |
            // +--[S1]--|--+--[S3]--+-->
            4 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
            }

            //              --[S2]--|
            // <-----------------|  |
            // +--[S1]--+--[S3]--|--+-->
            5 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                let pm3 = slots[s3].calculate_op(tables, OpInput::Phase(pm1));
                slots[s1].set_feedback(pm3);
                output3 = if pfm {
                    slots[s3].calculate_op_pfm(tables, rom, OpInput::Phase(pm1))
                } else {
                    pm3
                };
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
            }

            //  --[S2]-----|
            //  --[S3]-----|
            // <--------|  |
            // +--[S1]--|--+-->
            6 => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::None);
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
            }

            //              --[S2]--|
            // <--------|  +--[S3]--|
            // +--[S1]--|--|--------+-->
            _ => {
                let pm1 = slots[s1].calculate_op(tables, OpInput::Feedback);
                slots[s1].set_feedback(pm1);
                output1 = if pfm {
                    slots[s1].calculate_op_pfm(tables, rom, OpInput::Feedback)
                } else {
                    pm1
                };
                output3 = carrier(slots, s3, tables, rom, pfm, OpInput::Phase(pm1));
                output2 = carrier(slots, s2, tables, rom, pfm, OpInput::None);
            }
        }

        accumulate(slots, tables, mix, i, [(s1, output1), (s2, output2), (s3, output3)]);
    }
}
