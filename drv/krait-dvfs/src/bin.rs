// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Speed-bin selection.
//!
//! Parts are binned at the factory by how much voltage they need, and the
//! result is blown into the PTE efuse as a process-voltage-scaling (PVS)
//! code. The code picks which of the board's tables we run from.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use ringbuf::*;

use crate::config::{Board, DvfsConfig};
use crate::table::FreqTable;
use crate::SecureFuse;

/// Core voltage floor for parts affected by Krait erratum 26.
pub const KRAIT_ERRATA_VMIN: u32 = 1_150_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Bin {
    Slow,
    Nominal,
    Fast,
}

/// The PVS codes we know about.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
enum Pvs {
    Slow = 0,
    Nominal = 1,
    Fast = 3,
    /// Field not blown here; look at the next one.
    Redirect = 7,
}

const PVS_SHIFT: u32 = 10;
const PVS_ALT_SHIFT: u32 = 13;
const PVS_MASK: u32 = 0x7;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Efuse(u32),
    UnknownPvs(u32),
    Selected(Bin),
    Forced(Bin),
    ErrataVmin(u32),
    MaxKhz(u32),
    MaxKhzNotFound(u32),
    Max(u32),
}

ringbuf!(Trace, 16, Trace::None);

/// Decodes the bin from a PTE efuse word.
pub fn pvs_bin(efuse: u32) -> Bin {
    let mut raw = (efuse >> PVS_SHIFT) & PVS_MASK;
    if Pvs::from_u32(raw) == Some(Pvs::Redirect) {
        raw = (efuse >> PVS_ALT_SHIFT) & PVS_MASK;
    }

    match Pvs::from_u32(raw) {
        Some(Pvs::Slow | Pvs::Redirect) => Bin::Slow,
        Some(Pvs::Nominal) => Bin::Nominal,
        Some(Pvs::Fast) => Bin::Fast,
        None => {
            ringbuf_entry!(Trace::UnknownPvs(raw));
            Bin::Nominal
        }
    }
}

/// The outcome of bin selection.
pub struct FreqPlan {
    pub bin: Bin,
    pub table: FreqTable,
    /// Index of the level every domain is brought up at.
    pub max: usize,
}

/// Picks and fixes up the table for this part.
///
/// # Panics
///
/// If the fixed-up table has no level left enabled for scaling.
pub fn select_freq_plan(
    board: &Board,
    fuse: &impl SecureFuse,
    cfg: &DvfsConfig,
) -> FreqPlan {
    let bin = match cfg.forced_bin {
        Some(bin) => {
            ringbuf_entry!(Trace::Forced(bin));
            bin
        }
        None => {
            let efuse = fuse.read_pte_efuse();
            ringbuf_entry!(Trace::Efuse(efuse));
            pvs_bin(efuse)
        }
    };
    ringbuf_entry!(Trace::Selected(bin));

    let mut table = FreqTable::new(board.table(bin), board.l2_levels);

    if board.vmin_errata_midrs.contains(&cfg.midr) {
        ringbuf_entry!(Trace::ErrataVmin(cfg.midr));
        for l in table.levels() {
            if l.vdd_core() < KRAIT_ERRATA_VMIN {
                l.set_vdd_core(KRAIT_ERRATA_VMIN);
            }
        }
    }

    if let Some(khz) = cfg.max_khz {
        if table.limit_scaling(khz) {
            ringbuf_entry!(Trace::MaxKhz(khz));
        } else {
            ringbuf_entry!(Trace::MaxKhzNotFound(khz));
        }
    }

    let Some(max) = table.max_scaling_level() else {
        panic!("no level enabled for scaling");
    };
    ringbuf_entry!(Trace::Max(table.level(max).speed.khz));

    FreqPlan { bin, table, max }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msm8960::{BOARD, FAST, NOMINAL, SLOW};
    use crate::sim::Fuse;

    fn efuse(pvs: u32, alt: u32) -> u32 {
        (pvs << PVS_SHIFT) | (alt << PVS_ALT_SHIFT)
    }

    #[test]
    fn pvs_decode() {
        assert_eq!(pvs_bin(efuse(0, 0)), Bin::Slow);
        assert_eq!(pvs_bin(efuse(1, 0)), Bin::Nominal);
        assert_eq!(pvs_bin(efuse(3, 0)), Bin::Fast);
        for unknown in [2, 4, 5, 6] {
            assert_eq!(pvs_bin(efuse(unknown, 0)), Bin::Nominal);
        }
        // Unrelated bits don't leak in.
        assert_eq!(pvs_bin(efuse(3, 0) | 0x3ff), Bin::Fast);
    }

    #[test]
    fn pvs_redirect() {
        assert_eq!(pvs_bin(efuse(7, 3)), Bin::Fast);
        assert_eq!(pvs_bin(efuse(7, 1)), Bin::Nominal);
        assert_eq!(pvs_bin(efuse(7, 0)), Bin::Slow);
        // Redirected to a second 7: still slow.
        assert_eq!(pvs_bin(efuse(7, 7)), Bin::Slow);
        assert_eq!(pvs_bin(efuse(7, 5)), Bin::Nominal);
    }

    #[test]
    fn fuse_picks_table() {
        let cfg = DvfsConfig::default();
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(3, 0)), &cfg);
        assert_eq!(plan.bin, Bin::Fast);
        for (l, want) in plan.table.levels().iter().zip(FAST.iter()) {
            assert_eq!(l.vdd_core(), want.vdd_core);
        }
        assert_eq!(plan.table.level(plan.max).speed.khz, 2_160_000);
    }

    #[test]
    fn forced_bin_ignores_fuse() {
        let cfg = DvfsConfig {
            forced_bin: Some(Bin::Slow),
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(3, 0)), &cfg);
        assert_eq!(plan.bin, Bin::Slow);
        assert_eq!(plan.table.level(0).vdd_core(), SLOW[0].vdd_core);
    }

    #[test]
    fn errata_raises_low_voltages_only() {
        let cfg = DvfsConfig {
            midr: 0x511F_04D1,
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(1, 0)), &cfg);
        for (l, orig) in plan.table.levels().iter().zip(NOMINAL.iter()) {
            assert_eq!(l.vdd_core(), orig.vdd_core.max(KRAIT_ERRATA_VMIN));
        }

        // Unaffected parts keep the table as-is.
        let cfg = DvfsConfig {
            midr: 0x511F_04D2,
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(1, 0)), &cfg);
        assert_eq!(plan.table.level(1).vdd_core(), NOMINAL[1].vdd_core);
    }

    #[test]
    fn max_khz_clamps_scaling() {
        let cfg = DvfsConfig {
            max_khz: Some(1_512_000),
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(3, 0)), &cfg);
        assert_eq!(plan.table.level(plan.max).speed.khz, 1_512_000);
        assert_eq!(
            plan.table.scaling_frequencies().last(),
            Some(1_512_000)
        );
        assert!(plan.table.find(2_160_000).is_some());
    }

    #[test]
    fn max_khz_not_in_table_is_ignored() {
        let cfg = DvfsConfig {
            max_khz: Some(1_500_000),
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(3, 0)), &cfg);
        assert_eq!(plan.table.level(plan.max).speed.khz, 2_160_000);
    }

    #[test]
    fn max_khz_on_non_scaling_level_uses_the_one_below() {
        // 1.404 GHz is in the table but not offered for scaling.
        let cfg = DvfsConfig {
            max_khz: Some(1_404_000),
            ..DvfsConfig::default()
        };
        let plan = select_freq_plan(&BOARD, &Fuse(efuse(3, 0)), &cfg);
        assert_eq!(plan.table.level(plan.max).speed.khz, 1_350_000);
    }
}
