// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frequency and voltage tables.
//!
//! Board data is written as `const` slices of [`AcpuLevel`] and [`L2Level`].
//! At start-up the bin selector copies one [`AcpuLevel`] slice into a
//! [`FreqTable`], which is what the rest of the driver consumes. After that
//! the only thing that may change in a table is a level's core voltage, and
//! only under the transition lock.

use core::sync::atomic::{AtomicU32, Ordering};

/// Frequency of the standby sentinel that starts every table. Cores that are
/// unplugged (or about to idle) are parked here.
pub const STBY_KHZ: u32 = 1;

/// Capacity of a [`FreqTable`].
pub const MAX_LEVELS: usize = 32;

/// Where a clock domain gets its clock from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Src {
    /// The always-on QSB standby source.
    Qsb,
    /// PLL8, shared with the rest of the SoC and never reprogrammed by us.
    Pll8,
    /// The domain's own high-frequency PLL.
    Hfpll,
}

/// One speed a clock domain can run at, and how to route the mux to get it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CoreSpeed {
    pub khz: u32,
    pub src: Src,
    pub pri_src_sel: u32,
    pub sec_src_sel: u32,
    /// HFPLL multiplier; meaningless unless `src` is [`Src::Hfpll`].
    pub pll_l_val: u32,
}

impl CoreSpeed {
    pub const fn new(
        khz: u32,
        src: Src,
        pri_src_sel: u32,
        sec_src_sel: u32,
        pll_l_val: u32,
    ) -> Self {
        Self {
            khz,
            src,
            pri_src_sel,
            sec_src_sel,
            pll_l_val,
        }
    }
}

/// A speed of the shared L2 domain, with the rail and bus requirements that
/// come with it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct L2Level {
    pub speed: CoreSpeed,
    pub vdd_dig: u32,
    pub vdd_mem: u32,
    /// Index into the board's bandwidth tiers. Tiers only go up as the L2
    /// frequency goes up.
    pub bw_level: usize,
}

/// A CPU level as written in board data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcpuLevel {
    pub use_for_scaling: bool,
    pub speed: CoreSpeed,
    /// Index into the board's L2 table.
    pub l2_level: usize,
    pub vdd_core: u32,
}

/// A CPU level in a selected table.
#[derive(Debug)]
pub struct Level {
    pub use_for_scaling: bool,
    pub speed: CoreSpeed,
    pub l2_level: usize,
    vdd_core: AtomicU32,
}

impl Level {
    pub fn vdd_core(&self) -> u32 {
        self.vdd_core.load(Ordering::Relaxed)
    }

    /// Callers must hold the transition lock, or own the table outright.
    pub(crate) fn set_vdd_core(&self, uv: u32) {
        self.vdd_core.store(uv, Ordering::Relaxed);
    }
}

/// Identifies the speed a domain is at (or going to) by its position in the
/// domain's table. Two refs into the same table are the same speed exactly
/// when their indices match.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpeedRef {
    pub idx: usize,
    pub speed: CoreSpeed,
}

/// The CPU table picked for this part, plus the L2 table it points into.
#[derive(Debug)]
pub struct FreqTable {
    levels: heapless::Vec<Level, MAX_LEVELS>,
    l2: &'static [L2Level],
}

impl FreqTable {
    /// Builds a table from board data.
    ///
    /// # Panics
    ///
    /// Board data errors are not recoverable: this panics if `acpu` is
    /// empty, too long, does not start with the standby sentinel, is not in
    /// ascending frequency order, or names an L2 level that does not exist.
    /// `l2` must not descend either: the fastest L2 vote is found by index.
    pub fn new(acpu: &[AcpuLevel], l2: &'static [L2Level]) -> Self {
        let mut levels = heapless::Vec::new();
        let mut prev = None;

        for (i, a) in acpu.iter().enumerate() {
            if i == 0 && a.speed.khz != STBY_KHZ {
                panic!("table does not start at standby");
            }
            if prev.is_some_and(|p| a.speed.khz <= p) {
                panic!("table not ascending at {}", a.speed.khz);
            }
            if a.l2_level >= l2.len() {
                panic!("bad L2 level {} at {}", a.l2_level, a.speed.khz);
            }
            prev = Some(a.speed.khz);

            let level = Level {
                use_for_scaling: a.use_for_scaling,
                speed: a.speed,
                l2_level: a.l2_level,
                vdd_core: AtomicU32::new(a.vdd_core),
            };
            if levels.push(level).is_err() {
                panic!("table too long");
            }
        }

        if levels.is_empty() || l2.is_empty() {
            panic!("empty table");
        }
        let misordered = l2
            .windows(2)
            .find(|w| w[1].speed.khz < w[0].speed.khz);
        if let Some(w) = misordered {
            panic!("L2 table descends at {}", w[1].speed.khz);
        }

        Self { levels, l2 }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, idx: usize) -> &Level {
        &self.levels[idx]
    }

    pub fn l2_levels(&self) -> &'static [L2Level] {
        self.l2
    }

    pub fn l2_level(&self, idx: usize) -> &'static L2Level {
        &self.l2[idx]
    }

    pub fn speed_ref(&self, idx: usize) -> SpeedRef {
        SpeedRef {
            idx,
            speed: self.levels[idx].speed,
        }
    }

    pub fn l2_speed_ref(&self, idx: usize) -> SpeedRef {
        SpeedRef {
            idx,
            speed: self.l2[idx].speed,
        }
    }

    /// Finds the level running at exactly `khz`. There is no interpolation:
    /// anything not in the table is not a valid request.
    pub fn find(&self, khz: u32) -> Option<usize> {
        self.levels.iter().position(|l| l.speed.khz == khz)
    }

    /// Frequencies that should be offered to a governor, in ascending order.
    pub fn scaling_frequencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels
            .iter()
            .filter(|l| l.use_for_scaling)
            .map(|l| l.speed.khz)
    }

    /// Takes every level after the one at exactly `khz` out of scaling.
    /// Returns false, changing nothing, if there is no such level.
    pub(crate) fn limit_scaling(&mut self, khz: u32) -> bool {
        let Some(idx) = self.find(khz) else {
            return false;
        };
        for l in &mut self.levels[idx + 1..] {
            l.use_for_scaling = false;
        }
        true
    }

    /// The fastest level still enabled for scaling.
    pub fn max_scaling_level(&self) -> Option<usize> {
        self.levels.iter().rposition(|l| l.use_for_scaling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static L2: [L2Level; 2] = [
        L2Level {
            speed: CoreSpeed::new(STBY_KHZ, Src::Qsb, 0, 0, 0),
            vdd_dig: 1_050_000,
            vdd_mem: 1_050_000,
            bw_level: 0,
        },
        L2Level {
            speed: CoreSpeed::new(384_000, Src::Hfpll, 2, 0, 0x1c),
            vdd_dig: 1_050_000,
            vdd_mem: 1_050_000,
            bw_level: 1,
        },
    ];

    const fn acpu(khz: u32, scale: bool, l2: usize) -> AcpuLevel {
        AcpuLevel {
            use_for_scaling: scale,
            speed: CoreSpeed::new(khz, Src::Hfpll, 1, 0, khz / 27_000),
            l2_level: l2,
            vdd_core: 900_000,
        }
    }

    const STBY: AcpuLevel = AcpuLevel {
        use_for_scaling: false,
        speed: CoreSpeed::new(STBY_KHZ, Src::Qsb, 0, 0, 0),
        l2_level: 0,
        vdd_core: 800_000,
    };

    #[test]
    fn lookup_is_exact() {
        let t = FreqTable::new(
            &[STBY, acpu(594_000, true, 1), acpu(648_000, false, 1)],
            &L2,
        );
        assert_eq!(t.find(594_000), Some(1));
        assert_eq!(t.find(648_000), Some(2));
        assert_eq!(t.find(600_000), None);
        assert_eq!(t.find(0), None);
    }

    #[test]
    fn scaling_enumeration_skips_disabled() {
        let t = FreqTable::new(
            &[
                STBY,
                acpu(594_000, true, 1),
                acpu(648_000, false, 1),
                acpu(702_000, true, 1),
            ],
            &L2,
        );
        assert_eq!(
            t.scaling_frequencies().collect::<Vec<_>>(),
            [594_000, 702_000]
        );
        assert_eq!(t.max_scaling_level(), Some(3));
    }

    #[test]
    fn scaling_limit_cuts_everything_above() {
        let mut t = FreqTable::new(
            &[
                STBY,
                acpu(594_000, true, 1),
                acpu(648_000, false, 1),
                acpu(702_000, true, 1),
            ],
            &L2,
        );
        assert!(!t.limit_scaling(600_000));
        assert_eq!(t.max_scaling_level(), Some(3));

        assert!(t.limit_scaling(594_000));
        assert_eq!(t.scaling_frequencies().collect::<Vec<_>>(), [594_000]);
        // Still there for direct requests.
        assert_eq!(t.find(702_000), Some(3));
    }

    #[test]
    #[should_panic]
    fn out_of_order_table_is_fatal() {
        FreqTable::new(
            &[STBY, acpu(648_000, true, 1), acpu(594_000, true, 1)],
            &L2,
        );
    }

    #[test]
    #[should_panic]
    fn dangling_l2_reference_is_fatal() {
        FreqTable::new(&[STBY, acpu(594_000, true, 2)], &L2);
    }

    #[test]
    #[should_panic(expected = "L2 table descends")]
    fn out_of_order_l2_table_is_fatal() {
        const fn l2(khz: u32, l_val: u32) -> L2Level {
            L2Level {
                speed: CoreSpeed::new(khz, Src::Hfpll, 1, 0, l_val),
                vdd_dig: 1_050_000,
                vdd_mem: 1_050_000,
                bw_level: 1,
            }
        }
        static SHUFFLED: [L2Level; 3] = [
            L2Level {
                speed: CoreSpeed::new(STBY_KHZ, Src::Qsb, 0, 0, 0),
                vdd_dig: 1_050_000,
                vdd_mem: 1_050_000,
                bw_level: 0,
            },
            l2(1_026_000, 0x26),
            l2(594_000, 0x16),
        ];
        FreqTable::new(&[STBY, acpu(594_000, true, 2)], &SHUFFLED);
    }

    #[test]
    fn vdd_override_sticks() {
        let t = FreqTable::new(&[STBY, acpu(594_000, true, 1)], &L2);
        t.level(1).set_vdd_core(950_000);
        assert_eq!(t.level(1).vdd_core(), 950_000);
        assert_eq!(t.level(0).vdd_core(), 800_000);
    }
}
