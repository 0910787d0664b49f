// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board description and per-boot configuration.

use crate::bin::Bin;
use crate::table::{AcpuLevel, L2Level};
use crate::vdd::Vreg;

/// Upper limits for each rail a domain votes on, in microvolts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VregLimits {
    pub core: u32,
    pub mem: u32,
    pub dig: u32,
    pub hfpll_a: u32,
    pub hfpll_b: u32,
}

impl VregLimits {
    pub fn max(&self, vreg: Vreg) -> u32 {
        match vreg {
            Vreg::Core => self.core,
            Vreg::Mem => self.mem,
            Vreg::Dig => self.dig,
            Vreg::HfpllA => self.hfpll_a,
            Vreg::HfpllB => self.hfpll_b,
        }
    }
}

/// Everything the driver needs to know about an SoC that is not logic.
#[derive(Debug)]
pub struct Board {
    pub name: &'static str,
    pub l2_levels: &'static [L2Level],
    pub slow: &'static [AcpuLevel],
    pub nominal: &'static [AcpuLevel],
    pub fast: &'static [AcpuLevel],
    /// Bus bandwidth tiers, in MB/s, indexed by [`L2Level::bw_level`].
    pub bw_tiers_mbps: &'static [u32],
    /// CPU identifiers of parts that need [`crate::bin::KRAIT_ERRATA_VMIN`].
    pub vmin_errata_midrs: &'static [u32],
    pub cpu_vreg: VregLimits,
    /// The L2 domain only votes on its PLL supplies; the other limits are
    /// unused.
    pub l2_vreg: VregLimits,
}

impl Board {
    pub fn table(&self, bin: Bin) -> &'static [AcpuLevel] {
        match bin {
            Bin::Slow => self.slow,
            Bin::Nominal => self.nominal,
            Bin::Fast => self.fast,
        }
    }
}

/// Per-boot knobs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DvfsConfig {
    /// Highest frequency to advertise to the governor. Levels above it stay
    /// reachable through direct requests.
    pub max_khz: Option<u32>,
    /// Use this bin's table regardless of what the fuses say.
    pub forced_bin: Option<Bin>,
    /// Main ID register of the cores, for errata matching.
    pub midr: u32,
    /// Bit `n` set means CPU `n` is brought up with the driver; other CPUs
    /// start parked at standby until hotplug brings them in.
    pub online: u32,
}
