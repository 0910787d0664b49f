// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Voltage sequencing.
//!
//! Three rails matter for a frequency change: the core's own rail, and this
//! core's votes on the shared digital-logic and memory rails. At no instant
//! may memory sit below digital, or digital below core, so raises go memory
//! first and lowers go core first.

use enum_map::{Enum, EnumMap};
use ringbuf::*;

use crate::config::VregLimits;
use crate::table::{CoreSpeed, L2Level, Level, Src};
use crate::{Domain, DvfsError, Reason};

/// Floor for any domain running from its HFPLL at a multiplier above
/// [`HFPLL_LOW_VDD_PLL_L_MAX`].
pub const HFPLL_NOMINAL_VDD: u32 = 1_100_000;
/// Floor for any domain running from its HFPLL at a low multiplier.
pub const HFPLL_LOW_VDD: u32 = 800_000;
pub const HFPLL_LOW_VDD_PLL_L_MAX: u32 = 0x28;

/// The rails a domain has a say in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Vreg {
    Core,
    Mem,
    Dig,
    HfpllA,
    HfpllB,
}

/// Why a rail collaborator turned us down.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RailError {
    OutOfRange,
    Rejected,
    Unavailable,
}

/// Voltage control, as provided by the regulator and RPM drivers.
///
/// `set_rail` may sleep. A domain's [`Vreg::Core`] rail may only be set from
/// that domain's own core; the other rails are votes and can be cast from
/// anywhere.
pub trait Rails: Sync {
    fn set_rail(
        &self,
        domain: Domain,
        vreg: Vreg,
        uv: u32,
        max_uv: u32,
    ) -> Result<(), RailError>;

    /// Used for every increase. Collaborators that need to do something
    /// different when a rail goes up (waiting for it to settle, say) can hook
    /// it here.
    fn raise_rail(
        &self,
        domain: Domain,
        vreg: Vreg,
        uv: u32,
        max_uv: u32,
    ) -> Result<(), RailError> {
        self.set_rail(domain, vreg, uv, max_uv)
    }
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Raise(Domain, Vreg, u32),
    Lower(Domain, Vreg, u32),
    Failed(Domain, Vreg, RailError),
}

ringbuf!(Trace, 32, Trace::None);

/// The voltages a level needs, in microvolts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Vdd {
    pub core: u32,
    pub mem: u32,
    pub dig: u32,
}

/// Minimum voltage for a domain clocked from `speed`.
pub fn pll_vdd(speed: &CoreSpeed) -> u32 {
    if speed.src != Src::Hfpll {
        0
    } else if speed.pll_l_val > HFPLL_LOW_VDD_PLL_L_MAX {
        HFPLL_NOMINAL_VDD
    } else {
        HFPLL_LOW_VDD
    }
}

/// Works out what a CPU at `tgt` needs, with the L2 at `l2`. The digital
/// rail feeds the L2's PLL, so its floor comes from the L2 speed; the core
/// floor comes from the CPU's own speed.
pub fn required_vdd(tgt: &Level, l2: &L2Level) -> Vdd {
    Vdd {
        core: tgt.vdd_core().max(pll_vdd(&tgt.speed)),
        mem: l2.vdd_mem,
        dig: l2.vdd_dig.max(pll_vdd(&l2.speed)),
    }
}

/// What one domain last asked for on each rail.
#[derive(Debug)]
pub struct VddState {
    cur: EnumMap<Vreg, u32>,
    limits: VregLimits,
}

impl VddState {
    pub fn new(limits: VregLimits) -> Self {
        Self {
            cur: EnumMap::default(),
            limits,
        }
    }

    pub fn current(&self, vreg: Vreg) -> u32 {
        self.cur[vreg]
    }

    pub fn limit(&self, vreg: Vreg) -> u32 {
        self.limits.max(vreg)
    }

    /// Records a level set outside the sequencer (at bring-up, or by the PLL
    /// supply votes).
    pub(crate) fn note(&mut self, vreg: Vreg, uv: u32) {
        self.cur[vreg] = uv;
    }

    fn raise(
        &mut self,
        domain: Domain,
        vreg: Vreg,
        uv: u32,
        rails: &impl Rails,
    ) -> Result<(), DvfsError> {
        if uv <= self.cur[vreg] {
            return Ok(());
        }
        match rails.raise_rail(domain, vreg, uv, self.limits.max(vreg)) {
            Ok(()) => {
                ringbuf_entry!(Trace::Raise(domain, vreg, uv));
                self.cur[vreg] = uv;
                Ok(())
            }
            Err(e) => {
                ringbuf_entry!(Trace::Failed(domain, vreg, e));
                Err(DvfsError::Rail { domain, rail: vreg })
            }
        }
    }

    fn lower(
        &mut self,
        domain: Domain,
        vreg: Vreg,
        uv: u32,
        rails: &impl Rails,
    ) -> Result<(), DvfsError> {
        if uv >= self.cur[vreg] {
            return Ok(());
        }
        match rails.set_rail(domain, vreg, uv, self.limits.max(vreg)) {
            Ok(()) => {
                ringbuf_entry!(Trace::Lower(domain, vreg, uv));
                self.cur[vreg] = uv;
                Ok(())
            }
            Err(e) => {
                ringbuf_entry!(Trace::Failed(domain, vreg, e));
                Err(DvfsError::Rail { domain, rail: vreg })
            }
        }
    }

    /// Applies any increases needed to reach `tgt`.
    ///
    /// The core rail is left alone for hotplug transitions: those run on some
    /// other core, and the core rail can only be set from its owner. On the
    /// way down the rail is off anyway, and on the way up it was never
    /// lowered.
    pub fn increase(
        &mut self,
        domain: Domain,
        tgt: Vdd,
        reason: Reason,
        rails: &impl Rails,
    ) -> Result<(), DvfsError> {
        self.raise(domain, Vreg::Mem, tgt.mem, rails)?;
        self.raise(domain, Vreg::Dig, tgt.dig, rails)?;
        if reason != Reason::Hotplug {
            self.raise(domain, Vreg::Core, tgt.core, rails)?;
        }
        Ok(())
    }

    /// Applies any decreases allowed by `tgt`, in the reverse order of
    /// [`VddState::increase`].
    pub fn decrease(
        &mut self,
        domain: Domain,
        tgt: Vdd,
        reason: Reason,
        rails: &impl Rails,
    ) -> Result<(), DvfsError> {
        if reason != Reason::Hotplug {
            self.lower(domain, Vreg::Core, tgt.core, rails)?;
        }
        self.lower(domain, Vreg::Dig, tgt.dig, rails)?;
        self.lower(domain, Vreg::Mem, tgt.mem, rails)?;
        Ok(())
    }
}
