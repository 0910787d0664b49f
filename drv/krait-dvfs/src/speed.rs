// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clock-source programming for a single domain.
//!
//! Every domain (each CPU, and the L2) has a two-stage clock mux and its own
//! HFPLL:
//!
//! ```text
//!   QSB ──┐
//!   aux ──┤ secondary ──┐
//!         └─────────────┤
//!   HFPLL ──────────────┤ primary ──► domain clock
//!   HFPLL/2 ────────────┘
//! ```
//!
//! The aux input is PLL8, which is always running. The HFPLL can only be
//! reprogrammed while nothing is clocked from it.

use bitfield::bitfield;
use bitflags::bitflags;
use ringbuf::*;

use crate::config::VregLimits;
use crate::table::{CoreSpeed, SpeedRef, Src};
use crate::vdd::{Rails, VddState, Vreg};
use crate::{Domain, Reason};

/// Primary mux: take the secondary mux's output.
pub const PRI_SRC_SEL_SEC_SRC: u32 = 0;
pub const PRI_SRC_SEL_HFPLL: u32 = 1;
pub const PRI_SRC_SEL_HFPLL_DIV2: u32 = 2;
/// Secondary mux: the QSB standby source.
pub const SEC_SRC_SEL_QSB: u32 = 0;
/// Secondary mux: the aux input (PLL8).
pub const SEC_SRC_SEL_AUX: u32 = 2;

/// Aux mux setting that feeds PLL8 to the secondary mux.
const AUX_CLK_SEL_PLL8: u32 = 0x3;

/// HFPLL supply votes while the PLL is running.
pub const HFPLL_A_UV: u32 = 2_100_000;
pub const HFPLL_B_UV: u32 = 1_800_000;

// Integer-mode HFPLL setup, written once at bring-up.
const HFPLL_CONFIG_CTL_VAL: u32 = 0x7845_C665;
const HFPLL_DROOP_CTL_VAL: u32 = 0x0108_C000;

/// Bypass-off to reset-release, per the PLL datasheet (5us) with margin.
const HFPLL_BYPASS_DELAY_US: u32 = 10;
/// Reset-release to output-enable: the PLL's lock time.
const HFPLL_LOCK_DELAY_US: u32 = 60;
/// Time for a mux switch to take effect.
const MUX_SWITCH_DELAY_US: u32 = 1;

/// HFPLL register block, by byte offset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum HfpllReg {
    Mode = 0x00,
    ConfigCtl = 0x04,
    LVal = 0x08,
    MVal = 0x0C,
    NVal = 0x10,
    DroopCtl = 0x14,
}

bitflags! {
    /// `HFPLL_MODE` register.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct HfpllMode: u32 {
        const OUTCTRL = 1 << 0;
        const BYPASSNL = 1 << 1;
        const RESET_N = 1 << 2;
    }
}

bitfield! {
    /// The clock power-management register (`L2CPMR` for the L2,
    /// `L2CPUCPMR` for a CPU), which holds both mux selects.
    #[derive(Copy, Clone, PartialEq)]
    pub struct Cpmr(u32);
    pri_src_sel, set_pri_src_sel: 1, 0;
    sec_src_sel, set_sec_src_sel: 3, 2;
    /// Disables secondary-source clock gating while set.
    sec_clk_agd, set_sec_clk_agd: 4;
    hfpll_div, set_hfpll_div: 7, 6;
}

/// Access to one domain's clock hardware.
///
/// For a CPU, the mux register is a CP15 indirect register and can only be
/// reached from that CPU. The HFPLL and aux mux are memory-mapped and can be
/// written from anywhere.
pub trait ClockRegs: Send {
    fn read_mux(&self) -> u32;
    fn write_mux(&mut self, val: u32);
    fn program_pll(&mut self, reg: HfpllReg, val: u32);
    fn select_aux(&mut self, val: u32);
    /// Barrier, then busy-wait `us` microseconds.
    fn settle(&mut self, us: u32);
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Switch(Domain, u32, u32),
    PriSrc(Domain, u32),
    SecSrc(Domain, u32),
    PllOn(Domain, u32),
    PllOff(Domain),
    PllSupplyFailed(Domain, Vreg),
    InitClock(Domain, u32),
}

ringbuf!(Trace, 64, Trace::None);

/// State of one clock domain.
pub struct Scalable<C> {
    pub(crate) domain: Domain,
    regs: C,
    cur: SpeedRef,
    pub(crate) vdd: VddState,
    /// Set at bring-up so the first request goes all the way through, even
    /// if it names the speed we are already at.
    pub(crate) first_set_call: bool,
    /// HFPLL configuration registers have been written.
    pll_ready: bool,
    /// Aux source picked and the HFPLL divider cleared.
    mux_ready: bool,
}

impl<C: ClockRegs> Scalable<C> {
    /// Wraps a domain's hardware. Nothing is written until
    /// [`Scalable::init_clock_sources`].
    pub fn new(
        domain: Domain,
        regs: C,
        limits: VregLimits,
        cur: SpeedRef,
    ) -> Self {
        Self {
            domain,
            regs,
            cur,
            vdd: VddState::new(limits),
            first_set_call: false,
            pll_ready: false,
            mux_ready: false,
        }
    }

    pub fn current(&self) -> SpeedRef {
        self.cur
    }

    pub(crate) fn settle(&mut self, us: u32) {
        self.regs.settle(us);
    }

    /// The CPU mux registers are only reachable from the CPU itself, so a
    /// hotplug transition (which runs elsewhere) must leave them alone. The
    /// L2's are reachable from everywhere.
    fn may_touch_mux(&self, reason: Reason) -> bool {
        reason != Reason::Hotplug || self.domain == Domain::L2
    }

    fn set_pri_clk_src(&mut self, sel: u32) {
        let mut cpmr = Cpmr(self.regs.read_mux());
        cpmr.set_pri_src_sel(sel);
        self.regs.write_mux(cpmr.0);
        self.regs.settle(MUX_SWITCH_DELAY_US);
        ringbuf_entry!(Trace::PriSrc(self.domain, sel));
    }

    fn set_sec_clk_src(&mut self, sel: u32) {
        // Secondary-source clock gating has to be off across the switch.
        let mut cpmr = Cpmr(self.regs.read_mux());
        cpmr.set_sec_clk_agd(true);
        self.regs.write_mux(cpmr.0);

        cpmr.set_sec_src_sel(sel);
        self.regs.write_mux(cpmr.0);
        self.regs.settle(MUX_SWITCH_DELAY_US);

        cpmr.set_sec_clk_agd(false);
        self.regs.write_mux(cpmr.0);
        ringbuf_entry!(Trace::SecSrc(self.domain, sel));
    }

    /// Current (primary, secondary) mux selections.
    pub(crate) fn mux_sources(&self) -> (u32, u32) {
        let cpmr = Cpmr(self.regs.read_mux());
        (cpmr.pri_src_sel(), cpmr.sec_src_sel())
    }

    /// Parks both muxes on QSB, as required before an L2 power collapse.
    pub(crate) fn park_mux_on_qsb(&mut self) {
        self.set_sec_clk_src(SEC_SRC_SEL_QSB);
        self.set_pri_clk_src(PRI_SRC_SEL_SEC_SRC);
    }

    /// Puts the muxes back on `pri`/`sec`. A core that missed bring-up
    /// gets its mux setup done here, since this runs on the core itself.
    pub(crate) fn restore_mux(&mut self, pri: u32, sec: u32) {
        if !self.mux_ready {
            self.configure_mux();
        }
        self.set_sec_clk_src(sec);
        self.set_pri_clk_src(pri);
    }

    fn vote_pll_supply(&mut self, vreg: Vreg, uv: u32, rails: &impl Rails) {
        let max = if uv == 0 { 0 } else { self.vdd.limit(vreg) };
        match rails.set_rail(self.domain, vreg, uv, max) {
            Ok(()) => self.vdd.note(vreg, uv),
            Err(_) => {
                ringbuf_entry!(Trace::PllSupplyFailed(self.domain, vreg));
            }
        }
    }

    /// Turns on an already-configured HFPLL.
    fn hfpll_enable(&mut self, rails: &impl Rails) {
        self.vote_pll_supply(Vreg::HfpllA, HFPLL_A_UV, rails);
        self.vote_pll_supply(Vreg::HfpllB, HFPLL_B_UV, rails);

        self.regs
            .program_pll(HfpllReg::Mode, HfpllMode::BYPASSNL.bits());
        self.regs.settle(HFPLL_BYPASS_DELAY_US);

        // Reset is active-low.
        self.regs.program_pll(
            HfpllReg::Mode,
            (HfpllMode::BYPASSNL | HfpllMode::RESET_N).bits(),
        );
        self.regs.settle(HFPLL_LOCK_DELAY_US);

        self.regs.program_pll(HfpllReg::Mode, HfpllMode::all().bits());
    }

    /// Output off, bypass on, reset asserted; then drop the supply votes.
    fn hfpll_disable(&mut self, rails: &impl Rails) {
        self.regs
            .program_pll(HfpllReg::Mode, HfpllMode::empty().bits());

        self.vote_pll_supply(Vreg::HfpllB, 0, rails);
        self.vote_pll_supply(Vreg::HfpllA, 0, rails);
        ringbuf_entry!(Trace::PllOff(self.domain));
    }

    /// Assumes the HFPLL is already disabled.
    fn configure_hfpll(&mut self) {
        self.regs
            .program_pll(HfpllReg::ConfigCtl, HFPLL_CONFIG_CTL_VAL);
        self.regs.program_pll(HfpllReg::MVal, 0);
        self.regs.program_pll(HfpllReg::NVal, 1);
        self.regs.program_pll(HfpllReg::DroopCtl, HFPLL_DROOP_CTL_VAL);
        self.pll_ready = true;
    }

    fn configure_mux(&mut self) {
        self.regs.select_aux(AUX_CLK_SEL_PLL8);

        // HFPLL_DIV2 divides by two.
        let mut cpmr = Cpmr(self.regs.read_mux());
        cpmr.set_hfpll_div(0);
        self.regs.write_mux(cpmr.0);
        self.mux_ready = true;
    }

    /// Assumes the HFPLL is already disabled.
    fn hfpll_set_rate(&mut self, tgt: &CoreSpeed) {
        self.regs.program_pll(HfpllReg::LVal, tgt.pll_l_val);
        ringbuf_entry!(Trace::PllOn(self.domain, tgt.pll_l_val));
    }

    /// Moves the domain to `tgt`.
    pub fn set_speed(
        &mut self,
        tgt: SpeedRef,
        reason: Reason,
        rails: &impl Rails,
    ) {
        let strt = self.cur;
        if tgt.idx == strt.idx {
            return;
        }

        ringbuf_entry!(Trace::Switch(
            self.domain,
            strt.speed.khz,
            tgt.speed.khz
        ));

        let mux = self.may_touch_mux(reason);
        match (strt.speed.src, tgt.speed.src) {
            (Src::Hfpll, Src::Hfpll) => {
                // Ride out the relock on PLL8, which never needs more than
                // the voltage we already have.
                self.set_sec_clk_src(SEC_SRC_SEL_AUX);
                self.set_pri_clk_src(PRI_SRC_SEL_SEC_SRC);

                self.hfpll_disable(rails);
                self.hfpll_set_rate(&tgt.speed);
                self.hfpll_enable(rails);

                self.set_pri_clk_src(tgt.speed.pri_src_sel);
            }
            (Src::Hfpll, _) => {
                // If the CPU is already dead its clock can simply be halted,
                // so the PLL still goes off even when the mux is off limits.
                if mux {
                    self.set_sec_clk_src(tgt.speed.sec_src_sel);
                    self.set_pri_clk_src(tgt.speed.pri_src_sel);
                }
                self.hfpll_disable(rails);
            }
            (_, Src::Hfpll) => {
                if !self.pll_ready {
                    // Whatever the bootloader left running goes off first.
                    self.regs
                        .program_pll(HfpllReg::Mode, HfpllMode::empty().bits());
                    self.configure_hfpll();
                }
                self.hfpll_set_rate(&tgt.speed);
                self.hfpll_enable(rails);
                // On the way back up the mux was never moved off the PLL, so
                // leaving it alone here is correct too.
                if mux {
                    self.set_pri_clk_src(tgt.speed.pri_src_sel);
                }
            }
            _ => {
                if mux {
                    self.set_sec_clk_src(tgt.speed.sec_src_sel);
                }
            }
        }

        self.cur = tgt;
    }

    /// Brings the domain's clocks from whatever the bootloader left to
    /// `tgt`, initialising the HFPLL on the way.
    pub fn init_clock_sources(&mut self, tgt: SpeedRef, rails: &impl Rails) {
        ringbuf_entry!(Trace::InitClock(self.domain, tgt.speed.khz));

        self.regs.select_aux(AUX_CLK_SEL_PLL8);

        self.set_sec_clk_src(SEC_SRC_SEL_AUX);
        self.set_pri_clk_src(PRI_SRC_SEL_SEC_SRC);

        self.hfpll_disable(rails);
        self.configure_hfpll();
        self.hfpll_set_rate(&tgt.speed);
        self.hfpll_enable(rails);

        let mut cpmr = Cpmr(self.regs.read_mux());
        cpmr.set_hfpll_div(0);
        self.regs.write_mux(cpmr.0);
        self.mux_ready = true;

        self.set_sec_clk_src(tgt.speed.sec_src_sel);
        self.set_pri_clk_src(tgt.speed.pri_src_sel);

        self.cur = tgt;
        self.first_set_call = true;
    }
}
