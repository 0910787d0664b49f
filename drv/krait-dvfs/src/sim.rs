// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated SoC for host tests.
//!
//! Every register write, delay, rail vote and bus request from every domain
//! lands in one ordered log, so tests can check cross-domain ordering.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::msm8960::{BOARD, NUM_CPUS};
use crate::speed::{ClockRegs, HfpllReg};
use crate::vdd::{RailError, Rails, Vreg};
use crate::{
    BusBandwidth, BusError, Domain, Dvfs, DvfsConfig, FootprintRegion,
    SecureFuse,
};

/// PVS code 3 in the primary field.
pub const FAST_EFUSE: u32 = 3 << 10;

pub const ALL_ONLINE: DvfsConfig = DvfsConfig {
    max_khz: None,
    forced_bin: None,
    midr: 0,
    online: (1 << NUM_CPUS) - 1,
};

pub type SimDvfs = Dvfs<SimRegs, Sim, FootprintRegion<NUM_CPUS>, NUM_CPUS>;

/// Brings up an MSM8960 fast-bin part on `sim`.
pub fn bring_up(sim: &Sim, cfg: DvfsConfig) -> SimDvfs {
    Dvfs::new(
        &BOARD,
        &cfg,
        &Fuse(FAST_EFUSE),
        core::array::from_fn(|cpu| sim.regs(Domain::Cpu(cpu))),
        sim.regs(Domain::L2),
        sim.clone(),
        FootprintRegion::new(),
    )
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Mux(Domain, u32),
    Pll(Domain, HfpllReg, u32),
    Aux(Domain, u32),
    Settle(Domain, u32),
    Rail(Domain, Vreg, u32),
    Bw(usize),
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    mux: Vec<(Domain, u32)>,
    aux: Vec<(Domain, u32)>,
    failing: Vec<(Domain, Vreg)>,
    bus_fails: bool,
    bw_tiers: usize,
}

impl State {
    fn mux(&self, d: Domain) -> u32 {
        self.mux
            .iter()
            .find(|(dd, _)| *dd == d)
            .map_or(0, |(_, v)| *v)
    }

    fn set_mux(&mut self, d: Domain, val: u32) {
        match self.mux.iter_mut().find(|(dd, _)| *dd == d) {
            Some(slot) => slot.1 = val,
            None => self.mux.push((d, val)),
        }
    }
}

fn split(raw: u32) -> (u32, u32) {
    (raw & 0x3, (raw >> 2) & 0x3)
}

/// Handle on the simulated SoC. Clones share state.
#[derive(Clone)]
pub struct Sim(Arc<Mutex<State>>);

impl Sim {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(State {
            bw_tiers: 11,
            ..State::default()
        })))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    pub fn regs(&self, domain: Domain) -> SimRegs {
        SimRegs {
            domain,
            sim: self.clone(),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clear(&self) {
        self.state().events.clear();
    }

    /// Makes every future vote on `vreg` from `domain` fail.
    pub fn fail_rail(&self, domain: Domain, vreg: Vreg) {
        self.state().failing.push((domain, vreg));
    }

    pub fn heal_rails(&self) {
        self.state().failing.clear();
    }

    pub fn fail_bus(&self, fail: bool) {
        self.state().bus_fails = fail;
    }

    /// Presets a mux register without logging a write.
    pub fn set_mux(&self, domain: Domain, raw: u32) {
        self.state().set_mux(domain, raw);
    }

    pub fn raw_mux(&self, domain: Domain) -> u32 {
        self.state().mux(domain)
    }

    /// Current (primary, secondary) selection.
    pub fn mux(&self, domain: Domain) -> (u32, u32) {
        split(self.raw_mux(domain))
    }

    /// (primary, secondary) selection as it stood just before event `idx`,
    /// assuming the register started out zero.
    pub fn mux_at(&self, domain: Domain, idx: usize) -> (u32, u32) {
        let raw = self.state().events[..idx]
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::Mux(d, v) if *d == domain => Some(*v),
                _ => None,
            })
            .unwrap_or(0);
        split(raw)
    }

    pub fn mux_writes(&self, domain: Domain) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Mux(d, _) if *d == domain))
            .count()
    }

    pub fn aux(&self, domain: Domain) -> Option<u32> {
        let st = self.state();
        st.aux.iter().find(|(d, _)| *d == domain).map(|(_, v)| *v)
    }

    /// Last value successfully voted on `vreg` by `domain`.
    pub fn rail(&self, domain: Domain, vreg: Vreg) -> Option<u32> {
        self.state().events.iter().rev().find_map(|e| match e {
            Event::Rail(d, v, uv) if *d == domain && *v == vreg => Some(*uv),
            _ => None,
        })
    }

    pub fn last_bw(&self) -> Option<usize> {
        self.state().events.iter().rev().find_map(|e| match e {
            Event::Bw(t) => Some(*t),
            _ => None,
        })
    }
}

impl Rails for Sim {
    fn set_rail(
        &self,
        domain: Domain,
        vreg: Vreg,
        uv: u32,
        max_uv: u32,
    ) -> Result<(), RailError> {
        let mut st = self.state();
        if st.failing.contains(&(domain, vreg)) {
            return Err(RailError::Rejected);
        }
        if uv > max_uv {
            return Err(RailError::OutOfRange);
        }
        st.events.push(Event::Rail(domain, vreg, uv));
        Ok(())
    }
}

impl BusBandwidth for Sim {
    fn update_bandwidth_tier(&self, tier: usize) -> Result<(), BusError> {
        let mut st = self.state();
        if tier >= st.bw_tiers {
            return Err(BusError::BadTier);
        }
        if st.bus_fails {
            return Err(BusError::Rejected);
        }
        st.events.push(Event::Bw(tier));
        Ok(())
    }
}

/// A fixed efuse word.
pub struct Fuse(pub u32);

impl SecureFuse for Fuse {
    fn read_pte_efuse(&self) -> u32 {
        self.0
    }
}

pub struct SimRegs {
    domain: Domain,
    sim: Sim,
}

impl ClockRegs for SimRegs {
    fn read_mux(&self) -> u32 {
        self.sim.raw_mux(self.domain)
    }

    fn write_mux(&mut self, val: u32) {
        let mut st = self.sim.state();
        st.set_mux(self.domain, val);
        st.events.push(Event::Mux(self.domain, val));
    }

    fn program_pll(&mut self, reg: HfpllReg, val: u32) {
        self.sim
            .state()
            .events
            .push(Event::Pll(self.domain, reg, val));
    }

    fn select_aux(&mut self, val: u32) {
        let mut st = self.sim.state();
        let d = self.domain;
        st.aux.retain(|(dd, _)| *dd != d);
        st.aux.push((d, val));
        st.events.push(Event::Aux(d, val));
    }

    fn settle(&mut self, us: u32) {
        self.sim.state().events.push(Event::Settle(self.domain, us));
    }
}
