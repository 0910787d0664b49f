// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::sync::atomic::{AtomicU32, Ordering};
use ringbuf::*;

use crate::bin::{select_freq_plan, Bin, FreqPlan};
use crate::config::{Board, DvfsConfig};
use crate::hotplug::HotplugSave;
use crate::l2::{L2Domain, L2Votes};
use crate::speed::{ClockRegs, Scalable};
use crate::table::{FreqTable, MAX_LEVELS, STBY_KHZ};
use crate::vdd::{required_vdd, Rails, Vreg};
use crate::{
    BusBandwidth, Domain, DvfsError, Footprint, Reason, SecureFuse, Step,
};

/// Lowest core voltage an administrator may set.
pub const MIN_VDD_SC: u32 = 400_000;
/// Highest core voltage an administrator may set.
pub const MAX_VDD_SC: u32 = 1_350_000;

/// Time for raised rails to settle before reclocking.
const VDD_SETTLE_US: u32 = 60;

/// Which levels an administrative voltage change applies to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VddTarget {
    /// Every level but standby, as an offset from its current voltage.
    All,
    /// Only the level at this frequency, as an absolute voltage.
    Khz(u32),
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Init { bin: Bin, khz: u32, l2_khz: u32 },
    Offline(usize),
    CoreRailFailed(usize),
    Request { cpu: usize, khz: u32, reason: Reason },
    Unchanged(usize),
    Unknown(u32),
    Switch { cpu: usize, from: u32, to: u32 },
    L2 { vote: usize, effective: usize },
    BadTier(usize),
    BusFailed(usize),
    LowerFailed(usize, DvfsError),
    Done(usize, u32),
    VddOverride(VddTarget, i32),
    VddTable(usize),
}

ringbuf!(Trace, 64, Trace::None);

/// A CPU's clock domain and the state it parks across hotplug.
pub(crate) struct CpuDomain<C> {
    pub clk: Scalable<C>,
    pub saved: HotplugSave,
}

/// The frequency/voltage controller for `CPUS` cores and their shared L2.
pub struct Dvfs<C, P, F, const CPUS: usize> {
    board: &'static Board,
    bin: Bin,
    table: FreqTable,
    /// Serializes requests that may sleep, and admin changes to the table.
    driver_lock: spin::Mutex<()>,
    cpus: [spin::Mutex<CpuDomain<C>>; CPUS],
    /// Each CPU's current kHz, readable without its domain lock.
    rates: [AtomicU32; CPUS],
    l2: spin::Mutex<L2Domain<C, CPUS>>,
    power: P,
    footprint: F,
}

impl<C, P, F, const CPUS: usize> Dvfs<C, P, F, CPUS>
where
    C: ClockRegs,
    P: Rails + BusBandwidth,
    F: Footprint,
{
    /// Picks a table and brings every domain up at its fastest level.
    ///
    /// CPUs not set in `cfg.online` are left alone, parked at standby with
    /// the lowest L2 vote, until a hotplug event brings them in at the
    /// fastest level. For the ones that are, `cpu_regs` must reach the
    /// core's mux from wherever this runs.
    pub fn new(
        board: &'static Board,
        cfg: &DvfsConfig,
        fuse: &impl SecureFuse,
        cpu_regs: [C; CPUS],
        l2_regs: C,
        power: P,
        footprint: F,
    ) -> Self {
        let FreqPlan { bin, table, max } = select_freq_plan(board, fuse, cfg);
        let top = table.level(max);
        let l2_top = top.l2_level;
        let max_vdd = top.vdd_core();

        let mut l2 = Scalable::new(
            Domain::L2,
            l2_regs,
            board.l2_vreg,
            table.l2_speed_ref(0),
        );
        l2.init_clock_sources(table.l2_speed_ref(l2_top), &power);

        let mut votes = L2Votes::new();
        let mut cpu = 0;
        let mut rates = [(); CPUS].map(|_| AtomicU32::new(STBY_KHZ));
        let cpus = cpu_regs.map(|regs| {
            let domain = Domain::Cpu(cpu);
            let mut clk = Scalable::new(
                domain,
                regs,
                board.cpu_vreg,
                table.speed_ref(0),
            );

            let mut saved = HotplugSave::default();
            if cpu < 32 && cfg.online & (1 << cpu) != 0 {
                clk.init_clock_sources(table.speed_ref(max), &power);
                rates[cpu] = AtomicU32::new(top.speed.khz);
                votes.submit(cpu, l2_top, table.l2_levels().len());

                let limit = clk.vdd.limit(Vreg::Core);
                match power.set_rail(domain, Vreg::Core, max_vdd, limit) {
                    Ok(()) => clk.vdd.note(Vreg::Core, max_vdd),
                    Err(_) => ringbuf_entry!(Trace::CoreRailFailed(cpu)),
                }
            } else {
                // As if it had gone down from the top level.
                saved = HotplugSave {
                    khz: Some(top.speed.khz),
                    pri: top.speed.pri_src_sel,
                    sec: top.speed.sec_src_sel,
                };
                ringbuf_entry!(Trace::Offline(cpu));
            }

            cpu += 1;
            spin::Mutex::new(CpuDomain { clk, saved })
        });

        let this = Self {
            board,
            bin,
            table,
            driver_lock: spin::Mutex::new(()),
            cpus,
            rates,
            l2: spin::Mutex::new(L2Domain { votes, clk: l2 }),
            power,
            footprint,
        };

        this.set_bus_bw(board.bw_tiers_mbps.len().saturating_sub(1));

        ringbuf_entry!(Trace::Init {
            bin,
            khz: this.table.level(max).speed.khz,
            l2_khz: this.table.l2_level(l2_top).speed.khz,
        });
        this
    }

    pub fn bin(&self) -> Bin {
        self.bin
    }

    pub fn footprint(&self) -> &F {
        &self.footprint
    }

    pub(crate) fn cpu(
        &self,
        cpu: usize,
    ) -> Result<&spin::Mutex<CpuDomain<C>>, DvfsError> {
        self.cpus.get(cpu).ok_or(DvfsError::InvalidCpu)
    }

    /// The frequency `cpu` is running at, in kHz.
    ///
    /// Doesn't wait for a transition in progress on `cpu`; until that
    /// finishes switching the clock, this reports the old frequency.
    pub fn get_rate(&self, cpu: usize) -> Option<u32> {
        let khz = self.rates.get(cpu)?;
        Some(khz.load(Ordering::Relaxed))
    }

    /// The frequencies a governor may pick from, ascending.
    pub fn scaling_frequencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.table.scaling_frequencies()
    }

    /// Moves `cpu` to `khz`, which must be a frequency in the table.
    ///
    /// For [`Reason::PowerCollapse`] and [`Reason::Swfi`] only the clocks
    /// change; rails and bus votes are left where they are, to be sorted out
    /// by the next blocking request. On error the core stays at its
    /// previous frequency, though a rail that was raised before the failure
    /// stays raised.
    pub fn set_rate(
        &self,
        cpu: usize,
        khz: u32,
        reason: Reason,
    ) -> Result<(), DvfsError> {
        self.footprint.step(cpu, Step::Enter);
        ringbuf_entry!(Trace::Request { cpu, khz, reason });

        let rc = self.cpu(cpu).and_then(|dom| {
            let _serialized =
                reason.blocking().then(|| self.driver_lock.lock());
            self.footprint.step(cpu, Step::Locked);

            let mut dom = dom.lock();
            self.transition(cpu, &mut dom.clk, khz, reason)
        });

        self.footprint.step(cpu, Step::Exit);
        rc
    }

    fn transition(
        &self,
        cpu: usize,
        clk: &mut Scalable<C>,
        khz: u32,
        reason: Reason,
    ) -> Result<(), DvfsError> {
        let domain = Domain::Cpu(cpu);
        let strt = clk.current();

        if khz == strt.speed.khz && !clk.first_set_call {
            ringbuf_entry!(Trace::Unchanged(cpu));
            return Ok(());
        }

        let Some(idx) = self.table.find(khz) else {
            ringbuf_entry!(Trace::Unknown(khz));
            return Err(DvfsError::UnknownFrequency);
        };
        let tgt = self.table.level(idx);
        let vdd = required_vdd(tgt, self.table.l2_level(tgt.l2_level));

        if reason.blocking() {
            clk.vdd.increase(domain, vdd, reason, &self.power)?;
        }

        ringbuf_entry!(Trace::Switch {
            cpu,
            from: strt.speed.khz,
            to: khz
        });
        clk.settle(VDD_SETTLE_US);
        self.footprint.step(cpu, Step::Switching);

        clk.set_speed(self.table.speed_ref(idx), reason, &self.power);
        self.rates[cpu].store(khz, Ordering::Relaxed);
        self.footprint.cpu_khz(cpu, khz);
        self.footprint.step(cpu, Step::CpuSwitched);

        let bw_level = {
            let mut l2 = self.l2.lock();
            let levels = self.table.l2_levels().len();
            let effective = l2.votes.submit(cpu, tgt.l2_level, levels);
            ringbuf_entry!(Trace::L2 {
                vote: tgt.l2_level,
                effective
            });

            let l2_tgt = self.table.l2_speed_ref(effective);
            l2.clk.set_speed(l2_tgt, reason, &self.power);

            let level = self.table.l2_level(effective);
            self.footprint.l2_khz(level.speed.khz);
            self.footprint.step(cpu, Step::L2Switched);
            level.bw_level
        };

        if !reason.blocking() {
            return Ok(());
        }

        self.set_bus_bw(bw_level);
        self.footprint.step(cpu, Step::BusUpdated);

        // The new frequency is already in effect, so a rail that won't come
        // down is not the caller's problem.
        if let Err(e) = clk.vdd.decrease(domain, vdd, reason, &self.power) {
            ringbuf_entry!(Trace::LowerFailed(cpu, e));
        }
        self.footprint.step(cpu, Step::VddLowered);

        clk.first_set_call = false;
        ringbuf_entry!(Trace::Done(cpu, khz));
        Ok(())
    }

    fn set_bus_bw(&self, tier: usize) {
        if tier >= self.board.bw_tiers_mbps.len() {
            ringbuf_entry!(Trace::BadTier(tier));
            return;
        }
        if self.power.update_bandwidth_tier(tier).is_err() {
            ringbuf_entry!(Trace::BusFailed(tier));
        }
    }

    /// (kHz, core µV) for every level but standby, ascending.
    pub fn vdd_levels(&self) -> heapless::Vec<(u32, u32), MAX_LEVELS> {
        let _serialized = self.driver_lock.lock();
        self.table.levels()[1..]
            .iter()
            .map(|l| (l.speed.khz, l.vdd_core()))
            .collect()
    }

    /// Overrides table core voltages. Results are clamped to
    /// [`MIN_VDD_SC`]..=[`MAX_VDD_SC`]. Takes effect on the next
    /// transition into an affected level.
    pub fn set_vdd(&self, target: VddTarget, uv: i32) {
        let _serialized = self.driver_lock.lock();
        ringbuf_entry!(Trace::VddOverride(target, uv));

        for l in &self.table.levels()[1..] {
            let new = match target {
                VddTarget::All => i64::from(l.vdd_core()) + i64::from(uv),
                VddTarget::Khz(khz) if l.speed.khz == khz => i64::from(uv),
                VddTarget::Khz(_) => continue,
            };
            let new = new.clamp(i64::from(MIN_VDD_SC), i64::from(MAX_VDD_SC));
            l.set_vdd_core(new as u32);
        }
    }

    /// Replaces table core voltages wholesale, from millivolt values listed
    /// in the order of the table (after standby) or its reverse. Values out
    /// of range leave their level as it was.
    pub fn set_vdd_table(&self, mv: &[u32]) {
        let (Some(first), Some(last)) = (mv.first(), mv.last()) else {
            return;
        };
        let _serialized = self.driver_lock.lock();
        ringbuf_entry!(Trace::VddTable(mv.len()));

        let ascending = first < last;
        let levels = &self.table.levels()[1..];
        for (i, l) in levels.iter().enumerate().take(mv.len()) {
            let v = if ascending { mv[i] } else { mv[mv.len() - 1 - i] };
            let uv = v.saturating_mul(1000);
            if (MIN_VDD_SC..=MAX_VDD_SC).contains(&uv) {
                l.set_vdd_core(uv);
            }
        }
    }
}
