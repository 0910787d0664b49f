// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Crash footprints for clock transitions
//!
//! When a core wedges halfway through a frequency change, the only useful
//! question afterwards is "how far did it get?". A footprint answers that: as
//! a transition makes progress, each core stamps the step it has reached into
//! its own word of a [`Footprint`] sink, along with the last frequency it
//! switched its own clock (and the L2's) to.
//!
//! The words are write-only from the point of view of the running system and
//! are meant to be read from a post-mortem dump. Each core writes only its own
//! slot, so there is no locking; every store is followed by a full fence so a
//! footprint is never left sitting in a store buffer when the core dies.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{fence, AtomicU32, Ordering};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Marks a footprint word as written by us, rather than left over from
/// whatever the memory held at boot.
pub const FOOTPRINT_MAGIC: u32 = 0xACBD_FE00;

/// Progress markers for a single frequency transition, in the order they are
/// reached.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, FromPrimitive)]
#[repr(u8)]
pub enum Step {
    /// Request received, before any validation.
    Enter = 1,
    /// Serialization lock taken (or deliberately skipped).
    Locked = 2,
    /// Voltages raised; about to reprogram the core's clock.
    Switching = 3,
    /// Core clock switched.
    CpuSwitched = 4,
    /// L2 vote applied and L2 clock switched.
    L2Switched = 5,
    /// Bus bandwidth request updated.
    BusUpdated = 6,
    /// Voltages dropped to the new level.
    VddLowered = 7,
    /// Request complete, successfully or not.
    Exit = 8,
}

/// A place to leave footprints.
pub trait Footprint: Sync {
    fn step(&self, cpu: usize, step: Step);
    fn cpu_khz(&self, cpu: usize, khz: u32);
    fn l2_khz(&self, khz: u32);
}

/// For platforms with nowhere to put footprints.
impl Footprint for () {
    fn step(&self, _cpu: usize, _step: Step) {}
    fn cpu_khz(&self, _cpu: usize, _khz: u32) {}
    fn l2_khz(&self, _khz: u32) {}
}

/// Footprint storage for `N` cores.
///
/// On hardware this is placed (by the linker, or by constructing it over an
/// uncached mapping) somewhere that survives a warm reset.
pub struct FootprintRegion<const N: usize> {
    cpu_khz: [AtomicU32; N],
    l2_khz: AtomicU32,
    state: [AtomicU32; N],
}

impl<const N: usize> FootprintRegion<N> {
    #[allow(clippy::declare_interior_mutable_const)]
    const ZERO: AtomicU32 = AtomicU32::new(0);

    pub const fn new() -> Self {
        Self {
            cpu_khz: [Self::ZERO; N],
            l2_khz: AtomicU32::new(0),
            state: [Self::ZERO; N],
        }
    }

    /// Decodes the last step recorded for `cpu`, if that word looks like one
    /// of ours.
    pub fn last_step(&self, cpu: usize) -> Option<Step> {
        let word = self.state.get(cpu)?.load(Ordering::Relaxed);
        if word & !0xff != FOOTPRINT_MAGIC {
            return None;
        }
        Step::from_u32(word & 0xff)
    }

    pub fn last_cpu_khz(&self, cpu: usize) -> Option<u32> {
        self.cpu_khz.get(cpu).map(|w| w.load(Ordering::Relaxed))
    }

    pub fn last_l2_khz(&self) -> u32 {
        self.l2_khz.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for FootprintRegion<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Footprint for FootprintRegion<N> {
    fn step(&self, cpu: usize, step: Step) {
        if let Some(word) = self.state.get(cpu) {
            word.store(FOOTPRINT_MAGIC | step as u32, Ordering::Relaxed);
            fence(Ordering::SeqCst);
        }
    }

    fn cpu_khz(&self, cpu: usize, khz: u32) {
        if let Some(word) = self.cpu_khz.get(cpu) {
            word.store(khz, Ordering::Relaxed);
            fence(Ordering::SeqCst);
        }
    }

    fn l2_khz(&self, khz: u32) {
        self.l2_khz.store(khz, Ordering::Relaxed);
        fence(Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_region_decodes_nothing() {
        let fp = FootprintRegion::<2>::new();
        assert_eq!(fp.last_step(0), None);
        assert_eq!(fp.last_step(5), None);
    }

    #[test]
    fn steps_are_per_cpu() {
        let fp = FootprintRegion::<2>::new();
        fp.step(0, Step::Enter);
        fp.step(1, Step::L2Switched);
        fp.cpu_khz(1, 918_000);
        fp.l2_khz(1_134_000);

        assert_eq!(fp.last_step(0), Some(Step::Enter));
        assert_eq!(fp.last_step(1), Some(Step::L2Switched));
        assert_eq!(fp.last_cpu_khz(0), Some(0));
        assert_eq!(fp.last_cpu_khz(1), Some(918_000));
        assert_eq!(fp.last_l2_khz(), 1_134_000);

        // Out-of-range cores are ignored rather than faulting.
        fp.step(2, Step::Exit);
        fp.cpu_khz(2, 1);
        assert_eq!(fp.last_cpu_khz(2), None);
    }
}
