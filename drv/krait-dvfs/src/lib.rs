// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Krait CPU and L2 frequency/voltage scaling.
//!
//! Each CPU core and the shared L2 has its own clock mux and HFPLL. A CPU
//! asks for a frequency with [`Dvfs::set_rate`]; the driver works out the
//! voltages that frequency needs, raises them, reprograms the core's clock,
//! votes the L2 up (or down) to match, and finally drops any voltage the new
//! level no longer needs.
//!
//! Hardware is reached only through traits: [`speed::ClockRegs`] for each
//! domain's registers, [`vdd::Rails`] and [`BusBandwidth`] for the shared
//! power and bus resources, [`SecureFuse`] for the speed bin, and
//! [`Footprint`] for crash breadcrumbs.
//!
//! # Locking
//!
//! Requests made for frequency scaling or hotplug ([`Reason::CpuFreq`],
//! [`Reason::Hotplug`]) may sleep on a rail, and are serialized by the
//! transition lock. Idle paths ([`Reason::PowerCollapse`], [`Reason::Swfi`])
//! skip it and touch no rails. Both take the vote lock around the L2 update,
//! which is never held across anything that sleeps. The order is transition,
//! then CPU, then vote.

#![cfg_attr(not(test), no_std)]

pub mod bin;
pub mod config;
mod dvfs;
mod hotplug;
pub mod l2;
pub mod msm8960;
pub mod speed;
pub mod table;
pub mod vdd;

#[cfg(test)]
mod sim;

pub use bin::Bin;
pub use config::{Board, DvfsConfig, VregLimits};
pub use dvfs::{Dvfs, VddTarget, MAX_VDD_SC, MIN_VDD_SC};
pub use footprint::{Footprint, FootprintRegion, Step};
pub use hotplug::HotplugEvent;

/// A clock domain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    Cpu(usize),
    L2,
}

/// Why a rate change was asked for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reason {
    /// Ordinary frequency scaling.
    CpuFreq,
    /// A core coming or going. Runs on some other core.
    Hotplug,
    /// About to power-collapse. Runs on the core itself, must not sleep.
    PowerCollapse,
    /// About to wait for interrupt. Same constraints as power collapse.
    Swfi,
}

impl Reason {
    /// Whether this request may sleep, and so takes the transition lock and
    /// adjusts rails.
    pub fn blocking(self) -> bool {
        matches!(self, Reason::CpuFreq | Reason::Hotplug)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DvfsError {
    /// No such CPU.
    InvalidCpu,
    /// The frequency is not in the table.
    UnknownFrequency,
    /// A rail could not be raised; nothing was reclocked.
    Rail { domain: Domain, rail: vdd::Vreg },
    /// A core is coming up but never went down through us.
    NoSavedRate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusError {
    BadTier,
    Rejected,
}

/// The bus-scaling client this driver registers with.
pub trait BusBandwidth: Sync {
    /// Requests bandwidth tier `tier`. May sleep.
    fn update_bandwidth_tier(&self, tier: usize) -> Result<(), BusError>;
}

/// Secure-world access to the fuses.
pub trait SecureFuse {
    fn read_pte_efuse(&self) -> u32;
}
