// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CPU hotplug.
//!
//! A core going down is parked at standby and its rate remembered; coming
//! back, it is put back where it was. The L2 is power-collapsed along with
//! the last core, and its muxes have to be on QSB when that happens, so the
//! dying core parks its own muxes and restores them when it starts again.

use ringbuf::*;

use crate::dvfs::Dvfs;
use crate::speed::ClockRegs;
use crate::table::STBY_KHZ;
use crate::vdd::Rails;
use crate::{BusBandwidth, DvfsError, Footprint, Reason};

/// Hotplug notifications, in the order a core sees them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HotplugEvent {
    /// Last thing a dying core runs. Delivered on that core.
    Dying,
    /// The core is gone.
    Dead,
    /// A core that was being brought up will not be.
    UpCanceled,
    /// A core is about to be brought up.
    UpPrepare,
    /// First thing a starting core runs. Delivered on that core.
    Starting,
}

/// What a core leaves behind when it goes down.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct HotplugSave {
    pub khz: Option<u32>,
    pub pri: u32,
    pub sec: u32,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Event(usize, HotplugEvent),
    SavedMux(usize, u32, u32),
    SavedRate(usize, u32),
    NoSavedRate(usize),
}

ringbuf!(Trace, 16, Trace::None);

impl<C, P, F, const CPUS: usize> Dvfs<C, P, F, CPUS>
where
    C: ClockRegs,
    P: Rails + BusBandwidth,
    F: Footprint,
{
    /// Handles a hotplug notification for `cpu`.
    pub fn cpu_callback(
        &self,
        cpu: usize,
        event: HotplugEvent,
    ) -> Result<(), DvfsError> {
        let dom = self.cpu(cpu)?;
        ringbuf_entry!(Trace::Event(cpu, event));

        match event {
            HotplugEvent::Dying => {
                let mut dom = dom.lock();
                let (pri, sec) = dom.clk.mux_sources();
                dom.saved.pri = pri;
                dom.saved.sec = sec;
                dom.clk.park_mux_on_qsb();
                ringbuf_entry!(Trace::SavedMux(cpu, pri, sec));
                Ok(())
            }
            HotplugEvent::Dead => {
                let khz = {
                    let mut dom = dom.lock();
                    let khz = dom.clk.current().speed.khz;
                    dom.saved.khz = Some(khz);
                    khz
                };
                ringbuf_entry!(Trace::SavedRate(cpu, khz));
                self.set_rate(cpu, STBY_KHZ, Reason::Hotplug)
            }
            HotplugEvent::UpCanceled => {
                self.set_rate(cpu, STBY_KHZ, Reason::Hotplug)
            }
            HotplugEvent::UpPrepare => {
                let saved = dom.lock().saved.khz;
                let Some(khz) = saved else {
                    ringbuf_entry!(Trace::NoSavedRate(cpu));
                    return Err(DvfsError::NoSavedRate);
                };
                self.set_rate(cpu, khz, Reason::Hotplug)
            }
            HotplugEvent::Starting => {
                let mut dom = dom.lock();
                let HotplugSave { pri, sec, .. } = dom.saved;
                dom.clk.restore_mux(pri, sec);
                Ok(())
            }
        }
    }
}
