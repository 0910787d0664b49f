// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared L2 domain.
//!
//! Every CPU votes for an L2 level; the L2 runs at the highest vote. Votes
//! and the L2 clock live behind one lock (the vote lock), which is taken on
//! every transition path, idle paths included, and so never sleeps.

use ringbuf::*;

use crate::speed::Scalable;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Vote { cpu: usize, vote: usize, effective: usize },
}

ringbuf!(Trace, 32, Trace::None);

/// The L2 level each CPU last asked for.
#[derive(Debug)]
pub struct L2Votes<const CPUS: usize> {
    votes: [usize; CPUS],
}

impl<const CPUS: usize> L2Votes<CPUS> {
    /// Every core starts out voting for the lowest level.
    pub const fn new() -> Self {
        Self { votes: [0; CPUS] }
    }

    pub fn vote(&self, cpu: usize) -> usize {
        self.votes[cpu]
    }

    /// Records `cpu`'s vote and returns the level the L2 should now run at.
    ///
    /// # Panics
    ///
    /// If `vote` is not below `levels`, which means the board tables point
    /// outside the L2 table.
    pub fn submit(&mut self, cpu: usize, vote: usize, levels: usize) -> usize {
        if vote >= levels {
            panic!("L2 vote {vote} from CPU{cpu} out of range");
        }
        self.votes[cpu] = vote;

        let effective = self.effective();
        ringbuf_entry!(Trace::Vote {
            cpu,
            vote,
            effective
        });
        effective
    }

    pub fn effective(&self) -> usize {
        self.votes.iter().copied().max().unwrap_or(0)
    }
}

impl<const CPUS: usize> Default for L2Votes<CPUS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the vote lock protects.
pub struct L2Domain<C, const CPUS: usize> {
    pub votes: L2Votes<CPUS>,
    pub clk: Scalable<C>,
}
