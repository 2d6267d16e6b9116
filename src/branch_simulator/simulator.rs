// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// simulator.rs
//
// This file contains the branch prediction simulator: the drive loop that
// walks a branch trace with one record of lookahead, charges BTB and
// prediction cycles, and accumulates the run statistics.

use std::fmt;

use log::{debug, info};
use serde::Serialize;

use super::btb::BranchTargetBuffer;
use super::config::{
    BranchPredictorType, BTB_HIT_CYCLES, BTB_MISS_CYCLES, BTB_MISS_PREDICTED_CYCLES,
};
use super::predictor::Predictor;
use crate::errors::SimulatorError;
use crate::trace::reader::{BranchRecord, TraceReader};

/// Run statistics of the branch simulator.
///
/// `hits`, `misses` and `mispredicts` count events; the printed `Acum_*`
/// values are in cycle units (each miss costs 5 cycles, each mispredict 4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchStats {
    pub cycles: u64,
    pub hits: u64,
    pub misses: u64,
    pub mispredicts: u64,
}

impl BranchStats {
    /// Fraction of evaluated predictions that were right.
    pub fn accuracy(&self) -> f64 {
        let evaluated = self.hits + self.mispredicts;
        if evaluated == 0 {
            0.0
        } else {
            self.hits as f64 / evaluated as f64
        }
    }
}

impl fmt::Display for BranchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f, "Acum_hit: {}", self.hits * BTB_HIT_CYCLES)?;
        writeln!(f, "Acum_miss: {}", self.misses * BTB_MISS_CYCLES)?;
        write!(
            f,
            "Acum_miss_pred: {}",
            self.mispredicts * BTB_MISS_PREDICTED_CYCLES
        )
    }
}

/// Trace-driven branch prediction simulator.
///
/// The engine owns the BTB and the active predictor; all tables are sized at
/// construction. Cycles are charged eagerly: one per non-branch record, and
/// the BTB miss / hit / mispredict penalty per branch event.
pub struct Simulator {
    btb: BranchTargetBuffer,
    predictor: Predictor,
    stats: BranchStats,
    /// Echo each decoded record to stdout before accounting.
    pub verbose: bool,
}

impl Simulator {
    pub fn new(predictor_type: BranchPredictorType) -> Self {
        info!("Branch simulator using {:?} predictor", predictor_type);

        Self {
            btb: BranchTargetBuffer::new(),
            predictor: Predictor::new(predictor_type),
            stats: BranchStats::default(),
            verbose: false,
        }
    }

    pub fn stats(&self) -> &BranchStats {
        &self.stats
    }

    /// Drive the whole trace through the BTB and the active predictor.
    ///
    /// The loop keeps one record of lookahead: evaluating a conditional
    /// branch needs the next fetched address, so its successor is pre-read
    /// and becomes the current record of the following iteration.
    pub fn run(
        &mut self,
        trace: &mut TraceReader<BranchRecord>,
    ) -> Result<&BranchStats, SimulatorError> {
        let mut pending: Option<BranchRecord> = None;

        loop {
            let current = match pending.take() {
                Some(record) => record,
                None => match trace.next_record()? {
                    Some(record) => record,
                    None => break,
                },
            };

            pending = self.step(current, trace)?;
        }

        info!(
            "Branch simulation finished: {} cycles, accuracy {:.4}",
            self.stats.cycles,
            self.stats.accuracy()
        );
        Ok(&self.stats)
    }

    // Account one record. Returns the pre-read successor, if one was needed.
    fn step(
        &mut self,
        current: BranchRecord,
        trace: &mut TraceReader<BranchRecord>,
    ) -> Result<Option<BranchRecord>, SimulatorError> {
        if self.verbose {
            println!("{}", current);
        }

        if !current.is_branch() {
            self.stats.cycles += 1;
            return Ok(None);
        }

        let installed = self.btb.install_if_missing(current.address);
        if installed {
            debug!("BTB install for branch at {}", current.address);
            self.stats.misses += 1;
            self.stats.cycles += BTB_MISS_CYCLES;
        }

        if !current.is_conditional {
            // Unconditional branches are always taken and trust the stored
            // target; after install accounting they simply charge a hit.
            if !installed {
                self.stats.hits += 1;
                self.stats.cycles += BTB_HIT_CYCLES;
            }
            return Ok(None);
        }

        // Conditional: the outcome is only visible in the next fetch. At end
        // of trace there is no successor; nothing further is charged.
        let next = match trace.next_record()? {
            Some(record) => record,
            None => return Ok(None),
        };

        if !installed {
            let entry = self.btb.entry_mut(current.address);
            if self.predictor.predict_and_update(entry, &current, next.address) {
                self.stats.hits += 1;
                self.stats.cycles += BTB_HIT_CYCLES;
            } else {
                self.stats.mispredicts += 1;
                self.stats.cycles += BTB_MISS_PREDICTED_CYCLES;
            }
        }

        if next.address != current.fall_through() {
            self.btb.entry_mut(current.address).target = next.address;
        }

        Ok(Some(next))
    }
}
