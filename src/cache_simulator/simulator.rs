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
// This file contains the cache hierarchy simulator: the drive loop that
// charges one cycle per trace record, runs every non-zero register slot
// through the L1 -> L2 -> DRAM lookup chain, and hands each finished lookup
// to the active prefetcher.

use log::info;

use super::components::{Cache, CacheStatistics};
use super::config::CacheHierarchyConfig;
use super::prefetcher::Prefetcher;
use crate::errors::SimulatorError;
use crate::trace::reader::{MemoryRecord, TraceReader};

/// Trace-driven two-level cache hierarchy simulator.
///
/// The two levels are non-inclusive: each keeps its own contents and an
/// install into one never evicts from the other.
pub struct Simulator {
    l1: Cache,
    l2: Cache,
    prefetcher: Prefetcher,
    dram_latency: u64,
    stats: CacheStatistics,
}

impl Simulator {
    pub fn new(config: CacheHierarchyConfig) -> Self {
        info!(
            "Cache simulator: L1 {} sets x {} ways, L2 {} sets x {} ways, {:?} prefetcher",
            config.l1.num_sets(),
            config.l1.associativity,
            config.l2.num_sets(),
            config.l2.associativity,
            config.prefetcher
        );

        Self {
            l1: Cache::new(config.l1.clone()),
            l2: Cache::new(config.l2.clone()),
            prefetcher: Prefetcher::new(config.prefetcher, config.seed),
            dram_latency: config.dram_latency,
            stats: CacheStatistics::default(),
        }
    }

    pub fn stats(&self) -> &CacheStatistics {
        &self.stats
    }

    /// Drive the whole trace through the hierarchy.
    pub fn run(
        &mut self,
        trace: &mut TraceReader<MemoryRecord>,
    ) -> Result<&CacheStatistics, SimulatorError> {
        while let Some(record) = trace.next_record()? {
            self.step(&record);
        }

        info!(
            "Cache simulation finished: {} cycles, miss rate {:.6}",
            self.stats.cycles,
            self.stats.miss_rate()
        );
        Ok(&self.stats)
    }

    /// Account one trace record: one base cycle, then a lookup for every
    /// non-zero register slot.
    pub fn step(&mut self, record: &MemoryRecord) {
        self.stats.cycles += 1;
        self.lookup(record.address, record.read1, false);
        self.lookup(record.address, record.read2, false);
        self.lookup(record.address, record.write, true);
    }

    // One demand access: probe L1, then L2, then main memory. Latencies are
    // charged as the access descends; a hit on a block whose fill has not
    // completed yet adds the remaining cycles to each charge.
    fn lookup(&mut self, pc: u64, address: u64, is_write: bool) {
        if address == 0 {
            return;
        }

        let mut missed_l2 = false;

        if let Some(penalty) = self.l1.probe(address, self.stats.cycles) {
            self.stats.l1_hits += 1;
            if is_write {
                self.l1.touch_write(address, self.stats.cycles);
            }
            self.stats.cycles += self.l1.latency() + penalty;
        } else if let Some(penalty) = self.l2.probe(address, self.stats.cycles) {
            self.stats.l2_hits += 1;
            self.l1.fill(address, is_write, self.stats.cycles);
            self.stats.l1_misses += 1;
            self.stats.cycles += self.l2.latency() + penalty;
            self.stats.cycles += self.l1.latency() + penalty;
        } else {
            self.stats.l2_misses += 1;
            missed_l2 = true;
            self.stats.cycles += self.dram_latency;
            self.l2.fill(address, is_write, self.stats.cycles);
            self.l1.fill(address, is_write, self.stats.cycles);
            self.stats.l1_misses += 1;
            self.stats.cycles += self.l2.latency();
            self.stats.cycles += self.l1.latency();
        }

        self.prefetcher.observe(
            pc,
            address,
            self.stats.cycles,
            missed_l2,
            &mut self.l2,
            &mut self.stats,
        );
    }
}
