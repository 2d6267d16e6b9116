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

// components.rs
//
// This file contains the cache component of the hierarchy simulator: a
// set-associative array of tag entries with LRU replacement keyed on each
// entry's fill completion time. No data is stored; only tags, state bits and
// timing are modeled.

use std::fmt;

use serde::Serialize;

use super::config::CacheConfig;

/// One cache block's bookkeeping.
///
/// `cycle` records when the block's fill completes. It doubles as the LRU
/// timestamp (smallest = least recently used) and produces the back-pressure
/// penalty for an access that arrives before its own fill is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheEntry {
    pub tag: u64,
    pub cycle: u64,
    pub valid: bool,
    pub dirty: bool,
}

/// A set-associative cache with write-back/write-allocate discipline.
///
/// Address decomposition: the low `log2(block_size)` bits are the block
/// offset, the next `log2(num_sets)` bits the set index, and the remainder
/// the tag. For the normative geometry this gives L1 tags of `address >> 14`
/// and L2 tags of `address >> 18`.
pub struct Cache {
    config: CacheConfig,
    offset_bits: u32,
    index_bits: u32,
    sets: Vec<Vec<CacheEntry>>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let num_sets = config.num_sets();
        let sets = vec![vec![CacheEntry::default(); config.associativity]; num_sets];

        Self {
            offset_bits: config.block_size.trailing_zeros(),
            index_bits: num_sets.trailing_zeros(),
            sets,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn latency(&self) -> u64 {
        self.config.latency
    }

    /// Split an address into `(tag, set index)`.
    pub fn decode_address(&self, address: u64) -> (u64, usize) {
        let index = ((address >> self.offset_bits) as usize) & (self.sets.len() - 1);
        let tag = address >> (self.offset_bits + self.index_bits);
        (tag, index)
    }

    /// Probe for `address` at the given cycle.
    ///
    /// On a hit, returns the back-pressure penalty: the cycles remaining
    /// until the hit block's own fill completes (zero once it has).
    pub fn probe(&self, address: u64, cycle: u64) -> Option<u64> {
        let (tag, index) = self.decode_address(address);
        self.sets[index]
            .iter()
            .find(|entry| entry.valid && entry.tag == tag)
            .map(|entry| entry.cycle.saturating_sub(cycle))
    }

    /// Refresh the LRU stamp of a write hit and mark the block dirty.
    /// Read hits leave the stamp at the original fill time.
    pub fn touch_write(&mut self, address: u64, cycle: u64) {
        let (tag, index) = self.decode_address(address);
        let latency = self.config.latency;
        if let Some(entry) = self.sets[index]
            .iter_mut()
            .find(|entry| entry.valid && entry.tag == tag)
        {
            entry.dirty = true;
            entry.cycle = cycle + latency;
        }
    }

    /// Install the block holding `address` over the set's LRU way. The fill
    /// completes one access latency after `cycle`.
    ///
    /// Dirty victims are dropped without modeling the writeback cost.
    pub fn fill(&mut self, address: u64, dirty: bool, cycle: u64) {
        let (tag, index) = self.decode_address(address);
        let fill_cycle = cycle + self.config.latency;
        let set = &mut self.sets[index];
        let victim = Self::find_victim(set);

        set[victim] = CacheEntry {
            tag,
            cycle: fill_cycle,
            valid: true,
            dirty,
        };
    }

    // Invalid way if one exists, else the way with the smallest fill cycle.
    fn find_victim(set: &[CacheEntry]) -> usize {
        let mut victim = 0;
        let mut min_cycle = u64::MAX;

        for (way, entry) in set.iter().enumerate() {
            if !entry.valid {
                return way;
            }
            if entry.cycle < min_cycle {
                min_cycle = entry.cycle;
                victim = way;
            }
        }

        victim
    }
}

/// Run statistics of the cache hierarchy simulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    pub cycles: u64,
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub prefetches_total: u64,
    pub prefetches_useful: u64,
}

impl CacheStatistics {
    /// Misses over all cache events, both levels combined.
    pub fn miss_rate(&self) -> f64 {
        let events = self.l1_hits + self.l1_misses + self.l2_hits + self.l2_misses;
        if events == 0 {
            0.0
        } else {
            (self.l1_misses + self.l2_misses) as f64 / events as f64
        }
    }

    /// Fraction of issued prefetches that a demand access later used.
    pub fn prefetch_rate(&self) -> f64 {
        if self.prefetches_total == 0 {
            0.0
        } else {
            self.prefetches_useful as f64 / self.prefetches_total as f64
        }
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f, "L1 Hit/Miss: {}/{}", self.l1_hits, self.l1_misses)?;
        writeln!(f, "L2 Hit/Miss: {}/{}", self.l2_hits, self.l2_misses)?;
        writeln!(
            f,
            "Prefetches Used/Total: {}/{}",
            self.prefetches_useful, self.prefetches_total
        )?;
        writeln!(f, "Miss Rate: {:.6}", self.miss_rate())?;
        write!(f, "Prefetch Rate: {:.6}", self.prefetch_rate())
    }
}
