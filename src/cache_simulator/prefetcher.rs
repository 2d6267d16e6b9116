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

// prefetcher.rs
//
// This file contains the hardware prefetchers of the cache simulator: a
// PC-indexed stride prefetcher (reference prediction table) and a
// variable-length delta prefetcher (VLDP). Both observe finished demand
// lookups and inject speculative fills into the L2.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::components::{Cache, CacheStatistics};
use super::config::{
    PrefetcherType, DELTA_HISTORY_LENGTH, DELTA_PREDICTION_TABLES, L2_BLOCK_SIZE, PAGE_SIZE,
    PREDICTION_TABLE_LENGTH, STRIDE_PREFETCHER_ENTRIES,
};

// Depth of the VLDP's recent-delta and recent-prefetch rings.
const DELTA_RING_LENGTH: usize = 5;

// Add a signed delta to an address in wrapping two's-complement arithmetic.
fn apply_delta(address: u64, delta: i64) -> u64 {
    address.wrapping_add(delta as u64)
}

// Shift a new value into position 0 of a small ring, dropping the oldest.
fn shift_ring<T: Copy>(ring: &mut [T], value: T) {
    for i in (1..ring.len()).rev() {
        ring[i] = ring[i - 1];
    }
    ring[0] = value;
}

/// The active prefetcher behind the L2.
pub enum Prefetcher {
    None,
    Stride(StridePrefetcher),
    Vldp(DeltaPrefetcher),
}

impl Prefetcher {
    pub fn new(kind: PrefetcherType, seed: Option<u64>) -> Self {
        match kind {
            PrefetcherType::None => Prefetcher::None,
            PrefetcherType::Stride => Prefetcher::Stride(StridePrefetcher::new()),
            PrefetcherType::Vldp => Prefetcher::Vldp(DeltaPrefetcher::new(seed)),
        }
    }

    /// Observe one finished demand lookup and possibly inject L2 fills.
    pub fn observe(
        &mut self,
        pc: u64,
        address: u64,
        cycle: u64,
        missed_l2: bool,
        l2: &mut Cache,
        stats: &mut CacheStatistics,
    ) {
        match self {
            Prefetcher::None => {},
            Prefetcher::Stride(prefetcher) => prefetcher.observe(pc, address, cycle, l2, stats),
            Prefetcher::Vldp(prefetcher) => {
                prefetcher.observe(address, cycle, missed_l2, l2, stats)
            },
        }
    }
}

/// States of a reference prediction table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrideState {
    #[default]
    Init,
    Transient,
    Steady,
    NoPred,
}

#[derive(Debug, Clone, Copy, Default)]
struct StrideEntry {
    tag: u64,
    last_address: u64,
    stride: u64,
    state: StrideState,
    // True while no prefetch is outstanding; cleared when one is issued so a
    // later stride confirmation counts it as useful exactly once.
    prefetch_used: bool,
}

/// PC-indexed stride prefetcher.
///
/// Each table entry tracks the stride between successive accesses issued by
/// one instruction and walks the Init/Transient/Steady/NoPred automaton;
/// while it is not in NoPred, every access prefetches `address + stride`
/// into the L2.
pub struct StridePrefetcher {
    table: [StrideEntry; STRIDE_PREFETCHER_ENTRIES],
}

impl StridePrefetcher {
    pub fn new() -> Self {
        let entry = StrideEntry {
            prefetch_used: true,
            ..StrideEntry::default()
        };

        Self {
            table: [entry; STRIDE_PREFETCHER_ENTRIES],
        }
    }

    fn observe(
        &mut self,
        pc: u64,
        address: u64,
        cycle: u64,
        l2: &mut Cache,
        stats: &mut CacheStatistics,
    ) {
        let mut index = None;
        let mut available = None;

        for (i, entry) in self.table.iter().enumerate() {
            if entry.state == StrideState::Init && available.is_none() {
                available = Some(i);
            }
            if entry.tag == pc {
                index = Some(i);
                break;
            }
        }

        let Some(index) = index else {
            // Unknown PC: claim a free slot if the table has one. The new
            // entry has no stride yet, so no prefetch is issued this call.
            if let Some(slot) = available {
                self.table[slot] = StrideEntry {
                    tag: pc,
                    last_address: address,
                    stride: 0,
                    state: StrideState::Transient,
                    prefetch_used: true,
                };
            }
            return;
        };

        let entry = &mut self.table[index];
        let delta = address.wrapping_sub(entry.last_address);

        if delta == entry.stride {
            entry.state = match entry.state {
                StrideState::NoPred => StrideState::Transient,
                _ => StrideState::Steady,
            };
            if !entry.prefetch_used {
                stats.prefetches_useful += 1;
                entry.prefetch_used = true;
            }
        } else {
            match entry.state {
                StrideState::Init => {
                    entry.stride = delta;
                    entry.state = StrideState::Transient;
                },
                StrideState::Transient | StrideState::NoPred => {
                    entry.stride = delta;
                    entry.state = StrideState::NoPred;
                },
                StrideState::Steady => {
                    entry.state = StrideState::Init;
                },
            }
        }

        if entry.state != StrideState::NoPred {
            entry.prefetch_used = false;
            let target = address.wrapping_add(entry.stride);
            debug!("stride prefetch of {} for pc {}", target, pc);
            l2.fill(target, false, cycle);
            stats.prefetches_total += 1;
        }

        entry.last_address = address;
    }
}

impl Default for StridePrefetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DeltaHistoryEntry {
    page_number: u64,
    last_offset: u64,
    cycle: u64,
    times_used: u32,
    last_predictor: Option<(usize, usize)>,
    last_deltas: [i64; DELTA_RING_LENGTH],
    last_prefetched: [u64; DELTA_RING_LENGTH],
    valid: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct OffsetPredictionEntry {
    delta_prediction: i64,
    accuracy: bool,
    accessed: bool,
    last_address: u64,
}

#[derive(Debug, Clone, Copy)]
struct DeltaPredictionEntry {
    deltas: [i64; DELTA_PREDICTION_TABLES],
    prediction: i64,
    accuracy: u8,
    // Not-most-recently-used bit; eligible victims have it set.
    nmru: bool,
}

impl Default for DeltaPredictionEntry {
    fn default() -> Self {
        Self {
            deltas: [0; DELTA_PREDICTION_TABLES],
            prediction: 0,
            accuracy: 0,
            nmru: true,
        }
    }
}

/// Variable-length delta prefetcher.
///
/// Activated by demand L2 misses and by prefetch address encounters (a
/// demand touching a block this page recently prefetched). Per 8 KiB page
/// it records the last few block deltas in the delta history table, predicts
/// the next block within the page from per-offset history (OPT) and from
/// delta-sequence history of increasing depth (DPT), and prefetches the
/// predicted block into the L2.
pub struct DeltaPrefetcher {
    history: [DeltaHistoryEntry; DELTA_HISTORY_LENGTH],
    offsets: [OffsetPredictionEntry; (PAGE_SIZE as usize) / L2_BLOCK_SIZE],
    predictions: [[DeltaPredictionEntry; PREDICTION_TABLE_LENGTH]; DELTA_PREDICTION_TABLES],
    rng: StdRng,
}

impl DeltaPrefetcher {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            history: [DeltaHistoryEntry::default(); DELTA_HISTORY_LENGTH],
            offsets: [OffsetPredictionEntry::default(); (PAGE_SIZE as usize) / L2_BLOCK_SIZE],
            predictions: [[DeltaPredictionEntry::default(); PREDICTION_TABLE_LENGTH];
                DELTA_PREDICTION_TABLES],
            rng,
        }
    }

    fn observe(
        &mut self,
        address: u64,
        cycle: u64,
        missed_l2: bool,
        l2: &mut Cache,
        stats: &mut CacheStatistics,
    ) {
        let page_number = address / PAGE_SIZE;
        let page_offset = address % PAGE_SIZE;

        let found = self
            .history
            .iter()
            .position(|entry| entry.valid && entry.page_number == page_number);

        if !missed_l2 {
            // Only a prefetch address encounter keeps the update going on a
            // demand that hit: the touched block must be one this page
            // recently prefetched.
            let Some(index) = found else { return };
            if !self.history[index].last_prefetched.contains(&address) {
                return;
            }
            debug!("prefetch address encounter at {}", address);
            stats.prefetches_useful += 1;
        }

        // Delta history table
        let (dht_index, delta) = match found {
            Some(index) => {
                let delta = page_offset as i64 - self.history[index].last_offset as i64;
                (index, delta)
            },
            None => {
                let index = self.history_victim();
                self.history[index] = DeltaHistoryEntry {
                    page_number,
                    valid: true,
                    ..DeltaHistoryEntry::default()
                };
                (index, 0)
            },
        };

        {
            let entry = &mut self.history[dht_index];
            entry.last_offset = page_offset;
            entry.cycle = cycle;
            shift_ring(&mut entry.last_deltas, delta);
        }

        // Offset prediction table
        let opt_index = (page_offset as usize) / L2_BLOCK_SIZE;
        let opt = &mut self.offsets[opt_index];
        if !opt.accessed {
            opt.delta_prediction = 0;
            opt.accuracy = false;
            opt.accessed = true;
        } else {
            if opt.accuracy {
                let target = apply_delta(address, opt.delta_prediction);
                l2.fill(target, false, cycle);
                stats.prefetches_total += 1;
            }

            let observed = address.wrapping_sub(opt.last_address) as i64;
            if observed == opt.delta_prediction {
                opt.accuracy = true;
            } else {
                if !opt.accuracy {
                    opt.delta_prediction = observed;
                }
                opt.accuracy = false;
            }
        }
        opt.last_address = address;

        // Delta prediction tables: deepest history that matches the page's
        // recent deltas wins.
        let times_used = self.history[dht_index].times_used as usize;
        let recent_deltas = self.history[dht_index].last_deltas;
        let depth = DELTA_PREDICTION_TABLES.min(times_used);

        let mut matched = None;
        'search: for table in (0..depth).rev() {
            for index in 0..PREDICTION_TABLE_LENGTH {
                if self.predictions[table][index].deltas[..=table] == recent_deltas[..=table] {
                    matched = Some((table, index));
                    break 'search;
                }
            }
        }

        // Train the slot that produced this page's previous prediction.
        if let Some((table, index)) = self.history[dht_index].last_predictor {
            let slot = &mut self.predictions[table][index];
            if slot.prediction == delta {
                if slot.accuracy < 3 {
                    slot.accuracy += 1;
                }
            } else if slot.accuracy > 0 {
                slot.accuracy -= 1;
            } else {
                slot.prediction = delta;
            }
        }

        // Issue the new prediction.
        if let Some((table, index)) = matched {
            let target = apply_delta(address, self.predictions[table][index].prediction);
            let entry = &mut self.history[dht_index];
            shift_ring(&mut entry.last_prefetched, target);
            entry.last_predictor = Some((table, index));
            debug!("vldp prefetch of {} from table {}", target, table);
            l2.fill(target, false, cycle);
            stats.prefetches_total += 1;
        }

        // Record the current delta sequence in the next-deeper table so a
        // recurring pattern gains prediction depth.
        if times_used > 0 {
            let table = DELTA_PREDICTION_TABLES.min(times_used) - 1;
            let existing = (0..PREDICTION_TABLE_LENGTH)
                .find(|&i| self.predictions[table][i].deltas[..=table] == recent_deltas[..=table]);

            let index = match existing {
                Some(index) => index,
                None => {
                    let victim = self.prediction_victim(table);
                    for slot in self.predictions[table].iter_mut() {
                        slot.nmru = true;
                    }
                    let slot = &mut self.predictions[table][victim];
                    slot.deltas[..=table].copy_from_slice(&recent_deltas[..=table]);
                    slot.prediction = 0;
                    slot.accuracy = 1;
                    victim
                },
            };

            self.predictions[table][index].nmru = false;
        }

        self.history[dht_index].times_used += 1;
    }

    // Victim slot for a new page: an invalid slot if any, otherwise a random
    // slot other than the most recently used.
    fn history_victim(&mut self) -> usize {
        if let Some(index) = self.history.iter().position(|entry| !entry.valid) {
            return index;
        }

        let mut mru = 0;
        let mut max_cycle = self.history[0].cycle;
        for (index, entry) in self.history.iter().enumerate().skip(1) {
            if entry.cycle > max_cycle {
                mru = index;
                max_cycle = entry.cycle;
            }
        }

        loop {
            let index = self.rng.gen_range(0..DELTA_HISTORY_LENGTH);
            if index != mru {
                return index;
            }
        }
    }

    // Random victim among the not-most-recently-used entries of one table.
    fn prediction_victim(&mut self, table: usize) -> usize {
        loop {
            let index = self.rng.gen_range(0..PREDICTION_TABLE_LENGTH);
            if self.predictions[table][index].nmru {
                return index;
            }
        }
    }
}
