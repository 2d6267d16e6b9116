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

// config.rs
//
// This file contains the configuration structs and constants for the cache
// hierarchy simulator: cache geometry, latencies, prefetcher selection, and
// the RNG seed used by the VLDP's victim selection.

use clap::ValueEnum;

/// L1 cache size in bytes.
pub const L1_SIZE: usize = 64 * 1024;
/// L1 associativity.
pub const L1_WAYS: usize = 4;
/// L1 block size in bytes.
pub const L1_BLOCK_SIZE: usize = 64;
/// L1 access latency in cycles.
pub const L1_LATENCY: u64 = 2;

/// L2 cache size in bytes.
pub const L2_SIZE: usize = 2 * 1024 * 1024;
/// L2 associativity.
pub const L2_WAYS: usize = 8;
/// L2 block size in bytes.
pub const L2_BLOCK_SIZE: usize = 64;
/// L2 access latency in cycles.
pub const L2_LATENCY: u64 = 4;

/// Main memory latency in cycles.
pub const DRAM_LATENCY: u64 = 150;

/// Entries in the stride prefetcher's reference prediction table.
pub const STRIDE_PREFETCHER_ENTRIES: usize = 64;

/// Page size assumed by the VLDP, in bytes.
pub const PAGE_SIZE: u64 = 8 * 1024;
/// Entries in the VLDP's delta history table.
pub const DELTA_HISTORY_LENGTH: usize = 64;
/// Number of delta prediction tables (one per history depth).
pub const DELTA_PREDICTION_TABLES: usize = 3;
/// Entries per delta prediction table.
pub const PREDICTION_TABLE_LENGTH: usize = 64;

/// Hardware prefetcher to run behind the L2.
///
/// Exactly one prefetcher is active per run; the selection is a launch-time
/// knob on the `cache_sim` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrefetcherType {
    /// No prefetching
    None,
    /// PC-indexed stride prefetcher (reference prediction table)
    Stride,
    /// Variable-length delta prefetcher
    Vldp,
}

/// Geometry and latency of one cache level.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub size: usize,          // Cache size in bytes
    pub associativity: usize, // Number of ways (entries per set)
    pub block_size: usize,    // Size of each cache block in bytes
    pub latency: u64,         // Access latency in cycles
}

impl CacheConfig {
    pub fn new(size: usize, associativity: usize, block_size: usize, latency: u64) -> Self {
        // Validate configuration
        assert!(size > 0, "Cache size must be positive");
        assert!(associativity > 0, "Associativity must be positive");
        assert!(
            block_size > 0 && block_size.is_power_of_two(),
            "Block size must be a positive power of two"
        );
        assert!(
            size % (associativity * block_size) == 0,
            "Cache size must be divisible by (associativity * block_size)"
        );
        assert!(
            (size / (associativity * block_size)).is_power_of_two(),
            "Number of sets must be a power of two"
        );

        Self {
            size,
            associativity,
            block_size,
            latency,
        }
    }

    /// The normative L1: 64 KiB, 4-way, 64-byte blocks, 2 cycles.
    pub fn l1() -> Self {
        Self::new(L1_SIZE, L1_WAYS, L1_BLOCK_SIZE, L1_LATENCY)
    }

    /// The normative L2: 2 MiB, 8-way, 64-byte blocks, 4 cycles.
    pub fn l2() -> Self {
        Self::new(L2_SIZE, L2_WAYS, L2_BLOCK_SIZE, L2_LATENCY)
    }

    pub fn num_sets(&self) -> usize {
        self.size / (self.associativity * self.block_size)
    }
}

/// Configuration of the whole hierarchy simulation.
#[derive(Debug, Clone)]
pub struct CacheHierarchyConfig {
    pub l1: CacheConfig,
    pub l2: CacheConfig,
    pub dram_latency: u64,
    pub prefetcher: PrefetcherType,
    /// Seed for the VLDP's victim-selection RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl CacheHierarchyConfig {
    pub fn new(prefetcher: PrefetcherType) -> Self {
        Self {
            l1: CacheConfig::l1(),
            l2: CacheConfig::l2(),
            dram_latency: DRAM_LATENCY,
            prefetcher,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
