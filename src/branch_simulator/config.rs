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
// This file contains the configuration constants and the predictor selection
// enum for the branch prediction simulator.

use clap::ValueEnum;

/// Number of entries in the branch target buffer.
pub const BTB_SIZE: usize = 64;

/// Bits of branch history kept by the two-level and perceptron predictors.
pub const HIST_SIZE: usize = 4;

/// Number of pattern-history counters (`2^HIST_SIZE`).
pub const NUM_COUNTERS: usize = 1 << HIST_SIZE;

/// Mask keeping a history register within `HIST_SIZE` bits.
pub const HIST_MASK: u8 = (NUM_COUNTERS - 1) as u8;

/// Cycles charged for a correctly handled branch.
pub const BTB_HIT_CYCLES: u64 = 1;

/// Cycles charged when a branch misses the BTB and a slot is (re)installed.
pub const BTB_MISS_CYCLES: u64 = 5;

/// Cycles charged for a mispredicted direction or target.
pub const BTB_MISS_PREDICTED_CYCLES: u64 = 4;

/// Perceptron training threshold.
pub const PERCEPTRON_THRESHOLD: i32 = HIST_SIZE as i32;

/// Branch direction predictor to simulate.
///
/// Exactly one predictor is active per run; the selection is a launch-time
/// knob on the `branch_sim` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BranchPredictorType {
    /// Statically predict every conditional branch as not taken
    NotTaken,
    /// Per-branch 2-bit saturating counter
    TwoBit,
    /// Per-branch 4-bit history indexing a shared pattern history table
    TwoLevelLocal,
    /// Global 4-bit history XORed with the low PC bits (gshare)
    TwoLevelGlobal,
    /// Table of small perceptrons over the global history
    Perceptron,
}
