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

// btb.rs
//
// This file contains the branch target buffer: a small direct-mapped cache
// of recently seen branches, their last taken targets, and the per-branch
// predictor state (2-bit counter and local history register).

use super::config::BTB_SIZE;

/// One BTB slot. At most one branch owns a slot at a time; a different
/// branch mapping to the same index evicts the previous owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct BtbEntry {
    /// PC of the branch that owns this slot.
    pub address: u64,
    /// Last observed taken target.
    pub target: u64,
    /// Local branch history (two-level local predictor).
    pub history: u8,
    /// 2-bit saturating counter (two-bit predictor), in `[0, 3]`.
    pub counter: u8,
    pub valid: bool,
}

/// Direct-mapped branch target buffer, indexed by the low PC bits.
pub struct BranchTargetBuffer {
    entries: [BtbEntry; BTB_SIZE],
}

impl BranchTargetBuffer {
    pub fn new() -> Self {
        Self {
            entries: [BtbEntry::default(); BTB_SIZE],
        }
    }

    /// Slot index owned by `address`.
    pub fn index_of(address: u64) -> usize {
        (address & (BTB_SIZE as u64 - 1)) as usize
    }

    /// Ensure `address` owns its slot.
    ///
    /// When the slot is empty or held by another branch, a fresh entry is
    /// installed (counter and history reset, target left from the previous
    /// owner until the first taken outcome overwrites it) and `true` is
    /// returned: the caller charges the BTB miss penalty and skips the
    /// direction predictor for this reference.
    pub fn install_if_missing(&mut self, address: u64) -> bool {
        let entry = &mut self.entries[Self::index_of(address)];
        if entry.valid && entry.address == address {
            return false;
        }

        entry.address = address;
        entry.valid = true;
        entry.history = 0;
        entry.counter = 0;
        true
    }

    pub fn entry(&self, address: u64) -> &BtbEntry {
        &self.entries[Self::index_of(address)]
    }

    pub fn entry_mut(&mut self, address: u64) -> &mut BtbEntry {
        &mut self.entries[Self::index_of(address)]
    }
}

impl Default for BranchTargetBuffer {
    fn default() -> Self {
        Self::new()
    }
}
