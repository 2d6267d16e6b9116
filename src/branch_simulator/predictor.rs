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

// predictor.rs
//
// This file contains the four branch direction predictors. Each variant is a
// state machine evaluated against the actual branch outcome: it reports
// whether the fetch would have been redirected correctly, then trains itself
// on the outcome.

use log::debug;

use super::btb::BtbEntry;
use super::config::{
    BranchPredictorType, HIST_MASK, HIST_SIZE, NUM_COUNTERS, PERCEPTRON_THRESHOLD,
};
use crate::trace::reader::BranchRecord;

// Saturating 2-bit counter update: taken increments, not-taken decrements.
fn update_counter(counter: &mut u8, taken: bool) {
    if taken {
        if *counter < 3 {
            *counter += 1;
        }
    } else if *counter > 0 {
        *counter -= 1;
    }
}

// Shift a new outcome into a HIST_SIZE-bit history register.
fn shift_history(history: u8, taken: bool) -> u8 {
    ((history << 1) | taken as u8) & HIST_MASK
}

/// The active branch direction predictor and its state.
///
/// Per-branch state (the 2-bit counter and the local history register) lives
/// in the owning BTB entry; everything shared across branches lives here.
pub enum Predictor {
    /// Predicts every branch as not taken; no state.
    NotTaken,
    /// Reads and trains the BTB entry's saturating counter.
    TwoBit,
    /// Pattern history table indexed by the BTB entry's local history.
    TwoLevelLocal { pattern_history: [u8; NUM_COUNTERS] },
    /// Pattern history table indexed by global history XOR low PC bits.
    TwoLevelGlobal {
        pattern_history: [u8; NUM_COUNTERS],
        history: u8,
    },
    /// Per-index weight vectors over the global history bits.
    Perceptron {
        weights: [[i32; HIST_SIZE]; NUM_COUNTERS],
        history: u8,
    },
}

impl Predictor {
    pub fn new(kind: BranchPredictorType) -> Self {
        match kind {
            BranchPredictorType::NotTaken => Predictor::NotTaken,
            BranchPredictorType::TwoBit => Predictor::TwoBit,
            BranchPredictorType::TwoLevelLocal => Predictor::TwoLevelLocal {
                pattern_history: [0; NUM_COUNTERS],
            },
            BranchPredictorType::TwoLevelGlobal => Predictor::TwoLevelGlobal {
                pattern_history: [0; NUM_COUNTERS],
                history: 0,
            },
            // Weights and history start at all ones.
            BranchPredictorType::Perceptron => Predictor::Perceptron {
                weights: [[1; HIST_SIZE]; NUM_COUNTERS],
                history: HIST_MASK,
            },
        }
    }

    /// Evaluate the prediction for `record` against the actual next fetch
    /// address and train on the outcome. Returns `true` when the predicted
    /// fetch matched.
    ///
    /// The caller guarantees `entry` is the valid BTB slot owned by
    /// `record.address` and that the entry was not installed this reference.
    pub fn predict_and_update(
        &mut self,
        entry: &mut BtbEntry,
        record: &BranchRecord,
        next_address: u64,
    ) -> bool {
        let fall_through = record.fall_through();
        let taken = next_address != fall_through;

        match self {
            Predictor::NotTaken => !taken,

            Predictor::TwoBit => {
                let predict_taken = entry.counter >= 2;
                let hit = if taken {
                    predict_taken && entry.target == next_address
                } else {
                    !predict_taken
                };
                update_counter(&mut entry.counter, taken);
                hit
            },

            Predictor::TwoLevelLocal { pattern_history } => {
                let index = (entry.history & HIST_MASK) as usize;
                let predict_taken = pattern_history[index] >= 2;
                let hit = if taken {
                    predict_taken && entry.target == next_address
                } else {
                    !predict_taken
                };
                update_counter(&mut pattern_history[index], taken);
                entry.history = shift_history(entry.history, taken);
                hit
            },

            Predictor::TwoLevelGlobal {
                pattern_history,
                history,
            } => {
                let index = ((*history ^ (record.address as u8)) & HIST_MASK) as usize;
                let next_fetch = if pattern_history[index] >= 2 {
                    entry.target
                } else {
                    fall_through
                };
                update_counter(&mut pattern_history[index], taken);
                *history = shift_history(*history, taken);
                next_fetch == next_address
            },

            Predictor::Perceptron { weights, history } => {
                let index = ((*history ^ (record.address as u8)) & HIST_MASK) as usize;

                // History bit k (oldest first) maps to input -1 or +1.
                let mut output = 0i32;
                for k in 0..HIST_SIZE {
                    let bit = (*history >> (HIST_SIZE - 1 - k)) & 1;
                    let input = if bit == 0 { -1 } else { 1 };
                    output += weights[index][k] * input;
                }

                let next_fetch = if output > 0 { entry.target } else { fall_through };
                let hit = next_fetch == next_address;

                // Train on a wrong prediction, or whenever the output is not
                // yet past the confidence threshold.
                if !hit || output.abs() < PERCEPTRON_THRESHOLD {
                    let direction = if taken { 1 } else { -1 };
                    for k in 0..HIST_SIZE {
                        let bit = (*history >> (HIST_SIZE - 1 - k)) & 1;
                        let input = if bit == 0 { -1 } else { 1 };
                        weights[index][k] += direction * input;
                    }
                    debug!(
                        "perceptron {} trained towards {} (output {})",
                        index, direction, output
                    );
                }

                *history = shift_history(*history, taken);
                hit
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditional_branch(address: u64, size: u64) -> BranchRecord {
        BranchRecord {
            assembly: String::from("jnz label"),
            opcode: String::from("OP_BRANCH_CC"),
            address,
            size,
            is_conditional: true,
        }
    }

    #[test]
    fn two_bit_counter_saturates() {
        let mut predictor = Predictor::new(BranchPredictorType::TwoBit);
        let record = conditional_branch(100, 4);
        let mut entry = BtbEntry {
            address: 100,
            target: 200,
            valid: true,
            ..BtbEntry::default()
        };

        for _ in 0..10 {
            predictor.predict_and_update(&mut entry, &record, 200);
        }
        assert_eq!(entry.counter, 3, "counter must saturate at 3");

        for _ in 0..10 {
            predictor.predict_and_update(&mut entry, &record, 104);
        }
        assert_eq!(entry.counter, 0, "counter must saturate at 0");
    }

    #[test]
    fn perceptron_trains_on_misprediction_at_threshold() {
        // Fresh state: history 1111 and all weights 1, so the output is
        // exactly the threshold. A taken outcome with the right target is a
        // hit and must not train; a not-taken outcome must decrement every
        // weight to zero.
        let mut predictor = Predictor::new(BranchPredictorType::Perceptron);
        let record = conditional_branch(0, 4);
        let mut entry = BtbEntry {
            address: 0,
            target: 200,
            valid: true,
            ..BtbEntry::default()
        };

        let hit = predictor.predict_and_update(&mut entry, &record, 200);
        assert!(hit);
        match &predictor {
            Predictor::Perceptron { weights, .. } => {
                assert_eq!(weights[0xF], [1; HIST_SIZE], "confident hit must not train");
            },
            _ => unreachable!(),
        }

        let mut predictor = Predictor::new(BranchPredictorType::Perceptron);
        let mut entry = BtbEntry {
            address: 0,
            target: 200,
            valid: true,
            ..BtbEntry::default()
        };
        let hit = predictor.predict_and_update(&mut entry, &record, 4);
        assert!(!hit, "predicted taken but fell through");
        match &predictor {
            Predictor::Perceptron { weights, .. } => {
                assert_eq!(weights[0xF], [0; HIST_SIZE], "each weight decremented once");
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn gshare_learns_a_taken_loop() {
        let mut predictor = Predictor::new(BranchPredictorType::TwoLevelGlobal);
        let record = conditional_branch(100, 4);
        let mut entry = BtbEntry {
            address: 100,
            target: 40,
            valid: true,
            ..BtbEntry::default()
        };

        // Two taken outcomes push the first counters to the taken side;
        // once the history pattern repeats, the predicted fetch is the
        // stored target.
        let mut hits = 0;
        for _ in 0..20 {
            if predictor.predict_and_update(&mut entry, &record, 40) {
                hits += 1;
            }
        }
        assert!(hits >= 10, "always-taken loop must converge, got {} hits", hits);
    }
}
