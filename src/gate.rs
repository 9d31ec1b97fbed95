// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Combinational gate evaluation.
//!
//! All six gate kinds share one fold-based evaluation; the N-variants invert
//! the folded result. A gate keeps its committed output bit plus the previous
//! one so that an in-flight transition can be revoked by the inertial-delay
//! cancellation path (see [`EventQueue::cancel_updates_to`]).
//!
//! [`EventQueue::cancel_updates_to`]: crate::event::EventQueue::cancel_updates_to

use smallvec::SmallVec;

use crate::logic::{LogicValue, Node, NodeId};

/// Maximum number of inputs a gate record may declare.
pub const MAX_GATE_INPUTS: usize = 8;

/// Index of a gate inside its owning circuit.
pub type GateId = u32;

/// The Boolean operator of a combinational gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
}

impl GateKind {
    /// Identity element of the fold: 1 for AND-family, 0 otherwise.
    #[inline]
    fn fold_identity(self) -> u8 {
        match self {
            GateKind::And | GateKind::Nand => 1,
            _ => 0,
        }
    }

    #[inline]
    fn fold_step(self, acc: u8, bit: u8) -> u8 {
        match self {
            GateKind::And | GateKind::Nand => acc & bit,
            GateKind::Or | GateKind::Nor => acc | bit,
            GateKind::Xor | GateKind::Xnor => acc ^ bit,
        }
    }

    /// Whether the folded result is inverted (NAND/NOR/XNOR).
    #[inline]
    fn inverts(self) -> bool {
        matches!(self, GateKind::Nand | GateKind::Nor | GateKind::Xnor)
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Xor => "XOR",
            GateKind::Nand => "NAND",
            GateKind::Nor => "NOR",
            GateKind::Xnor => "XNOR",
        };
        write!(f, "{}", s)
    }
}

/// Result of one [`Gate::evaluate`] call.
#[derive(Debug, Clone, Copy)]
pub struct GateEval {
    /// The freshly committed output value.
    pub value: LogicValue,
    /// Whether the output differs from the previously committed one.
    pub changed: bool,
    /// Propagation delay of this transition: fall for 1→0, rise for 0→1,
    /// zero when the output did not move.
    pub delay: u64,
}

/// A combinational gate with up to eight inputs and one output.
#[derive(Debug, Clone)]
pub struct Gate {
    pub kind: GateKind,
    pub inputs: SmallVec<[NodeId; MAX_GATE_INPUTS]>,
    pub output: NodeId,
    pub rise_delay: u64,
    pub fall_delay: u64,
    /// Committed output bit.
    output_bit: u8,
    /// Output bit before the last evaluate, restored by [`Gate::revert`].
    pending_previous_bit: u8,
}

impl Gate {
    pub fn new(
        kind: GateKind,
        rise_delay: u64,
        fall_delay: u64,
        output: NodeId,
        inputs: SmallVec<[NodeId; MAX_GATE_INPUTS]>,
    ) -> Self {
        Gate {
            kind,
            inputs,
            output,
            rise_delay,
            fall_delay,
            output_bit: 0,
            pending_previous_bit: 0,
        }
    }

    /// Fold the current input node values into an output bit.
    fn fold(&self, nodes: &[Node]) -> u8 {
        let mut acc = self.kind.fold_identity();
        for &input in &self.inputs {
            acc = self.kind.fold_step(acc, nodes[input as usize].read().as_bit());
        }
        if self.kind.inverts() {
            acc ^ 1
        } else {
            acc
        }
    }

    /// Recompute and commit the output.
    ///
    /// The prior output bit is saved into the pending-previous slot first, so
    /// a later [`Gate::revert`] can undo this commit if the scheduled
    /// transition gets cancelled before its delay elapses.
    pub fn evaluate(&mut self, nodes: &[Node]) -> GateEval {
        let new_bit = self.fold(nodes);
        self.pending_previous_bit = self.output_bit;

        let delay = if new_bit == 0 && self.output_bit == 1 {
            self.fall_delay
        } else if new_bit == 1 && self.output_bit == 0 {
            self.rise_delay
        } else {
            0
        };
        let changed = new_bit != self.output_bit;
        self.output_bit = new_bit;

        GateEval {
            value: LogicValue::from_bit(new_bit),
            changed,
            delay,
        }
    }

    /// Recompute without committing: true iff the output bit would change.
    ///
    /// The cancellation policy uses this to decide whether a pending output
    /// transition must be revoked before re-evaluating.
    pub fn preview(&self, nodes: &[Node]) -> bool {
        self.fold(nodes) != self.output_bit
    }

    /// Restore the output bit saved by the last [`Gate::evaluate`].
    pub fn revert(&mut self) {
        self.output_bit = self.pending_previous_bit;
    }

    /// The committed output value.
    pub fn output_value(&self) -> LogicValue {
        LogicValue::from_bit(self.output_bit)
    }

    /// Clear evaluation history back to the all-zero start state.
    pub fn reset(&mut self) {
        self.output_bit = 0;
        self.pending_previous_bit = 0;
    }
}
