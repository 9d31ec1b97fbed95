// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Positive-edge-triggered D flip-flop.
//!
//! Flip-flop outputs carry no propagation delay: Q and Q̄ update at the same
//! time as the triggering clock edge. Setup and hold windows are checked in
//! timing mode only and produce non-fatal diagnostics.

use crate::logic::{LogicValue, Node, NodeId};
use crate::sim::{SimMode, TimingViolation, ViolationKind};

/// Index of a flip-flop inside its owning circuit.
pub type FlipFlopId = u32;

/// Q/Q̄ values sampled on a rising clock edge.
#[derive(Debug, Clone, Copy)]
pub struct FlipFlopUpdate {
    pub q: LogicValue,
    pub qn: LogicValue,
}

/// A positive-edge-triggered storage element.
#[derive(Debug, Clone)]
pub struct FlipFlop {
    pub d: NodeId,
    pub clk: NodeId,
    pub q: NodeId,
    pub qn: NodeId,
    /// Minimum time D must be stable before a clock edge.
    pub setup: u64,
    /// Minimum time D must be stable after a clock edge.
    pub hold: u64,
    last_clock_high: bool,
    /// Time of the most recent D change, if any.
    last_d_change_time: Option<u64>,
    /// Time of the most recent captured clock edge, if any.
    last_clk_rise_time: Option<u64>,
}

impl FlipFlop {
    pub fn new(setup: u64, hold: u64, d: NodeId, clk: NodeId, q: NodeId, qn: NodeId) -> Self {
        FlipFlop {
            d,
            clk,
            q,
            qn,
            setup,
            hold,
            last_clock_high: false,
            last_d_change_time: None,
            last_clk_rise_time: None,
        }
    }

    /// React to a clock tick.
    ///
    /// The edge tracker is refreshed on every call; only a detected 0→1 of
    /// CLK samples D and reports new Q/Q̄ values. In timing mode a D change
    /// closer to the edge than `setup` emits a setup violation naming Q.
    pub fn evaluate(
        &mut self,
        now: u64,
        mode: SimMode,
        nodes: &[Node],
        violations: &mut Vec<TimingViolation>,
    ) -> Option<FlipFlopUpdate> {
        let clk_high = nodes[self.clk as usize].read().as_bit() == 1;
        let rising = clk_high && !self.last_clock_high;
        self.last_clock_high = clk_high;

        if !rising {
            return None;
        }

        self.last_clk_rise_time = Some(now);
        if mode == SimMode::Timing {
            if let Some(d_time) = self.last_d_change_time {
                if now - d_time < self.setup {
                    violations.push(TimingViolation {
                        kind: ViolationKind::Setup,
                        node: nodes[self.q as usize].name.clone(),
                        time: now,
                    });
                }
            }
        }

        let d = nodes[self.d as usize].read().as_bit();
        Some(FlipFlopUpdate {
            q: LogicValue::from_bit(d),
            qn: LogicValue::from_bit(d ^ 1),
        })
    }

    /// Record a change of the D input. In timing mode a change closer to the
    /// previous clock edge than `hold` emits a hold violation naming Q.
    pub fn note_d_change(
        &mut self,
        now: u64,
        mode: SimMode,
        nodes: &[Node],
        violations: &mut Vec<TimingViolation>,
    ) {
        self.last_d_change_time = Some(now);
        if mode == SimMode::Timing {
            if let Some(rise_time) = self.last_clk_rise_time {
                if now - rise_time < self.hold {
                    violations.push(TimingViolation {
                        kind: ViolationKind::Hold,
                        node: nodes[self.q as usize].name.clone(),
                        time: now,
                    });
                }
            }
        }
    }

    /// Clear edge and stability history back to the start state.
    pub fn reset(&mut self) {
        self.last_clock_high = false;
        self.last_d_change_time = None;
        self.last_clk_rise_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes_dcqq(d: u8, clk: u8) -> Vec<Node> {
        let mut ns = vec![
            Node::new("D".into()),
            Node::new("CLK".into()),
            Node::new("Q".into()),
            Node::new("QN".into()),
        ];
        ns[0].write(LogicValue::from_bit(d));
        ns[1].write(LogicValue::from_bit(clk));
        ns
    }

    #[test]
    fn test_rising_edge_samples_d() {
        let mut ff = FlipFlop::new(2, 1, 0, 1, 2, 3);
        let mut viol = Vec::new();

        let ns = nodes_dcqq(1, 1);
        let up = ff.evaluate(10, SimMode::Functional, &ns, &mut viol).unwrap();
        assert_eq!(up.q, LogicValue::One);
        assert_eq!(up.qn, LogicValue::Zero);

        // Clock still high: no second edge.
        assert!(ff.evaluate(11, SimMode::Functional, &ns, &mut viol).is_none());

        // Falling edge produces nothing but re-arms the detector.
        let ns = nodes_dcqq(0, 0);
        assert!(ff.evaluate(20, SimMode::Functional, &ns, &mut viol).is_none());
        let ns = nodes_dcqq(0, 1);
        let up = ff.evaluate(30, SimMode::Functional, &ns, &mut viol).unwrap();
        assert_eq!(up.q, LogicValue::Zero);
        assert_eq!(up.qn, LogicValue::One);
        assert!(viol.is_empty());
    }

    #[test]
    fn test_setup_violation_in_timing_mode() {
        let mut ff = FlipFlop::new(2, 1, 0, 1, 2, 3);
        let mut viol = Vec::new();

        let ns = nodes_dcqq(1, 0);
        ff.note_d_change(4, SimMode::Timing, &ns, &mut viol);
        assert!(viol.is_empty());

        let ns = nodes_dcqq(1, 1);
        ff.evaluate(5, SimMode::Timing, &ns, &mut viol);
        assert_eq!(viol.len(), 1);
        assert_eq!(viol[0].kind, ViolationKind::Setup);
        assert_eq!(viol[0].node, "Q");
        assert_eq!(viol[0].time, 5);
    }

    #[test]
    fn test_hold_violation_in_timing_mode() {
        let mut ff = FlipFlop::new(2, 3, 0, 1, 2, 3);
        let mut viol = Vec::new();

        let ns = nodes_dcqq(0, 1);
        ff.evaluate(10, SimMode::Timing, &ns, &mut viol);
        ff.note_d_change(12, SimMode::Timing, &ns, &mut viol);
        assert_eq!(viol.len(), 1);
        assert_eq!(viol[0].kind, ViolationKind::Hold);
        assert_eq!(viol[0].time, 12);
    }

    #[test]
    fn test_functional_mode_skips_checks() {
        let mut ff = FlipFlop::new(100, 100, 0, 1, 2, 3);
        let mut viol = Vec::new();

        let ns = nodes_dcqq(1, 0);
        ff.note_d_change(4, SimMode::Functional, &ns, &mut viol);
        let ns = nodes_dcqq(1, 1);
        ff.evaluate(5, SimMode::Functional, &ns, &mut viol);
        ff.note_d_change(6, SimMode::Functional, &ns, &mut viol);
        assert!(viol.is_empty());
    }

    #[test]
    fn test_no_spurious_checks_before_first_edge() {
        let mut ff = FlipFlop::new(5, 5, 0, 1, 2, 3);
        let mut viol = Vec::new();

        // D toggles before any clock edge was ever seen: no hold window open.
        let ns = nodes_dcqq(1, 0);
        ff.note_d_change(0, SimMode::Timing, &ns, &mut viol);
        assert!(viol.is_empty());
    }
}
