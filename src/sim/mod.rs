// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Simulation drivers over the event queue.
//!
//! Timing and functional simulation share one event loop; they differ in
//! three points only: functional mode ignores gate delays, skips setup/hold
//! checks, and runs an initial settling pass before stimulus is applied.
//!
//! - [`vcd_io`] — waveform (VCD) output writing

pub mod vcd_io;

use compact_str::CompactString;
use serde::Serialize;

use crate::circuit::Circuit;
use crate::event::EventKind;
use crate::logic::{LogicValue, NodeId};
use crate::stimulus::StimulusRecord;

/// Simulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    /// Delay-aware simulation with setup/hold checking.
    Timing,
    /// Zero-delay simulation of the settled logic function.
    Functional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    Setup,
    Hold,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::Setup => write!(f, "setup"),
            ViolationKind::Hold => write!(f, "hold"),
        }
    }
}

/// A non-fatal setup or hold diagnostic, naming the flip-flop's Q node and
/// the offending time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingViolation {
    pub kind: ViolationKind,
    pub node: CompactString,
    pub time: u64,
}

/// Recorded waveform of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct WaveTrace {
    /// Per-node values at the initial dump (after the settling pass in
    /// functional mode, all zeros in timing mode).
    pub initial: Vec<LogicValue>,
    /// Node updates in processing order: ascending time, FIFO within a time.
    /// Consecutive same-value records for a node are kept here and collapsed
    /// by the waveform writer.
    pub changes: Vec<(u64, NodeId, LogicValue)>,
}

/// Result of one simulation run.
#[derive(Debug, Clone)]
pub struct SimResult {
    pub trace: WaveTrace,
    pub violations: Vec<TimingViolation>,
}

impl Circuit {
    /// Run a timing simulation of `stimulus` from the all-zero start state.
    ///
    /// Returns the waveform trace and any setup/hold violations. The run is
    /// deterministic: the queue orders equal-time events FIFO.
    pub fn run_timing(&mut self, stimulus: &[StimulusRecord]) -> SimResult {
        self.reset_state();
        let mut violations = Vec::new();
        let mut trace = WaveTrace {
            initial: self.nodes().iter().map(|n| n.read()).collect(),
            changes: Vec::new(),
        };

        self.schedule_initial_gate_pass(SimMode::Timing);
        self.schedule_stimulus(stimulus);
        self.drain_queue(SimMode::Timing, Some(&mut trace), &mut violations);

        for v in &violations {
            clilog::warn!(
                GATESIM_TIMING_VIOLATION,
                "{}-time violation on {} at time {}",
                v.kind,
                v.node,
                v.time
            );
        }
        SimResult { trace, violations }
    }

    /// Run a functional (zero-delay) simulation of `stimulus`.
    ///
    /// An initial settling pass drives every gate output that differs from
    /// the all-zero state (the NAND/NOR/XNOR case) before the waveform dump
    /// and the stimulus replay.
    pub fn run_functional(&mut self, stimulus: &[StimulusRecord]) -> SimResult {
        self.reset_state();
        let mut violations = Vec::new();

        self.schedule_initial_gate_pass(SimMode::Functional);
        self.drain_queue(SimMode::Functional, None, &mut violations);

        let mut trace = WaveTrace {
            initial: self.nodes().iter().map(|n| n.read()).collect(),
            changes: Vec::new(),
        };
        self.schedule_stimulus(stimulus);
        self.drain_queue(SimMode::Functional, Some(&mut trace), &mut violations);

        SimResult { trace, violations }
    }

    /// Functional simulation of one in-memory input vector applied at time 0.
    /// This is the ATPG fast path; it skips the name lookup of
    /// [`Circuit::run_functional`].
    pub fn run_functional_vector(&mut self, assignments: &[(NodeId, LogicValue)]) -> SimResult {
        self.reset_state();
        let mut violations = Vec::new();

        self.schedule_initial_gate_pass(SimMode::Functional);
        self.drain_queue(SimMode::Functional, None, &mut violations);

        let mut trace = WaveTrace {
            initial: self.nodes().iter().map(|n| n.read()).collect(),
            changes: Vec::new(),
        };
        for &(node, value) in assignments {
            self.queue.push(0, EventKind::NodeUpdate { node, value });
        }
        self.drain_queue(SimMode::Functional, Some(&mut trace), &mut violations);

        SimResult { trace, violations }
    }

    /// Evaluate every gate against the current (all-zero) node state and
    /// schedule the outputs that differ. In timing mode the update lands at
    /// t = delay, in functional mode at t = 0.
    ///
    /// Flip-flop outputs are not pre-scheduled; they fire only on observed
    /// clock edges.
    fn schedule_initial_gate_pass(&mut self, mode: SimMode) {
        for g in 0..self.gates.len() {
            let eval = self.gates[g].evaluate(&self.nodes);
            if eval.changed {
                let at = match mode {
                    SimMode::Timing => eval.delay,
                    SimMode::Functional => 0,
                };
                self.queue.push(
                    at,
                    EventKind::NodeUpdate {
                        node: self.gates[g].output,
                        value: eval.value,
                    },
                );
            }
        }
    }

    fn schedule_stimulus(&mut self, stimulus: &[StimulusRecord]) {
        for rec in stimulus {
            match self.name_to_id.get(rec.node.as_str()) {
                Some(&node) => self.queue.push(
                    rec.time,
                    EventKind::NodeUpdate {
                        node,
                        value: rec.value,
                    },
                ),
                None => clilog::warn!(
                    GATESIM_STIM_UNKNOWN_NODE,
                    "stimulus names unknown node '{}', record ignored",
                    rec.node
                ),
            }
        }
    }

    /// The main event loop. Pops until the queue is empty; the simulator
    /// never advances time past the last enqueued event.
    fn drain_queue(
        &mut self,
        mode: SimMode,
        mut trace: Option<&mut WaveTrace>,
        violations: &mut Vec<TimingViolation>,
    ) {
        let mut last_time = 0u64;
        while let Some((time, kind)) = self.queue.pop() {
            debug_assert!(time >= last_time, "event queue went backwards in time");
            last_time = time;

            match kind {
                EventKind::NodeUpdate { node, value } => {
                    // A stuck-at lock silently swallows the write; the trace
                    // records whatever the node actually holds now.
                    self.nodes[node as usize].write(value);
                    let committed = self.nodes[node as usize].read();
                    if let Some(trace) = trace.as_deref_mut() {
                        trace.changes.push((time, node, committed));
                    }

                    for i in 0..self.gate_fanout[node as usize].len() {
                        let g = self.gate_fanout[node as usize][i] as usize;
                        if self.gates[g].preview(&self.nodes) {
                            // The new output differs from the committed one:
                            // revoke any in-flight transition of this gate
                            // and recompute now. An input change that merely
                            // confirms a pending transition is left alone.
                            let out = self.gates[g].output;
                            self.queue.cancel_updates_to(out, &mut self.gates[g]);
                            self.queue.push(
                                time,
                                EventKind::GateRecompute {
                                    gate: g as crate::gate::GateId,
                                },
                            );
                        }
                    }
                    for i in 0..self.clk_fanout[node as usize].len() {
                        let ff = self.clk_fanout[node as usize][i];
                        self.queue.push(time, EventKind::FlipFlopClockTick { ff });
                    }
                    for i in 0..self.d_fanout[node as usize].len() {
                        let f = self.d_fanout[node as usize][i] as usize;
                        self.flip_flops[f].note_d_change(time, mode, &self.nodes, violations);
                    }
                }
                EventKind::GateRecompute { gate } => {
                    let g = gate as usize;
                    let eval = self.gates[g].evaluate(&self.nodes);
                    if eval.changed {
                        let at = match mode {
                            SimMode::Timing => time + eval.delay,
                            SimMode::Functional => time,
                        };
                        self.queue.push(
                            at,
                            EventKind::NodeUpdate {
                                node: self.gates[g].output,
                                value: eval.value,
                            },
                        );
                    }
                }
                EventKind::FlipFlopClockTick { ff } => {
                    let f = ff as usize;
                    if let Some(up) =
                        self.flip_flops[f].evaluate(time, mode, &self.nodes, violations)
                    {
                        let (q, qn) = (self.flip_flops[f].q, self.flip_flops[f].qn);
                        self.queue
                            .push(time, EventKind::NodeUpdate { node: q, value: up.q });
                        self.queue
                            .push(time, EventKind::NodeUpdate { node: qn, value: up.qn });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist;
    use crate::stimulus;

    fn sim_setup(netlist_src: &str, stim_src: &str) -> (Circuit, Vec<StimulusRecord>) {
        let circuit = netlist::parse_str(netlist_src, "test").unwrap();
        let stim = stimulus::parse_str(stim_src, "test").unwrap();
        (circuit, stim)
    }

    /// Changes of one node with consecutive duplicates collapsed, i.e. the
    /// transitions a waveform viewer would show.
    fn transitions_of(c: &Circuit, trace: &WaveTrace, name: &str) -> Vec<(u64, LogicValue)> {
        let id = c.node_id(name).unwrap();
        let mut last = trace.initial[id as usize];
        let mut out = Vec::new();
        for &(t, n, v) in &trace.changes {
            if n == id && v != last {
                out.push((t, v));
                last = v;
            }
        }
        out
    }

    #[test]
    fn test_and_steady_state_functional() {
        let (mut c, stim) = sim_setup("O .AND 10 5 A B\n", "0 A 1\n0 B 1\n");
        let res = c.run_functional(&stim);
        assert_eq!(
            transitions_of(&c, &res.trace, "O"),
            vec![(0, LogicValue::One)]
        );
        assert_eq!(c.node(c.node_id("O").unwrap()).read(), LogicValue::One);
    }

    #[test]
    fn test_and_steady_state_timing() {
        let (mut c, stim) = sim_setup("O .AND 10 5 A B\n", "0 A 1\n0 B 1\n");
        let res = c.run_timing(&stim);
        assert_eq!(
            transitions_of(&c, &res.trace, "O"),
            vec![(10, LogicValue::One)]
        );
        assert!(res.violations.is_empty());
    }

    #[test]
    fn test_glitch_is_suppressed_by_cancellation() {
        // 1-unit pulse on A against rise=10: the pending 0→1 is cancelled
        // at t=2 when the output would return to 0.
        let (mut c, stim) = sim_setup("O .AND 10 5 A B\n", "0 A 0\n0 B 1\n1 A 1\n2 A 0\n");
        let res = c.run_timing(&stim);
        assert_eq!(transitions_of(&c, &res.trace, "O"), vec![]);
    }

    #[test]
    fn test_nand_startup_settles_at_rise_delay() {
        let (mut c, stim) = sim_setup("O .NAND 3 4 A B\n", "");
        let res = c.run_timing(&stim);
        assert_eq!(
            transitions_of(&c, &res.trace, "O"),
            vec![(3, LogicValue::One)]
        );
    }

    #[test]
    fn test_nand_startup_functional_initial_dump() {
        let (mut c, stim) = sim_setup("O .NAND 3 4 A B\n", "");
        let res = c.run_functional(&stim);
        let o = c.node_id("O").unwrap();
        assert_eq!(res.trace.initial[o as usize], LogicValue::One);
        assert!(res.trace.changes.is_empty());
    }

    #[test]
    fn test_dff_capture() {
        let (mut c, stim) = sim_setup("ff .DFF 2 1 D CLK Q QN\n", "0 D 1\n5 CLK 1\n");
        let res = c.run_functional(&stim);
        assert_eq!(
            transitions_of(&c, &res.trace, "Q"),
            vec![(5, LogicValue::One)]
        );
        assert_eq!(transitions_of(&c, &res.trace, "QN"), vec![]);
        assert_eq!(c.node(c.node_id("QN").unwrap()).read(), LogicValue::Zero);
        assert!(res.violations.is_empty());
    }

    #[test]
    fn test_dff_edge_triggering_only_on_rising() {
        let (mut c, stim) = sim_setup(
            "ff .DFF 0 0 D CLK Q QN\n",
            "0 D 1\n10 CLK 1\n20 CLK 0\n30 CLK 1\n",
        );
        let res = c.run_timing(&stim);
        // D held at 1: Q goes high at the first edge and never moves again.
        assert_eq!(
            transitions_of(&c, &res.trace, "Q"),
            vec![(10, LogicValue::One)]
        );
    }

    #[test]
    fn test_setup_violation_reported() {
        let (mut c, stim) = sim_setup("ff .DFF 2 1 D CLK Q QN\n", "4 D 1\n5 CLK 1\n");
        let res = c.run_timing(&stim);
        assert_eq!(
            res.violations,
            vec![TimingViolation {
                kind: ViolationKind::Setup,
                node: "Q".into(),
                time: 5,
            }]
        );
    }

    #[test]
    fn test_functional_mode_emits_no_violations() {
        let (mut c, stim) = sim_setup("ff .DFF 2 1 D CLK Q QN\n", "4 D 1\n5 CLK 1\n");
        let res = c.run_functional(&stim);
        assert!(res.violations.is_empty());
        assert_eq!(
            transitions_of(&c, &res.trace, "Q"),
            vec![(5, LogicValue::One)]
        );
    }

    #[test]
    fn test_functional_and_timing_agree_at_steady_state() {
        let src = "N .NAND 3 4 A B\nO .XOR 2 2 N C\n";
        let stim_src = "0 A 1\n0 B 1\n2 C 1\n7 A 0\n";
        let (mut c1, stim) = sim_setup(src, stim_src);
        let (mut c2, _) = sim_setup(src, "");
        c1.run_functional(&stim);
        c2.run_timing(&stim);
        assert_eq!(c1.output_values(), c2.output_values());
    }

    #[test]
    fn test_stuck_at_node_ignores_writes_until_unlocked() {
        let (mut c, stim) = sim_setup("O .AND 1 1 A B\n", "0 A 1\n0 B 1\n");
        let o = c.node_id("O").unwrap();
        c.lock_stuck_at(o, LogicValue::Zero);
        c.run_functional(&stim);
        assert_eq!(c.node(o).read(), LogicValue::Zero);

        c.unlock_stuck_at(o);
        c.run_functional(&stim);
        assert_eq!(c.node(o).read(), LogicValue::One);
    }

    #[test]
    fn test_timing_runs_are_deterministic() {
        let src = "N .NOR 2 3 A B\nO .XNOR 1 1 N C\n";
        let stim_src = "0 A 1\n0 B 1\n0 C 1\n3 A 0\n4 B 0\n";
        let (mut c1, stim) = sim_setup(src, stim_src);
        let (mut c2, _) = sim_setup(src, "");
        let r1 = c1.run_timing(&stim);
        let r2 = c2.run_timing(&stim);
        assert_eq!(r1.trace.initial, r2.trace.initial);
        assert_eq!(r1.trace.changes, r2.trace.changes);
    }

    #[test]
    fn test_causality_no_event_before_its_cause() {
        let src = "N .NAND 5 5 A B\nO .AND 7 2 N C\n";
        let stim_src = "0 A 1\n1 B 1\n1 C 1\n9 A 0\n";
        let (mut c, stim) = sim_setup(src, stim_src);
        let res = c.run_timing(&stim);
        let mut last = 0;
        for &(t, _, _) in &res.trace.changes {
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn test_zero_delay_gate_propagates_at_current_time() {
        let (mut c, stim) = sim_setup("O .AND 0 0 A B\n", "3 A 1\n3 B 1\n");
        let res = c.run_timing(&stim);
        assert_eq!(
            transitions_of(&c, &res.trace, "O"),
            vec![(3, LogicValue::One)]
        );
    }
}
