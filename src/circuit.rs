// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Circuit: the owner of nodes, gates, and flip-flops.
//!
//! The circuit is an index-based graph. Nodes live in one insertion-ordered
//! table; gates and flip-flops hold `NodeId` indices into it, and the event
//! queue carries indices as well. That keeps the whole structure `Clone`,
//! which is what makes per-fault circuit clones in ATPG trivial.

use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::dff::{FlipFlop, FlipFlopId};
use crate::event::EventQueue;
use crate::gate::{Gate, GateId, GateKind, MAX_GATE_INPUTS};
use crate::logic::{LogicValue, Node, NodeId};

/// A circuit parsed from a netlist, plus its owned event queue.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub(crate) nodes: Vec<Node>,
    pub(crate) name_to_id: IndexMap<CompactString, NodeId>,
    pub(crate) gates: Vec<Gate>,
    pub(crate) flip_flops: Vec<FlipFlop>,
    /// Per node: whether some record drives it (gate output or flip-flop Q/Q̄).
    driven: Vec<bool>,
    /// Per node: gates reading it as an input.
    pub(crate) gate_fanout: Vec<Vec<GateId>>,
    /// Per node: flip-flops clocked by it.
    pub(crate) clk_fanout: Vec<Vec<FlipFlopId>>,
    /// Per node: flip-flops sampling it as D.
    pub(crate) d_fanout: Vec<Vec<FlipFlopId>>,
    primary_inputs: Vec<NodeId>,
    primary_outputs: Vec<NodeId>,
    pub(crate) queue: EventQueue,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    /// Look up a node by name, creating it on first reference.
    pub fn intern_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.nodes.len() as NodeId;
        let name = CompactString::from(name);
        self.nodes.push(Node::new(name.clone()));
        self.name_to_id.insert(name, id);
        self.driven.push(false);
        self.gate_fanout.push(Vec::new());
        self.clk_fanout.push(Vec::new());
        self.d_fanout.push(Vec::new());
        id
    }

    fn claim_driver(&mut self, node: NodeId) -> Result<(), String> {
        if self.driven[node as usize] {
            return Err(format!(
                "node '{}' is driven by more than one record",
                self.nodes[node as usize].name
            ));
        }
        self.driven[node as usize] = true;
        Ok(())
    }

    /// Add a combinational gate. Rejects empty or oversized input lists,
    /// gates reading their own output, and duplicate output drivers.
    pub fn add_gate(
        &mut self,
        kind: GateKind,
        rise_delay: u64,
        fall_delay: u64,
        output: NodeId,
        inputs: SmallVec<[NodeId; MAX_GATE_INPUTS]>,
    ) -> Result<GateId, String> {
        if inputs.is_empty() {
            return Err(format!("{} gate has no inputs", kind));
        }
        if inputs.len() > MAX_GATE_INPUTS {
            return Err(format!(
                "{} gate has {} inputs (maximum is {})",
                kind,
                inputs.len(),
                MAX_GATE_INPUTS
            ));
        }
        if inputs.contains(&output) {
            return Err(format!(
                "{} gate output '{}' is also one of its inputs",
                kind, self.nodes[output as usize].name
            ));
        }
        self.claim_driver(output)?;

        let id = self.gates.len() as GateId;
        for &input in &inputs {
            self.gate_fanout[input as usize].push(id);
        }
        self.gates
            .push(Gate::new(kind, rise_delay, fall_delay, output, inputs));
        Ok(id)
    }

    /// Add a D flip-flop. Q and Q̄ become driven nodes.
    pub fn add_flip_flop(
        &mut self,
        setup: u64,
        hold: u64,
        d: NodeId,
        clk: NodeId,
        q: NodeId,
        qn: NodeId,
    ) -> Result<FlipFlopId, String> {
        if q == qn {
            return Err(format!(
                "flip-flop Q and Qbar are the same node '{}'",
                self.nodes[q as usize].name
            ));
        }
        self.claim_driver(q)?;
        self.claim_driver(qn)?;

        let id = self.flip_flops.len() as FlipFlopId;
        self.clk_fanout[clk as usize].push(id);
        self.d_fanout[d as usize].push(id);
        self.flip_flops
            .push(FlipFlop::new(setup, hold, d, clk, q, qn));
        Ok(id)
    }

    /// Derive the primary input and output sets. Called once after the last
    /// record is added.
    ///
    /// A node is a primary input iff no gate output or flip-flop Q/Q̄ drives
    /// it; a primary output iff no gate input and no flip-flop D or CLK
    /// consumes it.
    pub fn finish(&mut self) {
        let mut consumed = vec![false; self.nodes.len()];
        for gate in &self.gates {
            for &input in &gate.inputs {
                consumed[input as usize] = true;
            }
        }
        for ff in &self.flip_flops {
            consumed[ff.d as usize] = true;
            consumed[ff.clk as usize] = true;
        }

        self.primary_inputs = (0..self.nodes.len() as NodeId)
            .filter(|&n| !self.driven[n as usize])
            .collect();
        self.primary_outputs = (0..self.nodes.len() as NodeId)
            .filter(|&n| !consumed[n as usize])
            .collect();
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn flip_flops(&self) -> &[FlipFlop] {
        &self.flip_flops
    }

    pub fn primary_inputs(&self) -> &[NodeId] {
        &self.primary_inputs
    }

    pub fn primary_outputs(&self) -> &[NodeId] {
        &self.primary_outputs
    }

    /// Current values of the primary outputs, in derivation order.
    pub fn output_values(&self) -> Vec<LogicValue> {
        self.primary_outputs
            .iter()
            .map(|&n| self.nodes[n as usize].read())
            .collect()
    }

    // ── Fault injection ─────────────────────────────────────────────────────

    /// Pin a node at `value` until [`Circuit::unlock_stuck_at`].
    pub fn lock_stuck_at(&mut self, node: NodeId, value: LogicValue) {
        self.nodes[node as usize].lock_stuck_at(value);
    }

    pub fn unlock_stuck_at(&mut self, node: NodeId) {
        self.nodes[node as usize].unlock_stuck_at();
    }

    /// Reset all simulation state: node values back to zero (stuck-at pins
    /// stay in place), gate and flip-flop history cleared, queue drained.
    pub fn reset_state(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        for gate in &mut self.gates {
            gate.reset();
        }
        for ff in &mut self.flip_flops {
            ff.reset();
        }
        self.queue.clear();
    }
}
