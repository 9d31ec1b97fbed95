// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Time-ordered event queue for the simulation drivers.
//!
//! A min-heap keyed by (scheduled time, insertion sequence). The sequence
//! counter gives FIFO order among equal-time events, which makes simulation
//! runs deterministic independent of heap internals.
//!
//! The one unusual operation is [`EventQueue::cancel_updates_to`]: it removes
//! every pending node update targeting a given node, which is what gives the
//! timing simulator inertial-delay semantics. Cancellation rebuilds the heap
//! in O(n); cancels are rare relative to normal processing, so that cost is
//! acceptable.

use std::collections::BinaryHeap;

use crate::dff::FlipFlopId;
use crate::gate::{Gate, GateId};
use crate::logic::{LogicValue, NodeId};

/// Payload of a scheduled event.
#[derive(Debug, Clone, Copy)]
pub enum EventKind {
    /// Write `value` into `node` and fan out to its readers.
    NodeUpdate { node: NodeId, value: LogicValue },
    /// Re-evaluate a gate whose inputs changed.
    GateRecompute { gate: GateId },
    /// A flip-flop clock node changed; check for a rising edge.
    FlipFlopClockTick { ff: FlipFlopId },
}

#[derive(Debug, Clone)]
struct HeapEntry {
    time: u64,
    seq: u64,
    kind: EventKind,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // Inverted so the std max-heap pops the earliest (time, seq) first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending simulation events.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    /// Schedule `kind` at absolute `time`. O(log n).
    pub fn push(&mut self, time: u64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapEntry { time, seq, kind });
    }

    /// Remove and return the earliest event. O(log n).
    pub fn pop(&mut self) -> Option<(u64, EventKind)> {
        self.heap.pop().map(|e| (e.time, e.kind))
    }

    /// Remove every pending [`EventKind::NodeUpdate`] targeting `node` and,
    /// if any were removed, revert the owning gate's committed output.
    ///
    /// Returns the number of removed events.
    pub fn cancel_updates_to(&mut self, node: NodeId, owning_gate: &mut Gate) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|e| !matches!(e.kind, EventKind::NodeUpdate { node: n, .. } if n == node));
        let removed = before - self.heap.len();
        if removed > 0 {
            owning_gate.revert();
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateKind;
    use smallvec::smallvec;

    fn update(node: NodeId, bit: u8) -> EventKind {
        EventKind::NodeUpdate {
            node,
            value: LogicValue::from_bit(bit),
        }
    }

    #[test]
    fn test_pop_in_time_order() {
        let mut q = EventQueue::new();
        q.push(30, update(0, 1));
        q.push(10, update(1, 1));
        q.push(20, update(2, 1));

        let times: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|(t, _)| t).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_equal_times_pop_fifo() {
        let mut q = EventQueue::new();
        for i in 0..5u32 {
            q.push(7, update(i, 1));
        }
        let order: Vec<NodeId> = std::iter::from_fn(|| q.pop())
            .map(|(_, k)| match k {
                EventKind::NodeUpdate { node, .. } => node,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_removes_only_matching_updates() {
        let mut gate = Gate::new(GateKind::And, 1, 1, 9, smallvec![0, 1]);
        let mut q = EventQueue::new();
        q.push(5, update(9, 1));
        q.push(6, update(3, 1));
        q.push(7, update(9, 0));
        q.push(8, EventKind::GateRecompute { gate: 0 });

        let removed = q.cancel_updates_to(9, &mut gate);
        assert_eq!(removed, 2);
        assert_eq!(q.len(), 2);

        // Untouched events still come out in order.
        let (t, _) = q.pop().unwrap();
        assert_eq!(t, 6);
        let (t, _) = q.pop().unwrap();
        assert_eq!(t, 8);
    }

    #[test]
    fn test_cancel_without_match_leaves_gate_alone() {
        let mut gate = Gate::new(GateKind::And, 1, 1, 9, smallvec![0, 1]);
        let mut ns = vec![
            crate::logic::Node::new("a".into()),
            crate::logic::Node::new("b".into()),
        ];
        ns[0].write(LogicValue::One);
        ns[1].write(LogicValue::One);
        gate.evaluate(&ns); // committed output now 1

        let mut q = EventQueue::new();
        q.push(5, update(3, 1));
        let removed = q.cancel_updates_to(9, &mut gate);
        assert_eq!(removed, 0);
        assert_eq!(gate.output_value(), LogicValue::One);
    }
}
