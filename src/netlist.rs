// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Parser for the netlist format.
//!
//! One record per line, whitespace-separated, `#` begins a line comment.
//! Two record shapes:
//!
//! ```text
//! <output> .<KIND> <rise_delay> <fall_delay> <in1> [in2 ... in8]
//! <id>     .DFF    <setup> <hold> <D> <CLK> <Q> <Qbar>
//! ```
//!
//! with KIND one of AND, OR, XOR, NAND, NOR, XNOR. Node names are arbitrary
//! non-whitespace strings. All errors are fatal and carry the origin (file
//! name) and line number.

use std::path::Path;

use smallvec::SmallVec;

use crate::circuit::Circuit;
use crate::gate::{GateKind, MAX_GATE_INPUTS};
use crate::logic::NodeId;

/// Parse a netlist file into a circuit.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Circuit, String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read netlist {}: {}", path.display(), e))?;
    parse_str(&content, &path.display().to_string())
}

/// Parse netlist text. `origin` names the source in error messages.
pub fn parse_str(src: &str, origin: &str) -> Result<Circuit, String> {
    let mut circuit = Circuit::new();

    for (lineno, raw_line) in src.lines().enumerate() {
        let lineno = lineno + 1;
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        let fail = |msg: String| format!("{}:{}: {}", origin, lineno, msg);

        if tokens.len() < 2 {
            return Err(fail(format!("incomplete record '{}'", line.trim())));
        }
        let kind_token = tokens[1];
        if !kind_token.starts_with('.') {
            return Err(fail(format!(
                "expected a .KIND token, found '{}'",
                kind_token
            )));
        }

        match &kind_token[1..] {
            "DFF" => parse_dff_record(&mut circuit, &tokens).map_err(fail)?,
            other => {
                let kind = gate_kind_from_str(other)
                    .ok_or_else(|| fail(format!("unknown gate kind '.{}'", other)))?;
                parse_gate_record(&mut circuit, kind, &tokens).map_err(fail)?;
            }
        }
    }

    circuit.finish();
    clilog::debug!(
        "parsed netlist {}: {} nodes, {} gates, {} flip-flops",
        origin,
        circuit.nodes().len(),
        circuit.gates().len(),
        circuit.flip_flops().len()
    );
    Ok(circuit)
}

fn gate_kind_from_str(s: &str) -> Option<GateKind> {
    match s {
        "AND" => Some(GateKind::And),
        "OR" => Some(GateKind::Or),
        "XOR" => Some(GateKind::Xor),
        "NAND" => Some(GateKind::Nand),
        "NOR" => Some(GateKind::Nor),
        "XNOR" => Some(GateKind::Xnor),
        _ => None,
    }
}

fn parse_delay(token: &str, what: &str) -> Result<u64, String> {
    token
        .parse::<u64>()
        .map_err(|_| format!("invalid {} '{}' (expected a non-negative integer)", what, token))
}

fn parse_gate_record(circuit: &mut Circuit, kind: GateKind, tokens: &[&str]) -> Result<(), String> {
    // <output> .<KIND> <rise> <fall> <in1> [... in8]
    if tokens.len() < 5 {
        return Err(format!(
            "{} record needs an output, two delays and at least one input",
            kind
        ));
    }
    let rise = parse_delay(tokens[2], "rise delay")?;
    let fall = parse_delay(tokens[3], "fall delay")?;
    let input_names = &tokens[4..];
    if input_names.len() > MAX_GATE_INPUTS {
        return Err(format!(
            "{} record has {} inputs (maximum is {})",
            kind,
            input_names.len(),
            MAX_GATE_INPUTS
        ));
    }

    let output = circuit.intern_node(tokens[0]);
    let inputs: SmallVec<[NodeId; MAX_GATE_INPUTS]> = input_names
        .iter()
        .map(|name| circuit.intern_node(name))
        .collect();
    circuit.add_gate(kind, rise, fall, output, inputs)?;
    Ok(())
}

fn parse_dff_record(circuit: &mut Circuit, tokens: &[&str]) -> Result<(), String> {
    // <id> .DFF <setup> <hold> <D> <CLK> <Q> <Qbar>
    if tokens.len() != 8 {
        return Err("DFF record needs setup, hold, D, CLK, Q, Qbar".to_string());
    }
    let setup = parse_delay(tokens[2], "setup time")?;
    let hold = parse_delay(tokens[3], "hold time")?;
    let d = circuit.intern_node(tokens[4]);
    let clk = circuit.intern_node(tokens[5]);
    let q = circuit.intern_node(tokens[6]);
    let qn = circuit.intern_node(tokens[7]);
    circuit.add_flip_flop(setup, hold, d, clk, q, qn)?;
    Ok(())
}
