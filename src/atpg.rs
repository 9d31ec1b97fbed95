// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Automatic test pattern generation for single stuck-at faults.
//!
//! The generator owns a reference ("good") circuit plus one faulty clone per
//! (node, stuck-at value) pair. Each trial draws as many random input
//! vectors as there are remaining faults, simulates every vector against the
//! reference and every remaining faulty circuit, keeps the vector that kills
//! the most faults, and repeats until the required coverage is met.
//!
//! Faulty circuits are independent instances; one trial simulates them in
//! parallel and reduces the per-vector kill counts deterministically.
//!
//! ATPG assumes a purely combinational circuit. A redundant (undetectable)
//! fault makes 100% coverage unreachable; the stall and trial caps in
//! [`AtpgOptions`] turn that into an explicit error instead of a hang.

use std::io::Write;

use compact_str::CompactString;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::circuit::Circuit;
use crate::logic::{LogicValue, NodeId};

/// One enumerated stuck-at fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub node: CompactString,
    pub stuck_at: LogicValue,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/sa{}", self.node, self.stuck_at)
    }
}

/// A faulty clone of the reference circuit with exactly one locked node.
#[derive(Debug, Clone)]
struct FaultCircuit {
    fault: Fault,
    circuit: Circuit,
}

/// Tuning knobs for the generation loop.
#[derive(Debug, Clone)]
pub struct AtpgOptions {
    /// Required fault coverage as a fraction in [0, 1]. Compared with a
    /// 0.001 slack.
    pub required_coverage: f64,
    /// Base PRNG seed. Drawn from the wall clock when absent; always logged
    /// so a run can be reproduced.
    pub seed: Option<u64>,
    /// Hard cap on the number of trials.
    pub max_trials: Option<usize>,
    /// Abort after this many consecutive trials whose best vector killed
    /// nothing. Guards against undetectable faults.
    pub max_stalled_trials: usize,
}

impl Default for AtpgOptions {
    fn default() -> Self {
        AtpgOptions {
            required_coverage: 1.0,
            seed: None,
            max_trials: None,
            max_stalled_trials: 25,
        }
    }
}

/// One chosen test vector and the faults it killed.
#[derive(Debug, Clone, Serialize)]
pub struct ChosenVector {
    /// (primary input name, bit) in input derivation order.
    pub assignments: Vec<(CompactString, u8)>,
    pub kills: Vec<Fault>,
    /// Accumulated coverage after applying this vector.
    pub coverage_after: f64,
}

/// Result of a completed generation run.
#[derive(Debug, Clone, Serialize)]
pub struct AtpgOutcome {
    pub vectors: Vec<ChosenVector>,
    pub coverage: f64,
    pub initial_faults: usize,
    pub trials: usize,
    pub seed: u64,
}

/// The ATPG driver.
#[derive(Debug)]
pub struct FaultVectorGenerator {
    good: Circuit,
    remaining: Vec<FaultCircuit>,
    initial_faults: usize,
}

impl FaultVectorGenerator {
    /// Build the reference circuit plus, for every node, one clone locked at
    /// 0 and one locked at 1.
    ///
    /// Fails on sequential circuits: random vectors at time 0 cannot
    /// exercise flip-flop state, so the loop would never terminate.
    pub fn new(circuit: &Circuit) -> Result<Self, String> {
        if !circuit.flip_flops().is_empty() {
            return Err(
                "ATPG requires a purely combinational circuit (netlist contains flip-flops)"
                    .to_string(),
            );
        }
        if circuit.primary_inputs().is_empty() {
            return Err("ATPG requires at least one primary input".to_string());
        }

        let mut remaining = Vec::with_capacity(circuit.nodes().len() * 2);
        for id in 0..circuit.nodes().len() as NodeId {
            for stuck_at in [LogicValue::Zero, LogicValue::One] {
                let mut faulty = circuit.clone();
                faulty.lock_stuck_at(id, stuck_at);
                remaining.push(FaultCircuit {
                    fault: Fault {
                        node: circuit.node(id).name.clone(),
                        stuck_at,
                    },
                    circuit: faulty,
                });
            }
        }

        let initial_faults = remaining.len();
        clilog::info!(
            "ATPG: {} primary inputs, {} primary outputs, {} enumerated faults",
            circuit.primary_inputs().len(),
            circuit.primary_outputs().len(),
            initial_faults
        );
        Ok(FaultVectorGenerator {
            good: circuit.clone(),
            remaining,
            initial_faults,
        })
    }

    pub fn remaining_faults(&self) -> usize {
        self.remaining.len()
    }

    /// Run the generation loop until the required coverage is met.
    pub fn generate(&mut self, opts: &AtpgOptions) -> Result<AtpgOutcome, String> {
        let inputs: Vec<NodeId> = self.good.primary_inputs().to_vec();
        let seed = opts.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
        clilog::info!("ATPG base seed {} (pass --seed {} to reproduce)", seed, seed);

        let timer = clilog::stimer!("atpg");
        let mut coverage = 0.0f64;
        let mut vectors = Vec::new();
        let mut trials = 0usize;
        let mut stalled = 0usize;

        while opts.required_coverage - coverage > 0.001 {
            if let Some(cap) = opts.max_trials {
                if trials >= cap {
                    return Err(format!(
                        "ATPG gave up after {} trials at {:.1}% coverage; \
                         the required {:.1}% may be unsatisfiable",
                        trials,
                        coverage * 100.0,
                        opts.required_coverage * 100.0
                    ));
                }
            }

            // One PRNG per trial, derived from the base seed so reruns with
            // the same seed replay the same vectors.
            let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(trials as u64));
            let trial_size = self.remaining.len();
            let trial_vectors: Vec<Vec<(NodeId, LogicValue)>> = (0..trial_size)
                .map(|_| {
                    inputs
                        .iter()
                        .map(|&n| (n, LogicValue::from_bit(rng.gen::<bool>() as u8)))
                        .collect()
                })
                .collect();

            let good_outputs: Vec<Vec<LogicValue>> = trial_vectors
                .iter()
                .map(|v| {
                    self.good.run_functional_vector(v);
                    self.good.output_values()
                })
                .collect();

            // kill_masks[f][v]: vector v exposes fault f.
            let kill_masks: Vec<Vec<bool>> = self
                .remaining
                .par_iter_mut()
                .map(|fc| {
                    trial_vectors
                        .iter()
                        .enumerate()
                        .map(|(vi, v)| {
                            fc.circuit.run_functional_vector(v);
                            fc.circuit.output_values() != good_outputs[vi]
                        })
                        .collect()
                })
                .collect();

            let mut best_vector = 0usize;
            let mut best_kills = 0usize;
            for vi in 0..trial_vectors.len() {
                let kills = kill_masks.iter().filter(|mask| mask[vi]).count();
                if kills > best_kills {
                    best_kills = kills;
                    best_vector = vi;
                }
            }

            trials += 1;
            if best_kills == 0 {
                stalled += 1;
                clilog::debug!("ATPG trial {}: no fault killed ({} stalled)", trials, stalled);
                if stalled >= opts.max_stalled_trials {
                    return Err(format!(
                        "ATPG stalled: {} consecutive trials killed no fault at {:.1}% \
                         coverage; remaining faults may be undetectable",
                        stalled,
                        coverage * 100.0
                    ));
                }
                continue;
            }
            stalled = 0;

            let mut kills = Vec::with_capacity(best_kills);
            let mut keep = Vec::with_capacity(self.remaining.len() - best_kills);
            for (fc, mask) in self.remaining.drain(..).zip(&kill_masks) {
                if mask[best_vector] {
                    kills.push(fc.fault);
                } else {
                    keep.push(fc);
                }
            }
            self.remaining = keep;

            coverage += best_kills as f64 / self.initial_faults as f64;
            clilog::info!(
                "ATPG trial {}: best vector kills {} fault(s), total coverage {:.1}%",
                trials,
                best_kills,
                coverage * 100.0
            );

            vectors.push(ChosenVector {
                assignments: inputs
                    .iter()
                    .zip(&trial_vectors[best_vector])
                    .map(|(&n, &(_, v))| (self.good.node(n).name.clone(), v.as_bit()))
                    .collect(),
                kills,
                coverage_after: coverage,
            });
        }

        clilog::finish!(timer);
        Ok(AtpgOutcome {
            vectors,
            coverage,
            initial_faults: self.initial_faults,
            trials,
            seed,
        })
    }
}

/// Write the plain-text fault vector report.
pub fn write_report<W: Write>(
    mut out: W,
    outcome: &AtpgOutcome,
    required_coverage: f64,
) -> std::io::Result<()> {
    writeln!(
        out,
        "This file contains a set of test vectors providing {}% fault coverage on the given circuit:",
        required_coverage * 100.0
    )?;
    for (i, vector) in outcome.vectors.iter().enumerate() {
        writeln!(
            out,
            "--------------- Test Vector #{} ---------------",
            i + 1
        )?;
        for (name, bit) in &vector.assignments {
            writeln!(out, "{} {}", name, bit)?;
        }
        writeln!(out, "Total Coverage = {}", vector.coverage_after)?;
    }
    Ok(())
}

/// Write the report to a file path.
pub fn write_report_file(
    path: impl AsRef<std::path::Path>,
    outcome: &AtpgOutcome,
    required_coverage: f64,
) -> Result<(), String> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    let mut buf = std::io::BufWriter::new(file);
    write_report(&mut buf, outcome, required_coverage)
        .and_then(|_| buf.flush())
        .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    clilog::info!("wrote fault vectors to {}", path.display());
    Ok(())
}
