// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Command-line driver for the gate-level simulator.
//!
//! Fully scriptable through flags, but falls back to the interactive prompt
//! flow when no mode flag is given: netlist path, then y/n for timing
//! simulation, else y/n for functional simulation, else y/n for ATPG.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use gatesim::atpg::{self, AtpgOptions, FaultVectorGenerator};
use gatesim::circuit::Circuit;
use gatesim::netlist;
use gatesim::sim::vcd_io;
use gatesim::stimulus;

#[derive(Parser, Debug)]
#[command(name = "gatesim")]
#[command(about = "Gate-level logic simulator and stuck-at fault vector generator")]
struct Args {
    /// Netlist path. Prompted for when omitted.
    netlist: Option<PathBuf>,

    /// Run a timing (delay-aware) simulation.
    #[clap(long)]
    timing: bool,

    /// Run a functional (zero-delay) simulation.
    #[clap(long)]
    functional: bool,

    /// Run fault vector generation.
    #[clap(long)]
    atpg: bool,

    /// Stimulus path for either simulation mode. Prompted for when omitted.
    #[clap(long)]
    stimulus: Option<PathBuf>,

    /// Required ATPG fault coverage in percent (0-100).
    #[clap(long)]
    coverage: Option<f64>,

    /// Output path: VCD for simulations (default timing_sim.vcd /
    /// functional_sim.vcd), report text for ATPG (default fault_vectors.txt).
    #[clap(long)]
    output: Option<PathBuf>,

    /// Base PRNG seed for ATPG. Random runs print the seed they drew.
    #[clap(long)]
    seed: Option<u64>,

    /// Hard cap on ATPG trials.
    #[clap(long)]
    max_trials: Option<usize>,

    /// Abort ATPG after this many consecutive zero-kill trials.
    #[clap(long, default_value_t = 25)]
    max_stalled_trials: usize,

    /// Write a JSON summary (violations / ATPG outcome) to this path.
    #[clap(long)]
    report_json: Option<PathBuf>,
}

fn fail(msg: &str) -> ! {
    clilog::error!("{}", msg);
    std::process::exit(1);
}

fn prompt(msg: &str) -> String {
    print!("{}: ", msg);
    std::io::stdout().flush().expect("cannot flush stdout");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .expect("cannot read stdin");
    line.trim().to_string()
}

fn prompt_yes_no(msg: &str) -> bool {
    loop {
        match prompt(&format!("{} [y/n]", msg)).as_str() {
            "y" => return true,
            "n" => return false,
            _ => continue,
        }
    }
}

fn load_circuit(path: &PathBuf) -> Circuit {
    match netlist::parse_file(path) {
        Ok(c) => c,
        Err(e) => fail(&e),
    }
}

fn load_stimulus(path: Option<PathBuf>) -> Vec<stimulus::StimulusRecord> {
    let path = path.unwrap_or_else(|| PathBuf::from(prompt("Enter stimulus file")));
    match stimulus::parse_file(&path) {
        Ok(s) => s,
        Err(e) => fail(&e),
    }
}

fn write_json(path: &PathBuf, value: &serde_json::Value) {
    let text = serde_json::to_string_pretty(value).expect("cannot serialize report");
    if let Err(e) = std::fs::write(path, text) {
        fail(&format!("cannot write {}: {}", path.display(), e));
    }
    clilog::info!("wrote JSON report to {}", path.display());
}

fn run_simulation(args: &Args, timing: bool) {
    let netlist_path = args
        .netlist
        .clone()
        .unwrap_or_else(|| PathBuf::from(prompt("Enter netlist file")));
    let mut circuit = load_circuit(&netlist_path);
    let stim = load_stimulus(args.stimulus.clone());

    let (result, default_out) = if timing {
        clilog::info!("starting timing simulation");
        (circuit.run_timing(&stim), "timing_sim.vcd")
    } else {
        clilog::info!("starting functional simulation");
        (circuit.run_functional(&stim), "functional_sim.vcd")
    };

    let out = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_out));
    if let Err(e) = vcd_io::write_vcd_file(&out, &circuit, &result.trace) {
        fail(&e);
    }

    if timing {
        clilog::info!(
            "simulation finished with {} setup/hold violation(s)",
            result.violations.len()
        );
    }
    clilog::info!("final node values:");
    for node in circuit.nodes() {
        clilog::info!("  {} = {}", node.name, node.read());
    }

    if let Some(path) = &args.report_json {
        write_json(
            path,
            &serde_json::json!({
                "mode": if timing { "timing" } else { "functional" },
                "violations": result.violations,
            }),
        );
    }
}

fn run_atpg(args: &Args) {
    let netlist_path = args
        .netlist
        .clone()
        .unwrap_or_else(|| PathBuf::from(prompt("Enter netlist file")));
    let circuit = load_circuit(&netlist_path);

    let coverage_pct = args.coverage.unwrap_or_else(|| loop {
        if let Ok(v) = prompt("Minimum required coverage? (Value between 0-100)").parse::<f64>() {
            if (0.0..=100.0).contains(&v) {
                break v;
            }
        }
    });
    if !(0.0..=100.0).contains(&coverage_pct) {
        fail(&format!(
            "required coverage {} is out of range (0-100)",
            coverage_pct
        ));
    }

    let opts = AtpgOptions {
        required_coverage: coverage_pct / 100.0,
        seed: args.seed,
        max_trials: args.max_trials,
        max_stalled_trials: args.max_stalled_trials,
    };

    let mut generator = match FaultVectorGenerator::new(&circuit) {
        Ok(g) => g,
        Err(e) => fail(&e),
    };
    let outcome = match generator.generate(&opts) {
        Ok(o) => o,
        Err(e) => fail(&e),
    };

    let out = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("fault_vectors.txt"));
    if let Err(e) = atpg::write_report_file(&out, &outcome, opts.required_coverage) {
        fail(&e);
    }
    clilog::info!(
        "ATPG done: {} vector(s), {:.1}% coverage in {} trial(s)",
        outcome.vectors.len(),
        outcome.coverage * 100.0,
        outcome.trials
    );

    if let Some(path) = &args.report_json {
        write_json(path, &serde_json::json!({ "mode": "atpg", "atpg": outcome }));
    }
}

fn main() {
    clilog::init_stderr_color_debug();

    let mut args = Args::parse();

    let mode_flags = args.timing as u8 + args.functional as u8 + args.atpg as u8;
    if mode_flags > 1 {
        fail("--timing, --functional and --atpg are mutually exclusive");
    }

    if mode_flags == 1 {
        if args.timing {
            run_simulation(&args, true);
        } else if args.functional {
            run_simulation(&args, false);
        } else {
            run_atpg(&args);
        }
        return;
    }

    // Interactive flow: ask for each operation in turn, first yes wins.
    if args.netlist.is_none() {
        args.netlist = Some(PathBuf::from(prompt("Enter netlist file")));
    }
    if prompt_yes_no("Run Timing Simulation?") {
        run_simulation(&args, true);
    } else if prompt_yes_no("Run Functional Simulation?") {
        run_simulation(&args, false);
    } else if prompt_yes_no("Run Fault Vector Generation?") {
        run_atpg(&args);
    } else {
        clilog::info!("nothing to do");
    }
}
