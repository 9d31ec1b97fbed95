// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Gate-level digital logic simulator and stuck-at fault vector generator.
//!
//! One circuit model, parsed from a line-oriented netlist, supports three
//! operations:
//!
//! - delay-aware timing simulation with inertial-delay event cancellation
//!   and setup/hold checking ([`sim`]),
//! - zero-delay functional simulation of the settled logic state ([`sim`]),
//! - random-search test pattern generation for single stuck-at faults
//!   ([`atpg`]).

pub mod logic;

pub mod gate;

pub mod dff;

pub mod event;

pub mod netlist;

pub mod stimulus;

pub mod circuit;

pub mod sim;

pub mod atpg;
