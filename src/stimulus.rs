// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Parser for the stimulus format: one `<time> <node_name> <value>` record
//! per line, value 0 or 1. Times are accepted as non-negative numbers and
//! rounded toward zero.

use std::path::Path;

use compact_str::CompactString;

use crate::logic::LogicValue;

/// One primary-input change at an absolute time.
#[derive(Debug, Clone)]
pub struct StimulusRecord {
    pub time: u64,
    pub node: CompactString,
    pub value: LogicValue,
}

/// Parse a stimulus file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<StimulusRecord>, String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read stimulus {}: {}", path.display(), e))?;
    parse_str(&content, &path.display().to_string())
}

/// Parse stimulus text. `origin` names the source in error messages.
pub fn parse_str(src: &str, origin: &str) -> Result<Vec<StimulusRecord>, String> {
    let mut records = Vec::new();

    for (lineno, line) in src.lines().enumerate() {
        let lineno = lineno + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let fail = |msg: String| format!("{}:{}: {}", origin, lineno, msg);

        if tokens.len() != 3 {
            return Err(fail(format!(
                "expected '<time> <node> <value>', found '{}'",
                line.trim()
            )));
        }

        let time_f: f64 = tokens[0]
            .parse()
            .map_err(|_| fail(format!("invalid time '{}'", tokens[0])))?;
        if !time_f.is_finite() || time_f < 0.0 {
            return Err(fail(format!("time '{}' must be non-negative", tokens[0])));
        }
        let time = time_f.trunc() as u64;

        let value = match tokens[2] {
            "0" => LogicValue::Zero,
            "1" => LogicValue::One,
            other => return Err(fail(format!("invalid value '{}' (expected 0 or 1)", other))),
        };

        records.push(StimulusRecord {
            time,
            node: CompactString::from(tokens[1]),
            value,
        });
    }

    Ok(records)
}
