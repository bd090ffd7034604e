// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Rule port field parsing.
//!
//! Stand-in for the engine's port group parser. Handles `any`, single
//! ports, open and closed ranges, negation and bracket lists. All bounds
//! are validated against the 16 bit port space, so `1024:65536` is a
//! parse error.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    pub negated: bool,
    pub first: u16,
    pub last: u16,
}

/// A parsed rule port field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortList {
    pub any: bool,
    pub ranges: Vec<PortRange>,
    pub contains_negation: bool,
}

fn parse_port(input: &str) -> Result<u16, String> {
    input
        .trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid port: {}", input))
}

fn split_list(input: &str) -> Result<Vec<&str>, String> {
    let mut items = vec![];
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced brackets in: {}", input));
                }
            }
            ',' if depth == 0 => {
                items.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!("unbalanced brackets in: {}", input));
    }
    items.push(input[start..].trim());
    Ok(items)
}

fn parse_into(list: &mut PortList, input: &str, negated: bool) -> Result<(), String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty port".to_string());
    }
    if let Some(rest) = input.strip_prefix('!') {
        list.contains_negation = true;
        return parse_into(list, rest, !negated);
    }
    if let Some(inner) = input.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| format!("unbalanced brackets in: {}", input))?;
        for item in split_list(inner)? {
            parse_into(list, item, negated)?;
        }
        return Ok(());
    }
    if input.eq_ignore_ascii_case("any") {
        return Err("port \"any\" cannot be negated or listed".to_string());
    }
    let range = if let Some((lo, hi)) = input.split_once(':') {
        let first = if lo.is_empty() { 0 } else { parse_port(lo)? };
        let last = if hi.is_empty() {
            u16::MAX
        } else {
            parse_port(hi)?
        };
        if first > last {
            return Err(format!("inverted port range: {}", input));
        }
        PortRange {
            negated,
            first,
            last,
        }
    } else {
        let port = parse_port(input)?;
        PortRange {
            negated,
            first: port,
            last: port,
        }
    };
    list.ranges.push(range);
    Ok(())
}

/// Parse a rule port field.
pub fn parse_port_list(input: &str) -> Result<PortList, String> {
    let input = input.trim();
    let mut list = PortList::default();
    if input.eq_ignore_ascii_case("any") {
        list.any = true;
        return Ok(list);
    }
    parse_into(&mut list, input, false)?;
    Ok(list)
}

/// Set equivalence of two port fields.
pub fn lists_equal(a: &PortList, b: &PortList) -> bool {
    if a.any != b.any {
        return false;
    }
    let mut ra = a.ranges.clone();
    let mut rb = b.ranges.clone();
    ra.sort();
    ra.dedup();
    rb.sort();
    rb.dedup();
    ra == rb
}
