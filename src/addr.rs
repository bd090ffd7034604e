// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Rule address field parsing.
//!
//! This is the compact stand-in for the engine's full address group
//! parser: it resolves `any`, literals, CIDR blocks, `$VAR` references and
//! nested, negatable bracket lists into a normalized entry list the core
//! can compare for set equivalence.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressKind {
    Ipv4 { first: u32, last: u32 },
    Ipv6 { first: u128, last: u128 },
    Var(String),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressEntry {
    pub negated: bool,
    pub kind: AddressKind,
}

/// A parsed rule address field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressList {
    pub any: bool,
    pub entries: Vec<AddressEntry>,
    pub contains_negation: bool,
}

fn ipv4_cidr(net: Ipv4Addr, mask: u8) -> Result<AddressKind, String> {
    if mask > 32 {
        return Err(format!("invalid ipv4 netmask: {}", mask));
    }
    let bits: u32 = if mask == 0 { 0 } else { !0u32 << (32 - mask) };
    let net: u32 = net.into();
    Ok(AddressKind::Ipv4 {
        first: net & bits,
        last: (net & bits) | !bits,
    })
}

fn ipv6_cidr(net: Ipv6Addr, mask: u8) -> Result<AddressKind, String> {
    if mask > 128 {
        return Err(format!("invalid ipv6 netmask: {}", mask));
    }
    let bits: u128 = if mask == 0 { 0 } else { !0u128 << (128 - mask) };
    let net: u128 = net.into();
    Ok(AddressKind::Ipv6 {
        first: net & bits,
        last: (net & bits) | !bits,
    })
}

fn parse_single(input: &str) -> Result<AddressKind, String> {
    if let Some(name) = input.strip_prefix('$') {
        if name.is_empty() {
            return Err("empty address variable".to_string());
        }
        return Ok(AddressKind::Var(input.to_string()));
    }
    if let Some((addr, mask)) = input.split_once('/') {
        let mask: u8 = mask
            .parse()
            .map_err(|_| format!("invalid netmask: {}", mask))?;
        if let Ok(v4) = addr.parse::<Ipv4Addr>() {
            return ipv4_cidr(v4, mask);
        }
        if let Ok(v6) = addr.parse::<Ipv6Addr>() {
            return ipv6_cidr(v6, mask);
        }
        return Err(format!("invalid address: {}", input));
    }
    if let Ok(v4) = input.parse::<Ipv4Addr>() {
        let ip: u32 = v4.into();
        return Ok(AddressKind::Ipv4 {
            first: ip,
            last: ip,
        });
    }
    if let Ok(v6) = input.parse::<Ipv6Addr>() {
        let ip: u128 = v6.into();
        return Ok(AddressKind::Ipv6 {
            first: ip,
            last: ip,
        });
    }
    Err(format!("invalid address: {}", input))
}

/// Split a bracket list body on top level commas.
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

fn parse_into(list: &mut AddressList, input: &str, negated: bool) -> Result<(), String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty address".to_string());
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
        if negated {
            return Err("address \"any\" cannot be negated".to_string());
        }
        return Err("\"any\" is not allowed inside an address list".to_string());
    }
    let kind = parse_single(input)?;
    list.entries.push(AddressEntry { negated, kind });
    Ok(())
}

/// Parse a rule address field.
pub fn parse_address_list(input: &str) -> Result<AddressList, String> {
    let input = input.trim();
    let mut list = AddressList::default();
    if input.eq_ignore_ascii_case("any") {
        list.any = true;
        return Ok(list);
    }
    if input.eq_ignore_ascii_case("!any") {
        return Err("address \"any\" cannot be negated".to_string());
    }
    parse_into(&mut list, input, false)?;
    Ok(list)
}

/// Set equivalence of two address fields.
///
/// Entries are compared as normalized sets, so `[a,b]` equals `[b,a]`.
pub fn lists_equal(a: &AddressList, b: &AddressList) -> bool {
    if a.any != b.any {
        return false;
    }
    let mut ea = a.entries.clone();
    let mut eb = b.entries.clone();
    ea.sort();
    ea.dedup();
    eb.sort();
    eb.dedup();
    ea == eb
}

/// A CIDR entry for the IP-only fast path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpOnlyCidr {
    pub negated: bool,
    pub kind: AddressKind,
}

/// Re-parse an address field for an IP-only rule.
///
/// IP-only rules cannot carry `$VAR` references that are unresolved at
/// this point; everything else reduces to CIDR ranges.
pub fn parse_ip_only(input: &str) -> Result<Vec<IpOnlyCidr>, String> {
    let list = parse_address_list(input)?;
    if list.any {
        return Ok(vec![]);
    }
    let mut out = Vec::with_capacity(list.entries.len());
    for entry in list.entries {
        if let AddressKind::Var(name) = &entry.kind {
            return Err(format!("unresolved address variable: {}", name));
        }
        out.push(IpOnlyCidr {
            negated: entry.negated,
            kind: entry.kind,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_single_host() {
        let list = parse_address_list("1.2.3.4").unwrap();
        assert!(!list.any);
        assert_eq!(list.entries.len(), 1);
        assert!(!list.contains_negation);
    }

    #[test]
    fn test_parse_any() {
        let list = parse_address_list("any").unwrap();
        assert!(list.any);
        assert!(list.entries.is_empty());

        assert!(parse_address_list("!any").is_err());
    }

    #[test]
    fn test_parse_negated() {
        let list = parse_address_list("!1.2.3.4").unwrap();
        assert!(list.contains_negation);
        assert!(list.entries[0].negated);
    }

    #[test]
    fn test_parse_cidr() {
        let list = parse_address_list("10.0.0.0/8").unwrap();
        match &list.entries[0].kind {
            AddressKind::Ipv4 { first, last } => {
                assert_eq!(*first, u32::from(Ipv4Addr::new(10, 0, 0, 0)));
                assert_eq!(*last, u32::from(Ipv4Addr::new(10, 255, 255, 255)));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(parse_address_list("10.0.0.0/40").is_err());
    }

    #[test]
    fn test_parse_nested_list() {
        let list = parse_address_list("[1.1.1.1, [2.2.2.2, !3.3.3.3], $HOME_NET]").unwrap();
        assert_eq!(list.entries.len(), 4);
        assert!(list.contains_negation);
    }

    #[test]
    fn test_lists_equal() {
        let a = parse_address_list("[1.1.1.1, 2.2.2.2]").unwrap();
        let b = parse_address_list("[2.2.2.2, 1.1.1.1]").unwrap();
        assert!(lists_equal(&a, &b));

        let c = parse_address_list("[1.1.1.1]").unwrap();
        assert!(!lists_equal(&a, &c));

        let any = parse_address_list("any").unwrap();
        assert!(!lists_equal(&a, &any));
        assert!(lists_equal(&any, &parse_address_list("any").unwrap()));
    }

    #[test]
    fn test_ip_only() {
        assert!(parse_ip_only("any").unwrap().is_empty());
        assert_eq!(parse_ip_only("[1.1.1.1, !2.2.2.0/24]").unwrap().len(), 2);
        assert!(parse_ip_only("$HOME_NET").is_err());
    }
}
