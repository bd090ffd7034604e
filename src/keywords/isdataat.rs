// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The isdataat keyword.

use crate::common::NumberOrName;
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{MatchCtx, Signature, LIST_PMATCH};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsDataAtData {
    pub position: NumberOrName<u16>,
    pub negated: bool,
    pub relative: bool,
    pub rawbytes: bool,
}

pub fn parse_isdataat(input: &str) -> Result<IsDataAtData, String> {
    let mut parts = input.split(',');
    let position = parts
        .next()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| format!("invalid isdataat: {}", input))?;

    let (negated, position) = match position.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, position),
    };
    let position = NumberOrName::parse(position);

    let mut data = IsDataAtData {
        position,
        negated,
        relative: false,
        rawbytes: false,
    };
    for part in parts {
        match part.trim() {
            "relative" => data.relative = true,
            "rawbytes" => data.rawbytes = true,
            other => return Err(format!("invalid isdataat option: {}", other)),
        }
    }
    Ok(data)
}

pub fn isdataat_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("isdataat requires a value"))?;
    let data = parse_isdataat(value).map_err(SetupError::Error)?;

    if data.relative {
        super::link_relative_predecessor(s).map_err(SetupError::Error)?;
    }

    let list = s.init.list.unwrap_or(LIST_PMATCH);
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::IsDataAt,
        MatchCtx::IsDataAt(data),
        list,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_isdataat() {
        let d = parse_isdataat("100").unwrap();
        assert_eq!(d.position, NumberOrName::Number(100));
        assert!(!d.negated);

        let d = parse_isdataat("!100,relative").unwrap();
        assert!(d.negated);
        assert!(d.relative);

        let d = parse_isdataat("!100,relative,rawbytes").unwrap();
        assert!(d.rawbytes);

        assert!(parse_isdataat("100,bogus").is_err());
    }
}
