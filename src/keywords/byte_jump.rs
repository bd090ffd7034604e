// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The byte_jump keyword: `bytes, offset [, options...]`.

use crate::common::{Endian, NumberOrName};
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{MatchCtx, Signature, LIST_PMATCH};
use crate::util::is_default;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteJumpData {
    pub count: usize,
    pub offset: NumberOrName<i32>,
    #[serde(skip_serializing_if = "is_default")]
    pub relative: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub multiplier: usize,
    #[serde(skip_serializing_if = "is_default")]
    pub endian: Endian,

    #[serde(skip_serializing_if = "is_default")]
    pub string: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub base: crate::common::Base,

    #[serde(skip_serializing_if = "is_default")]
    pub align: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub from_beginning: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub from_end: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub post_offset: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub dce: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub bitmask: u64,
}

pub fn parse_byte_jump(input: &str) -> Result<ByteJumpData, String> {
    let args = super::split_comma_args(input);
    if args.len() < 2 {
        return Err(format!(
            "byte_jump requires a byte count and an offset: {}",
            input
        ));
    }
    if args.iter().any(|a| a.is_empty()) {
        return Err(format!("empty byte_jump argument: {}", input));
    }

    let mut bj = ByteJumpData {
        count: args[0]
            .parse::<usize>()
            .map_err(|_| format!("invalid byte count: {}", args[0]))?,
        offset: NumberOrName::parse(args[1]),
        ..Default::default()
    };

    for arg in &args[2..] {
        let (name, param) = match arg.split_once(char::is_whitespace) {
            Some((name, param)) => (name, param.trim()),
            None => (*arg, ""),
        };
        match (name, param) {
            ("relative", "") => bj.relative = true,
            ("big", "") => bj.endian = Endian::Big,
            ("little", "") => bj.endian = Endian::Little,
            ("align", "") => bj.align = true,
            ("from_beginning", "") => bj.from_beginning = true,
            ("from_end", "") => bj.from_end = true,
            ("dce", "") => bj.dce = true,
            ("string", "") => bj.string = true,
            ("hex", "") => bj.base = crate::common::Base::Hex,
            ("dec", "") => bj.base = crate::common::Base::Dec,
            ("oct", "") => bj.base = crate::common::Base::Oct,
            ("multiplier", m) if !m.is_empty() => {
                bj.multiplier = m
                    .parse::<usize>()
                    .map_err(|_| format!("invalid multiplier: {}", m))?;
                if bj.multiplier == 0 {
                    return Err("byte_jump multiplier cannot be 0".to_string());
                }
            }
            ("post_offset", p) if !p.is_empty() => {
                bj.post_offset = p
                    .parse::<i64>()
                    .map_err(|_| format!("invalid post_offset: {}", p))?;
            }
            ("bitmask", mask) if !mask.is_empty() => {
                bj.bitmask = super::parse_bitmask(mask)?;
            }
            _ => return Err(format!("invalid byte_jump option: {}", arg)),
        }
    }

    if bj.from_beginning && bj.from_end {
        return Err("from_beginning and from_end cannot be combined".to_string());
    }
    if !bj.string && bj.count > 8 {
        return Err(format!(
            "byte_jump cannot extract more than 8 bytes without string: {}",
            bj.count
        ));
    }
    Ok(bj)
}

pub fn byte_jump_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("byte_jump requires a value"))?;
    let data = parse_byte_jump(value).map_err(SetupError::Error)?;

    if data.relative {
        super::link_relative_predecessor(s).map_err(SetupError::Error)?;
    }

    let list = s.init.list.unwrap_or(LIST_PMATCH);
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::ByteJump,
        MatchCtx::ByteJump(Box::new(data)),
        list,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::Base;

    #[test]
    fn test_required_args() {
        let bj = parse_byte_jump("2,64").unwrap();
        assert_eq!(bj.count, 2);
        assert_eq!(bj.offset, NumberOrName::Number(64));
        assert_eq!(bj.endian, Endian::Big);
        assert!(!bj.relative);

        assert!(parse_byte_jump("2").is_err());
        assert!(parse_byte_jump("two,64").is_err());
        assert!(parse_byte_jump("2,").is_err());
    }

    #[test]
    fn test_negative_and_named_offsets() {
        let bj = parse_byte_jump("2,-6,relative").unwrap();
        assert_eq!(bj.offset, NumberOrName::Number(-6));

        let bj = parse_byte_jump("2,hdr_len,relative").unwrap();
        assert_eq!(bj.offset, NumberOrName::Name("hdr_len".to_string()));
    }

    #[test]
    fn test_option_accumulation() {
        let bj = parse_byte_jump("2,64,relative,align,little,multiplier 3,post_offset -2").unwrap();
        assert!(bj.relative);
        assert!(bj.align);
        assert_eq!(bj.endian, Endian::Little);
        assert_eq!(bj.multiplier, 3);
        assert_eq!(bj.post_offset, -2);

        assert!(parse_byte_jump("2,64,multiplier 0").is_err());
        assert!(parse_byte_jump("2,64,multiplier").is_err());
        assert!(parse_byte_jump("2,64,sideways").is_err());
    }

    #[test]
    fn test_bitmask_is_hex() {
        let bj = parse_byte_jump("4,0,bitmask 3f").unwrap();
        assert_eq!(bj.bitmask, 0x3f);
        let bj = parse_byte_jump("4,0,bitmask 0xFF").unwrap();
        assert_eq!(bj.bitmask, 0xff);
        assert!(parse_byte_jump("4,0,bitmask zz").is_err());
    }

    #[test]
    fn test_anchor_conflict() {
        assert!(parse_byte_jump("4,0,from_beginning,from_end").is_err());
        parse_byte_jump("4,0,from_end,post_offset 12").unwrap();
    }

    #[test]
    fn test_string_width() {
        assert!(parse_byte_jump("10,0").is_err());
        let bj = parse_byte_jump("10,0,string,dec").unwrap();
        assert!(bj.string);
        assert_eq!(bj.base, Base::Dec);
    }

    #[test]
    fn test_serialize() {
        let bj = parse_byte_jump("2,64,relative,little").unwrap();
        let encoded = serde_json::to_value(&bj).unwrap();
        assert_eq!(encoded["count"], 2);
        assert_eq!(encoded["relative"], true);
        assert_eq!(encoded["endian"], "little");
    }
}
