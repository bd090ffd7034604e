// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Built-in keyword setup routines.

use crate::keyword::KeywordId;
use crate::signature::{MatchCtx, Signature};

/// Split a comma separated keyword argument list, trimming each piece.
pub(crate) fn split_comma_args(input: &str) -> Vec<&str> {
    input.split(',').map(str::trim).collect()
}

/// Parse a hexadecimal bitmask argument, with or without a 0x prefix.
pub(crate) fn parse_bitmask(input: &str) -> Result<u64, String> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u64::from_str_radix(digits, 16).map_err(|_| format!("invalid bitmask: {}", input))
}

/// Mark the predecessor of a relative match so the matcher knows a
/// follower depends on it. Byte keywords can anchor a relative match
/// without carrying the flag themselves.
pub(crate) fn link_relative_predecessor(s: &mut Signature) -> Result<(), String> {
    let prev = s
        .last_sm_from_lists(&[
            KeywordId::Content,
            KeywordId::Pcre,
            KeywordId::ByteTest,
            KeywordId::ByteJump,
            KeywordId::IsDataAt,
        ])
        .ok_or_else(|| "relative match without a previous match to relate to".to_string())?;
    match &mut s.sm_mut(prev).ctx {
        MatchCtx::Content(cd) => cd.flags |= content::CONTENT_RELATIVE_NEXT,
        MatchCtx::Pcre(pd) => pd.flags |= pcre::PCRE_RELATIVE_NEXT,
        _ => {}
    }
    Ok(())
}

pub mod applayer_kw;
pub mod byte_jump;
pub mod content;
pub mod flow;
pub mod flowbits;
pub mod isdataat;
pub mod meta;
pub mod modifiers;
pub mod pcre;
pub mod requires;
pub mod sticky;
pub mod uint;
