// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The pcre keyword. Patterns are stored for the matcher compile stage;
//! this layer parses the `/pattern/modifiers` form and wires relative
//! match linkage for the `R` modifier.

use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::keywords::content::CONTENT_RELATIVE_NEXT;
use crate::signature::{MatchCtx, Signature, LIST_PMATCH};
use serde::{Deserialize, Serialize};

pub const PCRE_CASELESS: u32 = 1 << 0;
pub const PCRE_RELATIVE: u32 = 1 << 1;
pub const PCRE_RELATIVE_NEXT: u32 = 1 << 2;
pub const PCRE_NEGATED: u32 = 1 << 3;

static KNOWN_MODIFIERS: &str = "ismxAEGRUB";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcreData {
    pub pattern: String,
    pub modifiers: String,
    pub flags: u32,
}

/// Split `/pattern/modifiers`, honoring escaped slashes in the pattern.
pub fn parse_pcre(input: &str) -> Result<PcreData, String> {
    let rest = input
        .strip_prefix('/')
        .ok_or_else(|| format!("pcre is missing the leading /: {}", input))?;

    let mut end = None;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '/' {
            end = Some(i);
        }
    }
    let end = end.ok_or_else(|| format!("pcre is missing the closing /: {}", input))?;

    let pattern = &rest[0..end];
    let modifiers = &rest[end + 1..];
    if pattern.is_empty() {
        return Err("empty pcre pattern".to_string());
    }

    let mut data = PcreData {
        pattern: pattern.to_string(),
        modifiers: modifiers.to_string(),
        flags: 0,
    };
    for m in modifiers.chars() {
        match m {
            'i' => data.flags |= PCRE_CASELESS,
            'R' => data.flags |= PCRE_RELATIVE,
            c if KNOWN_MODIFIERS.contains(c) => {}
            c => return Err(format!("unknown regex modifier '{}'", c)),
        }
    }
    Ok(data)
}

pub fn pcre_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("pcre requires a pattern"))?;
    let mut pd = parse_pcre(value).map_err(SetupError::Error)?;
    if s.init.negated {
        pd.flags |= PCRE_NEGATED;
    }

    if pd.flags & PCRE_RELATIVE != 0 {
        let prev = s
            .last_sm_from_lists(&[KeywordId::Content, KeywordId::Pcre])
            .ok_or_else(|| {
                SetupError::error("relative pcre needs a preceding content or pcre option")
            })?;
        match &mut s.sm_mut(prev).ctx {
            MatchCtx::Content(cd) => cd.flags |= CONTENT_RELATIVE_NEXT,
            MatchCtx::Pcre(pd) => pd.flags |= PCRE_RELATIVE_NEXT,
            _ => {}
        }
    }

    let list = s.init.list.unwrap_or(LIST_PMATCH);
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Pcre,
        MatchCtx::Pcre(Box::new(pd)),
        list,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}
