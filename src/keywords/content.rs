// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The content keyword: the pattern primitive everything else builds on.

use crate::common::NumberOrName;
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{MatchCtx, Signature, LIST_PMATCH};
use serde::{Deserialize, Serialize};

pub const CONTENT_NOCASE: u32 = 1 << 0;
pub const CONTENT_NEGATED: u32 = 1 << 1;
pub const CONTENT_RAWBYTES: u32 = 1 << 2;
pub const CONTENT_DEPTH: u32 = 1 << 3;
pub const CONTENT_OFFSET: u32 = 1 << 4;
pub const CONTENT_WITHIN: u32 = 1 << 5;
pub const CONTENT_DISTANCE: u32 = 1 << 6;
/// Set on a match when its successor matches relative to it.
pub const CONTENT_RELATIVE_NEXT: u32 = 1 << 7;
pub const CONTENT_STARTSWITH: u32 = 1 << 8;
pub const CONTENT_ENDSWITH: u32 = 1 << 9;
pub const CONTENT_FAST_PATTERN: u32 = 1 << 10;
pub const CONTENT_FAST_PATTERN_ONLY: u32 = 1 << 11;
pub const CONTENT_REPLACE: u32 = 1 << 12;

/// Parsed content pattern with its modifier state.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentData {
    pub pattern: Vec<u8>,
    pub flags: u32,
    pub depth: u16,
    pub offset: u16,
    pub distance: NumberOrName<i32>,
    pub within: NumberOrName<i32>,
}

impl ContentData {
    pub fn new(pattern: Vec<u8>) -> Self {
        ContentData {
            pattern,
            ..Default::default()
        }
    }

    pub fn is_relative(&self) -> bool {
        self.flags & (CONTENT_WITHIN | CONTENT_DISTANCE) != 0
    }

    pub fn is_rawbytes(&self) -> bool {
        self.flags & CONTENT_RAWBYTES != 0
    }

    pub fn is_replace(&self) -> bool {
        self.flags & CONTENT_REPLACE != 0
    }

    pub fn is_negated(&self) -> bool {
        self.flags & CONTENT_NEGATED != 0
    }
}

/// Parse a content pattern into bytes, interpreting `|..|` hex pipes and
/// the `\\`, `\"`, `\;`, `\:` and `\|` escapes.
pub fn parse_content_pattern(input: &str) -> Result<Vec<u8>, String> {
    let mut out: Vec<u8> = vec![];
    let mut chars = input.chars();
    let mut hex = false;
    let mut hexbuf = String::new();

    while let Some(c) = chars.next() {
        if hex {
            match c {
                '|' => {
                    if !hexbuf.is_empty() {
                        return Err(format!("incomplete hex code in content: {}", input));
                    }
                    hex = false;
                }
                ' ' => {}
                c if c.is_ascii_hexdigit() => {
                    hexbuf.push(c);
                    if hexbuf.len() == 2 {
                        // The from_str_radix cannot fail on two hex digits.
                        out.push(u8::from_str_radix(&hexbuf, 16).unwrap_or(0));
                        hexbuf.clear();
                    }
                }
                _ => return Err(format!("invalid hex code in content: {}", input)),
            }
        } else {
            match c {
                '|' => hex = true,
                '\\' => match chars.next() {
                    Some(e @ (':' | ';' | '"' | '\\' | '|')) => out.push(e as u8),
                    Some(other) => {
                        return Err(format!("invalid escape \"\\{}\" in content", other))
                    }
                    None => return Err("invalid escape at end of content".to_string()),
                },
                '"' => return Err("unescaped quote in content".to_string()),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }
    if hex {
        return Err(format!("unbalanced hex pipes in content: {}", input));
    }
    if out.is_empty() {
        return Err("empty content pattern".to_string());
    }
    Ok(out)
}

pub fn content_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("content requires a pattern"))?;
    let pattern = parse_content_pattern(value).map_err(SetupError::Error)?;

    let mut cd = ContentData::new(pattern);
    if s.init.negated {
        cd.flags |= CONTENT_NEGATED;
    }

    let list = s.init.list.unwrap_or(LIST_PMATCH);
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Content,
        MatchCtx::Content(Box::new(cd)),
        list,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(parse_content_pattern("abc").unwrap(), b"abc");
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(
            parse_content_pattern("|ff|SMB").unwrap(),
            &[0xff, b'S', b'M', b'B']
        );
        assert_eq!(
            parse_content_pattern("|10 00 00 00|").unwrap(),
            &[0x10, 0, 0, 0]
        );
        assert!(parse_content_pattern("|f|").is_err());
        assert!(parse_content_pattern("|zz|").is_err());
        assert!(parse_content_pattern("|ff").is_err());
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(parse_content_pattern(r#"a\;b"#).unwrap(), b"a;b");
        assert_eq!(parse_content_pattern(r#"a\"b"#).unwrap(), br#"a"b"#);
        assert_eq!(parse_content_pattern(r#"a\\b"#).unwrap(), br"a\b");
        assert_eq!(parse_content_pattern(r#"a\|b"#).unwrap(), b"a|b");
        assert!(parse_content_pattern(r#"a\nb"#).is_err());
        assert!(parse_content_pattern("a\"b").is_err());
    }

    #[test]
    fn test_empty() {
        assert!(parse_content_pattern("").is_err());
    }
}
