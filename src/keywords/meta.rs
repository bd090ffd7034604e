// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Rule metadata keywords: sid, gid, rev, msg, priority, classtype,
//! reference and metadata.

use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::Signature;
use crate::util::strip_quotes;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub scheme: String,
    pub reference: String,
}

fn parse_u32(keyword: &str, value: Option<&str>) -> Result<u32, SetupError> {
    let value = value
        .ok_or_else(|| SetupError::error(format!("{} requires a value", keyword)))?
        .trim();
    value
        .parse::<u32>()
        .map_err(|_| SetupError::error(format!("invalid {}: \"{}\"", keyword, value)))
}

pub fn sid_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    // A repeated sid option overwrites the earlier one.
    s.sid = parse_u32("sid", value)?;
    Ok(())
}

pub fn gid_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    s.gid = parse_u32("gid", value)?;
    Ok(())
}

pub fn rev_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    s.rev = parse_u32("rev", value)?;
    Ok(())
}

pub fn priority_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let prio = parse_u32("priority", value)?;
    if prio == 0 || prio > 255 {
        return Err(SetupError::error(format!(
            "priority out of range: {}",
            prio
        )));
    }
    s.prio = prio as i32;
    Ok(())
}

pub fn msg_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("msg requires a value"))?;
    s.msg = Some(strip_quotes(value));
    Ok(())
}

pub fn classtype_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value
        .ok_or_else(|| SetupError::error("classtype requires a value"))?
        .trim();
    if value.is_empty() {
        return Err(SetupError::error("empty classtype"));
    }
    if s.classtype.is_some() {
        warn!("duplicate classtype; using the last one");
    }
    s.classtype = Some(value.to_string());
    Ok(())
}

pub fn reference_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("reference requires a value"))?;
    let (scheme, reference) = value
        .split_once(',')
        .ok_or_else(|| SetupError::error(format!("invalid reference: \"{}\"", value)))?;
    let scheme = scheme.trim();
    let reference = reference.trim();
    if scheme.is_empty() || reference.is_empty() {
        return Err(SetupError::error(format!("invalid reference: \"{}\"", value)));
    }
    s.references.push(Reference {
        scheme: scheme.to_string(),
        reference: reference.to_string(),
    });
    Ok(())
}

/// Parse `key value, key value, ...` metadata. Malformed entries are a
/// warning unless the keyword runs in strict mode.
pub fn metadata_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("metadata requires a value"))?;
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(|c: char| c == ' ' || c == '\t') {
            Some((key, val)) if !val.trim().is_empty() => {
                s.metadata.push((key.to_string(), val.trim().to_string()));
            }
            _ => {
                if ctx.is_strict(KeywordId::Metadata) {
                    return Err(SetupError::error(format!(
                        "invalid metadata entry: \"{}\"",
                        entry
                    )));
                }
                warn!("invalid metadata entry: \"{}\"", entry);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn setup() -> (DetectEngineCtx, Signature) {
        (DetectEngineCtx::new(), Signature::new("test"))
    }

    #[test]
    fn test_sid_last_wins() {
        let (mut ctx, mut s) = setup();
        sid_setup(&mut ctx, &mut s, Some("1")).unwrap();
        sid_setup(&mut ctx, &mut s, Some("2")).unwrap();
        assert_eq!(s.sid, 2);
        assert!(sid_setup(&mut ctx, &mut s, Some("abc")).is_err());
    }

    #[test]
    fn test_priority_range() {
        let (mut ctx, mut s) = setup();
        priority_setup(&mut ctx, &mut s, Some("1")).unwrap();
        assert_eq!(s.prio, 1);
        assert!(priority_setup(&mut ctx, &mut s, Some("0")).is_err());
        assert!(priority_setup(&mut ctx, &mut s, Some("300")).is_err());
    }

    #[test]
    fn test_reference() {
        let (mut ctx, mut s) = setup();
        reference_setup(&mut ctx, &mut s, Some("cve,2006-6723")).unwrap();
        assert_eq!(s.references[0].scheme, "cve");
        assert_eq!(s.references[0].reference, "2006-6723");
        assert!(reference_setup(&mut ctx, &mut s, Some("nocomma")).is_err());
    }

    #[test]
    fn test_metadata() {
        let (mut ctx, mut s) = setup();
        metadata_setup(
            &mut ctx,
            &mut s,
            Some("created_at 2010_07_30, updated_at 2010_07_30"),
        )
        .unwrap();
        assert_eq!(s.metadata.len(), 2);
        assert_eq!(s.metadata[0].0, "created_at");

        // Malformed entries only warn by default.
        metadata_setup(&mut ctx, &mut s, Some("keyonly")).unwrap();

        // But fail in strict mode.
        ctx.apply_strict("metadata");
        assert!(metadata_setup(&mut ctx, &mut s, Some("keyonly")).is_err());
    }
}
