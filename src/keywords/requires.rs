// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The requires keyword: version and feature predicates that decide
//! whether this engine should load the rule at all.
//!
//! An unsatisfied predicate is not an error; the rule is skipped
//! silently. Requirement kinds this engine does not know are treated as
//! unsatisfied, so rule writers can gate on future keywords.

use crate::engine::DetectEngineCtx;
use crate::keyword::{SetupError, SetupResult};
use crate::signature::Signature;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl EngineVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

fn parse_version(input: &str) -> Result<EngineVersion, String> {
    let mut parts = input.trim().split('.');
    let mut next = |required: bool| -> Result<u8, String> {
        match parts.next() {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| format!("invalid version: {}", input)),
            None if required => Err(format!("invalid version: {}", input)),
            None => Ok(0),
        }
    };
    let major = next(true)?;
    let minor = next(false)?;
    let patch = next(false)?;
    Ok(EngineVersion::new(major, minor, patch))
}

/// Evaluate one requirement term. `Ok(true)` means satisfied.
fn check_term(ctx: &DetectEngineCtx, term: &str) -> Result<bool, String> {
    let term = term.trim();
    if term.is_empty() {
        return Err("empty requires term".to_string());
    }
    let (kind, rest) = match term.split_once(|c: char| c == ' ' || c == '\t') {
        Some((kind, rest)) => (kind, rest.trim()),
        None => (term, ""),
    };
    match kind {
        "version" => {
            let (op, ver) = match rest.split_once(|c: char| c == ' ' || c == '\t') {
                Some((op, ver)) => (op.trim(), ver.trim()),
                None => return Err(format!("invalid version requirement: {}", term)),
            };
            let want = parse_version(ver)?;
            let have = ctx.version;
            let ok = match op {
                ">=" => have >= want,
                ">" => have > want,
                "<=" => have <= want,
                "<" => have < want,
                "==" => have == want,
                "!=" => have != want,
                _ => return Err(format!("invalid version operator: {}", op)),
            };
            Ok(ok)
        }
        "feature" => {
            if rest.is_empty() {
                return Err("feature requirement without a name".to_string());
            }
            Ok(ctx.features.contains(rest))
        }
        // Unknown requirement kinds fail the requirement rather than the
        // parse, so newer rule files degrade gracefully.
        _ => {
            debug!("unknown requires kind \"{}\", treating as unmet", kind);
            Ok(false)
        }
    }
}

pub fn requires_setup(
    ctx: &mut DetectEngineCtx,
    _s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("requires needs a value"))?;
    for term in value.split(',') {
        match check_term(ctx, term) {
            Ok(true) => {}
            Ok(false) => return Err(SetupError::RequiresNotMet),
            Err(err) => return Err(SetupError::Error(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_version_terms() {
        let mut ctx = DetectEngineCtx::new();
        ctx.version = EngineVersion::new(8, 0, 1);
        let mut s = Signature::new("test");

        requires_setup(&mut ctx, &mut s, Some("version >= 7")).unwrap();
        requires_setup(&mut ctx, &mut s, Some("version >= 7.0.3, version < 9")).unwrap();

        assert_eq!(
            requires_setup(&mut ctx, &mut s, Some("version >= 9")),
            Err(SetupError::RequiresNotMet)
        );
        assert!(matches!(
            requires_setup(&mut ctx, &mut s, Some("version !! 9")),
            Err(SetupError::Error(_))
        ));
    }

    #[test]
    fn test_feature_terms() {
        let mut ctx = DetectEngineCtx::new();
        ctx.features.insert("output::eve".to_string());
        let mut s = Signature::new("test");

        requires_setup(&mut ctx, &mut s, Some("feature output::eve")).unwrap();
        assert_eq!(
            requires_setup(&mut ctx, &mut s, Some("feature lua")),
            Err(SetupError::RequiresNotMet)
        );
    }

    #[test]
    fn test_unknown_kind_is_unmet() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        assert_eq!(
            requires_setup(&mut ctx, &mut s, Some("hyperscan on")),
            Err(SetupError::RequiresNotMet)
        );
    }
}
