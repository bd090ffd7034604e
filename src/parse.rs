// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Top level signature parsing: the two-pass parse, post-parse flag
//! consolidation, prefilter selection and bidirectional cloning.

use crate::addr;
use crate::applayer::AlProto;
use crate::engine::DetectEngineCtx;
use crate::header;
use crate::keyword;
use crate::keywords::content::CONTENT_FAST_PATTERN;
use crate::lexer;
use crate::options;
use crate::port;
use crate::signature::{
    PktHook, Signature, SignatureHook, DETECT_DEFAULT_PRIO, LIST_PMATCH,
    SIG_FLAG_APPLAYER, SIG_FLAG_DP_ANY, SIG_FLAG_DST_ANY, SIG_FLAG_FIREWALL,
    SIG_FLAG_INIT_BIDIREC, SIG_FLAG_INIT_FLOW, SIG_FLAG_INIT_PACKET, SIG_FLAG_PREFILTER,
    SIG_FLAG_SP_ANY, SIG_FLAG_SRC_ANY, SIG_FLAG_TOCLIENT, SIG_FLAG_TOSERVER,
};
use crate::validate;
use crate::SigError;
use tracing::{debug, info};

/// Pick the match feeding the multi-pattern prefilter: an explicit
/// fast_pattern content when present, the longest content in an
/// MPM-capable list otherwise.
fn setup_prefilter(ctx: &DetectEngineCtx, s: &mut Signature) {
    let mut best: Option<usize> = None;
    let mut best_len = 0usize;

    let consider = |s: &Signature, head: Option<usize>, best: &mut Option<usize>, best_len: &mut usize| {
        let mut cur = head;
        while let Some(i) = cur {
            if let Some(cd) = s.sm(i).ctx.as_content() {
                if cd.flags & CONTENT_FAST_PATTERN != 0 {
                    *best = Some(i);
                    *best_len = usize::MAX;
                } else if cd.pattern.len() > *best_len {
                    *best = Some(i);
                    *best_len = cd.pattern.len();
                }
            }
            cur = s.sm(i).next;
        }
    };

    consider(
        s,
        s.init.smlists[LIST_PMATCH as usize].head,
        &mut best,
        &mut best_len,
    );
    for b in &s.init.buffers {
        let mpm = ctx
            .buffer_types
            .get(b.id)
            .map(|bt| bt.supports_mpm)
            .unwrap_or(false);
        if mpm {
            consider(s, b.head, &mut best, &mut best_len);
        }
    }

    if let Some(best) = best {
        s.init.mpm_sm = Some(best);
        s.flags |= SIG_FLAG_PREFILTER;
        return;
    }

    // No pattern to feed the multi-pattern matcher; fall back to the
    // first keyword on the built-in lists that can drive a prefilter
    // engine itself.
    if !s.init.has_possible_prefilter {
        return;
    }
    for l in &s.init.smlists {
        let mut cur = l.head;
        while let Some(i) = cur {
            if keyword::get(s.sm(i).keyword).prefilter {
                debug!(
                    "sid {}: prefilter is on \"{}\"",
                    s.sid,
                    keyword::name_of(s.sm(i).keyword)
                );
                s.init.prefilter_sm = Some(i);
                s.flags |= SIG_FLAG_PREFILTER;
                return;
            }
            cur = s.sm(i).next;
        }
    }
}

/// Parse one signature out of the rule string.
///
/// With `swapped` set the source address and port fill the destination
/// slots and vice versa; this is how the bidirectional clone is built.
fn sig_init_helper(
    ctx: &mut DetectEngineCtx,
    sigstr: &str,
    swapped: bool,
    firewall: bool,
) -> Result<Signature, SigError> {
    let mut sig = Signature::new(sigstr);
    if firewall {
        sig.init.firewall_rule = true;
        sig.flags |= SIG_FLAG_FIREWALL;
    }

    let tokens = lexer::tokenize(sigstr).map_err(|err| SigError::Parse(err.to_string()))?;

    // First pass: scan-only, resolving the requires predicates that can
    // silently skip the rule, and picking up the sid.
    options::parse_options(ctx, &mut sig, tokens.options, true)?;

    if sig.sid == 0 {
        return Err(SigError::parse("Signature missing required value \"sid\"."));
    }

    // Now completely parse the rule.
    header::parse_action(ctx, &mut sig, tokens.action)?;
    header::parse_proto(ctx, &mut sig, tokens.protocol)?;
    header::apply_direction(&mut sig, tokens.direction)?;
    header::parse_address(&mut sig, tokens.src, swapped)?;
    header::parse_address(&mut sig, tokens.dst, !swapped)?;
    header::parse_port(&mut sig, tokens.sp, swapped)?;
    header::parse_port(&mut sig, tokens.dp, !swapped)?;

    options::parse_options(ctx, &mut sig, tokens.options, false)?;

    // Signature priority hasn't been overwritten, use the default.
    if sig.prio == -1 {
        sig.prio = DETECT_DEFAULT_PRIO;
    }

    sig.iid = ctx.signum;
    ctx.signum += 1;

    // An app-layer keyword on an `ip` rule narrows the protocol mask to
    // the transports carrying that protocol.
    if sig.alproto != AlProto::Unknown && (sig.proto.any || sig.proto.is_empty()) {
        sig.proto.clear();
        header::supported_ipprotos(sig.alproto, &mut sig.proto);
    }

    if sig.flags & SIG_FLAG_APPLAYER == 0 {
        sig.init.init_flags |= SIG_FLAG_INIT_PACKET;
    }

    if sig.init.hook == SignatureHook::Pkt(PktHook::FlowStart)
        && sig.flags & SIG_FLAG_TOSERVER != 0
    {
        sig.init.init_flags |= SIG_FLAG_INIT_FLOW;
    }

    if sig.init.init_flags & SIG_FLAG_INIT_FLOW == 0
        && sig.flags & (SIG_FLAG_TOSERVER | SIG_FLAG_TOCLIENT) == 0
    {
        sig.flags |= SIG_FLAG_TOSERVER | SIG_FLAG_TOCLIENT;
    }

    sig.build_address_match_arrays();
    setup_prefilter(ctx, &mut sig);

    validate::validate(ctx, &mut sig, &tokens, swapped)?;

    Ok(sig)
}

/// A bidirectional rule whose endpoints are equal cannot produce a
/// distinct clone.
fn has_same_source_and_destination(s: &Signature) -> bool {
    if s.flags & SIG_FLAG_SP_ANY == 0 || s.flags & SIG_FLAG_DP_ANY == 0 {
        if !port::lists_equal(&s.sp, &s.dp) {
            return false;
        }
    }
    if s.flags & SIG_FLAG_SRC_ANY == 0 || s.flags & SIG_FLAG_DST_ANY == 0 {
        if !addr::lists_equal(&s.init.src, &s.init.dst) {
            return false;
        }
    }
    true
}

/// Parse a signature; for `<>` rules also produce the clone with the
/// endpoints swapped.
pub fn sig_init(
    ctx: &mut DetectEngineCtx,
    sigstr: &str,
    firewall: bool,
) -> Result<(Signature, Option<Signature>), SigError> {
    let mut sig = sig_init_helper(ctx, sigstr, false, firewall)?;

    if sig.init.init_flags & SIG_FLAG_INIT_BIDIREC != 0 {
        if has_same_source_and_destination(&sig) {
            info!(
                "Rule with ID {} is bidirectional, but source and destination are the same, treating the rule as unidirectional",
                sig.sid
            );
            sig.init.init_flags &= !SIG_FLAG_INIT_BIDIREC;
        } else {
            let clone = sig_init_helper(ctx, sigstr, true, firewall)?;
            return Ok((sig, Some(clone)));
        }
    }

    Ok((sig, None))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::signature::ACTION_ALERT;

    fn init(rule: &str) -> Result<(Signature, Option<Signature>), SigError> {
        let mut ctx = DetectEngineCtx::new();
        sig_init(&mut ctx, rule, false)
    }

    #[test]
    fn test_basic() {
        let (sig, clone) =
            init("alert tcp 1.2.3.4 any -> !1.2.3.4 any (msg:\"t\"; sid:1;)").unwrap();
        assert!(clone.is_none());
        assert_eq!(sig.action, ACTION_ALERT);
        assert_eq!(sig.flags & SIG_FLAG_SRC_ANY, 0);
        assert!(sig.flags & SIG_FLAG_SP_ANY != 0);
        assert!(sig.init.dst.contains_negation);
        // Default values.
        assert_eq!(sig.gid, 1);
        assert_eq!(sig.rev, 0);
        assert_eq!(sig.prio, DETECT_DEFAULT_PRIO);
    }

    #[test]
    fn test_missing_sid() {
        assert!(init("alert tcp any any -> any any (msg:\"t\";)").is_err());
    }

    #[test]
    fn test_invalid_direction() {
        assert!(init("alert tcp 1.2.3.4 any <- !1.2.3.4 any (msg:\"t\"; sid:1;)").is_err());
    }

    #[test]
    fn test_invalid_port_negation() {
        assert!(init("alert tcp any !any -> any any (sid:1;)").is_err());
    }

    #[test]
    fn test_out_of_range_port() {
        assert!(init("alert tcp 1.2.3.4 1024:65536 -> !1.2.3.4 any (msg:\"t\"; sid:1;)").is_err());
        init("alert tcp 1.2.3.4 1024: -> !1.2.3.4 1024: (msg:\"t\"; sid:1;)").unwrap();
    }

    #[test]
    fn test_bidir_same_endpoints_suppressed() {
        let (sig, clone) = init("alert tcp any any <> any any (sid:1;)").unwrap();
        assert!(clone.is_none());
        assert_eq!(sig.init.init_flags & SIG_FLAG_INIT_BIDIREC, 0);
    }

    #[test]
    fn test_bidir_clone() {
        let (sig, clone) =
            init("alert tcp 1.2.3.4 1024:65535 <> !1.2.3.4 any (msg:\"t\"; sid:1;)").unwrap();
        let clone = clone.unwrap();
        assert!(sig.init.init_flags & SIG_FLAG_INIT_BIDIREC != 0);
        assert!(clone.init.init_flags & SIG_FLAG_INIT_BIDIREC != 0);
        // Addresses and ports swapped on the clone.
        assert_eq!(clone.init.src, sig.init.dst);
        assert_eq!(clone.init.dst, sig.init.src);
        assert_eq!(clone.sp, sig.dp);
        assert_eq!(clone.dp, sig.sp);
        assert_eq!(clone.sid, sig.sid);
        assert_eq!(clone.gid, sig.gid);
        assert_eq!(clone.rev, sig.rev);
    }

    #[test]
    fn test_default_direction_flags() {
        let (sig, _) = init("alert tcp any any -> any any (sid:1;)").unwrap();
        assert!(sig.flags & SIG_FLAG_TOSERVER != 0);
        assert!(sig.flags & SIG_FLAG_TOCLIENT != 0);
    }

    #[test]
    fn test_prefilter_longest_content() {
        let (sig, _) = init(
            "alert tcp any any -> any any (content:\"ab\"; content:\"abcdef\"; content:\"cd\"; sid:1;)",
        )
        .unwrap();
        assert!(sig.flags & SIG_FLAG_PREFILTER != 0);
        let mpm = sig.init.mpm_sm.unwrap();
        assert_eq!(sig.sm(mpm).ctx.as_content().unwrap().pattern, b"abcdef");
    }

    #[test]
    fn test_prefilter_fast_pattern_wins() {
        let (sig, _) = init(
            "alert tcp any any -> any any (content:\"ab\"; fast_pattern; content:\"abcdef\"; sid:1;)",
        )
        .unwrap();
        let mpm = sig.init.mpm_sm.unwrap();
        assert_eq!(sig.sm(mpm).ctx.as_content().unwrap().pattern, b"ab");
    }

    #[test]
    fn test_prefilter_keyword_fallback() {
        let (sig, _) = init("alert tcp any any -> any any (dsize:>128; sid:1;)").unwrap();
        assert!(sig.flags & SIG_FLAG_PREFILTER != 0);
        assert!(sig.init.mpm_sm.is_none());
        let pf = sig.init.prefilter_sm.unwrap();
        assert_eq!(sig.sm(pf).keyword, crate::keyword::KeywordId::Dsize);
    }

    #[test]
    fn test_max_options() {
        // 61 flowbits plus msg and sid makes 63 options.
        let mut options = String::from("msg:\"m\"; sid:1; ");
        for i in 0..61 {
            options.push_str(&format!("flowbits:set,bit{}; ", i));
        }
        let rule = format!("alert tcp any any -> any any ({})", options.trim_end());
        let (sig, _) = init(&rule).unwrap();
        assert_eq!(sig.sid, 1);
    }
}
