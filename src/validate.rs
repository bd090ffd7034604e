// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Post-parse validation and consolidation.
//!
//! Runs in fixed order once the option list has been fully processed:
//! firewall preconditions, packet/stream conflicts, buffer mix rules,
//! direction derivation from the registered inspect engines, TCP
//! consolidation, type and table classification, keyword/table
//! compatibility, file handling and the IP-only re-parse.

use crate::addr;
use crate::applayer::{AlProto, Dir};
use crate::engine::DetectEngineCtx;
use crate::keyword::{self, KeywordId};
use crate::keywords::flow::flow_setup_implicit;
use crate::keywords::uint::{UintData, UintMode};
use crate::lexer::RuleTokens;
use crate::signature::{
    DetectTable, MatchCtx, PktHook, SigBuffer, SigType, Signature, SignatureHook,
    LIST_MATCH, LIST_PMATCH, FILE_SIG_NEED_FILENAME, SIG_FLAG_APPLAYER, SIG_FLAG_FILESTORE,
    SIG_FLAG_INIT_FILEDATA, SIG_FLAG_REQUIRE_PACKET, SIG_FLAG_REQUIRE_STREAM,
    SIG_FLAG_TOCLIENT, SIG_FLAG_TOSERVER, SIG_FLAG_TXBOTHDIR,
};
use crate::SigError;
use crate::keywords::content::{CONTENT_DEPTH, CONTENT_OFFSET};
use crate::header::IPPROTO_TCP;
use std::collections::HashMap;
use tracing::debug;

fn firewall_hook_set(s: &Signature) -> Result<(), SigError> {
    if s.init.firewall_rule && s.init.hook == SignatureHook::NotSet {
        return Err(SigError::parse(format!(
            "rule {} is loaded as a firewall rule, but does not specify an explicit hook",
            s.sid
        )));
    }
    Ok(())
}

fn packet_vs_stream(s: &Signature) -> Result<(), SigError> {
    if s.flags & SIG_FLAG_REQUIRE_PACKET != 0 && s.flags & SIG_FLAG_REQUIRE_STREAM != 0 {
        return Err(SigError::parse(
            "can't mix packet keywords with tcp-stream or flow:only_stream. Invalidating signature.",
        ));
    }
    Ok(())
}

/// The maximum buffer size a bsize comparison will ever accept, used to
/// reject content that cannot fit.
fn bsize_upper_bound(du: &UintData<u64>) -> Option<u64> {
    match du.mode {
        UintMode::Equal => Some(du.arg1),
        UintMode::Lt => Some(du.arg1.saturating_sub(1)),
        UintMode::Lte => Some(du.arg1),
        UintMode::Range => Some(du.arg2),
        _ => None,
    }
}

fn validate_bsize_contents(
    ctx: &DetectEngineCtx,
    s: &Signature,
    b: &SigBuffer,
) -> Result<(), SigError> {
    let mut bound: Option<u64> = None;
    let mut cur = b.head;
    while let Some(i) = cur {
        if let MatchCtx::Bsize(du) = &s.sm(i).ctx {
            match (bound, bsize_upper_bound(du)) {
                (None, Some(new)) => bound = Some(new),
                (Some(old), Some(new)) if new < old => bound = Some(new),
                _ => {}
            }
        }
        cur = s.sm(i).next;
    }
    let bound = match bound {
        Some(bound) => bound,
        None => return Ok(()),
    };
    let mut cur = b.head;
    while let Some(i) = cur {
        if let Some(cd) = s.sm(i).ctx.as_content() {
            if cd.pattern.len() as u64 > bound {
                return Err(SigError::parse(format!(
                    "content length {} is bigger than bsize allows in buffer {}",
                    cd.pattern.len(),
                    ctx.buffer_types.name_of(b.id)
                )));
            }
        }
        cur = s.sm(i).next;
    }
    Ok(())
}

struct BufferCheck {
    ts_excl: u32,
    tc_excl: u32,
    dir_amb: u32,
}

fn check_buffers(ctx: &DetectEngineCtx, s: &Signature) -> Result<BufferCheck, SigError> {
    let mut out = BufferCheck {
        ts_excl: 0,
        tc_excl: 0,
        dir_amb: 0,
    };

    if let Some(cur) = s.init.curbuf {
        if s.init.buffers[cur].head.is_none() {
            return Err(SigError::parse(format!(
                "rule {} setup buffer {} but didn't add matches to it",
                s.sid,
                ctx.buffer_types.name_of(s.init.buffers[cur].id)
            )));
        }
    }

    let has_pmatch = s.init.smlists[LIST_PMATCH as usize].head.is_some();
    let mut has_frame = false;
    let mut has_app = false;
    let mut has_pkt = false;
    let mut bufdir: HashMap<u16, (u32, u32)> = HashMap::new();

    for b in &s.init.buffers {
        let bt = match ctx.buffer_types.get(b.id) {
            Some(bt) => bt,
            None => continue,
        };
        debug!("buffer id {} name {}", b.id, bt.name);

        if b.head.is_none() {
            return Err(SigError::parse(format!(
                "no matches in sticky buffer {}",
                bt.name
            )));
        }

        has_frame |= bt.frame;
        has_app |= !bt.frame && !bt.packet;
        has_pkt |= bt.packet;

        if s.flags & SIG_FLAG_REQUIRE_PACKET != 0 && !bt.packet {
            return Err(SigError::parse(
                "Signature combines packet specific matches (like dsize, flags, ttl) with stream / state matching by matching on app layer proto (like using http_* keywords).",
            ));
        }

        for app in &ctx.inspect_engines {
            if app.sm_list != b.id {
                continue;
            }
            if s.alproto != AlProto::Unknown && !s.alproto.equals(app.alproto) {
                continue;
            }

            if b.only_tc {
                if app.dir == Dir::ToClient {
                    out.tc_excl += 1;
                }
            } else if b.only_ts {
                if app.dir == Dir::ToServer {
                    out.ts_excl += 1;
                }
            } else {
                let e = bufdir.entry(b.id).or_insert((0, 0));
                match app.dir {
                    Dir::ToServer => e.0 += 1,
                    Dir::ToClient => e.1 += 1,
                }
            }

            // Rules bound to an app-layer hook may only use engines at
            // that exact progress.
            if let SignatureHook::App { progress, .. } = s.init.hook {
                if s.flags & SIG_FLAG_TOSERVER != 0
                    && app.dir == Dir::ToServer
                    && app.progress != progress
                {
                    return Err(SigError::parse(format!(
                        "engine progress value {} doesn't match hook {}",
                        app.progress, progress
                    )));
                }
                if s.flags & SIG_FLAG_TOCLIENT != 0
                    && app.dir == Dir::ToClient
                    && app.progress != progress
                {
                    return Err(SigError::parse(
                        "engine progress value doesn't match hook",
                    ));
                }
            }
        }

        validate_bsize_contents(ctx, s, b)?;
    }

    if has_pmatch && has_frame {
        return Err(SigError::parse("can't mix pure content and frame inspection"));
    }
    if has_app && has_frame {
        return Err(SigError::parse(
            "can't mix app-layer buffer and frame inspection",
        ));
    }
    if has_pkt && has_frame {
        return Err(SigError::parse("can't mix pkt buffer and frame inspection"));
    }

    for (id, (ts, tc)) in &bufdir {
        out.ts_excl += (*ts > 0 && *tc == 0) as u32;
        out.tc_excl += (*ts == 0 && *tc > 0) as u32;
        out.dir_amb += (*ts > 0 && *tc > 0) as u32;
        debug!("buffer {}: ts {} tc {}", id, ts, tc);
    }

    Ok(out)
}

fn consolidate_direction(s: &mut Signature, chk: &BufferCheck) -> Result<(), SigError> {
    if s.flags & SIG_FLAG_TXBOTHDIR != 0 {
        if chk.ts_excl == 0 || chk.tc_excl == 0 {
            return Err(SigError::parse(format!(
                "rule {} should use both directions, but does not",
                s.sid
            )));
        }
        if chk.dir_amb > 0 {
            return Err(SigError::parse(format!(
                "rule {} means to use both directions, cannot have keywords ambiguous about directions",
                s.sid
            )));
        }
    } else if chk.ts_excl > 0 && chk.tc_excl > 0 {
        return Err(SigError::parse(format!(
            "rule {} mixes keywords with conflicting directions, a transactional rule with => should be used",
            s.sid
        )));
    } else if chk.ts_excl > 0 {
        debug!("{}: implied rule direction is toserver", s.sid);
        flow_setup_implicit(s, SIG_FLAG_TOSERVER)
            .map_err(|_| SigError::parse(format!(
                "rule {} mixes keywords with conflicting directions",
                s.sid
            )))?;
    } else if chk.tc_excl > 0 {
        debug!("{}: implied rule direction is toclient", s.sid);
        flow_setup_implicit(s, SIG_FLAG_TOCLIENT)
            .map_err(|_| SigError::parse(format!(
                "rule {} mixes keywords with conflicting directions",
                s.sid
            )))?;
    } else if chk.dir_amb > 0 {
        debug!("{}: rule direction cannot be deduced from keywords", s.sid);
    }
    Ok(())
}

/// TCP rules with payload matches inspect the reassembled stream unless
/// told otherwise; contents anchored with depth/offset, and stream_size,
/// also need the packet.
fn consolidate_tcp(s: &mut Signature) {
    if !s.proto.is_set(IPPROTO_TCP) {
        return;
    }
    if s.init.smlists[LIST_PMATCH as usize].head.is_none() {
        return;
    }
    if s.flags & (SIG_FLAG_REQUIRE_PACKET | SIG_FLAG_REQUIRE_STREAM) != 0 {
        return;
    }
    s.flags |= SIG_FLAG_REQUIRE_STREAM;
    let mut cur = s.init.smlists[LIST_PMATCH as usize].head;
    while let Some(i) = cur {
        if let Some(cd) = s.sm(i).ctx.as_content() {
            if cd.flags & (CONTENT_DEPTH | CONTENT_OFFSET) != 0 {
                s.flags |= SIG_FLAG_REQUIRE_PACKET;
                break;
            }
        }
        cur = s.sm(i).next;
    }
    let mut cur = s.init.smlists[LIST_MATCH as usize].head;
    while let Some(i) = cur {
        if s.sm(i).keyword == KeywordId::StreamSize {
            s.flags |= SIG_FLAG_REQUIRE_PACKET;
            break;
        }
        cur = s.sm(i).next;
    }
}

fn set_type(ctx: &DetectEngineCtx, s: &mut Signature) {
    let has_pmatch = s.init.smlists[LIST_PMATCH as usize].head.is_some();
    let has_pkt_buffer = s
        .init
        .buffers
        .iter()
        .any(|b| ctx.buffer_types.get(b.id).map(|bt| bt.packet).unwrap_or(false));
    let match_list = &s.init.smlists[LIST_MATCH as usize];

    s.sig_type = if s.flags & SIG_FLAG_APPLAYER != 0 {
        SigType::AppTx
    } else if has_pmatch {
        if s.flags & SIG_FLAG_REQUIRE_PACKET != 0 && s.flags & SIG_FLAG_REQUIRE_STREAM != 0 {
            SigType::PktStream
        } else if s.flags & SIG_FLAG_REQUIRE_STREAM != 0 {
            SigType::Stream
        } else {
            SigType::Pkt
        }
    } else if match_list.head.is_some() {
        // Flow state only rules stay close to the IP-only fast path.
        let mut only_flow = true;
        let mut cur = match_list.head;
        while let Some(i) = cur {
            if s.sm(i).keyword != KeywordId::Flow {
                only_flow = false;
                break;
            }
            cur = s.sm(i).next;
        }
        if only_flow {
            SigType::LikeIpOnly
        } else {
            SigType::Pkt
        }
    } else if has_pkt_buffer || s.init.hook != SignatureHook::NotSet {
        SigType::Pkt
    } else if s.init.smlists[crate::signature::LIST_POSTMATCH as usize]
        .head
        .is_some()
    {
        SigType::Pkt
    } else {
        SigType::IpOnly
    };
}

fn set_table(s: &mut Signature) {
    use crate::signature::SIG_FLAG_FIREWALL;
    s.detect_table = if s.flags & SIG_FLAG_FIREWALL != 0 {
        if s.sig_type != SigType::AppTx {
            match s.init.hook {
                SignatureHook::Pkt(PktHook::PreStream) => DetectTable::PacketPreStream,
                SignatureHook::Pkt(PktHook::PreFlow) => DetectTable::PacketPreFlow,
                _ => DetectTable::PacketFilter,
            }
        } else {
            DetectTable::AppFilter
        }
    } else if s.sig_type != SigType::AppTx {
        DetectTable::PacketTd
    } else {
        DetectTable::AppTd
    };
}

/// Every keyword on the match list must support the rule's table.
fn validate_table(s: &Signature) -> Result<(), SigError> {
    let table_bit = s.detect_table.as_bit();
    if table_bit == 0 {
        return Ok(());
    }
    let mut cur = s.init.smlists[LIST_MATCH as usize].head;
    while let Some(i) = cur {
        let kw = keyword::get(s.sm(i).keyword);
        if kw.tables != 0 && kw.tables & table_bit == 0 {
            return Err(SigError::parse(format!(
                "rule {} uses hook \"{}\", but keyword \"{}\" doesn't support this hook",
                s.sid,
                s.detect_table.name(),
                kw.name
            )));
        }
        cur = s.sm(i).next;
    }
    Ok(())
}

fn inspects_files(s: &Signature) -> bool {
    s.flags & SIG_FLAG_FILESTORE != 0
        || s.file_flags != 0
        || s.init.init_flags & SIG_FLAG_INIT_FILEDATA != 0
}

fn validate_file_handling(s: &Signature) -> Result<(), SigError> {
    if !inspects_files(s) {
        return Ok(());
    }
    if s.alproto != AlProto::Unknown && !s.alproto.supports_files() {
        return Err(SigError::parse(format!(
            "protocol {} doesn't support file matching",
            s.alproto.name()
        )));
    }
    if s.init.alprotos[0] != AlProto::Unknown {
        let found = s
            .init
            .alprotos
            .iter()
            .take_while(|p| **p != AlProto::Unknown)
            .any(|p| p.supports_files());
        if !found {
            return Err(SigError::parse("no protocol support file matching"));
        }
    }
    if s.alproto == AlProto::Http2 && s.file_flags & FILE_SIG_NEED_FILENAME != 0 {
        return Err(SigError::parse(
            "protocol HTTP2 doesn't support file name matching",
        ));
    }
    Ok(())
}

fn ip_only_addresses(s: &mut Signature, tokens: &RuleTokens, swapped: bool) -> Result<(), SigError> {
    let src = addr::parse_ip_only(tokens.src).map_err(SigError::Parse)?;
    let dst = addr::parse_ip_only(tokens.dst).map_err(SigError::Parse)?;
    if !swapped {
        s.init.cidr_src = Some(src);
        s.init.cidr_dst = Some(dst);
    } else {
        s.init.cidr_src = Some(dst);
        s.init.cidr_dst = Some(src);
    }
    Ok(())
}

/// Validate and consolidate a fully parsed signature.
pub fn validate(
    ctx: &DetectEngineCtx,
    s: &mut Signature,
    tokens: &RuleTokens,
    swapped: bool,
) -> Result<(), SigError> {
    firewall_hook_set(s)?;
    packet_vs_stream(s)?;

    let chk = check_buffers(ctx, s)?;
    consolidate_direction(s, &chk)?;
    consolidate_tcp(s);

    set_type(ctx, s);
    set_table(s);

    validate_file_handling(s)?;
    validate_table(s)?;

    if s.sig_type == SigType::IpOnly {
        ip_only_addresses(s, tokens, swapped)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(ctx: &mut DetectEngineCtx, rule: &str) -> Result<usize, SigError> {
        ctx.append_sig(rule)
    }

    #[test]
    fn test_require_packet_and_stream_conflict() {
        let mut ctx = DetectEngineCtx::new();
        // dsize requires the packet, only_stream requires the stream.
        assert!(parse(
            &mut ctx,
            "alert tcp any any -> any any (dsize:>0; flow:only_stream; sid:1;)"
        )
        .is_err());
    }

    #[test]
    fn test_tcp_consolidation_stream() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert tcp any any -> any any (content:\"abc\"; sid:1;)",
        )
        .unwrap();
        let sig = &ctx.sig_list[idx];
        assert!(sig.flags & SIG_FLAG_REQUIRE_STREAM != 0);
        assert_eq!(sig.flags & SIG_FLAG_REQUIRE_PACKET, 0);
        assert_eq!(sig.sig_type, SigType::Stream);
    }

    #[test]
    fn test_tcp_consolidation_packet() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert tcp any any -> any any (content:\"abc\"; dsize:>0; sid:1;)",
        )
        .unwrap();
        let sig = &ctx.sig_list[idx];
        assert!(sig.flags & SIG_FLAG_REQUIRE_PACKET != 0);
        assert_eq!(sig.flags & SIG_FLAG_REQUIRE_STREAM, 0);
    }

    #[test]
    fn test_tcp_consolidation_depth_adds_packet() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert tcp any any -> any any (content:\"abc\"; depth:10; sid:1;)",
        )
        .unwrap();
        let sig = &ctx.sig_list[idx];
        assert!(sig.flags & SIG_FLAG_REQUIRE_STREAM != 0);
        assert!(sig.flags & SIG_FLAG_REQUIRE_PACKET != 0);
        assert_eq!(sig.sig_type, SigType::PktStream);
    }

    #[test]
    fn test_stream_size_adds_packet() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert tcp any any -> any any (content:\"abc\"; stream_size:server,>,100; sid:1;)",
        )
        .unwrap();
        let sig = &ctx.sig_list[idx];
        assert!(sig.flags & SIG_FLAG_REQUIRE_PACKET != 0);
    }

    #[test]
    fn test_ip_only_classification() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(&mut ctx, "alert tcp 1.2.3.4 any -> any any (sid:1;)").unwrap();
        let sig = &ctx.sig_list[idx];
        assert_eq!(sig.sig_type, SigType::IpOnly);
        assert!(sig.init.cidr_src.is_some());
        assert_eq!(sig.init.cidr_src.as_ref().unwrap().len(), 1);
        assert!(sig.init.cidr_dst.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_flow_only_like_ip_only() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert tcp any any -> any any (flow:established; sid:1;)",
        )
        .unwrap();
        assert_eq!(ctx.sig_list[idx].sig_type, SigType::LikeIpOnly);
    }

    #[test]
    fn test_direction_from_buffers() {
        let mut ctx = DetectEngineCtx::new();
        let idx = parse(
            &mut ctx,
            "alert http any any -> any any (http.uri; content:\"/a\"; sid:1;)",
        )
        .unwrap();
        let sig = &ctx.sig_list[idx];
        assert!(sig.flags & SIG_FLAG_TOSERVER != 0);
        assert_eq!(sig.flags & SIG_FLAG_TOCLIENT, 0);
        assert_eq!(sig.sig_type, SigType::AppTx);
    }

    #[test]
    fn test_conflicting_buffer_directions() {
        let mut ctx = DetectEngineCtx::new();
        // request_line is toserver only, stat_code is toclient only.
        assert!(parse(
            &mut ctx,
            "alert http any any -> any any (http.request_line; content:\"GET\"; http.stat_code; content:\"200\"; sid:1;)"
        )
        .is_err());
    }

    #[test]
    fn test_txbothdir_needs_both_sides() {
        let mut ctx = DetectEngineCtx::new();
        assert!(parse(
            &mut ctx,
            "alert http any any => any any (http.request_line; content:\"GET\"; sid:1;)"
        )
        .is_err());

        parse(
            &mut ctx,
            "alert http any any => any any (http.request_line; content:\"GET\"; http.stat_code; content:\"200\"; sid:1;)",
        )
        .unwrap();
    }

    #[test]
    fn test_frame_mix_rejected() {
        let mut ctx = DetectEngineCtx::new();
        assert!(parse(
            &mut ctx,
            "alert tcp any any -> any any (content:\"x\"; frame:stream; content:\"y\"; sid:1;)"
        )
        .is_err());
    }

    #[test]
    fn test_file_handling() {
        let mut ctx = DetectEngineCtx::new();
        // tls cannot do file inspection.
        assert!(parse(
            &mut ctx,
            "alert tls any any -> any any (filestore; sid:1;)"
        )
        .is_err());

        // http2 cannot match on file names.
        assert!(parse(
            &mut ctx,
            "alert http2 any any -> any any (file.name; content:\"x\"; sid:1;)"
        )
        .is_err());

        parse(
            &mut ctx,
            "alert http1 any any -> any any (file.name; content:\"x\"; sid:2;)",
        )
        .unwrap();
    }

    #[test]
    fn test_legacy_content_modifiers_accepted() {
        let mut ctx = DetectEngineCtx::new();
        parse(
            &mut ctx,
            "alert http any any -> any any (content:\"q=1\"; http_cookie; sid:1;)",
        )
        .unwrap();
        parse(
            &mut ctx,
            "alert http any any -> any any (http.uri.raw; content:\"/a//b\"; sid:2;)",
        )
        .unwrap();
        parse(
            &mut ctx,
            "alert http any any -> any any (content:\"user=\"; http_client_body; sid:3;)",
        )
        .unwrap();
        parse(
            &mut ctx,
            "alert http any any -> any any (content:\"<html\"; http_server_body; sid:4;)",
        )
        .unwrap();
    }

    #[test]
    fn test_rawbytes_incompatible_with_file_data() {
        let mut ctx = DetectEngineCtx::new();
        assert!(parse(
            &mut ctx,
            "alert http any any -> any any (file_data; content:\"x\"; rawbytes; sid:1;)"
        )
        .is_err());
    }

    #[test]
    fn test_firewall_requires_hook() {
        let mut ctx = DetectEngineCtx::new();
        assert!(ctx
            .append_firewall_rule("drop:packet tcp any any -> any any (sid:1;)")
            .is_err());

        ctx.append_firewall_rule("drop:packet tcp:pre_flow any any -> any any (sid:1;)")
            .unwrap();
        let sig = ctx.sig_by_gid_sid(1, 1).unwrap();
        assert_eq!(sig.detect_table, DetectTable::PacketPreFlow);
    }

    #[test]
    fn test_flow_not_allowed_in_pre_flow_table() {
        let mut ctx = DetectEngineCtx::new();
        assert!(ctx
            .append_firewall_rule(
                "drop:packet tcp:pre_flow any any -> any any (flow:established; sid:1;)"
            )
            .is_err());
    }

    #[test]
    fn test_bsize_content_fit() {
        let mut ctx = DetectEngineCtx::new();
        assert!(parse(
            &mut ctx,
            "alert dns any any -> any any (dns.query; content:\"longer-than-four\"; bsize:4; sid:1;)"
        )
        .is_err());

        parse(
            &mut ctx,
            "alert dns any any -> any any (dns.query; content:\"ab\"; bsize:4; sid:2;)",
        )
        .unwrap();
    }

    #[test]
    fn test_hook_progress_match() {
        let mut ctx = DetectEngineCtx::new();
        // dns.query engine progress is 1, matching request_complete.
        parse(
            &mut ctx,
            "alert dns:request_complete any any -> any any (dns.query; content:\"x\"; sid:1;)",
        )
        .unwrap();

        // http.request_body progress (3) != request_line hook progress (1).
        assert!(parse(
            &mut ctx,
            "alert http1:request_line any any -> any any (http.request_body; content:\"x\"; sid:2;)"
        )
        .is_err());
    }
}
