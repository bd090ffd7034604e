// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Content modifier keywords: flags and offsets applied to the most
//! recent content match, relative match linkage, and the legacy
//! `http_*` modifiers that relocate content into an app-layer buffer.

use crate::applayer::AlProto;
use crate::common::NumberOrName;
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::keywords::content::{
    parse_content_pattern, ContentData, CONTENT_DEPTH, CONTENT_DISTANCE, CONTENT_ENDSWITH,
    CONTENT_FAST_PATTERN, CONTENT_FAST_PATTERN_ONLY, CONTENT_NEGATED, CONTENT_OFFSET,
    CONTENT_RAWBYTES, CONTENT_RELATIVE_NEXT, CONTENT_STARTSWITH, CONTENT_WITHIN,
};
use crate::keywords::pcre::PCRE_RELATIVE_NEXT;
use crate::keywords::uint::parse_uint;
use crate::signature::{MatchCtx, Signature, LIST_MAX, LIST_PMATCH};

/// The most recent content match in the active context.
fn last_content(s: &Signature, keyword: &str) -> Result<usize, SetupError> {
    s.last_sm_from_lists(&[KeywordId::Content]).ok_or_else(|| {
        SetupError::error(format!(
            "\"{}\" needs a preceding content option",
            keyword
        ))
    })
}

fn content_of(s: &mut Signature, node: usize) -> &mut ContentData {
    s.sm_mut(node)
        .ctx
        .as_content_mut()
        .expect("node must hold content")
}

pub fn nocase_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    let node = last_content(s, "nocase")?;
    content_of(s, node).flags |= crate::keywords::content::CONTENT_NOCASE;
    Ok(())
}

pub fn rawbytes_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    let node = last_content(s, "rawbytes")?;
    if s.list_of_sm(node) != Some(LIST_PMATCH) {
        return Err(SetupError::error(
            "rawbytes only supported for content on the payload",
        ));
    }
    content_of(s, node).flags |= CONTENT_RAWBYTES;
    Ok(())
}

pub fn startswith_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    let node = last_content(s, "startswith")?;
    let cd = content_of(s, node);
    if cd.flags & (CONTENT_WITHIN | CONTENT_DISTANCE) != 0 {
        return Err(SetupError::error(
            "startswith cannot be mixed with a relative match",
        ));
    }
    if cd.flags & CONTENT_OFFSET != 0 {
        return Err(SetupError::error("startswith cannot be used with offset"));
    }
    cd.flags |= CONTENT_STARTSWITH;
    Ok(())
}

pub fn endswith_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    let node = last_content(s, "endswith")?;
    let cd = content_of(s, node);
    if cd.flags & CONTENT_OFFSET != 0 {
        return Err(SetupError::error("endswith cannot be used with offset"));
    }
    cd.flags |= CONTENT_ENDSWITH;
    Ok(())
}

pub fn fast_pattern_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let node = last_content(s, "fast_pattern")?;
    let cd = content_of(s, node);
    match value {
        None => {
            cd.flags |= CONTENT_FAST_PATTERN;
        }
        Some("only") => {
            if cd.flags & (CONTENT_WITHIN | CONTENT_DISTANCE) != 0 {
                return Err(SetupError::error(
                    "fast_pattern:only cannot be used on a relative content",
                ));
            }
            if cd.flags & CONTENT_NEGATED != 0 {
                return Err(SetupError::error(
                    "fast_pattern:only cannot be used on a negated content",
                ));
            }
            cd.flags |= CONTENT_FAST_PATTERN | CONTENT_FAST_PATTERN_ONLY;
        }
        Some(other) => {
            return Err(SetupError::error(format!(
                "invalid fast_pattern value: {}",
                other
            )));
        }
    }
    Ok(())
}

fn parse_u16_value(keyword: &str, value: Option<&str>) -> Result<u16, SetupError> {
    let value = value
        .ok_or_else(|| SetupError::error(format!("{} requires a value", keyword)))?
        .trim();
    value
        .parse::<u16>()
        .map_err(|_| SetupError::error(format!("invalid {} value: {}", keyword, value)))
}

pub fn depth_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let depth = parse_u16_value("depth", value)?;
    let node = last_content(s, "depth")?;
    let cd = content_of(s, node);
    if cd.flags & CONTENT_STARTSWITH != 0 {
        return Err(SetupError::error("can't use depth with startswith"));
    }
    if (depth as usize) < cd.pattern.len() {
        return Err(SetupError::error(
            "depth is smaller than the pattern length",
        ));
    }
    cd.depth = depth;
    cd.flags |= CONTENT_DEPTH;
    Ok(())
}

pub fn offset_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let offset = parse_u16_value("offset", value)?;
    let node = last_content(s, "offset")?;
    let cd = content_of(s, node);
    if cd.flags & CONTENT_STARTSWITH != 0 {
        return Err(SetupError::error("can't use offset with startswith"));
    }
    cd.offset = offset;
    cd.flags |= CONTENT_OFFSET;
    Ok(())
}

fn parse_i32_or_name(keyword: &str, value: Option<&str>) -> Result<NumberOrName<i32>, SetupError> {
    let value = value
        .ok_or_else(|| SetupError::error(format!("{} requires a value", keyword)))?
        .trim();
    if value.is_empty() {
        return Err(SetupError::error(format!("{} requires a value", keyword)));
    }
    if let Ok(n) = value.parse::<i32>() {
        Ok(NumberOrName::Number(n))
    } else {
        Ok(NumberOrName::Name(value.to_string()))
    }
}

/// Common logic of within and distance: flag the previous content, then
/// mark its predecessor as having a relative follower.
fn relative_modifier(
    s: &mut Signature,
    keyword: &str,
    value: Option<&str>,
    flag: u32,
) -> SetupResult {
    let arg = parse_i32_or_name(keyword, value)?;
    let node = s
        .last_sm_from_lists(&[KeywordId::Content, KeywordId::Pcre])
        .ok_or_else(|| {
            SetupError::error(format!("{} needs a preceding content option", keyword))
        })?;
    if s.sm(node).keyword != KeywordId::Content {
        return Err(SetupError::error(format!(
            "{} needs a preceding content option",
            keyword
        )));
    }
    {
        let cd = content_of(s, node);
        if cd.flags & CONTENT_STARTSWITH != 0 {
            return Err(SetupError::error(format!(
                "can't use {} with startswith",
                keyword
            )));
        }
        if flag == CONTENT_WITHIN {
            cd.within = arg;
        } else {
            cd.distance = arg;
        }
        cd.flags |= flag;
    }

    let prev = s.sm(node).prev;
    if let Some(pm) = s.last_sm_from(prev, &[KeywordId::Content, KeywordId::Pcre]) {
        match &mut s.sm_mut(pm).ctx {
            MatchCtx::Content(cd) => cd.flags |= CONTENT_RELATIVE_NEXT,
            MatchCtx::Pcre(pd) => pd.flags |= PCRE_RELATIVE_NEXT,
            _ => {}
        }
    }
    Ok(())
}

pub fn within_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    relative_modifier(s, "within", value, CONTENT_WITHIN)
}

pub fn distance_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    relative_modifier(s, "distance", value, CONTENT_DISTANCE)
}

pub fn bsize_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("bsize requires a value"))?;
    let list = match s.init.list {
        Some(list) if list >= LIST_MAX => list,
        _ => {
            return Err(SetupError::error(
                "bsize needs a sticky buffer to be set before it",
            ));
        }
    };
    let du = parse_uint::<u64>(value).map_err(SetupError::Error)?;
    s.append_sm(&ctx.buffer_types, KeywordId::Bsize, MatchCtx::Bsize(du), list)
        .map_err(SetupError::Error)?;
    Ok(())
}

fn modifier_transfer(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    keyword: &str,
    buffer: &str,
    alproto: AlProto,
) -> SetupResult {
    let list = ctx
        .buffer_types
        .id_by_name(buffer)
        .ok_or_else(|| SetupError::error(format!("no buffer registered as {}", buffer)))?;
    s.content_modifier_transfer(&ctx.buffer_types, keyword, list, alproto)
        .map_err(SetupError::Error)
}

pub fn http_uri_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_uri", "http.uri", AlProto::Http1)
}

pub fn http_raw_uri_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_raw_uri", "http.uri.raw", AlProto::Http1)
}

pub fn http_method_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_method", "http.method", AlProto::Http1)
}

pub fn http_cookie_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_cookie", "http.cookie", AlProto::Http1)
}

pub fn http_client_body_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_client_body", "http.request_body", AlProto::Http1)
}

pub fn http_server_body_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_server_body", "http.response_body", AlProto::Http1)
}

pub fn http_header_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_header", "http.header", AlProto::Http1)
}

pub fn http_user_agent_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_user_agent", "http.user_agent", AlProto::Http1)
}

pub fn http_host_cm_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    modifier_transfer(ctx, s, "http_host", "http.host", AlProto::Http1)
}

/// `uricontent:"..."` is content plus an immediate move to the uri
/// buffer.
pub fn uricontent_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("uricontent requires a pattern"))?;
    if s.init.list.is_some() {
        return Err(SetupError::error(
            "uricontent cannot be used inside a sticky buffer",
        ));
    }
    let pattern = parse_content_pattern(value).map_err(SetupError::Error)?;
    let mut cd = ContentData::new(pattern);
    if s.init.negated {
        cd.flags |= CONTENT_NEGATED;
    }
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Content,
        MatchCtx::Content(Box::new(cd)),
        LIST_PMATCH,
    )
    .map_err(SetupError::Error)?;
    modifier_transfer(ctx, s, "uricontent", "http.uri", AlProto::Http1)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keywords::content::content_setup;
    use crate::keywords::pcre::pcre_setup;

    fn setup() -> (DetectEngineCtx, Signature) {
        (DetectEngineCtx::new(), Signature::new("test"))
    }

    fn add_content(ctx: &mut DetectEngineCtx, s: &mut Signature, pattern: &str) {
        content_setup(ctx, s, Some(pattern)).unwrap();
    }

    #[test]
    fn test_modifier_without_content() {
        let (mut ctx, mut s) = setup();
        assert!(nocase_setup(&mut ctx, &mut s, None).is_err());
        assert!(within_setup(&mut ctx, &mut s, Some("5")).is_err());
    }

    #[test]
    fn test_within_links_previous() {
        let (mut ctx, mut s) = setup();
        add_content(&mut ctx, &mut s, "first");
        add_content(&mut ctx, &mut s, "second");
        within_setup(&mut ctx, &mut s, Some("2")).unwrap();

        let list = s.init.smlists[LIST_PMATCH as usize];
        let first = list.head.unwrap();
        let second = list.tail.unwrap();
        assert!(s.sm(first).ctx.as_content().unwrap().flags & CONTENT_RELATIVE_NEXT != 0);
        let cd = s.sm(second).ctx.as_content().unwrap();
        assert!(cd.flags & CONTENT_WITHIN != 0);
        assert_eq!(cd.within, NumberOrName::Number(2));
    }

    #[test]
    fn test_distance_links_pcre() {
        let (mut ctx, mut s) = setup();
        pcre_setup(&mut ctx, &mut s, Some("/^foo/")).unwrap();
        add_content(&mut ctx, &mut s, "bar");
        distance_setup(&mut ctx, &mut s, Some("10")).unwrap();

        let list = s.init.smlists[LIST_PMATCH as usize];
        let first = list.head.unwrap();
        match &s.sm(first).ctx {
            MatchCtx::Pcre(pd) => assert!(pd.flags & PCRE_RELATIVE_NEXT != 0),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_depth_checks() {
        let (mut ctx, mut s) = setup();
        add_content(&mut ctx, &mut s, "abcdef");
        assert!(depth_setup(&mut ctx, &mut s, Some("3")).is_err());
        depth_setup(&mut ctx, &mut s, Some("16")).unwrap();
        let node = s.last_sm_from_lists(&[KeywordId::Content]).unwrap();
        let cd = s.sm(node).ctx.as_content().unwrap();
        assert_eq!(cd.depth, 16);
        assert!(cd.flags & CONTENT_DEPTH != 0);
    }

    #[test]
    fn test_startswith_offset_conflict() {
        let (mut ctx, mut s) = setup();
        add_content(&mut ctx, &mut s, "abc");
        offset_setup(&mut ctx, &mut s, Some("4")).unwrap();
        assert!(startswith_setup(&mut ctx, &mut s, None).is_err());
    }

    #[test]
    fn test_fast_pattern_only() {
        let (mut ctx, mut s) = setup();
        add_content(&mut ctx, &mut s, "abc");
        fast_pattern_setup(&mut ctx, &mut s, Some("only")).unwrap();
        let node = s.last_sm_from_lists(&[KeywordId::Content]).unwrap();
        let cd = s.sm(node).ctx.as_content().unwrap();
        assert!(cd.flags & CONTENT_FAST_PATTERN_ONLY != 0);

        add_content(&mut ctx, &mut s, "def");
        within_setup(&mut ctx, &mut s, Some("5")).unwrap();
        assert!(fast_pattern_setup(&mut ctx, &mut s, Some("only")).is_err());
    }

    #[test]
    fn test_bsize_needs_sticky() {
        let (mut ctx, mut s) = setup();
        assert!(bsize_setup(&mut ctx, &mut s, Some(">10")).is_err());

        let uri = ctx.buffer_types.id_by_name("http.uri").unwrap();
        s.set_active_list(&ctx.buffer_types, uri).unwrap();
        bsize_setup(&mut ctx, &mut s, Some(">10")).unwrap();
    }

    #[test]
    fn test_legacy_http_modifiers() {
        let (mut ctx, mut s) = setup();
        add_content(&mut ctx, &mut s, "sessionid=");
        http_cookie_cm_setup(&mut ctx, &mut s, None).unwrap();
        let cookie = ctx.buffer_types.id_by_name("http.cookie").unwrap();
        assert!(s.last_sm_by_list_id(cookie, &[KeywordId::Content]).is_some());
        assert_eq!(s.alproto, AlProto::Http1);

        add_content(&mut ctx, &mut s, "%2e%2e/");
        http_raw_uri_cm_setup(&mut ctx, &mut s, None).unwrap();
        let raw_uri = ctx.buffer_types.id_by_name("http.uri.raw").unwrap();
        assert!(s
            .last_sm_by_list_id(raw_uri, &[KeywordId::Content])
            .is_some());

        add_content(&mut ctx, &mut s, "user=");
        http_client_body_cm_setup(&mut ctx, &mut s, None).unwrap();
        let body = ctx.buffer_types.id_by_name("http.request_body").unwrap();
        assert!(s.last_sm_by_list_id(body, &[KeywordId::Content]).is_some());
    }

    #[test]
    fn test_uricontent() {
        let (mut ctx, mut s) = setup();
        uricontent_setup(&mut ctx, &mut s, Some("/admin")).unwrap();
        assert_eq!(s.alproto, AlProto::Http1);
        let uri = ctx.buffer_types.id_by_name("http.uri").unwrap();
        assert!(s.last_sm_by_list_id(uri, &[KeywordId::Content]).is_some());
        assert!(s.init.smlists[LIST_PMATCH as usize].head.is_none());
    }
}
