// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Sticky buffer keywords. Each selects a registered buffer as the target
//! for the matches that follow it.

use crate::applayer::AlProto;
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{
    MatchCtx, Signature, LIST_POSTMATCH, FILE_SIG_NEED_FILE, FILE_SIG_NEED_FILENAME,
    SIG_FLAG_FILESTORE, SIG_FLAG_INIT_FILEDATA,
};

/// Protocols file.data and file.name can attach to.
const FILE_ALPROTOS: &[AlProto] = &[AlProto::Http1, AlProto::Http2, AlProto::Smtp, AlProto::Smb];

fn sticky_buffer(
    ctx: &DetectEngineCtx,
    s: &mut Signature,
    name: &str,
    alproto: Option<AlProto>,
) -> SetupResult {
    if let Some(alproto) = alproto {
        s.set_alproto(alproto).map_err(SetupError::Error)?;
    }
    let list = ctx
        .buffer_types
        .id_by_name(name)
        .ok_or_else(|| SetupError::error(format!("no buffer registered as {}", name)))?;
    s.set_active_list(&ctx.buffer_types, list)
        .map_err(SetupError::Error)?;
    Ok(())
}

/// Reset the sticky buffer so matches target the packet payload again.
pub fn pkt_data_setup(
    _ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    s.init.list = None;
    Ok(())
}

pub fn file_data_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    if s.alproto != AlProto::Unknown && !s.alproto.supports_files() {
        return Err(SetupError::error(format!(
            "protocol {} doesn't support file matching",
            s.alproto.name()
        )));
    }
    if s.alproto == AlProto::Unknown {
        s.set_multi_alproto(FILE_ALPROTOS).map_err(SetupError::Error)?;
    }
    let list = ctx
        .buffer_types
        .id_by_name("file.data")
        .ok_or_else(|| SetupError::error("no buffer registered as file.data"))?;
    s.set_active_list(&ctx.buffer_types, list)
        .map_err(SetupError::Error)?;
    s.init.init_flags |= SIG_FLAG_INIT_FILEDATA;
    Ok(())
}

pub fn file_name_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    if s.alproto != AlProto::Unknown && !s.alproto.supports_files() {
        return Err(SetupError::error(format!(
            "protocol {} doesn't support file matching",
            s.alproto.name()
        )));
    }
    if s.alproto == AlProto::Unknown {
        s.set_multi_alproto(FILE_ALPROTOS).map_err(SetupError::Error)?;
    }
    let list = ctx
        .buffer_types
        .id_by_name("file.name")
        .ok_or_else(|| SetupError::error("no buffer registered as file.name"))?;
    s.set_active_list(&ctx.buffer_types, list)
        .map_err(SetupError::Error)?;
    s.file_flags |= FILE_SIG_NEED_FILE | FILE_SIG_NEED_FILENAME;
    Ok(())
}

pub fn filestore_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    s.flags |= SIG_FLAG_FILESTORE;
    s.file_flags |= FILE_SIG_NEED_FILE;
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Filestore,
        MatchCtx::Filestore,
        LIST_POSTMATCH,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

/// Select a frame buffer, `frame:<proto>.<frame>` or `frame:<frame>` with
/// the protocol taken from the rule.
pub fn frame_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value
        .ok_or_else(|| SetupError::error("frame requires a frame name"))?
        .trim();
    let name = if let Some((proto, _)) = value.split_once('.') {
        if let Some(alproto) = AlProto::by_name(proto) {
            s.set_alproto(alproto).map_err(SetupError::Error)?;
        }
        value.to_string()
    } else if s.alproto != AlProto::Unknown {
        format!("{}.{}", s.alproto.name(), value)
    } else {
        format!("tcp.{}", value)
    };

    let list = ctx
        .buffer_types
        .id_by_name(&name)
        .ok_or_else(|| SetupError::error(format!("no frame registered as {}", name)))?;
    let is_frame = ctx
        .buffer_types
        .get(list)
        .map(|bt| bt.frame)
        .unwrap_or(false);
    if !is_frame {
        return Err(SetupError::error(format!("{} is not a frame buffer", name)));
    }
    s.set_active_list(&ctx.buffer_types, list)
        .map_err(SetupError::Error)?;
    Ok(())
}

pub fn http_uri_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.uri", Some(AlProto::Http1))
}

pub fn http_uri_raw_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.uri.raw", Some(AlProto::Http1))
}

pub fn http_method_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.method", Some(AlProto::Http1))
}

pub fn http_host_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.host", Some(AlProto::Http1))
}

pub fn http_user_agent_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.user_agent", Some(AlProto::Http1))
}

pub fn http_header_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.header", Some(AlProto::Http1))
}

pub fn http_request_line_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.request_line", Some(AlProto::Http1))
}

pub fn http_response_line_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.response_line", Some(AlProto::Http1))
}

pub fn http_stat_code_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.stat_code", Some(AlProto::Http1))
}

pub fn http_request_body_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.request_body", Some(AlProto::Http1))
}

pub fn http_response_body_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "http.response_body", Some(AlProto::Http1))
}

pub fn dns_query_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "dns.query", Some(AlProto::Dns))
}

pub fn tls_sni_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    _value: Option<&str>,
) -> SetupResult {
    sticky_buffer(ctx, s, "tls.sni", Some(AlProto::Tls))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keywords::content::content_setup;
    use crate::signature::SIG_FLAG_APPLAYER;

    #[test]
    fn test_sticky_sets_alproto() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        http_uri_setup(&mut ctx, &mut s, None).unwrap();
        assert_eq!(s.alproto, AlProto::Http1);
        assert!(s.flags & SIG_FLAG_APPLAYER != 0);
        let uri = ctx.buffer_types.id_by_name("http.uri").unwrap();
        assert_eq!(s.init.list, Some(uri));
    }

    #[test]
    fn test_sticky_alproto_conflict() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        s.alproto = AlProto::Dns;
        assert!(http_uri_setup(&mut ctx, &mut s, None).is_err());
    }

    #[test]
    fn test_pkt_data_resets() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        http_uri_setup(&mut ctx, &mut s, None).unwrap();
        content_setup(&mut ctx, &mut s, Some("abc")).unwrap();
        pkt_data_setup(&mut ctx, &mut s, None).unwrap();
        assert!(s.init.list.is_none());
        content_setup(&mut ctx, &mut s, Some("def")).unwrap();
        assert!(s.init.smlists[crate::signature::LIST_PMATCH as usize]
            .head
            .is_some());
    }

    #[test]
    fn test_file_data() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        file_data_setup(&mut ctx, &mut s, None).unwrap();
        assert!(s.init.init_flags & SIG_FLAG_INIT_FILEDATA != 0);
        assert_eq!(s.init.alprotos[0], AlProto::Http1);

        // tls does not support files.
        let mut s = Signature::new("test");
        s.alproto = AlProto::Tls;
        assert!(file_data_setup(&mut ctx, &mut s, None).is_err());
    }

    #[test]
    fn test_file_name_flags() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        file_name_setup(&mut ctx, &mut s, None).unwrap();
        assert!(s.file_flags & FILE_SIG_NEED_FILENAME != 0);
    }

    #[test]
    fn test_frame() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        frame_setup(&mut ctx, &mut s, Some("http1.request")).unwrap();
        assert_eq!(s.alproto, AlProto::Http1);

        let mut s = Signature::new("test");
        assert!(frame_setup(&mut ctx, &mut s, Some("http1.bogus")).is_err());

        // http.uri is a buffer but not a frame.
        let mut s = Signature::new("test");
        assert!(frame_setup(&mut ctx, &mut s, Some("http.uri")).is_err());
    }
}
