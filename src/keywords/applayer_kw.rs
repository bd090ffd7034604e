// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! app-layer-protocol and app-layer-event keywords.

use crate::applayer::AlProto;
use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{MatchCtx, Signature, LIST_MATCH};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLayerProtocolData {
    pub alproto: AlProto,
    pub negated: bool,
}

pub fn protocol_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value
        .ok_or_else(|| SetupError::error("app-layer-protocol requires a value"))?
        .trim();
    if s.alproto != AlProto::Unknown {
        return Err(SetupError::error(
            "app-layer-protocol cannot be used in a rule with an app-layer protocol header",
        ));
    }
    let alproto = match AlProto::by_name(value) {
        Some(alproto) => alproto,
        // An unknown name here usually means detection for the protocol
        // is not built in; report it once per engine, then swallow.
        None => {
            return Err(SetupError::Silent(format!(
                "app-layer-protocol: unknown protocol \"{}\"",
                value
            )));
        }
    };
    let data = AppLayerProtocolData {
        alproto,
        negated: s.init.negated,
    };
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::AppLayerProtocol,
        MatchCtx::AppLayerProtocol(data),
        LIST_MATCH,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

/// The app-layer events each protocol parser can raise.
fn known_events(alproto: AlProto) -> &'static [&'static str] {
    match alproto {
        AlProto::Http | AlProto::Http1 => &[
            "missing_host_header",
            "double_encoded_uri",
            "request_field_too_long",
        ],
        AlProto::Dns => &["malformed_data", "z_flag_set", "infinite_loop"],
        AlProto::Tls => &["invalid_certificate", "overflow_heartbeat_message"],
        AlProto::Smtp => &["max_command_line_len_exceeded", "invalid_reply"],
        _ => &[],
    }
}

pub fn event_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value
        .ok_or_else(|| SetupError::error("app-layer-event requires a value"))?
        .trim();
    let (proto, event) = value
        .split_once('.')
        .ok_or_else(|| SetupError::error(format!("invalid app-layer-event: \"{}\"", value)))?;

    let alproto = match AlProto::by_name(proto) {
        Some(alproto) => alproto,
        // Protocol unknown to this build; skip the rule without noise.
        None => return Err(SetupError::SilentOk),
    };
    if !known_events(alproto).contains(&event) {
        return Err(SetupError::error(format!(
            "app-layer-event: unknown event \"{}\" for protocol \"{}\"",
            event, proto
        )));
    }
    s.set_alproto(alproto).map_err(SetupError::Error)?;
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::AppLayerEvent,
        MatchCtx::AppLayerEvent(value.to_string()),
        LIST_MATCH,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_protocol() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        protocol_setup(&mut ctx, &mut s, Some("http")).unwrap();
        assert!(s.init.smlists[LIST_MATCH as usize].head.is_some());

        // Unknown protocol is the silent path.
        let mut s = Signature::new("test");
        assert!(matches!(
            protocol_setup(&mut ctx, &mut s, Some("nntp")),
            Err(SetupError::Silent(_))
        ));

        // Conflicts with a rule-level app protocol.
        let mut s = Signature::new("test");
        s.alproto = AlProto::Dns;
        assert!(matches!(
            protocol_setup(&mut ctx, &mut s, Some("http")),
            Err(SetupError::Error(_))
        ));
    }

    #[test]
    fn test_event() {
        let mut ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        event_setup(&mut ctx, &mut s, Some("http1.missing_host_header")).unwrap();
        assert_eq!(s.alproto, AlProto::Http1);

        let mut s = Signature::new("test");
        assert_eq!(
            event_setup(&mut ctx, &mut s, Some("nntp.some_event")),
            Err(SetupError::SilentOk)
        );

        let mut s = Signature::new("test");
        assert!(matches!(
            event_setup(&mut ctx, &mut s, Some("dns.bogus_event")),
            Err(SetupError::Error(_))
        ));
    }
}
