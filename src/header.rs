// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Rule header semantics: action and scope, protocol and hook, direction,
//! addresses and ports.

use crate::addr;
use crate::applayer::{self, AlProto, Dir};
use crate::engine::DetectEngineCtx;
use crate::port;
use crate::signature::{
    ActionScope, DetectProto, PktHook, Signature, SignatureHook, ACTION_ACCEPT, ACTION_ALERT,
    ACTION_CONFIG, ACTION_DROP, ACTION_PASS, ACTION_REJECT, ACTION_REJECT_BOTH, ACTION_REJECT_DST,
    SIG_FLAG_APPLAYER, SIG_FLAG_DP_ANY, SIG_FLAG_DST_ANY, SIG_FLAG_FIREWALL,
    SIG_FLAG_INIT_BIDIREC, SIG_FLAG_REQUIRE_PACKET, SIG_FLAG_REQUIRE_STREAM, SIG_FLAG_SP_ANY,
    SIG_FLAG_SRC_ANY, SIG_FLAG_TOCLIENT, SIG_FLAG_TOSERVER, SIG_FLAG_TXBOTHDIR,
};
use crate::SigError;
use tracing::{debug, error};

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_ESP: u8 = 50;
pub const IPPROTO_ICMPV6: u8 = 58;
pub const IPPROTO_SCTP: u8 = 132;

/// Parse a network protocol name into the protocol bitmask.
pub fn proto_parse(proto: &mut DetectProto, name: &str) -> Result<(), String> {
    match name.to_lowercase().as_str() {
        "tcp" => proto.set(IPPROTO_TCP),
        "tcp-pkt" => {
            proto.set(IPPROTO_TCP);
            proto.only_pkt = true;
        }
        "tcp-stream" => {
            proto.set(IPPROTO_TCP);
            proto.only_stream = true;
        }
        "udp" => proto.set(IPPROTO_UDP),
        "icmpv4" => proto.set(IPPROTO_ICMP),
        "icmpv6" => proto.set(IPPROTO_ICMPV6),
        "icmp" => {
            proto.set(IPPROTO_ICMP);
            proto.set(IPPROTO_ICMPV6);
        }
        "sctp" => proto.set(IPPROTO_SCTP),
        "esp" => proto.set(IPPROTO_ESP),
        "ip" => proto.any = true,
        _ => return Err(format!("unknown protocol: {}", name)),
    }
    Ok(())
}

/// Fill the protocol mask with the transport protocols an app-layer
/// protocol is carried over.
pub fn supported_ipprotos(alproto: AlProto, proto: &mut DetectProto) {
    match alproto {
        AlProto::Dns => {
            proto.set(IPPROTO_TCP);
            proto.set(IPPROTO_UDP);
        }
        AlProto::Quic => proto.set(IPPROTO_UDP),
        _ => proto.set(IPPROTO_TCP),
    }
}

fn action_flags(ctx: &DetectEngineCtx, action: &str) -> Result<u8, SigError> {
    let flags = match action.to_lowercase().as_str() {
        "alert" => ACTION_ALERT,
        "drop" => ACTION_DROP | ACTION_ALERT,
        "pass" => ACTION_PASS,
        "reject" | "rejectsrc" => ACTION_REJECT | ACTION_DROP | ACTION_ALERT,
        "rejectdst" => ACTION_REJECT_DST | ACTION_DROP | ACTION_ALERT,
        "rejectboth" => ACTION_REJECT_BOTH | ACTION_DROP | ACTION_ALERT,
        "config" => ACTION_CONFIG,
        "accept" => ACTION_ACCEPT,
        _ => {
            error!("An invalid action \"{}\" was given", action);
            return Err(SigError::parse(format!(
                "An invalid action \"{}\" was given",
                action
            )));
        }
    };
    if flags & (ACTION_REJECT | ACTION_REJECT_DST | ACTION_REJECT_BOTH) != 0
        && !ctx.reject_supported
    {
        error!("raw socket support required for action \"{}\"", action);
        return Err(SigError::parse(format!(
            "raw socket support required for action \"{}\"",
            action
        )));
    }
    Ok(flags)
}

/// Parse `action[:scope]` and record it on the signature.
pub fn parse_action(
    ctx: &DetectEngineCtx,
    s: &mut Signature,
    action_in: &str,
) -> Result<(), SigError> {
    let (a, scope) = match action_in.split_once(':') {
        Some((a, o)) => (a, Some(o)),
        None => (action_in, None),
    };

    let flags = action_flags(ctx, a)?;

    if let Some(o) = scope {
        let scope_flags = if flags & (ACTION_DROP | ACTION_PASS) != 0 {
            match o {
                "packet" => ActionScope::Packet,
                "flow" => ActionScope::Flow,
                _ => {
                    return Err(SigError::parse(format!(
                        "invalid action scope '{}' in action '{}': only 'packet' and 'flow' allowed",
                        o, action_in
                    )));
                }
            }
        } else if flags & ACTION_ACCEPT != 0 {
            match o {
                "packet" => ActionScope::Packet,
                "flow" => ActionScope::Flow,
                "tx" => ActionScope::Tx,
                "hook" => ActionScope::Hook,
                _ => {
                    return Err(SigError::parse(format!(
                        "invalid action scope '{}' in action '{}': only 'packet', 'flow', 'tx' and 'hook' allowed",
                        o, action_in
                    )));
                }
            }
        } else if flags & ACTION_CONFIG != 0 {
            match o {
                "packet" => ActionScope::Packet,
                _ => {
                    return Err(SigError::parse(format!(
                        "invalid action scope '{}' in action '{}': only 'packet' allowed",
                        o, action_in
                    )));
                }
            }
        } else {
            return Err(SigError::parse(format!(
                "invalid action scope '{}' in action '{}': scope not supported for this action",
                o, action_in
            )));
        };
        s.action_scope = scope_flags;
    }

    if s.init.firewall_rule && s.action_scope == ActionScope::NotSet {
        return Err(SigError::parse(
            "firewall rules require setting an explicit action scope",
        ));
    }
    if !s.init.firewall_rule && flags & ACTION_ACCEPT != 0 {
        return Err(SigError::parse(
            "'accept' action only supported for firewall rules",
        ));
    }
    if s.init.firewall_rule && flags & ACTION_PASS != 0 {
        return Err(SigError::parse(
            "'pass' action not supported for firewall rules",
        ));
    }

    s.action = flags;
    Ok(())
}

fn parse_pkt_hook(s: &mut Signature, p: &str, h: &str) -> Result<(), SigError> {
    match PktHook::from_str(h) {
        Some(hook) => {
            s.init.hook = SignatureHook::Pkt(hook);
            Ok(())
        }
        None => Err(SigError::parse(format!(
            "protocol \"{}\" does not support hook \"{}\"",
            p, h
        ))),
    }
}

fn parse_app_hook(
    ctx: &DetectEngineCtx,
    s: &mut Signature,
    proto_hook: &str,
    p: &str,
    h: &str,
) -> Result<(), SigError> {
    let (dir_flag, progress) = match h {
        "request_started" => (SIG_FLAG_TOSERVER, 0),
        "response_started" => (SIG_FLAG_TOCLIENT, 0),
        "request_complete" => (
            SIG_FLAG_TOSERVER,
            applayer::progress_completion(s.alproto, Dir::ToServer),
        ),
        "response_complete" => (
            SIG_FLAG_TOCLIENT,
            applayer::progress_completion(s.alproto, Dir::ToClient),
        ),
        _ => {
            if let Some(progress) = applayer::state_id_by_name(s.alproto, h, Dir::ToServer) {
                (SIG_FLAG_TOSERVER, progress)
            } else if let Some(progress) = applayer::state_id_by_name(s.alproto, h, Dir::ToClient) {
                (SIG_FLAG_TOCLIENT, progress)
            } else {
                return Err(SigError::parse(format!(
                    "protocol \"{}\" does not support hook \"{}\"",
                    p, h
                )));
            }
        }
    };
    s.flags |= dir_flag;

    let generic_hook_name = format!("{}:generic", proto_hook);
    let sm_list = match ctx.buffer_types.id_by_name(&generic_hook_name) {
        Some(list) => list,
        None => {
            error!(
                "no list registered as {} for hook {}",
                generic_hook_name, proto_hook
            );
            return Err(SigError::parse(format!(
                "no list registered as {} for hook {}",
                generic_hook_name, proto_hook
            )));
        }
    };
    s.init.hook = SignatureHook::App {
        alproto: s.alproto,
        progress,
        sm_list,
    };
    s.app_progress_hook = progress;
    debug!(
        "protocol:{} hook:{}: alproto:{} progress:{}",
        p,
        h,
        s.alproto.name(),
        progress
    );
    Ok(())
}

/// Parse `proto[:hook]` and record protocol mask, app-layer protocol and
/// hook on the signature.
pub fn parse_proto(
    ctx: &DetectEngineCtx,
    s: &mut Signature,
    protostr: &str,
) -> Result<(), SigError> {
    if protostr.len() > 32 {
        return Err(SigError::parse(format!(
            "protocol specification too long: '{}'",
            protostr
        )));
    }
    let (p, h) = match protostr.split_once(':') {
        Some((p, h)) => (p, Some(h)),
        None => (protostr, None),
    };
    if p.is_empty() {
        return Err(SigError::parse(format!(
            "invalid protocol specification '{}'",
            protostr
        )));
    }

    if proto_parse(&mut s.proto, p).is_ok() {
        if let Some(h) = h {
            debug!("non-app-layer rule with {}:{}", p, h);
            parse_pkt_hook(s, p, h)?;
        }
    } else if let Some(alproto) = AlProto::by_name(p) {
        s.alproto = alproto;
        s.flags |= SIG_FLAG_APPLAYER;
        supported_ipprotos(alproto, &mut s.proto);
        if let Some(h) = h {
            parse_app_hook(ctx, s, protostr, p, h)?;
        }
    } else {
        error!(
            "protocol \"{}\" cannot be used in a signature. Either detection for this protocol is not yet supported OR detection has been disabled for protocol",
            p
        );
        return Err(SigError::parse(format!(
            "protocol \"{}\" cannot be used in a signature",
            p
        )));
    }

    if s.proto.only_pkt {
        s.flags |= SIG_FLAG_REQUIRE_PACKET;
    } else if s.proto.only_stream {
        s.flags |= SIG_FLAG_REQUIRE_STREAM;
    }

    Ok(())
}

/// Apply the direction marker.
pub fn apply_direction(s: &mut Signature, direction: &str) -> Result<(), SigError> {
    match direction {
        "->" => {}
        "<>" => {
            s.init.init_flags |= SIG_FLAG_INIT_BIDIREC;
        }
        "=>" => {
            if s.flags & SIG_FLAG_FIREWALL != 0 {
                return Err(SigError::parse(
                    "transactional bidirectional rules not supported for firewall rules",
                ));
            }
            s.flags |= SIG_FLAG_TXBOTHDIR;
        }
        _ => {
            return Err(SigError::parse(format!(
                "\"{}\" is not a valid direction modifier, \"->\" and \"<>\" are supported.",
                direction
            )));
        }
    }
    Ok(())
}

/// Parse an address field into the signature's source or destination.
pub fn parse_address(s: &mut Signature, addrstr: &str, to_dst: bool) -> Result<(), SigError> {
    debug!("Address Group \"{}\" to be parsed now", addrstr);
    let list = addr::parse_address_list(addrstr).map_err(|err| {
        error!("{}", err);
        SigError::Parse(err)
    })?;
    if !to_dst {
        if list.any {
            s.flags |= SIG_FLAG_SRC_ANY;
        }
        s.init.src = list;
    } else {
        if list.any {
            s.flags |= SIG_FLAG_DST_ANY;
        }
        s.init.dst = list;
    }
    Ok(())
}

/// Parse a port field into the signature's source or destination port.
pub fn parse_port(s: &mut Signature, portstr: &str, to_dst: bool) -> Result<(), SigError> {
    debug!("Port group \"{}\" to be parsed", portstr);
    let list = port::parse_port_list(portstr).map_err(|err| {
        error!("{}", err);
        SigError::Parse(err)
    })?;
    if !to_dst {
        if list.any {
            s.flags |= SIG_FLAG_SP_ANY;
        }
        s.sp = list;
    } else {
        if list.any {
            s.flags |= SIG_FLAG_DP_ANY;
        }
        s.dp = list;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::DetectEngineCtx;

    #[test]
    fn test_proto_parse() {
        let mut proto = DetectProto::default();
        proto_parse(&mut proto, "tcp").unwrap();
        assert!(proto.is_set(IPPROTO_TCP));
        assert!(!proto.is_set(IPPROTO_UDP));

        let mut proto = DetectProto::default();
        proto_parse(&mut proto, "icmp").unwrap();
        assert!(proto.is_set(IPPROTO_ICMP));
        assert!(proto.is_set(IPPROTO_ICMPV6));

        let mut proto = DetectProto::default();
        proto_parse(&mut proto, "tcp-stream").unwrap();
        assert!(proto.only_stream);

        let mut proto = DetectProto::default();
        assert!(proto_parse(&mut proto, "bogus").is_err());
    }

    #[test]
    fn test_parse_action_scopes() {
        let ctx = DetectEngineCtx::new();

        let mut s = Signature::new("test");
        parse_action(&ctx, &mut s, "alert").unwrap();
        assert_eq!(s.action, ACTION_ALERT);

        let mut s = Signature::new("test");
        parse_action(&ctx, &mut s, "drop:flow").unwrap();
        assert_eq!(s.action, ACTION_DROP | ACTION_ALERT);
        assert_eq!(s.action_scope, ActionScope::Flow);

        // reject does not take a scope.
        let mut s = Signature::new("test");
        assert!(parse_action(&ctx, &mut s, "reject:packet").is_err());

        // alert does not take a scope.
        let mut s = Signature::new("test");
        assert!(parse_action(&ctx, &mut s, "alert:packet").is_err());

        // config only takes packet.
        let mut s = Signature::new("test");
        assert!(parse_action(&ctx, &mut s, "config:flow").is_err());
        parse_action(&ctx, &mut s, "config:packet").unwrap();
    }

    #[test]
    fn test_accept_requires_firewall() {
        let ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        assert!(parse_action(&ctx, &mut s, "accept:flow").is_err());

        let mut s = Signature::new("test");
        s.init.firewall_rule = true;
        parse_action(&ctx, &mut s, "accept:hook").unwrap();
        assert_eq!(s.action_scope, ActionScope::Hook);

        // Firewall rules require an explicit scope.
        let mut s = Signature::new("test");
        s.init.firewall_rule = true;
        assert!(parse_action(&ctx, &mut s, "drop").is_err());

        // pass is not allowed in firewall rules.
        let mut s = Signature::new("test");
        s.init.firewall_rule = true;
        assert!(parse_action(&ctx, &mut s, "pass:flow").is_err());
    }

    #[test]
    fn test_parse_proto_app() {
        let ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        parse_proto(&ctx, &mut s, "http").unwrap();
        assert_eq!(s.alproto, AlProto::Http);
        assert!(s.flags & SIG_FLAG_APPLAYER != 0);
        assert!(s.proto.is_set(IPPROTO_TCP));
    }

    #[test]
    fn test_parse_proto_pkt_hook() {
        let ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        parse_proto(&ctx, &mut s, "tcp:pre_stream").unwrap();
        assert_eq!(s.init.hook, SignatureHook::Pkt(PktHook::PreStream));

        let mut s = Signature::new("test");
        assert!(parse_proto(&ctx, &mut s, "tcp:bogus_hook").is_err());
    }

    #[test]
    fn test_parse_proto_app_hook() {
        let ctx = DetectEngineCtx::new();
        let mut s = Signature::new("test");
        parse_proto(&ctx, &mut s, "dns:request_complete").unwrap();
        match s.init.hook {
            SignatureHook::App {
                alproto, progress, ..
            } => {
                assert_eq!(alproto, AlProto::Dns);
                assert_eq!(progress, 1);
            }
            other => panic!("unexpected hook: {:?}", other),
        }
        assert!(s.flags & SIG_FLAG_TOSERVER != 0);

        let mut s = Signature::new("test");
        assert!(parse_proto(&ctx, &mut s, "dns:bogus_state").is_err());
    }

    #[test]
    fn test_direction() {
        let mut s = Signature::new("test");
        apply_direction(&mut s, "->").unwrap();
        assert_eq!(s.init.init_flags & SIG_FLAG_INIT_BIDIREC, 0);

        let mut s = Signature::new("test");
        apply_direction(&mut s, "<>").unwrap();
        assert!(s.init.init_flags & SIG_FLAG_INIT_BIDIREC != 0);

        let mut s = Signature::new("test");
        apply_direction(&mut s, "=>").unwrap();
        assert!(s.flags & SIG_FLAG_TXBOTHDIR != 0);

        let mut s = Signature::new("test");
        s.flags |= SIG_FLAG_FIREWALL;
        assert!(apply_direction(&mut s, "=>").is_err());

        let mut s = Signature::new("test");
        assert!(apply_direction(&mut s, "<-").is_err());
    }
}
