// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The flow keyword and the implicit direction setup used by the
//! validator.

use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{
    MatchCtx, Signature, LIST_MATCH, SIG_FLAG_INIT_FLOW, SIG_FLAG_REQUIRE_PACKET,
    SIG_FLAG_REQUIRE_STREAM, SIG_FLAG_TOCLIENT, SIG_FLAG_TOSERVER, SIG_FLAG_TXBOTHDIR,
};
use crate::util::is_default;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowData {
    #[serde(skip_serializing_if = "is_default")]
    pub to_client: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub to_server: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub from_client: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub from_server: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub established: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub not_established: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub stateless: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub only_stream: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub no_stream: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub only_frag: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub no_frag: bool,
}

impl FlowData {
    fn wants_toserver(&self) -> bool {
        self.to_server || self.from_client
    }

    fn wants_toclient(&self) -> bool {
        self.to_client || self.from_server
    }

    /// True when the keyword carries more than a direction and needs a
    /// runtime match.
    fn needs_match(&self) -> bool {
        self.established
            || self.not_established
            || self.stateless
            || self.only_stream
            || self.no_stream
            || self.only_frag
            || self.no_frag
    }
}

pub fn parse_flow(input: &str) -> Result<FlowData, String> {
    let mut fd = FlowData::default();
    for option in input.split(',') {
        match option.trim() {
            "to_client" => fd.to_client = true,
            "to_server" => fd.to_server = true,
            "from_client" => fd.from_client = true,
            "from_server" => fd.from_server = true,
            "established" => fd.established = true,
            "not_established" => fd.not_established = true,
            "stateless" => fd.stateless = true,
            "only_stream" => fd.only_stream = true,
            "no_stream" => fd.no_stream = true,
            "only_frag" => fd.only_frag = true,
            "no_frag" => fd.no_frag = true,
            other => return Err(format!("invalid flow option: {}", other)),
        }
    }
    Ok(fd)
}

pub fn flow_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("flow requires a value"))?;
    let fd = parse_flow(value).map_err(SetupError::Error)?;

    if fd.wants_toserver() && fd.wants_toclient() {
        return Err(SetupError::error("flow keyword has contradictory directions"));
    }
    if fd.established && fd.not_established {
        return Err(SetupError::error(
            "flow keyword mixes established and not_established",
        ));
    }
    if fd.established && fd.stateless {
        return Err(SetupError::error(
            "flow keyword mixes established and stateless",
        ));
    }
    if fd.only_stream && fd.no_stream {
        return Err(SetupError::error(
            "flow keyword mixes only_stream and no_stream",
        ));
    }
    if s.flags & SIG_FLAG_TXBOTHDIR != 0 && (fd.wants_toserver() || fd.wants_toclient()) {
        return Err(SetupError::error(
            "flow direction cannot be used with transactional bidirectional rules",
        ));
    }

    if fd.wants_toserver() {
        if s.flags & SIG_FLAG_TOCLIENT != 0 {
            return Err(SetupError::error("contradictory directions"));
        }
        s.flags |= SIG_FLAG_TOSERVER;
    }
    if fd.wants_toclient() {
        if s.flags & SIG_FLAG_TOSERVER != 0 {
            return Err(SetupError::error("contradictory directions"));
        }
        s.flags |= SIG_FLAG_TOCLIENT;
    }
    if fd.only_stream {
        s.flags |= SIG_FLAG_REQUIRE_STREAM;
    }
    if fd.no_stream {
        s.flags |= SIG_FLAG_REQUIRE_PACKET;
    }
    s.init.init_flags |= SIG_FLAG_INIT_FLOW;

    if fd.needs_match() {
        s.append_sm(
            &ctx.buffer_types,
            KeywordId::Flow,
            MatchCtx::Flow(fd),
            LIST_MATCH,
        )
        .map_err(SetupError::Error)?;
    }
    Ok(())
}

/// Apply a direction the validator derived from the rule's buffers.
///
/// The default both-directions state is overridden; an explicit opposite
/// direction is a conflict.
pub fn flow_setup_implicit(s: &mut Signature, dir_flag: u32) -> Result<(), String> {
    let both = SIG_FLAG_TOSERVER | SIG_FLAG_TOCLIENT;
    if s.flags & both == both {
        s.flags &= !both;
    } else if s.flags & both != 0 && s.flags & both != dir_flag {
        return Err("rule direction conflicts with its keywords".to_string());
    }
    s.flags |= dir_flag;
    Ok(())
}
