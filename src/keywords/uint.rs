// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Integer comparison keywords: the shared `UintData` argument form and
//! the dsize and stream_size keywords built on it.

use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{MatchCtx, Signature, LIST_MATCH, SIG_FLAG_REQUIRE_PACKET};
use num_traits::Num;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UintMode {
    #[default]
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "range")]
    Range,
    #[serde(rename = "ne")]
    Ne,
}

/// Parsed integer comparison: `>10`, `<=5`, `100<>200`, `!80`, `=3`, `7`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UintData<T> {
    pub arg1: T,
    pub arg2: T,
    pub mode: UintMode,
}

fn parse_one<T: FromStr + Num + Copy>(input: &str) -> Result<T, String> {
    input
        .trim()
        .parse::<T>()
        .map_err(|_| format!("invalid integer: {}", input))
}

/// Parse an integer comparison argument.
pub fn parse_uint<T>(input: &str) -> Result<UintData<T>, String>
where
    T: FromStr + Num + PartialOrd + Copy + Default,
{
    let input = input.trim();
    if input.is_empty() {
        return Err("empty integer argument".to_string());
    }

    if let Some((lo, hi)) = input.split_once("<>") {
        let arg1: T = parse_one(lo)?;
        let arg2: T = parse_one(hi)?;
        if arg2 <= arg1 {
            return Err(format!("invalid range: {}", input));
        }
        return Ok(UintData {
            arg1,
            arg2,
            mode: UintMode::Range,
        });
    }

    let (mode, rest) = if let Some(rest) = input.strip_prefix(">=") {
        (UintMode::Gte, rest)
    } else if let Some(rest) = input.strip_prefix("<=") {
        (UintMode::Lte, rest)
    } else if let Some(rest) = input.strip_prefix('>') {
        (UintMode::Gt, rest)
    } else if let Some(rest) = input.strip_prefix('<') {
        (UintMode::Lt, rest)
    } else if let Some(rest) = input.strip_prefix('!') {
        (UintMode::Ne, rest.trim_start_matches('='))
    } else if let Some(rest) = input.strip_prefix('=') {
        (UintMode::Equal, rest)
    } else {
        (UintMode::Equal, input)
    };

    Ok(UintData {
        arg1: parse_one(rest)?,
        arg2: T::default(),
        mode,
    })
}

pub fn dsize_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("dsize requires a value"))?;
    let du = parse_uint::<u16>(value).map_err(SetupError::Error)?;
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Dsize,
        MatchCtx::Dsize(du),
        LIST_MATCH,
    )
    .map_err(SetupError::Error)?;
    s.flags |= SIG_FLAG_REQUIRE_PACKET;
    Ok(())
}

/// Which stream's byte count stream_size compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamSelector {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "client")]
    Client,
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "either")]
    Either,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSizeData {
    pub stream: StreamSelector,
    pub arg: UintData<u64>,
}

pub fn parse_stream_size(input: &str) -> Result<StreamSizeData, String> {
    let (stream, rest) = input
        .split_once(',')
        .ok_or_else(|| format!("invalid stream_size argument: {}", input))?;
    let stream = match stream.trim() {
        "server" => StreamSelector::Server,
        "client" => StreamSelector::Client,
        "both" => StreamSelector::Both,
        "either" => StreamSelector::Either,
        other => return Err(format!("invalid stream_size stream: {}", other)),
    };
    // The legacy form is `stream,op,number`; the comma between operator
    // and number is optional.
    let compact: String = rest
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let arg = parse_uint::<u64>(&compact)?;
    Ok(StreamSizeData { stream, arg })
}

pub fn stream_size_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("stream_size requires a value"))?;
    let data = parse_stream_size(value).map_err(SetupError::Error)?;
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::StreamSize,
        MatchCtx::StreamSize(Box::new(data)),
        LIST_MATCH,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}
