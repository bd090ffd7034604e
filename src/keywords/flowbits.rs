// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The flowbits keyword. State changing commands run after the match
//! (postmatch list), checks run with the packet matches.

use crate::engine::DetectEngineCtx;
use crate::keyword::{KeywordId, SetupError, SetupResult};
use crate::signature::{
    MatchCtx, Signature, LIST_MATCH, LIST_POSTMATCH, SIG_FLAG_NOALERT,
};
use crate::RuleParseError;
use nom::bytes::complete::tag;
use nom::character::complete::{alphanumeric1, multispace0};
use nom::combinator::{opt, rest};
use nom::sequence::{preceded, tuple};
use nom::Err::Error;
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowbitCommand {
    #[serde(rename = "noalert")]
    NoAlert,
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "isset")]
    IsSet,
    #[serde(rename = "toggle")]
    Toggle,
    #[serde(rename = "unset")]
    Unset,
    #[serde(rename = "isnotset")]
    IsNotSet,
}

impl Display for FlowbitCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::IsNotSet => "isnotset",
            Self::IsSet => "isset",
            Self::Toggle => "toggle",
            Self::Unset => "unset",
            Self::NoAlert => "noalert",
            Self::Set => "set",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for FlowbitCommand {
    // Use nom::Err to satisfy ? in the parser.
    type Err = nom::Err<RuleParseError<&'static str>>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noalert" => Ok(Self::NoAlert),
            "set" => Ok(Self::Set),
            "isset" => Ok(Self::IsSet),
            "toggle" => Ok(Self::Toggle),
            "unset" => Ok(Self::Unset),
            "isnotset" => Ok(Self::IsNotSet),
            _ => Err(nom::Err::Error(RuleParseError::Flowbit(format!(
                "unknown command: {}",
                s
            )))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowbitsData {
    pub command: FlowbitCommand,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

pub fn parse_flowbits(input: &str) -> IResult<&str, FlowbitsData, RuleParseError<&str>> {
    let command_parser = preceded(multispace0, alphanumeric1);
    let name_parser = preceded(tag(","), preceded(multispace0, rest));
    let (input, (command, names)) = tuple((command_parser, opt(name_parser)))(input)?;
    let command = FlowbitCommand::from_str(command)?;

    fn make_error<S: AsRef<str>>(reason: S) -> nom::Err<RuleParseError<&'static str>> {
        Error(RuleParseError::Flowbit(reason.as_ref().to_string()))
    }

    match command {
        FlowbitCommand::IsNotSet
        | FlowbitCommand::Unset
        | FlowbitCommand::Toggle
        | FlowbitCommand::IsSet
        | FlowbitCommand::Set => {
            let names = names
                .ok_or_else(|| make_error(format!("{} requires argument", command)))?
                .split('|')
                .map(|s| s.trim().to_string())
                .collect();
            Ok((input, FlowbitsData { command, names }))
        }
        FlowbitCommand::NoAlert => {
            if names.is_some() {
                Err(make_error("noalert takes no arguments"))
            } else {
                Ok((
                    input,
                    FlowbitsData {
                        command,
                        names: vec![],
                    },
                ))
            }
        }
    }
}

pub fn flowbits_setup(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    value: Option<&str>,
) -> SetupResult {
    let value = value.ok_or_else(|| SetupError::error("flowbits requires a value"))?;
    let (_, data) =
        parse_flowbits(value).map_err(|err| SetupError::error(format!("{:?}", err)))?;

    let list = match data.command {
        FlowbitCommand::NoAlert => {
            s.flags |= SIG_FLAG_NOALERT;
            return Ok(());
        }
        FlowbitCommand::Set | FlowbitCommand::Unset | FlowbitCommand::Toggle => LIST_POSTMATCH,
        FlowbitCommand::IsSet | FlowbitCommand::IsNotSet => LIST_MATCH,
    };
    s.append_sm(
        &ctx.buffer_types,
        KeywordId::Flowbits,
        MatchCtx::Flowbits(data),
        list,
    )
    .map_err(SetupError::Error)?;
    Ok(())
}
