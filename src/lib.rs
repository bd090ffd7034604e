// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! A Suricata-compatible signature (rule) parser and validator.
//!
//! Rules in the usual form
//!
//! ```text
//! <action>[:scope] <proto>[:hook] <src> <sp> <dir> <dst> <dp> (<options>)
//! ```
//!
//! are parsed into fully validated [`Signature`] values, ready for a
//! detection engine to compile into matcher graphs. Parsing is driven by
//! a process-wide keyword table; each keyword's setup routine builds onto
//! the signature through the builder interface in [`signature`].
//!
//! The main entry point is [`DetectEngineCtx::append_sig`] which parses a
//! rule, validates it, handles bidirectional cloning and duplicate
//! (gid, sid) resolution, and appends the result to the engine's rule list.

pub mod addr;
pub mod applayer;
pub mod buffer;
pub mod common;
pub mod engine;
pub mod header;
pub mod keyword;
pub mod keywords;
pub mod lexer;
pub mod loader;
pub mod options;
pub mod parse;
pub mod port;
pub mod signature;
pub mod util;
pub mod validate;

use nom::error::ErrorKind;
use nom::error::ParseError;
use std::fmt::{Display, Formatter};

pub use engine::DetectEngineCtx;
pub use signature::Signature;

/// Custom rule parse errors for the nom based sub-parsers.
///
/// Implemented based on the nom example for implementing custom errors.
#[derive(Debug, PartialEq)]
pub enum RuleParseError<I> {
    EmptyRule,
    BadControlChar(char),
    MissingOptionOpen,
    UnterminatedOption,
    UnterminatedList,
    Flowbit(String),
    Nom(I, ErrorKind),
}

impl<I> ParseError<I> for RuleParseError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        RuleParseError::Nom(input, kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I: std::fmt::Debug> Display for RuleParseError<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRule => write!(f, "empty rule"),
            Self::BadControlChar(c) => write!(f, "invalid control character {:?}", c),
            Self::MissingOptionOpen => write!(f, "no rule options"),
            Self::UnterminatedOption => write!(f, "no terminating \";\" found"),
            Self::UnterminatedList => write!(f, "unterminated list"),
            Self::Flowbit(s) => write!(f, "flowbits: {}", s),
            Self::Nom(i, k) => write!(f, "nom error {:?} at {:?}", k, i),
        }
    }
}

/// Top level signature parse outcome, covering both hard errors and the
/// quiet skip cases the engine tracks separately.
#[derive(Debug, PartialEq)]
pub enum SigError {
    /// Hard, user visible parse or validation error.
    Parse(String),
    /// Error that has already been reported once for this keyword and is
    /// now swallowed.
    Silent,
    /// The rule was skipped on purpose. Not an error from the user's
    /// point of view.
    SilentOk,
    /// A `requires` predicate was not satisfied; the rule is skipped.
    RequiresNotMet,
    /// Duplicate (gid, sid) with a revision that does not win.
    Duplicate { gid: u32, sid: u32 },
}

impl Display for SigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "{}", msg),
            Self::Silent => write!(f, "silent error"),
            Self::SilentOk => write!(f, "rule skipped"),
            Self::RequiresNotMet => write!(f, "rule requirements not met"),
            Self::Duplicate { gid, sid } => {
                write!(f, "duplicate signature gid:{} sid:{}", gid, sid)
            }
        }
    }
}

impl std::error::Error for SigError {}

impl SigError {
    pub(crate) fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }
}

impl<I: std::fmt::Debug> From<nom::Err<RuleParseError<I>>> for SigError {
    fn from(err: nom::Err<RuleParseError<I>>) -> Self {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => SigError::Parse(e.to_string()),
            nom::Err::Incomplete(_) => SigError::Parse("incomplete input".to_string()),
        }
    }
}
