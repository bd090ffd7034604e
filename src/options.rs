// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Option list processing: per-option normalization, keyword dispatch and
//! the two-pass requires/sid handshake.

use crate::engine::DetectEngineCtx;
use crate::keyword::{
    self, SetupError, SIGMATCH_HANDLE_NEGATION, SIGMATCH_INFO_DEPRECATED, SIGMATCH_NOOPT,
    SIGMATCH_OPTIONAL_OPT, SIGMATCH_QUOTES_MANDATORY, SIGMATCH_QUOTES_OPTIONAL,
    SIGMATCH_SUPPORT_DIR, SIGMATCH_SUPPORT_FIREWALL,
};
use crate::lexer;
use crate::signature::{
    Signature, SIG_FLAG_INIT_FORCE_TOCLIENT, SIG_FLAG_INIT_FORCE_TOSERVER, SIG_FLAG_TOCLIENT,
    SIG_FLAG_TOSERVER, SIG_FLAG_TXBOTHDIR,
};
use crate::SigError;
use tracing::{debug, warn};

#[inline]
fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Pre-consume a leading `to_client`/`to_server` direction argument for
/// keywords that support one.
///
/// When the keyword takes nothing but a direction (`only_dir`), anything
/// else is an error. Otherwise a token merely starting with a direction
/// word (e.g. `to_client_body`) is left for the keyword's own parser.
fn setup_direction<'a>(
    s: &mut Signature,
    value: &'a str,
    only_dir: bool,
) -> Result<&'a str, String> {
    let (word, force, flag, conflict) = if value.starts_with("to_client") {
        (
            "to_client",
            SIG_FLAG_INIT_FORCE_TOCLIENT,
            SIG_FLAG_TOCLIENT,
            SIG_FLAG_TOSERVER,
        )
    } else if value.starts_with("to_server") {
        (
            "to_server",
            SIG_FLAG_INIT_FORCE_TOSERVER,
            SIG_FLAG_TOSERVER,
            SIG_FLAG_TOCLIENT,
        )
    } else {
        if only_dir {
            return Err("unknown option: only accepts to_server or to_client".to_string());
        }
        return Ok(value);
    };

    let mut rest = value[word.len()..].trim_start_matches(is_blank);
    if !rest.is_empty() {
        if only_dir {
            return Err("unknown option: only accepts to_server or to_client".to_string());
        }
        match rest.strip_prefix(',') {
            Some(after) => rest = after.trim_start_matches(is_blank),
            // Not a direction argument after all, e.g. to_client_body.
            None => return Ok(value),
        }
    }

    s.init.init_flags |= force;
    if s.flags & SIG_FLAG_TXBOTHDIR == 0 {
        if s.flags & conflict != 0 {
            return Err("contradictory directions".to_string());
        }
        s.flags |= flag;
    }
    Ok(rest)
}

/// Process a single raw option string.
fn parse_option(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    optstr: &str,
    requires: bool,
) -> Result<(), SigError> {
    let optstr = optstr.trim_start_matches(is_blank);

    let (optname, optvalue) = match optstr.split_once(':') {
        Some((name, value)) => (name.trim_end_matches(is_blank), Some(value)),
        None => (optstr.trim_end_matches(is_blank), None),
    };

    // Options processed only in the "requires" scan pass, and skipped in
    // the full pass.
    let requires_only =
        optname.eq_ignore_ascii_case("requires") || optname.eq_ignore_ascii_case("sid");
    if (requires && !requires_only) || (!requires && requires_only) {
        return Ok(());
    }

    let st = keyword::lookup(optname).ok_or_else(|| {
        SigError::parse(format!("unknown rule keyword '{}'.", optname))
    })?;

    if st.flags & (SIGMATCH_NOOPT | SIGMATCH_OPTIONAL_OPT) == 0 {
        if optvalue.map(|v| v.trim().is_empty()).unwrap_or(true) {
            return Err(SigError::parse(format!(
                "invalid formatting or malformed option to {} keyword: '{}'",
                optname, optstr
            )));
        }
    } else if st.flags & SIGMATCH_NOOPT != 0 && optvalue.map(|v| !v.trim().is_empty()).unwrap_or(false) {
        return Err(SigError::parse(format!(
            "unexpected option to {} keyword: '{}'",
            optname, optstr
        )));
    }

    s.init.negated = false;
    s.init.has_possible_prefilter |= st.prefilter;

    if st.flags & SIGMATCH_INFO_DEPRECATED != 0 {
        match st.alternative {
            Some(alt) => warn!(
                "keyword '{}' is deprecated and will be removed soon. Use '{}' instead.",
                st.name,
                keyword::name_of(alt)
            ),
            None => warn!(
                "keyword '{}' is deprecated and will be removed soon.",
                st.name
            ),
        }
    }

    let setup_ret = if let Some(optvalue) = optvalue.filter(|v| !v.trim().is_empty()) {
        // Trim leading whitespace.
        let mut value = optvalue.trim_start_matches(is_blank).to_string();
        if value.is_empty() {
            return Err(SigError::parse(format!(
                "invalid formatting or malformed option to {} keyword: '{}'",
                optname, optstr
            )));
        }

        if s.init.firewall_rule && st.flags & SIGMATCH_SUPPORT_FIREWALL == 0 {
            warn!(
                "keyword '{}' has not been tested for firewall rules",
                optname
            );
        }

        if st.flags & SIGMATCH_HANDLE_NEGATION != 0 {
            if let Some(rest) = value.strip_prefix('!') {
                s.init.negated = true;
                value = rest.trim_start_matches(is_blank).to_string();
                if value.is_empty() {
                    return Err(SigError::parse(format!(
                        "invalid formatting or malformed option to {} keyword: '{}'",
                        optname, optstr
                    )));
                }
            }
        }

        if st.flags & SIGMATCH_QUOTES_MANDATORY != 0 && !value.starts_with('"') {
            return Err(SigError::parse(format!(
                "invalid formatting to {} keyword: value must be double quoted '{}'",
                optname, optstr
            )));
        }

        if st.flags & (SIGMATCH_QUOTES_OPTIONAL | SIGMATCH_QUOTES_MANDATORY) != 0
            && value.starts_with('"')
        {
            let trimmed = value.trim_end_matches(is_blank);
            if trimmed.len() < 2 || !trimmed.ends_with('"') {
                return Err(SigError::parse(format!(
                    "bad option value formatting (possible missing semicolon) for keyword {}: '{}'",
                    optname, value
                )));
            }
            let inner = trimmed[1..trimmed.len() - 1].to_string();
            if inner.is_empty() {
                return Err(SigError::parse(format!(
                    "bad input for keyword {}: '{}'",
                    optname, value
                )));
            }
            value = inner;
        } else if value.starts_with('"') {
            return Err(SigError::parse(format!(
                "quotes on {} keyword that doesn't support them: '{}'",
                optname, optstr
            )));
        }

        if st.flags & SIGMATCH_SUPPORT_DIR != 0 {
            let only_dir = st.flags & SIGMATCH_OPTIONAL_OPT != 0;
            match setup_direction(s, &value, only_dir) {
                Ok(rest) => value = rest.to_string(),
                Err(err) => {
                    return Err(SigError::parse(format!(
                        "{} failed to setup direction: {}",
                        st.name, err
                    )));
                }
            }
        }

        let ret = (st.setup)(ctx, s, Some(&value));
        s.init.init_flags &= !SIG_FLAG_INIT_FORCE_TOSERVER;
        s.init.init_flags &= !SIG_FLAG_INIT_FORCE_TOCLIENT;
        ret
    } else {
        (st.setup)(ctx, s, None)
    };

    match setup_ret {
        Ok(()) => {
            s.init.negated = false;
            Ok(())
        }
        Err(SetupError::Error(msg)) => {
            debug!("\"{}\" failed to setup", st.name);
            Err(SigError::Parse(msg))
        }
        Err(SetupError::Silent(msg)) => {
            debug!("\"{}\" failed to setup", st.name);
            if !ctx.silent_errors[st.id.index()] {
                ctx.silent_errors[st.id.index()] = true;
                Err(SigError::Parse(msg))
            } else {
                Err(SigError::Silent)
            }
        }
        Err(SetupError::SilentOk) => Err(SigError::SilentOk),
        Err(SetupError::RequiresNotMet) => Err(SigError::RequiresNotMet),
    }
}

/// Walk the option segment of a rule, dispatching each option.
///
/// With `requires` set only the `requires` and `sid` options are
/// processed; in the full pass those two are skipped instead.
pub fn parse_options(
    ctx: &mut DetectEngineCtx,
    s: &mut Signature,
    options: &str,
    requires: bool,
) -> Result<(), SigError> {
    let raw = lexer::split_options(options).map_err(|e| SigError::Parse(e.to_string()))?;
    for optstr in raw {
        parse_option(ctx, s, optstr, requires)?;
    }
    Ok(())
}
