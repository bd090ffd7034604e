// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! First parse pass: split a raw rule string into its seven header tokens
//! and the raw option segment.
//!
//! Address, port and protocol fields may be bracketed lists in which
//! whitespace does not terminate the field. The option segment is
//! everything between the outer parentheses; splitting it into individual
//! options honors `\;` escapes.

use crate::RuleParseError;
use nom::IResult;

/// The raw header fields and option segment of a rule.
///
/// All fields borrow from the input rule string. Nothing is validated
/// beyond tokenization; the header parser gives the fields meaning.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RuleTokens<'a> {
    pub action: &'a str,
    pub protocol: &'a str,
    pub src: &'a str,
    pub sp: &'a str,
    pub direction: &'a str,
    pub dst: &'a str,
    pub dp: &'a str,
    pub options: &'a str,
}

#[inline]
fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Reject control characters other than HT, LF and CR, as well as DEL.
pub fn check_control_chars(input: &str) -> Result<(), RuleParseError<&str>> {
    for c in input.chars() {
        if c < ' ' {
            if c == '\n' || c == '\r' || c == '\t' {
                continue;
            }
            return Err(RuleParseError::BadControlChar(c));
        } else if c == '\x7f' {
            return Err(RuleParseError::BadControlChar(c));
        }
    }
    Ok(())
}

/// Take the next whitespace separated token.
fn take_token(input: &str) -> IResult<&str, &str, RuleParseError<&str>> {
    let input = input.trim_start_matches(is_blank);
    if input.is_empty() {
        return Err(nom::Err::Error(RuleParseError::EmptyRule));
    }
    match input.find(|c| c == ' ' || c == '\t' || c == '\n' || c == '\r') {
        Some(end) => Ok((&input[end + 1..], &input[0..end])),
        None => Ok(("", input)),
    }
}

/// Take the next token, absorbing whitespace inside `[...]` lists.
///
/// Nesting is tracked by bracket depth so address lists like
/// `[1.1.1.1, [2.2.2.2, 3.3.3.3]]` come back as one field.
fn take_list(input: &str) -> IResult<&str, &str, RuleParseError<&str>> {
    let input = input.trim_start_matches(is_blank);
    if input.is_empty() {
        return Err(nom::Err::Error(RuleParseError::EmptyRule));
    }
    let mut depth = 0i32;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ' ' | '\t' | '\n' | '\r' => {
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[0..i]));
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(nom::Err::Error(RuleParseError::UnterminatedList));
    }
    Ok(("", input))
}

/// Split a rule into header tokens and the raw option segment.
pub fn tokenize(input: &str) -> Result<RuleTokens<'_>, RuleParseError<&str>> {
    if input.trim().is_empty() {
        return Err(RuleParseError::EmptyRule);
    }
    check_control_chars(input)?;

    fn to_err(err: nom::Err<RuleParseError<&str>>) -> RuleParseError<&str> {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => e,
            nom::Err::Incomplete(_) => RuleParseError::EmptyRule,
        }
    }

    let (rem, action) = take_token(input).map_err(to_err)?;
    let (rem, protocol) = take_list(rem).map_err(to_err)?;
    let (rem, src) = take_list(rem).map_err(to_err)?;
    let (rem, sp) = take_list(rem).map_err(to_err)?;
    let (rem, direction) = take_token(rem).map_err(to_err)?;
    let (rem, dst) = take_list(rem).map_err(to_err)?;
    let (rem, dp) = take_list(rem).map_err(to_err)?;

    let rem = rem.trim_start();
    let rem = match rem.strip_prefix('(') {
        Some(rem) => rem,
        None => return Err(RuleParseError::MissingOptionOpen),
    };
    let options = rem.trim_end_matches(|c: char| c.is_whitespace() || c == ')');

    Ok(RuleTokens {
        action,
        protocol,
        src,
        sp,
        direction,
        dst,
        dp,
        options,
    })
}

/// Take one option from the option segment.
///
/// An option ends at the first unescaped `;`. Only `\;` is interpreted at
/// this layer; all other escapes pass through to the keyword parsers.
pub fn take_option(input: &str) -> IResult<&str, &str, RuleParseError<&str>> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ';' {
            return Ok((&input[i + 1..], &input[0..i]));
        }
    }
    Err(nom::Err::Error(RuleParseError::UnterminatedOption))
}

/// Split the whole option segment into raw option strings.
pub fn split_options(input: &str) -> Result<Vec<&str>, RuleParseError<&str>> {
    let mut options = vec![];
    let mut rem = input;
    while !rem.trim().is_empty() {
        match take_option(rem) {
            Ok((rest, option)) => {
                options.push(option);
                rem = rest;
            }
            Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => return Err(err),
            Err(nom::Err::Incomplete(_)) => return Err(RuleParseError::UnterminatedOption),
        }
    }
    Ok(options)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens =
            tokenize("alert tcp 1.2.3.4 any -> !1.2.3.4 any (msg:\"t\"; sid:1;)").unwrap();
        assert_eq!(tokens.action, "alert");
        assert_eq!(tokens.protocol, "tcp");
        assert_eq!(tokens.src, "1.2.3.4");
        assert_eq!(tokens.sp, "any");
        assert_eq!(tokens.direction, "->");
        assert_eq!(tokens.dst, "!1.2.3.4");
        assert_eq!(tokens.dp, "any");
        assert_eq!(tokens.options, "msg:\"t\"; sid:1;");
    }

    #[test]
    fn test_tokenize_lists() {
        let tokens = tokenize(
            "alert tcp [1.1.1.1, [2.2.2.2, 3.3.3.3]] any -> $HOME_NET [80, 443] (sid:1;)",
        )
        .unwrap();
        assert_eq!(tokens.src, "[1.1.1.1, [2.2.2.2, 3.3.3.3]]");
        assert_eq!(tokens.sp, "any");
        assert_eq!(tokens.dst, "$HOME_NET");
        assert_eq!(tokens.dp, "[80, 443]");
    }

    #[test]
    fn test_tokenize_unterminated_list() {
        let err = tokenize("alert tcp [1.1.1.1 any -> any any (sid:1;)").unwrap_err();
        assert_eq!(err, RuleParseError::UnterminatedList);
    }

    #[test]
    fn test_tokenize_missing_options() {
        let err = tokenize("alert tcp any any -> any any").unwrap_err();
        assert!(matches!(
            err,
            RuleParseError::MissingOptionOpen | RuleParseError::EmptyRule
        ));
    }

    #[test]
    fn test_control_chars() {
        assert!(check_control_chars("alert tcp\t\r\n").is_ok());
        assert!(check_control_chars("alert\x07tcp").is_err());
        assert!(check_control_chars("alert\x7ftcp").is_err());
    }

    #[test]
    fn test_take_option() {
        let (rem, opt) = take_option("msg:\"a \\; b\"; sid:1;").unwrap();
        assert_eq!(opt, "msg:\"a \\; b\"");
        assert_eq!(rem, " sid:1;");

        assert_eq!(
            take_option("msg:\"no semi\""),
            Err(nom::Err::Error(RuleParseError::UnterminatedOption))
        );
    }

    #[test]
    fn test_split_options() {
        let options = split_options("msg:\"t\"; sid:1; rev:2;").unwrap();
        assert_eq!(options, vec!["msg:\"t\"", " sid:1", " rev:2"]);
    }
}
