// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The process-wide keyword table.
//!
//! Every recognized rule option keyword has one entry carrying its parse
//! flags and setup routine. The table is built once and never mutated;
//! per-engine state such as strict mode overrides and the silent error
//! table live on the engine context.

use crate::engine::DetectEngineCtx;
use crate::keywords;
use crate::signature::Signature;
use lazy_static::lazy_static;

// Keyword entry flags.
pub const SIGMATCH_NOOPT: u16 = 1 << 0;
pub const SIGMATCH_OPTIONAL_OPT: u16 = 1 << 1;
pub const SIGMATCH_QUOTES_OPTIONAL: u16 = 1 << 2;
pub const SIGMATCH_QUOTES_MANDATORY: u16 = 1 << 3;
pub const SIGMATCH_HANDLE_NEGATION: u16 = 1 << 4;
pub const SIGMATCH_STRICT_PARSING: u16 = 1 << 5;
pub const SIGMATCH_INFO_DEPRECATED: u16 = 1 << 6;
pub const SIGMATCH_SUPPORT_FIREWALL: u16 = 1 << 7;
pub const SIGMATCH_SUPPORT_DIR: u16 = 1 << 8;

/// Identifier of a registered keyword; doubles as the index into the
/// keyword table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum KeywordId {
    Sid,
    Gid,
    Rev,
    Msg,
    Priority,
    Classtype,
    Reference,
    Metadata,
    Requires,
    Content,
    Nocase,
    Rawbytes,
    Startswith,
    Endswith,
    FastPattern,
    Depth,
    Offset,
    Distance,
    Within,
    Bsize,
    ByteTest,
    ByteJump,
    Pcre,
    IsDataAt,
    Dsize,
    StreamSize,
    Flow,
    Flowbits,
    AppLayerProtocol,
    AppLayerEvent,
    PktData,
    FileData,
    FileName,
    Filestore,
    Frame,
    HttpUri,
    HttpUriRaw,
    HttpMethod,
    HttpHost,
    HttpUserAgent,
    HttpHeader,
    HttpRequestLine,
    HttpResponseLine,
    HttpStatCode,
    HttpRequestBody,
    HttpResponseBody,
    DnsQuery,
    TlsSni,
    HttpUriCm,
    HttpRawUriCm,
    HttpMethodCm,
    HttpHeaderCm,
    HttpCookieCm,
    HttpClientBodyCm,
    HttpServerBodyCm,
    HttpUserAgentCm,
    HttpHostCm,
    UriContent,
}

impl KeywordId {
    pub const COUNT: usize = 58;

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// How a keyword's setup routine failed.
#[derive(Debug, PartialEq)]
pub enum SetupError {
    /// Hard error, reported to the user.
    Error(String),
    /// Error that should only be reported once per keyword per engine.
    Silent(String),
    /// The rule should be skipped without a user-visible error.
    SilentOk,
    /// A `requires` predicate was not satisfied.
    RequiresNotMet,
}

pub type SetupResult = Result<(), SetupError>;

impl SetupError {
    pub fn error<S: Into<String>>(msg: S) -> SetupError {
        SetupError::Error(msg.into())
    }
}

/// Keyword setup callback: engine context, the signature under
/// construction, and the normalized option value.
pub type SetupFn = fn(&mut DetectEngineCtx, &mut Signature, Option<&str>) -> SetupResult;

/// One keyword table entry.
pub struct Keyword {
    pub id: KeywordId,
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub flags: u16,
    pub setup: SetupFn,
    /// Replacement keyword named in deprecation notices.
    pub alternative: Option<KeywordId>,
    /// Bitmask of detection tables the keyword supports; 0 means all.
    pub tables: u8,
    /// Keyword can drive a prefilter engine.
    pub prefilter: bool,
}

fn entry(id: KeywordId, name: &'static str, flags: u16, setup: SetupFn) -> Keyword {
    Keyword {
        id,
        name,
        alias: None,
        flags,
        setup,
        alternative: None,
        tables: 0,
        prefilter: false,
    }
}

// Tables the flow keyword cannot run in: before a flow exists there is
// nothing to match on.
const FLOW_TABLES: u8 = (1 << 2) | (1 << 3) | (1 << 4) | (1 << 5);

lazy_static! {
    static ref SIGMATCH_TABLE: Vec<Keyword> = {
        use KeywordId::*;
        let mut t = vec![
            entry(Sid, "sid", 0, keywords::meta::sid_setup),
            entry(Gid, "gid", 0, keywords::meta::gid_setup),
            entry(Rev, "rev", 0, keywords::meta::rev_setup),
            entry(Msg, "msg", SIGMATCH_QUOTES_MANDATORY, keywords::meta::msg_setup),
            entry(Priority, "priority", 0, keywords::meta::priority_setup),
            entry(Classtype, "classtype", SIGMATCH_QUOTES_OPTIONAL, keywords::meta::classtype_setup),
            entry(Reference, "reference", 0, keywords::meta::reference_setup),
            entry(Metadata, "metadata", 0, keywords::meta::metadata_setup),
            entry(Requires, "requires", 0, keywords::requires::requires_setup),
            entry(
                Content,
                "content",
                SIGMATCH_QUOTES_MANDATORY | SIGMATCH_HANDLE_NEGATION | SIGMATCH_SUPPORT_FIREWALL,
                keywords::content::content_setup,
            ),
            entry(Nocase, "nocase", SIGMATCH_NOOPT | SIGMATCH_SUPPORT_FIREWALL, keywords::modifiers::nocase_setup),
            entry(Rawbytes, "rawbytes", SIGMATCH_NOOPT, keywords::modifiers::rawbytes_setup),
            entry(Startswith, "startswith", SIGMATCH_NOOPT, keywords::modifiers::startswith_setup),
            entry(Endswith, "endswith", SIGMATCH_NOOPT, keywords::modifiers::endswith_setup),
            entry(FastPattern, "fast_pattern", SIGMATCH_OPTIONAL_OPT, keywords::modifiers::fast_pattern_setup),
            entry(Depth, "depth", 0, keywords::modifiers::depth_setup),
            entry(Offset, "offset", 0, keywords::modifiers::offset_setup),
            entry(Distance, "distance", 0, keywords::modifiers::distance_setup),
            entry(Within, "within", 0, keywords::modifiers::within_setup),
            entry(Bsize, "bsize", 0, keywords::modifiers::bsize_setup),
            entry(ByteTest, "byte_test", 0, keywords::byte_test::byte_test_setup),
            entry(ByteJump, "byte_jump", 0, keywords::byte_jump::byte_jump_setup),
            entry(
                Pcre,
                "pcre",
                SIGMATCH_QUOTES_MANDATORY | SIGMATCH_HANDLE_NEGATION,
                keywords::pcre::pcre_setup,
            ),
            entry(IsDataAt, "isdataat", 0, keywords::isdataat::isdataat_setup),
            entry(Dsize, "dsize", SIGMATCH_SUPPORT_FIREWALL, keywords::uint::dsize_setup),
            entry(StreamSize, "stream_size", 0, keywords::uint::stream_size_setup),
            entry(Flow, "flow", SIGMATCH_SUPPORT_FIREWALL, keywords::flow::flow_setup),
            entry(Flowbits, "flowbits", 0, keywords::flowbits::flowbits_setup),
            entry(
                AppLayerProtocol,
                "app-layer-protocol",
                SIGMATCH_HANDLE_NEGATION,
                keywords::applayer_kw::protocol_setup,
            ),
            entry(AppLayerEvent, "app-layer-event", 0, keywords::applayer_kw::event_setup),
            entry(PktData, "pkt_data", SIGMATCH_NOOPT | SIGMATCH_SUPPORT_FIREWALL, keywords::sticky::pkt_data_setup),
            entry(FileData, "file_data", SIGMATCH_NOOPT, keywords::sticky::file_data_setup),
            entry(FileName, "file.name", SIGMATCH_NOOPT, keywords::sticky::file_name_setup),
            entry(Filestore, "filestore", SIGMATCH_NOOPT, keywords::sticky::filestore_setup),
            entry(Frame, "frame", SIGMATCH_SUPPORT_DIR, keywords::sticky::frame_setup),
            entry(
                HttpUri,
                "http.uri",
                SIGMATCH_NOOPT | SIGMATCH_SUPPORT_FIREWALL,
                keywords::sticky::http_uri_setup,
            ),
            entry(
                HttpUriRaw,
                "http.uri.raw",
                SIGMATCH_NOOPT,
                keywords::sticky::http_uri_raw_setup,
            ),
            entry(HttpMethod, "http.method", SIGMATCH_NOOPT, keywords::sticky::http_method_setup),
            entry(HttpHost, "http.host", SIGMATCH_NOOPT, keywords::sticky::http_host_setup),
            entry(
                HttpUserAgent,
                "http.user_agent",
                SIGMATCH_NOOPT,
                keywords::sticky::http_user_agent_setup,
            ),
            entry(HttpHeader, "http.header", SIGMATCH_NOOPT, keywords::sticky::http_header_setup),
            entry(
                HttpRequestLine,
                "http.request_line",
                SIGMATCH_NOOPT,
                keywords::sticky::http_request_line_setup,
            ),
            entry(
                HttpResponseLine,
                "http.response_line",
                SIGMATCH_NOOPT,
                keywords::sticky::http_response_line_setup,
            ),
            entry(
                HttpStatCode,
                "http.stat_code",
                SIGMATCH_NOOPT,
                keywords::sticky::http_stat_code_setup,
            ),
            entry(
                HttpRequestBody,
                "http.request_body",
                SIGMATCH_NOOPT,
                keywords::sticky::http_request_body_setup,
            ),
            entry(
                HttpResponseBody,
                "http.response_body",
                SIGMATCH_NOOPT,
                keywords::sticky::http_response_body_setup,
            ),
            entry(DnsQuery, "dns.query", SIGMATCH_NOOPT, keywords::sticky::dns_query_setup),
            entry(TlsSni, "tls.sni", SIGMATCH_NOOPT, keywords::sticky::tls_sni_setup),
            entry(HttpUriCm, "http_uri", SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED, keywords::modifiers::http_uri_cm_setup),
            entry(
                HttpRawUriCm,
                "http_raw_uri",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_raw_uri_cm_setup,
            ),
            entry(
                HttpMethodCm,
                "http_method",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_method_cm_setup,
            ),
            entry(
                HttpHeaderCm,
                "http_header",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_header_cm_setup,
            ),
            entry(
                HttpCookieCm,
                "http_cookie",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_cookie_cm_setup,
            ),
            entry(
                HttpClientBodyCm,
                "http_client_body",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_client_body_cm_setup,
            ),
            entry(
                HttpServerBodyCm,
                "http_server_body",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_server_body_cm_setup,
            ),
            entry(
                HttpUserAgentCm,
                "http_user_agent",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_user_agent_cm_setup,
            ),
            entry(
                HttpHostCm,
                "http_host",
                SIGMATCH_NOOPT | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::http_host_cm_setup,
            ),
            entry(
                UriContent,
                "uricontent",
                SIGMATCH_QUOTES_MANDATORY | SIGMATCH_HANDLE_NEGATION | SIGMATCH_INFO_DEPRECATED,
                keywords::modifiers::uricontent_setup,
            ),
        ];

        // Entries that deviate from the defaults.
        t[Content.index()].prefilter = true;
        t[Dsize.index()].prefilter = true;
        t[Flow.index()].tables = FLOW_TABLES;
        t[FileData.index()].alias = Some("file.data");
        t[FileName.index()].alias = Some("filename");
        t[DnsQuery.index()].alias = Some("dns_query");
        t[HttpUriCm.index()].alternative = Some(HttpUri);
        t[HttpRawUriCm.index()].alternative = Some(HttpUriRaw);
        t[HttpMethodCm.index()].alternative = Some(HttpMethod);
        t[HttpHeaderCm.index()].alternative = Some(HttpHeader);
        t[HttpClientBodyCm.index()].alternative = Some(HttpRequestBody);
        t[HttpServerBodyCm.index()].alternative = Some(HttpResponseBody);
        t[HttpUserAgentCm.index()].alternative = Some(HttpUserAgent);
        t[HttpHostCm.index()].alternative = Some(HttpHost);
        t[UriContent.index()].alternative = Some(HttpUri);

        debug_assert_eq!(t.len(), KeywordId::COUNT);
        for (i, e) in t.iter().enumerate() {
            debug_assert_eq!(e.id.index(), i);
        }
        t
    };
}

/// The full keyword table.
pub fn table() -> &'static [Keyword] {
    &SIGMATCH_TABLE
}

/// Get a keyword table entry by id.
pub fn get(id: KeywordId) -> &'static Keyword {
    &SIGMATCH_TABLE[id.index()]
}

/// The canonical name of a keyword.
pub fn name_of(id: KeywordId) -> &'static str {
    get(id).name
}

/// Look up a keyword by name, falling back to its alias. Case
/// insensitive.
pub fn lookup(name: &str) -> Option<&'static Keyword> {
    SIGMATCH_TABLE.iter().find(|e| {
        e.name.eq_ignore_ascii_case(name)
            || e.alias.map(|a| a.eq_ignore_ascii_case(name)).unwrap_or(false)
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_table_order() {
        assert_eq!(table().len(), KeywordId::COUNT);
        for (i, e) in table().iter().enumerate() {
            assert_eq!(e.id.index(), i);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("msg").unwrap().id, KeywordId::Msg);
        assert_eq!(lookup("MSG").unwrap().id, KeywordId::Msg);
        assert_eq!(lookup("dns_query").unwrap().id, KeywordId::DnsQuery);
        assert_eq!(lookup("file.data").unwrap().id, KeywordId::FileData);
        assert!(lookup("no_such_keyword").is_none());
    }

    #[test]
    fn test_deprecated_alternatives() {
        let kw = lookup("http_uri").unwrap();
        assert!(kw.flags & SIGMATCH_INFO_DEPRECATED != 0);
        assert_eq!(kw.alternative, Some(KeywordId::HttpUri));

        let kw = lookup("http_raw_uri").unwrap();
        assert_eq!(kw.alternative, Some(KeywordId::HttpUriRaw));

        let kw = lookup("http_client_body").unwrap();
        assert_eq!(kw.alternative, Some(KeywordId::HttpRequestBody));

        let kw = lookup("http_server_body").unwrap();
        assert_eq!(kw.alternative, Some(KeywordId::HttpResponseBody));

        // http_cookie has no sticky replacement registered.
        let kw = lookup("http_cookie").unwrap();
        assert!(kw.flags & SIGMATCH_INFO_DEPRECATED != 0);
        assert_eq!(kw.alternative, None);

        assert_eq!(lookup("http.uri.raw").unwrap().id, KeywordId::HttpUriRaw);
    }
}
