// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Application layer protocol identifiers and their progress tables.
//!
//! The progress tables are the parser state machine milestones a rule hook
//! can attach to. `request_started`, `request_complete`, `response_started`
//! and `response_complete` are built in for every protocol; the named
//! states in between are protocol specific.

use serde::{Deserialize, Serialize};

/// Maximum number of app-layer protocol candidates a single signature can
/// carry before it is narrowed down to one.
pub const SIG_ALPROTO_MAX: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlProto {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "http1")]
    Http1,
    #[serde(rename = "http2")]
    Http2,
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "tls")]
    Tls,
    #[serde(rename = "smb")]
    Smb,
    #[serde(rename = "ftp")]
    Ftp,
    #[serde(rename = "smtp")]
    Smtp,
    #[serde(rename = "ssh")]
    Ssh,
    #[serde(rename = "quic")]
    Quic,
    #[serde(rename = "failed")]
    Failed,
}

/// All concrete protocols, used when registering per protocol state such
/// as the hook generic lists. The `http` umbrella is not included.
pub const ALL_ALPROTOS: &[AlProto] = &[
    AlProto::Http1,
    AlProto::Http2,
    AlProto::Dns,
    AlProto::Tls,
    AlProto::Smb,
    AlProto::Ftp,
    AlProto::Smtp,
    AlProto::Ssh,
    AlProto::Quic,
];

/// Inspection direction, to server or to client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dir {
    #[serde(rename = "toserver")]
    ToServer,
    #[serde(rename = "toclient")]
    ToClient,
}

impl AlProto {
    pub fn by_name(name: &str) -> Option<Self> {
        let proto = match name.to_lowercase().as_str() {
            "http" => Self::Http,
            "http1" => Self::Http1,
            "http2" => Self::Http2,
            "dns" => Self::Dns,
            "tls" => Self::Tls,
            "smb" => Self::Smb,
            "ftp" => Self::Ftp,
            "smtp" => Self::Smtp,
            "ssh" => Self::Ssh,
            "quic" => Self::Quic,
            _ => return None,
        };
        Some(proto)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Http => "http",
            Self::Http1 => "http1",
            Self::Http2 => "http2",
            Self::Dns => "dns",
            Self::Tls => "tls",
            Self::Smb => "smb",
            Self::Ftp => "ftp",
            Self::Smtp => "smtp",
            Self::Ssh => "ssh",
            Self::Quic => "quic",
            Self::Failed => "failed",
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Failed)
    }

    /// True when `self` covers `other`, accounting for the `http`
    /// umbrella covering both HTTP/1 and HTTP/2.
    pub fn equals(&self, other: AlProto) -> bool {
        if *self == other {
            return true;
        }
        matches!(
            (*self, other),
            (AlProto::Http, AlProto::Http1)
                | (AlProto::Http, AlProto::Http2)
                | (AlProto::Http1, AlProto::Http)
                | (AlProto::Http2, AlProto::Http)
        )
    }

    /// The common protocol of two related protocols, `Failed` when they
    /// are unrelated. `http1` and `http` resolve to the `http` family.
    pub fn common(&self, other: AlProto) -> AlProto {
        if *self == other {
            return *self;
        }
        if self.equals(other) || other.equals(*self) {
            return AlProto::Http;
        }
        AlProto::Failed
    }

    /// Protocols that support file extraction and inspection.
    pub fn supports_files(&self) -> bool {
        matches!(
            self,
            Self::Http | Self::Http1 | Self::Http2 | Self::Smtp | Self::Smb | Self::Ftp
        )
    }
}

/// Protocol specific progress state names, between `*_started` and
/// `*_complete`. The progress value of the state at index `i` is `i + 1`;
/// value 0 is the started hook.
fn named_states(alproto: AlProto, dir: Dir) -> &'static [&'static str] {
    match (alproto, dir) {
        (AlProto::Http | AlProto::Http1, Dir::ToServer) => {
            &["request_line", "request_headers", "request_body"]
        }
        (AlProto::Http | AlProto::Http1, Dir::ToClient) => {
            &["response_line", "response_headers", "response_body"]
        }
        (AlProto::Tls, Dir::ToServer) => &["client_hello_done"],
        (AlProto::Tls, Dir::ToClient) => &["server_hello_done", "cert_done", "handshake_done"],
        (AlProto::Ssh, Dir::ToServer) => &["banner_done"],
        (AlProto::Ssh, Dir::ToClient) => &["banner_done"],
        _ => &[],
    }
}

/// Iterate the named progress states of a protocol direction.
pub fn state_names(alproto: AlProto, dir: Dir) -> &'static [&'static str] {
    named_states(alproto, dir)
}

/// Resolve a protocol defined progress state by name.
pub fn state_id_by_name(alproto: AlProto, name: &str, dir: Dir) -> Option<u8> {
    named_states(alproto, dir)
        .iter()
        .position(|n| *n == name)
        .map(|i| (i + 1) as u8)
}

/// The progress value at which a direction's transaction is complete.
pub fn progress_completion(alproto: AlProto, dir: Dir) -> u8 {
    (named_states(alproto, dir).len() + 1) as u8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(AlProto::by_name("http"), Some(AlProto::Http));
        assert_eq!(AlProto::by_name("HTTP1"), Some(AlProto::Http1));
        assert_eq!(AlProto::by_name("nntp"), None);
    }

    #[test]
    fn test_equals_umbrella() {
        assert!(AlProto::Http.equals(AlProto::Http1));
        assert!(AlProto::Http1.equals(AlProto::Http));
        assert!(!AlProto::Http1.equals(AlProto::Http2));
        assert!(AlProto::Dns.equals(AlProto::Dns));
    }

    #[test]
    fn test_common() {
        assert_eq!(AlProto::Http.common(AlProto::Http1), AlProto::Http);
        assert_eq!(AlProto::Http1.common(AlProto::Http1), AlProto::Http1);
        assert_eq!(AlProto::Dns.common(AlProto::Tls), AlProto::Failed);
    }

    #[test]
    fn test_progress() {
        assert_eq!(
            state_id_by_name(AlProto::Http1, "request_line", Dir::ToServer),
            Some(1)
        );
        assert_eq!(
            state_id_by_name(AlProto::Http1, "request_line", Dir::ToClient),
            None
        );
        assert_eq!(progress_completion(AlProto::Http1, Dir::ToServer), 4);
        assert_eq!(progress_completion(AlProto::Dns, Dir::ToServer), 1);
    }
}
