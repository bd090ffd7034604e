// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Buffer type registry and app-layer inspect engines.
//!
//! Every sticky buffer and generic hook list is a registered buffer type
//! with an id above the built-in list range. App-layer inspect engines tie
//! a buffer id to a protocol, direction and parser progress value; the
//! validator uses them to derive rule direction and to check hook
//! compatibility.

use crate::applayer::{
    self, AlProto, Dir, ALL_ALPROTOS,
};
use crate::signature::LIST_MAX;
use std::collections::HashMap;

/// Metadata for a registered buffer type.
#[derive(Debug, Clone)]
pub struct BufferType {
    pub id: u16,
    pub name: String,
    /// Inspects packet data rather than app-layer state.
    pub packet: bool,
    /// Inspects a stream frame.
    pub frame: bool,
    /// Multiple instances may exist in one rule (e.g. dns.query).
    pub multi_capable: bool,
    /// Content in this buffer can feed the multi-pattern matcher.
    pub supports_mpm: bool,
}

/// Registry of buffer types, indexed by id. Ids below [`LIST_MAX`] are the
/// built-in lists; everything else is registered by name.
#[derive(Debug, Default)]
pub struct BufferTypeRegistry {
    types: Vec<BufferType>,
    by_name: HashMap<String, u16>,
}

/// Built-in list names, in list id order.
static BUILTIN_LIST_NAMES: &[&str] = &[
    "packet",
    "payload",
    "base64_data",
    "tag",
    "postmatch",
    "suppress",
    "threshold",
];

impl BufferTypeRegistry {
    pub fn new() -> Self {
        let mut reg = Self::default();
        for name in BUILTIN_LIST_NAMES {
            let id = reg.types.len() as u16;
            reg.types.push(BufferType {
                id,
                name: name.to_string(),
                packet: true,
                frame: false,
                multi_capable: false,
                supports_mpm: *name == "payload",
            });
            reg.by_name.insert(name.to_string(), id);
        }
        debug_assert_eq!(reg.types.len(), LIST_MAX as usize);
        reg
    }

    /// Register a buffer type, returning its id. Registering an existing
    /// name returns the existing id.
    pub fn register(
        &mut self,
        name: &str,
        packet: bool,
        frame: bool,
        multi_capable: bool,
        supports_mpm: bool,
    ) -> u16 {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.types.len() as u16;
        self.types.push(BufferType {
            id,
            name: name.to_string(),
            packet,
            frame,
            multi_capable,
            supports_mpm,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn id_by_name(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: u16) -> Option<&BufferType> {
        self.types.get(id as usize)
    }

    pub fn name_of(&self, id: u16) -> &str {
        self.get(id).map(|t| t.name.as_str()).unwrap_or("unknown")
    }
}

/// An app-layer inspect engine registration.
#[derive(Debug, Clone)]
pub struct AppInspectEngine {
    pub sm_list: u16,
    pub alproto: AlProto,
    pub dir: Dir,
    pub progress: u8,
}

/// Register an inspect engine for a named buffer, creating the buffer
/// type if needed.
pub fn register_inspect_engine(
    registry: &mut BufferTypeRegistry,
    engines: &mut Vec<AppInspectEngine>,
    name: &str,
    alproto: AlProto,
    dir: Dir,
    progress: u8,
    multi_capable: bool,
    supports_mpm: bool,
) -> u16 {
    let id = registry.register(name, false, false, multi_capable, supports_mpm);
    engines.push(AppInspectEngine {
        sm_list: id,
        alproto,
        dir,
        progress,
    });
    id
}

/// Register the built-in sticky buffers and their inspect engines.
pub fn register_defaults(registry: &mut BufferTypeRegistry, engines: &mut Vec<AppInspectEngine>) {
    use AlProto::*;
    use Dir::*;

    let app = |registry: &mut BufferTypeRegistry,
               engines: &mut Vec<AppInspectEngine>,
               name: &str,
               regs: &[(AlProto, Dir, u8)],
               multi: bool| {
        for (alproto, dir, progress) in regs {
            register_inspect_engine(
                registry, engines, name, *alproto, *dir, *progress, multi, true,
            );
        }
    };

    app(registry, engines, "http.uri", &[(Http1, ToServer, 1)], false);
    app(
        registry,
        engines,
        "http.uri.raw",
        &[(Http1, ToServer, 1)],
        false,
    );
    app(registry, engines, "http.method", &[(Http1, ToServer, 1)], false);
    app(registry, engines, "http.host", &[(Http1, ToServer, 2)], false);
    app(
        registry,
        engines,
        "http.user_agent",
        &[(Http1, ToServer, 2)],
        false,
    );
    app(
        registry,
        engines,
        "http.header",
        &[(Http1, ToServer, 2), (Http1, ToClient, 2)],
        false,
    );
    app(
        registry,
        engines,
        "http.cookie",
        &[(Http1, ToServer, 2), (Http1, ToClient, 2)],
        false,
    );
    app(
        registry,
        engines,
        "http.request_line",
        &[(Http1, ToServer, 1)],
        false,
    );
    app(
        registry,
        engines,
        "http.response_line",
        &[(Http1, ToClient, 1)],
        false,
    );
    app(
        registry,
        engines,
        "http.stat_code",
        &[(Http1, ToClient, 1)],
        false,
    );
    app(
        registry,
        engines,
        "http.request_body",
        &[(Http1, ToServer, 3)],
        false,
    );
    app(
        registry,
        engines,
        "http.response_body",
        &[(Http1, ToClient, 3)],
        false,
    );
    app(
        registry,
        engines,
        "file.data",
        &[
            (Http1, ToServer, 3),
            (Http1, ToClient, 3),
            (Http2, ToServer, 1),
            (Http2, ToClient, 1),
            (Smtp, ToServer, 1),
            (Smb, ToServer, 1),
            (Smb, ToClient, 1),
        ],
        false,
    );
    app(
        registry,
        engines,
        "file.name",
        &[
            (Http1, ToServer, 2),
            (Http1, ToClient, 3),
            (Http2, ToServer, 1),
            (Smtp, ToServer, 1),
            (Smb, ToServer, 1),
            (Smb, ToClient, 1),
            (Ftp, ToServer, 1),
        ],
        false,
    );
    app(registry, engines, "dns.query", &[(Dns, ToServer, 1)], true);
    app(registry, engines, "tls.sni", &[(Tls, ToServer, 1)], false);

    // Packet header buffers: no app engines.
    registry.register("tcp.hdr", true, false, false, true);
    registry.register("ipv4.hdr", true, false, false, true);

    // Frame buffers.
    registry.register("http1.request", false, true, false, true);
    registry.register("http1.response", false, true, false, true);
    registry.register("tls.pdu", false, true, false, true);
    registry.register("tcp.stream", false, true, false, true);
}

/// Register each app-layer hook of each protocol as a generic list named
/// `<proto>:<hook>:generic`, so rules can attach to parser progress
/// without a dedicated buffer keyword.
pub fn register_hook_lists(registry: &mut BufferTypeRegistry, engines: &mut Vec<AppInspectEngine>) {
    let mut protos: Vec<AlProto> = vec![AlProto::Http];
    protos.extend_from_slice(ALL_ALPROTOS);
    for alproto in protos {
        let prefix = alproto.name();
        for (dir, started, complete) in [
            (Dir::ToServer, "request_started", "request_complete"),
            (Dir::ToClient, "response_started", "response_complete"),
        ] {
            let name = format!("{}:{}:generic", prefix, started);
            register_inspect_engine(registry, engines, &name, alproto, dir, 0, false, false);

            let name = format!("{}:{}:generic", prefix, complete);
            let progress = applayer::progress_completion(alproto, dir);
            register_inspect_engine(registry, engines, &name, alproto, dir, progress, false, false);

            for (i, state) in applayer::state_names(alproto, dir).iter().enumerate() {
                let name = format!("{}:{}:generic", prefix, state);
                register_inspect_engine(
                    registry,
                    engines,
                    &name,
                    alproto,
                    dir,
                    (i + 1) as u8,
                    false,
                    false,
                );
            }
        }
    }
}
