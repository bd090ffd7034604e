// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The detection engine context: the rule list being built, the
//! duplicate (gid, sid) index, registries, and per-engine keyword state.

use crate::buffer::{self, AppInspectEngine, BufferTypeRegistry};
use crate::keyword::{self, KeywordId, SIGMATCH_STRICT_PARSING};
use crate::keywords::requires::EngineVersion;
use crate::parse;
use crate::signature::{Signature, SIG_FLAG_INIT_BIDIREC};
use crate::SigError;
use std::collections::{HashMap, HashSet};
use tracing::{error, warn};

pub struct DetectEngineCtx {
    /// The engine's rule list, in load order. A bidirectional rule and
    /// its clone occupy two adjacent slots.
    pub sig_list: Vec<Signature>,
    /// (gid, sid) to position of the rule's head signature.
    dup_index: HashMap<(u32, u32), usize>,
    pub buffer_types: BufferTypeRegistry,
    pub inspect_engines: Vec<AppInspectEngine>,
    /// Per keyword: a silent setup error has been reported once already.
    pub silent_errors: Vec<bool>,
    strict_overrides: Vec<bool>,
    /// Raw socket support is available for reject actions.
    pub reject_supported: bool,
    pub version: EngineVersion,
    pub features: HashSet<String>,
    pub sigerror_silent: bool,
    pub sigerror_ok: bool,
    pub sigerror_requires: bool,
    pub(crate) signum: u32,
}

impl Default for DetectEngineCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectEngineCtx {
    pub fn new() -> Self {
        let mut buffer_types = BufferTypeRegistry::new();
        let mut inspect_engines = vec![];
        buffer::register_defaults(&mut buffer_types, &mut inspect_engines);
        buffer::register_hook_lists(&mut buffer_types, &mut inspect_engines);
        DetectEngineCtx {
            sig_list: vec![],
            dup_index: HashMap::new(),
            buffer_types,
            inspect_engines,
            silent_errors: vec![false; KeywordId::COUNT],
            strict_overrides: vec![false; KeywordId::COUNT],
            reject_supported: true,
            version: EngineVersion::new(8, 0, 0),
            features: HashSet::new(),
            sigerror_silent: false,
            sigerror_ok: false,
            sigerror_requires: false,
            signum: 0,
        }
    }

    /// Whether warnings are elevated to errors for this keyword.
    pub fn is_strict(&self, id: KeywordId) -> bool {
        self.strict_overrides[id.index()]
            || keyword::get(id).flags & SIGMATCH_STRICT_PARSING != 0
    }

    /// Apply a strict-mode command line spec: "all" or a comma separated
    /// list of keyword names.
    pub fn apply_strict(&mut self, spec: &str) {
        if spec == "all" {
            for flag in self.strict_overrides.iter_mut() {
                *flag = true;
            }
            return;
        }
        for name in spec.split(',') {
            match keyword::lookup(name.trim()) {
                Some(kw) => self.strict_overrides[kw.id.index()] = true,
                None => warn!("'strict' command line argument '{}' not found", name.trim()),
            }
        }
    }

    /// Number of signatures in the engine, clones included.
    pub fn num_sigs(&self) -> usize {
        self.sig_list.len()
    }

    pub fn sig_by_gid_sid(&self, gid: u32, sid: u32) -> Option<&Signature> {
        self.dup_index
            .get(&(gid, sid))
            .map(|idx| &self.sig_list[*idx])
    }

    /// Insert a parsed signature (and its bidirectional clone) into the
    /// rule list, resolving duplicates by revision.
    fn insert_sig(
        &mut self,
        sig: Signature,
        clone: Option<Signature>,
        sigstr: &str,
    ) -> Result<usize, SigError> {
        let key = (sig.gid, sig.sid);

        if let Some(old_idx) = self.dup_index.get(&key).copied() {
            let old = &self.sig_list[old_idx];
            if sig.rev <= old.rev {
                // The new signature (and any clone) is dropped; its
                // match contexts are released on drop.
                error!("Duplicate signature \"{}\"", sigstr);
                return Err(SigError::Duplicate {
                    gid: key.0,
                    sid: key.1,
                });
            }
            warn!(
                "Signature with newer revision, so the older sig replaced by this new signature \"{}\"",
                sigstr
            );
            // A bidirectional pair occupies two adjacent slots and is
            // removed as a unit.
            let old_span = if old.init.init_flags & SIG_FLAG_INIT_BIDIREC != 0 {
                2
            } else {
                1
            };
            self.sig_list.drain(old_idx..old_idx + old_span);
            self.dup_index.remove(&key);
            for pos in self.dup_index.values_mut() {
                if *pos > old_idx {
                    *pos -= old_span;
                }
            }
        }

        let head_idx = self.sig_list.len();
        self.sig_list.push(sig);
        if let Some(clone) = clone {
            self.sig_list.push(clone);
        }
        self.dup_index.insert(key, head_idx);
        Ok(head_idx)
    }

    fn append_inner(&mut self, sigstr: &str, firewall: bool) -> Result<usize, SigError> {
        self.sigerror_ok = false;
        self.sigerror_silent = false;
        self.sigerror_requires = false;
        let oldsignum = self.signum;

        match parse::sig_init(self, sigstr, firewall) {
            Ok((sig, clone)) => self.insert_sig(sig, clone, sigstr),
            Err(err) => {
                // Nothing was installed, restore the instance counter.
                self.signum = oldsignum;
                match &err {
                    SigError::RequiresNotMet => {
                        self.sigerror_silent = true;
                        self.sigerror_ok = true;
                        self.sigerror_requires = true;
                    }
                    SigError::SilentOk => {
                        self.sigerror_silent = true;
                        self.sigerror_ok = true;
                    }
                    SigError::Silent => {
                        self.sigerror_silent = true;
                    }
                    SigError::Parse(msg) => {
                        error!("{}", msg);
                    }
                    SigError::Duplicate { .. } => {}
                }
                Err(err)
            }
        }
    }

    /// Parse a rule and append it to the engine's rule list.
    ///
    /// Returns the index of the new head signature. A bidirectional rule
    /// installs its clone in the following slot.
    pub fn append_sig(&mut self, sigstr: &str) -> Result<usize, SigError> {
        self.append_inner(sigstr, false)
    }

    /// Parse a firewall rule and append it to the engine's rule list.
    pub fn append_firewall_rule(&mut self, sigstr: &str) -> Result<usize, SigError> {
        self.append_inner(sigstr, true)
    }

    /// Freeze all signatures: convert match lists into contiguous arrays
    /// for the matcher compile stage.
    pub fn freeze_sigs(&mut self) {
        for sig in self.sig_list.iter_mut() {
            sig.freeze();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_append_simple() {
        let mut ctx = DetectEngineCtx::new();
        let idx = ctx
            .append_sig("alert tcp 1.2.3.4 any -> !1.2.3.4 any (msg:\"t\"; sid:1;)")
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(ctx.num_sigs(), 1);
        let sig = &ctx.sig_list[0];
        assert_eq!(sig.sid, 1);
        assert_eq!(sig.gid, 1);
        assert_eq!(sig.msg.as_deref(), Some("t"));
    }

    #[test]
    fn test_duplicate_revision_handling() {
        let mut ctx = DetectEngineCtx::new();
        ctx.append_sig("alert tcp any any -> any any (msg:\"boo\"; sid:1; rev:1;)")
            .unwrap();
        // Same rev: dropped.
        assert_eq!(
            ctx.append_sig("alert tcp any any -> any any (msg:\"boo\"; sid:1; rev:1;)"),
            Err(SigError::Duplicate { gid: 1, sid: 1 })
        );
        assert_eq!(ctx.num_sigs(), 1);

        // Higher rev: replaces.
        ctx.append_sig("alert tcp any any -> any any (msg:\"boo\"; sid:1; rev:2;)")
            .unwrap();
        assert_eq!(ctx.num_sigs(), 1);
        assert_eq!(ctx.sig_list[0].rev, 2);

        // Lower rev: dropped again.
        assert!(ctx
            .append_sig("alert tcp any any -> any any (msg:\"boo\"; sid:1; rev:1;)")
            .is_err());
        assert_eq!(ctx.num_sigs(), 1);
        assert_eq!(ctx.sig_list[0].rev, 2);
    }

    #[test]
    fn test_duplicate_same_sid_different_gid() {
        let mut ctx = DetectEngineCtx::new();
        ctx.append_sig("alert tcp any any -> any any (sid:1; gid:1;)")
            .unwrap();
        ctx.append_sig("alert tcp any any -> any any (sid:1; gid:2;)")
            .unwrap();
        assert_eq!(ctx.num_sigs(), 2);
    }

    #[test]
    fn test_replace_bidirectional_pair() {
        let mut ctx = DetectEngineCtx::new();
        ctx.append_sig("alert tcp 1.2.3.4 1024:65535 <> !1.2.3.4 any (msg:\"t\"; sid:9; rev:1;)")
            .unwrap();
        ctx.append_sig("alert tcp any any -> any any (sid:10; rev:1;)")
            .unwrap();
        assert_eq!(ctx.num_sigs(), 3);

        // Replacing the bidirectional rule removes both cells and keeps
        // the other rule reachable through the index.
        ctx.append_sig("alert tcp 1.2.3.4 1024:65535 <> !1.2.3.4 any (msg:\"t\"; sid:9; rev:2;)")
            .unwrap();
        assert_eq!(ctx.num_sigs(), 3);
        assert_eq!(ctx.sig_by_gid_sid(1, 9).unwrap().rev, 2);
        assert_eq!(ctx.sig_by_gid_sid(1, 10).unwrap().sid, 10);
    }

    #[test]
    fn test_silent_error_reported_once() {
        let mut ctx = DetectEngineCtx::new();
        // First occurrence of the unknown protocol is a real error.
        let err = ctx
            .append_sig("alert tcp any any -> any any (app-layer-protocol:nntp; sid:1;)")
            .unwrap_err();
        assert!(matches!(err, SigError::Parse(_)));
        assert!(!ctx.sigerror_silent);

        // Later occurrences are swallowed.
        let err = ctx
            .append_sig("alert tcp any any -> any any (app-layer-protocol:nntp; sid:2;)")
            .unwrap_err();
        assert_eq!(err, SigError::Silent);
        assert!(ctx.sigerror_silent);
    }

    #[test]
    fn test_requires_skip_is_silent() {
        let mut ctx = DetectEngineCtx::new();
        let err = ctx
            .append_sig("alert tcp any any -> any any (requires:version >= 99; sid:1;)")
            .unwrap_err();
        assert_eq!(err, SigError::RequiresNotMet);
        assert!(ctx.sigerror_silent);
        assert!(ctx.sigerror_ok);
        assert!(ctx.sigerror_requires);
        assert_eq!(ctx.num_sigs(), 0);

        // A satisfied requires loads normally.
        ctx.append_sig("alert tcp any any -> any any (requires:version >= 7; sid:2;)")
            .unwrap();
        assert_eq!(ctx.num_sigs(), 1);
    }

    #[test]
    fn test_round_trip_equivalence() {
        let rule = "alert http any any -> any any (msg:\"t\"; flow:to_server,established; \
                    http.uri; content:\"/admin\"; content:\"login\"; distance:1; sid:1; rev:3;)";
        let mut a = DetectEngineCtx::new();
        let mut b = DetectEngineCtx::new();
        let ia = a.append_sig(rule).unwrap();
        let ib = b.append_sig(rule).unwrap();
        let (sa, sb) = (&a.sig_list[ia], &b.sig_list[ib]);

        assert_eq!(sa.flags, sb.flags);
        assert_eq!(sa.action, sb.action);
        assert_eq!(sa.alproto, sb.alproto);
        assert_eq!(sa.sig_type, sb.sig_type);
        assert_eq!(sa.init.buffers.len(), sb.init.buffers.len());
        for (ba, bb) in sa.init.buffers.iter().zip(sb.init.buffers.iter()) {
            assert_eq!(ba.id, bb.id);
            let mut ca = ba.head;
            let mut cb = bb.head;
            while let (Some(x), Some(y)) = (ca, cb) {
                assert_eq!(sa.sm(x).keyword, sb.sm(y).keyword);
                assert_eq!(sa.sm(x).ctx, sb.sm(y).ctx);
                ca = sa.sm(x).next;
                cb = sb.sm(y).next;
            }
            assert_eq!(ca, None);
            assert_eq!(cb, None);
        }
    }

    #[test]
    fn test_freeze_builds_arrays() {
        let mut ctx = DetectEngineCtx::new();
        ctx.append_sig("alert tcp any any -> any any (content:\"abc\"; sid:1;)")
            .unwrap();
        ctx.freeze_sigs();
        let sig = &ctx.sig_list[0];
        assert_eq!(sig.sm_arrays.len(), 1);
        assert_eq!(sig.sm_arrays[0].0, crate::signature::LIST_PMATCH);
        assert_eq!(sig.sm_arrays[0].1.len(), 1);
    }

    #[test]
    fn test_strict_spec() {
        let mut ctx = DetectEngineCtx::new();
        assert!(!ctx.is_strict(KeywordId::Metadata));
        ctx.apply_strict("metadata");
        assert!(ctx.is_strict(KeywordId::Metadata));
        assert!(!ctx.is_strict(KeywordId::Msg));

        let mut ctx = DetectEngineCtx::new();
        ctx.apply_strict("all");
        assert!(ctx.is_strict(KeywordId::Msg));
    }
}
