// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! The in-progress signature and its builder interface.
//!
//! Matches live in an arena owned by the signature's init data; the
//! built-in lists and the dynamic buffers are head/tail index pairs into
//! that arena. Keyword setup routines append matches through
//! [`Signature::append_sm`], select sticky buffers through
//! [`Signature::set_active_list`], and relocate legacy content-modifier
//! matches through [`Signature::content_modifier_transfer`].

use crate::addr::{AddressKind, AddressList, IpOnlyCidr};
use crate::applayer::{AlProto, SIG_ALPROTO_MAX};
use crate::buffer::BufferTypeRegistry;
use crate::keyword::KeywordId;
use crate::keywords::applayer_kw::AppLayerProtocolData;
use crate::keywords::byte_jump::ByteJumpData;
use crate::keywords::byte_test::ByteTestData;
use crate::keywords::content::{ContentData, CONTENT_RELATIVE_NEXT};
use crate::keywords::flow::FlowData;
use crate::keywords::flowbits::FlowbitsData;
use crate::keywords::isdataat::IsDataAtData;
use crate::keywords::pcre::{PcreData, PCRE_RELATIVE_NEXT};
use crate::keywords::uint::{StreamSizeData, UintData};
use crate::port::PortList;
use tracing::debug;

/// Built-in list ids.
pub const LIST_MATCH: u16 = 0;
pub const LIST_PMATCH: u16 = 1;
pub const LIST_BASE64_DATA: u16 = 2;
pub const LIST_TMATCH: u16 = 3;
pub const LIST_POSTMATCH: u16 = 4;
pub const LIST_SUPPRESS: u16 = 5;
pub const LIST_THRESHOLD: u16 = 6;
pub const LIST_MAX: u16 = 7;

/// Hard cap on the number of buffers one signature can reference.
pub const SIG_BUFFERS_MAX: usize = 64;

// Signature flags.
pub const SIG_FLAG_SRC_ANY: u32 = 1 << 0;
pub const SIG_FLAG_DST_ANY: u32 = 1 << 1;
pub const SIG_FLAG_SP_ANY: u32 = 1 << 2;
pub const SIG_FLAG_DP_ANY: u32 = 1 << 3;
pub const SIG_FLAG_NOALERT: u32 = 1 << 4;
pub const SIG_FLAG_APPLAYER: u32 = 1 << 5;
pub const SIG_FLAG_TOSERVER: u32 = 1 << 6;
pub const SIG_FLAG_TOCLIENT: u32 = 1 << 7;
pub const SIG_FLAG_REQUIRE_PACKET: u32 = 1 << 8;
pub const SIG_FLAG_REQUIRE_STREAM: u32 = 1 << 9;
pub const SIG_FLAG_FILESTORE: u32 = 1 << 10;
pub const SIG_FLAG_PREFILTER: u32 = 1 << 11;
pub const SIG_FLAG_TXBOTHDIR: u32 = 1 << 12;
pub const SIG_FLAG_FIREWALL: u32 = 1 << 13;

// Init-time only flags.
pub const SIG_FLAG_INIT_BIDIREC: u32 = 1 << 0;
pub const SIG_FLAG_INIT_FORCE_TOSERVER: u32 = 1 << 1;
pub const SIG_FLAG_INIT_FORCE_TOCLIENT: u32 = 1 << 2;
pub const SIG_FLAG_INIT_PACKET: u32 = 1 << 3;
pub const SIG_FLAG_INIT_FLOW: u32 = 1 << 4;
pub const SIG_FLAG_INIT_FILEDATA: u32 = 1 << 5;

// Action flags.
pub const ACTION_ALERT: u8 = 0x01;
pub const ACTION_DROP: u8 = 0x02;
pub const ACTION_REJECT: u8 = 0x04;
pub const ACTION_REJECT_DST: u8 = 0x08;
pub const ACTION_REJECT_BOTH: u8 = 0x10;
pub const ACTION_PASS: u8 = 0x20;
pub const ACTION_CONFIG: u8 = 0x40;
pub const ACTION_ACCEPT: u8 = 0x80;

// File inspection requirements.
pub const FILE_SIG_NEED_FILE: u16 = 0x01;
pub const FILE_SIG_NEED_FILENAME: u16 = 0x02;

pub const DETECT_DEFAULT_PRIO: i32 = 3;

/// Scope of a rule action, given as `action:scope` in the rule header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionScope {
    #[default]
    NotSet,
    Packet,
    Flow,
    Tx,
    Hook,
}

/// Packet-path hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PktHook {
    FlowStart,
    PreFlow,
    PreStream,
    All,
}

impl PktHook {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flow_start" => Some(Self::FlowStart),
            "pre_flow" => Some(Self::PreFlow),
            "pre_stream" => Some(Self::PreStream),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// The attachment point at which a signature becomes eligible for
/// inspection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignatureHook {
    #[default]
    NotSet,
    Pkt(PktHook),
    App {
        alproto: AlProto,
        progress: u8,
        sm_list: u16,
    },
}

/// Final signature classification driving which engine inspects it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SigType {
    #[default]
    NotSet,
    IpOnly,
    LikeIpOnly,
    Pkt,
    PktStream,
    Stream,
    AppTx,
}

/// The detection table a rule runs in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectTable {
    #[default]
    NotSet,
    PacketPreFlow,
    PacketPreStream,
    PacketFilter,
    PacketTd,
    AppFilter,
    AppTd,
}

impl DetectTable {
    /// Bit for matching against a keyword's supported-tables mask.
    pub fn as_bit(&self) -> u8 {
        match self {
            Self::NotSet => 0,
            Self::PacketPreFlow => 1 << 0,
            Self::PacketPreStream => 1 << 1,
            Self::PacketFilter => 1 << 2,
            Self::PacketTd => 1 << 3,
            Self::AppFilter => 1 << 4,
            Self::AppTd => 1 << 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotSet => "not_set",
            Self::PacketPreFlow => "packet_pre_flow",
            Self::PacketPreStream => "packet_pre_stream",
            Self::PacketFilter => "packet_filter",
            Self::PacketTd => "packet_td",
            Self::AppFilter => "app_filter",
            Self::AppTd => "app_td",
        }
    }
}

/// Network protocol selector from the rule header: a 256 bit mask over IP
/// protocol numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectProto {
    pub proto: [u8; 32],
    pub any: bool,
    pub only_pkt: bool,
    pub only_stream: bool,
}

impl DetectProto {
    pub fn set(&mut self, proto: u8) {
        self.proto[(proto / 8) as usize] |= 1 << (proto % 8);
    }

    pub fn is_set(&self, proto: u8) -> bool {
        self.proto[(proto / 8) as usize] & (1 << (proto % 8)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.proto.iter().all(|b| *b == 0)
    }

    pub fn clear(&mut self) {
        self.proto = [0; 32];
        self.any = false;
    }
}

/// Per-keyword match context. The per-variant drop replaces the C side's
/// per-keyword `Free` callback; moving a variant out (see
/// [`MatchCtx::take`]) leaves `None` behind so the context cannot be
/// dropped twice.
#[derive(Debug, Default, PartialEq)]
pub enum MatchCtx {
    #[default]
    None,
    Content(Box<ContentData>),
    Pcre(Box<PcreData>),
    ByteTest(Box<ByteTestData>),
    ByteJump(Box<ByteJumpData>),
    IsDataAt(IsDataAtData),
    Dsize(UintData<u16>),
    StreamSize(Box<StreamSizeData>),
    Bsize(UintData<u64>),
    Flow(FlowData),
    Flowbits(FlowbitsData),
    AppLayerProtocol(AppLayerProtocolData),
    AppLayerEvent(String),
    Filestore,
}

impl MatchCtx {
    pub fn take(&mut self) -> MatchCtx {
        std::mem::take(self)
    }

    pub fn as_content(&self) -> Option<&ContentData> {
        match self {
            Self::Content(cd) => Some(cd),
            _ => None,
        }
    }

    pub fn as_content_mut(&mut self) -> Option<&mut ContentData> {
        match self {
            Self::Content(cd) => Some(cd),
            _ => None,
        }
    }
}

/// One option's node in a signature's match lists.
#[derive(Debug)]
pub struct SigMatch {
    pub keyword: KeywordId,
    pub ctx: MatchCtx,
    /// Creation order, unique within a signature.
    pub idx: u32,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Head/tail of a doubly linked match list within the arena.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmList {
    pub head: Option<usize>,
    pub tail: Option<usize>,
}

/// A dynamic buffer slot of a signature.
#[derive(Clone, Copy, Debug)]
pub struct SigBuffer {
    pub id: u16,
    pub head: Option<usize>,
    pub tail: Option<usize>,
    pub only_ts: bool,
    pub only_tc: bool,
    pub multi_capable: bool,
    /// Set when the buffer was created on behalf of a keyword setup
    /// rather than a sticky buffer keyword.
    pub sm_init: bool,
}

/// A compiled match list entry. Ownership of the context has been moved
/// out of the arena.
#[derive(Debug)]
pub struct SigMatchData {
    pub keyword: KeywordId,
    pub ctx: MatchCtx,
}

/// Init-time state of a signature, discarded once the engine compiles the
/// rule set.
#[derive(Debug, Default)]
pub struct SignatureInitData {
    pub negated: bool,
    pub firewall_rule: bool,
    pub init_flags: u32,
    pub hook: SignatureHook,
    /// Sticky list id, if a sticky buffer keyword is active.
    pub list: Option<u16>,
    pub curbuf: Option<usize>,
    pub buffers: Vec<SigBuffer>,
    pub smlists: [SmList; LIST_MAX as usize],
    pub matches: Vec<SigMatch>,
    pub sm_cnt: u32,
    pub max_content_list_id: u32,
    pub alprotos: [AlProto; SIG_ALPROTO_MAX],
    pub src: AddressList,
    pub dst: AddressList,
    pub cidr_src: Option<Vec<IpOnlyCidr>>,
    pub cidr_dst: Option<Vec<IpOnlyCidr>>,
    pub has_possible_prefilter: bool,
    pub prefilter_sm: Option<usize>,
    pub mpm_sm: Option<usize>,
}

/// A parsed detection rule.
#[derive(Debug, Default)]
pub struct Signature {
    pub gid: u32,
    pub sid: u32,
    pub rev: u32,
    pub prio: i32,
    pub iid: u32,
    pub action: u8,
    pub action_scope: ActionScope,
    pub proto: DetectProto,
    pub alproto: AlProto,
    pub flags: u32,
    pub file_flags: u16,
    pub app_progress_hook: u8,
    pub msg: Option<String>,
    pub classtype: Option<String>,
    pub references: Vec<crate::keywords::meta::Reference>,
    pub metadata: Vec<(String, String)>,
    pub sp: PortList,
    pub dp: PortList,
    pub sig_type: SigType,
    pub detect_table: DetectTable,
    pub sig_str: String,
    /// Compact source/destination range arrays for runtime matching.
    pub addr_src_match4: Vec<(u32, u32)>,
    pub addr_dst_match4: Vec<(u32, u32)>,
    pub addr_src_match6: Vec<(u128, u128)>,
    pub addr_dst_match6: Vec<(u128, u128)>,
    /// Per list id compiled match arrays, built at freeze time.
    pub sm_arrays: Vec<(u16, Vec<SigMatchData>)>,
    pub init: SignatureInitData,
}

impl Signature {
    pub fn new(sig_str: &str) -> Self {
        Signature {
            gid: 1,
            prio: -1,
            sig_str: sig_str.to_string(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn sm(&self, idx: usize) -> &SigMatch {
        &self.init.matches[idx]
    }

    #[inline]
    pub fn sm_mut(&mut self, idx: usize) -> &mut SigMatch {
        &mut self.init.matches[idx]
    }

    fn alloc_sm(&mut self, keyword: KeywordId, ctx: MatchCtx) -> usize {
        let idx = self.init.matches.len();
        let order = self.init.sm_cnt;
        self.init.sm_cnt += 1;
        self.init.matches.push(SigMatch {
            keyword,
            ctx,
            idx: order,
            prev: None,
            next: None,
        });
        idx
    }

    fn push_new_buffer(&mut self, registry: &BufferTypeRegistry, list: u16, sm_init: bool) -> Result<usize, String> {
        if self.init.buffers.len() >= SIG_BUFFERS_MAX {
            return Err("failed to expand rule buffer array".to_string());
        }
        let multi_capable = registry.get(list).map(|b| b.multi_capable).unwrap_or(false);
        let buf = SigBuffer {
            id: list,
            head: None,
            tail: None,
            only_ts: self.init.init_flags & SIG_FLAG_INIT_FORCE_TOSERVER != 0,
            only_tc: self.init.init_flags & SIG_FLAG_INIT_FORCE_TOCLIENT != 0,
            multi_capable,
            sm_init,
        };
        self.init.buffers.push(buf);
        Ok(self.init.buffers.len() - 1)
    }

    fn append_to_legacy(&mut self, node: usize, list: u16) {
        let l = &mut self.init.smlists[list as usize];
        match l.tail {
            None => {
                l.head = Some(node);
                l.tail = Some(node);
            }
            Some(tail) => {
                self.init.matches[tail].next = Some(node);
                self.init.matches[node].prev = Some(tail);
                l.tail = Some(node);
            }
        }
    }

    fn append_to_buffer(&mut self, node: usize, buf: usize) {
        let tail = self.init.buffers[buf].tail;
        match tail {
            None => {
                self.init.buffers[buf].head = Some(node);
                self.init.buffers[buf].tail = Some(node);
            }
            Some(tail) => {
                self.init.matches[tail].next = Some(node);
                self.init.matches[node].prev = Some(tail);
                self.init.buffers[buf].tail = Some(node);
            }
        }
    }

    /// Append a match to a list, legacy or buffer.
    ///
    /// For buffer lists the current buffer is reused when it carries the
    /// same id; otherwise an existing non-multi-capable buffer with the
    /// id is adopted, or a new buffer is created (marked `sm_init` since
    /// it was created on behalf of a keyword, not a sticky buffer).
    pub fn append_sm(
        &mut self,
        registry: &BufferTypeRegistry,
        keyword: KeywordId,
        ctx: MatchCtx,
        list: u16,
    ) -> Result<usize, String> {
        if keyword == KeywordId::Content {
            self.init.max_content_list_id = self.init.max_content_list_id.max(list as u32);
        }

        let node = self.alloc_sm(keyword, ctx);

        if list < LIST_MAX {
            self.append_to_legacy(node, list);
            return Ok(node);
        }

        // Unset the sticky list if it no longer matches.
        if let Some(sticky) = self.init.list {
            if sticky != list {
                debug!("reset: list {} != sticky list {}", list, sticky);
                self.init.list = None;
            }
        }

        if let Some(cur) = self.init.curbuf {
            if self.init.buffers[cur].id != list {
                for x in 0..self.init.buffers.len() {
                    if self.init.buffers[x].id == list && !self.init.buffers[x].multi_capable {
                        debug!("reusing buffer {} as it isn't multi-capable", x);
                        self.init.curbuf = Some(x);
                        break;
                    }
                }
            }
        }

        let need_new = match self.init.curbuf {
            Some(cur) => self.init.buffers[cur].id != list,
            None => true,
        };
        if need_new {
            let buf = self.push_new_buffer(registry, list, true)?;
            self.init.curbuf = Some(buf);
        }

        let cur = self.init.curbuf.expect("curbuf must be set");
        self.append_to_buffer(node, cur);
        Ok(node)
    }

    /// Make a registered buffer the sticky buffer.
    ///
    /// A buffer the last keyword just created for the same list is
    /// adopted; a non-multi-capable buffer with the same id is reused;
    /// anything else gets a fresh buffer slot.
    pub fn set_active_list(
        &mut self,
        registry: &BufferTypeRegistry,
        list: u16,
    ) -> Result<(), String> {
        if let Some(cur) = self.init.curbuf {
            let cb = self.init.buffers[cur];
            if cb.id == list && cb.sm_init {
                self.init.buffers[cur].sm_init = false;
                self.init.list = Some(list);
                return Ok(());
            }
            if cb.head.is_none() {
                return Err(format!(
                    "buffer {} set up but no matches added to it",
                    registry.name_of(cb.id)
                ));
            }
        }
        let multi_capable = registry.get(list).map(|b| b.multi_capable).unwrap_or(false);
        if !multi_capable {
            if let Some(x) = self.init.buffers.iter().position(|b| b.id == list) {
                self.init.curbuf = Some(x);
                self.init.list = Some(list);
                return Ok(());
            }
        }
        let buf = self.push_new_buffer(registry, list, false)?;
        self.init.curbuf = Some(buf);
        self.init.list = Some(list);
        Ok(())
    }

    /// Last match of one of the given keywords, searching the buffers and
    /// the built-in lists, restricted to the sticky list when one is
    /// active. Ties are broken by creation order.
    pub fn last_sm_from_lists(&self, kinds: &[KeywordId]) -> Option<usize> {
        let mut last: Option<usize> = None;
        for buf in &self.init.buffers {
            if let Some(sticky) = self.init.list {
                if sticky != buf.id {
                    continue;
                }
            }
            if let Some(found) = self.last_sm_from(buf.tail, kinds) {
                last = best_of(&self.init.matches, last, found);
            }
        }
        for (list, l) in self.init.smlists.iter().enumerate() {
            if let Some(sticky) = self.init.list {
                if sticky != list as u16 {
                    continue;
                }
            }
            if let Some(found) = self.last_sm_from(l.tail, kinds) {
                last = best_of(&self.init.matches, last, found);
            }
        }
        last
    }

    /// Last match of one of the given keywords in the list with the given
    /// id. Ids below [`LIST_MAX`] search the built-in list, ids above
    /// search every buffer carrying the id.
    pub fn last_sm_by_list_id(&self, list: u16, kinds: &[KeywordId]) -> Option<usize> {
        if list >= LIST_MAX {
            let mut last: Option<usize> = None;
            for buf in &self.init.buffers {
                if buf.id != list {
                    continue;
                }
                if let Some(found) = self.last_sm_from(buf.tail, kinds) {
                    last = best_of(&self.init.matches, last, found);
                }
            }
            last
        } else {
            self.last_sm_from(self.init.smlists[list as usize].tail, kinds)
        }
    }

    /// Walk backwards from a node for the first match of one of the given
    /// keywords.
    pub fn last_sm_from(&self, from: Option<usize>, kinds: &[KeywordId]) -> Option<usize> {
        let mut cur = from;
        while let Some(i) = cur {
            if kinds.contains(&self.init.matches[i].keyword) {
                return Some(i);
            }
            cur = self.init.matches[i].prev;
        }
        None
    }

    /// The match added last, across all lists and buffers.
    pub fn last_sm(&self) -> Option<usize> {
        let mut last: Option<usize> = None;
        for buf in &self.init.buffers {
            if let Some(tail) = buf.tail {
                last = best_of(&self.init.matches, last, tail);
            }
        }
        for l in &self.init.smlists {
            if let Some(tail) = l.tail {
                last = best_of(&self.init.matches, last, tail);
            }
        }
        last
    }

    /// The list or buffer id a match belongs to.
    pub fn list_of_sm(&self, node: usize) -> Option<u16> {
        for buf in &self.init.buffers {
            let mut cur = buf.head;
            while let Some(i) = cur {
                if i == node {
                    return Some(buf.id);
                }
                cur = self.init.matches[i].next;
            }
        }
        for (list, l) in self.init.smlists.iter().enumerate() {
            let mut cur = l.head;
            while let Some(i) = cur {
                if i == node {
                    return Some(list as u16);
                }
                cur = self.init.matches[i].next;
            }
        }
        None
    }

    fn unlink_from_legacy(&mut self, node: usize, list: u16) {
        let (prev, next) = {
            let sm = &self.init.matches[node];
            (sm.prev, sm.next)
        };
        let l = &mut self.init.smlists[list as usize];
        if l.head == Some(node) {
            l.head = next;
        }
        if l.tail == Some(node) {
            l.tail = prev;
        }
        if let Some(p) = prev {
            self.init.matches[p].next = next;
        }
        if let Some(n) = next {
            self.init.matches[n].prev = prev;
        }
        self.init.matches[node].prev = None;
        self.init.matches[node].next = None;
    }

    /// Relocate the most recent `content` match from the payload list to
    /// an app-layer buffer, for legacy content modifier keywords like
    /// `http_uri`.
    pub fn content_modifier_transfer(
        &mut self,
        registry: &BufferTypeRegistry,
        keyword_name: &str,
        target_list: u16,
        alproto: AlProto,
    ) -> Result<(), String> {
        if self.init.list.is_some() {
            return Err(format!(
                "\"{}\" keyword seen with a sticky buffer still set. Reset sticky buffer with pkt_data before using the modifier.",
                keyword_name
            ));
        }
        if self.alproto != AlProto::Unknown && !self.alproto.equals(alproto) {
            return Err("rule contains conflicting alprotos set".to_string());
        }

        let sm = self
            .last_sm_by_list_id(LIST_PMATCH, &[KeywordId::Content])
            .ok_or_else(|| {
                format!(
                    "\"{}\" keyword found inside the rule without a content context. Please use a \"content\" keyword before using the \"{}\" keyword",
                    keyword_name, keyword_name
                )
            })?;

        let (has_relative, rawbytes, replace) = {
            let cd = self.init.matches[sm].ctx.as_content().expect("content ctx");
            (cd.is_relative(), cd.is_rawbytes(), cd.is_replace())
        };
        if rawbytes {
            return Err(format!(
                "{} rule can not be used with the rawbytes rule keyword",
                keyword_name
            ));
        }
        if replace {
            return Err(format!(
                "{} rule can not be used with the replace rule keyword",
                keyword_name
            ));
        }

        if has_relative {
            // The content is chained to its predecessor on the payload
            // list; that link does not survive the move.
            let prev = self.init.matches[sm].prev;
            if let Some(pm) = self.last_sm_from(prev, &[KeywordId::Content, KeywordId::Pcre]) {
                clear_relative_next(&mut self.init.matches[pm].ctx);
            }
            // If the target buffer already has a tail, the moved content
            // becomes relative to it instead.
            if let Some(cur) = self.init.curbuf {
                if self.init.buffers[cur].id == target_list {
                    let tail = self.init.buffers[cur].tail;
                    if let Some(pm) =
                        self.last_sm_from(tail, &[KeywordId::Content, KeywordId::Pcre])
                    {
                        set_relative_next(&mut self.init.matches[pm].ctx);
                    }
                }
            }
        }

        self.alproto = alproto;
        self.flags |= SIG_FLAG_APPLAYER;

        let need_new = match self.init.curbuf {
            Some(cur) => self.init.buffers[cur].id != target_list,
            None => true,
        };
        if need_new {
            if let Some(cur) = self.init.curbuf {
                if self.init.buffers[cur].head.is_none() {
                    return Err("no matches for previous buffer".to_string());
                }
            }
            let existing = self
                .init
                .buffers
                .iter()
                .position(|b| b.id == target_list);
            let buf = match existing {
                Some(x) => x,
                None => self.push_new_buffer(registry, target_list, false)?,
            };
            self.init.curbuf = Some(buf);
        }

        // Two splices: unlink from the payload list, append to the buffer.
        self.unlink_from_legacy(sm, LIST_PMATCH);
        let cur = self.init.curbuf.expect("curbuf must be set");
        self.append_to_buffer(sm, cur);

        if self.init.matches[sm].keyword == KeywordId::Content {
            self.init.max_content_list_id =
                self.init.max_content_list_id.max(target_list as u32);
        }
        Ok(())
    }

    /// Set the signature's single app-layer protocol.
    pub fn set_alproto(&mut self, alproto: AlProto) -> Result<(), String> {
        if !alproto.is_valid() {
            return Err(format!("invalid alproto {}", alproto.name()));
        }
        let mut alproto = alproto;
        if self.init.alprotos[0] != AlProto::Unknown {
            // A multi-set was in effect; narrowing to one is only
            // allowed when the one is a member.
            if !self.init.alprotos.contains(&alproto) {
                return Err(format!(
                    "can't set rule app proto to {}: not in the rule's alproto set",
                    alproto.name()
                ));
            }
            self.init.alprotos[0] = AlProto::Unknown;
        }
        if self.alproto != AlProto::Unknown {
            let common = self.alproto.common(alproto);
            if common == AlProto::Failed {
                return Err(format!(
                    "can't set rule app proto to {}: already set to {}",
                    alproto.name(),
                    self.alproto.name()
                ));
            }
            alproto = common;
        }
        self.alproto = alproto;
        self.flags |= SIG_FLAG_APPLAYER;
        Ok(())
    }

    /// Set multiple possible app-layer protocols (e.g. a keyword valid
    /// for both tls and quic). Intersects with any previously set
    /// candidates; an empty intersection is an error and a singleton
    /// collapses to [`Signature::set_alproto`].
    pub fn set_multi_alproto(&mut self, alprotos: &[AlProto]) -> Result<(), String> {
        if self.alproto != AlProto::Unknown {
            if alprotos.contains(&self.alproto) {
                return Ok(());
            }
            return Err(format!(
                "alproto {} does not match the keyword's supported protocols",
                self.alproto.name()
            ));
        }
        if self.init.alprotos[0] != AlProto::Unknown {
            let kept: Vec<AlProto> = self
                .init
                .alprotos
                .iter()
                .copied()
                .take_while(|p| *p != AlProto::Unknown)
                .filter(|p| alprotos.contains(p))
                .collect();
            if kept.is_empty() {
                return Err("no common app-layer protocol".to_string());
            }
            if kept.len() == 1 {
                self.init.alprotos[0] = AlProto::Unknown;
                return self.set_alproto(kept[0]);
            }
            self.init.alprotos = [AlProto::Unknown; SIG_ALPROTO_MAX];
            for (i, p) in kept.iter().take(SIG_ALPROTO_MAX).enumerate() {
                self.init.alprotos[i] = *p;
            }
            self.flags |= SIG_FLAG_APPLAYER;
        } else {
            if alprotos.is_empty() {
                return Err("empty app-layer protocol set".to_string());
            }
            if alprotos.len() == 1 {
                return self.set_alproto(alprotos[0]);
            }
            for (i, p) in alprotos.iter().take(SIG_ALPROTO_MAX).enumerate() {
                self.init.alprotos[i] = *p;
            }
            self.flags |= SIG_FLAG_APPLAYER;
        }
        Ok(())
    }

    /// Build the compact address range arrays used at packet time.
    pub fn build_address_match_arrays(&mut self) {
        let fill = |list: &AddressList| {
            let mut v4 = vec![];
            let mut v6 = vec![];
            for entry in &list.entries {
                match &entry.kind {
                    AddressKind::Ipv4 { first, last } => v4.push((*first, *last)),
                    AddressKind::Ipv6 { first, last } => v6.push((*first, *last)),
                    AddressKind::Var(_) => {}
                }
            }
            (v4, v6)
        };
        let (src4, src6) = fill(&self.init.src);
        let (dst4, dst6) = fill(&self.init.dst);
        self.addr_src_match4 = src4;
        self.addr_src_match6 = src6;
        self.addr_dst_match4 = dst4;
        self.addr_dst_match6 = dst6;
    }

    /// Convert the match lists into contiguous per-list arrays, moving
    /// context ownership out of the arena.
    pub fn freeze(&mut self) {
        let mut arrays: Vec<(u16, Vec<SigMatchData>)> = vec![];
        let list_ids: Vec<(u16, Option<usize>)> = self
            .init
            .smlists
            .iter()
            .enumerate()
            .map(|(i, l)| (i as u16, l.head))
            .chain(self.init.buffers.iter().map(|b| (b.id, b.head)))
            .collect();
        for (id, head) in list_ids {
            let mut smd = vec![];
            let mut cur = head;
            while let Some(i) = cur {
                let keyword = self.init.matches[i].keyword;
                let ctx = self.init.matches[i].ctx.take();
                smd.push(SigMatchData { keyword, ctx });
                cur = self.init.matches[i].next;
            }
            if !smd.is_empty() {
                arrays.push((id, smd));
            }
        }
        self.sm_arrays = arrays;
    }
}

fn best_of(matches: &[SigMatch], a: Option<usize>, b: usize) -> Option<usize> {
    match a {
        None => Some(b),
        Some(a) if matches[b].idx > matches[a].idx => Some(b),
        some => some,
    }
}

fn clear_relative_next(ctx: &mut MatchCtx) {
    match ctx {
        MatchCtx::Content(cd) => cd.flags &= !CONTENT_RELATIVE_NEXT,
        MatchCtx::Pcre(pd) => pd.flags &= !PCRE_RELATIVE_NEXT,
        _ => {}
    }
}

fn set_relative_next(ctx: &mut MatchCtx) {
    match ctx {
        MatchCtx::Content(cd) => cd.flags |= CONTENT_RELATIVE_NEXT,
        MatchCtx::Pcre(pd) => pd.flags |= PCRE_RELATIVE_NEXT,
        _ => {}
    }
}
