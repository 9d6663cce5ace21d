//! Typed manifest node graph.
//!
//! The tree owns all node values; nodes below [`Mpd`] are owned by their
//! parent's ordered lists, which preserve document order and allow
//! duplicates. Consumers that need back-references (a Representation's
//! AdaptationSet and Period) address nodes by index instead of pointers, so
//! the whole tree can be replaced on a live refresh without dangling
//! references.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::scalar::{ByteRange, ConditionalUint, FrameRate, Ratio};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentationKind {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XlinkActuate {
    OnRequest,
    OnLoad,
}

/// Reference to an external XML fragment to be spliced in place of the
/// carrying node. A node holding an unresolved reference is a placeholder
/// with no usable children.
#[derive(Debug, Clone)]
pub struct XlinkRef {
    pub href: String,
    pub actuate: XlinkActuate,
}

#[derive(Debug, Clone, Default)]
pub struct BaseUrl {
    pub url: String,
    pub service_location: Option<String>,
}

/// Generic `schemeIdUri`/`value` descriptor (ContentProtection, Role, ...).
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub scheme_id_uri: String,
    pub value: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtcTimingMethod {
    Ntp,
    Sntp,
    HttpHead,
    HttpXsdate,
    HttpIso,
    HttpNtp,
    Direct,
}

/// One clock-synchronization source: a method plus its server list (or the
/// literal time value for [`UtcTimingMethod::Direct`]).
#[derive(Debug, Clone)]
pub struct UtcTimingSource {
    pub method: UtcTimingMethod,
    pub values: Vec<String>,
}

/// URL + byte range pair (`Initialization`, `RepresentationIndex`, ...).
#[derive(Debug, Clone, Default)]
pub struct UrlType {
    pub source_url: Option<String>,
    pub range: Option<ByteRange>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentBase {
    pub timescale: Option<u32>,
    pub presentation_time_offset: Option<u64>,
    pub index_range: Option<ByteRange>,
    pub index_range_exact: Option<bool>,
    pub initialization: Option<UrlType>,
    pub representation_index: Option<UrlType>,
}

impl SegmentBase {
    /// `@timescale` defaults to 1 and is never 0.
    pub fn timescale(&self) -> u32 {
        self.timescale.unwrap_or(1)
    }
}

/// `MultipleSegmentBaseType`: the fields shared by SegmentList and
/// SegmentTemplate on top of SegmentBase.
#[derive(Debug, Clone, Default)]
pub struct MultiSegmentBase {
    pub base: SegmentBase,
    /// Constant segment duration in `@timescale` units.
    pub duration: Option<u64>,
    pub start_number: Option<u64>,
    pub timeline: Option<SegmentTimeline>,
    pub bitstream_switching: Option<UrlType>,
}

impl MultiSegmentBase {
    pub fn start_number(&self) -> u64 {
        self.start_number.unwrap_or(1)
    }
}

/// Run-length encoded list of segment start/duration pairs.
#[derive(Debug, Clone, Default)]
pub struct SegmentTimeline {
    pub entries: Vec<SEntry>,
}

/// One `S` element: `d` in timescale units, `t` resets the running clock when
/// present, `r` counts *additional* repeats (`r=2` describes 3 segments).
/// `r < 0` repeats until the next entry's `t`, or until the Period ends.
#[derive(Debug, Clone, Copy)]
pub struct SEntry {
    pub t: Option<u64>,
    pub d: u64,
    pub r: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentUrl {
    pub media: Option<String>,
    pub media_range: Option<ByteRange>,
    pub index: Option<String>,
    pub index_range: Option<ByteRange>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    pub mult: MultiSegmentBase,
    pub segment_urls: Vec<SegmentUrl>,
    pub xlink: Option<XlinkRef>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTemplate {
    pub mult: MultiSegmentBase,
    pub media: Option<String>,
    pub index: Option<String>,
    pub initialization: Option<String>,
    pub bitstream_switching: Option<String>,
}

/// The three mutually exclusive addressing declarations. Each scope level
/// (Period, AdaptationSet, Representation) may carry at most one.
#[derive(Debug, Clone)]
pub enum AddressingDescriptor {
    Base(SegmentBase),
    List(SegmentList),
    Template(SegmentTemplate),
}

/// Attributes common to AdaptationSet, Representation and SubRepresentation.
#[derive(Debug, Clone, Default)]
pub struct RepresentationBase {
    pub profiles: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sar: Option<Ratio>,
    pub frame_rate: Option<FrameRate>,
    pub max_frame_rate: Option<FrameRate>,
    pub audio_sampling_rate: Option<String>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub start_with_sap: u32,
    pub content_protection: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentComponent {
    pub id: Option<u32>,
    pub lang: Option<String>,
    pub content_type: Option<String>,
    pub par: Option<Ratio>,
}

#[derive(Debug, Clone)]
pub struct SubRepresentation {
    pub level: Option<u32>,
    pub dependency_level: Vec<u32>,
    pub bandwidth: Option<u64>,
    pub content_component: Vec<String>,
    pub base: RepresentationBase,
}

#[derive(Debug, Clone)]
pub struct Representation {
    pub id: String,
    pub bandwidth: u64,
    pub quality_ranking: Option<u32>,
    pub dependency_id: Vec<String>,
    pub media_stream_structure_id: Vec<String>,
    pub base: RepresentationBase,
    pub base_urls: Vec<BaseUrl>,
    pub addressing: Option<AddressingDescriptor>,
    pub sub_representations: Vec<SubRepresentation>,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationSet {
    pub id: Option<u32>,
    pub group: Option<u32>,
    pub lang: Option<String>,
    pub content_type: Option<String>,
    pub par: Option<Ratio>,
    pub min_bandwidth: Option<u64>,
    pub max_bandwidth: Option<u64>,
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
    pub min_frame_rate: Option<FrameRate>,
    pub max_frame_rate: Option<FrameRate>,
    pub segment_alignment: Option<ConditionalUint>,
    pub subsegment_alignment: Option<ConditionalUint>,
    pub subsegment_starts_with_sap: u32,
    pub bitstream_switching: Option<bool>,
    pub base: RepresentationBase,
    pub base_urls: Vec<BaseUrl>,
    pub addressing: Option<AddressingDescriptor>,
    pub content_components: Vec<ContentComponent>,
    pub representations: Vec<Representation>,
    pub xlink: Option<XlinkRef>,
}

#[derive(Debug, Clone, Default)]
pub struct Period {
    pub id: Option<String>,
    pub start: Option<Duration>,
    pub duration: Option<Duration>,
    pub bitstream_switching: bool,
    pub base_urls: Vec<BaseUrl>,
    pub addressing: Option<AddressingDescriptor>,
    pub adaptation_sets: Vec<AdaptationSet>,
    pub xlink: Option<XlinkRef>,
}

impl Period {
    pub fn is_placeholder(&self) -> bool {
        self.xlink.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mpd {
    pub kind: PresentationKind,
    pub id: Option<String>,
    pub profiles: Option<String>,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub availability_end_time: Option<DateTime<Utc>>,
    pub publish_time: Option<DateTime<Utc>>,
    pub media_presentation_duration: Option<Duration>,
    pub minimum_update_period: Option<Duration>,
    pub min_buffer_time: Option<Duration>,
    pub time_shift_buffer_depth: Option<Duration>,
    pub suggested_presentation_delay: Option<Duration>,
    pub max_segment_duration: Option<Duration>,
    pub max_subsegment_duration: Option<Duration>,
    pub base_urls: Vec<BaseUrl>,
    pub periods: Vec<Period>,
    pub utc_timings: Vec<UtcTimingSource>,
}

impl Mpd {
    pub fn is_dynamic(&self) -> bool {
        self.kind == PresentationKind::Dynamic
    }
}
