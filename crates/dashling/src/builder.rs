//! Walks the generic attributed-node tree into the typed manifest graph.
//!
//! Unknown children are skipped for forward compatibility. Scalar errors at a
//! node drop that node and continue with its siblings; only root-level
//! problems (bad `MPD` element, unparseable root attributes) fail the whole
//! build.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{DashlingError, DashlingResult};
use crate::model::*;
use crate::scalar;
use crate::scalar::{ByteRange, ConditionalUint, FrameRate, Ratio};
use crate::xml::{self, XmlNode};

#[derive(Debug, Clone, Copy, Default)]
pub struct BuilderOptions {
    /// When set, an AdaptationSet declaring `bitstreamSwitching="false"`
    /// under a Period that declares `true` is a validation error. The default
    /// keeps the lenient behavior of promoting the flag to the Period's value.
    pub strict_bitstream_switching: bool,
}

pub fn parse_mpd(bytes: &[u8]) -> DashlingResult<Mpd> {
    parse_mpd_with(bytes, &BuilderOptions::default())
}

pub fn parse_mpd_with(bytes: &[u8], options: &BuilderOptions) -> DashlingResult<Mpd> {
    let root = xml::parse_tree(bytes)?;
    build_mpd(&root, options)
}

pub fn build_mpd(root: &XmlNode, options: &BuilderOptions) -> DashlingResult<Mpd> {
    if root.name != "MPD" {
        return Err(DashlingError::MpdParsing(format!(
            "expected an MPD root element, found {:?}",
            root.name
        )));
    }

    let mut mpd = Mpd {
        kind: root
            .attr("type")
            .map(parse_presentation_kind)
            .unwrap_or_default(),
        id: root.attr("id").map(str::to_string),
        profiles: root.attr("profiles").map(str::to_string),
        availability_start_time: attr_date_time(root, "availabilityStartTime")?,
        availability_end_time: attr_date_time(root, "availabilityEndTime")?,
        publish_time: attr_date_time(root, "publishTime")?,
        media_presentation_duration: attr_duration(root, "mediaPresentationDuration")?,
        minimum_update_period: attr_duration(root, "minimumUpdatePeriod")?,
        min_buffer_time: attr_duration(root, "minBufferTime")?,
        time_shift_buffer_depth: attr_duration(root, "timeShiftBufferDepth")?,
        suggested_presentation_delay: attr_duration(root, "suggestedPresentationDelay")?,
        max_segment_duration: attr_duration(root, "maxSegmentDuration")?,
        max_subsegment_duration: attr_duration(root, "maxSubsegmentDuration")?,
        ..Default::default()
    };

    if mpd.is_dynamic() && mpd.availability_start_time.is_none() {
        return Err(DashlingError::Validation(
            "dynamic presentation without availabilityStartTime".to_string(),
        ));
    }

    for child in &root.children {
        match child.name.as_str() {
            "BaseURL" => mpd.base_urls.push(build_base_url(child)),
            "UTCTiming" => {
                if let Some(timing) = build_utc_timing(child) {
                    mpd.utc_timings.push(timing);
                }
            }
            "Period" => match build_period(child, options) {
                Ok(period) => mpd.periods.push(period),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed Period");
                }
            },
            _ => {}
        }
    }

    Ok(mpd)
}

/// Build a bare `Period` from an xlink fragment node.
pub fn build_external_period(node: &XmlNode, options: &BuilderOptions) -> DashlingResult<Period> {
    if node.name != "Period" {
        return Err(DashlingError::MpdParsing(format!(
            "expected a Period element, found {:?}",
            node.name
        )));
    }
    build_period(node, options)
}

/// Build a bare `AdaptationSet` from an xlink fragment node.
pub fn build_external_adaptation_set(
    node: &XmlNode,
    period_bitstream_switching: bool,
    options: &BuilderOptions,
) -> DashlingResult<AdaptationSet> {
    build_adaptation_set(node, period_bitstream_switching, options)
}

/// Build a bare `SegmentList` from an xlink fragment node.
pub fn build_external_segment_list(node: &XmlNode) -> DashlingResult<SegmentList> {
    build_segment_list(node)
}

fn parse_presentation_kind(value: &str) -> PresentationKind {
    match value {
        "static" | "OnDemand" => PresentationKind::Static,
        "dynamic" | "Live" => PresentationKind::Dynamic,
        other => {
            tracing::warn!(value = other, "Unknown MPD@type, assuming static");
            PresentationKind::Static
        }
    }
}

fn build_period(node: &XmlNode, options: &BuilderOptions) -> DashlingResult<Period> {
    let mut period = Period {
        id: node.attr("id").map(str::to_string),
        start: attr_duration(node, "start")?,
        duration: attr_duration(node, "duration")?,
        bitstream_switching: attr_bool(node, "bitstreamSwitching")?.unwrap_or(false),
        xlink: build_xlink(node),
        ..Default::default()
    };

    // A placeholder carries no usable children until its reference resolves.
    if period.is_placeholder() {
        return Ok(period);
    }

    // The Period's own addressing and BaseURLs must be in place before its
    // AdaptationSets are built, since those read the parent scope.
    for child in &node.children {
        match child.name.as_str() {
            "BaseURL" => period.base_urls.push(build_base_url(child)),
            "SegmentBase" | "SegmentList" | "SegmentTemplate" => {
                set_addressing(&mut period.addressing, child)?
            }
            _ => {}
        }
    }
    for child in node.children_named("AdaptationSet") {
        match build_adaptation_set(child, period.bitstream_switching, options) {
            Ok(set) => period.adaptation_sets.push(set),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed AdaptationSet");
            }
        }
    }

    Ok(period)
}

fn build_adaptation_set(
    node: &XmlNode,
    period_bitstream_switching: bool,
    options: &BuilderOptions,
) -> DashlingResult<AdaptationSet> {
    let mut set = AdaptationSet {
        id: attr_uint32(node, "id")?,
        group: attr_uint32(node, "group")?,
        lang: node.attr("lang").map(str::to_string),
        content_type: node.attr("contentType").map(str::to_string),
        par: attr_ratio(node, "par")?,
        min_bandwidth: attr_uint(node, "minBandwidth")?,
        max_bandwidth: attr_uint(node, "maxBandwidth")?,
        min_width: attr_uint32(node, "minWidth")?,
        max_width: attr_uint32(node, "maxWidth")?,
        min_height: attr_uint32(node, "minHeight")?,
        max_height: attr_uint32(node, "maxHeight")?,
        min_frame_rate: attr_frame_rate(node, "minFrameRate")?,
        max_frame_rate: attr_frame_rate(node, "maxFrameRate")?,
        segment_alignment: attr_conditional_uint(node, "segmentAlignment")?,
        subsegment_alignment: attr_conditional_uint(node, "subsegmentAlignment")?,
        subsegment_starts_with_sap: attr_uint32(node, "subsegmentStartsWithSAP")?.unwrap_or(0),
        bitstream_switching: attr_bool(node, "bitstreamSwitching")?,
        base: build_representation_base(node)?,
        xlink: build_xlink(node),
        ..Default::default()
    };

    if period_bitstream_switching && set.bitstream_switching == Some(false) {
        if options.strict_bitstream_switching {
            return Err(DashlingError::Validation(
                "AdaptationSet@bitstreamSwitching=false contradicts Period-level true"
                    .to_string(),
            ));
        }
        // The standard forbids an AdaptationSet from unsetting a Period-level
        // true; lenient mode promotes the flag instead of rejecting.
        tracing::debug!("Promoting AdaptationSet@bitstreamSwitching to the Period-level true");
        set.bitstream_switching = Some(true);
    }

    if set.xlink.is_some() {
        return Ok(set);
    }

    // Direct children first: Representation parsing below reads the already
    // populated parent scope.
    for child in &node.children {
        match child.name.as_str() {
            "BaseURL" => set.base_urls.push(build_base_url(child)),
            "SegmentBase" | "SegmentList" | "SegmentTemplate" => {
                set_addressing(&mut set.addressing, child)?
            }
            "ContentComponent" => match build_content_component(child) {
                Ok(component) => set.content_components.push(component),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed ContentComponent");
                }
            },
            _ => {}
        }
    }
    for child in node.children_named("Representation") {
        match build_representation(child) {
            Ok(representation) => set.representations.push(representation),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed Representation");
            }
        }
    }

    Ok(set)
}

fn build_representation(node: &XmlNode) -> DashlingResult<Representation> {
    // `id` and `bandwidth` are structurally required; a Representation
    // missing either is dropped while its siblings continue.
    let id = node
        .attr("id")
        .ok_or_else(|| DashlingError::MpdParsing("Representation without id".to_string()))?
        .to_string();
    let bandwidth = attr_uint(node, "bandwidth")?.ok_or_else(|| {
        DashlingError::MpdParsing(format!("Representation {id:?} without bandwidth"))
    })?;

    let mut representation = Representation {
        id,
        bandwidth,
        quality_ranking: attr_uint32(node, "qualityRanking")?,
        dependency_id: node
            .attr("dependencyId")
            .map(scalar::parse_string_vector)
            .unwrap_or_default(),
        media_stream_structure_id: node
            .attr("mediaStreamStructureId")
            .map(scalar::parse_string_vector)
            .unwrap_or_default(),
        base: build_representation_base(node)?,
        base_urls: Vec::new(),
        addressing: None,
        sub_representations: Vec::new(),
    };

    for child in &node.children {
        match child.name.as_str() {
            "BaseURL" => representation.base_urls.push(build_base_url(child)),
            "SegmentBase" | "SegmentList" | "SegmentTemplate" => {
                set_addressing(&mut representation.addressing, child)?
            }
            "SubRepresentation" => match build_sub_representation(child) {
                Ok(sub) => representation.sub_representations.push(sub),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed SubRepresentation");
                }
            },
            _ => {}
        }
    }

    Ok(representation)
}

fn build_sub_representation(node: &XmlNode) -> DashlingResult<SubRepresentation> {
    Ok(SubRepresentation {
        level: attr_uint32(node, "level")?,
        dependency_level: node
            .attr("dependencyLevel")
            .map(|value| {
                value
                    .split_whitespace()
                    .map(scalar::parse_uint32)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default(),
        bandwidth: attr_uint(node, "bandwidth")?,
        content_component: node
            .attr("contentComponent")
            .map(scalar::parse_string_vector)
            .unwrap_or_default(),
        base: build_representation_base(node)?,
    })
}

fn build_representation_base(node: &XmlNode) -> DashlingResult<RepresentationBase> {
    Ok(RepresentationBase {
        profiles: node.attr("profiles").map(str::to_string),
        width: attr_uint32(node, "width")?,
        height: attr_uint32(node, "height")?,
        sar: attr_ratio(node, "sar")?,
        frame_rate: attr_frame_rate(node, "frameRate")?,
        max_frame_rate: attr_frame_rate(node, "maxFrameRate")?,
        audio_sampling_rate: node.attr("audioSamplingRate").map(str::to_string),
        mime_type: node.attr("mimeType").map(str::to_string),
        codecs: node.attr("codecs").map(str::to_string),
        start_with_sap: attr_uint32(node, "startWithSAP")?.unwrap_or(0),
        content_protection: node
            .children_named("ContentProtection")
            .filter_map(build_descriptor)
            .collect(),
    })
}

fn build_content_component(node: &XmlNode) -> DashlingResult<ContentComponent> {
    Ok(ContentComponent {
        id: attr_uint32(node, "id")?,
        lang: node.attr("lang").map(str::to_string),
        content_type: node.attr("contentType").map(str::to_string),
        par: attr_ratio(node, "par")?,
    })
}

fn build_descriptor(node: &XmlNode) -> Option<Descriptor> {
    let scheme_id_uri = match node.attr("schemeIdUri") {
        Some(uri) => uri.to_string(),
        None => {
            tracing::warn!(element = %node.name, "Descriptor without schemeIdUri");
            return None;
        }
    };
    Some(Descriptor {
        scheme_id_uri,
        value: node.attr("value").map(str::to_string),
        id: node.attr("id").map(str::to_string),
    })
}

fn build_base_url(node: &XmlNode) -> BaseUrl {
    BaseUrl {
        url: node.text.clone(),
        service_location: node.attr("serviceLocation").map(str::to_string),
    }
}

fn build_utc_timing(node: &XmlNode) -> Option<UtcTimingSource> {
    let scheme = node.attr("schemeIdUri")?;
    let method = match scheme {
        "urn:mpeg:dash:utc:ntp:2014" => UtcTimingMethod::Ntp,
        "urn:mpeg:dash:utc:sntp:2014" => UtcTimingMethod::Sntp,
        "urn:mpeg:dash:utc:http-head:2014" => UtcTimingMethod::HttpHead,
        "urn:mpeg:dash:utc:http-xsdate:2014" => UtcTimingMethod::HttpXsdate,
        "urn:mpeg:dash:utc:http-iso:2014" => UtcTimingMethod::HttpIso,
        "urn:mpeg:dash:utc:http-ntp:2014" => UtcTimingMethod::HttpNtp,
        "urn:mpeg:dash:utc:direct:2014" => UtcTimingMethod::Direct,
        other => {
            tracing::warn!(scheme = other, "Unknown UTCTiming scheme");
            return None;
        }
    };
    Some(UtcTimingSource {
        method,
        values: node
            .attr("value")
            .map(scalar::parse_string_vector)
            .unwrap_or_default(),
    })
}

fn build_xlink(node: &XmlNode) -> Option<XlinkRef> {
    let href = node.xlink_attr("href")?.to_string();
    let actuate = match node.xlink_attr("actuate") {
        Some("onLoad") => XlinkActuate::OnLoad,
        // "onRequest" is the schema default; anything else falls back to it.
        _ => XlinkActuate::OnRequest,
    };
    Some(XlinkRef { href, actuate })
}

fn set_addressing(
    slot: &mut Option<AddressingDescriptor>,
    node: &XmlNode,
) -> DashlingResult<()> {
    let descriptor = match node.name.as_str() {
        "SegmentBase" => AddressingDescriptor::Base(build_segment_base(node)?),
        "SegmentList" => AddressingDescriptor::List(build_segment_list(node)?),
        "SegmentTemplate" => AddressingDescriptor::Template(build_segment_template(node)?),
        other => {
            return Err(DashlingError::MpdParsing(format!(
                "unexpected addressing element {other:?}"
            )))
        }
    };
    if slot.is_some() {
        tracing::warn!(element = %node.name, "Duplicate addressing declaration replaces the earlier one");
    }
    *slot = Some(descriptor);
    Ok(())
}

fn build_segment_base(node: &XmlNode) -> DashlingResult<SegmentBase> {
    let timescale = attr_uint32(node, "timescale")?;
    if timescale == Some(0) {
        return Err(DashlingError::MpdParsing(
            "timescale must not be 0".to_string(),
        ));
    }

    Ok(SegmentBase {
        timescale,
        presentation_time_offset: attr_uint(node, "presentationTimeOffset")?,
        index_range: attr_byte_range(node, "indexRange")?,
        index_range_exact: attr_bool(node, "indexRangeExact")?,
        initialization: node
            .first_child("Initialization")
            .or_else(|| node.first_child("Initialisation"))
            .map(build_url_type)
            .transpose()?,
        representation_index: node
            .first_child("RepresentationIndex")
            .map(build_url_type)
            .transpose()?,
    })
}

fn build_multi_segment_base(node: &XmlNode) -> DashlingResult<MultiSegmentBase> {
    Ok(MultiSegmentBase {
        base: build_segment_base(node)?,
        duration: attr_uint(node, "duration")?,
        start_number: attr_uint(node, "startNumber")?,
        timeline: node
            .first_child("SegmentTimeline")
            .map(build_segment_timeline)
            .transpose()?,
        bitstream_switching: node
            .first_child("BitstreamSwitching")
            .map(build_url_type)
            .transpose()?,
    })
}

fn build_segment_timeline(node: &XmlNode) -> DashlingResult<SegmentTimeline> {
    let mut timeline = SegmentTimeline::default();
    for entry in node.children_named("S") {
        let d = attr_uint(entry, "d")?.ok_or_else(|| {
            DashlingError::MpdParsing("SegmentTimeline S element without d".to_string())
        })?;
        if d == 0 {
            return Err(DashlingError::MpdParsing(
                "SegmentTimeline S element with d=0".to_string(),
            ));
        }
        timeline.entries.push(SEntry {
            t: attr_uint(entry, "t")?,
            d,
            r: attr_int(entry, "r")?.unwrap_or(0),
        });
    }
    Ok(timeline)
}

fn build_segment_list(node: &XmlNode) -> DashlingResult<SegmentList> {
    let mut list = SegmentList {
        mult: build_multi_segment_base(node)?,
        segment_urls: Vec::new(),
        xlink: build_xlink(node),
    };
    for child in node.children_named("SegmentURL") {
        list.segment_urls.push(SegmentUrl {
            media: child.attr("media").map(str::to_string),
            media_range: attr_byte_range(child, "mediaRange")?,
            index: child.attr("index").map(str::to_string),
            index_range: attr_byte_range(child, "indexRange")?,
        });
    }
    Ok(list)
}

fn build_segment_template(node: &XmlNode) -> DashlingResult<SegmentTemplate> {
    Ok(SegmentTemplate {
        mult: build_multi_segment_base(node)?,
        media: node.attr("media").map(str::to_string),
        index: node.attr("index").map(str::to_string),
        initialization: node.attr("initialization").map(str::to_string),
        bitstream_switching: node.attr("bitstreamSwitching").map(str::to_string),
    })
}

fn build_url_type(node: &XmlNode) -> DashlingResult<UrlType> {
    Ok(UrlType {
        source_url: node.attr("sourceURL").map(str::to_string),
        range: attr_byte_range(node, "range")?,
    })
}

fn attr_duration(node: &XmlNode, name: &str) -> DashlingResult<Option<Duration>> {
    node.attr(name)
        .map(scalar::parse_duration)
        .transpose()
        .map_err(Into::into)
}

fn attr_date_time(node: &XmlNode, name: &str) -> DashlingResult<Option<DateTime<Utc>>> {
    node.attr(name)
        .map(scalar::parse_date_time)
        .transpose()
        .map_err(Into::into)
}

fn attr_uint(node: &XmlNode, name: &str) -> DashlingResult<Option<u64>> {
    node.attr(name)
        .map(scalar::parse_uint)
        .transpose()
        .map_err(Into::into)
}

fn attr_uint32(node: &XmlNode, name: &str) -> DashlingResult<Option<u32>> {
    node.attr(name)
        .map(scalar::parse_uint32)
        .transpose()
        .map_err(Into::into)
}

fn attr_int(node: &XmlNode, name: &str) -> DashlingResult<Option<i64>> {
    node.attr(name)
        .map(scalar::parse_int)
        .transpose()
        .map_err(Into::into)
}

fn attr_bool(node: &XmlNode, name: &str) -> DashlingResult<Option<bool>> {
    node.attr(name)
        .map(scalar::parse_bool)
        .transpose()
        .map_err(Into::into)
}

fn attr_ratio(node: &XmlNode, name: &str) -> DashlingResult<Option<Ratio>> {
    node.attr(name)
        .map(scalar::parse_ratio)
        .transpose()
        .map_err(Into::into)
}

fn attr_frame_rate(node: &XmlNode, name: &str) -> DashlingResult<Option<FrameRate>> {
    node.attr(name)
        .map(scalar::parse_frame_rate)
        .transpose()
        .map_err(Into::into)
}

fn attr_conditional_uint(node: &XmlNode, name: &str) -> DashlingResult<Option<ConditionalUint>> {
    node.attr(name)
        .map(scalar::parse_conditional_uint)
        .transpose()
        .map_err(Into::into)
}

fn attr_byte_range(node: &XmlNode, name: &str) -> DashlingResult<Option<ByteRange>> {
    node.attr(name)
        .map(scalar::parse_byte_range)
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
        <MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static"
             mediaPresentationDuration="PT30S" minBufferTime="PT2S">
          <Period id="p0">
            <AdaptationSet contentType="video" maxWidth="1920" maxHeight="1080">
              <SegmentTemplate media="$RepresentationID$/$Number$.m4s"
                               initialization="$RepresentationID$/init.mp4"
                               timescale="1000" duration="2000" startNumber="1"/>
              <Representation id="v0" bandwidth="800000" width="640" height="360"/>
              <Representation id="v1" bandwidth="2400000" width="1920" height="1080"
                              frameRate="30000/1001"/>
            </AdaptationSet>
          </Period>
        </MPD>"#;

    #[test]
    fn test_build_basic_manifest() {
        let mpd = parse_mpd(BASIC.as_bytes()).unwrap();
        assert_eq!(mpd.kind, PresentationKind::Static);
        assert_eq!(
            mpd.media_presentation_duration,
            Some(Duration::from_secs(30))
        );
        assert_eq!(mpd.periods.len(), 1);

        let set = &mpd.periods[0].adaptation_sets[0];
        assert_eq!(set.max_width, Some(1920));
        assert_eq!(set.representations.len(), 2);
        assert_eq!(set.representations[0].id, "v0");
        assert_eq!(set.representations[1].bandwidth, 2400000);

        let Some(AddressingDescriptor::Template(template)) = &set.addressing else {
            panic!("expected a SegmentTemplate at AdaptationSet level");
        };
        assert_eq!(template.mult.duration, Some(2000));
        assert_eq!(template.mult.base.timescale(), 1000);
    }

    #[test]
    fn test_representation_without_id_is_dropped() {
        let mpd = parse_mpd(
            br#"<MPD type="static" mediaPresentationDuration="PT10S">
                  <Period>
                    <AdaptationSet>
                      <SegmentTemplate media="$Number$.m4s" duration="2" />
                      <Representation bandwidth="100"/>
                      <Representation id="ok" bandwidth="200"/>
                    </AdaptationSet>
                  </Period>
                </MPD>"#,
        )
        .unwrap();
        let set = &mpd.periods[0].adaptation_sets[0];
        assert_eq!(set.representations.len(), 1);
        assert_eq!(set.representations[0].id, "ok");
    }

    #[test]
    fn test_dynamic_requires_availability_start_time() {
        assert!(matches!(
            parse_mpd(br#"<MPD type="dynamic"><Period/></MPD>"#),
            Err(DashlingError::Validation(_))
        ));
    }

    #[test]
    fn test_bitstream_switching_promotion() {
        let manifest = br#"<MPD type="static" mediaPresentationDuration="PT10S">
              <Period bitstreamSwitching="true">
                <AdaptationSet bitstreamSwitching="false">
                  <SegmentTemplate media="$Number$.m4s" duration="2"/>
                  <Representation id="a" bandwidth="1"/>
                </AdaptationSet>
              </Period>
            </MPD>"#;

        let mpd = parse_mpd(manifest).unwrap();
        let set = &mpd.periods[0].adaptation_sets[0];
        assert_eq!(set.bitstream_switching, Some(true));

        let strict = BuilderOptions {
            strict_bitstream_switching: true,
        };
        let mpd = parse_mpd_with(manifest, &strict).unwrap();
        // In strict mode the offending AdaptationSet is dropped.
        assert!(mpd.periods[0].adaptation_sets.is_empty());
    }

    #[test]
    fn test_xlink_placeholder_period() {
        let mpd = parse_mpd(
            br#"<MPD type="static" mediaPresentationDuration="PT10S"
                     xmlns:xlink="http://www.w3.org/1999/xlink">
                  <Period xlink:href="https://example.com/p.xml" xlink:actuate="onLoad">
                    <AdaptationSet><Representation id="x" bandwidth="1"/></AdaptationSet>
                  </Period>
                </MPD>"#,
        )
        .unwrap();
        let period = &mpd.periods[0];
        assert!(period.is_placeholder());
        assert_eq!(period.xlink.as_ref().unwrap().actuate, XlinkActuate::OnLoad);
        // Placeholder children are not materialized.
        assert!(period.adaptation_sets.is_empty());
    }

    #[test]
    fn test_segment_timeline() {
        let mpd = parse_mpd(
            br#"<MPD type="static" mediaPresentationDuration="PT40S">
                  <Period>
                    <AdaptationSet>
                      <SegmentTemplate media="$Time$.m4s" timescale="1">
                        <SegmentTimeline>
                          <S t="0" d="10" r="2"/>
                          <S d="5"/>
                        </SegmentTimeline>
                      </SegmentTemplate>
                      <Representation id="a" bandwidth="1"/>
                    </AdaptationSet>
                  </Period>
                </MPD>"#,
        )
        .unwrap();
        let Some(AddressingDescriptor::Template(template)) =
            &mpd.periods[0].adaptation_sets[0].addressing
        else {
            panic!("expected template");
        };
        let timeline = template.mult.timeline.as_ref().unwrap();
        assert_eq!(timeline.entries.len(), 2);
        assert_eq!(timeline.entries[0].t, Some(0));
        assert_eq!(timeline.entries[0].r, 2);
        assert_eq!(timeline.entries[1].d, 5);
    }

    #[test]
    fn test_utc_timing() {
        let mpd = parse_mpd(
            br#"<MPD type="static" mediaPresentationDuration="PT10S">
                  <UTCTiming schemeIdUri="urn:mpeg:dash:utc:http-xsdate:2014"
                             value="https://a.example/time https://b.example/time"/>
                  <UTCTiming schemeIdUri="urn:mpeg:dash:utc:direct:2014"
                             value="2024-03-01T00:00:00Z"/>
                  <Period/>
                </MPD>"#,
        )
        .unwrap();
        assert_eq!(mpd.utc_timings.len(), 2);
        assert_eq!(mpd.utc_timings[0].method, UtcTimingMethod::HttpXsdate);
        assert_eq!(mpd.utc_timings[0].values.len(), 2);
        assert_eq!(mpd.utc_timings[1].method, UtcTimingMethod::Direct);
    }
}
