//! `DashSession`: the query surface the playback pipeline drives.
//!
//! A session owns the resolved tree, the presentation timeline and the
//! active stream cursors. There is no hidden global state: every operation
//! goes through an explicit session value. Mutating operations (xlink
//! resolution, live refresh, period switches) take `&mut self`, so the
//! borrow checker serializes rebuilds against readers; a caller that needs a
//! frozen snapshot across a rebuild clones the session first.

use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::addressing::{self, dur_mul, SegmentSequence};
use crate::builder::{self, BuilderOptions};
use crate::clock::Clock;
use crate::error::{DashlingError, DashlingResult};
use crate::inherit::{self, EffectiveAddressing};
use crate::model::{
    AdaptationSet, Mpd, Period, Representation, UrlType, UtcTimingSource,
};
use crate::navigator::{self, Advance, SeekResult, SegmentCursor, Snap};
use crate::scalar::{ByteRange, FrameRate};
use crate::select::{self, SelectionConstraints};
use crate::template::{TemplateArgs, UrlTemplate};
use crate::timeline::{PresentationTimeline, ResolveTarget, StreamPeriod};
use crate::url::{apply_base_urls, merge_baseurls};
use crate::xlink::{self, ManifestFetch};

/// Everything the downloader needs to fetch one media segment.
#[derive(Debug, Clone)]
pub struct FragmentInfo {
    pub uri: Url,
    pub byte_range: Option<ByteRange>,
    pub index_uri: Option<Url>,
    pub index_range: Option<ByteRange>,
    /// Presentation-clock start of this fragment.
    pub timestamp: Duration,
    pub duration: Duration,
}

/// Initialization (or index) header descriptor.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub uri: Url,
    pub range: Option<ByteRange>,
}

/// One set-up stream: the selected Representation plus its resolved segment
/// sequence and cursor. References into the tree are indices, never
/// pointers, so a refresh can rebuild the tree underneath.
#[derive(Debug, Clone)]
pub struct ActiveStream {
    adaptation_index: usize,
    representation_index: usize,
    representation_id: String,
    bandwidth: u64,
    mime_type: Option<String>,
    content_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<FrameRate>,
    audio_sampling_rate: Option<String>,
    base_url: Url,
    effective: EffectiveAddressing,
    media_template: Option<UrlTemplate>,
    index_template: Option<UrlTemplate>,
    init_template: Option<UrlTemplate>,
    sequence: SegmentSequence,
    cursor: SegmentCursor,
    period_start: Duration,
    period_duration: Option<Duration>,
}

impl ActiveStream {
    pub fn adaptation_index(&self) -> usize {
        self.adaptation_index
    }

    pub fn representation_index(&self) -> usize {
        self.representation_index
    }

    pub fn representation_id(&self) -> &str {
        &self.representation_id
    }

    pub fn bandwidth(&self) -> u64 {
        self.bandwidth
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn frame_rate(&self) -> Option<FrameRate> {
        self.frame_rate
    }

    pub fn audio_sampling_rate(&self) -> Option<&str> {
        self.audio_sampling_rate.as_deref()
    }

    pub fn cursor(&self) -> SegmentCursor {
        self.cursor
    }

    /// Total addressable segment instances; `None` when unbounded (live).
    pub fn segment_count(&self) -> Option<u64> {
        match &self.sequence {
            SegmentSequence::Materialized(segments) => Some(
                segments
                    .iter()
                    .map(addressing::MediaSegment::instance_count)
                    .sum(),
            ),
            SegmentSequence::Formula(formula) => formula.count,
        }
    }

    /// Presentation time of the instance the cursor points at. Past the end
    /// of the list this is the end of the last instance, so a live refresh
    /// can re-derive the cursor near the live edge.
    pub fn current_position(&self) -> Duration {
        match &self.sequence {
            SegmentSequence::Materialized(segments) => {
                if self.cursor.segment_index < 0 {
                    return self.period_start;
                }
                match segments.get(self.cursor.segment_index as usize) {
                    Some(segment) => {
                        segment.instance_start(self.cursor.repeat_index.min(segment.repeat))
                    }
                    None => segments
                        .last()
                        .map(addressing::MediaSegment::end)
                        .unwrap_or(self.period_start),
                }
            }
            SegmentSequence::Formula(formula) => {
                let index = self.cursor.segment_index.max(0) as u64;
                self.period_start + dur_mul(formula.duration, index)
            }
        }
    }
}

#[derive(Clone)]
pub struct DashSession {
    mpd: Mpd,
    manifest_url: Url,
    base_url: Url,
    options: BuilderOptions,
    timeline: PresentationTimeline,
    period_position: usize,
    streams: Vec<ActiveStream>,
    clock: Clock,
}

impl DashSession {
    pub fn parse(bytes: &[u8], manifest_url: Url) -> DashlingResult<Self> {
        Self::parse_with(bytes, manifest_url, BuilderOptions::default())
    }

    pub fn parse_with(
        bytes: &[u8],
        manifest_url: Url,
        options: BuilderOptions,
    ) -> DashlingResult<Self> {
        let mpd = builder::parse_mpd_with(bytes, &options)?;
        let base_url = apply_base_urls(&manifest_url, &mpd.base_urls)?;
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All)?;

        Ok(Self {
            mpd,
            manifest_url,
            base_url,
            options,
            timeline,
            period_position: 0,
            streams: Vec::new(),
            clock: Clock::new(),
        })
    }

    pub fn mpd(&self) -> &Mpd {
        &self.mpd
    }

    pub fn timeline(&self) -> &PresentationTimeline {
        &self.timeline
    }

    pub fn is_live(&self) -> bool {
        self.mpd.is_dynamic()
    }

    /// Declared presentation duration, or the end of the last resolved
    /// Period for presentations terminated by an explicit Period duration.
    pub fn media_presentation_duration(&self) -> Option<Duration> {
        self.mpd
            .media_presentation_duration
            .or_else(|| self.timeline.end())
    }

    /// `MPD@maxSegmentDuration`, falling back to the largest segment
    /// duration documented by the set-up streams.
    pub fn max_segment_duration(&self) -> Option<Duration> {
        if let Some(declared) = self.mpd.max_segment_duration {
            return Some(declared);
        }
        self.streams
            .iter()
            .filter_map(|stream| match &stream.sequence {
                SegmentSequence::Materialized(segments) => {
                    segments.iter().map(|segment| segment.duration).max()
                }
                SegmentSequence::Formula(formula) => Some(formula.duration),
            })
            .max()
    }

    pub fn utc_timing_sources(&self) -> &[UtcTimingSource] {
        &self.mpd.utc_timings
    }

    /// Synchronize the session clock against the manifest's UTCTiming
    /// sources.
    pub async fn sync_clock<F>(&mut self, fetcher: &F) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        self.clock.sync(&self.mpd.utc_timings, fetcher).await
    }

    /// Wall-clock "now" corrected by the last clock sync.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Parse a `"<n> f|s|ms"` presentation-delay override; `f` counts in
    /// maximum segment durations. Unparseable input means no delay.
    pub fn parse_default_presentation_delay(&self, value: &str) -> Duration {
        let trimmed = value.trim();
        let digits_end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let Ok(count) = trimmed[..digits_end].parse::<u64>() else {
            return Duration::ZERO;
        };
        if count == 0 {
            return Duration::ZERO;
        }

        match trimmed[digits_end..].trim_start() {
            suffix if suffix.starts_with(['s', 'S']) => Duration::from_secs(count),
            suffix if suffix.starts_with(['f', 'F']) => {
                dur_mul(self.max_segment_duration().unwrap_or_default(), count)
            }
            suffix if suffix.starts_with(['m', 'M']) => Duration::from_millis(count),
            _ => {
                tracing::warn!(value, "Unable to parse default presentation delay");
                Duration::ZERO
            }
        }
    }

    // ----- external references -----

    /// Resolve every `actuate="onLoad"` reference and re-run timeline
    /// resolution over the spliced tree.
    pub async fn resolve_external<F>(&mut self, fetcher: &F) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        let changed = xlink::resolve_on_load(
            &mut self.mpd,
            &self.base_url,
            &self.manifest_url,
            fetcher,
            &self.options,
        )
        .await?;
        if changed {
            self.timeline = PresentationTimeline::resolve(&self.mpd, ResolveTarget::All)?;
            self.period_position = self
                .period_position
                .min(self.timeline.len().saturating_sub(1));
        }
        Ok(())
    }

    /// Resolve one Period's `onRequest` reference by document index and
    /// splice the result in place.
    pub async fn resolve_period_reference<F>(
        &mut self,
        document_index: usize,
        fetcher: &F,
    ) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        let Some(period) = self.mpd.periods.get(document_index) else {
            return Err(DashlingError::Validation(format!(
                "no Period at document index {document_index}"
            )));
        };
        let Some(xlink) = period.xlink.clone() else {
            return Ok(());
        };

        let replacement = xlink::resolve_periods_on_request(
            fetcher,
            &self.base_url,
            &self.manifest_url,
            &xlink,
            &self.options,
        )
        .await?;
        self.mpd
            .periods
            .splice(document_index..=document_index, replacement);
        self.timeline = PresentationTimeline::resolve(&self.mpd, ResolveTarget::All)?;
        Ok(())
    }

    // ----- period selection -----

    pub fn period_count(&self) -> usize {
        self.timeline.len()
    }

    pub fn period_index(&self) -> usize {
        self.period_position
    }

    pub fn period_id(&self) -> Option<&str> {
        self.current_period().ok().and_then(|period| period.id.as_deref())
    }

    /// Switch the active Period. Active streams are dropped; the caller sets
    /// up streaming again for the new Period.
    pub fn set_period_index(&mut self, position: usize) -> DashlingResult<()> {
        if position >= self.timeline.len() {
            return Err(DashlingError::Validation(format!(
                "period index {position} out of range"
            )));
        }
        if position != self.period_position {
            self.period_position = position;
            self.streams.clear();
        }
        Ok(())
    }

    pub fn set_period_id(&mut self, id: &str) -> DashlingResult<()> {
        let position = self
            .timeline
            .periods()
            .iter()
            .position(|stream_period| {
                self.mpd
                    .periods
                    .get(stream_period.index)
                    .and_then(|period| period.id.as_deref())
                    == Some(id)
            })
            .ok_or_else(|| {
                DashlingError::Validation(format!("no Period with id {id:?}"))
            })?;
        self.set_period_index(position)
    }

    pub fn has_next_period(&self) -> bool {
        self.period_position + 1 < self.timeline.len()
    }

    pub fn has_previous_period(&self) -> bool {
        self.period_position > 0
    }

    /// Timeline position of the Period containing a wall-clock instant.
    pub fn period_index_at_time(&self, instant: DateTime<Utc>) -> Option<usize> {
        let offset = PresentationTimeline::presentation_time_of(&self.mpd, instant);
        self.timeline.period_index_at(offset)
    }

    fn stream_period(&self) -> DashlingResult<StreamPeriod> {
        self.timeline
            .get(self.period_position)
            .copied()
            .ok_or_else(|| DashlingError::Validation("no resolved Period".to_string()))
    }

    fn current_period(&self) -> DashlingResult<&Period> {
        let stream_period = self.stream_period()?;
        self.mpd
            .periods
            .get(stream_period.index)
            .ok_or_else(|| DashlingError::Validation("period index out of sync".to_string()))
    }

    // ----- adaptation sets and representations -----

    pub fn adaptation_sets(&self) -> DashlingResult<&[AdaptationSet]> {
        Ok(&self.current_period()?.adaptation_sets)
    }

    pub fn representations(&self, adaptation_index: usize) -> DashlingResult<&[Representation]> {
        let sets = self.adaptation_sets()?;
        sets.get(adaptation_index)
            .map(|set| set.representations.as_slice())
            .ok_or_else(|| {
                DashlingError::Validation(format!(
                    "adaptation set index {adaptation_index} out of range"
                ))
            })
    }

    /// Pick a Representation index under the given ceilings.
    pub fn select_representation(
        &self,
        adaptation_index: usize,
        constraints: &SelectionConstraints,
    ) -> DashlingResult<usize> {
        select::select_by_max_constraints(self.representations(adaptation_index)?, constraints)
            .ok_or(DashlingError::NoRepresentationFound)
    }

    // ----- streaming setup -----

    /// Resolve one Representation into an Active Stream and return its
    /// handle.
    pub fn setup_streaming(
        &mut self,
        adaptation_index: usize,
        representation_index: usize,
    ) -> DashlingResult<usize> {
        let stream = self.build_stream(adaptation_index, representation_index)?;
        self.streams.push(stream);
        Ok(self.streams.len() - 1)
    }

    /// Like [`Self::setup_streaming`], resolving an `onRequest` SegmentList
    /// reference in the effective chain just in time.
    pub async fn setup_streaming_fetched<F>(
        &mut self,
        adaptation_index: usize,
        representation_index: usize,
        fetcher: &F,
    ) -> DashlingResult<usize>
    where
        F: ManifestFetch,
    {
        self.resolve_segment_list_reference(adaptation_index, representation_index, fetcher)
            .await?;
        self.setup_streaming(adaptation_index, representation_index)
    }

    async fn resolve_segment_list_reference<F>(
        &mut self,
        adaptation_index: usize,
        representation_index: usize,
        fetcher: &F,
    ) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        use crate::model::AddressingDescriptor;

        let period_index = self.stream_period()?.index;
        let base_url = self.base_url.clone();
        let manifest_url = self.manifest_url.clone();

        let Some(period) = self.mpd.periods.get_mut(period_index) else {
            return Ok(());
        };
        let mut slots: Vec<&mut Option<AddressingDescriptor>> = vec![&mut period.addressing];
        if let Some(set) = period.adaptation_sets.get_mut(adaptation_index) {
            if let Some(representation) = set.representations.get_mut(representation_index) {
                slots.push(&mut representation.addressing);
            }
            slots.push(&mut set.addressing);
        }

        for slot in slots {
            let Some(AddressingDescriptor::List(list)) = slot else {
                continue;
            };
            let Some(xlink) = list.xlink.clone() else {
                continue;
            };
            match xlink::resolve_segment_list(fetcher, &base_url, &manifest_url, &xlink).await {
                Ok(Some(replacement)) => {
                    *slot = Some(AddressingDescriptor::List(replacement))
                }
                Ok(None) => *slot = None,
                Err(e) => {
                    tracing::warn!(href = %xlink.href, error = %e, "Failed to fetch SegmentList reference");
                    *slot = None;
                }
            }
        }
        Ok(())
    }

    fn build_stream(
        &self,
        adaptation_index: usize,
        representation_index: usize,
    ) -> DashlingResult<ActiveStream> {
        let stream_period = self.stream_period()?;
        let period = self.current_period()?;
        let set = period
            .adaptation_sets
            .get(adaptation_index)
            .ok_or_else(|| {
                DashlingError::Validation(format!(
                    "adaptation set index {adaptation_index} out of range"
                ))
            })?;
        let representation = set
            .representations
            .get(representation_index)
            .ok_or(DashlingError::NoRepresentationFound)?;

        let effective = inherit::effective_addressing(period, set, representation)?;
        if let EffectiveAddressing::List(list) = &effective {
            if list.xlink.is_some() && list.segment_urls.is_empty() {
                return Err(DashlingError::Validation(format!(
                    "Representation {:?}: SegmentList reference is unresolved",
                    representation.id
                )));
            }
        }
        let sequence = addressing::resolve_segments(
            &effective,
            stream_period.start,
            stream_period.duration,
        )?;

        let base_url = apply_base_urls(&self.base_url, &period.base_urls)?;
        let base_url = apply_base_urls(&base_url, &set.base_urls)?;
        let base_url = apply_base_urls(&base_url, &representation.base_urls)?;

        let (media_template, index_template, init_template) = match &effective {
            EffectiveAddressing::Template(template) => (
                template
                    .media
                    .as_deref()
                    .map(UrlTemplate::parse)
                    .transpose()?,
                template
                    .index
                    .as_deref()
                    .map(UrlTemplate::parse)
                    .transpose()?,
                template
                    .initialization
                    .as_deref()
                    .map(UrlTemplate::parse)
                    .transpose()?,
            ),
            _ => (None, None, None),
        };

        Ok(ActiveStream {
            adaptation_index,
            representation_index,
            representation_id: representation.id.clone(),
            bandwidth: representation.bandwidth,
            mime_type: representation
                .base
                .mime_type
                .clone()
                .or_else(|| set.base.mime_type.clone()),
            content_type: set
                .content_type
                .clone()
                .or_else(|| representation.base.mime_type.clone()),
            width: representation.base.width.or(set.base.width),
            height: representation.base.height.or(set.base.height),
            frame_rate: representation.base.frame_rate.or(set.base.frame_rate),
            audio_sampling_rate: representation
                .base
                .audio_sampling_rate
                .clone()
                .or_else(|| set.base.audio_sampling_rate.clone()),
            base_url,
            effective,
            media_template,
            index_template,
            init_template,
            sequence,
            cursor: SegmentCursor::default(),
            period_start: stream_period.start,
            period_duration: stream_period.duration,
        })
    }

    pub fn active_stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn active_stream(&self, stream_index: usize) -> DashlingResult<&ActiveStream> {
        self.streams.get(stream_index).ok_or_else(|| {
            DashlingError::Validation(format!("stream index {stream_index} out of range"))
        })
    }

    fn active_stream_mut(&mut self, stream_index: usize) -> DashlingResult<&mut ActiveStream> {
        self.streams.get_mut(stream_index).ok_or_else(|| {
            DashlingError::Validation(format!("stream index {stream_index} out of range"))
        })
    }

    // ----- fragment queries -----

    /// Describe the fragment under the stream's cursor, or `None` past the
    /// end of the addressed range.
    pub fn next_fragment(&self, stream_index: usize) -> DashlingResult<Option<FragmentInfo>> {
        let stream = self.active_stream(stream_index)?;
        if stream.cursor.segment_index < 0 {
            return Ok(None);
        }

        match &stream.sequence {
            SegmentSequence::Materialized(segments) => {
                let Some(segment) = segments.get(stream.cursor.segment_index as usize) else {
                    return Ok(None);
                };
                let repeat = stream.cursor.repeat_index.min(segment.repeat);
                let timestamp = segment.instance_start(repeat);
                let duration = segment.duration;

                if let Some(url) = &segment.url {
                    let uri = match &url.media {
                        Some(media) => merge_baseurls(&stream.base_url, media)?,
                        None => stream.base_url.clone(),
                    };
                    let index_uri = url
                        .index
                        .as_deref()
                        .map(|index| merge_baseurls(&stream.base_url, index))
                        .transpose()?;
                    let byte_range = url.media_range;
                    let mut index_range = url.index_range;
                    if index_uri.is_none() && index_range.is_some() && byte_range.is_none() {
                        // Without a media range the index bytes would be
                        // served twice from the same URI.
                        tracing::warn!(
                            "Ignoring index range: no media range and the URIs would be the same"
                        );
                        index_range = None;
                    }
                    Ok(Some(FragmentInfo {
                        uri,
                        byte_range,
                        index_uri,
                        index_range,
                        timestamp,
                        duration,
                    }))
                } else if let Some(template) = &stream.media_template {
                    let args = TemplateArgs {
                        representation_id: &stream.representation_id,
                        number: segment.number + repeat,
                        bandwidth: stream.bandwidth,
                        time: segment.scale_start + segment.scale_duration * repeat,
                    };
                    let uri = merge_baseurls(&stream.base_url, &template.expand(&args)?)?;
                    let index_uri = stream
                        .index_template
                        .as_ref()
                        .map(|template| template.expand(&args))
                        .transpose()?
                        .map(|index| merge_baseurls(&stream.base_url, &index))
                        .transpose()?;
                    Ok(Some(FragmentInfo {
                        uri,
                        byte_range: None,
                        index_uri,
                        index_range: None,
                        timestamp,
                        duration,
                    }))
                } else {
                    // Single-segment mode: the composed BaseURL is the media.
                    let index_range = match &stream.effective {
                        EffectiveAddressing::Base(base) => base.index_range,
                        _ => None,
                    };
                    Ok(Some(FragmentInfo {
                        uri: stream.base_url.clone(),
                        byte_range: None,
                        index_uri: None,
                        index_range,
                        timestamp,
                        duration,
                    }))
                }
            }
            SegmentSequence::Formula(formula) => {
                let index = stream.cursor.segment_index as u64;
                if formula.count.is_some_and(|count| index >= count) {
                    return Ok(None);
                }
                let timestamp = stream.period_start + dur_mul(formula.duration, index);
                // The final segment of a bounded Period may be short.
                let duration = match stream.period_duration {
                    Some(period_duration) => {
                        formula
                            .duration
                            .min((stream.period_start + period_duration) - timestamp)
                    }
                    None => formula.duration,
                };

                let args = TemplateArgs {
                    representation_id: &stream.representation_id,
                    number: formula.start_number + index,
                    bandwidth: stream.bandwidth,
                    time: formula.scale_duration * index,
                };
                let uri = match &stream.media_template {
                    Some(template) => merge_baseurls(&stream.base_url, &template.expand(&args)?)?,
                    None => stream.base_url.clone(),
                };
                let index_uri = stream
                    .index_template
                    .as_ref()
                    .map(|template| template.expand(&args))
                    .transpose()?
                    .map(|index| merge_baseurls(&stream.base_url, &index))
                    .transpose()?;

                Ok(Some(FragmentInfo {
                    uri,
                    byte_range: None,
                    index_uri,
                    index_range: None,
                    timestamp,
                    duration,
                }))
            }
        }
    }

    /// Initialization header for the stream's Representation, if any.
    pub fn next_header(&self, stream_index: usize) -> DashlingResult<Option<HeaderInfo>> {
        let stream = self.active_stream(stream_index)?;

        if let Some(template) = &stream.init_template {
            let args = TemplateArgs {
                representation_id: &stream.representation_id,
                bandwidth: stream.bandwidth,
                ..Default::default()
            };
            let uri = merge_baseurls(&stream.base_url, &template.expand(&args)?)?;
            return Ok(Some(HeaderInfo { uri, range: None }));
        }

        let initialization = match &stream.effective {
            EffectiveAddressing::Base(base) => base.initialization.clone(),
            EffectiveAddressing::List(list) => list.mult.base.initialization.clone(),
            EffectiveAddressing::Template(template) => {
                template.mult.base.initialization.clone()
            }
            EffectiveAddressing::None => None,
        };
        self.header_from_url_type(stream, initialization)
    }

    /// Representation index header for the stream, if any.
    pub fn next_header_index(&self, stream_index: usize) -> DashlingResult<Option<HeaderInfo>> {
        let stream = self.active_stream(stream_index)?;

        let segment_base = match &stream.effective {
            EffectiveAddressing::Base(base) => Some(base),
            EffectiveAddressing::List(list) => Some(&list.mult.base),
            EffectiveAddressing::Template(template) => Some(&template.mult.base),
            EffectiveAddressing::None => None,
        };
        let Some(segment_base) = segment_base else {
            return Ok(None);
        };

        if let Some(index) = segment_base.representation_index.clone() {
            return self.header_from_url_type(stream, Some(index));
        }
        // An index range without its own URL points into the media resource.
        if let Some(range) = segment_base.index_range {
            return Ok(Some(HeaderInfo {
                uri: stream.base_url.clone(),
                range: Some(range),
            }));
        }
        Ok(None)
    }

    fn header_from_url_type(
        &self,
        stream: &ActiveStream,
        url_type: Option<UrlType>,
    ) -> DashlingResult<Option<HeaderInfo>> {
        match url_type {
            Some(UrlType { source_url, range }) => {
                let uri = match source_url {
                    Some(source_url) => merge_baseurls(&stream.base_url, &source_url)?,
                    None => stream.base_url.clone(),
                };
                Ok(Some(HeaderInfo { uri, range }))
            }
            None => Ok(None),
        }
    }

    // ----- navigation -----

    pub fn has_next_segment(
        &self,
        stream_index: usize,
        forward: bool,
    ) -> DashlingResult<bool> {
        let stream = self.active_stream(stream_index)?;
        Ok(navigator::has_next_segment(
            &stream.sequence,
            &stream.cursor,
            forward,
        ))
    }

    pub fn advance_segment(
        &mut self,
        stream_index: usize,
        forward: bool,
    ) -> DashlingResult<Advance> {
        let stream = self.active_stream_mut(stream_index)?;
        Ok(navigator::advance(
            &stream.sequence,
            &mut stream.cursor,
            forward,
        ))
    }

    pub fn seek_to_time(
        &mut self,
        stream_index: usize,
        ts: Duration,
        forward: bool,
        snap: Snap,
    ) -> DashlingResult<SeekResult> {
        let stream = self.active_stream_mut(stream_index)?;
        Ok(navigator::seek_to_time(
            &stream.sequence,
            &mut stream.cursor,
            stream.period_start,
            ts,
            forward,
            snap,
        ))
    }

    pub fn seek_to_first_segment(&mut self) {
        for stream in &mut self.streams {
            stream.cursor.rewind();
        }
    }

    /// Seek every active stream to the given wall-clock instant. Returns
    /// whether every stream found a segment there.
    pub fn seek_to_wall_clock(&mut self, instant: DateTime<Utc>) -> DashlingResult<bool> {
        let ts = PresentationTimeline::presentation_time_of(&self.mpd, instant);
        let mut all_found = true;
        for stream_index in 0..self.streams.len() {
            let result = self.seek_to_time(stream_index, ts, true, Snap::None)?;
            all_found &= matches!(result, SeekResult::Found(_));
        }
        Ok(all_found)
    }

    // ----- live refresh -----

    /// Replace the manifest with a freshly fetched copy. Active streams are
    /// re-established by Representation id and their cursors re-derived from
    /// the current presentation time, never from raw indices (indices are
    /// not stable once a refresh drops expired Periods). A refresh that
    /// fails to parse or validate leaves the previous tree untouched.
    pub fn refresh(&mut self, bytes: &[u8]) -> DashlingResult<()> {
        let mpd = builder::parse_mpd_with(bytes, &self.options)?;
        let base_url = apply_base_urls(&self.manifest_url, &mpd.base_urls)?;
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All)?;

        struct SavedStream {
            adaptation_index: usize,
            representation_id: String,
            position: Duration,
        }
        let saved: Vec<SavedStream> = self
            .streams
            .iter()
            .map(|stream| SavedStream {
                adaptation_index: stream.adaptation_index,
                representation_id: stream.representation_id.clone(),
                position: stream.current_position(),
            })
            .collect();
        let previous_period_id = self.period_id().map(str::to_string);

        self.mpd = mpd;
        self.base_url = base_url;
        self.timeline = timeline;
        self.streams.clear();

        self.period_position = previous_period_id
            .and_then(|id| {
                self.timeline.periods().iter().position(|stream_period| {
                    self.mpd
                        .periods
                        .get(stream_period.index)
                        .and_then(|period| period.id.as_deref())
                        == Some(id.as_str())
                })
            })
            .unwrap_or_else(|| {
                self.period_position
                    .min(self.timeline.len().saturating_sub(1))
            });

        for saved in saved {
            let Ok(sets) = self.adaptation_sets() else {
                break;
            };
            let Some(set) = sets.get(saved.adaptation_index) else {
                tracing::warn!(
                    representation = %saved.representation_id,
                    "AdaptationSet disappeared on refresh, dropping stream"
                );
                continue;
            };
            let Some(representation_index) = set
                .representations
                .iter()
                .position(|representation| representation.id == saved.representation_id)
            else {
                tracing::warn!(
                    representation = %saved.representation_id,
                    "Representation disappeared on refresh, dropping stream"
                );
                continue;
            };

            match self.build_stream(saved.adaptation_index, representation_index) {
                Ok(mut stream) => {
                    let result = navigator::seek_to_time(
                        &stream.sequence,
                        &mut stream.cursor,
                        stream.period_start,
                        saved.position,
                        true,
                        Snap::None,
                    );
                    if result == SeekResult::NotFound {
                        tracing::debug!(
                            representation = %stream.representation_id,
                            "Stream position past the refreshed range (live edge)"
                        );
                    }
                    self.streams.push(stream);
                }
                Err(e) => {
                    tracing::warn!(
                        representation = %saved.representation_id,
                        error = %e,
                        "Failed to re-establish stream after refresh"
                    );
                }
            }
        }

        Ok(())
    }
}
