//! Resolution of an effective addressing descriptor into a concrete,
//! time-addressable segment sequence.
//!
//! Explicit lists and timelines materialize into an ordered entry list; a
//! SegmentTemplate with a fixed duration stays a closed-form formula that is
//! evaluated on demand. All presentation-clock values are Period-absolute.

use std::time::Duration;

use crate::error::{DashlingError, DashlingResult};
use crate::inherit::EffectiveAddressing;
use crate::model::{MultiSegmentBase, SegmentList, SegmentTimeline, SegmentUrl};

/// One materialized segment entry. A timeline entry with repeats covers
/// `repeat + 1` equal instances; explicit SegmentURL-backed entries always
/// have `repeat == 0`.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    /// `$Number$` of the first instance of this entry.
    pub number: u64,
    /// Additional repeats after the first instance.
    pub repeat: u64,
    /// Start of the first instance in timescale units (`$Time$`).
    pub scale_start: u64,
    /// Instance duration in timescale units.
    pub scale_duration: u64,
    /// Presentation-clock start of the first instance.
    pub start: Duration,
    /// Presentation-clock duration of one instance. The final instance of a
    /// clipped entry may be shorter than `scale_duration` suggests.
    pub duration: Duration,
    pub url: Option<SegmentUrl>,
}

impl MediaSegment {
    pub fn instance_count(&self) -> u64 {
        self.repeat + 1
    }

    pub fn instance_start(&self, repeat_index: u64) -> Duration {
        self.start + dur_mul(self.duration, repeat_index)
    }

    pub fn end(&self) -> Duration {
        self.start + dur_mul(self.duration, self.instance_count())
    }
}

/// Closed-form addressing: evenly spaced segments described by a template.
#[derive(Debug, Clone)]
pub struct SegmentFormula {
    pub start_number: u64,
    /// One segment duration in timescale units (`$Time$` step).
    pub scale_duration: u64,
    pub duration: Duration,
    /// Number of segments when the Period duration is known; `None` means
    /// unbounded (a live Period without a declared duration).
    pub count: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum SegmentSequence {
    Materialized(Vec<MediaSegment>),
    Formula(SegmentFormula),
}

impl SegmentSequence {
    /// Entry count for cursor bounds: materialized entries, or the formula's
    /// segment count (`None` when unbounded).
    pub fn entry_count(&self) -> Option<u64> {
        match self {
            SegmentSequence::Materialized(segments) => Some(segments.len() as u64),
            SegmentSequence::Formula(formula) => formula.count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == Some(0)
    }
}

/// Resolve the effective descriptor for one Representation into its segment
/// sequence. `period_start`/`period_duration` come from the presentation
/// timeline; segments never extend past the Period end.
pub fn resolve_segments(
    effective: &EffectiveAddressing,
    period_start: Duration,
    period_duration: Option<Duration>,
) -> DashlingResult<SegmentSequence> {
    match effective {
        EffectiveAddressing::None | EffectiveAddressing::Base(_) => {
            // A single segment spanning the whole Period, addressed by the
            // BaseURL chain alone.
            let duration = period_duration.ok_or_else(|| {
                DashlingError::Validation(
                    "single-segment addressing requires a bounded Period".to_string(),
                )
            })?;
            Ok(SegmentSequence::Materialized(vec![MediaSegment {
                number: 1,
                repeat: 0,
                scale_start: 0,
                scale_duration: duration_to_scale(duration, 1),
                start: period_start,
                duration,
                url: None,
            }]))
        }
        EffectiveAddressing::List(list) => {
            resolve_list(list, period_start, period_duration)
        }
        EffectiveAddressing::Template(template) => match &template.mult.timeline {
            Some(timeline) => {
                let mut segments =
                    timeline_entries(timeline, &template.mult, period_start, period_duration)?;
                clip_to_period(&mut segments, period_start, period_duration);
                Ok(SegmentSequence::Materialized(segments))
            }
            None => resolve_formula(&template.mult, period_duration),
        },
    }
}

fn resolve_list(
    list: &SegmentList,
    period_start: Duration,
    period_duration: Option<Duration>,
) -> DashlingResult<SegmentSequence> {
    if list.segment_urls.is_empty() {
        return Err(DashlingError::Validation(
            "SegmentList without SegmentURL entries".to_string(),
        ));
    }

    let timescale = list.mult.base.timescale();
    let mut segments = Vec::new();

    if let Some(timeline) = &list.mult.timeline {
        // Each repeat instance consumes one SegmentURL in document order.
        let entries = timeline_entries(timeline, &list.mult, period_start, period_duration)?;
        let mut urls = list.segment_urls.iter();
        for entry in entries {
            for repeat_index in 0..entry.instance_count() {
                let url = urls.next().ok_or_else(|| {
                    DashlingError::Validation(
                        "SegmentTimeline does not have a matching SegmentURL".to_string(),
                    )
                })?;
                segments.push(MediaSegment {
                    number: entry.number + repeat_index,
                    repeat: 0,
                    scale_start: entry.scale_start + entry.scale_duration * repeat_index,
                    scale_duration: entry.scale_duration,
                    start: entry.instance_start(repeat_index),
                    duration: entry.duration,
                    url: Some(url.clone()),
                });
            }
        }
    } else {
        let scale_duration = list.mult.duration.ok_or_else(|| {
            DashlingError::Validation(
                "SegmentList has neither duration nor timeline".to_string(),
            )
        })?;
        let duration = scale_to_duration(scale_duration, timescale);
        let start_number = list.mult.start_number();
        for (index, url) in list.segment_urls.iter().enumerate() {
            let scale_start = scale_duration * index as u64;
            segments.push(MediaSegment {
                number: start_number + index as u64,
                repeat: 0,
                scale_start,
                scale_duration,
                start: period_start + scale_to_duration(scale_start, timescale),
                duration,
                url: Some(url.clone()),
            });
        }
    }

    clip_to_period(&mut segments, period_start, period_duration);
    Ok(SegmentSequence::Materialized(segments))
}

fn resolve_formula(
    mult: &MultiSegmentBase,
    period_duration: Option<Duration>,
) -> DashlingResult<SegmentSequence> {
    let timescale = mult.base.timescale();
    let (scale_duration, duration) = match mult.duration {
        Some(scale_duration) => (scale_duration, scale_to_duration(scale_duration, timescale)),
        None => {
            // No fixed duration: the whole Period is one templated segment.
            let duration = period_duration.ok_or_else(|| {
                DashlingError::Validation(
                    "SegmentTemplate without duration in an unbounded Period".to_string(),
                )
            })?;
            (duration_to_scale(duration, timescale), duration)
        }
    };
    if duration.is_zero() {
        return Err(DashlingError::Validation(
            "SegmentTemplate with zero segment duration".to_string(),
        ));
    }

    let count = match mult.duration {
        Some(_) => period_duration.map(|period| {
            let step = duration.as_nanos().max(1);
            ((period.as_nanos() + step - 1) / step) as u64
        }),
        None => Some(1),
    };

    Ok(SegmentSequence::Formula(SegmentFormula {
        start_number: mult.start_number(),
        scale_duration,
        duration,
        count,
    }))
}

/// Walk a SegmentTimeline into per-`S` entries with resolved repeat counts.
/// `t` resets the running clock, its absence continues from the previous
/// entry's end; a negative `r` repeats up to the next entry's `t` or to the
/// Period end.
fn timeline_entries(
    timeline: &SegmentTimeline,
    mult: &MultiSegmentBase,
    period_start: Duration,
    period_duration: Option<Duration>,
) -> DashlingResult<Vec<MediaSegment>> {
    let timescale = mult.base.timescale();
    let offset = scale_to_duration(mult.base.presentation_time_offset.unwrap_or(0), timescale);
    let period_end_scale = period_duration.map(|duration| {
        mult.base.presentation_time_offset.unwrap_or(0) + duration_to_scale(duration, timescale)
    });

    let mut segments: Vec<MediaSegment> = Vec::with_capacity(timeline.entries.len());
    let mut number = mult.start_number();
    let mut scale_time = timeline.entries.first().and_then(|entry| entry.t).unwrap_or(0);

    for (index, entry) in timeline.entries.iter().enumerate() {
        if let Some(t) = entry.t {
            scale_time = t;
        }

        let repeat = if entry.r >= 0 {
            entry.r as u64
        } else {
            let end_scale = timeline.entries.get(index + 1).and_then(|next| next.t);
            let end_scale = end_scale.or(period_end_scale).ok_or_else(|| {
                DashlingError::Validation(
                    "open-ended SegmentTimeline repeat in an unbounded Period".to_string(),
                )
            })?;
            let total = end_scale.saturating_sub(scale_time) / entry.d;
            if total == 0 {
                return Err(DashlingError::Validation(
                    "SegmentTimeline repeat resolves to no segments".to_string(),
                ));
            }
            total - 1
        };

        let start =
            period_start + scale_to_duration(scale_time, timescale).saturating_sub(offset);
        if let Some(previous) = segments.last() {
            if start < previous.instance_start(previous.repeat) {
                return Err(DashlingError::Validation(
                    "SegmentTimeline start times are not non-decreasing".to_string(),
                ));
            }
        }

        segments.push(MediaSegment {
            number,
            repeat,
            scale_start: scale_time,
            scale_duration: entry.d,
            start,
            duration: scale_to_duration(entry.d, timescale),
            url: None,
        });

        number += repeat + 1;
        scale_time += entry.d * (repeat + 1);
    }

    Ok(segments)
}

/// Clip materialized segments to the Period end: the instance straddling the
/// boundary is truncated to end exactly there, and anything entirely past it
/// is discarded.
fn clip_to_period(
    segments: &mut Vec<MediaSegment>,
    period_start: Duration,
    period_duration: Option<Duration>,
) {
    let Some(period_duration) = period_duration else {
        return;
    };
    let period_end = period_start + period_duration;

    let mut index = 0;
    while index < segments.len() {
        if segments[index].end() <= period_end {
            index += 1;
            continue;
        }

        let entry = segments[index].clone();
        if entry.start >= period_end {
            tracing::warn!(
                discarded = segments.len() - index,
                "Discarding segments outside the Period"
            );
            segments.truncate(index);
            return;
        }

        let available = period_end - entry.start;
        let whole = (available.as_nanos() / entry.duration.as_nanos().max(1)) as u64;
        let remainder = available - dur_mul(entry.duration, whole);

        segments.truncate(index);
        if whole > 0 {
            segments.push(MediaSegment {
                repeat: whole - 1,
                ..entry.clone()
            });
        }
        if !remainder.is_zero() {
            segments.push(MediaSegment {
                number: entry.number + whole,
                repeat: 0,
                scale_start: entry.scale_start + entry.scale_duration * whole,
                scale_duration: entry.scale_duration,
                start: entry.start + dur_mul(entry.duration, whole),
                duration: remainder,
                url: entry.url,
            });
        }
        return;
    }
}

pub(crate) fn scale_to_duration(units: u64, timescale: u32) -> Duration {
    let timescale = timescale.max(1) as u64;
    let secs = units / timescale;
    let rem = units % timescale;
    let nanos = (rem as u128 * 1_000_000_000 / timescale as u128) as u32;
    Duration::new(secs, nanos)
}

pub(crate) fn duration_to_scale(duration: Duration, timescale: u32) -> u64 {
    (duration.as_nanos() * timescale.max(1) as u128 / 1_000_000_000) as u64
}

pub(crate) fn dur_mul(duration: Duration, n: u64) -> Duration {
    let total = duration.as_nanos() * n as u128;
    Duration::new(
        (total / 1_000_000_000) as u64,
        (total % 1_000_000_000) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SegmentBase, SegmentTemplate, SEntry};

    fn timeline_template(entries: Vec<SEntry>, timescale: u32) -> EffectiveAddressing {
        EffectiveAddressing::Template(SegmentTemplate {
            media: Some("$Time$.m4s".to_string()),
            mult: MultiSegmentBase {
                base: SegmentBase {
                    timescale: Some(timescale),
                    ..Default::default()
                },
                timeline: Some(SegmentTimeline { entries }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn expand(sequence: &SegmentSequence) -> Vec<(Duration, Duration)> {
        let SegmentSequence::Materialized(segments) = sequence else {
            panic!("expected a materialized sequence");
        };
        segments
            .iter()
            .flat_map(|segment| {
                (0..segment.instance_count())
                    .map(|r| (segment.instance_start(r), segment.duration))
            })
            .collect()
    }

    #[test]
    fn test_timeline_expansion() {
        let effective = timeline_template(
            vec![
                SEntry {
                    t: Some(0),
                    d: 10,
                    r: 2,
                },
                SEntry { t: None, d: 5, r: 0 },
            ],
            1,
        );
        let sequence = resolve_segments(&effective, Duration::ZERO, None).unwrap();

        let instances = expand(&sequence);
        assert_eq!(
            instances,
            vec![
                (Duration::from_secs(0), Duration::from_secs(10)),
                (Duration::from_secs(10), Duration::from_secs(10)),
                (Duration::from_secs(20), Duration::from_secs(10)),
                (Duration::from_secs(30), Duration::from_secs(5)),
            ]
        );
    }

    #[test]
    fn test_timeline_clipping_to_period() {
        let effective = timeline_template(
            vec![
                SEntry {
                    t: Some(0),
                    d: 10,
                    r: 2,
                },
                SEntry { t: None, d: 5, r: 0 },
            ],
            1,
        );
        let sequence =
            resolve_segments(&effective, Duration::ZERO, Some(Duration::from_secs(25))).unwrap();

        let instances = expand(&sequence);
        assert_eq!(
            instances,
            vec![
                (Duration::from_secs(0), Duration::from_secs(10)),
                (Duration::from_secs(10), Duration::from_secs(10)),
                (Duration::from_secs(20), Duration::from_secs(5)),
            ]
        );
    }

    #[test]
    fn test_negative_repeat_runs_to_next_entry() {
        let effective = timeline_template(
            vec![
                SEntry {
                    t: Some(0),
                    d: 10,
                    r: -1,
                },
                SEntry {
                    t: Some(40),
                    d: 5,
                    r: 0,
                },
            ],
            1,
        );
        let sequence = resolve_segments(&effective, Duration::ZERO, None).unwrap();
        let instances = expand(&sequence);
        assert_eq!(instances.len(), 5);
        assert_eq!(instances[3].0, Duration::from_secs(30));
        assert_eq!(instances[4].0, Duration::from_secs(40));
    }

    #[test]
    fn test_negative_repeat_runs_to_period_end() {
        let effective = timeline_template(
            vec![SEntry {
                t: Some(0),
                d: 10,
                r: -1,
            }],
            1,
        );
        let sequence =
            resolve_segments(&effective, Duration::ZERO, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(expand(&sequence).len(), 3);

        let unbounded = resolve_segments(&effective, Duration::ZERO, None);
        assert!(matches!(unbounded, Err(DashlingError::Validation(_))));
    }

    #[test]
    fn test_formula_mode() {
        let effective = EffectiveAddressing::Template(SegmentTemplate {
            media: Some("$Number$.m4s".to_string()),
            mult: MultiSegmentBase {
                base: SegmentBase {
                    timescale: Some(1000),
                    ..Default::default()
                },
                duration: Some(2000),
                start_number: Some(5),
                ..Default::default()
            },
            ..Default::default()
        });

        let sequence =
            resolve_segments(&effective, Duration::ZERO, Some(Duration::from_secs(7))).unwrap();
        let SegmentSequence::Formula(formula) = &sequence else {
            panic!("expected a formula");
        };
        assert_eq!(formula.start_number, 5);
        assert_eq!(formula.duration, Duration::from_secs(2));
        // 7s of period at 2s per segment: the last one is short but counted.
        assert_eq!(formula.count, Some(4));

        let unbounded = resolve_segments(&effective, Duration::ZERO, None).unwrap();
        assert_eq!(unbounded.entry_count(), None);
    }

    #[test]
    fn test_single_segment_mode() {
        let sequence = resolve_segments(
            &EffectiveAddressing::None,
            Duration::from_secs(10),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        let SegmentSequence::Materialized(segments) = &sequence else {
            panic!("expected materialized");
        };
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, Duration::from_secs(10));
        assert_eq!(segments[0].duration, Duration::from_secs(30));
    }

    #[test]
    fn test_presentation_time_offset_shifts_starts() {
        let effective = EffectiveAddressing::Template(SegmentTemplate {
            media: Some("$Time$.m4s".to_string()),
            mult: MultiSegmentBase {
                base: SegmentBase {
                    timescale: Some(1),
                    presentation_time_offset: Some(100),
                    ..Default::default()
                },
                timeline: Some(SegmentTimeline {
                    entries: vec![SEntry {
                        t: Some(100),
                        d: 10,
                        r: 1,
                    }],
                }),
                ..Default::default()
            },
            ..Default::default()
        });
        let sequence =
            resolve_segments(&effective, Duration::from_secs(50), None).unwrap();
        let instances = expand(&sequence);
        // t=100 with an offset of 100 maps to the period start.
        assert_eq!(instances[0].0, Duration::from_secs(50));
        assert_eq!(instances[1].0, Duration::from_secs(60));
    }
}
