//! Per-stream segment cursor: advance and time-based seek.
//!
//! The cursor addresses a materialized entry plus a repeat instance inside
//! it, or a bare index in formula mode (a timeline is always materialized
//! before it reaches this module, so the formula paths never see one).
//! `EndOfStream` and `NotFound` are expected control-flow signals: the
//! caller stops playback or refreshes a live manifest, nothing failed.

use std::time::Duration;

use crate::addressing::{dur_mul, MediaSegment, SegmentFormula, SegmentSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved,
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Snap {
    #[default]
    None,
    Nearest,
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekResult {
    /// Resolved to the exact start time of the selected instance.
    Found(Duration),
    /// The time lies past the addressed range; the cursor parks past the end.
    NotFound,
}

/// `segment_index == -1` means "before the first segment" (reverse playback
/// exhausts the stream there).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentCursor {
    pub segment_index: i64,
    pub repeat_index: u64,
}

impl SegmentCursor {
    pub fn rewind(&mut self) {
        self.segment_index = 0;
        self.repeat_index = 0;
    }
}

pub fn has_next_segment(
    sequence: &SegmentSequence,
    cursor: &SegmentCursor,
    forward: bool,
) -> bool {
    if !forward {
        return cursor.segment_index >= 0;
    }
    match sequence {
        SegmentSequence::Materialized(segments) => {
            let count = segments.len() as i64;
            if cursor.segment_index < 0 {
                return count > 0;
            }
            if cursor.segment_index + 1 == count {
                let segment = &segments[cursor.segment_index as usize];
                cursor.repeat_index < segment.repeat
            } else {
                cursor.segment_index + 1 < count
            }
        }
        SegmentSequence::Formula(formula) => match formula.count {
            Some(count) => cursor.segment_index + 1 < count as i64,
            None => true,
        },
    }
}

pub fn advance(sequence: &SegmentSequence, cursor: &mut SegmentCursor, forward: bool) -> Advance {
    match sequence {
        SegmentSequence::Materialized(segments) => advance_materialized(segments, cursor, forward),
        SegmentSequence::Formula(formula) => advance_formula(formula, cursor, forward),
    }
}

fn advance_materialized(
    segments: &[MediaSegment],
    cursor: &mut SegmentCursor,
    forward: bool,
) -> Advance {
    let count = segments.len() as i64;

    if forward {
        if cursor.segment_index >= count {
            return Advance::EndOfStream;
        }
        // Playback direction reverted right at the start of the list.
        if cursor.segment_index < 0 {
            cursor.segment_index = 0;
            cursor.repeat_index = 0;
            return Advance::Moved;
        }
        let segment = &segments[cursor.segment_index as usize];
        if cursor.repeat_index >= segment.repeat {
            cursor.repeat_index = 0;
            cursor.segment_index += 1;
            if cursor.segment_index >= count {
                return Advance::EndOfStream;
            }
        } else {
            cursor.repeat_index += 1;
        }
        Advance::Moved
    } else {
        if cursor.segment_index < 0 {
            return Advance::EndOfStream;
        }
        // Direction reverted right past the end of the list.
        if cursor.segment_index >= count {
            if count == 0 {
                cursor.segment_index = -1;
                return Advance::EndOfStream;
            }
            cursor.segment_index = count - 1;
            cursor.repeat_index = segments[cursor.segment_index as usize].repeat;
            return Advance::Moved;
        }
        if cursor.repeat_index == 0 {
            cursor.segment_index -= 1;
            if cursor.segment_index < 0 {
                return Advance::EndOfStream;
            }
            cursor.repeat_index = segments[cursor.segment_index as usize].repeat;
        } else {
            cursor.repeat_index -= 1;
        }
        Advance::Moved
    }
}

fn advance_formula(
    formula: &SegmentFormula,
    cursor: &mut SegmentCursor,
    forward: bool,
) -> Advance {
    cursor.repeat_index = 0;
    if forward {
        let count = formula.count.map(|count| count as i64);
        if count.is_some_and(|count| cursor.segment_index >= count) {
            return Advance::EndOfStream;
        }
        if cursor.segment_index < 0 {
            cursor.segment_index = 0;
            return Advance::Moved;
        }
        cursor.segment_index += 1;
        if count.is_some_and(|count| cursor.segment_index >= count) {
            return Advance::EndOfStream;
        }
        Advance::Moved
    } else {
        cursor.segment_index -= 1;
        if cursor.segment_index < 0 {
            cursor.segment_index = -1;
            return Advance::EndOfStream;
        }
        Advance::Moved
    }
}

/// Locate the instance containing `ts` and apply the snap policy. The
/// containment interval is half-open on the far side of the travel
/// direction, so seeking backward to an instance's exact end does not pull
/// in one nanosecond of the following instance.
pub fn seek_to_time(
    sequence: &SegmentSequence,
    cursor: &mut SegmentCursor,
    period_start: Duration,
    ts: Duration,
    forward: bool,
    snap: Snap,
) -> SeekResult {
    match sequence {
        SegmentSequence::Materialized(segments) => {
            seek_materialized(segments, cursor, ts, forward, snap)
        }
        SegmentSequence::Formula(formula) => {
            seek_formula(formula, cursor, period_start, ts, forward, snap)
        }
    }
}

fn seek_materialized(
    segments: &[MediaSegment],
    cursor: &mut SegmentCursor,
    ts: Duration,
    forward: bool,
    snap: Snap,
) -> SeekResult {
    let mut selected: Option<(usize, u64)> = None;

    for (index, segment) in segments.iter().enumerate() {
        let end = segment.end();
        let in_segment = if forward { ts < end } else { ts <= end };
        if !in_segment {
            continue;
        }

        let offset = ts.saturating_sub(segment.start);
        let step = segment.duration.as_nanos().max(1);
        let mut repeat_index = (offset.as_nanos() / step) as u64;
        // At the end of an instance in reverse mode, start from the previous
        // instance.
        if !forward && repeat_index > 0 && offset.as_nanos() % step == 0 {
            repeat_index -= 1;
        }
        let mut repeat_index = repeat_index.min(segment.repeat);
        let mut index = index;

        let chunk_time = segment.instance_start(repeat_index);
        match snap {
            Snap::Nearest => {
                if repeat_index < segment.repeat {
                    let to_current = ts.saturating_sub(chunk_time);
                    let to_next = (chunk_time + segment.duration).saturating_sub(ts);
                    if to_current > to_next {
                        repeat_index += 1;
                    }
                } else if index + 1 < segments.len() {
                    let next = &segments[index + 1];
                    let to_current = ts.saturating_sub(chunk_time);
                    let to_next = next.start.saturating_sub(ts);
                    if to_current > to_next {
                        index += 1;
                        repeat_index = 0;
                    }
                }
            }
            Snap::After | Snap::Before
                if ((forward && snap == Snap::After) || (!forward && snap == Snap::Before))
                    && ts != chunk_time =>
            {
                if repeat_index < segment.repeat {
                    repeat_index += 1;
                } else {
                    repeat_index = 0;
                    index += 1;
                    if index >= segments.len() {
                        // Snapped past the last instance.
                        cursor.segment_index = segments.len() as i64;
                        cursor.repeat_index = 0;
                        return SeekResult::NotFound;
                    }
                }
            }
            _ => {}
        }

        selected = Some((index, repeat_index));
        break;
    }

    match selected {
        Some((index, repeat_index)) => {
            cursor.segment_index = index as i64;
            cursor.repeat_index = repeat_index;
            SeekResult::Found(segments[index].instance_start(repeat_index))
        }
        None => {
            cursor.segment_index = segments.len() as i64;
            cursor.repeat_index = 0;
            SeekResult::NotFound
        }
    }
}

fn seek_formula(
    formula: &SegmentFormula,
    cursor: &mut SegmentCursor,
    period_start: Duration,
    ts: Duration,
    forward: bool,
    snap: Snap,
) -> SeekResult {
    debug_assert!(
        !formula.duration.is_zero(),
        "formula addressing requires a non-zero segment duration"
    );

    let ts = ts.saturating_sub(period_start);
    let step = formula.duration.as_nanos().max(1);
    let mut index = (ts.as_nanos() / step) as u64;
    if !forward && index > 0 && ts.as_nanos() % step == 0 {
        index -= 1;
    }

    let index_time = dur_mul(formula.duration, index);
    match snap {
        Snap::Nearest => {
            let to_current = ts.saturating_sub(index_time);
            let to_next = (index_time + formula.duration).saturating_sub(ts);
            if to_current > to_next {
                index += 1;
            }
        }
        Snap::After if forward && ts != index_time => index += 1,
        Snap::Before if !forward && ts != index_time => index += 1,
        _ => {}
    }

    if let Some(count) = formula.count {
        if index >= count {
            cursor.segment_index = count as i64;
            cursor.repeat_index = 0;
            return SeekResult::NotFound;
        }
    }

    cursor.segment_index = index as i64;
    cursor.repeat_index = 0;
    SeekResult::Found(period_start + dur_mul(formula.duration, index))
}
