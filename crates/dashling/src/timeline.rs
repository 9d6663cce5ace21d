//! Presentation timeline construction.
//!
//! Periods map onto the presentation clock through a running chain: a Period
//! starts where it says, else where the previous one ended; its duration
//! comes from the next Period's start, its own declaration, or the
//! presentation duration. The chain is rebuilt from scratch on every
//! manifest refresh, and may stop early when it has resolved enough Periods
//! to satisfy the caller's target.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{DashlingError, DashlingResult};
use crate::model::{Mpd, Period, PresentationKind};

/// One Period placed on the presentation clock. `index` points back into
/// `Mpd::periods` (document order), so the tree can be rebuilt without
/// dangling references.
#[derive(Debug, Clone, Copy)]
pub struct StreamPeriod {
    pub index: usize,
    pub start: Duration,
    /// `None` is only valid for dynamic presentations (open-ended live
    /// Period, possibly shortened by a later refresh).
    pub duration: Option<Duration>,
}

impl StreamPeriod {
    pub fn end(&self) -> Option<Duration> {
        self.duration.map(|duration| self.start + duration)
    }

    pub fn contains(&self, time: Duration) -> bool {
        time >= self.start && self.end().map_or(true, |end| time < end)
    }
}

/// How far [`PresentationTimeline::resolve`] must get before it may stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTarget<'a> {
    All,
    Time(Duration),
    Index(usize),
    Id(&'a str),
}

#[derive(Debug, Clone, Default)]
pub struct PresentationTimeline {
    periods: Vec<StreamPeriod>,
}

impl PresentationTimeline {
    /// Walk the manifest's Periods in document order and place them on the
    /// presentation clock. Stops early once `target` is satisfied or when an
    /// Early Available Period is hit (the Periods resolved so far are kept);
    /// a zero-or-negative duration anywhere fails the whole pass.
    pub fn resolve(mpd: &Mpd, target: ResolveTarget) -> DashlingResult<Self> {
        if let Some(total) = mpd.media_presentation_duration {
            if total.is_zero() {
                return Err(DashlingError::Validation(
                    "mediaPresentationDuration is zero".to_string(),
                ));
            }
        }

        let is_dynamic = mpd.kind == PresentationKind::Dynamic;
        let mut periods: Vec<StreamPeriod> = Vec::new();
        let mut start = Duration::ZERO;
        let mut carried_duration: Option<Duration> = None;

        let included: Vec<(usize, &Period)> = mpd
            .periods
            .iter()
            .enumerate()
            .filter(|(_, period)| {
                if period.is_placeholder()
                    && period.start.is_none()
                    && period.duration.is_none()
                {
                    // An unresolved reference with no timing of its own
                    // contributes nothing to the chain.
                    tracing::warn!("Skipping placeholder Period without timing");
                    return false;
                }
                true
            })
            .collect();

        for (position, (document_index, period)) in included.iter().enumerate() {
            if let Some(declared) = period.start {
                if !periods.is_empty() && declared <= start {
                    return Err(DashlingError::Validation(format!(
                        "Period {document_index} starts at {declared:?}, not after the previous Period"
                    )));
                }
                start = declared;
            } else if let Some(previous) = carried_duration {
                start += previous;
            } else if periods.is_empty() && !is_dynamic {
                start = Duration::ZERO;
            } else if is_dynamic {
                // Live: exact placement comes from the availability window,
                // not from this chain.
            } else {
                tracing::warn!(
                    "Early Available Period at index {document_index}, stopping timeline resolution"
                );
                break;
            }

            let next = included.get(position + 1).map(|(_, next)| *next);
            let duration = match next {
                Some(next) => {
                    let from_next = match next.start {
                        Some(next_start) => {
                            if next_start <= start {
                                return Err(DashlingError::Validation(format!(
                                    "Period {document_index} would have a non-positive duration"
                                )));
                            }
                            Some(next_start - start)
                        }
                        None => None,
                    };
                    match (from_next, period.duration) {
                        // A declared duration shorter than the gap to the
                        // next Period leaves a hole in the presentation;
                        // longer is clipped at the next start.
                        (Some(gap), Some(declared)) => Some(gap.min(declared)),
                        (Some(gap), None) => Some(gap),
                        (None, Some(declared)) => Some(declared),
                        (None, None) if is_dynamic => None,
                        (None, None) => {
                            return Err(DashlingError::Validation(format!(
                                "Period {document_index} has no resolvable duration"
                            )))
                        }
                    }
                }
                None => {
                    if let Some(total) = mpd.media_presentation_duration {
                        if total <= start {
                            return Err(DashlingError::Validation(
                                "mediaPresentationDuration ends before the last Period starts"
                                    .to_string(),
                            ));
                        }
                        Some(total - start)
                    } else if let Some(declared) = period.duration {
                        Some(declared)
                    } else if is_dynamic {
                        None
                    } else {
                        return Err(DashlingError::Validation(
                            "static presentation without a resolvable duration".to_string(),
                        ));
                    }
                }
            };

            if duration == Some(Duration::ZERO) {
                return Err(DashlingError::Validation(format!(
                    "Period {document_index} has a zero duration"
                )));
            }

            let resolved = StreamPeriod {
                index: *document_index,
                start,
                duration,
            };
            tracing::debug!(
                index = document_index,
                start_ms = start.as_millis() as u64,
                duration_ms = duration.map(|d| d.as_millis() as u64),
                "Placed Period on the presentation timeline"
            );
            periods.push(resolved);
            carried_duration = duration;

            let satisfied = match target {
                ResolveTarget::All => false,
                ResolveTarget::Time(time) => {
                    resolved.end().is_some_and(|end| end >= time) || resolved.start >= time
                }
                ResolveTarget::Index(index) => periods.len() > index,
                ResolveTarget::Id(id) => period.id.as_deref() == Some(id),
            };
            if satisfied {
                break;
            }
        }

        Ok(Self { periods })
    }

    pub fn periods(&self) -> &[StreamPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamPeriod> {
        self.periods.get(index)
    }

    /// Timeline position holding `time`, if resolved.
    pub fn period_index_at(&self, time: Duration) -> Option<usize> {
        self.periods.iter().position(|period| period.contains(time))
    }

    /// End of the last resolved Period, when bounded.
    pub fn end(&self) -> Option<Duration> {
        self.periods.last().and_then(StreamPeriod::end)
    }

    /// Presentation time corresponding to a wall-clock instant, clamped at
    /// the availability start (only meaningful for dynamic presentations).
    pub fn presentation_time_of(mpd: &Mpd, instant: DateTime<Utc>) -> Duration {
        let Some(zero) = mpd.availability_start_time else {
            return Duration::ZERO;
        };
        (instant - zero).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{XlinkActuate, XlinkRef};

    fn period(
        id: Option<&str>,
        start: Option<Duration>,
        duration: Option<Duration>,
    ) -> Period {
        Period {
            id: id.map(str::to_string),
            start,
            duration,
            ..Default::default()
        }
    }

    fn static_mpd(periods: Vec<Period>, total: Option<Duration>) -> Mpd {
        Mpd {
            kind: PresentationKind::Static,
            media_presentation_duration: total,
            periods,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_static_period_starts_at_zero() {
        let mpd = static_mpd(
            vec![period(None, None, None)],
            Some(Duration::from_secs(30)),
        );
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.get(0).unwrap().start, Duration::ZERO);
        assert_eq!(
            timeline.get(0).unwrap().duration,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_declared_duration_creates_gap_before_next_start() {
        // First Period: duration 10s, no start. Second: start at 15s. The
        // 10s..15s hole stays unaddressed.
        let mpd = static_mpd(
            vec![
                period(None, None, Some(Duration::from_secs(10))),
                period(None, Some(Duration::from_secs(15)), None),
            ],
            Some(Duration::from_secs(30)),
        );
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All).unwrap();
        assert_eq!(timeline.len(), 2);

        let first = timeline.get(0).unwrap();
        assert_eq!(first.start, Duration::ZERO);
        assert_eq!(first.duration, Some(Duration::from_secs(10)));

        let second = timeline.get(1).unwrap();
        assert_eq!(second.start, Duration::from_secs(15));
        assert_eq!(second.duration, Some(Duration::from_secs(15)));

        assert_eq!(timeline.period_index_at(Duration::from_secs(12)), None);
    }

    #[test]
    fn test_chained_starts() {
        let mpd = static_mpd(
            vec![
                period(Some("a"), None, Some(Duration::from_secs(10))),
                period(Some("b"), None, Some(Duration::from_secs(5))),
                period(Some("c"), None, None),
            ],
            Some(Duration::from_secs(30)),
        );
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All).unwrap();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.get(1).unwrap().start, Duration::from_secs(10));
        assert_eq!(timeline.get(2).unwrap().start, Duration::from_secs(15));
        assert_eq!(
            timeline.get(2).unwrap().duration,
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn test_overlapping_starts_are_rejected() {
        let mpd = static_mpd(
            vec![
                period(None, Some(Duration::from_secs(10)), None),
                period(None, Some(Duration::from_secs(10)), None),
            ],
            Some(Duration::from_secs(30)),
        );
        assert!(matches!(
            PresentationTimeline::resolve(&mpd, ResolveTarget::All),
            Err(DashlingError::Validation(_))
        ));
    }

    #[test]
    fn test_static_without_any_duration_is_rejected() {
        let mpd = static_mpd(vec![period(None, None, None)], None);
        assert!(matches!(
            PresentationTimeline::resolve(&mpd, ResolveTarget::All),
            Err(DashlingError::Validation(_))
        ));
    }

    #[test]
    fn test_dynamic_last_period_may_be_unbounded() {
        let mpd = Mpd {
            kind: PresentationKind::Dynamic,
            availability_start_time: Some(chrono::DateTime::UNIX_EPOCH),
            periods: vec![period(None, Some(Duration::ZERO), None)],
            ..Default::default()
        };
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All).unwrap();
        assert_eq!(timeline.get(0).unwrap().duration, None);
    }

    #[test]
    fn test_unresolvable_middle_duration_is_rejected() {
        // Neither the first Period's duration nor the second Period's start
        // is declared: the first Period's extent cannot be determined.
        let mpd = static_mpd(
            vec![
                period(None, Some(Duration::ZERO), None),
                period(None, None, None),
            ],
            Some(Duration::from_secs(30)),
        );
        assert!(matches!(
            PresentationTimeline::resolve(&mpd, ResolveTarget::All),
            Err(DashlingError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_target_stops_early() {
        let mpd = static_mpd(
            vec![
                period(Some("a"), None, Some(Duration::from_secs(10))),
                period(Some("b"), None, Some(Duration::from_secs(10))),
                period(Some("c"), None, None),
            ],
            Some(Duration::from_secs(40)),
        );
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::Id("b")).unwrap();
        assert_eq!(timeline.len(), 2);

        let timeline =
            PresentationTimeline::resolve(&mpd, ResolveTarget::Time(Duration::from_secs(5)))
                .unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_placeholder_without_timing_is_skipped() {
        let mut placeholder = period(None, None, None);
        placeholder.xlink = Some(XlinkRef {
            href: "https://example.com/period.xml".to_string(),
            actuate: XlinkActuate::OnRequest,
        });
        let mpd = static_mpd(
            vec![
                period(None, None, Some(Duration::from_secs(10))),
                placeholder,
                period(None, Some(Duration::from_secs(10)), None),
            ],
            Some(Duration::from_secs(30)),
        );
        let timeline = PresentationTimeline::resolve(&mpd, ResolveTarget::All).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.get(1).unwrap().index, 2);
        assert_eq!(timeline.get(1).unwrap().start, Duration::from_secs(10));
    }
}
