//! Effective addressing descriptor resolution.
//!
//! DASH lets Period, AdaptationSet and Representation each declare one
//! addressing element; a lower level overrides the higher one attribute by
//! attribute. Merging is done here at selection time, one level at a time,
//! so the tree keeps exactly what the manifest authored.
//!
//! Only same-kind declarations merge. A child that switches kinds (say a
//! SegmentTemplate under a Period-level SegmentList) takes effect wholesale
//! with no inheritance. Child SegmentTimeline and SegmentURL lists *replace*
//! the inherited list; they are never unioned.

use crate::error::{DashlingError, DashlingResult};
use crate::model::{
    AdaptationSet, AddressingDescriptor, MultiSegmentBase, Period, Representation, SegmentBase,
    SegmentList, SegmentTemplate,
};

/// The merged addressing declaration a Representation is resolved under.
#[derive(Debug, Clone)]
pub enum EffectiveAddressing {
    /// No declaration anywhere in the chain: one segment per Period, located
    /// by BaseURL composition alone.
    None,
    Base(SegmentBase),
    List(SegmentList),
    Template(SegmentTemplate),
}

pub fn effective_addressing(
    period: &Period,
    set: &AdaptationSet,
    representation: &Representation,
) -> DashlingResult<EffectiveAddressing> {
    let mut effective: Option<AddressingDescriptor> = period.addressing.clone();
    for own in [set.addressing.as_ref(), representation.addressing.as_ref()] {
        effective = match (own, effective) {
            (None, inherited) => inherited,
            (Some(own), None) => Some(own.clone()),
            (Some(own), Some(inherited)) => Some(merge_descriptor(own, &inherited)),
        };
    }

    // A list or template declared directly inside the Representation must
    // end up with some way to derive segment durations.
    if let Some(own) = &representation.addressing {
        let mult = match &effective {
            Some(AddressingDescriptor::List(list)) => Some(&list.mult),
            Some(AddressingDescriptor::Template(template)) => Some(&template.mult),
            _ => None,
        };
        let own_is_multi = !matches!(own, AddressingDescriptor::Base(_));
        if let (true, Some(mult)) = (own_is_multi, mult) {
            if mult.duration.is_none() && mult.timeline.is_none() {
                return Err(DashlingError::Validation(format!(
                    "Representation {:?}: segment declaration has neither duration nor timeline",
                    representation.id
                )));
            }
        }
    }

    Ok(match effective {
        None => EffectiveAddressing::None,
        Some(AddressingDescriptor::Base(base)) => EffectiveAddressing::Base(base),
        Some(AddressingDescriptor::List(list)) => EffectiveAddressing::List(list),
        Some(AddressingDescriptor::Template(template)) => EffectiveAddressing::Template(template),
    })
}

fn merge_descriptor(
    own: &AddressingDescriptor,
    inherited: &AddressingDescriptor,
) -> AddressingDescriptor {
    use AddressingDescriptor::*;
    match (own, inherited) {
        (Base(own), Base(parent)) => Base(merge_segment_base(own, parent)),
        (List(own), List(parent)) => List(merge_segment_list(own, parent)),
        (Template(own), Template(parent)) => Template(merge_segment_template(own, parent)),
        // Kind switch: no inheritance applies.
        (own, _) => own.clone(),
    }
}

fn merge_segment_base(own: &SegmentBase, parent: &SegmentBase) -> SegmentBase {
    SegmentBase {
        timescale: own.timescale.or(parent.timescale),
        presentation_time_offset: own
            .presentation_time_offset
            .or(parent.presentation_time_offset),
        index_range: own.index_range.or(parent.index_range),
        index_range_exact: own.index_range_exact.or(parent.index_range_exact),
        initialization: own
            .initialization
            .clone()
            .or_else(|| parent.initialization.clone()),
        representation_index: own
            .representation_index
            .clone()
            .or_else(|| parent.representation_index.clone()),
    }
}

fn merge_multi_segment_base(own: &MultiSegmentBase, parent: &MultiSegmentBase) -> MultiSegmentBase {
    MultiSegmentBase {
        base: merge_segment_base(&own.base, &parent.base),
        duration: own.duration.or(parent.duration),
        start_number: own.start_number.or(parent.start_number),
        // A child-level SegmentTimeline replaces the inherited one wholesale.
        timeline: own.timeline.clone().or_else(|| parent.timeline.clone()),
        bitstream_switching: own
            .bitstream_switching
            .clone()
            .or_else(|| parent.bitstream_switching.clone()),
    }
}

fn merge_segment_list(own: &SegmentList, parent: &SegmentList) -> SegmentList {
    SegmentList {
        mult: merge_multi_segment_base(&own.mult, &parent.mult),
        // Child SegmentURL entries replace the inherited list, never merge.
        segment_urls: if own.segment_urls.is_empty() {
            parent.segment_urls.clone()
        } else {
            own.segment_urls.clone()
        },
        xlink: own.xlink.clone(),
    }
}

fn merge_segment_template(own: &SegmentTemplate, parent: &SegmentTemplate) -> SegmentTemplate {
    SegmentTemplate {
        mult: merge_multi_segment_base(&own.mult, &parent.mult),
        media: own.media.clone().or_else(|| parent.media.clone()),
        index: own.index.clone().or_else(|| parent.index.clone()),
        initialization: own
            .initialization
            .clone()
            .or_else(|| parent.initialization.clone()),
        bitstream_switching: own
            .bitstream_switching
            .clone()
            .or_else(|| parent.bitstream_switching.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RepresentationBase, SegmentTimeline, SEntry};

    fn representation(addressing: Option<AddressingDescriptor>) -> Representation {
        Representation {
            id: "r0".to_string(),
            bandwidth: 1000,
            quality_ranking: None,
            dependency_id: Vec::new(),
            media_stream_structure_id: Vec::new(),
            base: RepresentationBase::default(),
            base_urls: Vec::new(),
            addressing,
            sub_representations: Vec::new(),
        }
    }

    fn template(media: Option<&str>, duration: Option<u64>) -> SegmentTemplate {
        SegmentTemplate {
            media: media.map(str::to_string),
            mult: MultiSegmentBase {
                duration,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_representation_inherits_full_template() {
        let mut set = AdaptationSet::default();
        set.addressing = Some(AddressingDescriptor::Template(template(
            Some("$Number$.m4s"),
            Some(2000),
        )));

        let effective = effective_addressing(
            &Period::default(),
            &set,
            &representation(None),
        )
        .unwrap();

        let EffectiveAddressing::Template(effective) = effective else {
            panic!("expected template");
        };
        assert_eq!(effective.media.as_deref(), Some("$Number$.m4s"));
        assert_eq!(effective.mult.duration, Some(2000));
    }

    #[test]
    fn test_overriding_one_field_keeps_the_rest() {
        let mut set = AdaptationSet::default();
        set.addressing = Some(AddressingDescriptor::Template(SegmentTemplate {
            initialization: Some("init.mp4".to_string()),
            ..template(Some("$Number$.m4s"), Some(2000))
        }));

        let own = template(Some("override-$Number$.m4s"), None);
        let effective = effective_addressing(
            &Period::default(),
            &set,
            &representation(Some(AddressingDescriptor::Template(own))),
        )
        .unwrap();

        let EffectiveAddressing::Template(effective) = effective else {
            panic!("expected template");
        };
        assert_eq!(effective.media.as_deref(), Some("override-$Number$.m4s"));
        assert_eq!(effective.initialization.as_deref(), Some("init.mp4"));
        assert_eq!(effective.mult.duration, Some(2000));
    }

    #[test]
    fn test_child_timeline_replaces_inherited() {
        let parent_timeline = SegmentTimeline {
            entries: vec![SEntry {
                t: Some(0),
                d: 10,
                r: 4,
            }],
        };
        let child_timeline = SegmentTimeline {
            entries: vec![SEntry {
                t: Some(100),
                d: 5,
                r: 0,
            }],
        };

        let mut set = AdaptationSet::default();
        set.addressing = Some(AddressingDescriptor::Template(SegmentTemplate {
            mult: MultiSegmentBase {
                timeline: Some(parent_timeline),
                ..Default::default()
            },
            media: Some("$Time$.m4s".to_string()),
            ..Default::default()
        }));

        let own = SegmentTemplate {
            mult: MultiSegmentBase {
                timeline: Some(child_timeline),
                ..Default::default()
            },
            ..Default::default()
        };
        let effective = effective_addressing(
            &Period::default(),
            &set,
            &representation(Some(AddressingDescriptor::Template(own))),
        )
        .unwrap();

        let EffectiveAddressing::Template(effective) = effective else {
            panic!("expected template");
        };
        let timeline = effective.mult.timeline.unwrap();
        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.entries[0].t, Some(100));
        assert_eq!(timeline.entries[0].d, 5);
    }

    #[test]
    fn test_kind_switch_discards_inheritance() {
        let mut period = Period::default();
        period.addressing = Some(AddressingDescriptor::List(SegmentList {
            mult: MultiSegmentBase {
                duration: Some(4000),
                ..Default::default()
            },
            ..Default::default()
        }));

        let own = template(Some("$Number$.m4s"), Some(1000));
        let effective = effective_addressing(
            &period,
            &AdaptationSet::default(),
            &representation(Some(AddressingDescriptor::Template(own))),
        )
        .unwrap();

        let EffectiveAddressing::Template(effective) = effective else {
            panic!("expected template");
        };
        // The list's duration does not leak across the kind switch.
        assert_eq!(effective.mult.duration, Some(1000));
    }

    #[test]
    fn test_rep_level_multi_without_durations_is_rejected() {
        let own = template(Some("$Number$.m4s"), None);
        let result = effective_addressing(
            &Period::default(),
            &AdaptationSet::default(),
            &representation(Some(AddressingDescriptor::Template(own))),
        );
        assert!(matches!(result, Err(DashlingError::Validation(_))));
    }
}
