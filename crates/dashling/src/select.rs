//! Representation selection under bandwidth/resolution/frame-rate ceilings.

use crate::model::Representation;
use crate::scalar::FrameRate;

/// Upper bounds for [`select_by_max_constraints`]. A zero (or `None`) field
/// leaves that dimension unconstrained.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionConstraints {
    pub max_bandwidth: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: Option<FrameRate>,
}

/// Index of the Representation with the lowest bandwidth, in document order.
pub fn lowest_bandwidth_index(representations: &[Representation]) -> Option<usize> {
    let mut lowest: Option<(usize, u64)> = None;
    for (index, representation) in representations.iter().enumerate() {
        match lowest {
            Some((_, bandwidth)) if representation.bandwidth >= bandwidth => {}
            _ => lowest = Some((index, representation.bandwidth)),
        }
    }
    lowest.map(|(index, _)| index)
}

/// Pick the highest-bandwidth Representation that satisfies every ceiling.
///
/// `max_bandwidth == 0` asks for the minimum-bandwidth Representation. When
/// every candidate is excluded by the ceilings, the minimum-bandwidth one is
/// returned anyway: as long as at least one Representation exists there is
/// always a selection.
pub fn select_by_max_constraints(
    representations: &[Representation],
    constraints: &SelectionConstraints,
) -> Option<usize> {
    if representations.is_empty() {
        return None;
    }
    if constraints.max_bandwidth == 0 {
        return lowest_bandwidth_index(representations);
    }

    let mut best: Option<(usize, u64)> = None;
    for (index, representation) in representations.iter().enumerate() {
        let base = &representation.base;

        if let Some(max_rate) = &constraints.max_frame_rate {
            // Fall back to the declared ceiling when no exact rate is given.
            let rate = base.frame_rate.as_ref().or(base.max_frame_rate.as_ref());
            if rate.is_some_and(|rate| rate.exceeds(max_rate)) {
                continue;
            }
        }
        if constraints.max_width > 0 && base.width.is_some_and(|w| w > constraints.max_width) {
            continue;
        }
        if constraints.max_height > 0 && base.height.is_some_and(|h| h > constraints.max_height) {
            continue;
        }

        if representation.bandwidth <= constraints.max_bandwidth
            && best.map_or(true, |(_, bandwidth)| representation.bandwidth > bandwidth)
        {
            best = Some((index, representation.bandwidth));
        }
    }

    match best {
        Some((index, _)) => Some(index),
        // Everything was excluded; never report "no selection".
        None => lowest_bandwidth_index(representations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepresentationBase;

    fn representation(id: &str, bandwidth: u64) -> Representation {
        Representation {
            id: id.to_string(),
            bandwidth,
            quality_ranking: None,
            dependency_id: Vec::new(),
            media_stream_structure_id: Vec::new(),
            base: RepresentationBase::default(),
            base_urls: Vec::new(),
            addressing: None,
            sub_representations: Vec::new(),
        }
    }

    fn with_video(mut representation: Representation, width: u32, height: u32) -> Representation {
        representation.base.width = Some(width);
        representation.base.height = Some(height);
        representation
    }

    #[test]
    fn test_bandwidth_ceiling() {
        let representations = vec![
            representation("a", 100),
            representation("b", 200),
            representation("c", 300),
        ];

        let constraints = SelectionConstraints {
            max_bandwidth: 250,
            ..Default::default()
        };
        assert_eq!(
            select_by_max_constraints(&representations, &constraints),
            Some(1)
        );

        // No ceiling: the lowest bandwidth wins.
        assert_eq!(
            select_by_max_constraints(&representations, &SelectionConstraints::default()),
            Some(0)
        );
    }

    #[test]
    fn test_all_excluded_falls_back_to_lowest() {
        let representations = vec![representation("a", 500), representation("b", 900)];
        let constraints = SelectionConstraints {
            max_bandwidth: 100,
            ..Default::default()
        };
        assert_eq!(
            select_by_max_constraints(&representations, &constraints),
            Some(0)
        );
    }

    #[test]
    fn test_resolution_ceiling() {
        let representations = vec![
            with_video(representation("sd", 400), 640, 360),
            with_video(representation("hd", 800), 1280, 720),
            with_video(representation("fhd", 1600), 1920, 1080),
        ];
        let constraints = SelectionConstraints {
            max_bandwidth: 10_000,
            max_width: 1280,
            max_height: 720,
            ..Default::default()
        };
        assert_eq!(
            select_by_max_constraints(&representations, &constraints),
            Some(1)
        );
    }

    #[test]
    fn test_frame_rate_ceiling_with_fallback() {
        let mut high = representation("high", 900);
        high.base.frame_rate = Some(FrameRate { num: 60, den: 1 });
        let mut capped = representation("capped", 700);
        capped.base.max_frame_rate = Some(FrameRate { num: 30, den: 1 });

        let representations = vec![high, capped];
        let constraints = SelectionConstraints {
            max_bandwidth: 10_000,
            max_frame_rate: Some(FrameRate { num: 30, den: 1 }),
            ..Default::default()
        };
        assert_eq!(
            select_by_max_constraints(&representations, &constraints),
            Some(1)
        );
    }

    #[test]
    fn test_tie_prefers_document_order() {
        let representations = vec![
            representation("first", 200),
            representation("second", 200),
        ];
        let constraints = SelectionConstraints {
            max_bandwidth: 300,
            ..Default::default()
        };
        assert_eq!(
            select_by_max_constraints(&representations, &constraints),
            Some(0)
        );
    }
}
