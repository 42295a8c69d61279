//! Free-space search within a sibling group.
//!
//! The timeline `[0, media_duration]` is bracketed by two zero-length
//! sentinels, and the gaps between consecutive (begin-sorted) siblings are
//! the candidate places for a new fragment.

use crate::interval::{Interval, sort_by_begin};

/// A free stretch of the timeline between two neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gap {
    start: f64,
    end: f64,
}

impl Gap {
    fn length(self) -> f64 {
        self.end - self.start
    }

    /// Latest start at which a fragment of `length` still fits.
    fn last_start(self, length: f64) -> f64 {
        self.end - length
    }
}

/// Returns the slot `[insertion_point, insertion_point + min_length)` if it
/// lies inside a free gap of the sibling group.
///
/// With no siblings the slot `[0, min_length)` is returned regardless of the
/// insertion point. `None` means there is not enough room at that point.
pub fn find_slot(
    siblings: &[Interval],
    media_duration: f64,
    insertion_point: f64,
    min_length: f64,
) -> Option<Interval> {
    if !arguments_valid(media_duration, insertion_point, min_length) {
        return None;
    }
    if siblings.is_empty() {
        return Interval::new(0.0, min_length).ok();
    }

    gaps(siblings, media_duration)
        .into_iter()
        .find(|gap| {
            gap.length() >= min_length
                && gap.start <= insertion_point
                && insertion_point <= gap.end
                && insertion_point <= gap.last_start(min_length)
        })
        .and_then(|_| Interval::new(insertion_point, insertion_point + min_length).ok())
}

/// Returns the `min_length` slot whose start is closest to `insertion_point`.
///
/// Unlike [`find_slot`], the slot may be moved away from the insertion point
/// into the nearest gap that can hold it. Ties go to the earlier slot.
pub fn find_nearest_slot(
    siblings: &[Interval],
    media_duration: f64,
    insertion_point: f64,
    min_length: f64,
) -> Option<Interval> {
    if !arguments_valid(media_duration, insertion_point, min_length) {
        return None;
    }

    let mut best: Option<(f64, f64)> = None;
    for gap in gaps(siblings, media_duration) {
        if gap.length() < min_length {
            continue;
        }
        let start = insertion_point.clamp(gap.start, gap.last_start(min_length));
        let distance = (start - insertion_point).abs();
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((start, distance));
        }
    }

    best.and_then(|(start, _)| Interval::new(start, start + min_length).ok())
}

fn arguments_valid(media_duration: f64, insertion_point: f64, min_length: f64) -> bool {
    media_duration.is_finite()
        && insertion_point.is_finite()
        && insertion_point >= 0.0
        && min_length.is_finite()
        && min_length > 0.0
}

/// Gaps between the start sentinel, the sorted siblings, and the end sentinel.
fn gaps(siblings: &[Interval], media_duration: f64) -> Vec<Gap> {
    let mut sorted = siblings.to_vec();
    sort_by_begin(&mut sorted, |interval| interval);

    let mut gaps = Vec::with_capacity(sorted.len() + 1);
    let mut previous_end = 0.0_f64;
    for interval in &sorted {
        gaps.push(Gap {
            start: previous_end,
            end: interval.begin(),
        });
        previous_end = previous_end.max(interval.end());
    }
    gaps.push(Gap {
        start: previous_end,
        end: media_duration,
    });
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::validate;

    fn iv(begin: f64, end: f64) -> Interval {
        Interval::new(begin, end).unwrap()
    }

    #[test]
    fn slot_after_single_sibling() {
        let siblings = [iv(0.0, 10.0)];
        assert_eq!(find_slot(&siblings, 100.0, 50.0, 10.0), Some(iv(50.0, 60.0)));
    }

    #[test]
    fn narrow_gap_yields_none() {
        let siblings = [iv(0.0, 10.0), iv(15.0, 20.0)];
        assert_eq!(find_slot(&siblings, 100.0, 12.0, 10.0), None);
    }

    #[test]
    fn no_siblings_places_at_zero() {
        assert_eq!(find_slot(&[], 100.0, 42.0, 5.0), Some(iv(0.0, 5.0)));
    }

    #[test]
    fn slot_must_end_before_next_sibling() {
        let siblings = [iv(0.0, 10.0), iv(30.0, 40.0)];
        assert_eq!(find_slot(&siblings, 100.0, 15.0, 10.0), Some(iv(15.0, 25.0)));
        assert_eq!(find_slot(&siblings, 100.0, 20.0, 10.0), Some(iv(20.0, 30.0)));
        assert_eq!(find_slot(&siblings, 100.0, 21.0, 10.0), None);
    }

    #[test]
    fn slot_respects_media_end() {
        let siblings = [iv(0.0, 10.0)];
        assert_eq!(find_slot(&siblings, 100.0, 90.0, 10.0), Some(iv(90.0, 100.0)));
        assert_eq!(find_slot(&siblings, 100.0, 95.0, 10.0), None);
    }

    #[test]
    fn slot_before_first_sibling() {
        let siblings = [iv(20.0, 30.0)];
        assert_eq!(find_slot(&siblings, 100.0, 5.0, 10.0), Some(iv(5.0, 15.0)));
        assert_eq!(find_slot(&siblings, 100.0, 15.0, 10.0), None);
    }

    #[test]
    fn unsorted_siblings_are_sorted_first() {
        let siblings = [iv(30.0, 40.0), iv(0.0, 10.0)];
        assert_eq!(find_slot(&siblings, 100.0, 12.0, 10.0), Some(iv(12.0, 22.0)));
    }

    #[test]
    fn invalid_arguments_yield_none() {
        assert_eq!(find_slot(&[], 100.0, 0.0, 0.0), None);
        assert_eq!(find_slot(&[], 100.0, -1.0, 1.0), None);
        assert_eq!(find_slot(&[], f64::NAN, 0.0, 1.0), None);
    }

    #[test]
    fn found_slots_always_validate() {
        let siblings = [iv(2.0, 4.0), iv(4.0, 9.0), iv(13.0, 14.5), iv(20.0, 25.0)];
        let mut point = 0.0;
        while point <= 30.0 {
            for length in [0.5, 1.0, 3.0, 4.0] {
                if let Some(slot) = find_slot(&siblings, 30.0, point, length) {
                    assert!(validate(&siblings, &slot), "{slot} collides");
                    assert!(slot.end() <= 30.0);
                }
                if let Some(slot) = find_nearest_slot(&siblings, 30.0, point, length) {
                    assert!(validate(&siblings, &slot), "{slot} collides");
                    assert!(slot.end() <= 30.0);
                }
            }
            point += 0.25;
        }
    }

    #[test]
    fn nearest_slot_moves_into_closest_gap() {
        let siblings = [iv(0.0, 10.0), iv(15.0, 20.0)];
        assert_eq!(
            find_nearest_slot(&siblings, 100.0, 12.0, 10.0),
            Some(iv(20.0, 30.0))
        );
        assert_eq!(
            find_nearest_slot(&siblings, 100.0, 50.0, 10.0),
            Some(iv(50.0, 60.0))
        );
        assert_eq!(
            find_nearest_slot(&siblings, 100.0, 95.0, 10.0),
            Some(iv(90.0, 100.0))
        );
    }

    #[test]
    fn nearest_slot_prefers_earlier_on_ties() {
        let siblings = [iv(0.0, 5.0), iv(10.0, 20.0), iv(25.0, 100.0)];
        assert_eq!(
            find_nearest_slot(&siblings, 100.0, 12.5, 5.0),
            Some(iv(5.0, 10.0))
        );
    }

    #[test]
    fn nearest_slot_none_when_timeline_full() {
        let siblings = [iv(0.0, 50.0), iv(52.0, 100.0)];
        assert_eq!(find_nearest_slot(&siblings, 100.0, 51.0, 5.0), None);
        assert_eq!(find_nearest_slot(&[], 3.0, 0.0, 5.0), None);
    }
}
