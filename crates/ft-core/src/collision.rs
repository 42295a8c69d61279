//! Sibling collision checks.
//!
//! Two fragment tags whose categories share a parent may never overlap in
//! time. These predicates decide that for a candidate interval; callers are
//! responsible for passing only the candidate's siblings.

use crate::category::CategoryPath;
use crate::fragment::FragmentTag;
use crate::interval::Interval;
use crate::types::FragmentTagId;

/// Returns `true` iff `candidate` overlaps none of `siblings`.
pub fn validate(siblings: &[Interval], candidate: &Interval) -> bool {
    first_collision(siblings, candidate).is_none()
}

/// Index of the first sibling that `candidate` overlaps.
pub fn first_collision(siblings: &[Interval], candidate: &Interval) -> Option<usize> {
    siblings.iter().position(|sibling| sibling.overlaps(candidate))
}

/// Tags in the same sibling group as `category`, skipping `exclude`.
pub fn siblings_of<'a>(
    tags: &'a [FragmentTag],
    category: &'a CategoryPath,
    exclude: Option<FragmentTagId>,
) -> impl Iterator<Item = &'a FragmentTag> + 'a {
    tags.iter()
        .filter(move |tag| Some(tag.id) != exclude && tag.category.is_sibling_of(category))
}

/// The first pair of sibling tags that overlap, if any.
///
/// Pairs are reported as `(earlier, later)` by begin within their group.
pub fn first_sibling_overlap(tags: &[FragmentTag]) -> Option<(&FragmentTag, &FragmentTag)> {
    let mut sorted: Vec<(CategoryPath, &FragmentTag)> =
        tags.iter().map(|tag| (tag.group(), tag)).collect();
    sorted.sort_by(|(a_group, a), (b_group, b)| {
        a_group
            .cmp(b_group)
            .then(a.interval.begin().total_cmp(&b.interval.begin()))
    });
    sorted
        .windows(2)
        .find(|pair| pair[0].0 == pair[1].0 && pair[0].1.interval.overlaps(&pair[1].1.interval))
        .map(|pair| (pair[0].1, pair[1].1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::TagStyle;

    fn iv(begin: f64, end: f64) -> Interval {
        Interval::new(begin, end).unwrap()
    }

    fn tag(id: u64, category: &str, begin: f64, end: f64) -> FragmentTag {
        FragmentTag {
            id: FragmentTagId::new(id),
            category: CategoryPath::parse(category).unwrap(),
            interval: iv(begin, end),
            style: TagStyle::default(),
        }
    }

    #[test]
    fn empty_siblings_always_validate() {
        assert!(validate(&[], &iv(0.0, 100.0)));
    }

    #[test]
    fn overlapping_candidate_is_rejected() {
        let siblings = [iv(0.0, 10.0)];
        assert!(!validate(&siblings, &iv(5.0, 8.0)));
        assert_eq!(first_collision(&siblings, &iv(5.0, 8.0)), Some(0));
    }

    #[test]
    fn touching_candidate_is_accepted() {
        let siblings = [iv(0.0, 10.0), iv(20.0, 30.0)];
        assert!(validate(&siblings, &iv(10.0, 20.0)));
    }

    #[test]
    fn validate_agrees_with_pairwise_checks() {
        let siblings = [iv(0.0, 2.0), iv(3.0, 5.0), iv(8.0, 9.0), iv(12.0, 20.0)];
        let mut begin = 0.0;
        while begin < 21.0 {
            for length in [0.5, 1.0, 2.5, 6.0] {
                let candidate = iv(begin, begin + length);
                let pairwise = siblings
                    .iter()
                    .all(|s| validate(std::slice::from_ref(s), &candidate));
                assert_eq!(validate(&siblings, &candidate), pairwise, "{candidate}");
            }
            begin += 0.5;
        }
    }

    #[test]
    fn first_collision_reports_earliest_index() {
        let siblings = [iv(0.0, 2.0), iv(3.0, 5.0), iv(6.0, 9.0)];
        assert_eq!(first_collision(&siblings, &iv(4.0, 7.0)), Some(1));
        assert_eq!(first_collision(&siblings, &iv(9.0, 10.0)), None);
    }

    #[test]
    fn siblings_of_filters_group_and_excluded() {
        let tags = vec![
            tag(1, "scene.intro", 0.0, 5.0),
            tag(2, "scene.climax", 10.0, 15.0),
            tag(3, "music.theme", 0.0, 30.0),
            tag(4, "scene", 0.0, 30.0),
        ];
        let category = CategoryPath::parse("scene.outro").unwrap();
        let ids: Vec<u64> = siblings_of(&tags, &category, Some(FragmentTagId::new(2)))
            .map(|t| t.id.value())
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn first_sibling_overlap_finds_hidden_pair() {
        let clean = vec![
            tag(1, "scene.intro", 0.0, 10.0),
            tag(2, "scene.climax", 10.0, 20.0),
            tag(3, "music.theme", 5.0, 15.0),
        ];
        assert!(first_sibling_overlap(&clean).is_none());

        // The long tag overlaps a sibling that is not its begin-order neighbor
        // in the input.
        let broken = vec![
            tag(1, "scene.intro", 0.0, 30.0),
            tag(2, "music.theme", 5.0, 6.0),
            tag(3, "scene.climax", 20.0, 25.0),
        ];
        let (first, second) = first_sibling_overlap(&broken).unwrap();
        assert_eq!((first.id.value(), second.id.value()), (1, 3));
    }
}
