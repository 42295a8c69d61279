//! Minimal-track layout of fragment tags.
//!
//! Tags are grouped by their sibling group (parent category). Two groups
//! are compatible when no interval of one overlaps any interval of the
//! other; compatible groups can share a display track. Repeatedly taking a
//! maximum clique of the compatibility graph merges groups into as few
//! tracks as that greedy extraction allows.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::category::CategoryPath;
use crate::clique::{AdjacencyMatrix, CliqueConfig, max_clique};
use crate::fragment::FragmentTag;
use crate::interval::sort_by_begin;

/// Limits for the track-packing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    /// Above this many sibling groups every group gets its own track.
    pub max_groups: usize,
    #[serde(flatten)]
    pub clique: CliqueConfig,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            max_groups: 64,
            clique: CliqueConfig::default(),
        }
    }
}

/// One horizontal lane of chronologically ordered, non-overlapping tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Sibling groups merged into this track, in merge order.
    pub groups: Vec<CategoryPath>,
    /// Tags sorted by begin.
    pub tags: Vec<FragmentTag>,
}

/// Tags sharing one parent category, sorted by begin.
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingGroup {
    pub parent: CategoryPath,
    pub tags: Vec<FragmentTag>,
}

/// Groups tags by parent category, ordered by parent path.
pub fn group_tags(tags: &[FragmentTag]) -> Vec<SiblingGroup> {
    let mut by_parent: BTreeMap<CategoryPath, Vec<FragmentTag>> = BTreeMap::new();
    for tag in tags {
        by_parent.entry(tag.group()).or_default().push(tag.clone());
    }
    by_parent
        .into_iter()
        .map(|(parent, mut tags)| {
            sort_by_begin(&mut tags, |tag| &tag.interval);
            SiblingGroup { parent, tags }
        })
        .collect()
}

/// Whether no tag of `a` overlaps any tag of `b`.
///
/// Both slices must be sorted by begin and internally non-overlapping; the
/// scan advances whichever side starts earlier and stops at the first hit.
pub fn groups_compatible(a: &[FragmentTag], b: &[FragmentTag]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (left, right) = (&a[i].interval, &b[j].interval);
        if left.overlaps(right) {
            return false;
        }
        if left.begin() < right.begin() {
            i += 1;
        } else {
            j += 1;
        }
    }
    true
}

/// Sibling groups and their pairwise time compatibility.
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    groups: Vec<CategoryPath>,
    adjacency: AdjacencyMatrix,
}

impl CompatibilityGraph {
    pub fn build(groups: &[SiblingGroup]) -> Self {
        let mut adjacency = AdjacencyMatrix::new(groups.len());
        for (u, first) in groups.iter().enumerate() {
            for (v, second) in groups.iter().enumerate().skip(u + 1) {
                if groups_compatible(&first.tags, &second.tags) {
                    adjacency.connect(u, v);
                }
            }
        }
        Self {
            groups: groups.iter().map(|group| group.parent.clone()).collect(),
            adjacency,
        }
    }

    pub fn groups(&self) -> &[CategoryPath] {
        &self.groups
    }

    pub const fn adjacency(&self) -> &AdjacencyMatrix {
        &self.adjacency
    }

    #[must_use]
    pub fn compatible(&self, a: usize, b: usize) -> bool {
        self.adjacency.connected(a, b)
    }
}

/// Packs tags into the fewest tracks found by repeated clique extraction.
///
/// Every input tag appears in exactly one track. Tracks are free of
/// overlaps as long as `tags` satisfies the sibling non-overlap invariant,
/// as every snapshot published by an `IntervalStore` does. Tags that break
/// it are still placed, and the offending track is logged.
pub fn pack(tags: &[FragmentTag], config: &PackingConfig) -> Vec<Track> {
    let groups = group_tags(tags);
    if groups.len() <= 1 {
        return groups
            .into_iter()
            .map(|group| Track {
                groups: vec![group.parent],
                tags: group.tags,
            })
            .collect();
    }

    let graph = CompatibilityGraph::build(&groups);
    let tracks: Vec<Track> = assign_tracks(&graph, config)
        .into_iter()
        .map(|members| {
            let sources: Vec<&[FragmentTag]> =
                members.iter().map(|&g| groups[g].tags.as_slice()).collect();
            Track {
                groups: members.iter().map(|&g| groups[g].parent.clone()).collect(),
                tags: merge_sorted(&sources),
            }
        })
        .collect();

    for track in tracks.iter().filter(|track| !is_disjoint(&track.tags)) {
        tracing::warn!(groups = ?track.groups, "packed track contains overlapping tags");
    }
    tracks
}

/// Packs several tag snapshots in parallel, preserving input order.
pub fn pack_many(snapshots: &[Vec<FragmentTag>], config: &PackingConfig) -> Vec<Vec<Track>> {
    snapshots
        .par_iter()
        .map(|tags| pack(tags, config))
        .collect()
}

/// Whether begin-sorted tags are pairwise non-overlapping.
pub fn is_disjoint(tags: &[FragmentTag]) -> bool {
    tags.windows(2)
        .all(|pair| pair[0].interval.end() <= pair[1].interval.begin())
}

/// Splits graph vertices into tracks, largest cliques first.
fn assign_tracks(graph: &CompatibilityGraph, config: &PackingConfig) -> Vec<Vec<usize>> {
    let count = graph.groups().len();
    let singletons = || -> Vec<Vec<usize>> { (0..count).map(|g| vec![g]).collect() };
    if count > config.max_groups {
        tracing::warn!(
            groups = count,
            max_groups = config.max_groups,
            "too many category groups, using one track per group"
        );
        return singletons();
    }

    let mut remaining: Vec<usize> = (0..count).collect();
    let mut tracks = Vec::new();
    while remaining.len() > 1 {
        let mut clique = match max_clique(graph.adjacency(), &remaining, &config.clique) {
            Ok(clique) => clique,
            Err(err) => {
                tracing::warn!(%err, groups = count, "using one track per group");
                return singletons();
            }
        };
        clique.sort_unstable();
        remaining.retain(|vertex| !clique.contains(vertex));
        tracing::trace!(?clique, remaining = remaining.len(), "extracted track");
        tracks.push(clique);
    }
    tracks.extend(remaining.into_iter().map(|vertex| vec![vertex]));
    tracks
}

/// Stable k-way merge of begin-sorted slices; ties go to the earlier slice.
fn merge_sorted(sources: &[&[FragmentTag]]) -> Vec<FragmentTag> {
    let mut heads = vec![0_usize; sources.len()];
    let mut merged = Vec::with_capacity(sources.iter().map(|s| s.len()).sum());
    loop {
        let next = (0..sources.len())
            .filter(|&s| heads[s] < sources[s].len())
            .min_by(|&a, &b| {
                let (left, right) = (&sources[a][heads[a]], &sources[b][heads[b]]);
                left.interval.begin().total_cmp(&right.interval.begin())
            });
        let Some(next) = next else {
            return merged;
        };
        merged.push(sources[next][heads[next]].clone());
        heads[next] += 1;
    }
}
