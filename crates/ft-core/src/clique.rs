//! Exact maximum-clique search.
//!
//! Branch and bound over a boolean adjacency matrix with greedy-coloring
//! upper bounds (MCQ), optionally with the dynamic degree re-sorting of
//! MCQDyn. The search works on an explicit list of active vertices, so the
//! matrix itself is never mutated while cliques are extracted.
//!
//! # Algorithm Summary
//!
//! 1. Sort the active vertices by degree (descending, stable) and seed each
//!    vertex with the bound `min(i + 1, max_degree + 1)`.
//! 2. `expand` takes candidates from the back (highest bound first) and
//!    prunes as soon as `|current| + bound <= |best|`.
//! 3. Otherwise the vertex joins the current clique, the candidates are cut
//!    down to its neighbours and greedily recolored, which both reorders
//!    them by color class and tightens their bounds, and the search recurses.
//! 4. The dynamic variant re-sorts a candidate set by its live degrees
//!    before coloring while the share of steps spent at that depth is below
//!    `dynamic_threshold`, which concentrates the expensive sorting near the
//!    root of the search tree.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the clique search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CliqueError {
    /// The search needed more expansion steps than allowed.
    #[error("maximum clique search exceeded its budget of {budget} steps")]
    BudgetExhausted { budget: u64 },
}

/// Symmetric adjacency matrix without self-loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    size: usize,
    cells: Vec<bool>,
}

impl AdjacencyMatrix {
    /// Creates a matrix of `size` isolated vertices.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Adds the undirected edge `a - b`. Self-loops are ignored.
    pub fn connect(&mut self, a: usize, b: usize) {
        if a != b {
            self.cells[a * self.size + b] = true;
            self.cells[b * self.size + a] = true;
        }
    }

    #[must_use]
    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.cells[a * self.size + b]
    }

    /// Number of neighbours of `vertex` among `within`.
    pub fn degree_within(&self, vertex: usize, within: impl IntoIterator<Item = usize>) -> usize {
        within
            .into_iter()
            .filter(|&other| self.connected(vertex, other))
            .count()
    }

    /// Whether `vertices` are pairwise connected.
    #[must_use]
    pub fn is_clique(&self, vertices: &[usize]) -> bool {
        vertices.iter().enumerate().all(|(i, &a)| {
            vertices[i + 1..]
                .iter()
                .all(|&b| self.connected(a, b))
        })
    }
}

/// Tuning of the clique search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliqueConfig {
    /// Use MCQDyn's degree re-sorting.
    pub dynamic: bool,
    /// Per-depth step share below which candidates are re-sorted by degree.
    pub dynamic_threshold: f64,
    /// Maximum number of `expand` calls before giving up.
    pub step_budget: u64,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self {
            dynamic: true,
            dynamic_threshold: 0.025,
            step_budget: 250_000,
        }
    }
}

/// Finds a maximum clique among `active` vertices of `graph`.
///
/// Returns vertex indices in the order they joined the clique. Among several
/// maximum cliques the first one reached by the search is returned.
pub fn max_clique(
    graph: &AdjacencyMatrix,
    active: &[usize],
    config: &CliqueConfig,
) -> Result<Vec<usize>, CliqueError> {
    if active.is_empty() {
        return Ok(Vec::new());
    }

    let mut vertices: Vec<Vertex> = active
        .iter()
        .map(|&index| Vertex { index, bound: 0 })
        .collect();
    degree_sort(graph, &mut vertices);
    init_bounds(graph, &mut vertices);

    let mut search = Search {
        graph,
        config,
        current: Vec::new(),
        best: Vec::new(),
        expansions: 0,
        steps: 0,
        levels: vec![StepCount::default(); active.len() + 2],
        level: 1,
    };
    search.expand(vertices)?;
    tracing::trace!(
        size = search.best.len(),
        expansions = search.expansions,
        "maximum clique found"
    );
    Ok(search.best)
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    index: usize,
    /// Upper bound on the clique size reachable through this vertex.
    bound: usize,
}

/// MCQDyn step counters for one recursion depth.
#[derive(Debug, Clone, Copy, Default)]
struct StepCount {
    /// Steps taken at this depth and above.
    current: u64,
    /// Value of the parent depth's counter when this depth was last entered.
    previous: u64,
}

struct Search<'a> {
    graph: &'a AdjacencyMatrix,
    config: &'a CliqueConfig,
    current: Vec<usize>,
    best: Vec<usize>,
    expansions: u64,
    steps: u64,
    levels: Vec<StepCount>,
    level: usize,
}

impl Search<'_> {
    fn expand(&mut self, mut candidates: Vec<Vertex>) -> Result<(), CliqueError> {
        self.expansions += 1;
        if self.expansions > self.config.step_budget {
            return Err(CliqueError::BudgetExhausted {
                budget: self.config.step_budget,
            });
        }

        if self.config.dynamic {
            let parent = self.levels[self.level - 1].current;
            let counts = &mut self.levels[self.level];
            counts.current = (counts.current + parent).saturating_sub(counts.previous);
            counts.previous = parent;
        }

        while let Some(&last) = candidates.last() {
            if self.current.len() + last.bound <= self.best.len() {
                return Ok(());
            }

            self.current.push(last.index);
            let rest = &candidates[..candidates.len() - 1];
            let mut neighbours: Vec<Vertex> = rest
                .iter()
                .filter(|v| self.graph.connected(last.index, v.index))
                .copied()
                .collect();

            if neighbours.is_empty() {
                if self.current.len() > self.best.len() {
                    self.best.clone_from(&self.current);
                }
            } else {
                if self.config.dynamic {
                    self.steps += 1;
                    #[expect(
                        clippy::cast_precision_loss,
                        reason = "step counters stay far below 2^52"
                    )]
                    let share = self.levels[self.level].current as f64 / self.steps as f64;
                    if share < self.config.dynamic_threshold {
                        degree_sort(self.graph, &mut neighbours);
                    }
                }
                self.color_sort(&mut neighbours);
                if self.config.dynamic {
                    self.levels[self.level].current += 1;
                }
                self.level += 1;
                let outcome = self.expand(neighbours);
                self.level -= 1;
                outcome?;
            }

            self.current.pop();
            candidates.pop();
        }
        Ok(())
    }

    /// Greedy sequential coloring that reorders `candidates` by color class.
    ///
    /// Vertices whose color cannot lead to a larger clique keep a zero bound
    /// and are moved to the front, where pruning stops the search.
    fn color_sort(&self, candidates: &mut [Vertex]) {
        let min_color = (self.best.len() + 1)
            .saturating_sub(self.current.len())
            .max(1);

        let mut classes: Vec<Vec<usize>> = Vec::new();
        let mut kept = 0;
        for i in 0..candidates.len() {
            let vertex = candidates[i].index;
            let color = classes
                .iter()
                .position(|class| !class.iter().any(|&u| self.graph.connected(vertex, u)))
                .unwrap_or(classes.len());
            if color == classes.len() {
                classes.push(Vec::new());
            }
            classes[color].push(vertex);
            if color + 1 < min_color {
                candidates[kept] = Vertex {
                    index: vertex,
                    bound: 0,
                };
                kept += 1;
            }
        }

        for (color, class) in classes.iter().enumerate().skip(min_color - 1) {
            for &index in class {
                candidates[kept] = Vertex {
                    index,
                    bound: color + 1,
                };
                kept += 1;
            }
        }
        debug_assert_eq!(kept, candidates.len());
    }
}

/// Stable sort by degree within `vertices`, highest first.
fn degree_sort(graph: &AdjacencyMatrix, vertices: &mut [Vertex]) {
    let indices: Vec<usize> = vertices.iter().map(|v| v.index).collect();
    let mut keyed: Vec<(usize, Vertex)> = vertices
        .iter()
        .map(|&v| (graph.degree_within(v.index, indices.iter().copied()), v))
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    for (slot, (_, vertex)) in vertices.iter_mut().zip(keyed) {
        *slot = vertex;
    }
}

/// Initial bounds for degree-sorted vertices: `min(i + 1, max_degree + 1)`.
fn init_bounds(graph: &AdjacencyMatrix, vertices: &mut [Vertex]) {
    let indices: Vec<usize> = vertices.iter().map(|v| v.index).collect();
    let max_degree = vertices
        .first()
        .map_or(0, |v| graph.degree_within(v.index, indices.iter().copied()));
    for (i, vertex) in vertices.iter_mut().enumerate() {
        vertex.bound = (i + 1).min(max_degree + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(size: usize, edges: &[(usize, usize)]) -> AdjacencyMatrix {
        let mut matrix = AdjacencyMatrix::new(size);
        for &(a, b) in edges {
            matrix.connect(a, b);
        }
        matrix
    }

    fn all(size: usize) -> Vec<usize> {
        (0..size).collect()
    }

    fn static_config() -> CliqueConfig {
        CliqueConfig {
            dynamic: false,
            ..CliqueConfig::default()
        }
    }

    fn brute_force_size(matrix: &AdjacencyMatrix, active: &[usize]) -> usize {
        let mut best = 0;
        for mask in 0_u32..(1 << active.len()) {
            let subset: Vec<usize> = active
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &v)| v)
                .collect();
            if subset.len() > best && matrix.is_clique(&subset) {
                best = subset.len();
            }
        }
        best
    }

    #[test]
    fn empty_active_set_gives_empty_clique() {
        let matrix = graph(3, &[(0, 1)]);
        assert!(max_clique(&matrix, &[], &CliqueConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn isolated_vertices_give_singleton() {
        let matrix = graph(3, &[]);
        let clique = max_clique(&matrix, &all(3), &CliqueConfig::default()).unwrap();
        assert_eq!(clique.len(), 1);
    }

    #[test]
    fn finds_triangle_beside_path() {
        // Triangle 2-3-4 plus path 0-1-2.
        let matrix = graph(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (2, 4)]);
        let mut clique = max_clique(&matrix, &all(5), &CliqueConfig::default()).unwrap();
        clique.sort_unstable();
        assert_eq!(clique, vec![2, 3, 4]);
    }

    #[test]
    fn complete_graph_is_one_clique() {
        let size = 7;
        let edges: Vec<(usize, usize)> = (0..size)
            .flat_map(|a| (a + 1..size).map(move |b| (a, b)))
            .collect();
        let matrix = graph(size, &edges);
        for config in [CliqueConfig::default(), static_config()] {
            let clique = max_clique(&matrix, &all(size), &config).unwrap();
            assert_eq!(clique.len(), size);
        }
    }

    #[test]
    fn respects_active_subset() {
        let matrix = graph(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (2, 4)]);
        let mut clique = max_clique(&matrix, &[0, 1, 3, 4], &CliqueConfig::default()).unwrap();
        clique.sort_unstable();
        assert!(clique == vec![0, 1] || clique == vec![3, 4], "{clique:?}");
    }

    #[test]
    fn three_groups_with_single_compatible_pair() {
        // A-C compatible, B compatible with nobody.
        let matrix = graph(3, &[(0, 2)]);
        let mut clique = max_clique(&matrix, &all(3), &CliqueConfig::default()).unwrap();
        clique.sort_unstable();
        assert_eq!(clique, vec![0, 2]);
    }

    #[test]
    fn matches_brute_force_on_every_six_vertex_graph() {
        let size = 6;
        let pairs: Vec<(usize, usize)> = (0..size)
            .flat_map(|a| (a + 1..size).map(move |b| (a, b)))
            .collect();
        for mask in 0_u32..(1 << pairs.len()) {
            let edges: Vec<(usize, usize)> = pairs
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &edge)| edge)
                .collect();
            let matrix = graph(size, &edges);
            let expected = brute_force_size(&matrix, &all(size));
            for config in [CliqueConfig::default(), static_config()] {
                let clique = max_clique(&matrix, &all(size), &config).unwrap();
                assert_eq!(clique.len(), expected, "edges {edges:?}");
                assert!(matrix.is_clique(&clique), "edges {edges:?}");
            }
        }
    }

    #[test]
    fn matches_brute_force_on_dense_graph() {
        // Complement of a 12-cycle with chords removed every third vertex.
        let size = 12;
        let mut matrix = AdjacencyMatrix::new(size);
        for a in 0..size {
            for b in a + 1..size {
                let adjacent_on_cycle = b - a == 1 || (a == 0 && b == size - 1);
                let chord = (b - a) % 3 == 0 && a % 2 == 0;
                if !adjacent_on_cycle && !chord {
                    matrix.connect(a, b);
                }
            }
        }
        let expected = brute_force_size(&matrix, &all(size));
        for config in [CliqueConfig::default(), static_config()] {
            let clique = max_clique(&matrix, &all(size), &config).unwrap();
            assert_eq!(clique.len(), expected);
            assert!(matrix.is_clique(&clique));
        }
    }

    #[test]
    fn search_is_deterministic() {
        let matrix = graph(6, &[(0, 1), (2, 3), (4, 5), (0, 2), (1, 3)]);
        let first = max_clique(&matrix, &all(6), &CliqueConfig::default()).unwrap();
        for _ in 0..5 {
            assert_eq!(
                max_clique(&matrix, &all(6), &CliqueConfig::default()).unwrap(),
                first
            );
        }
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let size = 8;
        let edges: Vec<(usize, usize)> = (0..size)
            .flat_map(|a| (a + 1..size).map(move |b| (a, b)))
            .collect();
        let matrix = graph(size, &edges);
        let config = CliqueConfig {
            step_budget: 2,
            ..CliqueConfig::default()
        };
        assert_eq!(
            max_clique(&matrix, &all(size), &config),
            Err(CliqueError::BudgetExhausted { budget: 2 })
        );
    }
}
