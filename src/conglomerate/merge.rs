//! Merging of overlapping UZA sets into disjoint groups.
//!
//! Two strategies produce the same partition: [`merge_union_find`], used by
//! default, and [`merge_pairwise`], a fixed-point rescan of every pair of
//! groups that is kept as the reference for small inputs.

use clap::ValueEnum;
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{LoaderError, Result};
use crate::membership::CandidateSet;

/// A set of UZA names that belong to one conglomerate.
pub type MergedGroup = IndexSet<String>;

pub const DEFAULT_MAX_PASSES: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MergeStrategy {
    #[default]
    UnionFind,
    Pairwise,
}

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Upper bound on full passes of the pairwise strategy.
    pub max_passes: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// Merges `candidates` with the strategy chosen in `options`.
pub fn merge_groups(candidates: &[CandidateSet], options: &MergeOptions) -> Result<Vec<MergedGroup>> {
    match options.strategy {
        MergeStrategy::UnionFind => Ok(merge_union_find(candidates)),
        MergeStrategy::Pairwise => merge_pairwise(candidates, options.max_passes),
    }
}

/// Disjoint-set forest over dense indices, with path compression and union by size.
#[derive(Debug)]
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }

        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }
}

/// Connected components of the co-occurrence graph of UZA names.
///
/// Groups come out ordered by their earliest-seen member and list their
/// members in first-seen order.
pub fn merge_union_find(candidates: &[CandidateSet]) -> Vec<MergedGroup> {
    let mut names: IndexSet<&str> = IndexSet::new();
    for set in candidates {
        for name in set {
            names.insert(name.as_str());
        }
    }

    let mut sets = DisjointSets::new(names.len());
    let mut unions = 0usize;
    for set in candidates {
        let mut members = set.iter().filter_map(|name| names.get_index_of(name.as_str()));
        let Some(first) = members.next() else {
            continue;
        };
        for other in members {
            if sets.union(first, other) {
                unions += 1;
            }
        }
    }

    let mut groups: IndexMap<usize, MergedGroup> = IndexMap::new();
    for (idx, name) in names.iter().enumerate() {
        let root = sets.find(idx);
        groups.entry(root).or_default().insert((*name).to_string());
    }

    debug!(
        candidates = candidates.len(),
        names = names.len(),
        unions,
        groups = groups.len(),
        "Union-find merge complete"
    );

    groups.into_values().collect()
}

/// Repeatedly unions any two live groups that share a name until a full pass
/// changes nothing.
///
/// Fails with [`LoaderError::IterationLimitExceeded`] if the pass numbered
/// `max_passes` still merged something.
pub fn merge_pairwise(candidates: &[CandidateSet], max_passes: usize) -> Result<Vec<MergedGroup>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut groups: Vec<MergedGroup> = candidates.to_vec();
    let mut alive = vec![true; groups.len()];

    for pass in 1..=max_passes {
        let live = alive.iter().filter(|a| **a).count();
        debug!(pass, live, "Pairwise merge pass");

        let mut changed = false;
        for i in 0..groups.len() {
            if !alive[i] {
                continue;
            }

            for j in 0..groups.len() {
                if i == j || !alive[j] || groups[i].is_disjoint(&groups[j]) {
                    continue;
                }

                let absorbed = std::mem::take(&mut groups[j]);
                groups[i].extend(absorbed);
                alive[j] = false;
                changed = true;
            }
        }

        if !changed {
            return Ok(groups
                .into_iter()
                .zip(alive)
                .filter_map(|(group, alive)| alive.then_some(group))
                .collect());
        }
    }

    Err(LoaderError::IterationLimitExceeded { max_passes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use std::collections::BTreeSet;

    fn set(names: &[&str]) -> CandidateSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn partition(groups: &[MergedGroup]) -> BTreeSet<BTreeSet<String>> {
        groups
            .iter()
            .map(|g| g.iter().cloned().collect())
            .collect()
    }

    fn expected(groups: &[&[&str]]) -> BTreeSet<BTreeSet<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|n| n.to_string()).collect())
            .collect()
    }

    fn sample() -> Vec<CandidateSet> {
        vec![
            set(&["A", "B"]),
            set(&["C", "D"]),
            set(&["E", "F"]),
            set(&["B", "C"]),
            set(&["G", "H", "I"]),
            set(&["I", "J"]),
            set(&["K", "L"]),
            set(&["F", "E"]),
        ]
    }

    #[test]
    fn test_chain_collapses_and_unrelated_stays_apart() {
        let candidates = vec![set(&["X", "Y"]), set(&["Y", "Z"]), set(&["W", "V"])];
        let want = expected(&[&["X", "Y", "Z"], &["W", "V"]]);

        assert_eq!(partition(&merge_union_find(&candidates)), want);
        assert_eq!(partition(&merge_pairwise(&candidates, 10).unwrap()), want);
    }

    #[test]
    fn test_singleton_set_is_its_own_group() {
        let candidates = vec![set(&["X", "Y"]), set(&["Y", "Z"]), set(&["W"])];
        let want = expected(&[&["X", "Y", "Z"], &["W"]]);

        assert_eq!(partition(&merge_union_find(&candidates)), want);
        assert_eq!(partition(&merge_pairwise(&candidates, 10).unwrap()), want);

        let alone = merge_union_find(&[set(&["W"])]);
        assert_eq!(partition(&alone), expected(&[&["W"]]));
    }

    #[test]
    fn test_strategies_agree() {
        let candidates = sample();
        let want = expected(&[
            &["A", "B", "C", "D"],
            &["E", "F"],
            &["G", "H", "I", "J"],
            &["K", "L"],
        ]);

        assert_eq!(partition(&merge_union_find(&candidates)), want);
        assert_eq!(partition(&merge_pairwise(&candidates, 10).unwrap()), want);
    }

    #[test]
    fn test_partition_is_independent_of_input_order() {
        let base = sample();
        let want = partition(&merge_union_find(&base));
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..25 {
            let mut shuffled: Vec<CandidateSet> = base
                .iter()
                .map(|s| {
                    let mut names: Vec<String> = s.iter().cloned().collect();
                    names.shuffle(&mut rng);
                    names.into_iter().collect()
                })
                .collect();
            shuffled.shuffle(&mut rng);

            assert_eq!(partition(&merge_union_find(&shuffled)), want);
            assert_eq!(partition(&merge_pairwise(&shuffled, 10).unwrap()), want);
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_union_find(&sample());
        let twice = merge_union_find(&once);
        assert_eq!(partition(&once), partition(&twice));

        let once = merge_pairwise(&sample(), 10).unwrap();
        let twice = merge_pairwise(&once, 10).unwrap();
        assert_eq!(partition(&once), partition(&twice));
    }

    #[test]
    fn test_groups_are_disjoint_and_complete() {
        let candidates = sample();
        let groups = merge_union_find(&candidates);

        let input: BTreeSet<&String> = candidates.iter().flatten().collect();
        let output: Vec<&String> = groups.iter().flatten().collect();
        let output_set: BTreeSet<&String> = output.iter().copied().collect();

        assert_eq!(output.len(), output_set.len(), "a name landed in two groups");
        assert_eq!(input, output_set);

        for candidate in &candidates {
            let holders = groups
                .iter()
                .filter(|g| candidate.iter().all(|n| g.contains(n)))
                .count();
            assert_eq!(holders, 1);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_union_find(&[]).is_empty());
        assert!(merge_pairwise(&[], 1).unwrap().is_empty());
    }

    #[test]
    fn test_union_find_orders_by_first_seen() {
        let candidates = vec![set(&["A", "B"]), set(&["C", "D"]), set(&["B", "C"])];
        let groups = merge_union_find(&candidates);

        assert_eq!(groups.len(), 1);
        let members: Vec<&str> = groups[0].iter().map(String::as_str).collect();
        assert_eq!(members, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_pairwise_appends_absorbed_members() {
        let candidates = vec![set(&["A", "B"]), set(&["B", "C"])];
        let groups = merge_pairwise(&candidates, 10).unwrap();

        let members: Vec<&str> = groups[0].iter().map(String::as_str).collect();
        assert_eq!(members, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_pairwise_pass_limit() {
        let candidates = vec![set(&["A", "B"]), set(&["B", "C"])];

        // the first pass merges, so a second pass is needed to see no change
        match merge_pairwise(&candidates, 1) {
            Err(LoaderError::IterationLimitExceeded { max_passes }) => assert_eq!(max_passes, 1),
            other => panic!("expected IterationLimitExceeded, got {other:?}"),
        }
        assert!(merge_pairwise(&candidates, 2).is_ok());
    }

    #[test]
    fn test_merge_groups_dispatches() {
        let candidates = sample();
        let uf = merge_groups(&candidates, &MergeOptions::default()).unwrap();
        let pw = merge_groups(
            &candidates,
            &MergeOptions {
                strategy: MergeStrategy::Pairwise,
                max_passes: 10,
            },
        )
        .unwrap();
        assert_eq!(partition(&uf), partition(&pw));
    }

    #[test]
    fn test_disjoint_sets_union_by_size() {
        let mut sets = DisjointSets::new(4);
        assert!(sets.union(0, 1));
        assert!(sets.union(2, 0));
        assert!(!sets.union(1, 2));
        assert_eq!(sets.find(2), sets.find(1));
        assert_ne!(sets.find(3), sets.find(0));
        let root = sets.find(0);
        assert_eq!(sets.size[root], 3);
    }
}
