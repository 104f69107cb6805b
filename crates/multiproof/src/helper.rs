//! Helper-Index Derivation
//!
//! Which extra nodes a multiproof needs depends only on the target indices,
//! never on digests, so proof shape is known before anything is hashed.

use std::collections::BTreeSet;

use crate::gindex::GeneralizedIndex;
use crate::proof::ProofError;

/// A validated set of target indices, in caller order.
///
/// Rejects empty sets, duplicates, and targets nested under other targets.
/// A nested target would be seeded into the verifier as a known node, so the
/// subtree below it would never be checked against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet<'a> {
    indices: &'a [GeneralizedIndex],
}

impl<'a> TargetSet<'a> {
    pub fn new(indices: &'a [GeneralizedIndex]) -> Result<Self, ProofError> {
        if indices.is_empty() {
            return Err(ProofError::EmptyIndexSet);
        }

        let mut seen = BTreeSet::new();
        for index in indices {
            if !seen.insert(index) {
                return Err(ProofError::DuplicateIndex(index.clone()));
            }
        }

        // Only depths that hold a target can hold an ancestor target, so each
        // index is shifted once per such depth instead of walked to the root.
        let depths: BTreeSet<u64> = indices.iter().map(GeneralizedIndex::depth).collect();
        for index in indices {
            let depth = index.depth();
            for &shallower in depths.range(..depth) {
                let ancestor = index.ancestor_at(shallower);
                if seen.contains(&ancestor) {
                    return Err(ProofError::OverlappingIndices {
                        ancestor,
                        descendant: index.clone(),
                    });
                }
            }
        }

        Ok(Self { indices })
    }

    #[must_use]
    pub fn indices(&self) -> &'a [GeneralizedIndex] {
        self.indices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Deepest target, which bounds the depth of any tree proving the set.
    #[must_use]
    pub fn max_depth(&self) -> u64 {
        self.indices
            .iter()
            .map(GeneralizedIndex::depth)
            .max()
            .unwrap_or(0)
    }

    /// Fewest helpers any proof of this set can have.
    ///
    /// The union of target paths has at least `max_depth` internal nodes, and
    /// the helper count is that number minus `len() - 1`. Costs nothing but
    /// the depths, so it bounds the proof before any path is expanded.
    #[must_use]
    pub fn min_helper_count(&self) -> u64 {
        (self.max_depth() + 1).saturating_sub(self.len() as u64)
    }

    #[must_use]
    pub fn helper_indices(&self) -> Vec<GeneralizedIndex> {
        helper_indices(self.indices)
    }
}

/// Get the generalized indices of all "extra" nodes needed to prove the given
/// indices: every sibling along every target's path, minus anything on a path.
///
/// Sorted in decreasing order, so a single-index result is the ordinary
/// leaf-to-root Merkle branch.
#[must_use]
pub fn helper_indices(indices: &[GeneralizedIndex]) -> Vec<GeneralizedIndex> {
    let mut all_helper_indices = BTreeSet::new();
    let mut all_path_indices = BTreeSet::new();
    for index in indices {
        all_helper_indices.extend(index.branch_indices());
        all_path_indices.extend(index.path_indices());
    }

    all_helper_indices
        .into_iter()
        .rev()
        .filter(|index| !all_path_indices.contains(index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn g(i: u64) -> GeneralizedIndex {
        GeneralizedIndex::try_from(i).unwrap()
    }

    fn gs(indices: &[u64]) -> Vec<GeneralizedIndex> {
        indices.iter().copied().map(g).collect()
    }

    #[test]
    fn test_single_index_is_branch() {
        assert_eq!(helper_indices(&gs(&[14])), gs(&[15, 6, 2]));
        assert_eq!(helper_indices(&gs(&[14])), g(14).branch_indices());
        assert!(helper_indices(&gs(&[1])).is_empty());
    }

    #[test]
    fn test_worked_example() {
        assert_eq!(helper_indices(&gs(&[8, 9, 14])), gs(&[15, 6, 5]));
    }

    #[test]
    fn test_shared_ancestors_are_not_helpers() {
        // 8 and 11 share node 2; 5 and 4 are on paths, only 3, 9, 10 remain
        assert_eq!(helper_indices(&gs(&[8, 11])), gs(&[10, 9, 3]));
    }

    #[test]
    fn test_mixed_depths() {
        // A container field (depth 2) next to a list element (depth 4)
        assert_eq!(helper_indices(&gs(&[5, 27])), gs(&[26, 12, 7, 4]));
    }

    #[test]
    fn test_order_of_targets_is_irrelevant() {
        assert_eq!(
            helper_indices(&gs(&[14, 9, 8])),
            helper_indices(&gs(&[8, 9, 14]))
        );
    }

    #[test]
    fn test_target_set_validation() {
        assert_eq!(TargetSet::new(&[]), Err(ProofError::EmptyIndexSet));
        assert_eq!(
            TargetSet::new(&gs(&[8, 9, 8])),
            Err(ProofError::DuplicateIndex(g(8)))
        );
        assert_eq!(
            TargetSet::new(&gs(&[9, 2])),
            Err(ProofError::OverlappingIndices {
                ancestor: g(2),
                descendant: g(9)
            })
        );
        assert!(matches!(
            TargetSet::new(&gs(&[1, 5])),
            Err(ProofError::OverlappingIndices { .. })
        ));

        let targets = gs(&[8, 9, 14]);
        let set = TargetSet::new(&targets).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.max_depth(), 3);
        assert_eq!(set.helper_indices(), gs(&[15, 6, 5]));
    }

    #[test]
    fn test_overlap_found_across_distant_depths() {
        let below_six = GeneralizedIndex::from_depth_and_offset(30, 5).unwrap();
        let deep = GeneralizedIndex::concat(&[g(6), below_six]);
        let targets = vec![g(7), deep.clone(), g(3)];
        assert_eq!(
            TargetSet::new(&targets),
            Err(ProofError::OverlappingIndices {
                ancestor: g(3),
                descendant: g(7)
            })
        );
        assert_eq!(
            TargetSet::new(&[deep.clone(), g(6)]),
            Err(ProofError::OverlappingIndices {
                ancestor: g(6),
                descendant: deep
            })
        );
    }

    #[test]
    fn test_min_helper_count() {
        // Worked example: 5 internal path nodes, 3 targets, 3 helpers
        assert_eq!(TargetSet::new(&gs(&[8, 9, 14])).unwrap().min_helper_count(), 1);
        assert_eq!(TargetSet::new(&gs(&[14])).unwrap().min_helper_count(), 3);
        assert_eq!(TargetSet::new(&gs(&[1])).unwrap().min_helper_count(), 0);
        assert_eq!(TargetSet::new(&gs(&[4, 5, 6, 7])).unwrap().min_helper_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_helpers_disjoint_and_descending(raw in prop::collection::btree_set(1u64..4096, 1..8)) {
            let targets: Vec<GeneralizedIndex> = raw.into_iter().map(g).collect();
            prop_assume!(TargetSet::new(&targets).is_ok());

            let helpers = helper_indices(&targets);
            prop_assert!(helpers.windows(2).all(|w| w[0] > w[1]));

            let paths: BTreeSet<GeneralizedIndex> =
                targets.iter().flat_map(GeneralizedIndex::path_indices).collect();
            for helper in &helpers {
                prop_assert!(!paths.contains(helper));
                prop_assert!(!helper.is_root());
            }
        }

        #[test]
        fn prop_min_helper_count_is_a_lower_bound(raw in prop::collection::btree_set(1u64..4096, 1..8)) {
            let targets: Vec<GeneralizedIndex> = raw.into_iter().map(g).collect();
            prop_assume!(TargetSet::new(&targets).is_ok());
            let set = TargetSet::new(&targets).unwrap();
            prop_assert!(set.helper_indices().len() as u64 >= set.min_helper_count());
        }

        #[test]
        fn prop_helper_count_never_exceeds_separate_branches(raw in prop::collection::btree_set(2u64..4096, 1..8)) {
            let targets: Vec<GeneralizedIndex> = raw.into_iter().map(g).collect();
            let separate: usize = targets.iter().map(|t| t.branch_indices().len()).sum();
            prop_assert!(helper_indices(&targets).len() <= separate);
        }
    }
}
