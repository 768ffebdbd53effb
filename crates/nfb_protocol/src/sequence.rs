use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// How a group of repeated protocol indices is expanded into the flat
/// block sequence that actually gets run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupExpansion {
    /// Shuffle each group's own list independently, then lay groups end
    /// to end in the order they were declared.
    ShuffleConcatenate,
    /// Interleave groups round-robin (one index from each group per
    /// round), the `zip_longest` way: a group with fewer entries than
    /// its peers simply stops contributing once exhausted rather than
    /// padding the output.
    RoundRobinInterleave,
}

/// A declared group of protocol-index repeats plus how to expand it, with
/// an optional separator protocol index interleaved between every pair
/// of consecutive elements in the expanded output (e.g. a rest block
/// between feedback trials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolGroup {
    pub lists: Vec<Vec<usize>>,
    pub expansion: GroupExpansion,
    #[serde(default)]
    pub split_by: Option<usize>,
}

pub struct ProtocolSequence;

impl ProtocolSequence {
    /// Expands a single group into its flat list of protocol indices.
    pub fn expand_group(group: &ProtocolGroup, rng: &mut impl Rng) -> Result<Vec<usize>, ProtocolError> {
        if group.lists.iter().all(|l| l.is_empty()) {
            return Err(ProtocolError::EmptyGroup(0));
        }
        let expanded = match group.expansion {
            GroupExpansion::ShuffleConcatenate => {
                let mut out = Vec::new();
                for list in &group.lists {
                    let mut list = list.clone();
                    list.shuffle(rng);
                    out.extend(list);
                }
                out
            }
            GroupExpansion::RoundRobinInterleave => {
                let max_len = group.lists.iter().map(|l| l.len()).max().unwrap_or(0);
                let mut out = Vec::with_capacity(max_len * group.lists.len());
                for i in 0..max_len {
                    for list in &group.lists {
                        if let Some(&v) = list.get(i) {
                            out.push(v);
                        }
                    }
                }
                out
            }
        };
        Ok(match group.split_by {
            Some(sep) => interleave_separator(&expanded, sep),
            None => expanded,
        })
    }

    /// Expands every declared group in order and concatenates the
    /// results into the full session's block sequence.
    pub fn build(groups: &[ProtocolGroup], rng: &mut impl Rng) -> Result<Vec<usize>, ProtocolError> {
        let mut sequence = Vec::new();
        for group in groups {
            sequence.extend(Self::expand_group(group, rng)?);
        }
        Ok(sequence)
    }
}

fn interleave_separator(sequence: &[usize], separator: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(sequence.len() * 2);
    for (i, &v) in sequence.iter().enumerate() {
        if i > 0 {
            out.push(separator);
        }
        out.push(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn shuffle_concatenate_preserves_multiset_per_group() {
        let group = ProtocolGroup {
            lists: vec![vec![0, 0, 1], vec![2, 2]],
            expansion: GroupExpansion::ShuffleConcatenate,
            split_by: None,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let expanded = ProtocolSequence::expand_group(&group, &mut rng).unwrap();
        let mut sorted = expanded.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 0, 1, 2, 2]);
    }

    #[test]
    fn round_robin_interleaves_and_drops_exhausted_groups() {
        let group = ProtocolGroup {
            lists: vec![vec![0, 0, 0], vec![1]],
            expansion: GroupExpansion::RoundRobinInterleave,
            split_by: None,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let expanded = ProtocolSequence::expand_group(&group, &mut rng).unwrap();
        assert_eq!(expanded, vec![0, 1, 0, 0]);
    }

    #[test]
    fn split_by_inserts_separator_between_elements() {
        let group = ProtocolGroup {
            lists: vec![vec![0, 0]],
            expansion: GroupExpansion::ShuffleConcatenate,
            split_by: Some(9),
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let expanded = ProtocolSequence::expand_group(&group, &mut rng).unwrap();
        assert_eq!(expanded, vec![0, 9, 0]);
    }

    #[test]
    fn empty_group_is_rejected() {
        let group = ProtocolGroup {
            lists: vec![vec![], vec![]],
            expansion: GroupExpansion::ShuffleConcatenate,
            split_by: None,
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert!(ProtocolSequence::expand_group(&group, &mut rng).is_err());
    }
}
