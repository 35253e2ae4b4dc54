//! Candidate deduplication by source identity.
//!
//! Expansion fans the same query out as several variants, so one
//! provider frequently returns the same item more than once. Identity
//! is the `(source, id)` pair; titles are not compared because distinct
//! items legitimately share names across sources.

use std::collections::HashMap;

use crate::types::Candidate;

/// Deduplicates candidates fetched across query variants.
///
/// Each candidate is tagged with the index of the expansion variant
/// that produced it. When the same `(source, id)` appears under several
/// variants, the earliest variant's copy is kept; variants are ordered
/// from most to least faithful to the user's input, so the earliest
/// copy carries the least-transformed context. Ties keep the first
/// copy encountered.
///
/// The output order is **not** guaranteed; ranking sorts afterwards.
pub(crate) fn dedup(tagged: Vec<(usize, Candidate)>) -> Vec<Candidate> {
    let mut groups: HashMap<(String, String), (usize, Candidate)> = HashMap::new();

    for (variant_index, candidate) in tagged {
        let key = (candidate.source.clone(), candidate.id.clone());
        groups
            .entry(key)
            .and_modify(|(best_index, best)| {
                if variant_index < *best_index {
                    *best_index = variant_index;
                    *best = candidate.clone();
                }
            })
            .or_insert((variant_index, candidate));
    }

    groups
        .into_values()
        .map(|(_, candidate)| candidate)
        .collect()
}
