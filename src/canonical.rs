//! Canonical serialization for run fingerprints.
//!
//! Results and parameters are hashed from their JSON form. Everything
//! hashed here is built from `BTreeMap`s and `Vec`s, so field and key
//! order are stable, and `serde_json` prints `f64` in shortest
//! round-trip form, so equal scores always hash equally.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Only called on map/vec/number/string trees, which cannot fail.
    serde_json::to_vec(value).expect("canonical serialization failed")
}

/// xxh64 of the canonical bytes.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// [`canonical_hash`] as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BurstSeries, FeatureBurstMap, FeatureId};
    use std::collections::BTreeMap;

    fn series(scores: &[(i64, f64)]) -> BurstSeries {
        BurstSeries::from_map(scores.iter().copied().collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut a = FeatureBurstMap::new();
        a.insert(FeatureId::from("process"), series(&[(2000, 0.0), (2001, 0.12)]));
        a.insert(FeatureId::from("method"), series(&[(2000, 0.2)]));

        let mut b = FeatureBurstMap::new();
        b.insert(FeatureId::from("method"), series(&[(2000, 0.2)]));
        b.insert(FeatureId::from("process"), series(&[(2001, 0.12), (2000, 0.0)]));

        assert_eq!(canonical_hash_hex(&a), canonical_hash_hex(&b));
    }

    #[test]
    fn test_score_change_changes_hash() {
        let a = series(&[(2000, 0.0), (2001, 0.12)]);
        let b = series(&[(2000, 0.0), (2001, 0.120_000_1)]);
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
        assert_eq!(canonical_hash_hex(&a).len(), 16);
    }
}
