//! Data generators for benchmarks

use bptdb::{Value, VALUE_SIZE};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Keys `0..count` in ascending order
pub fn sequential_keys(count: usize) -> Vec<i64> {
    (0..count as i64).collect()
}

/// Keys `0..count` in a seeded random order
pub fn shuffled_keys(count: usize, seed: u64) -> Vec<i64> {
    let mut keys = sequential_keys(count);
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    keys
}

/// A lorem-ipsum value, cut to fit the fixed value size
pub fn generate_value() -> Value {
    let text: String = Sentence(4..16).fake();
    let bytes = text.as_bytes();
    let len = bytes.len().min(VALUE_SIZE);
    Value::new(&bytes[..len]).unwrap_or_else(|_| Value::zeroed())
}

/// `(key, value)` pairs for the given keys
pub fn generate_records(keys: &[i64]) -> Vec<(i64, Value)> {
    keys.iter().map(|&k| (k, generate_value())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffled_keys_is_permutation() {
        let mut keys = shuffled_keys(500, 1);
        assert_ne!(keys, sequential_keys(500));
        keys.sort();
        assert_eq!(keys, sequential_keys(500));
    }

    #[test]
    fn test_shuffled_keys_is_seeded() {
        assert_eq!(shuffled_keys(100, 9), shuffled_keys(100, 9));
    }

    #[test]
    fn test_generate_records() {
        let records = generate_records(&sequential_keys(10));
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|(_, v)| !v.trimmed().is_empty()));
    }
}
