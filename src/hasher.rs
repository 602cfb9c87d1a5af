//! Key hashing for shard selection.

/// Function mapping a decision key to the 64-bit hash used to pick a shard.
///
/// Any deterministic, well-distributed function works; cryptographic
/// strength is not required.
pub type KeyHasher = fn(&str) -> u64;

const OFFSET64: u64 = 14695981039346656037;
const PRIME64: u64 = 1099511628211;

/// Byte-wise FNV-1a-style mix over the key.
///
/// Deterministic and stable for the life of the process. Not guaranteed to
/// match any published FNV test vectors bit-for-bit.
pub fn pseudo_fnv64a(s: &str) -> u64 {
    let mut h = OFFSET64;
    for b in s.bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME64);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(pseudo_fnv64a("10.0.0.1"), pseudo_fnv64a("10.0.0.1"));
        assert_eq!(pseudo_fnv64a(""), OFFSET64);
    }

    #[test]
    fn distinct_keys_usually_hash_apart() {
        let a = pseudo_fnv64a("X-Auth-Token: alpha");
        let b = pseudo_fnv64a("X-Auth-Token: bravo");
        assert_ne!(a, b);
    }

    #[test]
    fn spreads_sequential_ip_strings_across_shards() {
        // Typical key population: client IPs. The mix should not collapse
        // them into a handful of shards.
        let shards = 64u64;
        let mut seen = std::collections::HashSet::new();
        for i in 0..=255u16 {
            let key = format!("192.168.1.{i}");
            seen.insert(pseudo_fnv64a(&key) % shards);
        }
        assert!(seen.len() > 32, "only {} of {} shards hit", seen.len(), shards);
    }

    #[test]
    fn handles_multibyte_unicode_keys() {
        let h = pseudo_fnv64a("ütilisateur-züri");
        assert_eq!(h, pseudo_fnv64a("ütilisateur-züri"));
        assert_ne!(h, pseudo_fnv64a("utilisateur-zuri"));
    }
}
