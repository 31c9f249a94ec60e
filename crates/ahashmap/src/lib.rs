//! Hash map/set aliases using `ahash` as the hasher, instead of the
//! DoS-resistant but slower default SipHash. Nothing here holds untrusted
//! keys across a process boundary, so the speed trade is free.

#[cfg(feature = "ahash")]
pub type ARandomState = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub type ARandomState = std::collections::hash_map::RandomState;

pub type AHashMap<K, V> = std::collections::HashMap<K, V, ARandomState>;
pub type AHashSet<T> = std::collections::HashSet<T, ARandomState>;

pub mod hash_map {
    pub use std::collections::hash_map::Entry;
}
