// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Pluggable perfect-hash-function recipes for named-type member
//! lookup. A recipe builds some opaque state from the member-name set
//! at type-creation time, then maps any byte string to an index in
//! `[0, len)` — including strings never seen at construction, which
//! `lookup_fast` trusts callers not to probe with.
//!
//! The type-erased `extern "C"` function-pointer struct the original
//! system builds recipes from doesn't fit Rust's grain: a recipe here
//! is a [`PhfRecipe`] trait object, and [`DefaultPhf`] is the
//! hashmap-backed recipe every [`crate::context::RuntimeContext`] uses
//! unless a caller supplies another. A from-scratch minimal perfect
//! hash function is out of scope here: the default recipe is a plain
//! `hashbrown` map from a name's hash to its index, with any
//! previously-unseen key deterministically falling back to index `0`.

use hashbrown::HashMap;

/// A constructed perfect-hash-function instance over a fixed key set.
pub trait PerfectHash: Send + Sync {
    /// Maps `key` to an index in `[0, len)`, where `len` is the number
    /// of keys this instance was built from. Keys outside the
    /// original set may map anywhere in range; this is by design, not
    /// a bug — callers comparing the stored key afterward detect it.
    fn lookup(&self, key: &[u8]) -> u64;
}

/// Builds a [`PerfectHash`] from a set of keys.
pub trait PhfRecipe: Send + Sync {
    /// Builds an instance over `keys`, in original-index order.
    ///
    /// # Errors
    /// Returns `Err(())` if construction fails (the original mirrors
    /// this with a nonzero `phf_construct` return).
    fn construct(&self, keys: &[&[u8]]) -> Result<Box<dyn PerfectHash>, ()>;
}

/// The default [`PhfRecipe`]: an exact hashmap from key to index, with
/// unseen keys falling back to `0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPhfRecipe;

struct DefaultPhf {
    table: HashMap<Box<[u8]>, u64>,
}

impl PerfectHash for DefaultPhf {
    fn lookup(&self, key: &[u8]) -> u64 {
        self.table.get(key).copied().unwrap_or(0)
    }
}

impl PhfRecipe for DefaultPhfRecipe {
    fn construct(&self, keys: &[&[u8]]) -> Result<Box<dyn PerfectHash>, ()> {
        let mut table = HashMap::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            table.insert(Box::<[u8]>::from(*key), idx as u64);
        }
        Ok(Box::new(DefaultPhf { table }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_known_keys_exactly() {
        let recipe = DefaultPhfRecipe;
        let keys: Vec<&[u8]> = vec![b"alpha", b"beta", b"gamma"];
        let phf = recipe.construct(&keys).unwrap();
        assert_eq!(phf.lookup(b"alpha"), 0);
        assert_eq!(phf.lookup(b"beta"), 1);
        assert_eq!(phf.lookup(b"gamma"), 2);
    }

    #[test]
    fn unknown_key_falls_back_to_zero() {
        let recipe = DefaultPhfRecipe;
        let keys: Vec<&[u8]> = vec![b"alpha", b"beta"];
        let phf = recipe.construct(&keys).unwrap();
        assert_eq!(phf.lookup(b"not-a-member"), 0);
    }
}
