//! Chained hash storage engine.
//!
//! A fixed array of bucket heads, each a singly linked chain with head
//! insertion. The hash is the byte sum of the key modulo the slot count,
//! weak and collision-prone, kept so existing placement test vectors stay
//! stable. One mutex guards the whole table; every entry point holds it for
//! the full traversal, and it is released on every return path by scope.

use crate::error::{KvError, KvResult};
use std::sync::Mutex;

/// Key capacity per node, counting a terminating byte. Usable keys are
/// at most `MAX_KEY_LEN - 1` bytes.
pub const MAX_KEY_LEN: usize = 128;
/// Value capacity per node, counting a terminating byte.
pub const MAX_VALUE_LEN: usize = 512;
/// Number of bucket heads.
pub const BUCKET_COUNT: usize = 1024;

#[derive(Debug)]
struct HashNode {
    key: Vec<u8>,
    value: Vec<u8>,
    next: Option<Box<HashNode>>,
}

#[derive(Debug)]
struct Table {
    buckets: Vec<Option<Box<HashNode>>>,
    count: usize,
}

/// Mutex-guarded chained hash table.
#[derive(Debug)]
pub struct HashStore {
    table: Mutex<Table>,
}

fn bucket_index(key: &[u8]) -> usize {
    let sum: usize = key.iter().map(|&b| b as usize).sum();
    sum % BUCKET_COUNT
}

fn check_key(key: &[u8]) -> KvResult<()> {
    if key.is_empty() || key.len() >= MAX_KEY_LEN {
        return Err(KvError::BadParam);
    }
    Ok(())
}

fn check_value(value: &[u8]) -> KvResult<()> {
    if value.len() >= MAX_VALUE_LEN {
        return Err(KvError::BadParam);
    }
    Ok(())
}

impl HashStore {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        buckets.resize_with(BUCKET_COUNT, || None);
        HashStore {
            table: Mutex::new(Table { buckets, count: 0 }),
        }
    }

    /// Number of live entries across all buckets.
    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a new key. Fails with `AlreadyExists` when the key is present
    /// in its bucket, `BadParam` when key or value exceeds node capacity.
    pub fn set(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        check_key(key)?;
        check_value(value)?;
        let idx = bucket_index(key);
        let mut table = self.table.lock().map_err(|_| KvError::Internal)?;

        let mut cur = table.buckets[idx].as_deref();
        while let Some(node) = cur {
            if node.key == key {
                return Err(KvError::AlreadyExists);
            }
            cur = node.next.as_deref();
        }

        let head = table.buckets[idx].take();
        table.buckets[idx] = Some(Box::new(HashNode {
            key: key.to_vec(),
            value: value.to_vec(),
            next: head,
        }));
        table.count += 1;
        Ok(())
    }

    /// Fetch the value stored under `key` as an owned copy.
    pub fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        check_key(key)?;
        let idx = bucket_index(key);
        let table = self.table.lock().map_err(|_| KvError::Internal)?;

        let mut cur = table.buckets[idx].as_deref();
        while let Some(node) = cur {
            if node.key == key {
                return Ok(node.value.clone());
            }
            cur = node.next.as_deref();
        }
        Err(KvError::NotFound)
    }

    /// Replace the value of an existing key.
    pub fn modify(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        check_key(key)?;
        check_value(value)?;
        let idx = bucket_index(key);
        let mut table = self.table.lock().map_err(|_| KvError::Internal)?;

        let mut cur = table.buckets[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.key == key {
                node.value = value.to_vec();
                return Ok(());
            }
            cur = node.next.as_deref_mut();
        }
        Err(KvError::NotFound)
    }

    /// Unlink a key from its bucket chain.
    pub fn delete(&self, key: &[u8]) -> KvResult<()> {
        check_key(key)?;
        let idx = bucket_index(key);
        let mut guard = self.table.lock().map_err(|_| KvError::Internal)?;
        let table = &mut *guard;

        let mut cur = &mut table.buckets[idx];
        loop {
            match cur {
                None => return Err(KvError::NotFound),
                Some(node) if node.key == key => {
                    *cur = node.next.take();
                    table.count -= 1;
                    return Ok(());
                }
                Some(node) => cur = &mut node.next,
            }
        }
    }

    pub fn exists(&self, key: &[u8]) -> KvResult<()> {
        self.get(key).map(|_| ())
    }

    /// Drop every chain. Idempotent.
    pub fn clear(&self) {
        if let Ok(mut table) = self.table.lock() {
            for bucket in table.buckets.iter_mut() {
                // Unlink iteratively so a long chain cannot overflow the
                // stack through recursive box drops.
                let mut node = bucket.take();
                while let Some(mut boxed) = node {
                    node = boxed.next.take();
                }
            }
            table.count = 0;
        }
    }
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sum_hash_is_stable() {
        // Permuted keys have equal byte sums and land in the same bucket.
        assert_eq!(bucket_index(b"ab"), bucket_index(b"ba"));
        let sum: usize = b"color".iter().map(|&b| b as usize).sum();
        assert_eq!(bucket_index(b"color"), sum % BUCKET_COUNT);
    }

    #[test]
    fn set_then_get() {
        let store = HashStore::new();
        store.set(b"color", b"red").unwrap();
        assert_eq!(store.get(b"color").unwrap(), b"red");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_set_keeps_first_value() {
        let store = HashStore::new();
        store.set(b"k", b"v1").unwrap();
        assert_eq!(store.set(b"k", b"v2"), Err(KvError::AlreadyExists));
        assert_eq!(store.get(b"k").unwrap(), b"v1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn colliding_keys_share_a_chain() {
        let store = HashStore::new();
        store.set(b"ab", b"1").unwrap();
        store.set(b"ba", b"2").unwrap();
        assert_eq!(store.get(b"ab").unwrap(), b"1");
        assert_eq!(store.get(b"ba").unwrap(), b"2");
        assert_eq!(store.len(), 2);
        // Duplicate detection still works past the chain head.
        assert_eq!(store.set(b"ab", b"3"), Err(KvError::AlreadyExists));
    }

    #[test]
    fn delete_head_middle_and_tail_of_chain() {
        let store = HashStore::new();
        // "abc" permutations collide by construction.
        store.set(b"abc", b"1").unwrap();
        store.set(b"bca", b"2").unwrap();
        store.set(b"cab", b"3").unwrap();

        // Head insert means "cab" is the head; delete middle first.
        store.delete(b"bca").unwrap();
        assert_eq!(store.get(b"bca"), Err(KvError::NotFound));
        store.delete(b"cab").unwrap();
        store.delete(b"abc").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn modify_replaces_in_place() {
        let store = HashStore::new();
        store.set(b"k", b"old").unwrap();
        store.modify(b"k", b"new").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"new");
        assert_eq!(store.modify(b"absent", b"v"), Err(KvError::NotFound));
    }

    #[test]
    fn delete_absent() {
        let store = HashStore::new();
        assert_eq!(store.delete(b"color"), Err(KvError::NotFound));
    }

    #[test]
    fn exists_tracks_lifecycle() {
        let store = HashStore::new();
        assert_eq!(store.exists(b"k"), Err(KvError::NotFound));
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.exists(b"k"), Ok(()));
        store.delete(b"k").unwrap();
        assert_eq!(store.exists(b"k"), Err(KvError::NotFound));
    }

    #[test]
    fn oversize_inputs_are_rejected() {
        let store = HashStore::new();
        let long_key = vec![b'k'; MAX_KEY_LEN];
        let long_value = vec![b'v'; MAX_VALUE_LEN];
        assert_eq!(store.set(&long_key, b"v"), Err(KvError::BadParam));
        assert_eq!(store.set(b"k", &long_value), Err(KvError::BadParam));
        assert_eq!(store.get(&long_key), Err(KvError::BadParam));

        // One byte under the cap is accepted.
        let max_key = vec![b'k'; MAX_KEY_LEN - 1];
        let max_value = vec![b'v'; MAX_VALUE_LEN - 1];
        store.set(&max_key, &max_value).unwrap();
        assert_eq!(store.get(&max_key).unwrap(), max_value);
    }

    #[test]
    fn count_matches_chain_lengths() {
        let store = HashStore::new();
        for i in 0..200u32 {
            store.set(format!("key{i}").as_bytes(), b"v").unwrap();
        }
        for i in 0..50u32 {
            store.delete(format!("key{i}").as_bytes()).unwrap();
        }

        let table = store.table.lock().unwrap();
        let mut total = 0;
        for bucket in table.buckets.iter() {
            let mut cur = bucket.as_deref();
            while let Some(node) = cur {
                total += 1;
                cur = node.next.as_deref();
            }
        }
        assert_eq!(total, table.count);
        assert_eq!(total, 150);
    }

    #[test]
    fn clear_resets_the_table() {
        let store = HashStore::new();
        for i in 0..32u32 {
            store.set(format!("key{i}").as_bytes(), b"v").unwrap();
        }
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(b"key0"), Err(KvError::NotFound));
        store.clear();

        store.set(b"again", b"v").unwrap();
        assert_eq!(store.len(), 1);
    }
}
