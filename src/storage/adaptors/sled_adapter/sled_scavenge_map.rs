use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::convert::prefixed_key;
use crate::Result;
use crate::ScavengeError;
use crate::ScavengeMap;
use crate::StateKey;
use crate::StateValue;

type PendingWrites = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Writes staged by the open transaction, keyed by full (prefixed) key.
/// `None` marks a removal.
#[derive(Debug, Default)]
pub struct SledWriteOverlay {
    pending: Mutex<Option<PendingWrites>>,
}

impl SledWriteOverlay {
    pub fn begin(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(ScavengeError::TransactionAlreadyOpen.into());
        }
        *pending = Some(BTreeMap::new());
        Ok(())
    }

    /// Hands the staged writes over for commit, closing the transaction.
    pub fn take(&self) -> Result<PendingWrites> {
        self.pending
            .lock()
            .take()
            .ok_or_else(|| ScavengeError::NoOpenTransaction.into())
    }

    /// Stages a write. Returns false when no transaction is open, in which
    /// case the caller writes straight to the tree.
    fn stage(
        &self,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) -> bool {
        match self.pending.lock().as_mut() {
            Some(pending) => {
                pending.insert(key, value);
                true
            }
            None => false,
        }
    }

    fn lookup(
        &self,
        key: &[u8],
    ) -> Option<Option<Vec<u8>>> {
        self.pending
            .lock()
            .as_ref()
            .and_then(|pending| pending.get(key).cloned())
    }

    fn pending_in_range(
        &self,
        lower: &Bound<Vec<u8>>,
        upper: &Bound<Vec<u8>>,
    ) -> PendingWrites {
        match self.pending.lock().as_ref() {
            Some(pending) => pending
                .range::<Vec<u8>, _>((lower.clone(), upper.clone()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => BTreeMap::new(),
        }
    }
}

/// One logical map inside the shared scavenge state tree. Keys are the map's
/// prefix byte followed by the encoded key; values are bincode.
pub struct SledScavengeMap<K, V> {
    tree: sled::Tree,
    prefix: u8,
    overlay: Arc<SledWriteOverlay>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SledScavengeMap<K, V>
where
    K: StateKey,
    V: StateValue,
{
    pub fn new(
        tree: sled::Tree,
        prefix: u8,
        overlay: Arc<SledWriteOverlay>,
    ) -> Self {
        Self {
            tree,
            prefix,
            overlay,
            _marker: PhantomData,
        }
    }

    fn full_key(
        &self,
        key: &K,
    ) -> Vec<u8> {
        prefixed_key(self.prefix, &key.to_key_bytes())
    }

    fn decode_key(
        &self,
        full_key: &[u8],
    ) -> Result<K> {
        K::from_key_bytes(&full_key[1..])
    }

    fn decode_value(bytes: &[u8]) -> Result<V> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn bounds(
        &self,
        after: Option<&K>,
    ) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let lower = match after {
            Some(key) => Bound::Excluded(self.full_key(key)),
            None => Bound::Included(vec![self.prefix]),
        };
        let upper = match self.prefix.checked_add(1) {
            Some(next) => Bound::Excluded(vec![next]),
            None => Bound::Unbounded,
        };
        (lower, upper)
    }

    /// Committed and staged records of the range, staged ones winning.
    fn merged_range(
        &self,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let staged = self.overlay.pending_in_range(&lower, &upper);
        let mut merged = BTreeMap::new();
        for item in self.tree.range((lower, upper)) {
            let (k, v) = item?;
            merged.insert(k.to_vec(), v.to_vec());
        }
        for (k, v) in staged {
            match v {
                Some(v) => {
                    merged.insert(k, v);
                }
                None => {
                    merged.remove(&k);
                }
            }
        }
        Ok(merged)
    }

    fn write(
        &self,
        full_key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) -> Result<()> {
        if self.overlay.stage(full_key.clone(), value.clone()) {
            return Ok(());
        }
        match value {
            Some(v) => {
                self.tree.insert(full_key, v)?;
            }
            None => {
                self.tree.remove(full_key)?;
            }
        }
        Ok(())
    }
}

impl<K, V> ScavengeMap<K, V> for SledScavengeMap<K, V>
where
    K: StateKey,
    V: StateValue,
{
    fn get(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        let full_key = self.full_key(key);
        let bytes = match self.overlay.lookup(&full_key) {
            Some(staged) => staged,
            None => self.tree.get(&full_key)?.map(|v| v.to_vec()),
        };
        bytes.map(|b| Self::decode_value(&b)).transpose()
    }

    fn insert(
        &self,
        key: K,
        value: V,
    ) -> Result<()> {
        let bytes = bincode::serialize(&value)?;
        self.write(self.full_key(&key), Some(bytes))
    }

    fn remove(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        let previous = self.get(key)?;
        if previous.is_some() {
            self.write(self.full_key(key), None)?;
        }
        Ok(previous)
    }

    fn scan_after(
        &self,
        after: Option<&K>,
        limit: usize,
        filter: &dyn Fn(&V) -> bool,
    ) -> Result<Vec<(K, V)>> {
        let (lower, upper) = self.bounds(after);
        let mut result = Vec::new();
        for (k, v) in self.merged_range(lower, upper)? {
            if result.len() >= limit {
                break;
            }
            let value = Self::decode_value(&v)?;
            if filter(&value) {
                result.push((self.decode_key(&k)?, value));
            }
        }
        Ok(result)
    }

    fn remove_where(
        &self,
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize> {
        let (lower, upper) = self.bounds(None);
        let mut removed = 0;
        for (k, v) in self.merged_range(lower, upper)? {
            if predicate(&Self::decode_value(&v)?) {
                self.write(k, None)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
