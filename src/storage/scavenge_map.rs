use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::convert::bytes_to_string;
use crate::convert::safe_kv;
use crate::convert::safe_kv32;
use crate::convert::safe_vk;
use crate::convert::safe_vk32;
use crate::ConvertError;
use crate::Result;

/// Keys of scavenge maps. The byte encoding must sort like the key itself.
pub trait StateKey: Clone + Ord + Debug + Send + Sync + 'static {
    fn to_key_bytes(&self) -> Vec<u8>;

    fn from_key_bytes(bytes: &[u8]) -> Result<Self>;
}

impl StateKey for u64 {
    fn to_key_bytes(&self) -> Vec<u8> {
        safe_kv(*self).to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        safe_vk(bytes)
    }
}

impl StateKey for u32 {
    fn to_key_bytes(&self) -> Vec<u8> {
        safe_kv32(*self).to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        safe_vk32(bytes)
    }
}

impl StateKey for String {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        bytes_to_string(bytes)
    }
}

/// Single-row maps such as the checkpoint
impl StateKey for () {
    fn to_key_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::InvalidLength {
                expected: 0,
                actual: bytes.len(),
            }
            .into())
        }
    }
}

/// Values of scavenge maps
pub trait StateValue: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {}

impl<T> StateValue for T where T: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {}

/// An ordered key/value map taking part in the backend's transaction.
///
/// Writes made while a transaction is open become visible to readers
/// immediately and are undone if the transaction rolls back. Writes made with
/// no transaction open are applied on their own.
pub trait ScavengeMap<K, V>: Send + Sync
where
    K: StateKey,
    V: StateValue,
{
    fn get(
        &self,
        key: &K,
    ) -> Result<Option<V>>;

    fn insert(
        &self,
        key: K,
        value: V,
    ) -> Result<()>;

    fn remove(
        &self,
        key: &K,
    ) -> Result<Option<V>>;

    /// Up to `limit` records with keys greater than `after` (all keys when
    /// `None`) whose value passes `filter`, in key order.
    fn scan_after(
        &self,
        after: Option<&K>,
        limit: usize,
        filter: &dyn Fn(&V) -> bool,
    ) -> Result<Vec<(K, V)>>;

    /// Removes every record whose value matches, returning how many went.
    fn remove_where(
        &self,
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize>;

    fn all(&self) -> Result<Vec<(K, V)>> {
        self.scan_after(None, usize::MAX, &|_| true)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }
}
