use std::sync::Arc;

use super::CollisionSet;
use crate::LongHasher;
use crate::Result;
use crate::ScavengeMap;
use crate::StateValue;
use crate::StreamHandle;
use crate::StreamId;

/// Routes per-stream rows to the hash-keyed map, or to the id-keyed map for
/// streams in the collision set.
pub struct CollisionMap<V: StateValue> {
    hasher: Arc<dyn LongHasher>,
    collisions: Arc<dyn CollisionSet>,
    by_hash: Arc<dyn ScavengeMap<u64, V>>,
    by_id: Arc<dyn ScavengeMap<StreamId, V>>,
}

impl<V> CollisionMap<V>
where
    V: StateValue + Default,
{
    pub fn new(
        hasher: Arc<dyn LongHasher>,
        collisions: Arc<dyn CollisionSet>,
        by_hash: Arc<dyn ScavengeMap<u64, V>>,
        by_id: Arc<dyn ScavengeMap<StreamId, V>>,
    ) -> Self {
        Self {
            hasher,
            collisions,
            by_hash,
            by_id,
        }
    }

    pub fn handle_for(
        &self,
        stream_id: &str,
    ) -> StreamHandle {
        if self.collisions.is_collision(stream_id) {
            StreamHandle::Id(stream_id.to_string())
        } else {
            StreamHandle::Hash(self.hasher.hash(stream_id))
        }
    }

    pub fn get(
        &self,
        stream_id: &str,
    ) -> Result<Option<V>> {
        self.get_by_handle(&self.handle_for(stream_id))
    }

    pub fn get_by_handle(
        &self,
        handle: &StreamHandle,
    ) -> Result<Option<V>> {
        match handle {
            StreamHandle::Hash(hash) => self.by_hash.get(hash),
            StreamHandle::Id(id) => self.by_id.get(id),
        }
    }

    /// Read-modify-write of a stream's row, creating it from `V::default()`.
    pub fn update(
        &self,
        stream_id: &str,
        f: impl FnOnce(&mut V),
    ) -> Result<()> {
        self.update_by_handle(&self.handle_for(stream_id), f)
    }

    pub fn update_by_handle(
        &self,
        handle: &StreamHandle,
        f: impl FnOnce(&mut V),
    ) -> Result<()> {
        let mut value = self.get_by_handle(handle)?.unwrap_or_default();
        f(&mut value);
        match handle {
            StreamHandle::Hash(hash) => self.by_hash.insert(*hash, value),
            StreamHandle::Id(id) => self.by_id.insert(id.clone(), value),
        }
    }

    /// `stream_id` has just joined the collision set: move its row, if any,
    /// from the hash-keyed map to the id-keyed map.
    pub fn notify_collision(
        &self,
        stream_id: &str,
    ) -> Result<()> {
        let hash = self.hasher.hash(stream_id);
        if let Some(value) = self.by_hash.remove(&hash)? {
            self.by_id.insert(stream_id.to_string(), value)?;
        }
        Ok(())
    }

    /// Rows after `after` in handle order: hash-keyed rows then id-keyed rows.
    pub fn scan_after(
        &self,
        after: Option<&StreamHandle>,
        limit: usize,
        filter: &dyn Fn(&V) -> bool,
    ) -> Result<Vec<(StreamHandle, V)>> {
        let mut rows = Vec::new();
        let after_id = match after {
            Some(StreamHandle::Id(id)) => Some(id),
            Some(StreamHandle::Hash(hash)) => {
                rows.extend(self.scan_hashes(Some(hash), limit, filter)?);
                None
            }
            None => {
                rows.extend(self.scan_hashes(None, limit, filter)?);
                None
            }
        };

        if rows.len() < limit {
            let remaining = limit - rows.len();
            rows.extend(
                self.by_id
                    .scan_after(after_id, remaining, filter)?
                    .into_iter()
                    .map(|(id, v)| (StreamHandle::Id(id), v)),
            );
        }
        Ok(rows)
    }

    fn scan_hashes(
        &self,
        after: Option<&u64>,
        limit: usize,
        filter: &dyn Fn(&V) -> bool,
    ) -> Result<Vec<(StreamHandle, V)>> {
        Ok(self
            .by_hash
            .scan_after(after, limit, filter)?
            .into_iter()
            .map(|(hash, v)| (StreamHandle::Hash(hash), v))
            .collect())
    }

    pub fn remove_where(
        &self,
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize> {
        Ok(self.by_hash.remove_where(predicate)? + self.by_id.remove_where(predicate)?)
    }
}
