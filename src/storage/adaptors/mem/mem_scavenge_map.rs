use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::Result;
use crate::ScavengeError;
use crate::ScavengeMap;
use crate::StateKey;
use crate::StateValue;

type UndoAction = Box<dyn FnOnce() + Send>;

/// Records how to revert each write made during the open transaction.
#[derive(Default)]
pub struct UndoLog {
    actions: Mutex<Option<Vec<UndoAction>>>,
}

impl UndoLog {
    pub fn begin(&self) -> Result<()> {
        let mut actions = self.actions.lock();
        if actions.is_some() {
            return Err(ScavengeError::TransactionAlreadyOpen.into());
        }
        *actions = Some(Vec::new());
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        match self.actions.lock().take() {
            Some(_) => Ok(()),
            None => Err(ScavengeError::NoOpenTransaction.into()),
        }
    }

    pub fn rollback(&self) -> Result<()> {
        let actions = self
            .actions
            .lock()
            .take()
            .ok_or(ScavengeError::NoOpenTransaction)?;
        for undo in actions.into_iter().rev() {
            undo();
        }
        Ok(())
    }

    fn record(
        &self,
        action: UndoAction,
    ) {
        if let Some(actions) = self.actions.lock().as_mut() {
            actions.push(action);
        }
    }
}

/// In-memory scavenge map
pub struct MemoryScavengeMap<K, V> {
    data: Arc<RwLock<BTreeMap<K, V>>>,
    undo: Arc<UndoLog>,
}

impl<K, V> MemoryScavengeMap<K, V>
where
    K: StateKey,
    V: StateValue,
{
    pub fn new(undo: Arc<UndoLog>) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            undo,
        }
    }

    fn record_undo(
        &self,
        key: K,
        previous: Option<V>,
    ) {
        let data = self.data.clone();
        self.undo.record(Box::new(move || {
            let mut data = data.write();
            match previous {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }));
    }
}

impl<K, V> ScavengeMap<K, V> for MemoryScavengeMap<K, V>
where
    K: StateKey,
    V: StateValue,
{
    fn get(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn insert(
        &self,
        key: K,
        value: V,
    ) -> Result<()> {
        let previous = self.data.write().insert(key.clone(), value);
        self.record_undo(key, previous);
        Ok(())
    }

    fn remove(
        &self,
        key: &K,
    ) -> Result<Option<V>> {
        let previous = self.data.write().remove(key);
        if previous.is_some() {
            self.record_undo(key.clone(), previous.clone());
        }
        Ok(previous)
    }

    fn scan_after(
        &self,
        after: Option<&K>,
        limit: usize,
        filter: &dyn Fn(&V) -> bool,
    ) -> Result<Vec<(K, V)>> {
        let data = self.data.read();
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(data
            .range((lower, Bound::Unbounded))
            .filter(|(_, v)| filter(v))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn remove_where(
        &self,
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize> {
        let removed: Vec<(K, V)> = {
            let mut data = self.data.write();
            let keys: Vec<K> = data
                .iter()
                .filter(|(_, v)| predicate(v))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| data.remove(&k).map(|v| (k, v)))
                .collect()
        };

        let count = removed.len();
        for (key, value) in removed {
            self.record_undo(key, Some(value));
        }
        Ok(count)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.read().len())
    }
}
