use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashSet;
use tracing::info;

use crate::LongHasher;
use crate::Result;
use crate::ScavengeError;
use crate::ScavengeMap;
use crate::StreamId;

/// Answers whether a stream shares its hash with another stream.
pub trait CollisionSet: Send + Sync + 'static {
    fn is_collision(
        &self,
        stream_id: &str,
    ) -> bool;
}

impl CollisionSet for HashSet<StreamId> {
    fn is_collision(
        &self,
        stream_id: &str,
    ) -> bool {
        self.contains(stream_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionResult {
    NoCollision,
    /// The stream was already known to collide
    OldCollision,
    /// The stream collides with `previous_user`, which owned the hash until now
    NewCollision { previous_user: StreamId },
}

/// Tracks the first user of every hash and the set of colliding streams.
///
/// The collision set is cached in memory; the cache is reloaded from storage
/// whenever a transaction rolls back.
pub struct CollisionDetector {
    hasher: Arc<dyn LongHasher>,
    hash_users: Arc<dyn ScavengeMap<u64, StreamId>>,
    collision_storage: Arc<dyn ScavengeMap<StreamId, ()>>,
    collisions: DashSet<StreamId>,
    collision_hashes: DashSet<u64>,
}

impl CollisionDetector {
    pub fn new(
        hasher: Arc<dyn LongHasher>,
        hash_users: Arc<dyn ScavengeMap<u64, StreamId>>,
        collision_storage: Arc<dyn ScavengeMap<StreamId, ()>>,
    ) -> Result<Self> {
        let detector = Self {
            hasher,
            hash_users,
            collision_storage,
            collisions: DashSet::new(),
            collision_hashes: DashSet::new(),
        };
        detector.reload()?;
        Ok(detector)
    }

    pub fn reload(&self) -> Result<()> {
        self.collisions.clear();
        self.collision_hashes.clear();
        for (stream_id, _) in self.collision_storage.all()? {
            self.collision_hashes.insert(self.hasher.hash(&stream_id));
            self.collisions.insert(stream_id);
        }
        Ok(())
    }

    /// Registers `stream_id` as a user of its hash. Idempotent.
    pub fn detect_collisions(
        &self,
        stream_id: &str,
    ) -> Result<CollisionResult> {
        if self.collisions.contains(stream_id) {
            return Ok(CollisionResult::OldCollision);
        }

        let hash = self.hasher.hash(stream_id);
        match self.hash_users.get(&hash)? {
            None => {
                self.hash_users.insert(hash, stream_id.to_string())?;
                Ok(CollisionResult::NoCollision)
            }
            Some(user) if user == stream_id => Ok(CollisionResult::NoCollision),
            Some(user) => {
                info!(
                    "SCAVENGING: detected hash collision between {} and {} (hash {})",
                    user, stream_id, hash
                );
                self.add_collision(&user, hash)?;
                self.add_collision(stream_id, hash)?;
                Ok(CollisionResult::NewCollision {
                    previous_user: user,
                })
            }
        }
    }

    fn add_collision(
        &self,
        stream_id: &str,
        hash: u64,
    ) -> Result<()> {
        if self.collisions.insert(stream_id.to_string()) {
            self.collision_storage.insert(stream_id.to_string(), ())?;
        }
        self.collision_hashes.insert(hash);
        Ok(())
    }

    pub fn is_collision_hash(
        &self,
        hash: u64,
    ) -> bool {
        self.collision_hashes.contains(&hash)
    }

    /// The single stream using `hash`.
    pub fn lookup_unique_hash_user(
        &self,
        hash: u64,
    ) -> Result<StreamId> {
        if self.is_collision_hash(hash) {
            return Err(ScavengeError::HashCollision { hash }.into());
        }
        self.hash_users
            .get(&hash)?
            .ok_or_else(|| ScavengeError::UnknownHash { hash }.into())
    }

    pub fn all_collisions(&self) -> Vec<StreamId> {
        let mut all: Vec<StreamId> = self.collisions.iter().map(|s| s.key().clone()).collect();
        all.sort();
        all
    }

    /// Copy of the collision set for readers that must not observe changes
    pub fn snapshot(&self) -> HashSet<StreamId> {
        self.collisions.iter().map(|s| s.key().clone()).collect()
    }
}

impl CollisionSet for CollisionDetector {
    fn is_collision(
        &self,
        stream_id: &str,
    ) -> bool {
        self.collisions.contains(stream_id)
    }
}
