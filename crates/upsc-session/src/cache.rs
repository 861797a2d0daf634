//! Bounded profile cache.
//!
//! A read-through copy of profile rows, keyed by user id. It is never
//! authoritative: a miss always goes to the backend, a hit is served as-is
//! (no TTL, no revalidation). The only invalidation is a full clear on
//! sign-out.
//!
//! # Epochs
//!
//! Every [`clear`](ProfileCache::clear) bumps an epoch counter. A lookup
//! records the epoch before going to the backend and only stores its result
//! if the epoch is unchanged, so a fetch that was in flight during sign-out
//! can't put the old user's profile back into a freshly cleared cache.

use std::collections::HashMap;

use upsc_auth::{Profile, UserId};

/// Map from user id to profile with a fixed capacity.
#[derive(Debug)]
pub struct ProfileCache {
    entries: HashMap<UserId, Profile>,
    capacity: usize,
    epoch: u64,
}

impl ProfileCache {
    /// Creates an empty cache holding at most `capacity` profiles
    /// (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            epoch: 0,
        }
    }

    pub fn get(&self, id: &UserId) -> Option<&Profile> {
        self.entries.get(id)
    }

    /// Stores a profile under its own id. Last writer wins.
    ///
    /// When the cache is full and `profile` is new, some other entry is
    /// evicted. Which one is unspecified; insertion order isn't tracked.
    pub fn insert(&mut self, profile: Profile) {
        if !self.entries.contains_key(&profile.id)
            && self.entries.len() >= self.capacity
        {
            let victim = self.entries.keys().next().cloned();
            if let Some(victim) = victim {
                self.entries.remove(&victim);
                tracing::trace!(user_id = %victim, "profile cache full, evicted entry");
            }
        }
        self.entries.insert(profile.id.clone(), profile);
    }

    /// Drops every entry and starts a new epoch.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
