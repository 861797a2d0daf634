//! Profile lookup through the cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use upsc_auth::{AuthBackend, BackendError, Profile, UserId};

use crate::{AuthError, ProfileCache};

/// Resolves a user id to its profile, serving repeats from a
/// [`ProfileCache`].
///
/// The cache lock is never held across a backend call. Two first-time
/// lookups of the same id may both reach the backend; both results are
/// valid and the later insert wins.
pub struct ProfileResolver<B: AuthBackend> {
    backend: Arc<B>,
    cache: Mutex<ProfileCache>,
}

impl<B: AuthBackend> ProfileResolver<B> {
    pub fn new(backend: Arc<B>, capacity: usize) -> Self {
        Self {
            backend,
            cache: Mutex::new(ProfileCache::new(capacity)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, ProfileCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up the profile for `id`.
    ///
    /// # Returns
    /// - `Ok(Some(profile))`: from cache, or fetched and now cached
    /// - `Ok(None)`: the user has no profile row yet (not cached, so the
    ///   next call asks again)
    /// - `Err(_)`: the lookup failed; callers decide whether that is fatal
    pub async fn resolve(&self, id: &UserId) -> Result<Option<Profile>, AuthError> {
        let epoch = {
            let cache = self.cache();
            if let Some(profile) = cache.get(id) {
                tracing::trace!(user_id = %id, "profile cache hit");
                return Ok(Some(profile.clone()));
            }
            cache.epoch()
        };

        match self.backend.select_profile(id).await {
            Ok(profile) => {
                let mut cache = self.cache();
                if cache.epoch() == epoch {
                    cache.insert(profile.clone());
                } else {
                    tracing::debug!(user_id = %id, "cache cleared during lookup, not caching");
                }
                Ok(Some(profile))
            }
            Err(BackendError::NotFound) => {
                tracing::debug!(user_id = %id, "no profile row");
                Ok(None)
            }
            Err(err) => Err(AuthError::from(err)),
        }
    }

    /// Puts a profile straight into the cache (used right after sign-up).
    pub fn prime(&self, profile: Profile) {
        self.cache().insert(profile);
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.cache().clear();
    }

    /// Returns the cached profile for `id` without touching the backend.
    pub fn cached(&self, id: &UserId) -> Option<Profile> {
        self.cache().get(id).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }
}
