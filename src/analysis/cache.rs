//! Model cache
//!
//! Building a model enumerates every state and transition, which is far more
//! work than a short decode. A [`ModelCache`] builds each distinct
//! configuration once and hands out shared, immutable [`Model`]s.
//!
//! # Example
//!
//! ```no_run
//! use stratum_beats::analysis::cache::ModelCache;
//! use stratum_beats::TrackerConfig;
//!
//! let cache = ModelCache::new();
//! let a = cache.get_or_build(&TrackerConfig::beats())?;
//! let b = cache.get_or_build(&TrackerConfig::beats())?;
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! # Ok::<(), stratum_beats::DecodeError>(())
//! ```

use crate::config::{ConfigKey, TrackerConfig};
use crate::error::DecodeError;
use crate::features::dbn::Model;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lazily built models keyed by configuration
#[derive(Debug, Default)]
pub struct ModelCache {
    models: Mutex<HashMap<ConfigKey, Arc<Model>>>,
}

impl ModelCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConfigKey, Arc<Model>>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.models
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Model for a configuration, building it on first use
    ///
    /// The model is built without holding the lock; if two threads race on the
    /// same configuration the first inserted model wins.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::InvalidConfiguration` if the model cannot be built.
    /// Failed builds are not cached.
    pub fn get_or_build(&self, config: &TrackerConfig) -> Result<Arc<Model>, DecodeError> {
        let key = config.key();
        if let Some(model) = self.lock().get(&key) {
            return Ok(Arc::clone(model));
        }

        log::debug!("Model cache miss, building {} model", config.mode.name());
        let model = Arc::new(Model::build(config)?);
        let mut models = self.lock();
        Ok(Arc::clone(models.entry(key).or_insert(model)))
    }

    /// Drop the cached model of a configuration
    pub fn remove(&self, config: &TrackerConfig) -> bool {
        self.lock().remove(&config.key()).is_some()
    }

    /// Drop all cached models
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached models
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no model is cached
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::activations::ActivationSequence;

    fn config() -> TrackerConfig {
        TrackerConfig::beats().with_bpm_range(100.0, 140.0)
    }

    #[test]
    fn test_reuses_models() {
        let cache = ModelCache::new();
        let a = cache.get_or_build(&config()).unwrap();
        let b = cache.get_or_build(&config()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_configurations() {
        let cache = ModelCache::new();
        cache.get_or_build(&config()).unwrap();
        cache
            .get_or_build(&config().with_transition_lambda(10.0))
            .unwrap();
        assert_eq!(cache.len(), 2);

        // Peak correction travels with the cached model, so it needs its own entry
        let mut corrected = config();
        corrected.correct = true;
        let model = cache.get_or_build(&corrected).unwrap();
        assert!(model.config().correct);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_correct_flag_not_shared_between_requests() {
        let cache = ModelCache::new();
        let plain = config();
        let mut corrected = config();
        corrected.correct = true;

        // beats peak two frames after the path's phase-0 frames
        let values = (0..400)
            .map(|t| if t % 50 == 2 { 1.0 } else { 0.0 })
            .collect();
        let activations = ActivationSequence::from_beats(values, 100.0).unwrap();

        let plain_model = cache.get_or_build(&plain).unwrap();
        let corrected_model = cache.get_or_build(&corrected).unwrap();

        let via_cache = crate::decode(&corrected_model, &activations).unwrap();
        let direct = crate::decode(&Model::build(&corrected).unwrap(), &activations).unwrap();
        assert_eq!(via_cache, direct);

        let uncached_plain = crate::decode(&Model::build(&plain).unwrap(), &activations).unwrap();
        assert_eq!(crate::decode(&plain_model, &activations).unwrap(), uncached_plain);
    }

    #[test]
    fn test_invalid_configuration_not_cached() {
        let cache = ModelCache::new();
        let bad = TrackerConfig::beats().with_bpm_range(200.0, 100.0);
        assert!(cache.get_or_build(&bad).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ModelCache::new();
        cache.get_or_build(&config()).unwrap();
        assert!(cache.remove(&config()));
        assert!(!cache.remove(&config()));

        cache.get_or_build(&config()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
