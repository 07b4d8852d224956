//! Builds and registers schedulers from an [`EngineConfig`].

use std::sync::Arc;

use tracing::info;

use crate::config::{EngineConfig, SchedulerConfig};
use crate::core::{AppraiserRegistry, JobStorage, Scheduler, SchedulerError, SchedulerRegistry};

/// Create one stopped scheduler per configured id and register it.
///
/// `storage_factory` supplies the persistence hook for each scheduler, or
/// `None` to run it without storage. Returns the registered ids, sorted.
///
/// # Errors
///
/// `Config` if `cfg` does not validate, or whatever building or registering a
/// scheduler fails with. Schedulers registered before the failure stay
/// registered.
pub fn build_schedulers<F>(
    cfg: &EngineConfig,
    registry: &SchedulerRegistry,
    mut storage_factory: F,
) -> Result<Vec<String>, SchedulerError>
where
    F: FnMut(&str, &SchedulerConfig) -> Result<Option<Arc<dyn JobStorage>>, SchedulerError>,
{
    cfg.validate().map_err(SchedulerError::Config)?;

    let mut ids: Vec<&String> = cfg.schedulers.keys().collect();
    ids.sort();

    let mut built = Vec::with_capacity(ids.len());
    for id in ids {
        let scheduler_cfg = &cfg.schedulers[id];
        let storage = storage_factory(id, scheduler_cfg)?;
        let scheduler = Scheduler::with_parts(
            id.clone(),
            scheduler_cfg.clone(),
            storage,
            AppraiserRegistry::with_builtins(),
        )?;
        registry.register(Arc::new(scheduler))?;
        info!(scheduler = %id, pool_size = scheduler_cfg.thread_pool_size, "scheduler built");
        built.push(id.clone());
    }
    Ok(built)
}
