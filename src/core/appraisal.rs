//! Pluggable scoring strategies for fair job selection.
//!
//! An appraiser turns a queued job and its owner's load into an integer score;
//! the dispatch loop runs the job with the highest score first. Strategies are
//! resolved by name through an [`AppraiserRegistry`], which falls back to the
//! default strategy when a name is unknown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::job::Job;

/// Name of the strategy used when no other is configured.
pub const DEFAULT_APPRAISER: &str = "default";

/// Scoring strategy for queued jobs.
///
/// Contract: the score must not increase as `running_for_owner` grows, in
/// particular past `running_cap`. Implementations are called under a queue
/// lock and must not lock the job.
pub trait JobAppraiser: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Score `job` at `position` of a queue holding `queue_length` jobs.
    fn score(
        &self,
        queue_length: usize,
        position: usize,
        running_for_owner: usize,
        running_cap: usize,
        job: &Job,
    ) -> i64;
}

fn as_score(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Owner headroom first, queue order second.
///
/// The score is `headroom * (queue_length + 1) + (queue_length - position)`
/// with `headroom = running_cap - running_for_owner` (negative once an owner
/// is over its cap). The headroom term always outweighs the position term, so
/// an owner with more free slots wins and equal owners are served in FIFO
/// order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAppraiser;

impl JobAppraiser for DefaultAppraiser {
    fn name(&self) -> &str {
        DEFAULT_APPRAISER
    }

    fn score(
        &self,
        queue_length: usize,
        position: usize,
        running_for_owner: usize,
        running_cap: usize,
        _job: &Job,
    ) -> i64 {
        let headroom = as_score(running_cap).saturating_sub(as_score(running_for_owner));
        let weight = as_score(queue_length).saturating_add(1);
        let order = as_score(queue_length.saturating_sub(position));
        headroom.saturating_mul(weight).saturating_add(order)
    }
}

/// Pure queue order; ignores owner load.
#[derive(Debug, Default, Clone, Copy)]
pub struct FifoAppraiser;

impl JobAppraiser for FifoAppraiser {
    fn name(&self) -> &str {
        "fifo"
    }

    fn score(
        &self,
        queue_length: usize,
        position: usize,
        _running_for_owner: usize,
        _running_cap: usize,
        _job: &Job,
    ) -> i64 {
        as_score(queue_length.saturating_sub(position))
    }
}

type AppraiserFactory = Box<dyn Fn() -> Arc<dyn JobAppraiser> + Send + Sync>;

/// Name to strategy factory map.
pub struct AppraiserRegistry {
    factories: HashMap<String, AppraiserFactory>,
}

impl AppraiserRegistry {
    /// Registry with no strategies; [`resolve`](Self::resolve) still falls
    /// back to [`DefaultAppraiser`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the built-in `default` and `fifo` strategies.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_APPRAISER, || Arc::new(DefaultAppraiser));
        registry.register("fifo", || Arc::new(FifoAppraiser));
        registry
    }

    /// Register (or replace) a strategy under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn JobAppraiser> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the strategy registered as `name`, or the default one.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Arc<dyn JobAppraiser> {
        if let Some(factory) = self.factories.get(name) {
            return factory();
        }
        warn!(appraiser = name, "unknown job appraiser, using default");
        self.factories
            .get(DEFAULT_APPRAISER)
            .map_or_else(|| Arc::new(DefaultAppraiser) as Arc<dyn JobAppraiser>, |f| f())
    }
}

impl Default for AppraiserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AppraiserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("AppraiserRegistry")
            .field("names", &names)
            .finish()
    }
}
