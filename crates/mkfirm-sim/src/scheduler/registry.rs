//! Scheduler lookup by identifier.

use std::collections::BTreeMap;

use super::{Fifo, FixedPriority, Gdpa, GdpaSimplified, ListDispatch, ListPolicy, Scheduler};
use crate::config::SchedulerConfig;
use crate::error::{SimulationError, SimulationResult};

/// Constructor of a boxed scheduler.
pub type SchedulerFactory = fn(SchedulerConfig) -> Box<dyn Scheduler>;

fn build<P: ListPolicy + Default + 'static>(config: SchedulerConfig) -> Box<dyn Scheduler> {
    Box::new(ListDispatch::new(P::default(), config))
}

/// Maps identifiers such as `"fpp"` to scheduler constructors.
#[derive(Debug, Clone, Default)]
pub struct SchedulerRegistry {
    factories: BTreeMap<String, SchedulerFactory>,
}

impl SchedulerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `list`, `fpp`, `gdpa` and `gdpas`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_policy::<Fifo>();
        registry.register_policy::<FixedPriority>();
        registry.register_policy::<Gdpa>();
        registry.register_policy::<GdpaSimplified>();
        registry
    }

    /// Register `factory` under `id`, returning the factory it replaced.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: SchedulerFactory,
    ) -> Option<SchedulerFactory> {
        self.factories.insert(id.into(), factory)
    }

    fn register_policy<P: ListPolicy + Default + 'static>(&mut self) {
        self.factories.insert(P::NAME.to_owned(), build::<P>);
    }

    /// Build the scheduler registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownScheduler`] if `id` is not
    /// registered.
    pub fn create(&self, id: &str, config: SchedulerConfig) -> SimulationResult<Box<dyn Scheduler>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| SimulationError::UnknownScheduler(id.to_owned()))?;
        Ok(factory(config))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
