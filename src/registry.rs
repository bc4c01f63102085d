//! Provider lookup by the name used in the jobs CSV.
//!
//! Every provider is registered explicitly at startup; the registry is then
//! shared read-only between workers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ScrapeError;
use crate::source::{Fetch, Halley, HeaderLayout, LabelValueBoard, Provider, Task};

/// Builds a configured provider from the shared fetcher and a job's options.
pub type ProviderFactory =
    fn(Arc<dyn Fetch>, &str) -> Result<Box<dyn Provider>, ScrapeError>;

pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, ProviderFactory>,
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, factory: ProviderFactory) -> &mut Self {
        self.factories.insert(name, factory);
        self
    }

    /// Construct and configure the provider registered as `name`.
    pub fn create(
        &self,
        name: &str,
        fetcher: Arc<dyn Fetch>,
        options: &str,
    ) -> Result<Box<dyn Provider>, ScrapeError> {
        let factory = self
            .factories
            .get(name.trim())
            .ok_or_else(|| ScrapeError::UnknownProvider(name.to_string()))?;
        factory(fetcher, options)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name.trim())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for ProviderRegistry {
    /// Every built-in provider.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("Halley", |fetcher, options| {
                Ok(Box::new(Halley::new(fetcher).configure(options)?))
            })
            .register("Task", |fetcher, options| {
                Ok(Box::new(Task::new(fetcher).configure(options)?))
            })
            .register("Task2", |fetcher, options| {
                Ok(Box::new(
                    LabelValueBoard::new(fetcher, HeaderLayout::MainHeader).configure(options)?,
                ))
            })
            .register("Task3", |fetcher, options| {
                Ok(Box::new(
                    LabelValueBoard::new(fetcher, HeaderLayout::TitleBlock).configure(options)?,
                ))
            });
        registry
    }
}
