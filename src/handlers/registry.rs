//! Handler registry: group name to factory, populated once at startup.

use crate::error::ConfigError;
use crate::facade::Facade;
use crate::handlers::Handler;
use std::collections::HashMap;
use std::sync::Arc;

/// Group that serves the root path and the not-found fallback.
pub const DEFAULT_GROUP: &str = "Home";

type Factory = Box<dyn Fn(Arc<Facade>) -> Box<dyn Handler> + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, Factory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a group. Factories only store the facade; any setup
    /// beyond that belongs in the facade's lazily built collaborators.
    pub fn register<F, H>(mut self, group: &str, factory: F) -> Self
    where
        F: Fn(Arc<Facade>) -> H + Send + Sync + 'static,
        H: Handler + 'static,
    {
        self.factories
            .insert(group.to_string(), Box::new(move |facade| Box::new(factory(facade))));
        self
    }

    pub fn contains(&self, group: &str) -> bool {
        self.factories.contains_key(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the handler for `group`, or `None` when nothing is registered under that name.
    pub fn resolve(&self, group: &str, facade: Arc<Facade>) -> Option<Box<dyn Handler>> {
        let factory = self.factories.get(group)?;
        Some(factory(facade))
    }

    /// The default group must exist: it serves `/` and every unknown path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contains(DEFAULT_GROUP) {
            Ok(())
        } else {
            Err(ConfigError::MissingHandler(DEFAULT_GROUP.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl Handler for Noop {}

    #[test]
    fn validate_requires_default_group() {
        let registry = HandlerRegistry::new().register("User", |_| Noop);
        assert!(matches!(registry.validate(), Err(ConfigError::MissingHandler(g)) if g == "Home"));
        let registry = registry.register(DEFAULT_GROUP, |_| Noop);
        assert!(registry.validate().is_ok());
        let mut groups: Vec<_> = registry.groups().collect();
        groups.sort();
        assert_eq!(groups, ["Home", "User"]);
    }
}
