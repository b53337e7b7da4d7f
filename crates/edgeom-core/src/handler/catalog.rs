// ── Handler catalog ──
//
// Startup-time table of handler constructors keyed by implementation
// locator. The descriptor table selects which entries are used.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ResourceHandler;

/// Constructs a fresh handler instance.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn ResourceHandler> + Send + Sync>;

/// Locator → constructor table.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a default-constructible handler type.
    pub fn register<H>(&mut self, locator: impl Into<String>) -> &mut Self
    where
        H: ResourceHandler + Default,
    {
        self.register_with(locator, || Arc::new(H::default()) as Arc<dyn ResourceHandler>)
    }

    /// Register an arbitrary constructor.
    pub fn register_with<F>(&mut self, locator: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn ResourceHandler> + Send + Sync + 'static,
    {
        self.factories.insert(locator.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, locator: &str) -> Option<HandlerFactory> {
        self.factories.get(locator).cloned()
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.factories.contains_key(locator)
    }

    pub fn locators(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locators: Vec<&str> = self.locators().collect();
        locators.sort_unstable();
        f.debug_struct("HandlerCatalog")
            .field("locators", &locators)
            .finish()
    }
}
