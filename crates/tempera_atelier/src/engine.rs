//! The engine: configuration, registries and compiled templates.

use std::cell::{Ref, RefCell};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::filters::FilterRegistry;
use crate::markers::MarkerRegistry;
use crate::template::{BlueprintId, Templates};

/// Shared by every view rendered from its templates.
///
/// Registries are set up before the engine is shared; templates are compiled
/// lazily through `&self` and cached by source text.
pub struct Engine {
    config: EngineConfig,
    templates: RefCell<Templates>,
    markers: MarkerRegistry,
    filters: FilterRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        Self::build(
            EngineConfig::default(),
            MarkerRegistry::with_builtins(),
            FilterRegistry::with_builtins(),
        )
    }
}

impl Engine {
    /// Engine with the built-in markers and filters.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registries(
            config,
            MarkerRegistry::with_builtins(),
            FilterRegistry::with_builtins(),
        )
    }

    pub fn with_registries(
        config: EngineConfig,
        markers: MarkerRegistry,
        filters: FilterRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, markers, filters))
    }

    fn build(config: EngineConfig, markers: MarkerRegistry, filters: FilterRegistry) -> Self {
        let templates = Templates::new(config.parser_options(), config.local_sentinel);
        Self {
            config,
            templates: RefCell::new(templates),
            markers,
            filters,
        }
    }

    /// Compile markup into a blueprint, or return the cached one.
    pub fn compile(&self, source: &str) -> Result<BlueprintId> {
        self.templates.borrow_mut().compile(source, &self.markers)
    }

    pub fn templates(&self) -> Ref<'_, Templates> {
        self.templates.borrow()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerRegistry {
        &mut self.markers
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }
}
