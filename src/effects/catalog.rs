//! Effect catalog
//!
//! The catalog holds every loadable lightscript by id. Registering a
//! definition runs its class declaration, so controls can be previewed
//! without creating an instance.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::controls::registry::{controls_by_key, descriptor_by_key};
use crate::controls::{ensure_described, ClassKey, ControlDefinition, Describe, EffectDescriptor, EffectSchema, RegistryError};

use super::canvas::CanvasBackend;
use super::shader::ShaderBackend;
use super::traits::{CanvasScript, RenderBackend, RendererFamily, ShaderScript};

/// Factory for one loadable lightscript
pub trait LightscriptDefinition: Send + Sync {
    /// Unique identifier (e.g. "rainbow_wave")
    fn effect_id(&self) -> &'static str;

    /// Category for grouping in listings
    fn category(&self) -> &'static str;

    fn family(&self) -> RendererFamily;

    /// Class whose declaration holds this effect's controls
    fn effect_class(&self) -> ClassKey;

    /// Run the class declaration (once per process)
    fn describe(&self) -> Result<(), RegistryError>;

    /// Create a fresh, uninitialized backend
    fn create(&self) -> Box<dyn RenderBackend>;
}

/// Definition of a canvas lightscript built from its script type
pub struct CanvasDefinition<S> {
    id: &'static str,
    category: &'static str,
    _script: PhantomData<fn() -> S>,
}

impl<S> CanvasDefinition<S> {
    pub fn new(id: &'static str, category: &'static str) -> Self {
        Self {
            id,
            category,
            _script: PhantomData,
        }
    }
}

impl<S: CanvasScript + Describe + Default> LightscriptDefinition for CanvasDefinition<S> {
    fn effect_id(&self) -> &'static str {
        self.id
    }

    fn category(&self) -> &'static str {
        self.category
    }

    fn family(&self) -> RendererFamily {
        RendererFamily::Canvas2d
    }

    fn effect_class(&self) -> ClassKey {
        ClassKey::of::<S>()
    }

    fn describe(&self) -> Result<(), RegistryError> {
        ensure_described::<S>()
    }

    fn create(&self) -> Box<dyn RenderBackend> {
        Box::new(CanvasBackend::new(S::default()))
    }
}

/// Definition of a shader lightscript built from its script type
pub struct ShaderDefinition<S> {
    id: &'static str,
    category: &'static str,
    _script: PhantomData<fn() -> S>,
}

impl<S> ShaderDefinition<S> {
    pub fn new(id: &'static str, category: &'static str) -> Self {
        Self {
            id,
            category,
            _script: PhantomData,
        }
    }
}

impl<S: ShaderScript + Describe + Default> LightscriptDefinition for ShaderDefinition<S> {
    fn effect_id(&self) -> &'static str {
        self.id
    }

    fn category(&self) -> &'static str {
        self.category
    }

    fn family(&self) -> RendererFamily {
        RendererFamily::Shader
    }

    fn effect_class(&self) -> ClassKey {
        ClassKey::of::<S>()
    }

    fn describe(&self) -> Result<(), RegistryError> {
        ensure_described::<S>()
    }

    fn create(&self) -> Box<dyn RenderBackend> {
        Box::new(ShaderBackend::new(S::default()))
    }
}

/// Discovery entry for one lightscript
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSummary {
    pub id: String,
    pub category: String,
    pub family: RendererFamily,
    pub descriptor: EffectDescriptor,
    pub control_count: usize,
}

/// Registry of loadable lightscripts
#[derive(Default)]
pub struct EffectCatalog {
    /// Definitions by effect id
    effects: HashMap<String, Arc<dyn LightscriptDefinition>>,
    /// Ids in registration order
    order: Vec<String>,
    /// Effect ids grouped by category
    categories: HashMap<String, Vec<String>>,
    /// Ordered list of categories for display
    category_order: Vec<String>,
}

impl EffectCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in lightscripts registered
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut catalog = Self::new();
        super::builtin::register_builtin_effects(&mut catalog)?;
        Ok(catalog)
    }

    /// Describe and register a definition
    ///
    /// A declaration error is returned and the definition is not added.
    pub fn register(&mut self, definition: impl LightscriptDefinition + 'static) -> Result<(), RegistryError> {
        definition.describe()?;

        let id = definition.effect_id().to_string();
        let category = definition.category().to_string();

        if self.effects.contains_key(&id) {
            tracing::warn!(effect = %id, "Lightscript registered twice, replacing");
            self.order.retain(|e| e != &id);
            for ids in self.categories.values_mut() {
                ids.retain(|e| e != &id);
            }
        }

        if !self.categories.contains_key(&category) {
            self.category_order.push(category.clone());
        }
        self.categories.entry(category).or_default().push(id.clone());
        self.order.push(id.clone());
        self.effects.insert(id, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn LightscriptDefinition>> {
        self.effects.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }

    /// Ids in registration order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Category names in display order
    pub fn categories(&self) -> &[String] {
        &self.category_order
    }

    pub fn effects_in_category(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Declared controls of an effect, without instantiating it
    pub fn controls(&self, id: &str) -> Option<Vec<ControlDefinition>> {
        self.effects.get(id).map(|def| controls_by_key(def.effect_class()))
    }

    pub fn descriptor(&self, id: &str) -> Option<EffectDescriptor> {
        self.effects.get(id).map(|def| descriptor_by_key(def.effect_class()))
    }

    pub fn schema(&self, id: &str) -> Option<EffectSchema> {
        let def = self.effects.get(id)?;
        let class = def.effect_class();
        Some(EffectSchema::new(id, descriptor_by_key(class), &controls_by_key(class)))
    }

    pub fn summary(&self, id: &str) -> Option<EffectSummary> {
        let def = self.effects.get(id)?;
        let class = def.effect_class();
        Some(EffectSummary {
            id: id.to_string(),
            category: def.category().to_string(),
            family: def.family(),
            descriptor: descriptor_by_key(class),
            control_count: controls_by_key(class).len(),
        })
    }

    /// Summaries in registration order
    pub fn summaries(&self) -> Vec<EffectSummary> {
        self.order.iter().filter_map(|id| self.summary(id)).collect()
    }

    /// Effects whose id, name or category contains the query
    pub fn search(&self, query: &str) -> Vec<EffectSummary> {
        let query_lower = query.to_lowercase();
        self.summaries()
            .into_iter()
            .filter(|s| {
                s.id.to_lowercase().contains(&query_lower)
                    || s.descriptor.name.to_lowercase().contains(&query_lower)
                    || s.category.to_lowercase().contains(&query_lower)
            })
            .collect()
    }
}
