//! Control metadata registry
//!
//! Holds the control definitions and effect descriptor declared by each
//! effect class. Entries are keyed by class identity, appended during class
//! declaration and never removed for the life of the process.
//!
//! Classes declare themselves by implementing [`Describe`]; the declaration
//! runs once, the first time [`ensure_described`] is called for the class.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use super::error::RegistryError;
use super::template;
use super::types::{ControlDefinition, ControlSpec, EffectDescriptor};

/// Identity of an effect class
///
/// Equality and hashing use the Rust type id only; `name` is for display and
/// for the fallback descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ClassKey {
    type_id: TypeId,
    name: &'static str,
}

impl ClassKey {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Short class identifier (last path segment of the type name)
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassKey {}

impl std::hash::Hash for ClassKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl std::fmt::Display for ClassKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Resolves an instance to its declaring class
pub trait EffectClass {
    fn class_key(&self) -> ClassKey;
}

impl<T: 'static> EffectClass for T {
    fn class_key(&self) -> ClassKey {
        ClassKey::of::<T>()
    }
}

#[derive(Debug, Default)]
struct ClassMetadata {
    /// Definitions in declaration order
    controls: Vec<ControlDefinition>,
    /// Index into `controls` by id
    by_id: HashMap<String, usize>,
    descriptor: Option<EffectDescriptor>,
}

/// Class-keyed table of control definitions and descriptors
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    classes: HashMap<ClassKey, ClassMetadata>,
    /// Outcome of each class declaration that has run
    declarations: HashMap<ClassKey, Result<(), RegistryError>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a control for `class`
    ///
    /// Fails with `DuplicateControl` when the id is already declared on the
    /// class and with `InvalidControlDefinition` when the spec is malformed.
    pub fn register_control(&mut self, class: ClassKey, spec: ControlSpec) -> Result<(), RegistryError> {
        self.check_unique(class, spec.id().trim())?;
        let definition = spec.build()?;
        self.insert(class, definition);
        Ok(())
    }

    /// Append an already validated definition
    pub fn register_definition(&mut self, class: ClassKey, definition: ControlDefinition) -> Result<(), RegistryError> {
        self.check_unique(class, definition.id())?;
        self.insert(class, definition);
        Ok(())
    }

    /// Attach a descriptor to `class`, replacing any earlier one
    pub fn register_effect_descriptor(&mut self, class: ClassKey, descriptor: EffectDescriptor) {
        let meta = self.classes.entry(class).or_default();
        if let Some(previous) = &meta.descriptor {
            tracing::debug!(
                class = class.name(),
                previous = %previous.name,
                name = %descriptor.name,
                "Effect descriptor overwritten"
            );
        }
        meta.descriptor = Some(descriptor);
    }

    /// Register the descriptor and controls found in a legacy template
    pub fn register_template(&mut self, class: ClassKey, markup: &str) -> Result<(), RegistryError> {
        let document = template::extract(markup).map_err(|e| e.into_registry_error(class.name()))?;
        if let Some(descriptor) = document.descriptor {
            self.register_effect_descriptor(class, descriptor);
        }
        for definition in document.controls {
            self.register_definition(class, definition)?;
        }
        Ok(())
    }

    /// Controls in declaration order (empty when the class declared none)
    pub fn controls(&self, class: ClassKey) -> &[ControlDefinition] {
        self.classes.get(&class).map(|m| m.controls.as_slice()).unwrap_or(&[])
    }

    /// Look up a single control
    pub fn control(&self, class: ClassKey, id: &str) -> Option<&ControlDefinition> {
        let meta = self.classes.get(&class)?;
        meta.by_id.get(id).and_then(|&i| meta.controls.get(i))
    }

    /// Registered descriptor, or the fallback named after the class
    pub fn descriptor(&self, class: ClassKey) -> EffectDescriptor {
        self.classes
            .get(&class)
            .and_then(|m| m.descriptor.clone())
            .unwrap_or_else(|| EffectDescriptor::fallback(class.name()))
    }

    /// Whether the class's declaration has run
    pub fn is_described(&self, class: ClassKey) -> bool {
        self.declarations.contains_key(&class)
    }

    /// Run the declaration for `T` unless it already ran, returning its outcome
    pub fn describe<T: Describe>(&mut self) -> Result<(), RegistryError> {
        let class = ClassKey::of::<T>();
        if let Some(outcome) = self.declarations.get(&class) {
            return outcome.clone();
        }
        let outcome = {
            let mut declaration = ClassDeclaration { registry: self, class };
            T::describe(&mut declaration)
        };
        match &outcome {
            Ok(()) => tracing::debug!(
                class = class.name(),
                controls = self.controls(class).len(),
                "Effect class described"
            ),
            Err(e) => tracing::error!(class = class.name(), error = %e, "Effect class declaration failed"),
        }
        self.declarations.insert(class, outcome.clone());
        outcome
    }

    fn check_unique(&self, class: ClassKey, id: &str) -> Result<(), RegistryError> {
        if self.control(class, id).is_some() {
            return Err(RegistryError::DuplicateControl {
                class: class.name().to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, class: ClassKey, definition: ControlDefinition) {
        let meta = self.classes.entry(class).or_default();
        meta.by_id.insert(definition.id().to_string(), meta.controls.len());
        meta.controls.push(definition);
    }
}

/// Declaration builder handed to [`Describe::describe`]
pub struct ClassDeclaration<'a> {
    registry: &'a mut MetadataRegistry,
    class: ClassKey,
}

impl ClassDeclaration<'_> {
    pub fn class(&self) -> ClassKey {
        self.class
    }

    pub fn effect(&mut self, descriptor: EffectDescriptor) -> &mut Self {
        self.registry.register_effect_descriptor(self.class, descriptor);
        self
    }

    pub fn control(&mut self, spec: ControlSpec) -> Result<&mut Self, RegistryError> {
        self.registry.register_control(self.class, spec)?;
        Ok(self)
    }

    /// Declare through a legacy lightscript document
    pub fn template(&mut self, markup: &str) -> Result<&mut Self, RegistryError> {
        self.registry.register_template(self.class, markup)?;
        Ok(self)
    }
}

/// Class-level declaration of controls and descriptor
///
/// Implementations must only use the provided declaration; the global
/// registry is locked while `describe` runs.
pub trait Describe: 'static {
    fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError>;
}

fn global() -> &'static RwLock<MetadataRegistry> {
    static REGISTRY: OnceLock<RwLock<MetadataRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(MetadataRegistry::new()))
}

/// Run `T`'s declaration against the process-wide registry, once
pub fn ensure_described<T: Describe>() -> Result<(), RegistryError> {
    let class = ClassKey::of::<T>();
    if let Some(outcome) = global().read().declarations.get(&class) {
        return outcome.clone();
    }
    global().write().describe::<T>()
}

/// Run a closure against the process-wide registry
pub fn with_registry<R>(f: impl FnOnce(&MetadataRegistry) -> R) -> R {
    f(&global().read())
}

pub fn controls_of<T: 'static>() -> Vec<ControlDefinition> {
    controls_by_key(ClassKey::of::<T>())
}

pub fn controls_for<T: EffectClass + ?Sized>(instance: &T) -> Vec<ControlDefinition> {
    controls_by_key(instance.class_key())
}

pub fn controls_by_key(class: ClassKey) -> Vec<ControlDefinition> {
    global().read().controls(class).to_vec()
}

pub fn descriptor_of<T: 'static>() -> EffectDescriptor {
    descriptor_by_key(ClassKey::of::<T>())
}

pub fn descriptor_for<T: EffectClass + ?Sized>(instance: &T) -> EffectDescriptor {
    descriptor_by_key(instance.class_key())
}

pub fn descriptor_by_key(class: ClassKey) -> EffectDescriptor {
    global().read().descriptor(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::types::ControlKind;

    struct Plain;
    struct Other;

    #[test]
    fn test_controls_keep_declaration_order() {
        let mut registry = MetadataRegistry::new();
        let class = ClassKey::of::<Plain>();
        for i in 0..12 {
            registry
                .register_control(class, ControlSpec::number(format!("c{}", i), "C", 0.0, 0.0, 1.0))
                .unwrap();
        }

        let ids: Vec<&str> = registry.controls(class).iter().map(|c| c.id()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
        assert_eq!(ids, expected);
        assert!(registry.control(class, "c7").is_some());
    }

    #[test]
    fn test_duplicate_control_rejected() {
        let mut registry = MetadataRegistry::new();
        let class = ClassKey::of::<Plain>();
        registry.register_control(class, ControlSpec::boolean("glow", "Glow", true)).unwrap();
        let err = registry
            .register_control(class, ControlSpec::boolean("glow", "Glow again", false))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateControl { class: "Plain".into(), id: "glow".into() }
        );
        assert_eq!(registry.controls(class).len(), 1);
    }

    #[test]
    fn test_same_id_on_different_classes() {
        let mut registry = MetadataRegistry::new();
        registry
            .register_control(ClassKey::of::<Plain>(), ControlSpec::boolean("glow", "Glow", true))
            .unwrap();
        registry
            .register_control(ClassKey::of::<Other>(), ControlSpec::boolean("glow", "Glow", true))
            .unwrap();
    }

    #[test]
    fn test_invalid_definition_not_registered() {
        let mut registry = MetadataRegistry::new();
        let class = ClassKey::of::<Plain>();
        let err = registry
            .register_control(class, ControlSpec::number("speed", "Speed", 5.0, 10.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidControlDefinition { .. }));
        assert!(registry.controls(class).is_empty());
    }

    #[test]
    fn test_unknown_class_has_no_controls_and_fallback_descriptor() {
        let registry = MetadataRegistry::new();
        let class = ClassKey::of::<Other>();
        assert!(registry.controls(class).is_empty());
        assert_eq!(registry.descriptor(class), EffectDescriptor::fallback("Other"));
    }

    #[test]
    fn test_descriptor_overwrite() {
        let mut registry = MetadataRegistry::new();
        let class = ClassKey::of::<Plain>();
        registry.register_effect_descriptor(class, EffectDescriptor::new("First", "", ""));
        registry.register_effect_descriptor(class, EffectDescriptor::new("Second", "desc", "me"));
        assert_eq!(registry.descriptor(class).name, "Second");
        assert_eq!(registry.descriptor(class).author, "me");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("lightscript::effects::RainbowWave"), "RainbowWave");
        assert_eq!(short_type_name("a::Canvas<b::Inner>"), "Canvas");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    struct Declared;

    impl Describe for Declared {
        fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
            decl.effect(EffectDescriptor::new("Declared", "A test effect", "tests"))
                .control(ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0))?
                .control(ControlSpec::enumeration("mode", "Mode", &["Rainbow", "Fire"], "Rainbow"))?;
            Ok(())
        }
    }

    #[test]
    fn test_ensure_described_runs_once() {
        ensure_described::<Declared>().unwrap();
        ensure_described::<Declared>().unwrap();

        let controls = controls_of::<Declared>();
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[1].kind(), ControlKind::Enum);
        assert_eq!(controls_for(&Declared), controls);
        assert_eq!(descriptor_for(&Declared).description, "A test effect");
        assert!(with_registry(|r| r.is_described(ClassKey::of::<Declared>())));
    }

    struct Broken;

    impl Describe for Broken {
        fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
            decl.control(ControlSpec::boolean("glow", "Glow", true))?
                .control(ControlSpec::boolean("glow", "Glow", false))?;
            Ok(())
        }
    }

    #[test]
    fn test_failed_declaration_is_sticky() {
        let first = ensure_described::<Broken>().unwrap_err();
        let second = ensure_described::<Broken>().unwrap_err();
        assert_eq!(first, second);
        assert!(matches!(first, RegistryError::DuplicateControl { .. }));
    }

    #[test]
    fn test_template_declaration() {
        let mut registry = MetadataRegistry::new();
        let class = ClassKey::of::<Plain>();
        let markup = r#"<head>
            <title>Templated</title>
            <meta property="count" label="Count" type="number" min="0" max="10" default="3"/>
        </head>"#;
        registry.register_template(class, markup).unwrap();
        assert_eq!(registry.descriptor(class).name, "Templated");
        assert_eq!(registry.controls(class)[0].id(), "count");

        let err = registry.register_template(class, markup).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateControl { .. }));
    }
}
