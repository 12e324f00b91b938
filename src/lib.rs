//! Lightscript
//!
//! Effect control and lifecycle framework for parameterized visual effects.
//! Effects declare typed controls, the host renders them in a control panel
//! and mirrors their values into a global store, and each effect instance is
//! driven through initialize, frame-by-frame rendering and teardown.

pub mod controls;
pub mod effects;
pub mod host;
pub mod settings;
pub mod telemetry;

pub use controls::{ControlBridge, ControlDefinition, ControlKind, ControlSpec, ControlStore, ControlValue, MemoryStore};
pub use effects::{EffectCatalog, EffectLifecycle, LifecycleState, RendererFamily};
pub use host::{HostConfig, HostError, LightscriptHost};
pub use settings::HostPreferences;
