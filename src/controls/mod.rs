//! Control metadata and value synchronization
//!
//! - **Types** (`types.rs`): control definitions, typed values, descriptors
//! - **Registry** (`registry.rs`): class-keyed declarations, populated once per class
//! - **Template** (`template.rs`): legacy meta-tag declarations
//! - **Schema** (`schema.rs`): JSON and markup export of an effect's controls
//! - **Store** (`store.rs`): the host's untyped key-value store
//! - **Bridge** (`bridge.rs`): coercion between store values and typed values
//!
//! # Usage
//!
//! ```ignore
//! struct RainbowWave;
//!
//! impl Describe for RainbowWave {
//!     fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
//!         decl.effect(EffectDescriptor::new("Rainbow Wave", "Scrolling bands", "lightscript"))
//!             .control(ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0))?;
//!         Ok(())
//!     }
//! }
//!
//! ensure_described::<RainbowWave>()?;
//! let controls = controls_of::<RainbowWave>();
//! ```

mod error;
mod types;
pub mod bridge;
pub mod registry;
pub mod schema;
pub mod store;
pub mod template;

pub use bridge::ControlBridge;
pub use error::RegistryError;
pub use registry::{
    controls_for, controls_of, descriptor_for, descriptor_of, ensure_described, ClassDeclaration, ClassKey,
    Describe, EffectClass, MetadataRegistry,
};
pub use schema::{ControlSchema, EffectSchema};
pub use store::{ControlStore, MemoryStore};
pub use template::{TemplateDocument, TemplateError};
pub use types::*;
