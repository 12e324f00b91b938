//! Lightscript rendering and lifecycle
//!
//! The effects system separates what an effect draws from how it is driven:
//!
//! - **Traits** (`traits.rs`): `RenderBackend` capability trait plus the
//!   `CanvasScript`/`ShaderScript` traits concrete effects implement
//! - **Lifecycle** (`lifecycle.rs`): the initialize → render → stop state machine
//! - **Scheduler** (`scheduler.rs`): frame callbacks, one in flight per effect
//! - **Surface** (`surface.rs`): the pixel surface and the 2D canvas facade
//! - **Canvas / Shader** (`canvas.rs`, `shader.rs`): the two renderer families
//! - **Catalog** (`catalog.rs`): loadable lightscripts by id
//! - **Builtin** (`builtin/`): rainbow_wave, sparkle_field, color_pulse
//!
//! # Usage
//!
//! ```ignore
//! let catalog = EffectCatalog::builtin()?;
//! let definition = catalog.get("rainbow_wave").unwrap();
//! let mut lifecycle = EffectLifecycle::new(
//!     InstanceId(1),
//!     definition.create(),
//!     catalog.controls("rainbow_wave").unwrap(),
//!     LifecycleConfig::default(),
//! );
//! pollster::block_on(lifecycle.initialize(env, Instant::now()));
//! ```

mod canvas;
mod catalog;
mod lifecycle;
mod scheduler;
mod shader;
mod surface;
mod traits;
pub mod builtin;

pub use canvas::*;
pub use catalog::*;
pub use lifecycle::*;
pub use scheduler::*;
pub use shader::*;
pub use surface::*;
pub use traits::*;
