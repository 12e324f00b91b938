//! Built-in lightscripts
//!
//! This module contains the lightscripts that ship with the framework.

mod color_pulse;
mod rainbow_wave;
mod sparkle_field;

pub use color_pulse::{ColorPulse, PulseSettings};
pub use rainbow_wave::{RainbowSettings, RainbowWave};
pub use sparkle_field::{SparkleField, SparkleSettings};

use super::catalog::{CanvasDefinition, EffectCatalog, ShaderDefinition};
use crate::controls::RegistryError;

/// Register all built-in lightscripts with the catalog
pub fn register_builtin_effects(catalog: &mut EffectCatalog) -> Result<(), RegistryError> {
    catalog.register(CanvasDefinition::<RainbowWave>::new("rainbow_wave", "Ambient"))?;
    catalog.register(CanvasDefinition::<SparkleField>::new("sparkle_field", "Ambient"))?;
    catalog.register(ShaderDefinition::<ColorPulse>::new("color_pulse", "Pulse"))?;
    Ok(())
}
