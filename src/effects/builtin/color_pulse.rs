//! Color Pulse
//!
//! Concentric pulses of a base color, rendered by a fragment shader.

use crate::controls::{ClassDeclaration, ControlBridge, ControlSpec, Describe, EffectDescriptor, RegistryError};
use crate::effects::shader::ShaderUniforms;
use crate::effects::traits::ShaderScript;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseSettings {
    pub color: [f32; 3],
    /// Hue rotation in degrees
    pub hue: f32,
    /// Pulses per second
    pub rate: f32,
    pub intensity: f32,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            color: [0.0, 0.6, 1.0],
            hue: 0.0,
            rate: 1.0,
            intensity: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ColorPulse {
    settings: PulseSettings,
}

impl Describe for ColorPulse {
    fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
        decl.effect(EffectDescriptor::new(
            "Color Pulse",
            "Concentric pulses of a single color",
            "lightscript",
        ))
        .control(ControlSpec::color("color", "Color", "#0099ff"))?
        .control(ControlSpec::hue("hue", "Hue Shift", 0.0).step(1.0))?
        .control(ControlSpec::number("rate", "Pulse Rate", 5.0, 1.0, 10.0).step(1.0))?
        .control(ControlSpec::number("intensity", "Intensity", 100.0, 10.0, 200.0).tooltip("Percent"))?;
        Ok(())
    }
}

impl ShaderScript for ColorPulse {
    type Controls = PulseSettings;

    fn fragment_source() -> &'static str {
        include_str!("../../shaders/color_pulse.wgsl")
    }

    fn read_controls(bridge: &ControlBridge<'_>) -> PulseSettings {
        PulseSettings {
            color: bridge.color("color"),
            hue: bridge.hue("hue") as f32,
            rate: bridge.speed("rate") as f32,
            intensity: bridge.percentage("intensity", 0.1) as f32,
        }
    }

    fn apply_controls(&mut self, controls: PulseSettings) {
        self.settings = controls;
    }

    fn write_uniforms(&self, uniforms: &mut ShaderUniforms) {
        uniforms.set_vec3(0, self.settings.color);
        uniforms.set_float(3, self.settings.hue);
        uniforms.set_float(4, self.settings.rate);
        uniforms.set_float(5, self.settings.intensity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{controls_of, ensure_described, ControlStore, MemoryStore};
    use crate::effects::traits::FrameTime;
    use serde_json::json;

    #[test]
    fn test_uniform_packing() {
        ensure_described::<ColorPulse>().unwrap();
        let controls = controls_of::<ColorPulse>();
        let mut store = MemoryStore::new();
        store.set("color", json!("#ff0000"));
        store.set("hue", json!(90));
        store.set("rate", json!(5));
        store.set("intensity", json!(0));

        let mut pulse = ColorPulse::default();
        pulse.apply_controls(ColorPulse::read_controls(&ControlBridge::new(&store, &controls)));

        let mut uniforms = ShaderUniforms::new(FrameTime::default(), 320, 200);
        pulse.write_uniforms(&mut uniforms);
        assert_eq!(&uniforms.params[..6], &[1.0, 0.0, 0.0, 90.0, 1.0, 0.1]);
    }

    #[test]
    fn test_fragment_defines_entry_point() {
        assert!(ColorPulse::fragment_source().contains("fn fs_main"));
    }
}
