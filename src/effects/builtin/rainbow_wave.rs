//! Rainbow Wave
//!
//! Scrolling vertical color bands with an optional center glow.

use crate::controls::{ClassDeclaration, ControlBridge, ControlSpec, Describe, EffectDescriptor, RegistryError};
use crate::effects::surface::{hsv_to_rgb, rgba, Canvas2d};
use crate::effects::traits::{CanvasScript, FrameTime};

/// Band width in pixels
const BAND_WIDTH: f32 = 4.0;
/// Hue scroll rate at unit speed, degrees per second
const SCROLL_RATE: f32 = 90.0;

pub const MODES: [&str; 3] = ["Rainbow", "Fire", "Ocean"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainbowSettings {
    /// Normalized speed multiplier
    pub speed: f32,
    /// Index into [`MODES`]
    pub mode: usize,
    pub glow: bool,
    /// Brightness scale, 1.0 = 100%
    pub brightness: f32,
}

impl Default for RainbowSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            mode: 0,
            glow: true,
            brightness: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct RainbowWave {
    settings: RainbowSettings,
    /// Accumulated hue offset in degrees
    offset: f32,
}

impl RainbowWave {
    pub fn settings(&self) -> RainbowSettings {
        self.settings
    }

    fn palette_hue(&self, position: f32) -> f32 {
        let h = position + self.offset;
        match self.settings.mode {
            1 => 25.0 + 25.0 * h.to_radians().sin(),
            2 => 200.0 + 30.0 * h.to_radians().sin(),
            _ => h,
        }
    }
}

impl Describe for RainbowWave {
    fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
        decl.effect(EffectDescriptor::new(
            "Rainbow Wave",
            "Scrolling color bands",
            "lightscript",
        ))
        .control(
            ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0)
                .step(1.0)
                .tooltip("Animation speed"),
        )?
        .control(ControlSpec::enumeration("mode", "Mode", &MODES, "Rainbow"))?
        .control(ControlSpec::boolean("glow", "Glow", true))?
        .control(ControlSpec::number("brightness", "Brightness", 100.0, 0.0, 200.0).tooltip("Percent"))?;
        Ok(())
    }
}

impl CanvasScript for RainbowWave {
    type Controls = RainbowSettings;

    fn read_controls(bridge: &ControlBridge<'_>) -> RainbowSettings {
        RainbowSettings {
            speed: bridge.speed("speed") as f32,
            mode: bridge.enum_index("mode"),
            glow: bridge.flag("glow"),
            brightness: bridge.percentage("brightness", 0.0) as f32,
        }
    }

    fn apply_controls(&mut self, controls: RainbowSettings) {
        self.settings = controls;
    }

    fn draw(&mut self, canvas: &mut Canvas2d<'_>, time: FrameTime) {
        self.offset = (self.offset + time.delta * self.settings.speed * SCROLL_RATE).rem_euclid(360.0);

        let (width, height) = (canvas.width(), canvas.height());
        canvas.clear(rgba(0.0, 0.0, 0.0, 1.0));

        let value = self.settings.brightness.min(1.0);
        let bands = (width / BAND_WIDTH).ceil() as u32;
        for i in 0..bands {
            let x = i as f32 * BAND_WIDTH;
            let [r, g, b] = hsv_to_rgb(self.palette_hue(x / width * 360.0), 1.0, value);
            canvas.fill_rect(x, 0.0, BAND_WIDTH, height, rgba(r, g, b, 1.0));
        }

        if self.settings.glow {
            // Brightness above 100% only strengthens the glow
            let alpha = 0.15 * self.settings.brightness;
            canvas.fill_circle(width / 2.0, height / 2.0, height / 3.0, rgba(1.0, 1.0, 1.0, alpha));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{controls_of, ensure_described, ControlKind, ControlStore, MemoryStore};
    use crate::effects::surface::{SurfaceSet, SURFACE_ID};
    use serde_json::json;

    #[test]
    fn test_declared_controls() {
        ensure_described::<RainbowWave>().unwrap();
        let controls = controls_of::<RainbowWave>();
        let ids: Vec<&str> = controls.iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["speed", "mode", "glow", "brightness"]);
        assert_eq!(controls[1].kind(), ControlKind::Enum);
    }

    #[test]
    fn test_read_controls() {
        ensure_described::<RainbowWave>().unwrap();
        let controls = controls_of::<RainbowWave>();
        let mut store = MemoryStore::new();
        store.set("speed", json!(5));
        store.set("mode", json!("Fire"));
        store.set("glow", json!(false));
        store.set("brightness", json!(50));

        let settings = RainbowWave::read_controls(&ControlBridge::new(&store, &controls));
        assert_eq!(settings.speed, 1.0);
        assert_eq!(settings.mode, 1);
        assert!(!settings.glow);
        assert_eq!(settings.brightness, 0.5);
    }

    #[test]
    fn test_draw_fills_surface() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 32, 16).unwrap();
        let mut wave = RainbowWave::default();
        wave.apply_controls(RainbowSettings {
            glow: false,
            ..Default::default()
        });
        wave.draw(&mut surface.canvas(), FrameTime::default());

        // First band is pure red at hue 0
        assert_eq!(surface.pixel(1, 1), Some([255, 0, 0, 255]));
    }
}
