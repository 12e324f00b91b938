//! Sparkle Field
//!
//! Random twinkling points. Declared through a legacy meta-tag template.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::controls::{ClassDeclaration, ControlBridge, Describe, RegistryError};
use crate::effects::surface::{hsv_to_rgb, rgba, Canvas2d};
use crate::effects::traits::{CanvasScript, FrameTime, RendererAcquisitionError};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Sparkle Field</title>
    <meta description="Random twinkling points"/>
    <meta publisher="lightscript"/>
    <meta property="density" label="Density" type="number" min="1" max="100" step="1" default="40" tooltip="Sparkles spawned per second at unit speed"/>
    <meta property="palette" label="Palette" type="combobox" values="Warm,Cool,Mono" default="Warm"/>
    <meta property="trails" label="Trails" type="boolean" default="0"/>
    <meta property="speed" label="Speed" type="number" min="1" max="10" step="1" default="5"/>
</head>
<body>
    <canvas id="lightscript-canvas" width="320" height="200"></canvas>
</body>
</html>"#;

const MAX_SPARKLES: usize = 512;
/// Life lost per second
const FADE_RATE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparkleSettings {
    pub density: f32,
    pub palette: usize,
    pub trails: bool,
    pub speed: f32,
}

impl Default for SparkleSettings {
    fn default() -> Self {
        Self {
            density: 40.0,
            palette: 0,
            trails: false,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sparkle {
    x: f32,
    y: f32,
    hue: f32,
    radius: f32,
    life: f32,
}

#[derive(Debug)]
pub struct SparkleField {
    settings: SparkleSettings,
    sparkles: Vec<Sparkle>,
    spawn_accumulator: f32,
    rng: StdRng,
    width: f32,
    height: f32,
}

impl Default for SparkleField {
    fn default() -> Self {
        Self {
            settings: SparkleSettings::default(),
            sparkles: Vec::with_capacity(MAX_SPARKLES),
            spawn_accumulator: 0.0,
            rng: StdRng::seed_from_u64(0x5eed),
            width: 0.0,
            height: 0.0,
        }
    }
}

impl SparkleField {
    pub fn live_sparkles(&self) -> usize {
        self.sparkles.len()
    }

    fn spawn(&mut self) -> Sparkle {
        let hue = match self.settings.palette {
            0 => self.rng.random_range(0.0..60.0),
            1 => self.rng.random_range(170.0..260.0),
            _ => 0.0,
        };
        Sparkle {
            x: self.rng.random::<f32>() * self.width,
            y: self.rng.random::<f32>() * self.height,
            hue,
            radius: self.rng.random_range(1.0..2.5),
            life: 1.0,
        }
    }
}

impl Describe for SparkleField {
    fn describe(decl: &mut ClassDeclaration<'_>) -> Result<(), RegistryError> {
        decl.template(TEMPLATE)?;
        Ok(())
    }
}

impl CanvasScript for SparkleField {
    type Controls = SparkleSettings;

    fn setup(&mut self, width: u32, height: u32) -> Result<(), RendererAcquisitionError> {
        self.width = width as f32;
        self.height = height as f32;
        self.sparkles.clear();
        Ok(())
    }

    fn read_controls(bridge: &ControlBridge<'_>) -> SparkleSettings {
        SparkleSettings {
            density: bridge.bounded("density") as f32,
            palette: bridge.enum_index("palette"),
            trails: bridge.flag("trails"),
            speed: bridge.speed("speed") as f32,
        }
    }

    fn apply_controls(&mut self, controls: SparkleSettings) {
        self.settings = controls;
    }

    fn draw(&mut self, canvas: &mut Canvas2d<'_>, time: FrameTime) {
        let dt = time.delta;

        for sparkle in &mut self.sparkles {
            sparkle.life -= dt * FADE_RATE * self.settings.speed;
        }
        self.sparkles.retain(|s| s.life > 0.0);

        let spawned = self.settings.density * self.settings.speed * dt;
        if spawned.is_finite() {
            self.spawn_accumulator += spawned;
        }
        while self.spawn_accumulator >= 1.0 && self.sparkles.len() < MAX_SPARKLES {
            self.spawn_accumulator -= 1.0;
            let sparkle = self.spawn();
            self.sparkles.push(sparkle);
        }
        if self.sparkles.len() >= MAX_SPARKLES {
            self.spawn_accumulator = 0.0;
        }

        if self.settings.trails {
            let (w, h) = (canvas.width(), canvas.height());
            canvas.fill_rect(0.0, 0.0, w, h, rgba(0.0, 0.0, 0.0, 0.2));
        } else {
            canvas.clear(rgba(0.0, 0.0, 0.0, 1.0));
        }

        let mono = self.settings.palette == 2;
        for sparkle in &self.sparkles {
            let [r, g, b] = hsv_to_rgb(sparkle.hue, if mono { 0.0 } else { 0.8 }, 1.0);
            canvas.fill_circle(sparkle.x, sparkle.y, sparkle.radius, rgba(r, g, b, sparkle.life));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{controls_of, descriptor_of, ensure_described, ControlKind, ControlStore, MemoryStore};
    use serde_json::json;
    use crate::effects::surface::{SurfaceSet, SURFACE_ID};

    #[test]
    fn test_template_declaration() {
        ensure_described::<SparkleField>().unwrap();
        let controls = controls_of::<SparkleField>();
        let ids: Vec<&str> = controls.iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["density", "palette", "trails", "speed"]);
        assert_eq!(controls[1].kind(), ControlKind::Enum);
        assert_eq!(descriptor_of::<SparkleField>().name, "Sparkle Field");
    }

    #[test]
    fn test_spawn_and_fade() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 64, 32).unwrap();
        let mut field = SparkleField::default();
        field.setup(64, 32).unwrap();

        // 40/s for half a second
        let half = FrameTime { elapsed: 0.5, delta: 0.5, frame: 0 };
        field.draw(&mut surface.canvas(), half);
        assert_eq!(field.live_sparkles(), 20);

        // Earlier sparkles fade out; one new one is spawned
        let second = FrameTime { elapsed: 1.5, delta: 1.0, frame: 1 };
        field.apply_controls(SparkleSettings {
            density: 1.0,
            ..Default::default()
        });
        field.draw(&mut surface.canvas(), second);
        assert_eq!(field.live_sparkles(), 1);
    }

    #[test]
    fn test_density_outside_bounds() {
        ensure_described::<SparkleField>().unwrap();
        let controls = controls_of::<SparkleField>();
        let mut store = MemoryStore::new();
        store.set("density", json!(1e300));
        let settings = SparkleField::read_controls(&ControlBridge::new(&store, &controls));
        assert_eq!(settings.density, 100.0);

        store.set("density", json!(-3));
        let settings = SparkleField::read_controls(&ControlBridge::new(&store, &controls));
        assert_eq!(settings.density, 1.0);
    }

    #[test]
    fn test_overflowing_rate_does_not_stall_spawning() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 64, 32).unwrap();
        let mut field = SparkleField::default();
        field.setup(64, 32).unwrap();

        field.apply_controls(SparkleSettings {
            speed: f32::INFINITY,
            ..Default::default()
        });
        field.draw(&mut surface.canvas(), FrameTime { elapsed: 0.0, delta: 0.0, frame: 0 });

        field.apply_controls(SparkleSettings::default());
        field.draw(&mut surface.canvas(), FrameTime { elapsed: 0.5, delta: 0.5, frame: 1 });
        assert_eq!(field.live_sparkles(), 20);
    }

    #[test]
    fn test_spawn_is_capped() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 16, 16).unwrap();
        let mut field = SparkleField::default();
        field.setup(16, 16).unwrap();
        field.apply_controls(SparkleSettings {
            density: 100.0,
            speed: 100.0,
            ..Default::default()
        });
        field.draw(&mut surface.canvas(), FrameTime { elapsed: 1.0, delta: 1.0, frame: 0 });
        assert!(field.live_sparkles() <= MAX_SPARKLES);
    }
}
