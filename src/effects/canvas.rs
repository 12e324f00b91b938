//! Canvas renderer family

use crate::controls::{ClassKey, ControlBridge};

use super::surface::Surface;
use super::traits::{AcquireFuture, CanvasScript, FrameTime, RenderBackend, RendererAcquisitionError, RendererFamily};

/// Drives a [`CanvasScript`] through the lifecycle engine
pub struct CanvasBackend<S: CanvasScript> {
    script: S,
    acquired: bool,
}

impl<S: CanvasScript> CanvasBackend<S> {
    pub fn new(script: S) -> Self {
        Self { script, acquired: false }
    }

    pub fn script(&self) -> &S {
        &self.script
    }
}

impl<S: CanvasScript> RenderBackend for CanvasBackend<S> {
    fn family(&self) -> RendererFamily {
        RendererFamily::Canvas2d
    }

    fn effect_class(&self) -> ClassKey {
        ClassKey::of::<S>()
    }

    fn acquire<'a>(&'a mut self, surface: &'a mut Surface) -> AcquireFuture<'a> {
        Box::pin(async move {
            self.script.setup(surface.width(), surface.height())?;
            self.acquired = true;
            Ok::<(), RendererAcquisitionError>(())
        })
    }

    fn draw_frame(&mut self, surface: &mut Surface, time: FrameTime) {
        if !self.acquired {
            return;
        }
        let mut canvas = surface.canvas();
        self.script.draw(&mut canvas, time);
    }

    fn apply_controls(&mut self, bridge: &ControlBridge<'_>) {
        let controls = S::read_controls(bridge);
        self.script.apply_controls(controls);
    }

    fn release(&mut self) {
        self.acquired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::MemoryStore;
    use crate::effects::surface::{rgba, Canvas2d, SurfaceSet, SURFACE_ID};

    #[derive(Default)]
    struct Fill {
        frames: u32,
        level: f32,
    }

    impl CanvasScript for Fill {
        type Controls = f32;

        fn read_controls(bridge: &ControlBridge<'_>) -> f32 {
            bridge.percentage("level", 0.0) as f32
        }

        fn apply_controls(&mut self, level: f32) {
            self.level = level;
        }

        fn draw(&mut self, canvas: &mut Canvas2d<'_>, _time: FrameTime) {
            self.frames += 1;
            canvas.clear(rgba(self.level, 0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn test_no_draw_before_acquire() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 4, 4).unwrap();
        let mut backend = CanvasBackend::new(Fill::default());

        backend.draw_frame(surface, FrameTime::default());
        assert_eq!(backend.script().frames, 0);

        pollster::block_on(backend.acquire(surface)).unwrap();
        backend.draw_frame(surface, FrameTime::default());
        assert_eq!(backend.script().frames, 1);

        backend.release();
        backend.draw_frame(surface, FrameTime::default());
        assert_eq!(backend.script().frames, 1);
    }

    #[test]
    fn test_apply_controls_reads_bridge() {
        let mut surfaces = SurfaceSet::new();
        let surface = surfaces.ensure(SURFACE_ID, 4, 4).unwrap();
        let mut backend = CanvasBackend::new(Fill::default());
        pollster::block_on(backend.acquire(surface)).unwrap();

        // Undeclared control: percentage falls back to 100%
        let store = MemoryStore::new();
        backend.apply_controls(&ControlBridge::new(&store, &[]));
        backend.draw_frame(surface, FrameTime::default());
        assert_eq!(surface.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(backend.effect_class(), ClassKey::of::<Fill>());
    }
}
