//! Rendering surfaces
//!
//! A surface is a fixed-size RGBA pixel buffer identified by a well-known id.
//! Canvas effects draw into it through [`Canvas2d`]; shader effects copy their
//! GPU output back into it after each frame.

use std::collections::HashMap;
use std::path::Path;

use tiny_skia::{Color, FillRule, LineCap, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

use super::traits::RendererAcquisitionError;

/// Id of the single surface effects render into
pub const SURFACE_ID: &str = "lightscript-canvas";

/// Text queued on a surface
///
/// Glyphs are not rasterized; overlays are kept for the presenting host.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: [u8; 4],
}

/// Fixed-size pixel surface
pub struct Surface {
    id: String,
    width: u32,
    height: u32,
    /// Bumped each time the surface is recreated
    generation: u64,
    pixmap: Pixmap,
    overlays: Vec<TextOverlay>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("generation", &self.generation)
            .field("overlays", &self.overlays.len())
            .finish()
    }
}

impl Surface {
    fn new(id: &str, width: u32, height: u32, generation: u64) -> Result<Self, RendererAcquisitionError> {
        let pixmap = Pixmap::new(width, height).ok_or(RendererAcquisitionError::InvalidSurface { width, height })?;
        Ok(Self {
            id: id.to_string(),
            width,
            height,
            generation,
            pixmap,
            overlays: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    /// RGBA8 bytes of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let p = self.pixmap.pixel(x, y)?.demultiply();
        Some([p.red(), p.green(), p.blue(), p.alpha()])
    }

    /// Immediate-mode drawing facade
    pub fn canvas(&mut self) -> Canvas2d<'_> {
        Canvas2d { surface: self }
    }

    /// Replace the pixels with tightly packed opaque RGBA8 rows
    ///
    /// Returns false when the buffer does not match the surface size.
    pub fn write_rgba(&mut self, rgba: &[u8]) -> bool {
        let data = self.pixmap.data_mut();
        if data.len() != rgba.len() {
            return false;
        }
        data.copy_from_slice(rgba);
        true
    }

    /// Write the current pixels as a PNG file
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        self.pixmap.save_png(path)?;
        Ok(())
    }
}

/// Build a color from 0-1 channels, clamping out-of-range input
pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Color {
    let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    Color::from_rgba(c(r), c(g), c(b), c(a)).unwrap_or(Color::BLACK)
}

/// HSV (hue in degrees, s and v in 0-1) to RGB
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [f32; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = value - c;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m]
}

/// Immediate-mode 2D drawing onto a [`Surface`]
pub struct Canvas2d<'a> {
    surface: &'a mut Surface,
}

impl Canvas2d<'_> {
    pub fn width(&self) -> f32 {
        self.surface.width as f32
    }

    pub fn height(&self) -> f32 {
        self.surface.height as f32
    }

    /// Fill the whole surface and drop queued text
    pub fn clear(&mut self, color: Color) {
        self.surface.pixmap.fill(color);
        self.surface.overlays.clear();
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        self.surface.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        self.surface
            .pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    pub fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32, color: Color) {
        let mut pb = PathBuilder::new();
        pb.move_to(x0, y0);
        pb.line_to(x1, y1);
        let Some(path) = pb.finish() else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        self.surface
            .pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Queue a line of text at (x, y)
    pub fn fill_text(&mut self, x: f32, y: f32, text: impl Into<String>, color: Color) {
        let c = color.to_color_u8();
        self.surface.overlays.push(TextOverlay {
            x,
            y,
            text: text.into(),
            color: [c.red(), c.green(), c.blue(), c.alpha()],
        });
    }
}

/// Surfaces keyed by id
#[derive(Debug, Default)]
pub struct SurfaceSet {
    surfaces: HashMap<String, Surface>,
}

impl SurfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the surface, creating it at `width` x `height` when absent
    pub fn ensure(&mut self, id: &str, width: u32, height: u32) -> Result<&mut Surface, RendererAcquisitionError> {
        if !self.surfaces.contains_key(id) {
            let surface = Surface::new(id, width, height, 0)?;
            tracing::debug!(surface = id, width, height, "Surface created");
            self.surfaces.insert(id.to_string(), surface);
        }
        self.surfaces
            .get_mut(id)
            .ok_or(RendererAcquisitionError::InvalidSurface { width, height })
    }

    /// Replace the surface with a fresh one, discarding its pixels and any
    /// context bound to it
    pub fn recreate(&mut self, id: &str, width: u32, height: u32) -> Result<&mut Surface, RendererAcquisitionError> {
        let generation = self.surfaces.get(id).map(|s| s.generation + 1).unwrap_or(0);
        let surface = Surface::new(id, width, height, generation)?;
        tracing::debug!(surface = id, generation, "Surface recreated");
        self.surfaces.insert(id.to_string(), surface);
        self.surfaces
            .get_mut(id)
            .ok_or(RendererAcquisitionError::InvalidSurface { width, height })
    }

    pub fn get(&self, id: &str) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Surface> {
        self.surfaces.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_creates_once() {
        let mut set = SurfaceSet::new();
        set.ensure(SURFACE_ID, 32, 16).unwrap().canvas().clear(Color::WHITE);
        let surface = set.ensure(SURFACE_ID, 64, 64).unwrap();
        assert_eq!((surface.width(), surface.height()), (32, 16));
        assert_eq!(surface.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut set = SurfaceSet::new();
        assert!(set.ensure(SURFACE_ID, 0, 10).is_err());
    }

    #[test]
    fn test_recreate_bumps_generation_and_clears() {
        let mut set = SurfaceSet::new();
        set.ensure(SURFACE_ID, 8, 8).unwrap().canvas().clear(Color::WHITE);
        let surface = set.recreate(SURFACE_ID, 8, 8).unwrap();
        assert_eq!(surface.generation(), 1);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_canvas_drawing() {
        let mut set = SurfaceSet::new();
        let surface = set.ensure(SURFACE_ID, 20, 20).unwrap();
        {
            let mut canvas = surface.canvas();
            canvas.clear(Color::BLACK);
            canvas.fill_rect(0.0, 0.0, 10.0, 20.0, rgba(1.0, 0.0, 0.0, 1.0));
            canvas.fill_circle(15.0, 10.0, 3.0, rgba(0.0, 0.0, 1.0, 1.0));
            canvas.fill_text(1.0, 2.0, "hello", Color::WHITE);
        }
        assert_eq!(surface.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(15, 10), Some([0, 0, 255, 255]));
        assert_eq!(surface.overlays()[0].text, "hello");

        surface.canvas().clear(Color::BLACK);
        assert!(surface.overlays().is_empty());
    }

    #[test]
    fn test_write_rgba_checks_length() {
        let mut set = SurfaceSet::new();
        let surface = set.ensure(SURFACE_ID, 2, 1).unwrap();
        assert!(!surface.write_rgba(&[0; 4]));
        assert!(surface.write_rgba(&[10, 20, 30, 255, 1, 2, 3, 255]));
        assert_eq!(surface.pixel(1, 0), Some([1, 2, 3, 255]));
    }

    #[test]
    fn test_hsv_to_rgb() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), [0.0, 1.0, 0.0]);
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), [0.0, 0.0, 1.0]);
        assert_eq!(hsv_to_rgb(360.0, 0.0, 0.5), [0.5, 0.5, 0.5]);
    }
}
