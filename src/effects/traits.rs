//! Renderer traits
//!
//! This module defines the seams between the lifecycle engine and effects:
//! - `RenderBackend` - Capability trait the lifecycle engine drives, one
//!   implementation per renderer family
//! - `CanvasScript` - What an immediate-mode 2D effect supplies
//! - `ShaderScript` - What a uniform-driven shader effect supplies

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::controls::{ClassKey, ControlBridge};

use super::shader::ShaderUniforms;
use super::surface::{Canvas2d, Surface};

/// Renderer family of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererFamily {
    /// Immediate-mode 2D canvas
    Canvas2d,
    /// Retained full-screen shader driven by uniforms
    Shader,
}

impl RendererFamily {
    /// Whether switching to this family needs a surface without a bound context
    pub fn requires_fresh_context(&self) -> bool {
        matches!(self, RendererFamily::Shader)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RendererFamily::Canvas2d => "canvas2d",
            RendererFamily::Shader => "shader",
        }
    }
}

impl std::fmt::Display for RendererFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the effect entered `Rendering`
    pub elapsed: f32,
    /// Seconds since the previous frame
    pub delta: f32,
    /// Frames drawn before this one
    pub frame: u64,
}

impl FrameTime {
    pub fn new(elapsed: Duration, delta: Duration, frame: u64) -> Self {
        Self {
            elapsed: elapsed.as_secs_f32(),
            delta: delta.as_secs_f32(),
            frame,
        }
    }
}

/// Failure to obtain a drawing context or renderer resources
#[derive(Debug, Clone, PartialEq)]
pub enum RendererAcquisitionError {
    /// The surface cannot exist at this size
    InvalidSurface { width: u32, height: u32 },
    /// No GPU adapter is available
    NoAdapter,
    /// The adapter refused to create a device
    Device(String),
    /// Effect-specific resource setup failed
    Setup(String),
}

impl std::fmt::Display for RendererAcquisitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RendererAcquisitionError::InvalidSurface { width, height } => {
                write!(f, "cannot create a {}x{} surface", width, height)
            }
            RendererAcquisitionError::NoAdapter => write!(f, "no compatible GPU adapter found"),
            RendererAcquisitionError::Device(e) => write!(f, "failed to create GPU device: {}", e),
            RendererAcquisitionError::Setup(e) => write!(f, "renderer setup failed: {}", e),
        }
    }
}

impl std::error::Error for RendererAcquisitionError {}

/// Future returned by [`RenderBackend::acquire`]
pub type AcquireFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RendererAcquisitionError>> + 'a>>;

/// Renderer family capability driven by the lifecycle engine
pub trait RenderBackend {
    fn family(&self) -> RendererFamily;

    /// Class whose declared controls this backend reads
    fn effect_class(&self) -> ClassKey;

    /// Obtain a drawing context and build renderer resources
    fn acquire<'a>(&'a mut self, surface: &'a mut Surface) -> AcquireFuture<'a>;

    /// One render step
    fn draw_frame(&mut self, surface: &mut Surface, time: FrameTime);

    /// Read current control values and apply them to renderer state
    fn apply_controls(&mut self, bridge: &ControlBridge<'_>);

    /// Drop renderer resources; must tolerate a partial or failed acquire
    fn release(&mut self);
}

/// An immediate-mode 2D effect
///
/// Controls are read in two steps so the reading half stays free of
/// renderer state: `read_controls` turns bridge values into a plain struct,
/// `apply_controls` stores it.
pub trait CanvasScript: 'static {
    type Controls;

    /// Build per-instance state once the surface exists
    fn setup(&mut self, _width: u32, _height: u32) -> Result<(), RendererAcquisitionError> {
        Ok(())
    }

    fn read_controls(bridge: &ControlBridge<'_>) -> Self::Controls;

    fn apply_controls(&mut self, controls: Self::Controls);

    fn draw(&mut self, canvas: &mut Canvas2d<'_>, time: FrameTime);
}

/// A full-screen fragment shader effect
pub trait ShaderScript: 'static {
    type Controls;

    /// WGSL fragment stage; must define `fs_main` and bind [`ShaderUniforms`]
    /// at group 0, binding 0
    fn fragment_source() -> &'static str;

    fn read_controls(bridge: &ControlBridge<'_>) -> Self::Controls;

    fn apply_controls(&mut self, controls: Self::Controls);

    /// Pack renderer state into the uniform block
    fn write_uniforms(&self, uniforms: &mut ShaderUniforms);
}
